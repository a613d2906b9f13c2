use chrono::NaiveDate;

/// Typed bind value for dynamically assembled WHERE clauses. List
/// endpoints push one `SqlArg` per `?` they append, then bind them in
/// order against both the COUNT and the data query.
#[derive(Debug, Clone)]
pub enum SqlArg {
    U64(u64),
    I32(i32),
    Str(String),
    Date(NaiveDate),
}

/// Bind a slice of args onto a `query_as` builder, preserving order.
pub fn bind_query_as<'q, T>(
    mut query: sqlx::query::QueryAs<'q, sqlx::MySql, T, sqlx::mysql::MySqlArguments>,
    args: &'q [SqlArg],
) -> sqlx::query::QueryAs<'q, sqlx::MySql, T, sqlx::mysql::MySqlArguments> {
    for arg in args {
        query = match arg {
            SqlArg::U64(v) => query.bind(*v),
            SqlArg::I32(v) => query.bind(*v),
            SqlArg::Str(s) => query.bind(s.as_str()),
            SqlArg::Date(d) => query.bind(*d),
        };
    }
    query
}

/// Bind a slice of args onto a `query_scalar` builder, preserving order.
pub fn bind_scalar<'q, T>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::MySql, T, sqlx::mysql::MySqlArguments>,
    args: &'q [SqlArg],
) -> sqlx::query::QueryScalar<'q, sqlx::MySql, T, sqlx::mysql::MySqlArguments> {
    for arg in args {
        query = match arg {
            SqlArg::U64(v) => query.bind(*v),
            SqlArg::I32(v) => query.bind(*v),
            SqlArg::Str(s) => query.bind(s.as_str()),
            SqlArg::Date(d) => query.bind(*d),
        };
    }
    query
}
