use actix_web::HttpResponse;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

/// Offset-pagination block attached to every list response.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub limit: u32,
    #[schema(example = 42)]
    pub total_count: i64,
    #[schema(example = 5)]
    pub total_pages: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total_count: i64) -> Self {
        let limit_i = i64::from(limit.max(1));
        let total_pages = (total_count + limit_i - 1) / limit_i;
        Self {
            page,
            limit,
            total_count,
            total_pages,
            has_more: i64::from(page) * limit_i < total_count,
        }
    }
}

pub fn ok<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "data": data,
        "timestamp": Utc::now(),
    }))
}

pub fn created<T: Serialize>(data: T, message: &str) -> HttpResponse {
    HttpResponse::Created().json(json!({
        "success": true,
        "message": message,
        "data": data,
        "timestamp": Utc::now(),
    }))
}

pub fn paginated<T: Serialize>(data: T, pagination: Pagination, message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "data": data,
        "pagination": pagination,
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let p = Pagination::new(1, 10, 42);
        assert_eq!(p.total_pages, 5);
        assert!(p.has_more);

        let p = Pagination::new(5, 10, 42);
        assert_eq!(p.total_pages, 5);
        assert!(!p.has_more);

        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_more);

        // Exact fit: last page has no more.
        let p = Pagination::new(4, 10, 40);
        assert_eq!(p.total_pages, 4);
        assert!(!p.has_more);
    }

    #[test]
    fn pagination_serializes_camel_case() {
        let p = Pagination::new(2, 10, 25);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["totalCount"], 25);
        assert_eq!(v["totalPages"], 3);
        assert_eq!(v["hasMore"], true);
    }
}
