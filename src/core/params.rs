//! Query parameters, sanitization and pagination utilities

use crate::config::ServiceSettings;
use serde::Serialize;
use serde_json::{Map, Value};

/// Raw caller parameters, as received from the transport
///
/// Values may be typed (`{"limit": 10}`) or arrive as strings from a query
/// string (`{"limit": "10", "sort": "name,-age"}`).
pub type Params = Map<String, Value>;

/// Canonical query parameters handed to the storage adapter
///
/// Built fresh for every request by [`sanitize`].
///
/// # Example
/// ```text
/// GET /users?page=2&pageSize=10&sort=-age,name
/// GET /users/find?query={"status":"active"}&fields=name email
/// GET /users?search=ali&searchFields=name,email&populate=company
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Relation names to populate
    pub populate: Option<Vec<String>>,

    /// Requested fields (dotted paths)
    pub fields: Option<Vec<String>>,

    /// Maximum number of rows
    pub limit: Option<usize>,

    /// Number of rows to skip
    pub offset: Option<usize>,

    /// Page number (starts at 1), `list` only
    pub page: Option<usize>,

    /// Rows per page, `list` only
    pub page_size: Option<usize>,

    /// Sort keys, `-field` for descending
    ///
    /// # Example
    /// ```text
    /// sort=-created_at,name
    /// ```
    pub sort: Option<Vec<String>>,

    /// Full-text search term
    pub search: Option<String>,

    /// Fields the search term is matched against
    pub search_fields: Option<Vec<String>>,

    /// Equality filter on dotted paths
    ///
    /// # Example
    /// ```text
    /// query={"status": "active", "address.city": "Lyon"}
    /// ```
    pub query: Option<Map<String, Value>>,

    /// Include logically deleted records
    pub with_deleted: bool,
}

impl QueryParams {
    /// Copy of these parameters without `limit`/`offset`, as used by `count`
    pub fn without_paging(&self) -> Self {
        Self {
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// Add an equality condition to the query filter
    pub fn with_condition(mut self, field: impl Into<String>, value: Value) -> Self {
        self.query
            .get_or_insert_with(Map::new)
            .insert(field.into(), value);
        self
    }
}

/// Whether `action` names the paginated listing operation
fn is_paginated(action: &str) -> bool {
    action == "list" || action.ends_with(".list")
}

/// Normalize raw caller input into canonical query parameters
///
/// Sanitization is total: values of the wrong type are ignored rather than
/// rejected. For the `list` operation, `limit`/`offset` are always derived
/// from `page`/`pageSize`, overwriting anything the caller sent.
pub fn sanitize(raw: &Params, action: &str, settings: &ServiceSettings) -> QueryParams {
    let mut params = QueryParams {
        populate: raw.get("populate").and_then(coerce_list),
        fields: raw.get("fields").and_then(coerce_list),
        limit: raw.get("limit").and_then(coerce_number),
        offset: raw.get("offset").and_then(coerce_number),
        page: raw.get("page").and_then(coerce_number),
        page_size: raw.get("pageSize").and_then(coerce_number),
        sort: raw.get("sort").and_then(coerce_list),
        search: raw.get("search").and_then(coerce_string),
        search_fields: raw.get("searchFields").and_then(coerce_list),
        query: raw.get("query").and_then(coerce_object),
        with_deleted: raw.get("withDeleted").is_some_and(coerce_bool),
    };

    if is_paginated(action) {
        let mut page_size = match params.page_size {
            Some(size) if size > 0 => size,
            _ => settings.page_size,
        };
        let page = match params.page {
            Some(page) if page > 0 => page,
            _ => 1,
        };
        if settings.max_page_size > 0 && page_size > settings.max_page_size {
            page_size = settings.max_page_size;
        }
        params.page = Some(page);
        params.page_size = Some(page_size);
        params.limit = Some(page_size);
        params.offset = Some((page - 1).saturating_mul(page_size));
    }

    if settings.max_limit > 0 {
        if let Some(limit) = params.limit {
            if limit > settings.max_limit {
                params.limit = Some(settings.max_limit);
            }
        }
    }

    params
}

fn coerce_number(value: &Value) -> Option<usize> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() && number >= 0.0 {
        Some(number as usize)
    } else {
        None
    }
}

fn coerce_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(
            s.replace(',', " ")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        ),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "true" | "1"),
        Value::Number(n) => n.as_u64() == Some(1),
        _ => false,
    }
}

/// Response envelope of the `list` operation
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Transformed rows of the requested page
    pub rows: Vec<Value>,

    /// Total number of matching records (all pages)
    pub total: usize,

    /// Current page number (starts at 1)
    pub page: usize,

    /// Number of rows per page
    pub page_size: usize,

    /// Total number of pages
    pub total_pages: usize,
}

impl ListResponse {
    /// Assemble a page, computing `total_pages` by ceiling division
    pub fn new(rows: Vec<Value>, total: usize, page: usize, page_size: usize) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            rows,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    fn settings() -> ServiceSettings {
        ServiceSettings::new("users")
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let settings = settings();
        for page in [json!("1e30"), json!("99999999999999999999"), json!(1e30)] {
            let params = sanitize(&raw(json!({"page": page})), "list", &settings);

            assert_eq!(params.page, Some(usize::MAX));
            assert_eq!(params.limit, Some(settings.page_size));
            assert_eq!(params.offset, Some(usize::MAX));
        }
    }

    #[test]
    fn test_string_inputs_match_typed_inputs() {
        let from_strings = sanitize(
            &raw(json!({
                "limit": "5",
                "offset": "10",
                "sort": "name,-age",
                "fields": "name email",
                "populate": "company",
                "searchFields": "name, email",
            })),
            "find",
            &settings(),
        );
        let typed = sanitize(
            &raw(json!({
                "limit": 5,
                "offset": 10,
                "sort": ["name", "-age"],
                "fields": ["name", "email"],
                "populate": ["company"],
                "searchFields": ["name", "email"],
            })),
            "find",
            &settings(),
        );

        assert_eq!(from_strings, typed);
        assert_eq!(typed.sort, Some(vec!["name".to_string(), "-age".to_string()]));
    }

    #[test]
    fn test_page_strings_match_typed_pages() {
        let a = sanitize(&raw(json!({"page": "3", "pageSize": "7"})), "list", &settings());
        let b = sanitize(&raw(json!({"page": 3, "pageSize": 7})), "list", &settings());
        assert_eq!(a, b);
        assert_eq!(a.offset, Some(14));
    }

    #[test]
    fn test_list_defaults() {
        let params = sanitize(&Params::new(), "list", &settings());
        assert_eq!(params.page, Some(1));
        assert_eq!(params.page_size, Some(10));
        assert_eq!(params.limit, Some(10));
        assert_eq!(params.offset, Some(0));
    }

    #[test]
    fn test_page_size_clamped_to_max() {
        let mut settings = settings();
        settings.max_page_size = 5;

        let params = sanitize(&raw(json!({"page": 2, "pageSize": 100})), "list", &settings);
        assert_eq!(params.page_size, Some(5));
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.offset, Some(5));
    }

    #[test]
    fn test_list_overwrites_caller_limit_and_offset() {
        let params = sanitize(
            &raw(json!({"limit": 99, "offset": 42, "pageSize": 4})),
            "users.list",
            &settings(),
        );
        assert_eq!(params.limit, Some(4));
        assert_eq!(params.offset, Some(0));
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let mut settings = settings();
        settings.max_limit = 10;

        let params = sanitize(&raw(json!({"limit": 50})), "find", &settings);
        assert_eq!(params.limit, Some(10));

        let params = sanitize(&raw(json!({"limit": 3})), "find", &settings);
        assert_eq!(params.limit, Some(3));
    }

    #[test]
    fn test_max_limit_zero_means_unbounded() {
        let params = sanitize(&raw(json!({"limit": 5000})), "find", &settings());
        assert_eq!(params.limit, Some(5000));
    }

    #[test]
    fn test_malformed_values_are_ignored() {
        let params = sanitize(
            &raw(json!({
                "limit": "abc",
                "offset": -3,
                "sort": 12,
                "fields": {"a": 1},
                "query": "not json",
            })),
            "find",
            &settings(),
        );
        assert_eq!(params, QueryParams::default());
    }

    #[test]
    fn test_query_accepts_json_string() {
        let params = sanitize(
            &raw(json!({"query": "{\"status\":\"active\"}", "withDeleted": "true"})),
            "find",
            &settings(),
        );
        assert_eq!(params.query.unwrap()["status"], "active");
        assert!(params.with_deleted);
    }

    #[test]
    fn test_without_paging() {
        let params = sanitize(&raw(json!({"page": 2})), "list", &settings()).without_paging();
        assert_eq!(params.limit, None);
        assert_eq!(params.offset, None);
        assert_eq!(params.page, Some(2));
    }

    #[test]
    fn test_list_response_total_pages() {
        let response = ListResponse::new(vec![], 25, 1, 10);
        assert_eq!(response.total_pages, 3);

        let response = ListResponse::new(vec![], 0, 1, 10);
        assert_eq!(response.total_pages, 0);

        let response = ListResponse::new(vec![], 20, 2, 10);
        assert_eq!(response.total_pages, 2);
    }
}
