use serde::Deserialize;

use crate::models::RoomStatus;

/// SQL query builder for the room inventory listing
/// Builds a single parameterized query with filters, sorting, and pagination
pub struct RoomQueryBuilder {
    where_clauses: Vec<String>,
    params: Vec<String>,
    order_clause: String,
    limit: u32,
    offset: u32,
}

impl RoomQueryBuilder {
    /// Creates a new RoomQueryBuilder with default values
    pub fn new() -> Self {
        Self {
            where_clauses: Vec::new(),
            params: Vec::new(),
            // Room number ascending is the stable default ordering
            order_clause: "room_number ASC".to_string(),
            limit: 20,
            offset: 0,
        }
    }

    /// Adds a search filter for partial room-number matching (case-insensitive)
    pub fn add_number_search(&mut self, search: &str) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("room_number ILIKE ${}", param_index));
        self.params.push(format!("%{}%", search));
    }

    /// Adds an exact status filter
    pub fn add_status_filter(&mut self, status: RoomStatus) {
        let param_index = self.params.len() + 1;
        self.where_clauses.push(format!("status = ${}", param_index));
        self.params.push(status.as_str().to_string());
    }

    /// Adds an exact room-type filter
    pub fn add_room_type_filter(&mut self, room_type_id: &str) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("room_type_id = ${}::uuid", param_index));
        self.params.push(room_type_id.to_string());
    }

    /// Adds a floor filter
    ///
    /// Parameters travel as text, so the placeholder carries an explicit
    /// cast back to the column type.
    pub fn add_floor_filter(&mut self, floor: i32) {
        let param_index = self.params.len() + 1;
        self.where_clauses
            .push(format!("floor = ${}::int4", param_index));
        self.params.push(floor.to_string());
    }

    /// Sets the sort order for the query
    pub fn set_sort(&mut self, field: RoomSortField, order: SortOrder) {
        let field_name = match field {
            RoomSortField::RoomNumber => "room_number",
            RoomSortField::Floor => "floor",
        };

        let order_str = match order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        // Secondary room_number key keeps equal-floor results deterministic
        self.order_clause = if field_name == "room_number" {
            format!("room_number {}", order_str)
        } else {
            format!("{} {}, room_number ASC", field_name, order_str)
        };
    }

    /// Sets pagination parameters from a 1-indexed page number
    pub fn set_pagination(&mut self, page: u32, limit: u32) {
        self.limit = limit;
        self.offset = (page - 1) * limit;
    }

    /// Builds the final SQL query string with all parameters
    /// Returns a tuple of (query_string, parameters)
    pub fn build(&self) -> (String, Vec<String>) {
        let mut query = String::from(
            "SELECT id, tenant_id, property_id, room_type_id, room_number, floor, \
             status, version, created_at, updated_at FROM rooms",
        );

        if !self.where_clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.where_clauses.join(" AND "));
        }

        query.push_str(" ORDER BY ");
        query.push_str(&self.order_clause);

        // LIMIT/OFFSET are validated integers, inlined rather than bound
        query.push_str(&format!(" LIMIT {}", self.limit));
        query.push_str(&format!(" OFFSET {}", self.offset));

        (query, self.params.clone())
    }
}

impl Default for RoomQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Query parameters extracted from the HTTP request
/// All fields are optional to support flexible querying
#[derive(Debug, Deserialize)]
pub struct RoomQueryParams {
    /// Search term for partial room-number matching
    pub search: Option<String>,
    /// Filter by room status
    pub status: Option<String>,
    /// Filter by room type id
    pub room_type_id: Option<String>,
    /// Filter by floor
    pub floor: Option<i32>,
    /// Sort field: "room_number" or "floor"
    pub sort: Option<String>,
    /// Sort order: "asc" or "desc"
    pub order: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<u32>,
    /// Items per page (defaults to 20)
    pub limit: Option<u32>,
}

/// Sort field options for the room listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomSortField {
    RoomNumber,
    Floor,
}

/// Sort order options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Validated and normalized query parameters
#[derive(Debug)]
pub struct ValidatedRoomQuery {
    pub search: Option<String>,
    pub status: Option<RoomStatus>,
    pub room_type_id: Option<String>,
    pub floor: Option<i32>,
    pub sort_field: RoomSortField,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

/// Validation error type for query parameters
#[derive(Debug)]
pub struct QueryValidationError {
    pub message: String,
}

impl std::fmt::Display for QueryValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for QueryValidationError {}

/// Query parameter validator
pub struct RoomQueryValidator;

impl RoomQueryValidator {
    /// Validates and normalizes query parameters
    pub fn validate(params: RoomQueryParams) -> Result<ValidatedRoomQuery, QueryValidationError> {
        let search = Self::normalize_string(params.search);
        let room_type_id = Self::normalize_string(params.room_type_id);

        let status = match Self::normalize_string(params.status) {
            Some(s) => Some(RoomStatus::from_str(&s).map_err(|message| QueryValidationError {
                message,
            })?),
            None => None,
        };

        if let Some(ref id) = room_type_id {
            if uuid::Uuid::parse_str(id).is_err() {
                return Err(QueryValidationError {
                    message: format!("room_type_id '{}' is not a valid UUID", id),
                });
            }
        }

        let sort_field = match params.sort {
            Some(s) => Self::parse_sort_field(&s)?,
            None => RoomSortField::RoomNumber,
        };

        let sort_order = match params.order {
            Some(o) => Self::parse_sort_order(&o)?,
            None => SortOrder::Asc,
        };

        let page = match params.page {
            Some(p) => {
                Self::validate_pagination_param(p, "page")?;
                p
            }
            None => 1,
        };

        let limit = match params.limit {
            Some(l) => {
                Self::validate_pagination_param(l, "limit")?;
                l
            }
            None => 20,
        };

        Ok(ValidatedRoomQuery {
            search,
            status,
            room_type_id,
            floor: params.floor,
            sort_field,
            sort_order,
            page,
            limit,
        })
    }

    /// Normalizes string parameters by trimming whitespace
    /// Returns None if the string is empty or whitespace-only
    fn normalize_string(s: Option<String>) -> Option<String> {
        s.and_then(|s| {
            let trimmed = s.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
    }

    /// Parses sort field string to RoomSortField
    fn parse_sort_field(s: &str) -> Result<RoomSortField, QueryValidationError> {
        match s.to_lowercase().as_str() {
            "room_number" => Ok(RoomSortField::RoomNumber),
            "floor" => Ok(RoomSortField::Floor),
            _ => Err(QueryValidationError {
                message: format!(
                    "Invalid sort field '{}'. Must be 'room_number' or 'floor'",
                    s
                ),
            }),
        }
    }

    /// Parses sort order string to SortOrder
    fn parse_sort_order(s: &str) -> Result<SortOrder, QueryValidationError> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(QueryValidationError {
                message: format!("Invalid sort order '{}'. Must be 'asc' or 'desc'", s),
            }),
        }
    }

    /// Pagination parameters must be positive and bounded
    fn validate_pagination_param(value: u32, param_name: &str) -> Result<(), QueryValidationError> {
        if value == 0 {
            return Err(QueryValidationError {
                message: format!("{} must be greater than 0", param_name),
            });
        }
        if param_name == "limit" && value > 100 {
            return Err(QueryValidationError {
                message: "limit cannot exceed 100".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds a room listing query from validated parameters
pub fn build_room_query(validated: &ValidatedRoomQuery) -> (String, Vec<String>) {
    let mut builder = RoomQueryBuilder::new();

    if let Some(ref search) = validated.search {
        builder.add_number_search(search);
    }
    if let Some(status) = validated.status {
        builder.add_status_filter(status);
    }
    if let Some(ref room_type_id) = validated.room_type_id {
        builder.add_room_type_filter(room_type_id);
    }
    if let Some(floor) = validated.floor {
        builder.add_floor_filter(floor);
    }

    builder.set_sort(validated.sort_field, validated.sort_order);
    builder.set_pagination(validated.page, validated.limit);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_has_stable_order() {
        let builder = RoomQueryBuilder::new();
        let (query, params) = builder.build();

        assert!(query.contains("ORDER BY room_number ASC"));
        assert!(query.contains("LIMIT 20"));
        assert!(query.contains("OFFSET 0"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_filters_use_sequential_placeholders() {
        let mut builder = RoomQueryBuilder::new();
        builder.add_number_search("20");
        builder.add_status_filter(RoomStatus::Dirty);
        builder.add_floor_filter(2);
        let (query, params) = builder.build();

        assert!(query.contains("room_number ILIKE $1"));
        assert!(query.contains("status = $2"));
        assert!(query.contains("floor = $3::int4"));
        assert_eq!(params, vec!["%20%", "dirty", "2"]);
    }

    #[test]
    fn test_floor_sort_keeps_room_number_tiebreak() {
        let mut builder = RoomQueryBuilder::new();
        builder.set_sort(RoomSortField::Floor, SortOrder::Desc);
        let (query, _) = builder.build();

        assert!(query.contains("ORDER BY floor DESC, room_number ASC"));
    }

    #[test]
    fn test_pagination_offset_math() {
        let mut builder = RoomQueryBuilder::new();
        builder.set_pagination(3, 25);
        let (query, _) = builder.build();

        assert!(query.contains("LIMIT 25"));
        assert!(query.contains("OFFSET 50"));
    }

    #[test]
    fn test_validator_applies_defaults() {
        let params = RoomQueryParams {
            search: None,
            status: None,
            room_type_id: None,
            floor: None,
            sort: None,
            order: None,
            page: None,
            limit: None,
        };

        let validated = RoomQueryValidator::validate(params).unwrap();
        assert_eq!(validated.page, 1);
        assert_eq!(validated.limit, 20);
        assert_eq!(validated.sort_field, RoomSortField::RoomNumber);
        assert_eq!(validated.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_validator_rejects_unknown_status() {
        let params = RoomQueryParams {
            search: None,
            status: Some("renovating".to_string()),
            room_type_id: None,
            floor: None,
            sort: None,
            order: None,
            page: None,
            limit: None,
        };

        assert!(RoomQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_validator_rejects_malformed_room_type_id() {
        let params = RoomQueryParams {
            search: None,
            status: None,
            room_type_id: Some("not-a-uuid".to_string()),
            floor: None,
            sort: None,
            order: None,
            page: None,
            limit: None,
        };

        assert!(RoomQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_validator_rejects_zero_page_and_oversized_limit() {
        let params = RoomQueryParams {
            search: None,
            status: None,
            room_type_id: None,
            floor: None,
            sort: None,
            order: None,
            page: Some(0),
            limit: None,
        };
        assert!(RoomQueryValidator::validate(params).is_err());

        let params = RoomQueryParams {
            search: None,
            status: None,
            room_type_id: None,
            floor: None,
            sort: None,
            order: None,
            page: None,
            limit: Some(500),
        };
        assert!(RoomQueryValidator::validate(params).is_err());
    }

    #[test]
    fn test_build_room_query_composes_filters() {
        let validated = ValidatedRoomQuery {
            search: Some("1".to_string()),
            status: Some(RoomStatus::Available),
            room_type_id: None,
            floor: None,
            sort_field: RoomSortField::RoomNumber,
            sort_order: SortOrder::Asc,
            page: 2,
            limit: 10,
        };

        let (query, params) = build_room_query(&validated);
        assert!(query.contains("WHERE room_number ILIKE $1 AND status = $2"));
        assert!(query.contains("OFFSET 10"));
        assert_eq!(params.len(), 2);
    }
}
