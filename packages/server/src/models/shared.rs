use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;

/// Default page size for list endpoints.
pub const DEFAULT_PER_PAGE: u64 = 20;
/// Upper bound on the page size a client may request.
pub const MAX_PER_PAGE: u64 = 100;
/// Highest page whose offset still fits the database's signed 64-bit OFFSET.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PER_PAGE;

/// Pagination metadata included in list responses.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Pagination {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 20)]
    pub per_page: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 47)]
    pub total: u64,
    /// Total number of pages.
    #[schema(example = 3)]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: PageParams, total: u64) -> Self {
        Self {
            page: page.page,
            per_page: page.per_page,
            total,
            total_pages: total.div_ceil(page.per_page),
        }
    }
}

/// Query parameters accepted by every paginated endpoint.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (1-based, default 1). Values past the last representable
    /// page are clamped.
    pub page: Option<u64>,
    /// Items per page (1-100, default 20).
    pub per_page: Option<u64>,
}

/// Clamped page window derived from a [`PageQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u64,
    pub per_page: u64,
}

impl PageParams {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

impl PageQuery {
    pub fn params(&self) -> PageParams {
        PageParams {
            page: self.page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: self
                .per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        }
    }
}

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Validate free-text content: non-blank and at most `max` Unicode characters.
pub fn validate_content(content: &str, max: usize) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Content must not be blank".into()));
    }
    if content.chars().count() > max {
        return Err(AppError::Validation(format!(
            "Content must not exceed {max} characters"
        )));
    }
    Ok(())
}
