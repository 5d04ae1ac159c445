//! Response envelope, pagination and date parsing shared by the handlers.

use axum::Json;
use serde::Serialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Successful responses are wrapped as `{ "message": ..., "result": ... }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub result: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, result: T) -> Json<Self> {
        Json(Self {
            message: message.into(),
            result,
        })
    }

    pub fn success(result: T) -> Json<Self> {
        Self::new("success", result)
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Validates raw `page`/`limit` query values. `limit` is capped at [`MAX_PAGE_LIMIT`].
    pub fn resolve(page: Option<i64>, limit: Option<i64>) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page < 1 {
            return Err(AppError::validation("Page must be at least 1"));
        }
        if limit < 1 {
            return Err(AppError::validation("Limit must be at least 1"));
        }
        Ok(Self {
            page,
            limit: limit.min(MAX_PAGE_LIMIT),
        })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

/// Path ids that are not UUIDs cannot name an existing record, so they
/// resolve to the same not-found error as a missing one.
pub fn parse_id(raw: &str, not_found: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found(not_found))
}

/// `YYYY-MM-DD` rendering used in CSV exports and file names.
pub fn format_day(ts: OffsetDateTime) -> anyhow::Result<String> {
    Ok(ts.date().format(format_description!("[year]-[month]-[day]"))?)
}
