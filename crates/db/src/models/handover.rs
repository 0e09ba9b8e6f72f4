//! Handover note entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use lastmile_core::error::CoreError;
use lastmile_core::status::HandoverStatus;
use lastmile_core::types::{DbId, Timestamp};
use lastmile_core::version::VersionMismatch;

/// A row from the `handovers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Handover {
    pub id: DbId,
    pub title: String,
    pub content: String,
    pub is_notice: bool,
    pub department: String,
    pub status: String,
    pub create_by: DbId,
    pub create_time: Timestamp,
    pub is_locked: bool,
    pub locked_by: Option<DbId>,
    pub locked_at: Option<Timestamp>,
    pub version: i64,
    pub update_by: Option<DbId>,
    pub update_at: Option<Timestamp>,
}

impl Handover {
    pub fn status(&self) -> Result<HandoverStatus, CoreError> {
        HandoverStatus::from_str(&self.status)
    }
}

/// DTO for creating a handover note.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateHandover {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub is_notice: bool,
    #[serde(default = "default_department")]
    #[validate(length(min = 1, max = 50))]
    pub department: String,
}

fn default_department() -> String {
    "ALL".to_string()
}

/// DTO for updating a handover note.
///
/// `expected_version` carries the version the client last read; handovers
/// use the optimistic policy, so a mismatch is surfaced as a warning while
/// the write still applies.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateHandover {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    pub is_notice: Option<bool>,
    pub status: Option<HandoverStatus>,
    #[validate(length(min = 1, max = 50))]
    pub department: Option<String>,
    pub expected_version: Option<i64>,
}

/// Result of a committed handover mutation, with the optional advisory
/// version-conflict warning.
#[derive(Debug, Serialize)]
pub struct UpdatedHandover {
    pub handover: Handover,
    pub version_warning: Option<VersionMismatch>,
}

/// Filter for handover listing.
#[derive(Debug, Default, Deserialize)]
pub struct HandoverListQuery {
    pub is_notice: Option<bool>,
    pub department: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}
