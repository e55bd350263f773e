//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be returned directly as an API
//! body; JSON field names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use xposed_shared::appeal::AppealStatus;
use xposed_shared::risk::Classification;
use xposed_shared::types::{
    InstrumentType, RiskLevel, Role, SubscriptionStatus, VerificationStatus,
};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One user's corroborating report against an instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user_id: Uuid,
    pub description: String,
    pub aliases: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A reported instrument with its reviews and derived classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub instrument: String,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    pub reviews: Vec<Review>,
    pub review_count: u32,
    pub risk_level: RiskLevel,
    pub is_public: bool,
    pub force_public: bool,
    pub suppressed: bool,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// A fresh report with no reviews.
    pub fn new(instrument: &str, instrument_type: InstrumentType, now: DateTime<Utc>) -> Self {
        let initial = Classification::initial();
        Self {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            instrument_type,
            reviews: Vec::new(),
            review_count: initial.review_count,
            risk_level: initial.risk_level,
            is_public: initial.is_public,
            force_public: initial.force_public,
            suppressed: initial.suppressed,
            verification_status: initial.verification_status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn classification(&self) -> Classification {
        Classification {
            review_count: self.review_count,
            risk_level: self.risk_level,
            is_public: self.is_public,
            force_public: self.force_public,
            suppressed: self.suppressed,
            verification_status: self.verification_status,
        }
    }

    pub(crate) fn apply(&mut self, c: Classification, now: DateTime<Utc>) {
        self.review_count = c.review_count;
        self.risk_level = c.risk_level;
        self.is_public = c.is_public;
        self.force_public = c.force_public;
        self.suppressed = c.suppressed;
        self.verification_status = c.verification_status;
        self.updated_at = now;
    }
}

/// Review submitted against an instrument.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub user_id: Uuid,
    pub description: String,
    pub aliases: Vec<String>,
}

/// Result of appending a review.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub report: Report,
    /// The report was created by this call.
    pub is_new_threat: bool,
    /// The save moved the report from private to public.
    pub became_public: bool,
}

/// A page of results with totals for the whole query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total: u64,
    pub current_page: u32,
    pub total_pages: u32,
    pub data: Vec<T>,
}

// ---------------------------------------------------------------------------
// Appeal
// ---------------------------------------------------------------------------

/// A request to remove the public listing of an instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    pub id: Uuid,
    pub instrument: String,
    pub user_id: Uuid,
    pub reason: String,
    pub evidence: Option<String>,
    pub status: AppealStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of resolving an appeal. `report` is set when the report was
/// changed (approval).
#[derive(Debug, Clone, Serialize)]
pub struct AppealResolution {
    pub appeal: Appeal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

/// A user's subscription to alerts for one instrument category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: InstrumentType,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Locally cached copy of a principal issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub name: Option<String>,
    pub email: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreatStats {
    pub total_threats: u64,
    pub public_threats: u64,
    pub verified_threats: u64,
}
