//! Risk classification of a report.
//!
//! [`classify`] is the single transition function for the derived report
//! fields. Every write path (new review, admin override, appeal approval)
//! builds the input [`Classification`] it wants, calls [`classify`], and
//! persists what comes back.

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTO_VERIFY_THRESHOLD, HIGH_RISK_THRESHOLD, MEDIUM_RISK_THRESHOLD, PUBLIC_THRESHOLD,
};
use crate::types::{RiskLevel, VerificationStatus};

/// The classification-relevant slice of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub review_count: u32,
    pub risk_level: RiskLevel,
    pub is_public: bool,
    pub force_public: bool,
    /// Set when an appeal against the instrument was approved. Hides the
    /// report from threshold-driven listing until an admin forces it public.
    pub suppressed: bool,
    pub verification_status: VerificationStatus,
}

impl Classification {
    /// State of a report that has just been created with no reviews.
    pub fn initial() -> Self {
        Self {
            review_count: 0,
            risk_level: RiskLevel::Low,
            is_public: false,
            force_public: false,
            suppressed: false,
            verification_status: VerificationStatus::Unverified,
        }
    }
}

pub fn risk_level_for(review_count: u32) -> RiskLevel {
    if review_count >= HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if review_count >= MEDIUM_RISK_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Recompute the derived fields from `review_count` and the override flags.
///
/// `force_public`, `suppressed` and a `verified` status are carried through
/// untouched; verification is only ever upgraded here.
pub fn classify(current: Classification) -> Classification {
    let verification_status = if current.review_count >= AUTO_VERIFY_THRESHOLD {
        VerificationStatus::Verified
    } else {
        current.verification_status
    };

    let reached_threshold = current.review_count >= PUBLIC_THRESHOLD;

    Classification {
        risk_level: risk_level_for(current.review_count),
        is_public: current.force_public || (reached_threshold && !current.suppressed),
        verification_status,
        ..current
    }
}

/// `true` when a save moved the report from private to public.
pub fn became_public(before: &Classification, after: &Classification) -> bool {
    !before.is_public && after.is_public
}
