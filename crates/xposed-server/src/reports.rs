//! Report submission, listing and search.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use xposed_shared::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use xposed_shared::identity::Principal;
use xposed_shared::instrument;
use xposed_shared::types::{InstrumentType, RiskLevel};
use xposed_store::{NewReview, Page, Report, ReviewOutcome, ThreatStats};

use crate::error::ServerError;
use crate::notify::{NotificationKind, Notifier, Recipient};
use crate::state::SharedDb;
use crate::watchlist::WatchlistService;

/// What a search caller is allowed to see.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SearchResult {
    Summary(ReportSummary),
    Full(Box<Report>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub instrument: String,
    #[serde(rename = "type")]
    pub instrument_type: InstrumentType,
    pub review_count: u32,
    pub risk_level: RiskLevel,
}

pub struct ReportService {
    db: SharedDb,
    notifier: Arc<dyn Notifier>,
    watchlist: Arc<WatchlistService>,
    max_page_size: u32,
}

pub(crate) fn parse_type(value: &str) -> Result<InstrumentType, ServerError> {
    value
        .parse()
        .map_err(|_| ServerError::InvalidInstrumentType(value.to_string()))
}

fn parse_type_filter(value: Option<&str>) -> Result<Option<InstrumentType>, ServerError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(parse_type)
        .transpose()
}

impl ReportService {
    pub fn new(
        db: SharedDb,
        notifier: Arc<dyn Notifier>,
        watchlist: Arc<WatchlistService>,
        max_page_size: u32,
    ) -> Self {
        Self {
            db,
            notifier,
            watchlist,
            max_page_size,
        }
    }

    /// Record `principal`'s review of `instrument`.
    ///
    /// The store write is atomic; the watchlist fan-out and the reporter's
    /// acknowledgement run after commit and never fail the request.
    pub async fn report_instrument(
        &self,
        principal: &Principal,
        instrument: &str,
        instrument_type: &str,
        description: &str,
        aliases: Vec<String>,
    ) -> Result<ReviewOutcome, ServerError> {
        let kind = parse_type(instrument_type)?;
        let instrument = instrument.trim();
        if !instrument::validate(instrument, kind) {
            return Err(ServerError::InvalidInstrument(kind.to_string()));
        }

        let description = description.trim();
        if description.is_empty() {
            return Err(ServerError::BadRequest("description is required".into()));
        }

        let review = NewReview {
            user_id: principal.user_id,
            description: description.to_string(),
            aliases,
        };
        let outcome = self
            .db
            .lock()
            .await
            .record_review(instrument, kind, &review, Utc::now())?;

        let report = &outcome.report;
        if outcome.is_new_threat {
            info!(report_id = %report.id, instrument = %report.instrument, kind = %kind, "New threat reported");
        }
        info!(
            report_id = %report.id,
            user_id = %principal.user_id,
            review_count = report.review_count,
            risk_level = report.risk_level.as_str(),
            "Review accepted"
        );

        if outcome.became_public {
            info!(report_id = %report.id, "Report became public");
            self.watchlist.notify_on_public_transition(report).await;
        }

        let ack = serde_json::json!({
            "instrument": report.instrument,
            "type": report.instrument_type,
            "isNewThreat": outcome.is_new_threat,
        });
        if let Err(e) = self
            .notifier
            .send(&Recipient::from(principal), NotificationKind::ReportSubmitted, ack)
            .await
        {
            warn!(error = %e, user_id = %principal.user_id, "Report acknowledgement failed");
        }

        Ok(outcome)
    }

    /// Public reports, newest first. `page` and `limit` are clamped.
    pub async fn fetch_public(
        &self,
        instrument_type: Option<&str>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Report>, ServerError> {
        let filter = parse_type_filter(instrument_type)?;
        let page = page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, self.max_page_size);

        Ok(self.db.lock().await.list_public_reports(filter, page, limit)?)
    }

    /// Every report, newest first. For privileged callers.
    pub async fn fetch_all(
        &self,
        instrument_type: Option<&str>,
        instrument: Option<&str>,
    ) -> Result<Vec<Report>, ServerError> {
        let filter = parse_type_filter(instrument_type)?;
        let instrument = instrument.map(str::trim).filter(|i| !i.is_empty());
        Ok(self.db.lock().await.list_reports(filter, instrument)?)
    }

    pub async fn stats(&self) -> Result<ThreatStats, ServerError> {
        Ok(self.db.lock().await.threat_stats()?)
    }

    /// Look up one instrument. Private reports only reveal a summary; public
    /// low and medium risk reports are for subscribers; public high risk
    /// reports are open to everyone.
    pub async fn search(
        &self,
        instrument: &str,
        instrument_type: &str,
        principal: Option<&Principal>,
    ) -> Result<SearchResult, ServerError> {
        let kind = parse_type(instrument_type)?;
        let instrument = instrument.trim();

        let report = self
            .db
            .lock()
            .await
            .find_report_by_instrument(instrument)?
            .filter(|r| r.instrument_type == kind)
            .ok_or(xposed_store::StoreError::InstrumentNotFound)?;

        if !report.is_public {
            debug!(report_id = %report.id, "Search hit on private report");
            return Ok(SearchResult::Summary(ReportSummary {
                instrument: report.instrument,
                instrument_type: report.instrument_type,
                review_count: report.review_count,
                risk_level: report.risk_level,
            }));
        }

        if report.risk_level < RiskLevel::High {
            let principal = principal.ok_or(ServerError::Unauthenticated)?;
            if !principal.has_active_subscription(Utc::now()) {
                return Err(ServerError::SubscriptionRequired);
            }
        }

        Ok(SearchResult::Full(Box::new(report)))
    }
}
