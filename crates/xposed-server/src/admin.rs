//! Privileged report mutations that bypass the automatic thresholds.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use xposed_store::Report;

use crate::error::ServerError;
use crate::state::SharedDb;
use crate::watchlist::WatchlistService;

pub struct AdminService {
    db: SharedDb,
    watchlist: Arc<WatchlistService>,
}

impl AdminService {
    pub fn new(db: SharedDb, watchlist: Arc<WatchlistService>) -> Self {
        Self { db, watchlist }
    }

    /// Mark a report verified. Calling it again is a no-op.
    pub async fn verify_threat(&self, report_id: Uuid) -> Result<Report, ServerError> {
        let report = self.db.lock().await.verify_report(report_id, Utc::now())?;
        info!(report_id = %report.id, "Report verified by admin");
        Ok(report)
    }

    /// Set the visibility override. A private report made public alerts the
    /// watchlist like any other public transition.
    pub async fn set_visibility(
        &self,
        report_id: Uuid,
        force_public: bool,
    ) -> Result<Report, ServerError> {
        let (report, became_public) =
            self.db
                .lock()
                .await
                .set_force_public(report_id, force_public, Utc::now())?;

        info!(
            report_id = %report.id,
            force_public,
            is_public = report.is_public,
            "Visibility override applied"
        );

        if became_public {
            self.watchlist.notify_on_public_transition(&report).await;
        }
        Ok(report)
    }
}
