//! Watchlist subscriptions and alert fan-out.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use xposed_shared::identity::Principal;
use xposed_shared::types::InstrumentType;
use xposed_store::{Report, WatchlistEntry};

use crate::error::ServerError;
use crate::notify::{NotificationKind, Notifier, Recipient};
use crate::state::SharedDb;

pub struct WatchlistService {
    db: SharedDb,
    notifier: Arc<dyn Notifier>,
}

impl WatchlistService {
    pub fn new(db: SharedDb, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    pub async fn add(
        &self,
        principal: &Principal,
        category: &str,
    ) -> Result<WatchlistEntry, ServerError> {
        let category: InstrumentType = category
            .parse()
            .map_err(|_| ServerError::InvalidInstrumentType(category.to_string()))?;

        let entry = self
            .db
            .lock()
            .await
            .add_watch(principal.user_id, category, Utc::now())?;

        info!(user_id = %principal.user_id, category = %category, "Watchlist entry added");
        Ok(entry)
    }

    pub async fn list(&self, principal: &Principal) -> Result<Vec<WatchlistEntry>, ServerError> {
        Ok(self.db.lock().await.list_watches_for_user(principal.user_id)?)
    }

    pub async fn remove(&self, principal: &Principal, id: Uuid) -> Result<(), ServerError> {
        self.db.lock().await.delete_watch(id, principal.user_id)?;
        info!(user_id = %principal.user_id, entry_id = %id, "Watchlist entry removed");
        Ok(())
    }

    /// Alert every subscriber of `report.instrument_type` that the report is
    /// now public. Each delivery is independent; failures are logged and do
    /// not affect the others. Returns the number of alerts delivered.
    pub async fn notify_on_public_transition(&self, report: &Report) -> usize {
        let recipients = match self.resolve_subscribers(report.instrument_type).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(
                    error = %e,
                    report_id = %report.id,
                    "Could not resolve watchlist subscribers"
                );
                return 0;
            }
        };

        if recipients.is_empty() {
            debug!(report_id = %report.id, "No watchlist subscribers");
            return 0;
        }

        let payload = serde_json::json!({
            "instrument": report.instrument,
            "type": report.instrument_type,
            "riskLevel": report.risk_level,
        });

        let results = join_all(recipients.iter().map(|recipient| {
            self.notifier
                .send(recipient, NotificationKind::WatchlistAlert, payload.clone())
        }))
        .await;

        let mut delivered = 0;
        for (recipient, result) in recipients.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    error = %e,
                    user_id = %recipient.user_id,
                    report_id = %report.id,
                    "Watchlist alert failed"
                ),
            }
        }

        info!(
            report_id = %report.id,
            category = %report.instrument_type,
            delivered,
            subscribers = recipients.len(),
            "Watchlist alerts dispatched"
        );
        delivered
    }

    async fn resolve_subscribers(
        &self,
        category: InstrumentType,
    ) -> Result<Vec<Recipient>, ServerError> {
        let db = self.db.lock().await;
        let mut recipients = Vec::new();
        for entry in db.list_watchers(category)? {
            match db.get_user(entry.user_id)? {
                Some(user) => recipients.push(Recipient::from(&user)),
                None => warn!(user_id = %entry.user_id, "Watchlist subscriber not in user directory"),
            }
        }
        Ok(recipients)
    }
}
