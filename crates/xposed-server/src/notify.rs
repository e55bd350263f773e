//! Outbound notification dispatch.
//!
//! Services hand a recipient, a template kind and a structured payload to a
//! [`Notifier`]; rendering and delivery belong to the implementation. The
//! shipped [`LogNotifier`] emits one `tracing` event per message.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use xposed_shared::identity::Principal;
use xposed_store::User;

/// Message template selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    ReportSubmitted,
    AppealReceived,
    AppealResolved,
    WatchlistAlert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportSubmitted => "report-submitted",
            Self::AppealReceived => "appeal-received",
            Self::AppealResolved => "appeal-resolved",
            Self::WatchlistAlert => "watchlist-alert",
        }
    }
}

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&Principal> for Recipient {
    fn from(p: &Principal) -> Self {
        Self {
            user_id: p.user_id,
            name: p.name.clone(),
            email: p.email.clone(),
        }
    }
}

impl From<&User> for Recipient {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Delivery did not complete within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &Recipient,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Writes every notification to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        info!(
            user_id = %recipient.user_id,
            email = recipient.email.as_deref().unwrap_or("-"),
            kind = kind.as_str(),
            %payload,
            "Notification dispatched"
        );
        Ok(())
    }
}
