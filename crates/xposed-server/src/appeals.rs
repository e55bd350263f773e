//! Appeal submission and resolution.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::MutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use xposed_shared::appeal::{AppealAction, AppealStatus};
use xposed_shared::identity::Principal;
use xposed_store::{Appeal, AppealResolution, Database, StoreError};

use crate::error::ServerError;
use crate::notify::{NotificationKind, Notifier, NotifyError, Recipient};
use crate::state::SharedDb;

pub struct AppealService {
    db: SharedDb,
    notifier: Arc<dyn Notifier>,
    notify_timeout: Duration,
}

impl AppealService {
    pub fn new(db: SharedDb, notifier: Arc<dyn Notifier>, notify_timeout: Duration) -> Self {
        Self {
            db,
            notifier,
            notify_timeout,
        }
    }

    /// File an appeal against the public listing of `instrument`.
    ///
    /// The appeal row and the `AppealReceived` dispatch form one unit: the
    /// transaction commits only after the notifier accepts the message within
    /// `notify_timeout`. Any failure, timeout or cancellation rolls it back.
    pub async fn submit(
        &self,
        principal: &Principal,
        instrument: &str,
        reason: &str,
        evidence: Option<&str>,
    ) -> Result<Appeal, ServerError> {
        if !principal.has_active_subscription(Utc::now()) {
            return Err(ServerError::SubscriptionRequired);
        }
        let instrument = instrument.trim();
        let reason = reason.trim();
        if instrument.is_empty() {
            return Err(ServerError::BadRequest("instrument is required".into()));
        }
        if reason.is_empty() {
            return Err(ServerError::BadRequest("reason is required".into()));
        }
        let evidence = evidence.map(str::trim).filter(|e| !e.is_empty());

        // The transaction owns the lock for the whole dispatch so nothing
        // else can use the connection while it is open.
        let tx = AppealTx::begin(self.db.lock().await)?;
        let appeal = tx.create_appeal(instrument, principal.user_id, reason, evidence, Utc::now())?;

        let payload = serde_json::json!({
            "appealId": appeal.id,
            "instrument": appeal.instrument,
        });
        let recipient = Recipient::from(principal);
        let dispatch = self
            .notifier
            .send(&recipient, NotificationKind::AppealReceived, payload);
        let sent = match tokio::time::timeout(self.notify_timeout, dispatch).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.notify_timeout)),
        };
        if let Err(e) = sent {
            warn!(error = %e, appeal_id = %appeal.id, "Appeal notification failed, rolling back");
            return Err(e.into());
        }

        tx.commit()?;

        info!(
            appeal_id = %appeal.id,
            user_id = %principal.user_id,
            instrument = %appeal.instrument,
            "Appeal submitted"
        );
        Ok(appeal)
    }

    /// Apply an admin decision. The appellant is told the outcome on a
    /// best-effort basis.
    pub async fn resolve(&self, id: Uuid, action: &str) -> Result<AppealResolution, ServerError> {
        let action: AppealAction = action.parse()?;

        let (resolution, appellant) = {
            let mut db = self.db.lock().await;
            let resolution = db.resolve_appeal(id, action, Utc::now())?;
            let appellant = db.get_user(resolution.appeal.user_id).unwrap_or_else(|e| {
                warn!(error = %e, "Could not load appellant");
                None
            });
            (resolution, appellant)
        };

        let appeal = &resolution.appeal;
        info!(
            appeal_id = %appeal.id,
            instrument = %appeal.instrument,
            status = appeal.status.as_str(),
            "Appeal resolved"
        );
        if let Some(report) = &resolution.report {
            info!(report_id = %report.id, is_public = report.is_public, "Report hidden by appeal");
        }

        match appellant {
            Some(user) => {
                let payload = serde_json::json!({
                    "appealId": appeal.id,
                    "instrument": appeal.instrument,
                    "status": appeal.status,
                });
                if let Err(e) = self
                    .notifier
                    .send(&Recipient::from(&user), NotificationKind::AppealResolved, payload)
                    .await
                {
                    warn!(error = %e, appeal_id = %appeal.id, "Appeal resolution notification failed");
                }
            }
            None => warn!(user_id = %appeal.user_id, "Appellant not in user directory"),
        }

        Ok(resolution)
    }

    pub async fn list(&self, status: Option<&str>) -> Result<Vec<Appeal>, ServerError> {
        let status = status
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse::<AppealStatus>()
                    .map_err(|_| ServerError::BadRequest(format!("unknown appeal status {s:?}")))
            })
            .transpose()?;
        Ok(self.db.lock().await.list_appeals(status)?)
    }
}

/// Write transaction that owns the database lock.
///
/// Dropping it without [`AppealTx::commit`] rolls back before the lock is
/// released, which also covers a request future cancelled mid-dispatch.
struct AppealTx<'a> {
    db: MutexGuard<'a, Database>,
    committed: bool,
}

impl<'a> AppealTx<'a> {
    fn begin(db: MutexGuard<'a, Database>) -> Result<Self, StoreError> {
        db.begin_immediate()?;
        Ok(Self {
            db,
            committed: false,
        })
    }

    fn commit(mut self) -> Result<(), StoreError> {
        self.db.commit()?;
        self.committed = true;
        Ok(())
    }
}

impl Deref for AppealTx<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

impl Drop for AppealTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.db.rollback() {
                warn!(error = %e, "Rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::{RecordingNotifier, StalledNotifier};
    use chrono::Duration;
    use tokio::sync::Mutex;
    use xposed_shared::types::{InstrumentType, Role, SubscriptionStatus};
    use xposed_store::{NewReview, StoreError, User};

    const NOTIFY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    struct Fixture {
        _dir: tempfile::TempDir,
        db: SharedDb,
        notifier: Arc<RecordingNotifier>,
        appeals: AppealService,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("appeals.db")).unwrap();
        let db: SharedDb = Arc::new(Mutex::new(db));
        let notifier = Arc::new(RecordingNotifier::default());
        let appeals = AppealService::new(db.clone(), notifier.clone(), NOTIFY_TIMEOUT);
        Fixture {
            _dir: dir,
            db,
            notifier,
            appeals,
        }
    }

    fn subscriber() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            role: Role::User,
            name: Some("Owner".into()),
            email: Some("owner@shop.example".into()),
            subscription_status: SubscriptionStatus::Active,
            subscription_expiry: Some(Utc::now() + Duration::days(30)),
        }
    }

    async fn seed_report(f: &Fixture, instrument: &str, reviews: u32) {
        let mut db = f.db.lock().await;
        for _ in 0..reviews {
            db.record_review(
                instrument,
                InstrumentType::FraudulentEmail,
                &NewReview {
                    user_id: Uuid::new_v4(),
                    description: "scam".into(),
                    aliases: vec![],
                },
                Utc::now(),
            )
            .unwrap();
        }
    }

    async fn register(f: &Fixture, p: &Principal) {
        f.db.lock()
            .await
            .upsert_user(&User {
                id: p.user_id,
                role: p.role,
                name: p.name.clone(),
                email: p.email.clone(),
                subscription_status: p.subscription_status,
                subscription_expiry: p.subscription_expiry,
                last_seen_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn submission_requires_subscription() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 1).await;
        let lapsed = Principal {
            subscription_expiry: Some(Utc::now() - Duration::days(1)),
            ..subscriber()
        };
        assert!(matches!(
            f.appeals.submit(&lapsed, "shop@x.com", "mistaken", None).await,
            Err(ServerError::SubscriptionRequired)
        ));
        assert_eq!(f.db.lock().await.count_appeals().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_instrument_creates_nothing() {
        let f = fixture();
        assert!(matches!(
            f.appeals.submit(&subscriber(), "ghost@x.com", "mistaken", None).await,
            Err(ServerError::Store(StoreError::InstrumentNotFound))
        ));
        assert_eq!(f.db.lock().await.count_appeals().unwrap(), 0);
        assert_eq!(f.notifier.count(NotificationKind::AppealReceived), 0);
    }

    #[tokio::test]
    async fn duplicate_appeal_persists_one() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 1).await;
        let p = subscriber();

        f.appeals
            .submit(&p, "shop@x.com", "mistaken", Some("receipt"))
            .await
            .unwrap();
        assert!(matches!(
            f.appeals.submit(&p, "shop@x.com", "again", None).await,
            Err(ServerError::Store(StoreError::DuplicateAppeal))
        ));
        assert_eq!(f.db.lock().await.count_appeals().unwrap(), 1);
        assert_eq!(f.notifier.count(NotificationKind::AppealReceived), 1);
    }

    #[tokio::test]
    async fn failed_notification_rolls_back_appeal() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 1).await;
        f.notifier.fail_kind(NotificationKind::AppealReceived);
        let p = subscriber();

        assert!(matches!(
            f.appeals.submit(&p, "shop@x.com", "mistaken", None).await,
            Err(ServerError::Notify(_))
        ));
        assert_eq!(f.db.lock().await.count_appeals().unwrap(), 0);

        // The connection is usable again and a retry can succeed.
        f.db.lock().await.count_all().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let retry = AppealService::new(f.db.clone(), notifier, NOTIFY_TIMEOUT);
        retry.submit(&p, "shop@x.com", "mistaken", None).await.unwrap();
        assert_eq!(f.db.lock().await.count_appeals().unwrap(), 1);
    }

    #[tokio::test]
    async fn approval_hides_public_report_and_notifies() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 60).await;
        let p = subscriber();
        register(&f, &p).await;

        let appeal = f
            .appeals
            .submit(&p, "shop@x.com", "we are legit", None)
            .await
            .unwrap();
        let resolution = f.appeals.resolve(appeal.id, "approve").await.unwrap();

        assert_eq!(resolution.appeal.status, AppealStatus::Approved);
        let report = resolution.report.unwrap();
        assert_eq!(report.review_count, 60);
        assert!(!report.is_public);
        assert_eq!(f.notifier.recipients(NotificationKind::AppealResolved), vec![p.user_id]);

        assert!(matches!(
            f.appeals.resolve(appeal.id, "reject").await,
            Err(ServerError::Store(StoreError::Appeal(_)))
        ));
    }

    #[tokio::test]
    async fn resolve_errors() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 1).await;
        let appeal = f
            .appeals
            .submit(&subscriber(), "shop@x.com", "mistaken", None)
            .await
            .unwrap();

        assert!(matches!(
            f.appeals.resolve(appeal.id, "escalate").await,
            Err(ServerError::Store(StoreError::Appeal(_)))
        ));
        assert!(matches!(
            f.appeals.resolve(Uuid::new_v4(), "reject").await,
            Err(ServerError::Store(StoreError::AppealNotFound))
        ));

        let resolution = f.appeals.resolve(appeal.id, "reject").await.unwrap();
        assert_eq!(resolution.appeal.status, AppealStatus::Rejected);
        assert!(resolution.report.is_none());

        assert_eq!(f.appeals.list(Some("rejected")).await.unwrap().len(), 1);
        assert!(f.appeals.list(Some("pending")).await.unwrap().is_empty());
        assert!(matches!(
            f.appeals.list(Some("lost")).await,
            Err(ServerError::BadRequest(_))
        ));
    }

    fn record_one(db: &mut Database, instrument: &str) {
        db.record_review(
            instrument,
            InstrumentType::FraudulentEmail,
            &NewReview {
                user_id: Uuid::new_v4(),
                description: "scam".into(),
                aliases: vec![],
            },
            Utc::now(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn slow_notifier_times_out_and_rolls_back() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 1).await;
        let stalled = AppealService::new(
            f.db.clone(),
            Arc::new(StalledNotifier),
            std::time::Duration::from_millis(50),
        );

        let started = std::time::Instant::now();
        let result = stalled.submit(&subscriber(), "shop@x.com", "mistaken", None).await;
        assert!(matches!(
            result,
            Err(ServerError::Notify(NotifyError::Timeout(_)))
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        let mut db = f.db.lock().await;
        assert!(db.conn().is_autocommit());
        assert_eq!(db.count_appeals().unwrap(), 0);
        record_one(&mut db, "shop@x.com");
    }

    #[tokio::test]
    async fn cancelled_submission_releases_transaction() {
        let f = fixture();
        seed_report(&f, "shop@x.com", 1).await;
        let stalled = AppealService::new(f.db.clone(), Arc::new(StalledNotifier), NOTIFY_TIMEOUT);
        let p = subscriber();

        // Drop the request future while it waits on dispatch.
        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            stalled.submit(&p, "shop@x.com", "mistaken", None),
        )
        .await;
        assert!(cancelled.is_err());

        {
            let mut db = f.db.lock().await;
            assert!(db.conn().is_autocommit());
            assert_eq!(db.count_appeals().unwrap(), 0);
            record_one(&mut db, "shop@x.com");
        }

        f.appeals.submit(&p, "shop@x.com", "mistaken", None).await.unwrap();
        assert_eq!(f.db.lock().await.count_appeals().unwrap(), 1);
    }
}
