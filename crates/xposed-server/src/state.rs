//! Application state shared by every request handler.

use std::sync::Arc;

use tokio::sync::Mutex;

use xposed_store::Database;

use crate::admin::AdminService;
use crate::appeals::AppealService;
use crate::config::ServerConfig;
use crate::notify::Notifier;
use crate::reports::ReportService;
use crate::watchlist::WatchlistService;

/// The single database handle, opened once at start-up.
///
/// `Connection` is `Send` but not `Sync`; the async mutex serialises access
/// and may be held across an `.await` when a write must wait on dispatch.
pub type SharedDb = Arc<Mutex<Database>>;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub reports: Arc<ReportService>,
    pub appeals: Arc<AppealService>,
    pub watchlist: Arc<WatchlistService>,
    pub admin: Arc<AdminService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire the services around one database and one notifier.
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, config: ServerConfig) -> Self {
        let db: SharedDb = Arc::new(Mutex::new(db));
        let config = Arc::new(config);

        let watchlist = Arc::new(WatchlistService::new(db.clone(), notifier.clone()));
        let reports = Arc::new(ReportService::new(
            db.clone(),
            notifier.clone(),
            watchlist.clone(),
            config.max_page_size,
        ));
        let appeals = Arc::new(AppealService::new(
            db.clone(),
            notifier,
            config.notify_timeout,
        ));
        let admin = Arc::new(AdminService::new(db.clone(), watchlist.clone()));

        Self {
            db,
            reports,
            appeals,
            watchlist,
            admin,
            config,
        }
    }
}
