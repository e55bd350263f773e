use std::future::Future;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use xposed_shared::constants::{AUTO_VERIFY_THRESHOLD, HIGH_RISK_THRESHOLD, PUBLIC_THRESHOLD};
use xposed_shared::types::InstrumentType;
use xposed_store::{Appeal, AppealResolution, Page, Report, ThreatStats, WatchlistEntry};

use crate::auth::{AdminUser, AuthUser, MaybeUser};
use crate::error::ServerError;
use crate::reports::SearchResult;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/reports", post(report_instrument).get(list_public_reports))
        .route("/reports/admin", get(list_all_reports))
        .route("/reports/types", get(instrument_types))
        .route("/reports/stats/total", get(threat_stats))
        .route("/search", post(search_instrument))
        .route("/appeals", post(submit_appeal).get(list_appeals))
        .route("/appeals/:id", post(resolve_appeal))
        .route("/admin/reports/:id/verify", put(verify_report))
        .route("/admin/reports/:id/visibility", put(set_visibility))
        .route("/watchlist", post(add_watch).get(list_watches))
        .route("/watchlist/:id", delete(remove_watch))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Extraction helpers ───

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ServerError> {
    params
        .map(|Query(q)| q)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ServerError> {
    id.map(|Path(id)| id)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

// ─── Request / response bodies ───

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    public_threshold: u32,
    high_risk_threshold: u32,
    auto_verify_threshold: u32,
    max_page_size: u32,
}

/// Derived fields sent by clients (`isPublic`, `riskLevel`, ...) are not
/// part of this struct and are ignored.
#[derive(Deserialize)]
struct ReportRequest {
    instrument: String,
    #[serde(rename = "type")]
    instrument_type: String,
    description: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    report: Report,
    is_new_threat: bool,
}

#[derive(Deserialize)]
struct PublicReportsQuery {
    #[serde(rename = "type")]
    instrument_type: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct AllReportsQuery {
    #[serde(rename = "type")]
    instrument_type: Option<String>,
    instrument: Option<String>,
}

#[derive(Serialize)]
struct InstrumentTypeResponse {
    value: InstrumentType,
    label: &'static str,
}

#[derive(Deserialize)]
struct SearchRequest {
    instrument: String,
    #[serde(rename = "type")]
    instrument_type: String,
}

#[derive(Deserialize)]
struct AppealRequest {
    instrument: String,
    reason: String,
    evidence: Option<String>,
}

#[derive(Deserialize)]
struct ResolveAppealRequest {
    action: String,
}

#[derive(Deserialize)]
struct AppealsQuery {
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisibilityRequest {
    force_public: bool,
}

#[derive(Deserialize)]
struct WatchRequest {
    category: String,
}

// ─── Handlers ───

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        public_threshold: PUBLIC_THRESHOLD,
        high_risk_threshold: HIGH_RISK_THRESHOLD,
        auto_verify_threshold: AUTO_VERIFY_THRESHOLD,
        max_page_size: state.config.max_page_size,
    })
}

async fn report_instrument(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportResponse>), ServerError> {
    let req = json_body(payload)?;
    let outcome = state
        .reports
        .report_instrument(
            &principal,
            &req.instrument,
            &req.instrument_type,
            &req.description,
            req.aliases,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReportResponse {
            report: outcome.report,
            is_new_threat: outcome.is_new_threat,
        }),
    ))
}

async fn list_public_reports(
    State(state): State<AppState>,
    params: Result<Query<PublicReportsQuery>, QueryRejection>,
) -> Result<Json<Page<Report>>, ServerError> {
    let q = query(params)?;
    let page = state
        .reports
        .fetch_public(q.instrument_type.as_deref(), q.page, q.limit)
        .await?;
    Ok(Json(page))
}

async fn list_all_reports(
    State(state): State<AppState>,
    _admin: AdminUser,
    params: Result<Query<AllReportsQuery>, QueryRejection>,
) -> Result<Json<Vec<Report>>, ServerError> {
    let q = query(params)?;
    let reports = state
        .reports
        .fetch_all(q.instrument_type.as_deref(), q.instrument.as_deref())
        .await?;
    Ok(Json(reports))
}

async fn instrument_types() -> Json<Vec<InstrumentTypeResponse>> {
    Json(
        InstrumentType::ALL
            .into_iter()
            .map(|t| InstrumentTypeResponse {
                value: t,
                label: t.label(),
            })
            .collect(),
    )
}

async fn threat_stats(State(state): State<AppState>) -> Result<Json<ThreatStats>, ServerError> {
    Ok(Json(state.reports.stats().await?))
}

async fn search_instrument(
    State(state): State<AppState>,
    MaybeUser(principal): MaybeUser,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResult>, ServerError> {
    let req = json_body(payload)?;
    let result = state
        .reports
        .search(&req.instrument, &req.instrument_type, principal.as_ref())
        .await?;
    Ok(Json(result))
}

async fn submit_appeal(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<AppealRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Appeal>), ServerError> {
    let req = json_body(payload)?;
    let appeal = state
        .appeals
        .submit(&principal, &req.instrument, &req.reason, req.evidence.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(appeal)))
}

async fn list_appeals(
    State(state): State<AppState>,
    _admin: AdminUser,
    params: Result<Query<AppealsQuery>, QueryRejection>,
) -> Result<Json<Vec<Appeal>>, ServerError> {
    let q = query(params)?;
    Ok(Json(state.appeals.list(q.status.as_deref()).await?))
}

async fn resolve_appeal(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ResolveAppealRequest>, JsonRejection>,
) -> Result<Json<AppealResolution>, ServerError> {
    let id = path_id(id)?;
    let req = json_body(payload)?;
    info!(admin_id = %admin.user_id, appeal_id = %id, action = %req.action, "Resolving appeal");
    Ok(Json(state.appeals.resolve(id, &req.action).await?))
}

async fn verify_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Report>, ServerError> {
    let id = path_id(id)?;
    Ok(Json(state.admin.verify_threat(id).await?))
}

async fn set_visibility(
    State(state): State<AppState>,
    _admin: AdminUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<VisibilityRequest>, JsonRejection>,
) -> Result<Json<Report>, ServerError> {
    let id = path_id(id)?;
    let req = json_body(payload)?;
    Ok(Json(state.admin.set_visibility(id, req.force_public).await?))
}

async fn add_watch(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<WatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WatchlistEntry>), ServerError> {
    let req = json_body(payload)?;
    let entry = state.watchlist.add(&principal, &req.category).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_watches(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<WatchlistEntry>>, ServerError> {
    Ok(Json(state.watchlist.list(&principal).await?))
}

async fn remove_watch(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let id = path_id(id)?;
    state.watchlist.remove(&principal, id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn serve(
    state: AppState,
    addr: std::net::SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use xposed_shared::identity::{issue_principal_token, Principal, PrincipalClaims};
    use xposed_shared::types::{Role, SubscriptionStatus};
    use xposed_store::Database;

    use super::*;
    use crate::config::ServerConfig;
    use crate::notify::testing::RecordingNotifier;
    use crate::notify::NotificationKind;

    struct TestApp {
        _dir: tempfile::TempDir,
        router: Router,
        key: SigningKey,
        notifier: Arc<RecordingNotifier>,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::open_at(&dir.path().join("api.db")).unwrap();
            let key = SigningKey::generate(&mut OsRng);
            let config = ServerConfig {
                identity_pubkey: key.verifying_key().to_bytes(),
                ..ServerConfig::default()
            };
            let notifier = Arc::new(RecordingNotifier::default());
            let state = AppState::new(db, notifier.clone(), config);
            Self {
                _dir: dir,
                router: build_router(state),
                key,
                notifier,
            }
        }

        fn token(&self, principal: &Principal) -> String {
            let claims = PrincipalClaims {
                principal: principal.clone(),
                expires_at: Utc::now() + Duration::hours(1),
            };
            issue_principal_token(&claims, &self.key).unwrap()
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            principal: Option<&Principal>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(p) = principal {
                builder = builder.header("authorization", format!("Bearer {}", self.token(p)));
            }
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn report(&self, p: &Principal, instrument: &str, kind: &str) -> (StatusCode, Value) {
            self.call(
                Method::POST,
                "/reports",
                Some(p),
                Some(json!({
                    "instrument": instrument,
                    "type": kind,
                    "description": "took my money",
                    "aliases": ["alt@x.com"],
                })),
            )
            .await
        }
    }

    fn user() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            role: Role::User,
            name: None,
            email: None,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_expiry: None,
        }
    }

    fn subscriber() -> Principal {
        Principal {
            subscription_status: SubscriptionStatus::Active,
            subscription_expiry: Some(Utc::now() + Duration::days(30)),
            ..user()
        }
    }

    fn admin() -> Principal {
        Principal {
            role: Role::Admin,
            ..user()
        }
    }

    #[tokio::test]
    async fn health_and_types() {
        let app = TestApp::new();
        let (status, body) = app.call(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = app.call(Method::GET, "/reports/types", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 4);
        assert_eq!(body[0]["value"], "fraudulent-phone");
    }

    #[tokio::test]
    async fn report_requires_valid_token() {
        let app = TestApp::new();
        let body = json!({
            "instrument": "scam@x.com",
            "type": "fraudulent-email",
            "description": "asked for my PIN",
        });

        let (status, err) = app
            .call(Method::POST, "/reports", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(err["error"], "Unauthenticated");

        let forged = TestApp::new().token(&user());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/reports")
            .header("authorization", format!("Bearer {forged}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn report_flow_and_errors() {
        let app = TestApp::new();
        let alice = user();

        let (status, body) = app.report(&alice, "scam@x.com", "fraudulent-email").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["isNewThreat"], true);
        assert_eq!(body["report"]["reviewCount"], 1);
        assert_eq!(body["report"]["riskLevel"], "low");
        assert_eq!(body["report"]["isPublic"], false);

        let (status, body) = app.report(&alice, "scam@x.com", "fraudulent-email").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "DuplicateReview");

        let (status, body) = app.report(&user(), "scam@x.com", "fraudulent-phone").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidInstrument");

        let (status, body) = app.report(&user(), "scam@x.com", "carrier-pigeon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidInstrumentType");

        let (status, body) = app.report(&user(), "Scam Corp", "fraudulent-business").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["report"]["type"], "fraudulent-business");

        for body in [
            json!({ "instrument": "other@x.com", "type": "fraudulent-email" }),
            json!({ "instrument": "other@x.com", "type": "fraudulent-email", "description": "" }),
        ] {
            let (status, err) = app
                .call(Method::POST, "/reports", Some(&user()), Some(body))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(err["error"], "BadRequest");
        }
    }

    #[tokio::test]
    async fn client_supplied_derived_fields_are_ignored() {
        let app = TestApp::new();
        let (status, body) = app
            .call(
                Method::POST,
                "/reports",
                Some(&user()),
                Some(json!({
                    "instrument": "https://phish.example.com",
                    "type": "fraudulent-website",
                    "description": "phishing",
                    "isPublic": true,
                    "riskLevel": "high",
                    "verificationStatus": "verified",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["report"]["isPublic"], false);
        assert_eq!(body["report"]["riskLevel"], "low");
        assert_eq!(body["report"]["verificationStatus"], "unverified");
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let app = TestApp::new();
        let (status, _) = app.call(Method::GET, "/reports/admin", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .call(Method::GET, "/reports/admin", Some(&user()), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden");

        let (status, body) = app
            .call(Method::GET, "/reports/admin", Some(&admin()), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn force_public_then_verify_twice() {
        let app = TestApp::new();
        let admin = admin();
        let (_, body) = app.report(&user(), "Fake Charity", "fraudulent-business").await;
        let id = body["report"]["id"].as_str().unwrap().to_string();

        let (status, report) = app
            .call(
                Method::PUT,
                &format!("/admin/reports/{id}/visibility"),
                Some(&admin),
                Some(json!({ "forcePublic": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["isPublic"], true);
        assert_eq!(report["riskLevel"], "low");
        assert_eq!(report["reviewCount"], 1);

        let uri = format!("/admin/reports/{id}/verify");
        let (s1, first) = app.call(Method::PUT, &uri, Some(&admin), None).await;
        let (s2, second) = app.call(Method::PUT, &uri, Some(&admin), None).await;
        assert_eq!((s1, s2), (StatusCode::OK, StatusCode::OK));
        assert_eq!(first["verificationStatus"], "verified");
        assert_eq!(second["verificationStatus"], "verified");
        assert_eq!(first["isPublic"], second["isPublic"]);

        let (status, body) = app
            .call(
                Method::PUT,
                &format!("/admin/reports/{}/verify", Uuid::new_v4()),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "ReportNotFound");

        let (_, page) = app.call(Method::GET, "/reports?page=1&limit=5", None, None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["currentPage"], 1);
        assert_eq!(page["data"][0]["instrument"], "Fake Charity");

        let (_, stats) = app.call(Method::GET, "/reports/stats/total", None, None).await;
        assert_eq!(
            stats,
            json!({ "totalThreats": 1, "publicThreats": 1, "verifiedThreats": 1 })
        );
    }

    #[tokio::test]
    async fn appeal_lifecycle() {
        let app = TestApp::new();
        let owner = subscriber();
        let admin = admin();
        app.report(&user(), "shop@x.com", "fraudulent-email").await;

        let appeal_body = json!({ "instrument": "shop@x.com", "reason": "we are legit" });

        let (status, body) = app
            .call(Method::POST, "/appeals", Some(&user()), Some(appeal_body.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "SubscriptionRequired");

        let (status, body) = app
            .call(
                Method::POST,
                "/appeals",
                Some(&owner),
                Some(json!({ "instrument": "ghost@x.com", "reason": "never reported" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "InstrumentNotFound");

        let (status, appeal) = app
            .call(Method::POST, "/appeals", Some(&owner), Some(appeal_body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(appeal["status"], "pending");

        let (status, body) = app
            .call(Method::POST, "/appeals", Some(&owner), Some(appeal_body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "DuplicateAppeal");

        let (_, listed) = app
            .call(Method::GET, "/appeals?status=pending", Some(&admin), None)
            .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let uri = format!("/appeals/{}", appeal["id"].as_str().unwrap());
        let (status, body) = app
            .call(Method::POST, &uri, Some(&admin), Some(json!({ "action": "shrug" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidAction");

        let (status, body) = app
            .call(Method::POST, &uri, Some(&admin), Some(json!({ "action": "approve" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["appeal"]["status"], "approved");
        assert_eq!(body["report"]["isPublic"], false);

        let (status, body) = app
            .call(Method::POST, &uri, Some(&admin), Some(json!({ "action": "reject" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "AppealAlreadyResolved");

        assert_eq!(app.notifier.count(NotificationKind::AppealReceived), 1);
        assert_eq!(
            app.notifier.recipients(NotificationKind::AppealResolved),
            vec![owner.user_id]
        );
    }

    #[tokio::test]
    async fn watchlist_routes() {
        let app = TestApp::new();
        let alice = user();

        let (status, entry) = app
            .call(
                Method::POST,
                "/watchlist",
                Some(&alice),
                Some(json!({ "category": "fraudulent-website" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(entry["category"], "fraudulent-website");

        let (status, body) = app
            .call(
                Method::POST,
                "/watchlist",
                Some(&alice),
                Some(json!({ "category": "fraudulent-website" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "DuplicateWatch");

        let (_, list) = app.call(Method::GET, "/watchlist", Some(&alice), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let uri = format!("/watchlist/{}", entry["id"].as_str().unwrap());
        let (status, body) = app.call(Method::DELETE, &uri, Some(&user()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "NotOwner");

        let (status, _) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "WatchlistEntryNotFound");
    }

    #[tokio::test]
    async fn search_route() {
        let app = TestApp::new();
        let (_, body) = app.report(&user(), "+44 20 7946 0000", "fraudulent-phone").await;
        let id = body["report"]["id"].as_str().unwrap().to_string();
        let query = json!({ "instrument": "+44 20 7946 0000", "type": "fraudulent-phone" });

        let (status, summary) = app
            .call(Method::POST, "/search", None, Some(query.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["reviewCount"], 1);
        assert!(summary.get("reviews").is_none());

        app.call(
            Method::PUT,
            &format!("/admin/reports/{id}/visibility"),
            Some(&admin()),
            Some(json!({ "forcePublic": true })),
        )
        .await;

        let (status, _) = app
            .call(Method::POST, "/search", None, Some(query.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, full) = app
            .call(Method::POST, "/search", Some(&subscriber()), Some(query))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(full["reviews"].as_array().unwrap().len(), 1);

        let (status, body) = app
            .call(
                Method::POST,
                "/search",
                None,
                Some(json!({ "instrument": "+1 000", "type": "fraudulent-phone" })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "InstrumentNotFound");
    }

    #[tokio::test]
    async fn malformed_bodies_get_error_shape() {
        let app = TestApp::new();
        let (status, body) = app
            .call(Method::POST, "/reports", Some(&user()), Some(json!({ "type": 7 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BadRequest");

        let (status, body) = app
            .call(Method::PUT, "/admin/reports/not-a-uuid/verify", Some(&admin()), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "BadRequest");
    }
}
