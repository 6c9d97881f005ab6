use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use meter_client::{domain::CompanyProfile, Device};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

use super::{ApiError, AppState};
use crate::{
    mutations::{self, UserDraft},
    reducers::{
        dashboard_stats, notifications as alert_notifications, report_rows, user_rows, DashboardStats,
        Notifications, ReportQuery, ReportRow, StatusFilter, UserRow,
    },
    normalize::Normalizer,
    sync::{CollectionState, LiveCollection},
};

/// Upper bound on waiting for a collection that is (re)opening.
const LOAD_WAIT: Duration = Duration::from_secs(2);

/// A reducer result together with the state of the subscription it came from.
#[derive(Debug, Serialize)]
pub struct View<T> {
    pub loading: bool,
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

fn view<T, U>(state: &CollectionState<T>, reduce: impl FnOnce(&T) -> U) -> View<U> {
    View {
        loading: state.loading,
        error: state.error.clone(),
        body: reduce(&state.data),
    }
}

/// Current state of `collection`. A failed subscription is reopened, and a
/// collection still loading is given up to [`LOAD_WAIT`] to deliver.
async fn loaded<N: Normalizer + Default>(collection: &LiveCollection<N>) -> CollectionState<N::Output> {
    let lease = collection.lease().await;
    let mut rx = lease.watch();
    if tokio::time::timeout(LOAD_WAIT, rx.wait_for(|s| !s.loading)).await.is_err() {
        tracing::warn!(path = lease.path(), "collection still loading");
    }
    lease.current()
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn stats(State(state): State<AppState>) -> Json<View<DashboardStats>> {
    Json(view(&loaded(&state.devices).await, |d| dashboard_stats(d)))
}

pub async fn notifications(State(state): State<AppState>) -> Json<View<Notifications>> {
    let limit = state.alert_limit;
    Json(view(&loaded(&state.devices).await, |d| alert_notifications(d, limit)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub search: Option<String>,
    pub status: Option<String>,
}

impl TryFrom<ReportParams> for ReportQuery {
    type Error = ApiError;

    fn try_from(p: ReportParams) -> Result<Self, Self::Error> {
        let status = match p.status.as_deref() {
            None | Some("") => StatusFilter::All,
            Some(label) => label
                .parse::<StatusFilter>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        };
        Ok(Self {
            search: p.search.unwrap_or_default(),
            status,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ReportView {
    /// Unfiltered record count.
    pub total_records: usize,
    pub rows: Vec<ReportRow>,
}

pub async fn reports(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<View<ReportView>>, ApiError> {
    let query = ReportQuery::try_from(params)?;
    let today = OffsetDateTime::now_utc().date();

    Ok(Json(view(&loaded(&state.devices).await, |d| ReportView {
        total_records: d.len(),
        rows: report_rows(d, &query, today),
    })))
}

#[derive(Debug, Serialize)]
pub struct UsersView {
    pub users: Vec<UserRow>,
}

pub async fn list_users(State(state): State<AppState>) -> Json<View<UsersView>> {
    Json(view(&loaded(&state.devices).await, |d| UsersView { users: user_rows(d) }))
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub id: String,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(draft): Json<UserDraft>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let id = mutations::create_user(state.store.as_ref(), &draft).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// Fields of a user edit. Omitted fields keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub serial: Option<String>,
}

impl UserEdit {
    fn apply(self, draft: &mut UserDraft) {
        let fields = [
            (self.name, &mut draft.name),
            (self.email, &mut draft.email),
            (self.contact_number, &mut draft.contact_number),
            (self.address, &mut draft.address),
            (self.serial, &mut draft.serial),
        ];
        for (value, slot) in fields {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

async fn find_device(state: &AppState, id: &str) -> Result<Device, ApiError> {
    let current = loaded(&state.devices).await;
    if let Some(e) = current.error {
        return Err(ApiError::Unavailable(e));
    }
    if current.loading {
        return Err(ApiError::Unavailable("device list has not loaded yet".to_string()));
    }
    current
        .data
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("no user with id '{id}'")))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edit): Json<UserEdit>,
) -> Result<StatusCode, ApiError> {
    let current = find_device(&state, &id).await?;
    let mut draft = UserDraft::from_device(&current);
    edit.apply(&mut draft);

    mutations::update_user(state.store.as_ref(), &id, &draft).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    find_device(&state, &id).await?;
    mutations::delete_user(state.store.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_profile(State(state): State<AppState>) -> Json<View<CompanyProfile>> {
    Json(view(&loaded(&state.profile).await, CompanyProfile::clone))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
    pub name: String,
    pub address: String,
    pub email: String,
}

pub async fn save_profile(
    State(state): State<AppState>,
    Json(input): Json<ProfileInput>,
) -> Result<StatusCode, ApiError> {
    let profile = CompanyProfile {
        admin_id: state.admin_id.clone(),
        name: input.name,
        address: input.address,
        email: input.email,
    };
    mutations::save_profile(state.store.as_ref(), &profile).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request},
        Router,
    };
    use meter_client::{
        store::{COMPANY_PROFILE_PATH, DEVICES_PATH},
        LiveStore, MemoryStore,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        api::router,
        normalize::{DeviceNormalizer, ProfileNormalizer},
        sync::LiveCollection,
    };

    struct Harness {
        store: Arc<MemoryStore>,
        state: AppState,
    }

    impl Harness {
        async fn new(root: Value) -> Self {
            let store = Arc::new(MemoryStore::with_root(root));
            let dyn_store: Arc<dyn LiveStore> = store.clone();
            let devices = Arc::new(LiveCollection::<DeviceNormalizer>::open(dyn_store.clone(), DEVICES_PATH).await);
            let profile =
                Arc::new(LiveCollection::<ProfileNormalizer>::open(dyn_store.clone(), COMPANY_PROFILE_PATH).await);
            loaded(&devices).await;
            loaded(&profile).await;

            let state = AppState {
                store: dyn_store,
                devices,
                profile,
                alert_limit: 2,
                admin_id: "110A".to_string(),
            };
            Self { store, state }
        }

        fn app(&self) -> Router {
            router(self.state.clone())
        }

        async fn after_next_snapshot(&self, revision: u64) {
            let mut rx = self.state.devices.lease().await.watch();
            rx.wait_for(|s| s.revision > revision).await.unwrap();
        }
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn two_meters() -> Value {
        json!({
            "devices": {
                "A1": { "Name": "Sita", "Address": "Kathmandu", "tampering": "true:", "kwh": 12 },
                "B2": { "Name": "Ram", "Address": "Lalitpur", "OUTAGE": "true: ", "Paid Status": true }
            }
        })
    }

    #[tokio::test]
    async fn stats_reflect_the_live_collection() {
        let h = Harness::new(two_meters()).await;
        let (status, body) = send(h.app(), "GET", "/api/dashboard/stats", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["loading"], false);
        assert_eq!(body["total"], 2);
        assert_eq!(body["tampered"], 1);
        assert_eq!(body["tampered_pct"], 50);
        assert_eq!(body["outage_pct"], 50);
    }

    #[tokio::test]
    async fn notifications_list_both_kinds() {
        let h = Harness::new(two_meters()).await;
        let (_, body) = send(h.app(), "GET", "/api/dashboard/notifications", None).await;

        assert_eq!(body["tampering"][0]["meter_id"], "A1");
        assert_eq!(body["outages"][0]["location"], "Lalitpur");
        assert_eq!(body["has_active_alerts"], true);
    }

    #[tokio::test]
    async fn reports_filter_by_search_and_status() {
        let h = Harness::new(two_meters()).await;

        let (status, body) = send(h.app(), "GET", "/api/reports?status=Paid", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_records"], 2);
        assert_eq!(body["rows"].as_array().unwrap().len(), 1);
        assert_eq!(body["rows"][0]["meter_number"], "B2");

        let (_, body) = send(h.app(), "GET", "/api/reports?search=kath", None).await;
        assert_eq!(body["rows"][0]["reading"], "12 kWh");
        assert_eq!(body["rows"][0]["tampering"], "Tampering Detected");
    }

    #[tokio::test]
    async fn unknown_status_filter_is_a_bad_request() {
        let h = Harness::new(two_meters()).await;
        let (status, body) = send(h.app(), "GET", "/api/reports?status=Broken", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn create_then_list() {
        let h = Harness::new(json!({})).await;
        let (status, body) = send(
            h.app(),
            "POST",
            "/api/users",
            Some(json!({ "name": "Gita", "email": "gita@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        h.after_next_snapshot(1).await;
        let (_, body) = send(h.app(), "GET", "/api/users", None).await;
        assert_eq!(body["users"][0]["id"], id.as_str());
        assert_eq!(body["users"][0]["status"], "Active");
        assert_eq!(body["users"][0]["address"], "N/A");
    }

    #[tokio::test]
    async fn create_without_name_is_unprocessable() {
        let h = Harness::new(json!({})).await;
        let (status, body) = send(h.app(), "POST", "/api/users", Some(json!({ "email": "x@example.com" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "validation_failed");
        assert_eq!(h.store.value_at(DEVICES_PATH), None);
    }

    #[tokio::test]
    async fn partial_edit_keeps_other_fields() {
        let h = Harness::new(json!({
            "devices": { "K": { "Name": "Old", "Email": "o@example.com", "Address": "Kathmandu", "Serial": "SN-1" } }
        }))
        .await;

        let (status, _) = send(h.app(), "PUT", "/api/users/K", Some(json!({ "name": "New" }))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let stored = h.store.value_at("devices/K").unwrap();
        assert_eq!(stored["Name"], "New");
        assert_eq!(stored["Address"], "Kathmandu");
        assert_eq!(stored["Serial"], "SN-1");
        assert_eq!(stored["role"], "User");
    }

    #[tokio::test]
    async fn edit_or_delete_of_unknown_id_is_not_found() {
        let h = Harness::new(two_meters()).await;
        let (status, _) = send(h.app(), "PUT", "/api/users/ZZ", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(h.app(), "DELETE", "/api/users/ZZ", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_drops_the_record_on_next_snapshot() {
        let h = Harness::new(two_meters()).await;
        let (status, _) = send(h.app(), "DELETE", "/api/users/A1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        h.after_next_snapshot(1).await;
        let (_, body) = send(h.app(), "GET", "/api/users", None).await;
        let ids: Vec<&str> = body["users"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|u| u["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["B2"]);
    }

    #[tokio::test]
    async fn store_write_failure_is_bad_gateway() {
        let h = Harness::new(two_meters()).await;
        h.store.fail_next_write("permission denied");
        let (status, body) = send(h.app(), "DELETE", "/api/users/A1", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "store_error");
    }

    #[tokio::test]
    async fn profile_defaults_then_saves_with_configured_admin_id() {
        let h = Harness::new(json!({})).await;
        let (_, body) = send(h.app(), "GET", "/api/profile", None).await;
        assert_eq!(body["adminId"], "110A");
        assert_eq!(body["name"], "");

        let (status, _) = send(
            h.app(),
            "PUT",
            "/api/profile",
            Some(json!({ "name": "ElectriTrack", "email": "ops@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            h.store.value_at(COMPANY_PROFILE_PATH).unwrap(),
            json!({ "adminId": "110A", "name": "ElectriTrack", "address": "", "email": "ops@example.com" })
        );
    }

    #[tokio::test]
    async fn failed_subscription_is_reopened_by_the_next_request() {
        let h = Harness::new(two_meters()).await;
        let failed = h.state.devices.lease().await;
        h.store.emit_error(DEVICES_PATH, "stream closed");
        failed.watch().wait_for(|s| s.error.is_some()).await.unwrap();

        h.store
            .write_full("devices/C3", Some(json!({ "Name": "Hari", "Address": "Pokhara" })))
            .await
            .unwrap();

        let (_, body) = send(h.app(), "GET", "/api/dashboard/stats", None).await;
        assert_eq!(body["total"], 3);
        assert_eq!(body["error"], Value::Null);
        assert_eq!(body["loading"], false);

        let (status, _) = send(h.app(), "DELETE", "/api/users/C3", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(h.store.value_at("devices/C3"), None);
    }

    #[tokio::test]
    async fn health_is_plain_text() {
        let h = Harness::new(json!({})).await;
        let response = h
            .app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }
}
