//! Alpaca REST server.
//!
//! Telescope actions are served at `/api/v1/telescope/0/<action>`, plus the
//! Alpaca management endpoints, a JSON encoder monitor at `/encoders` and a
//! JSON profile setup API under `/setup/v1/telescope/0/`.
//! Device work runs on the blocking pool; the handlers only shuttle
//! parameters and responses.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::{
    extract::{rejection::FormRejection, ConnectInfo, Form, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::alpaca_errors::AlpacaError;
use crate::device::{DeviceError, TelescopeDevice};
use crate::dispatcher::{dispatch, ActionResponse, Verb};
use crate::profile::{EncodersProfile, Profile, ProfileError, SiteProfile};
use crate::properties::{DEVICE_DESCRIPTION, DEVICE_NAME, DRIVER_VERSION};
use crate::validation::Params;

/// Only one telescope is served.
const DEVICE_NUMBER: u32 = 0;
const UNIQUE_ID: &str = "5e6b2c1a-9f47-4d3b-8a21-0c7d4e9f1a35";

/// Command-line arguments for the HTTP listener.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(
        short = 'p',
        long,
        default_value = "8000",
        help = "HTTP server port",
        long_help = "TCP port for the Alpaca REST server. Clients address the telescope at \
            http://<bind_address>:<port>/api/v1/telescope/0/. Default: 8000."
    )]
    pub port: u16,

    #[arg(
        short = 'b',
        long = "bind",
        default_value = "127.0.0.1",
        help = "HTTP server bind address",
        long_help = "IP address to bind the HTTP server to. Use '0.0.0.0' to accept clients \
            from other machines, or '127.0.0.1' for localhost-only access."
    )]
    pub bind_address: String,
}

/// Shared server state.
pub struct AppState {
    pub device: Arc<TelescopeDevice>,
    location: RwLock<String>,
    transaction_id: AtomicU32,
}

impl AppState {
    pub fn new(device: Arc<TelescopeDevice>) -> Self {
        let location = device
            .profile()
            .map(|p| p.location.obsname)
            .unwrap_or_default();
        Self {
            device,
            location: RwLock::new(location),
            transaction_id: AtomicU32::new(0),
        }
    }

    fn location(&self) -> String {
        self.location
            .read()
            .map(|l| l.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn set_location(&self, obsname: &str) {
        let mut location = self.location.write().unwrap_or_else(|e| e.into_inner());
        *location = obsname.to_string();
    }

    /// Next server transaction id, starting at 1.
    pub fn next_transaction_id(&self) -> u32 {
        self.transaction_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }
}

/// Alpaca JSON envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlpacaResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "ClientTransactionID")]
    pub client_transaction_id: u32,
    #[serde(rename = "ServerTransactionID")]
    pub server_transaction_id: u32,
    pub error_number: i32,
    pub error_string: String,
}

impl AlpacaResponse {
    fn new(response: ActionResponse, client_transaction_id: u32, server_transaction_id: u32) -> Self {
        Self {
            value: response.value,
            client_transaction_id,
            server_transaction_id,
            error_number: response.error_number,
            error_string: response.error_string,
        }
    }
}

fn bad_device_number(device_number: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        format!("Invalid device number {device_number:?}, only device {DEVICE_NUMBER} exists"),
    )
        .into_response()
}

async fn handle_action(
    state: Arc<AppState>,
    verb: Verb,
    device_number: String,
    action: String,
    params: Params,
) -> Response {
    let server_id = state.next_transaction_id();
    if device_number.parse::<u32>().ok() != Some(DEVICE_NUMBER) {
        return bad_device_number(&device_number);
    }

    let client_tx = params.client_transaction_id();
    debug!(
        client_id = params.client_id(),
        client_transaction_id = client_tx,
        server_transaction_id = server_id,
        "{verb:?} {action}"
    );
    let device = state.device.clone();
    let response = tokio::task::spawn_blocking(move || dispatch(&device, verb, &action, &params))
        .await
        .unwrap_or_else(|e| {
            error!("Telescope action task failed: {e}");
            ActionResponse::error(AlpacaError::UnspecifiedError)
        });

    Json(AlpacaResponse::new(response, client_tx, server_id)).into_response()
}

async fn get_action(
    State(state): State<Arc<AppState>>,
    Path((device_number, action)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let params: Params = query.into_iter().collect();
    handle_action(state, Verb::Get, device_number, action, params).await
}

async fn put_action(
    State(state): State<Arc<AppState>>,
    Path((device_number, action)): Path<(String, String)>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    // A body that is not form-encoded still gets an Alpaca reply; the
    // command then sees no parameters.
    let params: Params = match form {
        Ok(Form(form)) => form.into_iter().collect(),
        Err(rejection) => {
            warn!("PUT {action} body rejected: {rejection}");
            Params::new()
        }
    };
    handle_action(state, Verb::Put, device_number, action, params).await
}

fn management_response(state: &AppState, query: HashMap<String, String>, value: Value) -> Response {
    let params: Params = query.into_iter().collect();
    let response = AlpacaResponse::new(
        ActionResponse::ok(value),
        params.client_transaction_id(),
        state.next_transaction_id(),
    );
    Json(response).into_response()
}

async fn api_versions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    management_response(&state, query, json!([1]))
}

async fn server_description(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let value = json!({
        "ServerName": "Alpaca DSC Server",
        "Manufacturer": "alpaca-dsc",
        "ManufacturerVersion": DRIVER_VERSION,
        "Location": state.location(),
    });
    management_response(&state, query, value)
}

async fn configured_devices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let value = json!([{
        "DeviceName": DEVICE_NAME,
        "DeviceType": "Telescope",
        "DeviceNumber": DEVICE_NUMBER,
        "UniqueID": UNIQUE_ID,
    }]);
    management_response(&state, query, value)
}

/// Raw counts and derived positions, for setup and debugging.
async fn encoder_status(State(state): State<Arc<AppState>>) -> Response {
    let device = state.device.clone();
    match tokio::task::spawn_blocking(move || device.status()).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            error!("Encoder status task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "encoder status unavailable").into_response()
        }
    }
}

/// Current profile and the choices a setup client can pick from.
#[derive(Debug, Serialize)]
pub struct SetupInfo {
    pub connected: bool,
    pub profile: Option<Profile>,
    pub profiles: Vec<String>,
    pub drivers: Vec<String>,
}

/// Body of the profile create and select requests.
#[derive(Debug, Deserialize)]
pub struct ProfileName {
    pub name: String,
}

fn setup_status(err: &DeviceError) -> StatusCode {
    match err {
        DeviceError::NoProfile | DeviceError::Connected | DeviceError::NoStore => {
            StatusCode::CONFLICT
        }
        DeviceError::Profile(ProfileError::NotFound(_)) => StatusCode::NOT_FOUND,
        DeviceError::Profile(e) if e.is_config() => StatusCode::BAD_REQUEST,
        DeviceError::Encoder(e) if e.is_config() => StatusCode::BAD_REQUEST,
        DeviceError::Site(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a profile change on the blocking pool and reply with the new profile.
async fn apply_setup<F>(state: Arc<AppState>, device_number: String, change: F) -> Response
where
    F: FnOnce(&TelescopeDevice) -> Result<Profile, DeviceError> + Send + 'static,
{
    if device_number.parse::<u32>().ok() != Some(DEVICE_NUMBER) {
        return bad_device_number(&device_number);
    }

    let device = state.device.clone();
    match tokio::task::spawn_blocking(move || change(&device)).await {
        Ok(Ok(profile)) => {
            state.set_location(&profile.location.obsname);
            Json(profile).into_response()
        }
        Ok(Err(e)) => {
            warn!("Setup change rejected: {e}");
            (setup_status(&e), e.to_string()).into_response()
        }
        Err(e) => {
            error!("Setup task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "setup task failed").into_response()
        }
    }
}

async fn get_setup(
    State(state): State<Arc<AppState>>,
    Path(device_number): Path<String>,
) -> Response {
    if device_number.parse::<u32>().ok() != Some(DEVICE_NUMBER) {
        return bad_device_number(&device_number);
    }

    let device = state.device.clone();
    let result = tokio::task::spawn_blocking(move || {
        device.stored_profiles().map(|profiles| SetupInfo {
            connected: device.is_connected(),
            profile: device.profile(),
            profiles,
            drivers: device.registry().names().into_iter().map(String::from).collect(),
        })
    })
    .await;

    match result {
        Ok(Ok(info)) => Json(info).into_response(),
        Ok(Err(e)) => (setup_status(&e), e.to_string()).into_response(),
        Err(e) => {
            error!("Setup task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "setup task failed").into_response()
        }
    }
}

async fn put_setup_encoders(
    State(state): State<Arc<AppState>>,
    Path(device_number): Path<String>,
    Json(encoders): Json<EncodersProfile>,
) -> Response {
    apply_setup(state, device_number, move |device| device.set_encoders(encoders)).await
}

async fn put_setup_location(
    State(state): State<Arc<AppState>>,
    Path(device_number): Path<String>,
    Json(site): Json<SiteProfile>,
) -> Response {
    apply_setup(state, device_number, move |device| device.set_location(site)).await
}

async fn select_profile(
    State(state): State<Arc<AppState>>,
    Path(device_number): Path<String>,
    Json(body): Json<ProfileName>,
) -> Response {
    apply_setup(state, device_number, move |device| device.select_profile(&body.name)).await
}

async fn create_profile(
    State(state): State<Arc<AppState>>,
    Path(device_number): Path<String>,
    Json(body): Json<ProfileName>,
) -> Response {
    apply_setup(state, device_number, move |device| device.create_profile(&body.name)).await
}

async fn index() -> impl IntoResponse {
    format!("{DEVICE_DESCRIPTION} Alpaca server {DRIVER_VERSION}\n")
}

/// Telescope action named by an Alpaca API path, lowercased.
fn alpaca_action(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/api/v1/telescope/")?;
    let (_, action) = rest.split_once('/')?;
    Some(action.to_ascii_lowercase())
}

async fn logging_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let action = alpaca_action(&path);
    // PUT carries ClientID in the body, which is logged by the handler instead.
    let client_id = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .ok()
        .map(|Query(query)| query.into_iter().collect::<Params>().client_id());

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    match action {
        Some(action) => info!(
            client = %addr.ip(),
            client_id = client_id.unwrap_or(0),
            status,
            "{method} {action} - {elapsed_ms:.1}ms"
        ),
        None => info!(
            client = %addr.ip(),
            status,
            "{method} {path} - {elapsed_ms:.1}ms"
        ),
    }

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route(
            "/api/v1/telescope/:device_number/:action",
            get(get_action).put(put_action),
        )
        .route("/management/apiversions", get(api_versions))
        .route("/management/v1/description", get(server_description))
        .route("/management/v1/configureddevices", get(configured_devices))
        .route("/encoders", get(encoder_status))
        .route("/setup/v1/telescope/:device_number/setup", get(get_setup))
        .route(
            "/setup/v1/telescope/:device_number/setup/encoders",
            put(put_setup_encoders),
        )
        .route(
            "/setup/v1/telescope/:device_number/setup/location",
            put(put_setup_location),
        )
        .route(
            "/setup/v1/telescope/:device_number/setup/profile",
            put(select_profile).post(create_profile),
        )
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
}

/// Serve on an already-bound listener until the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    Ok(())
}

pub async fn run_server(device: Arc<TelescopeDevice>, args: ServerArgs) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.bind_address, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Alpaca telescope server listening on http://{addr}");
    info!("Telescope endpoint: http://{addr}/api/v1/telescope/0/");

    serve(listener, Arc::new(AppState::new(device))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_field_names() {
        let resp = AlpacaResponse::new(ActionResponse::ok(json!(true)), 7, 3);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({
                "Value": true,
                "ClientTransactionID": 7,
                "ServerTransactionID": 3,
                "ErrorNumber": 0,
                "ErrorString": "",
            })
        );
    }

    #[test]
    fn test_alpaca_action_from_path() {
        assert_eq!(
            alpaca_action("/api/v1/telescope/0/SyncToAltAz").as_deref(),
            Some("synctoaltaz")
        );
        assert_eq!(alpaca_action("/management/apiversions"), None);
        assert_eq!(alpaca_action("/api/v1/telescope/0"), None);
    }

    #[test]
    fn test_setup_status_codes() {
        assert_eq!(setup_status(&DeviceError::Connected), StatusCode::CONFLICT);
        assert_eq!(
            setup_status(&ProfileError::NotFound("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            setup_status(&ProfileError::Invalid("bad".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            setup_status(&encoders::EncoderError::UnknownDriver("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_put_envelope_omits_value() {
        let resp = AlpacaResponse::new(ActionResponse::error(AlpacaError::NotConnected), 0, 1);
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("Value").is_none());
        assert_eq!(value["ErrorNumber"], 0x407);
        assert_eq!(value["ErrorString"], "Not connected");
    }
}
