//! End-to-end tests against a live server on an ephemeral port.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use alpaca_dsc::{serve, AppState, FixedClock, Profile, ProfileStore, TelescopeDevice};
use approx::assert_abs_diff_eq;
use encoders::{DriverRegistry, SimulatorEncoders, SimulatorHandle};
use ephemeris::SiderealTransform;
use serde_json::{json, Value};
use tempfile::TempDir;
use time::macros::datetime;
use tokio::net::TcpListener;

#[derive(Clone)]
struct TestServer {
    base: String,
    client: reqwest::Client,
    sim: SimulatorHandle,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(None).await
    }

    async fn start_with(store: Option<ProfileStore>) -> Self {
        let sim = SimulatorHandle::new();
        let shared = sim.clone();
        let mut registry = DriverRegistry::with_builtin_drivers();
        registry.register(SimulatorEncoders::NAME, move |config| {
            Box::new(SimulatorEncoders::with_handle(config, shared.clone()))
        });

        let mut profile = Profile::new("test");
        profile.location.obsname = "Test Site".to_string();
        profile.location.latitude = 35.0;
        profile.location.longitude = -106.5;

        let mut device = TelescopeDevice::new(
            registry,
            Arc::new(SiderealTransform::new()),
            Arc::new(FixedClock::new(datetime!(2024-03-20 04:00 UTC))),
        );
        if let Some(store) = store {
            store.save(&profile).unwrap();
            device = device.with_store(store);
        }
        let device = device.with_profile(profile);
        let state = Arc::new(AppState::new(Arc::new(device)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, state));

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            sim,
        }
    }

    async fn get(&self, action: &str, client_tx: u32) -> Value {
        let client_tx = client_tx.to_string();
        self.client
            .get(format!("{}/api/v1/telescope/0/{action}", self.base))
            .query(&[("ClientID", "1"), ("ClientTransactionID", client_tx.as_str())])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn put(&self, action: &str, fields: &[(&str, &str)]) -> Value {
        let mut form = vec![("ClientID", "1"), ("ClientTransactionID", "99")];
        form.extend_from_slice(fields);
        self.client
            .put(format!("{}/api/v1/telescope/0/{action}", self.base))
            .form(&form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_static_property_envelope() {
    let server = TestServer::start().await;
    let resp = server.get("cansync", 17).await;

    assert_eq!(resp["Value"], true);
    assert_eq!(resp["ClientTransactionID"], 17);
    assert_eq!(resp["ErrorNumber"], 0);
    assert_eq!(resp["ErrorString"], "");
    assert!(resp["ServerTransactionID"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_server_transaction_ids_increase() {
    let server = TestServer::start().await;
    let mut last = 0;
    for _ in 0..5 {
        let resp = server.get("name", 0).await;
        let id = resp["ServerTransactionID"].as_u64().unwrap();
        assert!(id > last, "{id} <= {last}");
        last = id;
    }
    // Failures count too.
    let resp = server.get("slewtotarget", 0).await;
    assert!(resp["ServerTransactionID"].as_u64().unwrap() > last);
}

#[tokio::test]
async fn test_unknown_action_not_implemented() {
    let server = TestServer::start().await;
    let resp = server.get("slewtocoordinatesasync", 1).await;
    assert_eq!(resp["ErrorNumber"], 0x400);
    assert_eq!(resp["ErrorString"], "Method not implemented");

    let resp = server.put("tracking", &[("Tracking", "true")]).await;
    assert_eq!(resp["ErrorNumber"], 0x400);
}

#[tokio::test]
async fn test_missing_client_transaction_id_echoes_zero() {
    let server = TestServer::start().await;
    let resp: Value = server
        .client
        .get(format!("{}/api/v1/telescope/0/connected", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["ClientTransactionID"], 0);
    assert_eq!(resp["Value"], false);
}

#[tokio::test]
async fn test_bad_device_number() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .get(format!("{}/api/v1/telescope/3/connected", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsynchronized_positions() {
    let server = TestServer::start().await;
    server.put("connected", &[("Connected", "True")]).await;
    for action in ["altitude", "azimuth", "rightascension", "declination"] {
        let resp = server.get(action, 0).await;
        assert_eq!(resp["ErrorNumber"], 0, "{action}");
        assert_eq!(resp["Value"], 0.0, "{action}");
    }
}

#[tokio::test]
async fn test_sync_then_read_back() {
    let server = TestServer::start().await;

    let resp = server.put("connected", &[("Connected", "true")]).await;
    assert_eq!(resp["ErrorNumber"], 0);
    assert!(resp.get("Value").is_none());
    assert_eq!(resp["ClientTransactionID"], 99);

    // RA one hour east of the meridian, comfortably above the horizon.
    let lst = server.get("siderealtime", 0).await["Value"].as_f64().unwrap();
    let ra = (lst + 1.0).rem_euclid(24.0);
    let ra_text = format!("{ra:.6}");

    let resp = server
        .put(
            "synctocoordinates",
            &[("RightAscension", &ra_text), ("Declination", "20.0")],
        )
        .await;
    assert_eq!(resp["ErrorNumber"], 0);

    let got_ra = server.get("rightascension", 0).await["Value"].as_f64().unwrap();
    let got_dec = server.get("declination", 0).await["Value"].as_f64().unwrap();
    let dra_deg = ((got_ra - ra + 12.0).rem_euclid(24.0) - 12.0) * 15.0;
    assert_abs_diff_eq!(dra_deg, 0.0, epsilon = 0.1);
    assert_abs_diff_eq!(got_dec, 20.0, epsilon = 0.1);

    // Move the altitude axis 400 of 4000 counts: +36 degrees.
    let alt_before = server.get("altitude", 0).await["Value"].as_f64().unwrap();
    server.sim.step(400, 0);
    let alt_after = server.get("altitude", 0).await["Value"].as_f64().unwrap();
    assert_abs_diff_eq!(alt_after, (alt_before + 36.0).min(90.0), epsilon = 1e-6);
}

#[tokio::test]
async fn test_sync_out_of_range_rejected() {
    let server = TestServer::start().await;
    server.put("connected", &[("Connected", "true")]).await;

    let resp = server
        .put(
            "synctocoordinates",
            &[("RightAscension", "25"), ("Declination", "10")],
        )
        .await;
    assert_eq!(resp["ErrorNumber"], 0x401);
    assert_eq!(resp["ErrorString"], "Invalid value");

    // Still unsynchronized.
    assert_eq!(server.get("altitude", 0).await["Value"], 0.0);
}

#[tokio::test]
async fn test_sync_requires_connection() {
    let server = TestServer::start().await;
    let resp = server
        .put(
            "synctocoordinates",
            &[("RightAscension", "5"), ("Declination", "10")],
        )
        .await;
    assert_eq!(resp["ErrorNumber"], 0x407);
    assert_eq!(resp["ErrorString"], "Not connected");
}

#[tokio::test]
async fn test_site_update() {
    let server = TestServer::start().await;
    let resp = server.put("sitelatitude", &[("SiteLatitude", "-33.9")]).await;
    assert_eq!(resp["ErrorNumber"], 0);
    assert_eq!(server.get("sitelatitude", 0).await["Value"], -33.9);

    let resp = server
        .put("sitelongitude", &[("sitelongitude", "200")])
        .await;
    assert_eq!(resp["ErrorNumber"], 0x401);
    assert_eq!(server.get("sitelongitude", 0).await["Value"], -106.5);
}

#[tokio::test]
async fn test_management_api() {
    let server = TestServer::start().await;
    let get = |path: &str| {
        server
            .client
            .get(format!("{}{path}", server.base))
            .query(&[("ClientTransactionID", "5")])
            .send()
    };

    let versions: Value = get("/management/apiversions").await.unwrap().json().await.unwrap();
    assert_eq!(versions["Value"], json!([1]));
    assert_eq!(versions["ClientTransactionID"], 5);

    let description: Value = get("/management/v1/description")
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(description["Value"]["Location"], "Test Site");

    let devices: Value = get("/management/v1/configureddevices")
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(devices["Value"][0]["DeviceType"], "Telescope");
    assert_eq!(devices["Value"][0]["DeviceNumber"], 0);
}

#[tokio::test]
async fn test_encoder_monitor() {
    let server = TestServer::start().await;
    let url = format!("{}/encoders", server.base);

    let status: Value = server.client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["connected"], false);
    assert!(status["counts"].is_null());

    server.put("connected", &[("Connected", "true")]).await;
    server.sim.set_position(1234, 4321);
    let status: Value = server.client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(status["connected"], true);
    assert_eq!(status["driver"], "Simulator");
    assert_eq!(status["counts"], json!([1234, 4321]));
    assert!(status["altaz_deg"].is_null());
    assert_eq!(status["clip_events"], 0);
}

#[tokio::test]
async fn test_sync_to_altaz() {
    let server = TestServer::start().await;
    assert_eq!(server.get("cansyncaltaz", 0).await["Value"], true);
    server.put("connected", &[("Connected", "true")]).await;

    let resp = server
        .put("synctoaltaz", &[("Altitude", "45"), ("Azimuth", "180")])
        .await;
    assert_eq!(resp["ErrorNumber"], 0);
    assert_eq!(server.get("altitude", 0).await["Value"], 45.0);
    assert_eq!(server.get("azimuth", 0).await["Value"], 180.0);

    // 200 of 4000 counts on each axis: 18 degrees.
    server.sim.step(-200, 200);
    let alt = server.get("altitude", 0).await["Value"].as_f64().unwrap();
    let az = server.get("azimuth", 0).await["Value"].as_f64().unwrap();
    assert_abs_diff_eq!(alt, 27.0, epsilon = 1e-9);
    assert_abs_diff_eq!(az, 198.0, epsilon = 1e-9);

    let resp = server
        .put("synctoaltaz", &[("Altitude", "95"), ("Azimuth", "10")])
        .await;
    assert_eq!(resp["ErrorNumber"], 0x401);
    assert_abs_diff_eq!(
        server.get("altitude", 0).await["Value"].as_f64().unwrap(),
        27.0,
        epsilon = 1e-9
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_distinct_transaction_ids() {
    let server = TestServer::start().await;
    server.put("connected", &[("Connected", "true")]).await;
    let resp = server
        .put("synctoaltaz", &[("Altitude", "40"), ("Azimuth", "120")])
        .await;
    assert_eq!(resp["ErrorNumber"], 0);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..50u32 {
        let server = server.clone();
        let action = if i % 2 == 0 { "altitude" } else { "name" };
        tasks.spawn(async move { (action, i, server.get(action, i).await) });
    }

    let mut ids = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let (action, client_tx, resp) = joined.unwrap();
        assert_eq!(resp["ErrorNumber"], 0, "{action}");
        assert_eq!(resp["ClientTransactionID"], client_tx);
        match action {
            "altitude" => assert_eq!(resp["Value"], 40.0),
            _ => assert_eq!(resp["Value"], "AltAzSettingCircles"),
        }
        let id = resp["ServerTransactionID"].as_u64().unwrap();
        assert!(ids.insert(id), "duplicate ServerTransactionID {id}");
    }
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn test_put_without_form_body_still_gets_envelope() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .put(format!("{}/api/v1/telescope/0/connected", server.base))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(r#"{"Connected": true}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ErrorNumber"], 0x401);
    assert_eq!(body["ClientTransactionID"], 0);
    assert!(body["ServerTransactionID"].as_u64().unwrap() >= 1);
    assert_eq!(server.get("connected", 0).await["Value"], false);
}

#[tokio::test]
async fn test_setup_api() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::with_path(dir.path().to_path_buf());
    let server = TestServer::start_with(Some(store.clone())).await;
    let setup = format!("{}/setup/v1/telescope/0/setup", server.base);

    let info: Value = server.client.get(&setup).send().await.unwrap().json().await.unwrap();
    assert_eq!(info["connected"], false);
    assert_eq!(info["profile"]["name"], "test");
    assert_eq!(info["profiles"], json!(["test"]));
    assert!(info["drivers"].as_array().unwrap().contains(&json!("DaveEk")));

    let encoders = json!({
        "driver": "Generic",
        "serial_port": "/dev/ttyUSB1",
        "serial_speed": 19200,
        "alt_resolution": 8192,
        "az_resolution": 8192,
        "alt_reverse": true,
        "az_reverse": false,
    });
    let resp = server
        .client
        .put(format!("{setup}/encoders"))
        .json(&encoders)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let saved = store.load("test").unwrap();
    assert_eq!(saved.encoders.driver, "Generic");
    assert_eq!(saved.encoders.serial_speed, 19200);
    assert!(saved.encoders.alt_reverse);

    let mut unknown = encoders.clone();
    unknown["driver"] = json!("Nexus");
    let resp = server
        .client
        .put(format!("{setup}/encoders"))
        .json(&unknown)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let site = json!({"obsname": "Hilltop", "latitude": 44.5, "longitude": 7.25, "altitude": 900.0});
    let resp = server
        .client
        .put(format!("{setup}/location"))
        .json(&site)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(server.get("sitelatitude", 0).await["Value"], 44.5);
    let description: Value = server
        .client
        .get(format!("{}/management/v1/description", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(description["Value"]["Location"], "Hilltop");

    let bad_site = json!({"obsname": "Nowhere", "latitude": 100.0, "longitude": 0.0, "altitude": 0.0});
    let resp = server
        .client
        .put(format!("{setup}/location"))
        .json(&bad_site)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(store.load("test").unwrap().location.latitude, 44.5);

    let resp = server
        .client
        .post(format!("{setup}/profile"))
        .json(&json!({"name": "field"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(store.current_profile().unwrap().as_deref(), Some("field"));
    assert_eq!(server.get("sitelatitude", 0).await["Value"], 0.0);

    // "field" uses the default simulator driver, so it can connect.
    server.put("connected", &[("Connected", "true")]).await;
    assert_eq!(server.get("connected", 0).await["Value"], true);
    let resp = server
        .client
        .put(format!("{setup}/profile"))
        .json(&json!({"name": "test"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

    server.put("connected", &[("Connected", "false")]).await;
    let resp = server
        .client
        .put(format!("{setup}/profile"))
        .json(&json!({"name": "test"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(server.get("sitelatitude", 0).await["Value"], 44.5);
    assert_eq!(store.current_profile().unwrap().as_deref(), Some("test"));
}
