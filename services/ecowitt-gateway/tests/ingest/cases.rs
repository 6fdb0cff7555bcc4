use std::time::Duration;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use ecowitt_gateway::{
    build_router,
    config::{PathMapping, Settings},
    handlers::AppState,
    types::Delta,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::util::ServiceExt; // for `oneshot`

use super::{RecordingBus, value_of};

const GW2000_UPLOAD: &str = "PASSKEY=0123456789ABCDEF&stationtype=GW2000A_V3.1.1\
&dateutc=2026-10-18+09%3A12%3A40&tempinf=68&humidityin=45&baromrelin=29.92\
&baromabsin=29.80&tempf=75&humidity=50&solarradiation=120&uv=3\
&rrain_piezo=0.1&drain_piezo=0.2&model=GW2000A";

fn form_post(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn next_delta(rx: &mut UnboundedReceiver<(String, Delta)>) -> (String, Delta) {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no delta emitted")
        .expect("bus closed")
}

async fn assert_no_delta(rx: &mut UnboundedReceiver<(String, Delta)>) {
    let got = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(got.is_err(), "unexpected delta: {got:?}");
}

#[tokio::test]
async fn post_is_acknowledged_with_empty_body() {
    let (bus, mut rx) = RecordingBus::new();
    let app = build_router(AppState::new(PathMapping::default(), bus));

    let resp = app
        .oneshot(form_post("/data/report/", GW2000_UPLOAD))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    assert!(bytes.is_empty());

    let (source, delta) = next_delta(&mut rx).await;
    assert_eq!(source, "signalk-ecowitt");
    assert_eq!(delta.updates.len(), 1);
    let batch = &delta.updates[0];
    assert_eq!(batch.len(), 11);
    assert_eq!(value_of(batch, "environment.ecowitt.inside.temperature"), Some(293.0));
    assert_eq!(value_of(batch, "environment.ecowitt.outside.pressure"), Some(101309.0));
    assert_eq!(value_of(batch, "environment.ecowitt.inside.relpressure"), Some(101309.0));
    assert_eq!(value_of(batch, "environment.ecowitt.inside.abspressure"), Some(100903.0));
    assert_eq!(value_of(batch, "environment.ecowitt.outside.drain_piezo"), Some(1.0));
}

#[tokio::test]
async fn non_post_is_ignored() {
    let (bus, mut rx) = RecordingBus::new();
    let app = build_router(AppState::new(PathMapping::default(), bus));

    for method in ["GET", "PUT", "DELETE"] {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri("/")
                    .body(Body::from(GW2000_UPLOAD))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        assert!(bytes.is_empty());
    }
    assert_no_delta(&mut rx).await;
}

#[tokio::test]
async fn empty_post_still_emits_fixed_fields() {
    let (bus, mut rx) = RecordingBus::new();
    let app = build_router(AppState::new(PathMapping::default(), bus));

    let resp = app.oneshot(form_post("/", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, delta) = next_delta(&mut rx).await;
    let batch = &delta.updates[0];
    assert_eq!(batch.len(), 11);
    assert!(batch.values.iter().all(|r| r.value.is_nan()));

    let json = serde_json::to_value(&delta).unwrap();
    assert!(json["updates"][0]["values"][0]["value"].is_null());
}

#[tokio::test]
async fn channels_and_wind_follow_mapping() {
    let (bus, mut rx) = RecordingBus::new();
    let mut paths = PathMapping::default();
    paths.channels[0].temperature = Some("environment.inside.engineRoom.temperature".into());
    paths.channels[1].temperature = None;
    let app = build_router(AppState::new(paths, bus));

    let body = format!("{GW2000_UPLOAD}&temp1f=50&temp2f=41&humidity2=55&windspeedmph=10&winddir=180");
    let resp = app.oneshot(form_post("/", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, delta) = next_delta(&mut rx).await;
    let tail: Vec<(&str, f64)> = delta.updates[0].values[11..]
        .iter()
        .map(|r| (r.path.as_str(), r.value))
        .collect();
    assert_eq!(
        tail,
        vec![
            ("environment.inside.engineRoom.temperature", 283.0),
            ("environment.ecowitt.2.humidity", 0.55),
            ("environment.wind.speedApparent", 4.47),
            ("environment.wind.angleApparent", 3.14),
        ]
    );
}

#[tokio::test]
async fn oversized_bodies_still_get_empty_ok() {
    let (bus, mut rx) = RecordingBus::new();
    let app = build_router(AppState::new(PathMapping::default(), bus));
    let body = format!("tempf=75&junk={}", "a".repeat(3 * 1024 * 1024));

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(to_bytes(resp.into_body(), 64 * 1024).await.unwrap().is_empty());
    assert_no_delta(&mut rx).await;

    let resp = app.oneshot(form_post("/", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(to_bytes(resp.into_body(), 64 * 1024).await.unwrap().is_empty());

    let (_, delta) = next_delta(&mut rx).await;
    let batch = &delta.updates[0];
    assert_eq!(batch.len(), 11);
    assert_eq!(value_of(batch, "environment.ecowitt.outside.temperature"), Some(297.0));
}

#[tokio::test]
async fn one_delta_per_request() {
    let (bus, mut rx) = RecordingBus::new();
    let app = build_router(AppState::new(PathMapping::default(), bus));

    for _ in 0..3 {
        app.clone()
            .oneshot(form_post("/", GW2000_UPLOAD))
            .await
            .unwrap();
    }
    let first = next_delta(&mut rx).await.1;
    for _ in 0..2 {
        assert_eq!(next_delta(&mut rx).await.1, first);
    }
    assert_no_delta(&mut rx).await;
}

#[tokio::test]
async fn start_serves_until_stopped() {
    let (bus, mut rx) = RecordingBus::new();
    let settings = Settings {
        host: "127.0.0.1".into(),
        port: 0,
        ..Settings::default()
    };
    let server = ecowitt_gateway::start(settings, bus).await.unwrap();
    let url = format!("http://{}/data/report/", server.local_addr());

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(format!("{GW2000_UPLOAD}&winddir=90"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "");

    let (_, delta) = next_delta(&mut rx).await;
    assert_eq!(
        value_of(&delta.updates[0], "environment.wind.angleApparent"),
        Some(1.57)
    );

    drop(client);
    let addr = server.local_addr();
    server.stop().await.unwrap();
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
