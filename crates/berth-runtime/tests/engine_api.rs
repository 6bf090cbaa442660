//! `DockerClient` against a fake engine speaking the Engine API.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use berth_common::error::BerthError;
use berth_common::types::{ContainerId, ContainerStatus, ImageId, UNTAGGED};
use berth_runtime::client::{CreateSpec, RuntimeClient};
use berth_runtime::docker::DockerClient;
use berth_runtime::metrics::MetricsSnapshot;
use serde_json::{Value, json};
use tokio::net::TcpListener;

const FULL_ID: &str = "3f2a9c1b7d4e5f60718293a4b5c6d7e8f90112233445566778899aabbccddeef";

async fn inspect(Path(id): Path<String>) -> impl IntoResponse {
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No such container: missing" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "Id": FULL_ID,
            "Name": "/web",
            "Created": "2026-01-02T03:04:05.123456789Z",
            "State": { "Status": "running", "Running": true },
            "Config": { "Image": "nginx:1.27" }
        })),
    )
}

async fn pull(Query(query): Query<HashMap<String, String>>) -> String {
    if query.get("fromImage").map(String::as_str) == Some("private/app") {
        return [
            r#"{"status":"Pulling from private/app"}"#,
            r#"{"errorDetail":{"message":"pull access denied"},"error":"pull access denied"}"#,
        ]
        .join("\n");
    }
    assert_eq!(query.get("tag").map(String::as_str), Some("latest"));
    r#"{"status":"Status: Downloaded newer image"}"#.to_string()
}

fn frame(stream: u8, text: &str) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&u32::try_from(text.len()).unwrap().to_be_bytes());
    out.extend_from_slice(text.as_bytes());
    out
}

async fn logs() -> impl IntoResponse {
    let mut body = frame(1, "listening on :80\n");
    body.extend(frame(2, "warning: no config\n\n"));
    (
        [(CONTENT_TYPE, "application/vnd.docker.multiplexed-stream")],
        body,
    )
}

async fn fake_engine() -> String {
    let app = Router::new()
        .route(
            "/containers/json",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("all").map(String::as_str), Some("true"));
                Json(json!([{
                    "Id": FULL_ID,
                    "Names": ["/web"],
                    "Image": "nginx:1.27",
                    "State": "exited",
                    "Ports": [{ "IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp" }],
                    "Created": 1_767_225_600
                }]))
            }),
        )
        .route("/containers/{id}/json", get(inspect))
        .route(
            "/containers/{id}/start",
            post(|| async { StatusCode::NOT_MODIFIED }),
        )
        .route(
            "/containers/{id}/stop",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "cannot kill container: permission denied" })),
                )
            }),
        )
        .route(
            "/containers/{id}",
            delete(|| async {
                (
                    StatusCode::CONFLICT,
                    Json(json!({ "message": "You cannot remove a running container" })),
                )
            }),
        )
        .route(
            "/containers/create",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["Tty"], true);
                assert_eq!(body["HostConfig"]["PortBindings"]["80/tcp"][0]["HostPort"], "8080");
                (
                    StatusCode::CREATED,
                    Json(json!({ "Id": FULL_ID, "Warnings": [] })),
                )
            }),
        )
        .route(
            "/containers/{id}/stats",
            get(|| async {
                Json(json!({
                    "cpu_stats": { "cpu_usage": { "total_usage": 300 }, "system_cpu_usage": 2000 },
                    "precpu_stats": { "cpu_usage": { "total_usage": 100 }, "system_cpu_usage": 1000 },
                    "memory_stats": { "usage": 52_428_800, "limit": 104_857_600 }
                }))
            }),
        )
        .route("/containers/{id}/logs", get(logs))
        .route("/images/create", post(pull))
        .route(
            "/images/{id}/json",
            get(|Path(name): Path<String>| async move {
                if name == "nginx:1.27" {
                    StatusCode::OK
                } else {
                    StatusCode::NOT_FOUND
                }
            }),
        )
        .route(
            "/images/json",
            get(|| async {
                Json(json!([
                    { "Id": "sha256:aabbccddeeff00112233", "RepoTags": ["nginx:1.27"], "Size": 187, "Created": 1_767_225_600 },
                    { "Id": "sha256:001122334455aabbccdd", "RepoTags": null, "Size": 5, "Created": 1_767_225_600 }
                ]))
            }),
        )
        .route(
            "/images/{id}",
            delete(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("force").map(String::as_str), Some("true"));
                Json(json!([{ "Deleted": "sha256:aabbccddeeff00112233" }]))
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{addr}")
}

#[tokio::test]
async fn list_maps_engine_fields() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    let containers = client.list_containers(true).await.unwrap();
    assert_eq!(containers.len(), 1);
    let web = &containers[0];
    assert_eq!(web.id.as_str(), &FULL_ID[..12]);
    assert_eq!(web.name, "web");
    assert_eq!(web.status, ContainerStatus::Stopped);
    assert_eq!(web.ports[0].host_port, Some(8080));
}

#[tokio::test]
async fn inspect_reports_running_flag_and_missing_containers() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    let detail = client
        .inspect_container(&ContainerId::new("web"))
        .await
        .unwrap();
    assert!(detail.running);
    assert_eq!(detail.name, "web");

    let err = client
        .inspect_container(&ContainerId::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, BerthError::NotFound { kind: "container", .. }));
}

#[tokio::test]
async fn engine_statuses_map_onto_error_kinds() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    let id = ContainerId::new("web");

    let err = client.start_container(&id).await.unwrap_err();
    assert!(matches!(err, BerthError::Conflict { .. }));

    let err = client.remove_container(&id).await.unwrap_err();
    assert!(
        matches!(err, BerthError::Conflict { ref message } if message == "You cannot remove a running container")
    );

    let err = client.stop_container(&id).await.unwrap_err();
    assert!(
        matches!(err, BerthError::Runtime { ref message } if message.contains("permission denied"))
    );
}

#[tokio::test]
async fn pull_waits_for_stream_and_surfaces_errors() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    client.pull_image("redis").await.unwrap();

    let err = client.pull_image("private/app").await.unwrap_err();
    assert!(matches!(err, BerthError::Runtime { ref message } if message == "pull access denied"));
}

#[tokio::test]
async fn image_presence_and_listing() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    assert!(client.image_present("nginx:1.27").await.unwrap());
    assert!(!client.image_present("redis:7").await.unwrap());

    let images = client.list_images().await.unwrap();
    assert_eq!(images[0].tags, vec!["nginx:1.27"]);
    assert_eq!(images[1].tags, vec![UNTAGGED]);
    client
        .remove_image(&ImageId::new("aabbccddeeff"), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn create_sends_port_bindings() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    let spec = CreateSpec {
        image: "nginx:1.27".into(),
        name: Some("web".into()),
        ports: vec!["8080:80".parse().unwrap()],
        env: vec!["MODE=prod".into()],
    };
    let id = client.create_container(&spec).await.unwrap();
    assert_eq!(id.as_str(), FULL_ID);
}

#[tokio::test]
async fn stats_and_logs_are_decoded() {
    let client = DockerClient::new(fake_engine().await).unwrap();
    let id = ContainerId::new("web");

    let snapshot = MetricsSnapshot::from_raw(&client.fetch_raw_stats(&id).await.unwrap());
    assert!((snapshot.cpu_percent - 20.0).abs() < f64::EPSILON);
    assert!((snapshot.memory_percent - 50.0).abs() < f64::EPSILON);
    assert!((snapshot.memory_used_mib - 50.0).abs() < f64::EPSILON);

    let lines = client.fetch_logs(&id, 10).await.unwrap();
    assert_eq!(lines, vec!["listening on :80", "warning: no config"]);
}
