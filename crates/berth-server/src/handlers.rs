//! Request handlers.
//!
//! Handlers translate HTTP into orchestrator calls and nothing more.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use berth_audit::AuditRecord;
use berth_common::error::BerthError;
use berth_common::types::{ContainerId, ContainerSummary, Image, ImageId, PortMapping, Principal};
use berth_control::{CreateRequest, RequestContext};
use berth_runtime::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};

use crate::auth::{Authenticated, SourceAddr};
use crate::error::ApiResult;
use crate::state::AppState;

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| BerthError::validation(rejection.body_text()).into())
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    /// Login email.
    pub email: Option<String>,
    /// Login password.
    pub password: Option<String>,
}

/// Response of a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The signed-in principal.
    pub user: Principal,
}

/// `POST /api/auth/login`
///
/// # Errors
///
/// 400 when email or password is missing, 401 when rejected.
pub async fn login(
    State(state): State<AppState>,
    SourceAddr(source): SourceAddr,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let body = json_body(body)?;
    let (Some(email), Some(password)) = (
        body.email.filter(|e| !e.trim().is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(BerthError::validation("email and password are required").into());
    };

    let session = state.identity.sign_in(email.trim(), &password).await?;
    tracing::info!(principal = %session.principal, "signed in");
    let ctx = RequestContext {
        principal: session.principal.clone(),
        source,
    };
    let _ = state.orchestrator.login(&ctx).await;
    Ok(Json(LoginResponse {
        token: session.token,
        user: session.principal,
    }))
}

/// `POST /api/auth/logout`
///
/// # Errors
///
/// 401 without a valid token.
pub async fn logout(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> ApiResult<StatusCode> {
    let _ = state.orchestrator.logout(&ctx).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/containers`
///
/// # Errors
///
/// 500 when the engine cannot be queried.
pub async fn list_containers(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResult<Json<Vec<ContainerSummary>>> {
    Ok(Json(state.orchestrator.list().await?))
}

/// A port in a create request: either `"8080:80/tcp"` or a structured
/// mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    /// Compact `[host:]container[/protocol]` form.
    Compact(String),
    /// Structured form.
    Mapping(PortMapping),
}

/// Body of `POST /api/containers`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBody {
    /// Image reference.
    pub image: String,
    /// Optional container name.
    pub name: Option<String>,
    /// Ports to publish.
    pub ports: Vec<PortSpec>,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
}

impl TryFrom<CreateBody> for CreateRequest {
    type Error = BerthError;

    fn try_from(body: CreateBody) -> Result<Self, Self::Error> {
        let ports = body
            .ports
            .into_iter()
            .map(|spec| match spec {
                PortSpec::Compact(text) => text.parse(),
                PortSpec::Mapping(mapping) => Ok(mapping),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            image: body.image,
            name: body.name,
            ports,
            env: body.env,
        })
    }
}

/// Response of a successful create.
#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
    /// Short id of the new container.
    pub id: ContainerId,
}

/// `POST /api/containers`
///
/// # Errors
///
/// 400 for a missing image or malformed ports, 500 when the pull or the
/// engine fails.
pub async fn create_container(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    body: Result<Json<CreateBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let request = CreateRequest::try_from(json_body(body)?)?;
    let id = state.orchestrator.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// `POST /api/containers/{id}/start`
///
/// # Errors
///
/// 409 when already running, 404 when unknown.
pub async fn start_container(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.start(&ctx, &ContainerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/containers/{id}/stop`
///
/// # Errors
///
/// 409 when already stopped, 404 when unknown.
pub async fn stop_container(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.stop(&ctx, &ContainerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/containers/{id}`
///
/// # Errors
///
/// 409 while the container is running, 404 when unknown.
pub async fn delete_container(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.delete(&ctx, &ContainerId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/containers/{id}/stats`
///
/// # Errors
///
/// 404 when unknown, 500 when the engine fails.
pub async fn container_stats(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<MetricsSnapshot>> {
    Ok(Json(state.orchestrator.stats(&ContainerId::new(id)).await?))
}

/// Query of `GET /api/containers/{id}/logs`.
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// Number of trailing lines.
    pub tail: Option<usize>,
}

/// `GET /api/containers/{id}/logs?tail=N`
///
/// # Errors
///
/// 404 when unknown, 500 when the engine fails.
pub async fn container_logs(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let lines = state
        .orchestrator
        .logs(&ContainerId::new(id), query.tail)
        .await?;
    Ok(Json(lines))
}

/// `GET /api/images`
///
/// # Errors
///
/// 500 when the engine cannot be queried.
pub async fn list_images(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> ApiResult<Json<Vec<Image>>> {
    Ok(Json(state.orchestrator.list_images().await?))
}

/// `DELETE /api/images/{id}`
///
/// # Errors
///
/// 404 when unknown, 500 when the engine fails.
pub async fn delete_image(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.delete_image(&ctx, &ImageId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query of `GET /api/logs`.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    /// Maximum number of records.
    pub limit: Option<usize>,
}

/// `GET /api/logs?limit=N`: the caller's own audit records, newest first.
///
/// # Errors
///
/// 500 when the audit store cannot be read.
pub async fn audit_log(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditRecord>>> {
    let limit = query.limit.filter(|l| *l > 0);
    Ok(Json(state.orchestrator.audit_log(&ctx, limit).await?))
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}
