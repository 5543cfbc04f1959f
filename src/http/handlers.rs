// Endpoint handlers - thin glue between HTTP bodies and the managers

use crate::docker::{
    ComposeError, ContainerState, ContainerStats, DockerError, DockerManager,
};
use crate::http::{json, AppContext, JsonResponse};
use crate::mods::{ModError, ModList, WorkshopError};
use crate::worlds::WorldError;
use serde::{Deserialize, Serialize};

/// Wire shape for every plain success/failure answer.
#[derive(Debug, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// An error already mapped to an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }

    pub fn into_response(self) -> JsonResponse {
        json(self.status, &OperationResult::failure(self.message))
    }
}

impl From<WorldError> for ApiError {
    fn from(err: WorldError) -> Self {
        let status = match err {
            WorldError::InvalidName(_) => 400,
            WorldError::AlreadyExists(_) | WorldError::TargetExists(_) => 409,
            WorldError::SourceNotFound(_) | WorldError::BackupNotFound(_) => 404,
            _ => 500,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ModError> for ApiError {
    fn from(err: ModError) -> Self {
        let status = match &err {
            ModError::Workshop(WorkshopError::ItemNotFound(_))
            | ModError::Workshop(WorkshopError::CollectionNotFound(_)) => 404,
            ModError::Workshop(_) => 502,
            _ => 500,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<DockerError> for ApiError {
    fn from(err: DockerError) -> Self {
        Self {
            status: 502,
            message: err.to_string(),
        }
    }
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::bad_request(format!("invalid request body: {}", err)))
}

// ---- auth ----

#[derive(Debug, Deserialize)]
struct LoginRequest {
    password: String,
}

pub fn login(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: LoginRequest = parse_body(body)?;
    if request.password != ctx.config.dashboard_password {
        tracing::warn!("rejected login attempt");
        return Ok(json(401, &OperationResult::failure("Invalid password")));
    }

    let token = ctx.sessions.issue();
    tracing::info!("operator logged in");
    Ok(json(200, &OperationResult::ok("Logged in"))
        .with_header(crate::http::auth::session_cookie(&token)))
}

pub fn logout(ctx: &AppContext, token: &str) -> JsonResponse {
    ctx.sessions.revoke(token);
    json(200, &OperationResult::ok("Logged out"))
        .with_header(crate::http::auth::clear_session_cookie())
}

// ---- process controller ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: ContainerState,
    cpu_percent: f64,
    memory_usage_mb: f64,
    memory_limit_mb: f64,
    memory_percent: f64,
}

pub async fn status(ctx: &AppContext) -> Result<JsonResponse, ApiError> {
    let docker = DockerManager::new().await?;
    let state = docker.status(&ctx.config.container_name).await?;

    let stats = if state == ContainerState::Running {
        docker.stats(&ctx.config.container_name).await?
    } else {
        ContainerStats::empty()
    };

    Ok(json(
        200,
        &StatusResponse {
            status: state,
            cpu_percent: stats.cpu_percent,
            memory_usage_mb: stats.memory_usage_mb,
            memory_limit_mb: stats.memory_limit_mb,
            memory_percent: stats.memory_percent,
        },
    ))
}

#[derive(Debug, Serialize)]
struct LogsResponse {
    logs: Vec<String>,
}

pub async fn logs(ctx: &AppContext, query: Option<&str>) -> Result<JsonResponse, ApiError> {
    let lines = query_param(query, "lines")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);

    let docker = DockerManager::new().await?;
    let logs = docker.logs(&ctx.config.container_name, lines).await?;
    Ok(json(200, &LogsResponse { logs }))
}

pub enum Lifecycle {
    Start,
    Stop,
    Restart,
}

/// Lifecycle calls mirror the compose CLI's own exit status: failures and
/// timeouts come back as `success: false` with the captured output, not
/// as an HTTP error.
pub async fn lifecycle(ctx: &AppContext, action: Lifecycle) -> JsonResponse {
    let result = match action {
        Lifecycle::Start => ctx.compose.up().await,
        Lifecycle::Stop => ctx.compose.down().await,
        Lifecycle::Restart => ctx.compose.restart().await,
    };

    let body = match result {
        Ok(output) => OperationResult {
            success: output.success,
            message: output.output,
        },
        Err(err @ ComposeError::Timeout(_)) => {
            tracing::warn!("compose lifecycle call timed out");
            OperationResult::failure(err.to_string())
        }
        Err(err) => {
            tracing::error!("compose lifecycle call failed: {}", err);
            OperationResult::failure(err.to_string())
        }
    };
    json(200, &body)
}

// ---- mod registry ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddModRequest {
    workshop_id: String,
    #[serde(default)]
    mod_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveModRequest {
    #[serde(default)]
    workshop_id: Option<String>,
    #[serde(default)]
    mod_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportCollectionRequest {
    collection_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResponse {
    success: bool,
    message: String,
    added: usize,
    already_present: usize,
    total: usize,
}

pub fn get_mods(ctx: &AppContext) -> Result<JsonResponse, ApiError> {
    let list = ctx.registry.get_mods()?;
    Ok(json(200, &list))
}

pub async fn save_mods(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let list: ModList = parse_body(body)?;
    ctx.registry.save_mods(list.workshop_items, list.mods).await?;
    Ok(json(
        200,
        &OperationResult::ok("Mod list saved. Restart the server to apply."),
    ))
}

pub async fn add_mod(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: AddModRequest = parse_body(body)?;
    let workshop_id = request.workshop_id.trim();
    if workshop_id.is_empty() {
        return Err(ApiError::bad_request("workshopId is required"));
    }

    let changed = ctx
        .registry
        .add_mod(workshop_id, request.mod_id.as_deref().map(str::trim))
        .await?;

    let message = if changed {
        format!("Added mod {}", workshop_id)
    } else {
        "Mod already present".to_string()
    };
    Ok(json(200, &OperationResult::ok(message)))
}

pub async fn remove_mod(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: RemoveModRequest = parse_body(body)?;
    let changed = ctx
        .registry
        .remove_mod(
            request.workshop_id.as_deref().map(str::trim),
            request.mod_id.as_deref().map(str::trim),
        )
        .await?;

    let message = if changed { "Mod removed" } else { "Nothing to remove" };
    Ok(json(200, &OperationResult::ok(message)))
}

pub async fn import_collection(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: ImportCollectionRequest = parse_body(body)?;
    let collection_id = request.collection_id.trim();
    if collection_id.is_empty() {
        return Err(ApiError::bad_request("collectionId is required"));
    }

    let report = ctx.registry.import_collection(collection_id).await?;
    Ok(json(
        200,
        &ImportResponse {
            success: true,
            message: report.summary(),
            added: report.added,
            already_present: report.already_present,
            total: report.total,
        },
    ))
}

pub async fn lookup_workshop(ctx: &AppContext, id: &str) -> JsonResponse {
    json(200, &ctx.registry.lookup_item(id).await)
}

pub async fn lookup_collection(ctx: &AppContext, id: &str) -> JsonResponse {
    json(200, &ctx.registry.lookup_collection(id).await)
}

// ---- world manager ----

#[derive(Debug, Deserialize)]
struct WorldNameRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RestoreRequest {
    backup: String,
    target: String,
}

pub fn list_worlds(ctx: &AppContext) -> Result<JsonResponse, ApiError> {
    Ok(json(200, &ctx.worlds.list_worlds()?))
}

pub fn create_world(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: WorldNameRequest = parse_body(body)?;
    let name = request.name.trim();
    ctx.worlds.create_world(name)?;
    Ok(json(
        200,
        &OperationResult::ok(format!(
            "World {} created. It is generated on next server start.",
            name
        )),
    ))
}

pub fn switch_world(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: WorldNameRequest = parse_body(body)?;
    let name = request.name.trim();
    ctx.worlds.switch_world(name)?;
    Ok(json(
        200,
        &OperationResult::ok(format!("Switched to world {}. Restart the server to apply.", name)),
    ))
}

pub async fn backup_world(ctx: &AppContext) -> Result<JsonResponse, ApiError> {
    let backup_name = ctx.worlds.backup_world().await?;
    Ok(json(
        200,
        &OperationResult::ok(format!("Backup created: {}", backup_name)),
    ))
}

pub async fn restore_backup(ctx: &AppContext, body: &str) -> Result<JsonResponse, ApiError> {
    let request: RestoreRequest = parse_body(body)?;
    let backup = request.backup.trim();
    let target = request.target.trim();
    ctx.worlds.restore_backup(backup, target).await?;
    Ok(json(
        200,
        &OperationResult::ok(format!("Backup {} restored into world {}", backup, target)),
    ))
}

fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_finds_named_value() {
        assert_eq!(query_param(Some("lines=250&foo=bar"), "lines"), Some("250"));
        assert_eq!(query_param(Some("foo=bar"), "lines"), None);
        assert_eq!(query_param(None, "lines"), None);
    }

    #[test]
    fn world_errors_map_to_statuses() {
        assert_eq!(ApiError::from(WorldError::InvalidName("x y".into())).status, 400);
        assert_eq!(ApiError::from(WorldError::AlreadyExists("x".into())).status, 409);
        assert_eq!(ApiError::from(WorldError::TargetExists("x".into())).status, 409);
        assert_eq!(ApiError::from(WorldError::BackupNotFound("x".into())).status, 404);
        assert_eq!(ApiError::from(WorldError::SourceNotFound("x".into())).status, 404);
    }

    #[test]
    fn workshop_errors_map_to_statuses() {
        let not_found = ModError::Workshop(WorkshopError::ItemNotFound("1".into()));
        assert_eq!(ApiError::from(not_found).status, 404);

        let upstream = ModError::Workshop(WorkshopError::Status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        ));
        assert_eq!(ApiError::from(upstream).status, 502);
    }
}
