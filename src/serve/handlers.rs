//! HTTP request handlers.
//!
//! Aggregate computation and tile resolution block on the query engine,
//! so both run under `spawn_blocking`. Failures map to a small JSON error
//! body; internal detail stays in the log, not the response.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::types::AreaLevel;

use super::AppState;

pub(crate) struct ApiError(StatusCode, String);

pub(crate) type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }

    fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        log::error!("[serve] request failed: {err:#}");
        Self(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    }
}

/// Join errors only happen on panic or shutdown; both are internal.
fn join_error(err: tokio::task::JoinError) -> ApiError {
    log::error!("[serve] worker task failed: {err}");
    ApiError(StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
}

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "db_exists": state.settings.transactions_exist(),
        "transactions": state.store.transaction_count(),
        "parcels": state.parcel_count(),
        "tiles_enabled": state.tiles_enabled(),
    }))
}

pub(crate) async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(level): Path<String>,
) -> ApiResult<Json<Value>> {
    let level: AreaLevel = level.parse().map_err(ApiError::bad_request)?;
    let value = tokio::task::spawn_blocking(move || state.stats_for(level))
        .await
        .map_err(join_error)??;
    Ok(Json(json!({ "data": value })))
}

pub(crate) async fn refresh_stats(
    State(state): State<Arc<AppState>>,
    Path(level): Path<String>,
) -> ApiResult<Json<Value>> {
    let level: AreaLevel = level.parse().map_err(ApiError::bad_request)?;
    tokio::task::spawn_blocking(move || state.refresh(level))
        .await
        .map_err(join_error)??;
    Ok(Json(json!({ "status": "refreshed" })))
}

pub(crate) async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(u8, u64, String)>,
) -> ApiResult<Response> {
    // The y segment carries the format suffix: /api/tiles/18/131000/95000.pbf
    let y: u64 = y
        .strip_suffix(".pbf")
        .unwrap_or(&y)
        .parse()
        .map_err(|_| ApiError::bad_request("invalid tile y coordinate"))?;

    let bytes = tokio::task::spawn_blocking(move || state.resolve_tile(z, x, y))
        .await
        .map_err(join_error)?
        .ok_or_else(|| ApiError::not_found("parcel tiles unavailable"))??;

    // Empty body for below-zoom or parcel-free tiles, still protobuf-typed.
    Ok(([(header::CONTENT_TYPE, "application/x-protobuf")], bytes).into_response())
}

pub(crate) async fn top10(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let top = state.store.load_top()?;
    Ok(Json(json!({ "top": top })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::io::Write;
    use std::path::PathBuf;

    const HEADER: &str = "Date mutation|Nature mutation|Code departement|Code commune|Code postal|Commune|Type local|Valeur fonciere|Surface reelle bati|No disposition";

    fn scratch_state(name: &str) -> (PathBuf, Arc<AppState>) {
        let dir = std::env::temp_dir().join(format!("foncier-serve-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("raw")).unwrap();
        let mut file =
            std::fs::File::create(dir.join("raw").join("valeursfoncieres-2023.txt")).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "02/01/2023|Vente|33|063|33000|Bordeaux|Maison|400000,00|100,0|1")
            .unwrap();
        let state = Arc::new(AppState::new(Settings::with_data_dir(&dir)).unwrap());
        (dir, state)
    }

    #[test]
    fn health_reports_the_table_on_disk() {
        let (dir, state) = scratch_state("health");
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let body = rt.block_on(health(State(state.clone()))).0;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db_exists"], true);
        assert_eq!(body["transactions"], 1);
        assert_eq!(body["tiles_enabled"], false);

        // Deleting the table must show up on the next check, not stay
        // frozen at the startup answer.
        std::fs::remove_file(state.settings.transactions_path()).unwrap();
        let body = rt.block_on(health(State(state))).0;
        assert_eq!(body["db_exists"], false);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
