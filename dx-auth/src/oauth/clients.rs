//! Client management endpoints

use super::models::{Client, CreateClientRequest, RegisteredClient};
use crate::app::AppState;
use crate::error::AccessError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

/// POST /oauth2/clients
///
/// The response carries the client secret. It is not retrievable later.
pub async fn create_client(
    State(state): State<AppState>,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<RegisteredClient>), AccessError> {
    let registered = state.oauth.create_client(request).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// GET /oauth2/clients/:client_id
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<Client>, AccessError> {
    Ok(Json(state.oauth.get_client(&client_id).await?))
}

/// DELETE /oauth2/clients/:client_id
///
/// Soft-disables the client and revokes its tokens.
pub async fn disable_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<StatusCode, AccessError> {
    state.oauth.set_client_active(&client_id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}
