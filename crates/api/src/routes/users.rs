//! User registration for the in-memory user directory.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::User;
use document_store::DocumentStore;
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
}

/// POST /users
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest(format!("Invalid email: {email:?}")));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let user = state.users.register(email, req.name.trim()).await;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<User>> {
    Json(state.users.list().await)
}
