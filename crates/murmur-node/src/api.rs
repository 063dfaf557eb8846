//! HTTP API for the Murmur node.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use murmur_auth::{AuthError, Identity, IdentityVerifier};
use murmur_realtime::{Message, MessageDraft, Relay};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;
use validator::Validate;

use crate::realtime_api::realtime_routes;
use crate::validation::{SubmitMessageRequest, ValidationErrorResponse};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay.
    pub relay: Arc<Relay>,
    /// Credential verification and sender profiles.
    pub identities: Arc<dyn IdentityVerifier>,
    /// Reject unauthenticated sessions and submits.
    pub require_auth: bool,
}

impl AppState {
    /// Resolve the caller's identity from an optional credential.
    ///
    /// Without a credential the caller is anonymous, unless auth is required.
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<Option<Identity>, ApiError> {
        match credential {
            Some(token) => Ok(Some(self.identities.verify(token).await?)),
            None if self.require_auth => Err(ApiError::Unauthorized),
            None => Ok(None),
        }
    }
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation failed")]
    Validation(#[from] validator::ValidationErrors),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Validation(errors) => {
                return ValidationErrorResponse::from(errors).into_response();
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Extract a bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/messages", get(list_messages).post(submit_message))
        .merge(realtime_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.relay.registry().len(),
    }))
}

/// Lists the buffered history, oldest first.
async fn list_messages(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(
        state
            .relay
            .store()
            .snapshot()
            .iter()
            .map(|m| Message::clone(m))
            .collect(),
    )
}

/// Submits a message outside any live session.
///
/// Goes through the same append and fan-out path as session messages.
async fn submit_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let identity = state.authenticate(bearer_token(&headers)).await?;

    let draft = match identity {
        Some(identity) => MessageDraft {
            sender: identity.id,
            content: req.content,
            attachment: identity.avatar_url,
        },
        None => {
            let sender = req
                .sender
                .ok_or_else(|| ApiError::BadRequest("sender is required".into()))?;
            let attachment = req.attachment.or_else(|| {
                state
                    .identities
                    .profile(&sender)
                    .and_then(|profile| profile.avatar_url)
            });
            MessageDraft {
                sender,
                content: req.content,
                attachment,
            }
        }
    };

    draft
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (message, report) = state.relay.sessions().submit(draft);
    debug!(
        sender = %message.sender,
        recipients = report.delivered,
        "Message submitted over HTTP"
    );

    Ok((StatusCode::CREATED, Json(Message::clone(&message))))
}
