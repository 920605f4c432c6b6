use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ip_extractor::ClientIp;
use crate::models::{CreateLinkRequest, CreateLinkResponse, TrackingLink};
use crate::registry::{LinkRegistry, RegistryError};

const NOT_FOUND_MESSAGE: &str = "Tracking link not found";

/// Bytes escaped in a redirect target. Reserved URL characters and existing
/// `%XX` escapes pass through; non-ASCII is always escaped.
const LOCATION_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct AppState {
    pub registry: Arc<LinkRegistry>,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub message: String,
}

fn error_response(err: RegistryError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, error) = match err {
        RegistryError::Validation(message) => (StatusCode::BAD_REQUEST, message),
        RegistryError::NotFound(_) => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string()),
        RegistryError::IdExhausted => {
            tracing::error!("link id generation kept colliding");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate tracking link".to_string(),
            )
        }
    };

    (status, Json(ErrorResponse { error }))
}

/// Base for composed tracking URLs: configured value, else the Host header
fn tracking_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(ref base) = state.public_base_url {
        return base.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");
    format!("http://{}", host)
}

/// Escape a stored URL so it always fits in a `Location` header
pub fn encode_location(url: &str) -> String {
    utf8_percent_encode(url, LOCATION_ENCODE_SET).to_string()
}

fn is_form_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ct| {
            ct.trim_start()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

/// Read the `url` field from a JSON or form-encoded body
async fn read_create_request(
    request: Request,
) -> Result<Option<String>, (StatusCode, Json<ErrorResponse>)> {
    if is_form_body(request.headers()) {
        return match Form::<CreateLinkRequest>::from_request(request, &()).await {
            Ok(Form(payload)) => Ok(payload.url),
            Err(rejection) => Err(bad_request(rejection.body_text())),
        };
    }

    match Json::<CreateLinkRequest>::from_request(request, &()).await {
        Ok(Json(payload)) => Ok(payload.url),
        // A body that is neither JSON nor a form carries no URL
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(None),
        Err(rejection) => Err(bad_request(rejection.body_text())),
    }
}

/// Create a new tracking link
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<CreateLinkResponse>, (StatusCode, Json<ErrorResponse>)> {
    let base = tracking_base(&state, request.headers());
    let url = read_create_request(request).await?;

    let id = state
        .registry
        .create(url.as_deref())
        .map_err(error_response)?;

    Ok(Json(CreateLinkResponse {
        tracking_url: format!("{}/track/{}", base, id),
    }))
}

/// Record a visit and redirect to the original URL
pub async fn track_visit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ClientIp(client_ip): ClientIp,
) -> Response {
    match state.registry.record_visit(&id, client_ip.as_deref()).await {
        Ok(original_url) => match HeaderValue::from_str(&encode_location(&original_url)) {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(err) => {
                tracing::error!(id = %id, error = %err, "unencodable redirect target");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        },
        Err(RegistryError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response()
        }
        Err(err) => {
            tracing::error!(id = %id, error = %err, "failed to record visit");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Return a link with all of its recorded visits
pub async fn get_link_data(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TrackingLink>, (StatusCode, Json<ErrorResponse>)> {
    state.registry.get(&id).map(Json).map_err(error_response)
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
