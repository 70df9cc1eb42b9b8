use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::extract::ValidJson;
use crate::sso::{SsoBridge, HANDOFF_KEY_LEN};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemRequest {
    #[schema(example = "q3Vb0xk2LmN8pQrS7tUvW1yZ4aBcDeFg")]
    pub token: Option<String>,
}

fn configured(state: &AppState) -> AppResult<&SsoBridge> {
    state
        .sso
        .as_deref()
        .ok_or_else(|| AppError::configuration("Google sign-in is not configured"))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[utoipa::path(
    get,
    path = "/api/auth/google/login",
    tag = "SSO",
    responses(
        (status = 302, description = "Redirect to the Google consent screen"),
        (status = 500, description = "Google sign-in is not configured")
    )
)]
pub async fn google_login(State(state): State<AppState>) -> AppResult<Response> {
    let bridge = configured(&state)?;
    let url = bridge.config.authorization_url()?;
    Ok(found(url.as_str()))
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    tag = "SSO",
    params(CallbackParams),
    responses(
        (status = 302, description = "Redirect to the front-end carrying a single-use handoff key"),
        (status = 400, description = "No code, or the identity token failed verification"),
        (status = 500, description = "Google sign-in is not configured")
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    let bridge = configured(&state)?;

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::bad_request("No code provided"))?;

    let key = bridge
        .complete(&state.pool, &state.jwt, &state.handoff, &code)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "sso callback failed");
            err
        })?;

    let redirect = bridge.config.frontend_redirect(&key)?;
    Ok(found(redirect.as_str()))
}

/// Consumes a handoff key. The stored payload is returned once; unknown, expired
/// and already redeemed keys all answer `{}`.
#[utoipa::path(
    post,
    path = "/api/sso/token/data",
    tag = "SSO",
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "Credential pair, error payload, or {}"),
        (status = 400, description = "Missing or malformed token")
    )
)]
pub async fn redeem_handoff(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RedeemRequest>,
) -> AppResult<Json<Value>> {
    let token = payload
        .token
        .ok_or_else(|| AppError::bad_request("token: This field is required."))?;
    if token.is_empty() {
        return Err(AppError::bad_request("token: This field may not be blank."));
    }
    if token.chars().count() > HANDOFF_KEY_LEN {
        return Err(AppError::bad_request(format!(
            "token: Ensure this field has no more than {HANDOFF_KEY_LEN} characters."
        )));
    }

    match state.handoff.take(&token) {
        Some(data) => {
            tracing::info!("sso handoff key redeemed");
            let value = serde_json::to_value(data).map_err(|err| AppError::internal(err.to_string()))?;
            Ok(Json(value))
        }
        None => Ok(Json(json!({}))),
    }
}
