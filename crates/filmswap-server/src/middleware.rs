use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;

/// Check the operator bearer token on `/admin` routes.
pub async fn require_operator(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    check_bearer(&req, &state.operator_token, "operator")?;
    Ok(next.run(req).await)
}

/// Check the chat layer's bearer token on participant routes and the gateway.
/// The `{id}` those routes act for is only trusted once this passes.
pub async fn require_command(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    check_bearer(&req, &state.command_token, "command")?;
    Ok(next.run(req).await)
}

fn check_bearer(req: &Request, expected: &str, role: &str) -> Result<(), StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !tokens_match(token.as_bytes(), expected.as_bytes()) {
        warn!("Rejected {} request to {}", role, req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

/// Compare without short-circuiting on the first differing byte.
fn tokens_match(given: &[u8], expected: &[u8]) -> bool {
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
