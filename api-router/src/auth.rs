use crate::{api_state::ApiState, error::ApiError};

/// Every RPC request carries a shared-secret `token` field alongside its
/// arguments (`spec.md` §4.8). Checked as the first thing each handler does,
/// before any layer code runs.
pub fn check_token(state: &ApiState, token: &str) -> Result<(), ApiError> {
    if token.is_empty() || token != state.config.entity_token {
        return Err(ApiError::Unauthorized("invalid or missing token".into()));
    }
    Ok(())
}
