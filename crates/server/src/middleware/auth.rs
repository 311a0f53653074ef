use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use services::services::auth::AuthServiceError;

use crate::{DeploymentImpl, error::ApiError};

/// Resolves the bearer token into a `User` extension.
///
/// A missing token is a 401; a token that fails verification (bad signature,
/// expired, unknown user) is a 403.
pub async fn require_auth(
    State(deployment): State<DeploymentImpl>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        return Err(ApiError::Unauthorized("Access token required".to_string()));
    };

    let user = match deployment.auth().authenticate(&token).await {
        Ok(user) => user,
        Err(AuthServiceError::Database(e)) => return Err(ApiError::Database(e)),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            return Err(ApiError::Forbidden("Invalid token".to_string()));
        }
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}
