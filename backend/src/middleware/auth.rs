//! Authentication middleware
//!
//! Staff requests carry a bearer JWT issued elsewhere. The middleware checks
//! it and leaves an [`AuthUser`] in the request extensions for handlers.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{permission_key, Action, Actor, Resource};
use crate::AppState;

/// Authenticated staff member extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_key(resource, action);
        self.permissions.iter().any(|p| *p == permission)
    }

    /// The user as the actor of a change guarded by `resource:action`
    pub fn actor(&self, resource: Resource, action: Action) -> Actor {
        Actor::new(self.user_id, self.has_permission(resource, action))
    }

    /// Fail with `InsufficientPermissions` unless the user holds the permission
    pub fn require(&self, resource: Resource, action: Action) -> Result<(), AppError> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                permission = %permission_key(resource, action),
                "Permission denied"
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Decode and validate a staff token
pub fn decode_jwt(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
        permissions: claims.permissions,
    })
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token.to_owned(),
        None => return AppError::Unauthorized.into_response(),
    };

    let auth_user = match decode_jwt(&token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
