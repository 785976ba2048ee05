use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use murmur_db::models::UserRow;
use murmur_types::api::Claims;
use murmur_types::models::Role;

use crate::error::{ApiError, AuthError};
use crate::state::AppState;
use crate::token::TokenKind;

/// Identity attached to a request once the gate has let it through.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserRow,
    pub claims: Claims,
}

impl AuthUser {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.user.role)
    }
}

/// Read a raw token from the header assigned to its class.
/// An optional `Bearer ` prefix is tolerated.
pub fn bearer_token(headers: &HeaderMap, kind: TokenKind) -> Result<String, AuthError> {
    headers
        .get(kind.header())
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::MissingToken(kind))
}

/// Verify an access token and resolve its subject.
///
/// Steps run in order and the first failure is final: signature and
/// expiry, presence of a token identifier, revocation, then the account
/// itself.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = state
        .tokens
        .verify(TokenKind::Access, token)
        .map_err(AuthError::InvalidToken)?;

    let jti = claims
        .jti
        .clone()
        .filter(|jti| !jti.is_empty())
        .ok_or(AuthError::MissingTokenId)?;

    let sub = claims.sub.to_string();
    let user = state
        .store(move |db| {
            if db.is_token_revoked(&jti)? {
                warn!("Rejected revoked token {} for {}", jti, sub);
                return Err(AuthError::Revoked.into());
            }
            db.get_user_by_id(&sub)?
                .ok_or_else(|| AuthError::UnknownSubject.into())
        })
        .await?;

    Ok(AuthUser { user, claims })
}

/// Gate for protected routes: authenticates the `accesstoken` header and
/// stores [`AuthUser`] in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers(), TokenKind::Access)?;
    let auth = authenticate(&state, &token).await?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Role check for an already authenticated request. Must be layered inside
/// [`require_auth`].
pub async fn require_role(role: Role, req: Request, next: Next) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    if auth.role() != Some(role) {
        warn!("User {} denied {} route", auth.user.id, role.as_str());
        return Err(AuthError::Forbidden(role).into());
    }

    Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(Role::Admin, req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_read_from_class_header() {
        let mut headers = HeaderMap::new();
        headers.insert("accesstoken", HeaderValue::from_static("abc.def.ghi"));
        headers.insert("refreshtoken", HeaderValue::from_static("Bearer zzz.yyy.xxx"));

        assert_eq!(bearer_token(&headers, TokenKind::Access).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers, TokenKind::Refresh).unwrap(), "zzz.yyy.xxx");
    }

    #[test]
    fn authorization_header_is_not_consulted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        headers.insert("accesstoken", HeaderValue::from_static("   "));

        assert!(matches!(
            bearer_token(&headers, TokenKind::Access),
            Err(AuthError::MissingToken(TokenKind::Access))
        ));
    }
}
