//! Session lifecycle: signin, signout and access token refresh.
//!
//! Signout revokes only the presented access token. Refresh tokens are not
//! single-use and survive signout and password changes; they stop working
//! when they expire or the account is deleted.

use tracing::{info, warn};
use uuid::Uuid;

use murmur_types::api::Claims;

use crate::error::{ApiError, AuthError};
use crate::password;
use crate::state::{AppState, blocking};
use crate::token::{IssuedToken, Subject, TokenKind};

pub struct SessionTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

fn signing_failed(e: crate::token::TokenError) -> ApiError {
    ApiError::Internal(anyhow::Error::new(e))
}

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", raw, e)))
}

/// Check credentials and mint an access/refresh pair.
///
/// Unknown email and wrong password fail identically, and both run one
/// Argon2 verification.
pub async fn signin(state: &AppState, email: String, password: String) -> Result<SessionTokens, ApiError> {
    let user = state
        .store(move |db| Ok(db.get_user_by_email(&email)?))
        .await?;

    let (user, verified) = blocking(move || {
        let verified = match &user {
            Some(u) => password::verify_password(&password, &u.password)?,
            None => {
                password::verify_against_dummy(&password);
                false
            }
        };
        Ok((user, verified))
    })
    .await?;

    let user = match user {
        Some(u) if verified => u,
        _ => {
            warn!("Failed signin attempt");
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let subject = Subject {
        id: parse_user_id(&user.id)?,
        email: &user.email,
    };
    let access = state
        .tokens
        .issue(TokenKind::Access, &subject)
        .map_err(signing_failed)?;
    let refresh = state
        .tokens
        .issue(TokenKind::Refresh, &subject)
        .map_err(signing_failed)?;

    info!("User {} signed in", user.id);
    Ok(SessionTokens { access, refresh })
}

/// Revoke the access token described by `claims` until its own expiry.
pub async fn signout(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    let jti = claims
        .jti
        .clone()
        .filter(|jti| !jti.is_empty())
        .ok_or(AuthError::MissingTokenId)?;
    let expires_at = claims.exp;

    let revoked_jti = jti.clone();
    state
        .store(move |db| {
            db.revoke_token(&revoked_jti, expires_at).map_err(|e| {
                if murmur_db::is_unique_violation(&e) {
                    AuthError::AlreadyRevoked.into()
                } else {
                    ApiError::Internal(e)
                }
            })
        })
        .await?;

    info!("User {} signed out, token {} revoked", claims.sub, jti);
    Ok(())
}

/// Mint a fresh access token from a valid refresh token.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<IssuedToken, ApiError> {
    let claims = state
        .tokens
        .verify(TokenKind::Refresh, refresh_token)
        .map_err(AuthError::InvalidToken)?;

    let sub = claims.sub.to_string();
    let user = state
        .store(move |db| {
            db.get_user_by_id(&sub)?
                .ok_or_else(|| AuthError::UnknownSubject.into())
        })
        .await?;

    let subject = Subject {
        id: claims.sub,
        email: &user.email,
    };
    let access = state
        .tokens
        .issue(TokenKind::Access, &subject)
        .map_err(signing_failed)?;

    info!("Access token refreshed for {}", user.id);
    Ok(access)
}
