use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use murmur_crypto::field::encrypt_field;
use murmur_db::models::NewUser;
use murmur_notify::templates;
use murmur_types::api::{
    ConfirmEmailRequest, ForgotPasswordRequest, RefreshResponse, ResetPasswordRequest,
    SigninRequest, SigninResponse, SignupRequest, StatusResponse, UserResponse,
};
use murmur_types::models::Role;

use crate::error::ApiError;
use crate::extract::AppJson;
use crate::middleware::{AuthUser, bearer_token};
use crate::state::{AppState, blocking};
use crate::token::TokenKind;
use crate::users::public_user;
use crate::{otp, password, session, validation};

fn status(message: &str) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: message.to_string(),
    })
}

/// POST /users/signup
pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = validation::signup(req)?;

    let role = if state.is_admin_email(&input.email) {
        Role::Admin
    } else {
        Role::User
    };
    let phone = input
        .phone
        .as_deref()
        .map(|p| encrypt_field(&state.field_key, p))
        .transpose()?;

    let code = otp::generate();
    let (password_hash, otp_hash) = {
        let password = input.password.clone();
        let code = code.clone();
        blocking(move || {
            Ok((
                password::hash_password(&password)?,
                password::hash_password(&code)?,
            ))
        })
        .await?
    };

    let id = Uuid::new_v4().to_string();
    let new_user = NewUser {
        id: id.clone(),
        first_name: input.first_name,
        last_name: input.last_name,
        email: input.email,
        password_hash,
        age: input.age,
        gender: input.gender.as_str().to_string(),
        phone,
        role: role.as_str().to_string(),
        confirm_otp: otp_hash,
    };

    let row = state
        .store(move |db| {
            db.create_user(&new_user).map_err(|e| {
                if murmur_db::is_unique_violation(&e) {
                    ApiError::Conflict("User already exists".to_string())
                } else {
                    ApiError::Internal(e)
                }
            })?;
            db.get_user_by_id(&id)?
                .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user {} missing after insert", id)))
        })
        .await?;

    state
        .outbox
        .enqueue(templates::confirmation_email(&row.email, &row.first_name, &code));
    info!("New {} account {}", row.role, row.id);

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "User created successfully".to_string(),
            user: public_user(&row, &state.field_key),
        }),
    ))
}

/// POST /users/signin
pub async fn signin(
    State(state): State<AppState>,
    AppJson(req): AppJson<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = validation::signin(req)?;
    let tokens = session::signin(&state, email, password).await?;

    Ok(Json(SigninResponse {
        message: "User signed in successfully".to_string(),
        access_token: tokens.access.token,
        refresh_token: tokens.refresh.token,
    }))
}

/// POST /users/signout — runs behind the gate, revokes the presented token.
pub async fn signout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    session::signout(&state, &auth.claims).await?;
    Ok(status("User signed out successfully"))
}

/// POST /users/refresh-token — reads the `refreshtoken` header.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers, TokenKind::Refresh)?;
    let access = session::refresh(&state, &token).await?;

    Ok(Json(RefreshResponse {
        message: "Access token refreshed successfully".to_string(),
        access_token: access.token,
    }))
}

/// PUT /users/confirm-otp
pub async fn confirm_email(
    State(state): State<AppState>,
    AppJson(req): AppJson<ConfirmEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, code) = validation::confirm_email(req)?;

    let user = state
        .store(move |db| {
            db.get_user_by_email(&email)?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
        })
        .await?;

    if user.is_confirmed {
        return Err(ApiError::BadRequest("Email already confirmed".to_string()));
    }
    let Some(otp_hash) = user.confirm_otp.clone() else {
        return Err(ApiError::BadRequest("No pending email confirmation".to_string()));
    };

    let matches = blocking(move || Ok(password::verify_password(&code, &otp_hash)?)).await?;
    if !matches {
        warn!("Wrong confirmation code for {}", user.id);
        return Err(ApiError::Unauthorized("Invalid OTP".to_string()));
    }

    let id = user.id.clone();
    state.store(move |db| Ok(db.confirm_email(&id)?)).await?;

    info!("User {} confirmed email", user.id);
    Ok(status("Email confirmed successfully"))
}

const RESET_REQUESTED: &str = "If an account exists for this email, a reset code has been sent";

/// POST /users/forgot-password — same answer whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validation::forgot_password(req)?;

    let user = state
        .store(move |db| Ok(db.get_user_by_email(&email)?))
        .await?;
    let Some(user) = user else {
        return Ok(status(RESET_REQUESTED));
    };

    let code = otp::generate();
    let otp_hash = {
        let code = code.clone();
        blocking(move || Ok(password::hash_password(&code)?)).await?
    };
    let ttl = otp::reset_otp_ttl();
    let expires_at = (Utc::now() + ttl).timestamp();

    let id = user.id.clone();
    state
        .store(move |db| Ok(db.set_reset_otp(&id, &otp_hash, expires_at)?))
        .await?;

    state.outbox.enqueue(templates::password_reset_email(
        &user.email,
        &user.first_name,
        &code,
        ttl.num_minutes(),
    ));
    info!("Password reset requested for {}", user.id);

    Ok(status(RESET_REQUESTED))
}

/// POST /users/reset-password
///
/// Does not revoke outstanding refresh tokens.
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = validation::reset_password(req)?;

    let email = input.email.clone();
    let user = state
        .store(move |db| {
            db.get_user_by_email(&email)?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
        })
        .await?;

    let (Some(otp_hash), Some(expires_at)) = (user.reset_otp.clone(), user.reset_otp_expires_at)
    else {
        return Err(ApiError::BadRequest("No pending password reset".to_string()));
    };
    if expires_at <= Utc::now().timestamp() {
        return Err(ApiError::Unauthorized("OTP has expired".to_string()));
    }

    let code = input.otp;
    let new_password = input.new_password;
    let new_hash = blocking(move || {
        if !password::verify_password(&code, &otp_hash)? {
            return Ok(None);
        }
        Ok(Some(password::hash_password(&new_password)?))
    })
    .await?;
    let Some(new_hash) = new_hash else {
        warn!("Wrong reset code for {}", user.id);
        return Err(ApiError::Unauthorized("Invalid OTP".to_string()));
    };

    let id = user.id.clone();
    state
        .store(move |db| Ok(db.reset_password(&id, &new_hash)?))
        .await?;

    info!("Password reset for {}", user.id);
    Ok(status("Password reset successfully"))
}
