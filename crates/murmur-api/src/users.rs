use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use murmur_crypto::field::{decrypt_field, encrypt_field};
use murmur_db::models::{UserRow, UserUpdate};
use murmur_notify::templates;
use murmur_types::api::{
    DeleteUserResponse, DeletedUser, UpdateUserRequest, UserListResponse, UserResponse,
};
use murmur_types::models::{Gender, Role, User};

use crate::error::ApiError;
use crate::extract::AppJson;
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};
use crate::{otp, password, validation};

/// Convert a stored row into the public view, decrypting the phone number.
/// Corrupt columns are logged and replaced with defaults rather than
/// failing the whole response.
pub fn public_user(row: &UserRow, field_key: &[u8; 32]) -> User {
    let phone_number = row.phone.as_deref().and_then(|sealed| {
        decrypt_field(field_key, sealed)
            .map_err(|e| warn!("Cannot decrypt phone for user '{}': {}", row.id, e))
            .ok()
    });

    User {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt user id '{}': {}", row.id, e);
            Uuid::default()
        }),
        full_name: format!("{} {}", row.first_name, row.last_name),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        email: row.email.clone(),
        age: u8::try_from(row.age).unwrap_or_default(),
        gender: Gender::parse(&row.gender).unwrap_or_else(|| {
            warn!("Corrupt gender '{}' on user '{}'", row.gender, row.id);
            Gender::default()
        }),
        phone_number,
        role: Role::parse(&row.role).unwrap_or_else(|| {
            warn!("Corrupt role '{}' on user '{}'", row.role, row.id);
            Role::User
        }),
        is_confirmed: row.is_confirmed,
        created_at: murmur_db::parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on user '{}'", row.created_at, row.id);
            chrono::DateTime::default()
        }),
    }
}

/// PUT /users/update
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = validation::update(req)?;
    let current = auth.user;

    // Re-submitting the current email is not a change.
    let new_email = input.email.filter(|email| *email != current.email);
    let confirmation = match new_email {
        Some(email) => {
            let code = otp::generate();
            let hashed = {
                let code = code.clone();
                blocking(move || Ok(password::hash_password(&code)?)).await?
            };
            Some((email, code, hashed))
        }
        None => None,
    };

    let update = UserUpdate {
        first_name: input.first_name,
        last_name: input.last_name,
        age: input.age,
        gender: input.gender.map(|g| g.as_str().to_string()),
        phone: input
            .phone
            .as_deref()
            .map(|p| encrypt_field(&state.field_key, p))
            .transpose()?,
        email: confirmation
            .as_ref()
            .map(|(email, _, hashed)| (email.clone(), hashed.clone())),
    };

    let id = current.id.clone();
    let row = state
        .store(move |db| {
            db.update_user(&id, &update).map_err(|e| {
                if murmur_db::is_unique_violation(&e) {
                    ApiError::Conflict("Email or full name already in use".to_string())
                } else {
                    ApiError::Internal(e)
                }
            })?;
            db.get_user_by_id(&id)?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
        })
        .await?;

    if let Some((email, code, _)) = confirmation {
        info!("User {} changed email, confirmation required", row.id);
        state
            .outbox
            .enqueue(templates::confirmation_email(&email, &row.first_name, &code));
    }

    Ok(Json(UserResponse {
        message: "User updated successfully".to_string(),
        user: public_user(&row, &state.field_key),
    }))
}

/// DELETE /users/delete — removes the account and every message it received.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = auth.user;

    let id = user.id.clone();
    let deleted_messages = state
        .store(move |db| {
            db.delete_user(&id)?
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
        })
        .await?;

    info!("User {} deleted with {} messages", user.id, deleted_messages);

    let public = public_user(&user, &state.field_key);
    Ok(Json(DeleteUserResponse {
        message: "User deleted successfully".to_string(),
        deleted_user: DeletedUser {
            id: public.id,
            email: public.email,
            full_name: public.full_name,
            deleted_messages,
        },
    }))
}

/// GET /users/list-users — admin only.
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store(|db| Ok(db.list_users()?)).await?;

    let users: Vec<User> = rows
        .iter()
        .map(|row| public_user(row, &state.field_key))
        .collect();

    Ok(Json(UserListResponse {
        message: "Users retrieved successfully".to_string(),
        count: users.len(),
        users,
    }))
}
