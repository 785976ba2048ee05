use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};

use murmur_types::api::StatusResponse;

use crate::error::ApiError;
use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{auth, messages, users};

/// Build the HTTP surface. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users/signup", post(auth::signup))
        .route("/users/signin", post(auth::signin))
        .route("/users/confirm-otp", put(auth::confirm_email))
        .route("/users/forgot-password", post(auth::forgot_password))
        .route("/users/reset-password", post(auth::reset_password))
        .route("/users/refresh-token", post(auth::refresh_token))
        .route("/messages/send/{receiver_id}", post(messages::send_message))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/users/signout", post(auth::signout))
        .route("/users/update", put(users::update_user))
        .route("/users/delete", delete(users::delete_user))
        .route("/messages", get(messages::get_messages))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Layers run outside-in from the last added, so the gate runs before the role check.
    let admin_routes = Router::new()
        .route("/users/list-users", get(users::list_users))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "ok".to_string(),
    })
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
