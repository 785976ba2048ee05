use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use murmur_db::models::{MessageRow, SendOutcome};
use murmur_types::api::{
    MessageListResponse, Pagination, SendMessageRequest, SendMessageResponse,
};
use murmur_types::models::Message;

use crate::error::ApiError;
use crate::extract::{AppJson, AppQuery};
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::validation;

/// Messages a single receiver may get inside [`rate_window`].
pub const RATE_LIMIT: u32 = 10;

pub fn rate_window() -> Duration {
    Duration::hours(1)
}

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

fn to_message(row: MessageRow) -> Message {
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        receiver_id: row.receiver_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt receiver_id '{}' on message '{}': {}", row.receiver_id, row.id, e);
            Uuid::default()
        }),
        created_at: murmur_db::parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on message '{}'", row.created_at, row.id);
            chrono::DateTime::default()
        }),
        content: row.content,
    }
}

/// POST /messages/send/{receiver_id} — no authentication, sender stays anonymous.
pub async fn send_message(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receiver_id: Uuid = receiver_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid receiver ID".to_string()))?;
    let content = validation::message_content(&req.content)?;

    let id = Uuid::new_v4().to_string();
    let receiver = receiver_id.to_string();
    let outcome = state
        .store(move |db| {
            Ok(db.insert_message_rate_limited(
                &id,
                &receiver,
                &content,
                Utc::now(),
                RATE_LIMIT,
                rate_window(),
            )?)
        })
        .await?;

    let row = match outcome {
        SendOutcome::Sent(row) => row,
        SendOutcome::UnknownReceiver => {
            return Err(ApiError::NotFound("Receiver not found".to_string()));
        }
        SendOutcome::RateLimited => {
            warn!("Rate limit hit for receiver {}", receiver_id);
            return Err(ApiError::RateLimited(
                "Too many messages sent. Please try again later.".to_string(),
            ));
        }
    };

    info!("Message {} delivered to {}", row.id, receiver_id);
    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully".to_string(),
            data: to_message(row),
        }),
    ))
}

/// GET /messages — the caller's inbox, newest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AppQuery(query): AppQuery<MessageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = u64::from(page - 1) * u64::from(limit);

    let receiver = auth.user.id.clone();
    let (total, rows) = state
        .store(move |db| {
            let total = db.count_messages_for_receiver(&receiver)?;
            let rows = db.get_messages_for_receiver(&receiver, limit, offset)?;
            Ok((total, rows))
        })
        .await?;

    Ok(Json(MessageListResponse {
        message: "Messages retrieved successfully".to_string(),
        data: rows.into_iter().map(to_message).collect(),
        pagination: Pagination::new(page, limit, total),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_row_maps_to_public_message() {
        let id = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let msg = to_message(MessageRow {
            id: id.to_string(),
            receiver_id: receiver.to_string(),
            content: "hello".to_string(),
            created_at: "2026-03-01T10:00:00.000Z".to_string(),
        });

        assert_eq!(msg.id, id);
        assert_eq!(msg.receiver_id, receiver);
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.created_at.to_rfc3339(), "2026-03-01T10:00:00+00:00");
    }

    #[test]
    fn window_is_one_hour() {
        assert_eq!(rate_window().num_minutes(), 60);
        assert_eq!(RATE_LIMIT, 10);
    }
}
