use std::sync::Arc;

use tracing::error;

use murmur_db::Database;
use murmur_notify::Outbox;

use crate::error::ApiError;
use crate::token::TokenCodec;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenCodec,
    /// AES-256-GCM key for encrypted profile fields.
    pub field_key: [u8; 32],
    pub outbox: Outbox,
    /// Accounts signing up with one of these (lowercase) emails get the admin role.
    pub admin_emails: Vec<String>,
}

impl AppStateInner {
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e == email)
    }

    /// Run blocking store work off the async runtime.
    pub async fn store<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        blocking(move || f(&state.db)).await
    }
}

/// Run CPU-heavy or blocking work (Argon2, SQLite) on the blocking pool.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed"))
    })?
}
