/// Database row types — these map directly to SQLite rows.
/// Distinct from murmur-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub age: i64,
    pub gender: String,
    /// Encrypted at rest, see murmur-crypto.
    pub phone: Option<String>,
    pub role: String,
    pub is_confirmed: bool,
    pub confirm_otp: Option<String>,
    pub reset_otp: Option<String>,
    /// Unix seconds.
    pub reset_otp_expires_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a brand-new account. All values are already validated,
/// normalized and hashed/encrypted by the caller.
pub struct NewUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub age: i64,
    pub gender: String,
    pub phone: Option<String>,
    pub role: String,
    pub confirm_otp: String,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Default)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    /// A new email always comes with a fresh confirmation OTP hash and
    /// drops the account back to unconfirmed.
    pub email: Option<(String, String)>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.phone.is_none()
            && self.email.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub receiver_id: String,
    pub content: String,
    pub created_at: String,
}

/// Result of a rate-limited message insert.
pub enum SendOutcome {
    Sent(MessageRow),
    UnknownReceiver,
    RateLimited,
}
