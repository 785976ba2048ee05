use crate::models::{MessageRow, NewUser, SendOutcome, UserRow, UserUpdate};
use crate::{Database, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

const USER_COLUMNS: &str = "id, first_name, last_name, email, password, age, gender, phone, role, \
     is_confirmed, confirm_otp, reset_otp, reset_otp_expires_at, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, first_name, last_name, email, password, age, gender, phone, role, confirm_otp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    user.id,
                    user.first_name,
                    user.last_name,
                    user.email,
                    user.password_hash,
                    user.age,
                    user.gender,
                    user.phone,
                    user.role,
                    user.confirm_otp,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark the account confirmed and burn the confirmation OTP.
    pub fn confirm_email(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_confirmed = 1, confirm_otp = NULL, updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id, format_timestamp(Utc::now())],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn set_reset_otp(&self, id: &str, otp_hash: &str, expires_at: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET reset_otp = ?2, reset_otp_expires_at = ?3, updated_at = ?4 WHERE id = ?1",
                rusqlite::params![id, otp_hash, expires_at, format_timestamp(Utc::now())],
            )?;
            Ok(changed == 1)
        })
    }

    /// Store a new password hash and burn the reset OTP in one statement.
    pub fn reset_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET password = ?2, reset_otp = NULL, reset_otp_expires_at = NULL, updated_at = ?3
                 WHERE id = ?1",
                rusqlite::params![id, password_hash, format_timestamp(Utc::now())],
            )?;
            Ok(changed == 1)
        })
    }

    /// Apply a partial profile update. Uniqueness on email and name pair is
    /// enforced by the schema; callers classify the error with
    /// [`crate::is_unique_violation`].
    pub fn update_user(&self, id: &str, update: &UserUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Value> = vec![Value::Text(id.to_string())];

        let mut push = |column: &'static str, value: Value| {
            values.push(value);
            sets.push(column);
        };

        if let Some(v) = &update.first_name {
            push("first_name", Value::Text(v.clone()));
        }
        if let Some(v) = &update.last_name {
            push("last_name", Value::Text(v.clone()));
        }
        if let Some(v) = update.age {
            push("age", Value::Integer(v));
        }
        if let Some(v) = &update.gender {
            push("gender", Value::Text(v.clone()));
        }
        if let Some(v) = &update.phone {
            push("phone", Value::Text(v.clone()));
        }
        if let Some((email, otp_hash)) = &update.email {
            push("email", Value::Text(email.clone()));
            push("confirm_otp", Value::Text(otp_hash.clone()));
            push("is_confirmed", Value::Integer(0));
        }
        push("updated_at", Value::Text(format_timestamp(Utc::now())));

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 2))
            .collect();
        let sql = format!("UPDATE users SET {} WHERE id = ?1", assignments.join(", "));

        self.with_conn_mut(|conn| {
            let changed = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
            Ok(changed == 1)
        })
    }

    /// Delete a user together with every message they received.
    ///
    /// Both deletes run in one transaction: either the account and its
    /// messages are gone, or nothing changed. Returns the number of deleted
    /// messages, or `None` if the user did not exist.
    pub fn delete_user(&self, id: &str) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let deleted_messages =
                tx.execute("DELETE FROM messages WHERE receiver_id = ?1", [id])?;
            let deleted_users = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;

            if deleted_users == 0 {
                tx.rollback()?;
                return Ok(None);
            }

            tx.commit()?;
            debug!("Deleted user {} and {} messages", id, deleted_messages);
            Ok(Some(deleted_messages))
        })
    }

    // -- Messages --

    /// Insert an anonymous message unless the receiver is unknown or has
    /// already received `limit` messages inside the trailing `window`.
    ///
    /// The receiver check, the window count and the insert share one
    /// immediate transaction, so concurrent senders cannot overshoot.
    pub fn insert_message_rate_limited(
        &self,
        id: &str,
        receiver_id: &str,
        content: &str,
        now: DateTime<Utc>,
        limit: u32,
        window: Duration,
    ) -> Result<SendOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let receiver_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                [receiver_id],
                |row| row.get(0),
            )?;
            if !receiver_exists {
                return Ok(SendOutcome::UnknownReceiver);
            }

            let cutoff = format_timestamp(now - window);
            let recent: u32 = tx.query_row(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND created_at >= ?2",
                rusqlite::params![receiver_id, cutoff],
                |row| row.get(0),
            )?;
            if recent >= limit {
                return Ok(SendOutcome::RateLimited);
            }

            let created_at = format_timestamp(now);
            tx.execute(
                "INSERT INTO messages (id, receiver_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, receiver_id, content, created_at],
            )?;
            tx.commit()?;

            Ok(SendOutcome::Sent(MessageRow {
                id: id.to_string(),
                receiver_id: receiver_id.to_string(),
                content: content.to_string(),
                created_at,
            }))
        })
    }

    /// Newest first.
    pub fn get_messages_for_receiver(
        &self,
        receiver_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, receiver_id, content, created_at
                 FROM messages
                 WHERE receiver_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![receiver_id, limit, offset as i64], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        receiver_id: row.get(1)?,
                        content: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_messages_for_receiver(&self, receiver_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1",
                [receiver_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn query_user(conn: &Connection, column: &'static str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt.query_row([value], map_user).optional()?;

    Ok(row)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password: row.get(4)?,
        age: row.get(5)?,
        gender: row.get(6)?,
        phone: row.get(7)?,
        role: row.get(8)?,
        is_confirmed: row.get(9)?,
        confirm_otp: row.get(10)?,
        reset_otp: row.get(11)?,
        reset_otp_expires_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn new_user(id: &str, email: &str, first: &str, last: &str) -> NewUser {
        NewUser {
            id: id.into(),
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            password_hash: "hash".into(),
            age: 30,
            gender: "female".into(),
            phone: None,
            role: "user".into(),
            confirm_otp: "otp-hash".into(),
        }
    }

    fn send(db: &Database, receiver: &str, now: DateTime<Utc>) -> SendOutcome {
        db.insert_message_rate_limited(
            &uuid::Uuid::new_v4().to_string(),
            receiver,
            "hello",
            now,
            10,
            Duration::hours(1),
        )
        .unwrap()
    }

    #[test]
    fn email_and_full_name_are_unique() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();

        let dup_email = db
            .create_user(&new_user("u2", "a@b.com", "grace", "hopper"))
            .unwrap_err();
        assert!(is_unique_violation(&dup_email));

        let dup_name = db
            .create_user(&new_user("u3", "c@d.com", "ada", "lovelace"))
            .unwrap_err();
        assert!(is_unique_violation(&dup_name));

        db.create_user(&new_user("u4", "c@d.com", "ada", "byron")).unwrap();
    }

    #[test]
    fn lookups_by_email_and_id() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();

        let by_email = db.get_user_by_email("a@b.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert!(!by_email.is_confirmed);
        assert_eq!(by_email.confirm_otp.as_deref(), Some("otp-hash"));

        assert!(db.get_user_by_id("u1").unwrap().is_some());
        assert!(db.get_user_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn confirm_and_reset_burn_otps() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();

        assert!(db.confirm_email("u1").unwrap());
        let row = db.get_user_by_id("u1").unwrap().unwrap();
        assert!(row.is_confirmed);
        assert!(row.confirm_otp.is_none());

        assert!(db.set_reset_otp("u1", "reset-hash", 1_000).unwrap());
        assert!(db.reset_password("u1", "new-hash").unwrap());
        let row = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.password, "new-hash");
        assert!(row.reset_otp.is_none());
        assert!(row.reset_otp_expires_at.is_none());
    }

    #[test]
    fn email_change_drops_confirmation() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();
        db.confirm_email("u1").unwrap();

        let update = UserUpdate {
            age: Some(41),
            email: Some(("new@b.com".into(), "fresh-otp".into())),
            ..Default::default()
        };
        assert!(db.update_user("u1", &update).unwrap());

        let row = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.email, "new@b.com");
        assert_eq!(row.age, 41);
        assert!(!row.is_confirmed);
        assert_eq!(row.confirm_otp.as_deref(), Some("fresh-otp"));
        assert_eq!(row.first_name, "ada");
    }

    #[test]
    fn update_into_taken_name_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();
        db.create_user(&new_user("u2", "c@d.com", "grace", "hopper")).unwrap();

        let update = UserUpdate {
            first_name: Some("ada".into()),
            last_name: Some("lovelace".into()),
            ..Default::default()
        };
        let err = db.update_user("u2", &update).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn delete_cascades_to_received_messages() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();
        db.create_user(&new_user("u2", "c@d.com", "grace", "hopper")).unwrap();

        let now = Utc::now();
        for _ in 0..3 {
            assert!(matches!(send(&db, "u1", now), SendOutcome::Sent(_)));
        }
        assert!(matches!(send(&db, "u2", now), SendOutcome::Sent(_)));

        assert_eq!(db.delete_user("u1").unwrap(), Some(3));
        assert_eq!(db.count_messages_for_receiver("u1").unwrap(), 0);
        assert_eq!(db.count_messages_for_receiver("u2").unwrap(), 1);
        assert!(db.get_user_by_id("u1").unwrap().is_none());

        assert_eq!(db.delete_user("u1").unwrap(), None);
    }

    #[test]
    fn eleventh_message_in_an_hour_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();

        let now = Utc::now();
        for i in 0..10 {
            assert!(
                matches!(send(&db, "u1", now), SendOutcome::Sent(_)),
                "message {} should pass",
                i + 1
            );
        }
        assert!(matches!(send(&db, "u1", now), SendOutcome::RateLimited));
        assert_eq!(db.count_messages_for_receiver("u1").unwrap(), 10);
    }

    #[test]
    fn rate_window_rolls() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();

        let earlier = Utc::now() - Duration::minutes(61);
        for _ in 0..10 {
            send(&db, "u1", earlier);
        }
        assert!(matches!(send(&db, "u1", Utc::now()), SendOutcome::Sent(_)));
    }

    #[test]
    fn unknown_receiver_reported() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(send(&db, "ghost", Utc::now()), SendOutcome::UnknownReceiver));
    }

    #[test]
    fn messages_page_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("u1", "a@b.com", "ada", "lovelace")).unwrap();

        let base = Utc::now() - Duration::minutes(10);
        for i in 0..5 {
            db.insert_message_rate_limited(
                &format!("m{i}"),
                "u1",
                &format!("msg {i}"),
                base + Duration::minutes(i),
                10,
                Duration::hours(1),
            )
            .unwrap();
        }

        let page = db.get_messages_for_receiver("u1", 2, 0).unwrap();
        assert_eq!(page.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["m4", "m3"]);

        let last = db.get_messages_for_receiver("u1", 2, 4).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, "m0");
    }
}
