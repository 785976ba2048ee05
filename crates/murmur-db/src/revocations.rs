//! Revoked token identifiers.
//!
//! A row lives exactly as long as the token it revokes: `expires_at` is the
//! token's own `exp`, and [`Database::purge_expired_revocations`] drops rows
//! once that moment has passed. Past its `exp` a token is rejected by
//! signature validation anyway, so the row is no longer needed.

use anyhow::Result;

use crate::Database;

impl Database {
    /// Record `jti` as revoked until `expires_at` (unix seconds).
    ///
    /// Fails with a primary-key violation if the identifier is already
    /// present; see [`crate::is_unique_violation`].
    pub fn revoke_token(&self, jti: &str, expires_at: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO revoked_tokens (jti, expires_at) VALUES (?1, ?2)",
                rusqlite::params![jti, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let revoked: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = ?1)",
                [jti],
                |row| row.get(0),
            )?;
            Ok(revoked)
        })
    }

    /// Delete every revocation whose token has expired by `now`.
    pub fn purge_expired_revocations(&self, now: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let purged = conn.execute(
                "DELETE FROM revoked_tokens WHERE expires_at <= ?1",
                [now],
            )?;
            Ok(purged)
        })
    }

    pub fn count_revocations(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM revoked_tokens", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    #[test]
    fn revoke_then_lookup() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.is_token_revoked("jti-1").unwrap());

        db.revoke_token("jti-1", 2_000).unwrap();
        assert!(db.is_token_revoked("jti-1").unwrap());
        assert!(!db.is_token_revoked("jti-2").unwrap());
    }

    #[test]
    fn second_revoke_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.revoke_token("jti-1", 2_000).unwrap();

        let err = db.revoke_token("jti-1", 2_000).unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(db.is_token_revoked("jti-1").unwrap());
    }

    #[test]
    fn purge_only_drops_expired_rows() {
        let db = Database::open_in_memory().unwrap();
        db.revoke_token("old", 1_000).unwrap();
        db.revoke_token("edge", 1_500).unwrap();
        db.revoke_token("fresh", 9_000).unwrap();

        assert_eq!(db.purge_expired_revocations(1_500).unwrap(), 2);
        assert_eq!(db.count_revocations().unwrap(), 1);
        assert!(db.is_token_revoked("fresh").unwrap());
        assert!(!db.is_token_revoked("old").unwrap());

        assert_eq!(db.purge_expired_revocations(1_500).unwrap(), 0);
    }
}
