use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, messages, revoked_tokens)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                first_name              TEXT NOT NULL,
                last_name               TEXT NOT NULL,
                email                   TEXT NOT NULL,
                password                TEXT NOT NULL,
                age                     INTEGER NOT NULL,
                gender                  TEXT NOT NULL DEFAULT 'male',
                phone                   TEXT,
                role                    TEXT NOT NULL DEFAULT 'user',
                is_confirmed            INTEGER NOT NULL DEFAULT 0,
                confirm_otp             TEXT,
                reset_otp               TEXT,
                reset_otp_expires_at    INTEGER,
                created_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE UNIQUE INDEX idx_users_email ON users(email);
            CREATE UNIQUE INDEX idx_users_full_name ON users(first_name, last_name);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                receiver_id     TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_receiver
                ON messages(receiver_id, created_at);

            CREATE TABLE revoked_tokens (
                jti         TEXT PRIMARY KEY,
                expires_at  INTEGER NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_revoked_tokens_expiry
                ON revoked_tokens(expires_at);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
