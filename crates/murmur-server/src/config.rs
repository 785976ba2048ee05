use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use murmur_api::token::{TokenSettings, max_token_ttl};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

pub struct MailRelay {
    pub url: String,
    pub token: Option<String>,
}

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub tokens: TokenSettings,
    pub field_key: [u8; 32],
    pub admin_emails: Vec<String>,
    pub purge_interval_secs: u64,
    pub mail_relay: Option<MailRelay>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let host = or("MURMUR_HOST", "0.0.0.0");
        let port: u16 = or("MURMUR_PORT", "3000")
            .parse()
            .context("MURMUR_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("MURMUR_HOST must be an IP address")?;

        let access_secret = required_secret(get("MURMUR_JWT_ACCESS_SECRET"), "MURMUR_JWT_ACCESS_SECRET")?;
        let refresh_secret = required_secret(get("MURMUR_JWT_REFRESH_SECRET"), "MURMUR_JWT_REFRESH_SECRET")?;
        if access_secret == refresh_secret {
            bail!("MURMUR_JWT_ACCESS_SECRET and MURMUR_JWT_REFRESH_SECRET must differ");
        }

        let access_ttl = token_ttl(&or("MURMUR_ACCESS_TTL_SECS", "3600"), "MURMUR_ACCESS_TTL_SECS")?;
        let refresh_ttl = token_ttl(&or("MURMUR_REFRESH_TTL_SECS", "604800"), "MURMUR_REFRESH_TTL_SECS")?;

        let field_key = get("MURMUR_FIELD_KEY").context(
            "MURMUR_FIELD_KEY is unset; generate 32 random bytes and set their base64 encoding",
        )?;
        let field_key = murmur_crypto::keys::key_from_base64(&field_key)
            .context("MURMUR_FIELD_KEY is not a valid key")?;

        let admin_emails = get("MURMUR_ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_ascii_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let purge_interval_secs: u64 = or("MURMUR_PURGE_INTERVAL_SECS", "300")
            .parse()
            .context("MURMUR_PURGE_INTERVAL_SECS must be a number of seconds")?;
        if purge_interval_secs == 0 {
            bail!("MURMUR_PURGE_INTERVAL_SECS must be positive");
        }

        let mail_relay = get("MURMUR_MAIL_RELAY_URL").map(|url| MailRelay {
            url,
            token: get("MURMUR_MAIL_RELAY_TOKEN"),
        });

        Ok(Self {
            addr,
            db_path: or("MURMUR_DB_PATH", "murmur.db").into(),
            tokens: TokenSettings {
                issuer: or("MURMUR_JWT_ISSUER", "murmur"),
                audience: or("MURMUR_JWT_AUDIENCE", "murmur-clients"),
                access_secret,
                refresh_secret,
                access_ttl,
                refresh_ttl,
            },
            field_key,
            admin_emails,
            purge_interval_secs,
            mail_relay,
            mail_from: or("MURMUR_MAIL_FROM", "Murmur <no-reply@murmur.local>"),
        })
    }
}

fn token_ttl(raw: &str, key: &str) -> Result<Duration> {
    let secs: i64 = raw
        .parse()
        .with_context(|| format!("{} must be a number of seconds", key))?;
    match Duration::try_seconds(secs) {
        Some(ttl) if ttl > Duration::zero() && ttl <= max_token_ttl() => Ok(ttl),
        _ => bail!(
            "{} must be between 1 and {} seconds",
            key,
            max_token_ttl().num_seconds()
        ),
    }
}

fn required_secret(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(secret) if !PLACEHOLDER_SECRETS.contains(&secret.as_str()) => Ok(secret),
        Some(_) => bail!("{} is still a placeholder; set a random value", key),
        None => bail!("{} is unset", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, String> {
        HashMap::from([
            ("MURMUR_JWT_ACCESS_SECRET", "a-long-access-secret".to_string()),
            ("MURMUR_JWT_REFRESH_SECRET", "a-long-refresh-secret".to_string()),
            (
                "MURMUR_FIELD_KEY",
                murmur_crypto::keys::key_to_base64(&[9u8; 32]),
            ),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config> {
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base()).unwrap();
        assert_eq!(config.addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.db_path, PathBuf::from("murmur.db"));
        assert_eq!(config.tokens.access_ttl, Duration::hours(1));
        assert_eq!(config.tokens.refresh_ttl, Duration::days(7));
        assert_eq!(config.purge_interval_secs, 300);
        assert!(config.mail_relay.is_none());
        assert!(config.admin_emails.is_empty());
        assert_eq!(config.field_key, [9u8; 32]);
    }

    #[test]
    fn placeholder_and_shared_secrets_are_refused() {
        let mut vars = base();
        vars.insert("MURMUR_JWT_ACCESS_SECRET", "dev-secret-change-me".into());
        assert!(load(&vars).is_err());

        let mut vars = base();
        vars.insert("MURMUR_JWT_REFRESH_SECRET", "a-long-access-secret".into());
        assert!(load(&vars).is_err());

        let mut vars = base();
        vars.insert("MURMUR_JWT_REFRESH_SECRET", "   ".into());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn token_lifetimes_are_bounded() {
        for raw in ["0", "-5", "9223372036854775", "315360001", "soon"] {
            let mut vars = base();
            vars.insert("MURMUR_REFRESH_TTL_SECS", raw.into());
            assert!(load(&vars).is_err(), "accepted refresh ttl {raw}");
        }

        let mut vars = base();
        vars.insert("MURMUR_ACCESS_TTL_SECS", "900".into());
        vars.insert("MURMUR_REFRESH_TTL_SECS", "315360000".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.tokens.access_ttl, Duration::minutes(15));
        assert_eq!(config.tokens.refresh_ttl, Duration::days(3650));
    }

    #[test]
    fn field_key_is_required() {
        let mut vars = base();
        vars.remove("MURMUR_FIELD_KEY");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn admin_list_is_normalized() {
        let mut vars = base();
        vars.insert("MURMUR_ADMIN_EMAILS", " Root@Murmur.dev, ,ops@murmur.dev".into());
        let config = load(&vars).unwrap();
        assert_eq!(config.admin_emails, vec!["root@murmur.dev", "ops@murmur.dev"]);
    }
}
