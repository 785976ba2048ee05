//! Signed, expiring bearer tokens.
//!
//! Two token classes exist. Access tokens authenticate requests; refresh
//! tokens only mint new access tokens. Each class has its own HS256 secret,
//! and [`TokenCodec`] is the only place that picks one, so a token of one
//! class can never verify as the other.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use murmur_types::api::Claims;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Request header the token travels in.
    pub fn header(&self) -> &'static str {
        match self {
            TokenKind::Access => "accesstoken",
            TokenKind::Refresh => "refreshtoken",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Access => "Access token",
            TokenKind::Refresh => "Refresh token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    /// Well-formed and correctly signed, but issuer or audience is wrong.
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Identity embedded in a token.
pub struct Subject<'a> {
    pub id: Uuid,
    pub email: &'a str,
}

pub struct IssueOptions<'a> {
    pub issuer: &'a str,
    pub audience: &'a str,
    pub ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign a token for `subject` with a fresh random identifier.
pub fn issue(subject: &Subject<'_>, secret: &[u8], opts: &IssueOptions<'_>) -> Result<IssuedToken, TokenError> {
    issue_at(subject, secret, opts, Utc::now())
}

fn issue_at(
    subject: &Subject<'_>,
    secret: &[u8],
    opts: &IssueOptions<'_>,
    now: DateTime<Utc>,
) -> Result<IssuedToken, TokenError> {
    let expires_at = now
        .checked_add_signed(opts.ttl)
        .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))?;
    let jti = Uuid::new_v4().to_string();

    let claims = Claims {
        sub: subject.id,
        email: subject.email.to_string(),
        iss: opts.issuer.to_string(),
        aud: opts.audience.to_string(),
        jti: Some(jti.clone()),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))?;

    Ok(IssuedToken {
        token,
        jti,
        expires_at,
    })
}

/// Check signature, expiry (no leeway), issuer and audience.
pub fn verify(token: &str, secret: &[u8], issuer: &str, audience: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(classify)
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::ImmatureSignature => TokenError::Rejected(err.to_string()),
        _ => TokenError::Malformed(err.to_string()),
    }
}

/// Upper bound on either token lifetime.
pub fn max_token_ttl() -> Duration {
    Duration::days(3650)
}

pub struct TokenSettings {
    pub issuer: String,
    pub audience: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// Both token classes behind one handle.
pub struct TokenCodec {
    settings: TokenSettings,
}

impl TokenCodec {
    pub fn new(settings: TokenSettings) -> Result<Self> {
        if settings.access_secret.is_empty() || settings.refresh_secret.is_empty() {
            bail!("JWT secrets must not be empty");
        }
        if settings.access_secret == settings.refresh_secret {
            bail!("Access and refresh secrets must differ");
        }
        for ttl in [settings.access_ttl, settings.refresh_ttl] {
            if ttl <= Duration::zero() || ttl > max_token_ttl() {
                bail!("Token lifetimes must be positive and at most {} days", max_token_ttl().num_days());
            }
        }
        Ok(Self { settings })
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.settings.access_secret.as_bytes(),
            TokenKind::Refresh => self.settings.refresh_secret.as_bytes(),
        }
    }

    fn options(&self, kind: TokenKind) -> IssueOptions<'_> {
        IssueOptions {
            issuer: &self.settings.issuer,
            audience: &self.settings.audience,
            ttl: match kind {
                TokenKind::Access => self.settings.access_ttl,
                TokenKind::Refresh => self.settings.refresh_ttl,
            },
        }
    }

    pub fn issue(&self, kind: TokenKind, subject: &Subject<'_>) -> Result<IssuedToken, TokenError> {
        issue(subject, self.secret(kind), &self.options(kind))
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        verify(token, self.secret(kind), &self.settings.issuer, &self.settings.audience)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &[u8] = b"access-secret-for-tests";
    const REFRESH: &[u8] = b"refresh-secret-for-tests";

    fn opts(ttl: Duration) -> IssueOptions<'static> {
        IssueOptions {
            issuer: "murmur",
            audience: "murmur-clients",
            ttl,
        }
    }

    fn subject() -> Subject<'static> {
        Subject {
            id: Uuid::new_v4(),
            email: "a@b.com",
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenSettings {
            issuer: "murmur".into(),
            audience: "murmur-clients".into(),
            access_secret: "access-secret-for-tests".into(),
            refresh_secret: "refresh-secret-for-tests".into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        })
        .unwrap()
    }

    #[test]
    fn issued_token_verifies_with_its_secret() {
        let who = subject();
        let issued = issue(&who, ACCESS, &opts(Duration::minutes(5))).unwrap();

        let claims = verify(&issued.token, ACCESS, "murmur", "murmur-clients").unwrap();
        assert_eq!(claims.sub, who.id);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.jti.as_deref(), Some(issued.jti.as_str()));
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn every_token_gets_its_own_identifier() {
        let who = subject();
        let a = issue(&who, ACCESS, &opts(Duration::minutes(5))).unwrap();
        let b = issue(&who, ACCESS, &opts(Duration::minutes(5))).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn secrets_are_not_interchangeable() {
        let codec = codec();
        let who = subject();

        let refresh = codec.issue(TokenKind::Refresh, &who).unwrap();
        assert_eq!(
            codec.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::InvalidSignature)
        );

        let access = codec.issue(TokenKind::Access, &who).unwrap();
        assert_eq!(
            codec.verify(TokenKind::Refresh, &access.token),
            Err(TokenError::InvalidSignature)
        );

        assert!(codec.verify(TokenKind::Refresh, &refresh.token).is_ok());
        assert!(codec.verify(TokenKind::Access, &access.token).is_ok());
    }

    #[test]
    fn expired_token_reports_expired() {
        let two_hours_ago = Utc::now() - Duration::hours(2);
        let issued = issue_at(&subject(), ACCESS, &opts(Duration::hours(1)), two_hours_ago).unwrap();
        assert_eq!(
            verify(&issued.token, ACCESS, "murmur", "murmur-clients"),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_payload_reports_bad_signature() {
        let issued = issue(&subject(), ACCESS, &opts(Duration::minutes(5))).unwrap();
        let forged = issue(
            &Subject {
                id: Uuid::new_v4(),
                email: "mallory@b.com",
            },
            b"someone-elses-secret",
            &opts(Duration::minutes(5)),
        )
        .unwrap();

        // Splice the forged payload onto the genuine signature.
        let genuine: Vec<&str> = issued.token.split('.').collect();
        let fake: Vec<&str> = forged.token.split('.').collect();
        let spliced = format!("{}.{}.{}", genuine[0], fake[1], genuine[2]);

        assert_eq!(
            verify(&spliced, ACCESS, "murmur", "murmur-clients"),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            verify("not-a-jwt", ACCESS, "murmur", "murmur-clients"),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            verify("", REFRESH, "murmur", "murmur-clients"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let issued = issue(&subject(), ACCESS, &opts(Duration::minutes(5))).unwrap();
        assert!(matches!(
            verify(&issued.token, ACCESS, "murmur", "someone-else"),
            Err(TokenError::Rejected(_))
        ));
    }

    #[test]
    fn codec_refuses_shared_secret() {
        let result = TokenCodec::new(TokenSettings {
            issuer: "murmur".into(),
            audience: "murmur-clients".into(),
            access_secret: "same".into(),
            refresh_secret: "same".into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        });
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_lifetime_is_an_error_not_a_panic() {
        let huge = Duration::seconds(i64::MAX / 1000 - 1);
        assert!(matches!(
            issue(&subject(), ACCESS, &opts(huge)),
            Err(TokenError::Signing(_))
        ));

        let result = TokenCodec::new(TokenSettings {
            issuer: "murmur".into(),
            audience: "murmur-clients".into(),
            access_secret: "access-secret-for-tests".into(),
            refresh_secret: "refresh-secret-for-tests".into(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: huge,
        });
        assert!(result.is_err());
    }
}
