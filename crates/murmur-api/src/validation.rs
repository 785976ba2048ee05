//! Request validation and normalization.
//!
//! Every function here is pure: it takes a request body, returns either a
//! cleaned-up value ready for persistence or a 400 listing each bad field.
//! Handlers call these before touching the store.

use murmur_types::api::{
    ConfirmEmailRequest, FieldError, ForgotPasswordRequest, ResetPasswordRequest, SigninRequest,
    SignupRequest, UpdateUserRequest,
};
use murmur_types::models::Gender;

use crate::error::ApiError;
use crate::otp;

pub const MESSAGE_MAX_CHARS: usize = 500;
const NAME_MIN: usize = 2;
const NAME_MAX: usize = 20;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 50;
const PASSWORD_SPECIALS: &str = "@$!%*";
const AGE_MIN: i64 = 18;
const AGE_MAX: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub age: i64,
    pub gender: Gender,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
}

/// Collects field errors so one response reports all of them.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn name(&mut self, field: &str, raw: &str) -> Option<String> {
        let value = raw.trim();
        let len = value.chars().count();
        if len < NAME_MIN || len > NAME_MAX {
            self.fail(field, format!("must be between {NAME_MIN} and {NAME_MAX} characters"));
            return None;
        }
        if !value.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
            self.fail(field, "must contain only letters");
            return None;
        }
        Some(value.to_ascii_lowercase())
    }

    fn email(&mut self, field: &str, raw: &str) -> Option<String> {
        let value = raw.trim().to_ascii_lowercase();
        if value.is_empty() {
            self.fail(field, "is required");
            return None;
        }
        if !is_valid_email(&value) {
            self.fail(field, "must be a valid email address");
            return None;
        }
        Some(value)
    }

    fn password(&mut self, field: &str, raw: &str) -> Option<String> {
        let len = raw.chars().count();
        if len < PASSWORD_MIN || len > PASSWORD_MAX {
            self.fail(field, format!("must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"));
            return None;
        }
        let allowed = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
        let strong = raw.chars().any(|c| c.is_ascii_lowercase())
            && raw.chars().any(|c| c.is_ascii_uppercase())
            && raw.chars().any(|c| c.is_ascii_digit())
            && raw.chars().any(|c| PASSWORD_SPECIALS.contains(c));
        if !allowed || !strong {
            self.fail(
                field,
                format!(
                    "must contain an uppercase letter, a lowercase letter, a number and one of {PASSWORD_SPECIALS}, and nothing else"
                ),
            );
            return None;
        }
        Some(raw.to_string())
    }

    fn age(&mut self, field: &str, value: i64) -> Option<i64> {
        if !(AGE_MIN..=AGE_MAX).contains(&value) {
            self.fail(field, format!("must be between {AGE_MIN} and {AGE_MAX}"));
            return None;
        }
        Some(value)
    }

    fn gender(&mut self, field: &str, raw: &str) -> Option<Gender> {
        let parsed = Gender::parse(raw.trim().to_ascii_lowercase().as_str());
        if parsed.is_none() {
            self.fail(field, "must be one of: male, female");
        }
        parsed
    }

    /// Egyptian mobile numbers: 01 followed by 0, 1, 2 or 5 and eight digits.
    fn phone(&mut self, field: &str, raw: &str) -> Option<String> {
        let value = raw.trim();
        let bytes = value.as_bytes();
        let valid = bytes.len() == 11
            && value.starts_with("01")
            && matches!(bytes[2], b'0' | b'1' | b'2' | b'5')
            && bytes.iter().all(u8::is_ascii_digit);
        if !valid {
            self.fail(field, "must be a valid Egyptian number (e.g. 01012345678)");
            return None;
        }
        Some(value.to_string())
    }

    fn otp(&mut self, field: &str, raw: &str) -> Option<String> {
        let value = raw.trim();
        if !otp::is_well_formed(value) {
            self.fail(field, format!("must be {} characters from a-h and 1-8", otp::OTP_LEN));
            return None;
        }
        Some(value.to_string())
    }

    fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation {
                message: "Validation failed".to_string(),
                errors: self.errors,
            })
        }
    }
}

/// Checks only what the rest of the system relies on: one `@`, a sane local
/// part, and a dotted domain with a TLD of at least two letters.
fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    labels_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

pub fn signup(req: SignupRequest) -> Result<ValidSignup, ApiError> {
    let mut c = Checker::default();

    let first_name = c.name("firstName", &req.first_name);
    let last_name = c.name("lastName", &req.last_name);
    let email = c.email("email", &req.email);
    let password = c.password("password", &req.password);
    let age = c.age("age", req.age);
    let gender = match req.gender.as_deref() {
        Some(raw) => c.gender("gender", raw),
        None => Some(Gender::default()),
    };
    let phone = req.phone_number.as_deref().map(|raw| c.phone("phoneNumber", raw));

    c.finish()?;

    match (first_name, last_name, email, password, age, gender) {
        (Some(first_name), Some(last_name), Some(email), Some(password), Some(age), Some(gender)) => {
            Ok(ValidSignup {
                first_name,
                last_name,
                email,
                password,
                age,
                gender,
                phone: phone.flatten(),
            })
        }
        _ => Err(ApiError::BadRequest("Validation failed".to_string())),
    }
}

/// Only normalizes the email. The password is not shape-checked here:
/// a bad password must fail the same way as a wrong one.
pub fn signin(req: SigninRequest) -> Result<(String, String), ApiError> {
    let mut c = Checker::default();
    let email = c.email("email", &req.email);
    if req.password.is_empty() {
        c.fail("password", "is required");
    }
    c.finish()?;

    Ok((email.unwrap_or_default(), req.password))
}

pub fn update(req: UpdateUserRequest) -> Result<ValidUpdate, ApiError> {
    let mut c = Checker::default();

    let out = ValidUpdate {
        first_name: req.first_name.as_deref().and_then(|v| c.name("firstName", v)),
        last_name: req.last_name.as_deref().and_then(|v| c.name("lastName", v)),
        email: req.email.as_deref().and_then(|v| c.email("email", v)),
        age: req.age.and_then(|v| c.age("age", v)),
        gender: req.gender.as_deref().and_then(|v| c.gender("gender", v)),
        phone: req.phone_number.as_deref().and_then(|v| c.phone("phoneNumber", v)),
    };

    let provided = req.first_name.is_some()
        || req.last_name.is_some()
        || req.email.is_some()
        || req.age.is_some()
        || req.gender.is_some()
        || req.phone_number.is_some();
    if !provided {
        c.fail("body", "at least one field must be provided for update");
    }

    c.finish()?;
    Ok(out)
}

pub fn confirm_email(req: ConfirmEmailRequest) -> Result<(String, String), ApiError> {
    let mut c = Checker::default();
    let email = c.email("email", &req.email);
    let otp = c.otp("otp", &req.otp);
    c.finish()?;
    Ok((email.unwrap_or_default(), otp.unwrap_or_default()))
}

pub fn forgot_password(req: ForgotPasswordRequest) -> Result<String, ApiError> {
    let mut c = Checker::default();
    let email = c.email("email", &req.email);
    c.finish()?;
    Ok(email.unwrap_or_default())
}

pub struct ValidReset {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

pub fn reset_password(req: ResetPasswordRequest) -> Result<ValidReset, ApiError> {
    let mut c = Checker::default();
    let email = c.email("email", &req.email);
    let otp = c.otp("otp", &req.otp);
    let new_password = c.password("newPassword", &req.new_password);
    c.finish()?;
    Ok(ValidReset {
        email: email.unwrap_or_default(),
        otp: otp.unwrap_or_default(),
        new_password: new_password.unwrap_or_default(),
    })
}

/// Trim and bound an anonymous message body.
pub fn message_content(raw: &str) -> Result<String, ApiError> {
    let content = raw.trim();
    let mut c = Checker::default();
    if content.is_empty() {
        c.fail("content", "message cannot be empty");
    } else if content.chars().count() > MESSAGE_MAX_CHARS {
        c.fail("content", format!("message must be at most {MESSAGE_MAX_CHARS} characters"));
    }
    c.finish()?;
    Ok(content.to_string())
}
