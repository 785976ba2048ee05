use crate::outbox::EmailJob;

pub fn confirmation_email(to: &str, first_name: &str, otp: &str) -> EmailJob {
    EmailJob {
        to: to.to_string(),
        subject: "Confirm your Murmur email".to_string(),
        html: format!(
            "<p>Hi {first_name},</p>\
             <p>Your confirmation code is <b>{otp}</b>.</p>\
             <p>If you did not create a Murmur account you can ignore this email.</p>"
        ),
    }
}

pub fn password_reset_email(to: &str, first_name: &str, otp: &str, valid_minutes: i64) -> EmailJob {
    EmailJob {
        to: to.to_string(),
        subject: "Reset your Murmur password".to_string(),
        html: format!(
            "<p>Hi {first_name},</p>\
             <p>Your password reset code is <b>{otp}</b>. It expires in {valid_minutes} minutes.</p>\
             <p>If you did not ask for a reset, nothing has changed.</p>"
        ),
    }
}
