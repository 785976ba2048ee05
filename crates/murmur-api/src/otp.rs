//! One-time codes for email confirmation and password reset.

use chrono::Duration;
use rand::Rng;

const OTP_ALPHABET: &[u8] = b"abcdefgh12345678";
pub const OTP_LEN: usize = 5;

/// How long a password reset code stays valid.
pub fn reset_otp_ttl() -> Duration {
    Duration::minutes(10)
}

pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..OTP_LEN)
        .map(|_| OTP_ALPHABET[rng.random_range(0..OTP_ALPHABET.len())] as char)
        .collect()
}

/// Shape check only; the code itself is compared against a stored hash.
pub fn is_well_formed(otp: &str) -> bool {
    otp.len() == OTP_LEN && otp.bytes().all(|b| OTP_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..100 {
            assert!(is_well_formed(&generate()));
        }
    }

    #[test]
    fn shape_check() {
        assert!(is_well_formed("ab12h"));
        assert!(!is_well_formed("ab12"));
        assert!(!is_well_formed("ab129"));
        assert!(!is_well_formed("AB12H"));
    }
}
