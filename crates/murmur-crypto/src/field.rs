use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

const NONCE_LEN: usize = 12;

/// Encrypt a field value with AES-256-GCM.
/// Returns `base64(nonce || ciphertext)`.
pub fn encrypt_field(key: &[u8; 32], plaintext: &str) -> Result<String> {
    if plaintext.trim().is_empty() {
        return Err(anyhow!("Refusing to encrypt an empty value"));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(sealed))
}

/// Decrypt a value produced by [`encrypt_field`].
pub fn decrypt_field(key: &[u8; 32], sealed: &str) -> Result<String> {
    let bytes = BASE64.decode(sealed)?;
    if bytes.len() <= NONCE_LEN {
        return Err(anyhow!("Sealed field too short"));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(String::from_utf8(plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_field_key;

    #[test]
    fn same_value_encrypts_differently() {
        let key = generate_field_key();
        let a = encrypt_field(&key, "01012345678").unwrap();
        let b = encrypt_field(&key, "01012345678").unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_field(&key, &a).unwrap(), "01012345678");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt_field(&generate_field_key(), "01012345678").unwrap();
        assert!(decrypt_field(&generate_field_key(), &sealed).is_err());
    }

    #[test]
    fn empty_and_truncated_inputs_rejected() {
        let key = generate_field_key();
        assert!(encrypt_field(&key, "   ").is_err());
        assert!(decrypt_field(&key, &BASE64.encode([1u8; 8])).is_err());
    }
}
