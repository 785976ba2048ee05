/// Murmur field encryption
///
/// Sensitive profile fields (phone numbers) are stored encrypted with
/// AES-256-GCM under a single server-held key. The stored form is
/// `base64(nonce || ciphertext)` so it fits a TEXT column.

pub mod field;
pub mod keys;
