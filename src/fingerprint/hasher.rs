//! BLAKE3 byte digests.
//!
//! # Overview
//! Every digest in the crate is a 32-byte BLAKE3 hash. Digests are carried
//! around as lowercase hex strings (64 characters) because the fuzzy and
//! token strategies operate on the textual form.

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Length of a hex-encoded digest.
pub const HEX_DIGEST_LEN: usize = 64;

/// Hash raw byte content.
///
/// Deterministic: the same bytes always produce the same digest.
///
/// # Example
///
/// ```
/// use pdfdupe::fingerprint::hasher::{digest_bytes, hash_to_hex};
///
/// let a = digest_bytes(b"same content");
/// let b = digest_bytes(b"same content");
/// assert_eq!(a, b);
/// assert_eq!(hash_to_hex(&a).len(), 64);
/// ```
#[must_use]
pub fn digest_bytes(content: &[u8]) -> Hash {
    *blake3::hash(content).as_bytes()
}

/// Hash raw byte content straight to its hex form.
#[must_use]
pub fn digest_bytes_hex(content: &[u8]) -> String {
    hash_to_hex(&digest_bytes(content))
}

/// Convert a digest to a lowercase hexadecimal string.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a 64-character hexadecimal string back into a digest.
///
/// Returns `None` if the string has the wrong length or contains
/// non-hex characters.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    if hex.len() != HEX_DIGEST_LEN || !hex.is_ascii() {
        return None;
    }
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(hash)
}
