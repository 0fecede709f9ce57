/// Opaque refresh token generation and hashing
///
/// Refresh tokens are random strings handed to the client once. Only their SHA-256
/// digest is stored (see `models::refresh_token`), so a leaked database does not
/// leak usable sessions.
///
/// # Format
///
/// ```text
/// chr_<48 base62 characters>
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix of every refresh token
pub const TOKEN_PREFIX: &str = "chr_";

/// Length of the random part
const TOKEN_RANDOM_LENGTH: usize = 48;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a new token and returns `(plaintext, sha256_hex)`
pub fn generate_refresh_token() -> (String, String) {
    let mut rng = rand::thread_rng();

    let random_part: String = (0..TOKEN_RANDOM_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    let token = format!("{}{}", TOKEN_PREFIX, random_part);
    let hash = hash_refresh_token(&token);

    (token, hash)
}

/// Hex-encoded SHA-256 of a token
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check done before touching the database
pub fn looks_like_refresh_token(token: &str) -> bool {
    token
        .strip_prefix(TOKEN_PREFIX)
        .map(|rest| rest.len() == TOKEN_RANDOM_LENGTH && rest.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}
