//! Cryptographic helpers for authentication.
//!
//! - PBKDF2-SHA256 password hashing, stored as a self-describing string
//!   `pbkdf2-sha256$<iterations>$<salt_hex>$<hash_hex>`
//! - HMAC-SHA256 JWT signing/verification
//! - Opaque refresh tokens (random, stored as SHA-256)

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::ServiceError;

/// Production iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 600_000;
const PASSWORD_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

// ── Password hashing ────────────────────────────────────────────────────────

/// Hash a password with PBKDF2-SHA256 and encode it with its parameters.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, ServiceError> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    Ok(format!(
        "{PASSWORD_SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(hash)
    ))
}

/// Verify a password against an encoded hash produced by [`hash_password`].
/// Malformed hashes never verify.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt_hex), Some(hash_hex), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != PASSWORD_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    if iterations == 0 || expected.len() != HASH_LEN {
        return false;
    }

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);
    constant_time_eq(&hash, &expected)
}

// ── JWT (HMAC-SHA256) ───────────────────────────────────────────────────────

/// JWT header (always HS256).
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// JWT expiry: 1 hour in seconds.
pub const JWT_EXPIRY_SECS: u64 = 3600;

/// Refresh token expiry: 7 days in seconds.
pub const REFRESH_EXPIRY_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// Sign an access token for the given user.
pub fn sign_jwt(user_id: &str, secret: &str, now_unix: u64) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes());
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now_unix,
        exp: now_unix + JWT_EXPIRY_SECS,
    };
    // Serializing a struct of strings and integers cannot fail.
    let payload = serde_json::to_vec(&claims).unwrap_or_default();
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let signing_input = format!("{header_b64}.{payload_b64}");
    let sig_b64 = URL_SAFE_NO_PAD.encode(hmac_sha256(
        secret.as_bytes(),
        signing_input.as_bytes(),
    ));

    format!("{signing_input}.{sig_b64}")
}

/// Verify an access token and return its subject (user id).
pub fn verify_jwt(token: &str, secret: &str, now_unix: u64) -> Result<String, ServiceError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ServiceError::Unauthorized("invalid token format".into()));
    };

    let signing_input = format!("{header}.{payload}");
    let expected_sig = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
    let actual_sig = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| ServiceError::Unauthorized("invalid token signature encoding".into()))?;
    if !constant_time_eq(&expected_sig, &actual_sig) {
        return Err(ServiceError::Unauthorized("invalid token signature".into()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ServiceError::Unauthorized("invalid token payload encoding".into()))?;
    let claims: Claims = serde_json::from_slice(&payload_bytes)
        .map_err(|_| ServiceError::Unauthorized("invalid token payload".into()))?;

    if now_unix > claims.exp {
        return Err(ServiceError::Unauthorized("token expired".into()));
    }
    Ok(claims.sub)
}

// ── Opaque tokens ───────────────────────────────────────────────────────────

/// Generate a secure random token (for refresh tokens). Returns hex-encoded.
pub fn generate_token() -> Result<String, ServiceError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| ServiceError::Internal(format!("RNG failure: {e}")))?;
    Ok(hex::encode(bytes))
}

/// Hash a token with SHA-256 for storage. Returns hex-encoded.
pub fn hash_token(token: &str) -> String {
    use sha2::Digest;
    hex::encode(sha2::Sha256::digest(token.as_bytes()))
}

// ── Internal ────────────────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so `new_from_slice` only fails for
    // fixed-key MACs; fall back to an empty tag that never verifies.
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key) else {
        return Vec::new();
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERS: u32 = 1_000;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let encoded = hash_password("hunter2hunter2", ITERS).unwrap();
        assert!(encoded.starts_with("pbkdf2-sha256$1000$"));
        assert!(verify_password("hunter2hunter2", &encoded));
        assert!(!verify_password("hunter2hunter3", &encoded));
    }

    #[test]
    fn password_hashes_are_salted() {
        let a = hash_password("same-password", ITERS).unwrap();
        let b = hash_password("same-password", ITERS).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_password_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "pbkdf2-sha256$abc$00$00"));
        assert!(!verify_password("x", "bcrypt$1000$00$00"));
        assert!(!verify_password("x", "pbkdf2-sha256$1000$zz$00"));
        assert!(!verify_password("x", "pbkdf2-sha256$0$00$00"));
    }

    #[test]
    fn jwt_roundtrip_and_expiry() {
        let token = sign_jwt("user-1", "secret", 1_000);
        assert_eq!(verify_jwt(&token, "secret", 1_000).unwrap(), "user-1");
        assert_eq!(
            verify_jwt(&token, "secret", 1_000 + JWT_EXPIRY_SECS).unwrap(),
            "user-1"
        );
        let err = verify_jwt(&token, "secret", 1_001 + JWT_EXPIRY_SECS).unwrap_err();
        assert_eq!(err.message(), "token expired");
    }

    #[test]
    fn jwt_rejects_wrong_secret_and_tampering() {
        let token = sign_jwt("user-1", "secret", 1_000);
        assert!(verify_jwt(&token, "other", 1_000).is_err());

        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"admin","iat":0,"exp":9999999999}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged_payload.as_str();
        assert!(verify_jwt(&parts.join("."), "secret", 1_000).is_err());

        assert!(verify_jwt("not-a-jwt", "secret", 1_000).is_err());
        assert!(verify_jwt("a.b.c.d", "secret", 1_000).is_err());
    }

    #[test]
    fn tokens_are_random_and_hash_deterministically() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), hash_token(&b));
    }
}
