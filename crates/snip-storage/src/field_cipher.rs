use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use thiserror::Error;

use crate::key_provider::KeyMaterial;

const TOKEN_VERSION: u8 = 1;
const TIMESTAMP_LEN: usize = 8;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 1 + TIMESTAMP_LEN + NONCE_LEN;
const TAG_LEN: usize = 16;

/// Errors from the field cipher. `Verification` carries no detail; the AEAD
/// cannot distinguish a wrong key from a tampered token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("malformed token: {reason}")]
    Malformed { reason: String },
    #[error("token failed authentication (wrong key or tampered)")]
    Verification,
    #[error("token issued {age_secs}s ago exceeds max age of {max_age_secs}s")]
    Expired { age_secs: i64, max_age_secs: i64 },
    #[error("cipher failure: {reason}")]
    Cipher { reason: String },
}

/// Authenticated encryption for the `code` field of a snippet.
///
/// Tokens are URL-safe base64 over `version || timestamp || nonce ||
/// ciphertext`, with version and timestamp bound as associated data. The
/// same plaintext encrypts to a different token every time (fresh nonce);
/// decryption under any other key fails authentication.
///
/// An optional max token age rejects tokens older than the window on
/// decrypt. Records are not re-issued, so enabling it makes legitimately
/// old records fail to decrypt once they age out; it is off by default.
pub struct FieldCipher {
    cipher: Aes256Gcm,
    max_token_age_secs: Option<u64>,
}

impl FieldCipher {
    pub fn new(material: &KeyMaterial) -> Result<Self, CipherError> {
        let cipher =
            Aes256Gcm::new_from_slice(&material.bytes).map_err(|err| CipherError::Cipher {
                reason: format!("init: {err}"),
            })?;
        Ok(Self {
            cipher,
            max_token_age_secs: None,
        })
    }

    /// Reject tokens older than `secs` on decrypt.
    pub fn with_max_token_age(mut self, secs: u64) -> Self {
        self.max_token_age_secs = Some(secs);
        self
    }

    /// Encrypt a plaintext `code` value into a token string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        self.encrypt_at(plaintext, Utc::now().timestamp())
    }

    fn encrypt_at(&self, plaintext: &str, issued_at: i64) -> Result<String, CipherError> {
        let mut header = [0u8; HEADER_LEN];
        header[0] = TOKEN_VERSION;
        header[1..1 + TIMESTAMP_LEN].copy_from_slice(&issued_at.to_be_bytes());

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        header[1 + TIMESTAMP_LEN..].copy_from_slice(nonce.as_slice());

        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: &header[..1 + TIMESTAMP_LEN],
                },
            )
            .map_err(|err| CipherError::Cipher {
                reason: format!("encrypt: {err}"),
            })?;

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        token.extend_from_slice(&header);
        token.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Decrypt a token string back to the plaintext `code` value.
    pub fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|err| {
            CipherError::Malformed {
                reason: format!("base64: {err}"),
            }
        })?;

        if raw.len() < HEADER_LEN + TAG_LEN {
            return Err(CipherError::Malformed {
                reason: format!("token too short: {} bytes", raw.len()),
            });
        }
        if raw[0] != TOKEN_VERSION {
            return Err(CipherError::Malformed {
                reason: format!("unknown token version {}", raw[0]),
            });
        }

        let mut ts_bytes = [0u8; TIMESTAMP_LEN];
        ts_bytes.copy_from_slice(&raw[1..1 + TIMESTAMP_LEN]);
        let issued_at = i64::from_be_bytes(ts_bytes);

        let nonce = Nonce::from_slice(&raw[1 + TIMESTAMP_LEN..HEADER_LEN]);
        let plaintext = self
            .cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &raw[HEADER_LEN..],
                    aad: &raw[..1 + TIMESTAMP_LEN],
                },
            )
            .map_err(|_| CipherError::Verification)?;

        // Expiry is checked after authentication so a forged timestamp can
        // never extend a token's life.
        if let Some(max_age) = self.max_token_age_secs {
            let age_secs = Utc::now().timestamp() - issued_at;
            if age_secs > max_age as i64 {
                return Err(CipherError::Expired {
                    age_secs,
                    max_age_secs: max_age as i64,
                });
            }
        }

        String::from_utf8(plaintext).map_err(|err| CipherError::Malformed {
            reason: format!("invalid utf-8: {err}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> FieldCipher {
        FieldCipher::new(&KeyMaterial { bytes: [7u8; 32] }).expect("cipher")
    }

    #[test]
    fn round_trip_restores_plaintext() {
        let cipher = test_cipher();
        let token = cipher.encrypt("fmt.Println()").expect("encrypt");
        assert_eq!(cipher.decrypt(&token).expect("decrypt"), "fmt.Println()");
    }

    #[test]
    fn same_plaintext_yields_different_tokens() {
        let cipher = test_cipher();
        let first = cipher.encrypt("x").expect("encrypt");
        let second = cipher.encrypt("x").expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn decrypt_under_different_key_fails_authentication() {
        let token = test_cipher().encrypt("secret").expect("encrypt");
        let other = FieldCipher::new(&KeyMaterial { bytes: [8u8; 32] }).expect("cipher");
        assert_eq!(
            other.decrypt(&token).expect_err("wrong key"),
            CipherError::Verification
        );
    }

    #[test]
    fn tampered_token_fails_authentication() {
        let cipher = test_cipher();
        let token = cipher.encrypt("secret").expect("encrypt");
        let mut raw = URL_SAFE_NO_PAD.decode(&token).expect("decode");
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(
            cipher.decrypt(&tampered).expect_err("tampered"),
            CipherError::Verification
        );
    }

    #[test]
    fn garbage_token_is_malformed() {
        let cipher = test_cipher();
        assert!(matches!(
            cipher.decrypt("not base64!!").expect_err("garbage"),
            CipherError::Malformed { .. }
        ));
        assert!(matches!(
            cipher.decrypt("AAAA").expect_err("too short"),
            CipherError::Malformed { .. }
        ));
    }

    #[test]
    fn expired_token_is_rejected_when_max_age_set() {
        let cipher = test_cipher().with_max_token_age(60);
        let token = cipher
            .encrypt_at("old", Utc::now().timestamp() - 120)
            .expect("encrypt");
        assert!(matches!(
            cipher.decrypt(&token).expect_err("aged out"),
            CipherError::Expired { .. }
        ));
    }

    #[test]
    fn old_token_decrypts_when_no_max_age_configured() {
        let cipher = test_cipher();
        let token = cipher
            .encrypt_at("old", Utc::now().timestamp() - 120)
            .expect("encrypt");
        assert_eq!(cipher.decrypt(&token).expect("decrypt"), "old");
    }

    #[test]
    fn max_age_window_accepts_fresh_tokens() {
        let cipher = test_cipher().with_max_token_age(3600);
        let token = cipher.encrypt("fresh").expect("encrypt");
        assert_eq!(cipher.decrypt(&token).expect("decrypt"), "fresh");
    }
}
