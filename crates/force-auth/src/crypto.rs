//! Authenticated encryption for the security context cookie.
//!
//! Values are `base64url(nonce || AES-256-GCM ciphertext)`. The key is the
//! SHA-256 digest of a configured secret, so every instance sharing the secret
//! can read each other's cookies.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::{Error, ErrorKind, Result};

const NONCE_LEN: usize = 12;
const MIN_SECRET_LEN: usize = 16;

/// Encrypts and decrypts security context cookie values.
#[derive(Clone)]
pub struct ContextCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for ContextCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ContextCipher {
    /// Derive a cipher from a shared secret.
    ///
    /// The secret must be at least 16 bytes long.
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::new(ErrorKind::Config(format!(
                "cookie secret must be at least {} bytes",
                MIN_SECRET_LEN
            ))));
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| {
            Error::new(ErrorKind::Config("invalid cookie key length".to_string()))
        })?;

        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` into a cookie-safe string.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::new(ErrorKind::Other("encryption failed".to_string())))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Decrypt a value produced by [`seal`](Self::seal).
    ///
    /// Any malformed, truncated or tampered input is `ContextUnreadable`.
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        let bytes = URL_SAFE_NO_PAD.decode(sealed).map_err(|e| {
            Error::with_source(ErrorKind::ContextUnreadable("invalid encoding".to_string()), e)
        })?;

        if bytes.len() <= NONCE_LEN {
            return Err(Error::new(ErrorKind::ContextUnreadable(
                "value too short".to_string(),
            )));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::new(ErrorKind::ContextUnreadable("decryption failed".to_string())))
    }
}
