//! Encryption key for the saved session, held in the OS keychain.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use super::session::SessionError;

const KEY_SERVICE: &str = "poinsiswa-session";
const KEY_ACCOUNT: &str = "session-key";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Seals session bytes as `nonce || ciphertext`.
#[derive(Clone)]
pub struct SessionCipher {
    key: [u8; KEY_LEN],
}

impl SessionCipher {
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// A fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Load the key from the keychain, creating and storing one on first use.
    pub fn from_keychain() -> Result<Self, SessionError> {
        let entry = Entry::new(KEY_SERVICE, KEY_ACCOUNT).map_err(|e| SessionError::Keychain(e.to_string()))?;
        match entry.get_secret() {
            Ok(secret) => {
                let key: [u8; KEY_LEN] = secret
                    .as_slice()
                    .try_into()
                    .map_err(|_| SessionError::Keychain("stored session key has the wrong length".to_string()))?;
                Ok(Self { key })
            }
            Err(keyring::Error::NoEntry) => {
                let cipher = Self::generate();
                entry
                    .set_secret(&cipher.key)
                    .map_err(|e| SessionError::Keychain(e.to_string()))?;
                info!("Created new session key in keychain");
                Ok(cipher)
            }
            Err(e) => Err(SessionError::Keychain(e.to_string())),
        }
    }

    fn aead(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .aead()
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| SessionError::Corrupt("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        if sealed.len() <= NONCE_LEN {
            return Err(SessionError::Corrupt("session file is truncated".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.aead()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SessionError::Corrupt("session file failed authentication".to_string()))
    }
}
