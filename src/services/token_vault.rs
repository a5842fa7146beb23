//! Encrypted on-disk storage for a hosted session.
//!
//! The value is serialized to JSON and sealed with AES-256-GCM under a key
//! derived by PBKDF2-HMAC-SHA256 from a passphrase and a per-file random salt.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::types::errors::VaultError;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Serialize, Deserialize)]
struct SealedFile {
    salt: String,
    nonce: String,
    ciphertext: String,
}

pub struct TokenVault {
    path: PathBuf,
    passphrase: Zeroizing<String>,
    rng: SystemRandom,
}

impl TokenVault {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: Zeroizing::new(passphrase.into()),
            rng: SystemRandom::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn derive_key(&self, salt: &[u8]) -> Result<LessSafeKey, VaultError> {
        let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
            .ok_or_else(|| VaultError::Crypto("invalid iteration count".to_string()))?;
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            salt,
            self.passphrase.as_bytes(),
            &mut key[..],
        );
        let unbound = UnboundKey::new(&AES_256_GCM, &key[..])
            .map_err(|_| VaultError::Crypto("invalid key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    fn random<const N: usize>(&self) -> Result<[u8; N], VaultError> {
        let mut bytes = [0u8; N];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| VaultError::Crypto("random generation failed".to_string()))?;
        Ok(bytes)
    }

    /// Encrypts `value` and replaces the vault file.
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<(), VaultError> {
        let mut in_out = Zeroizing::new(
            serde_json::to_vec(value).map_err(|e| VaultError::Encoding(e.to_string()))?,
        );
        let salt: [u8; SALT_LEN] = self.random()?;
        let nonce_bytes: [u8; NONCE_LEN] = self.random()?;

        let key = self.derive_key(&salt)?;
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut *in_out,
        )
        .map_err(|_| VaultError::Crypto("encryption failed".to_string()))?;

        let sealed = SealedFile {
            salt: BASE64.encode(salt),
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(in_out.as_slice()),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&sealed).map_err(|e| VaultError::Encoding(e.to_string()))?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "sealed session");
        Ok(())
    }

    /// Decrypts the vault file. Returns `None` when there is no file.
    pub fn open<T: DeserializeOwned>(&self) -> Result<Option<T>, VaultError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let sealed: SealedFile =
            serde_json::from_str(&content).map_err(|e| VaultError::Encoding(e.to_string()))?;

        let decode = |field: &str| {
            BASE64
                .decode(field)
                .map_err(|e| VaultError::Encoding(e.to_string()))
        };
        let salt = decode(sealed.salt.as_str())?;
        let nonce: [u8; NONCE_LEN] = decode(sealed.nonce.as_str())?
            .try_into()
            .map_err(|_| VaultError::Encoding("bad nonce length".to_string()))?;
        let mut in_out = Zeroizing::new(decode(sealed.ciphertext.as_str())?);

        let key = self.derive_key(&salt)?;
        let plaintext = key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut *in_out)
            .map_err(|_| VaultError::Crypto("decryption failed".to_string()))?;

        let value = serde_json::from_slice(plaintext).map_err(|e| VaultError::Encoding(e.to_string()))?;
        Ok(Some(value))
    }

    /// Removes the vault file if present.
    pub fn clear(&self) -> Result<(), VaultError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
