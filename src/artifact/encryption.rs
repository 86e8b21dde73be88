//! Password based encryption of backup artifacts.
//!
//! The key is derived from the configured password with Argon2id and a
//! random salt; the payload is sealed with AES-256-GCM. Encrypted output is
//! laid out as `BBX1 | salt (16) | nonce (12) | ciphertext`, so everything
//! needed for decryption except the password travels with the file.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::ArtifactError;

/// Leading bytes of every encrypted artifact
pub const MAGIC: &[u8; 4] = b"BBX1";
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

pub const MIN_PASSWORD_LEN: usize = 14;

/// Encryption method selected in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMethod {
    #[default]
    None,
    Password,
}

/// `encryption:` section, global or per storage handler
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub method: EncryptionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Check length and character-class mix of an encryption password
pub fn validate_password_strength(password: &str) -> Result<(), ArtifactError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ArtifactError::WeakPassword(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    let classes = [
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
    ];
    if classes.iter().filter(|present| **present).count() < 2 {
        return Err(ArtifactError::WeakPassword(
            "Password must contain at least 2 of: uppercase, lowercase, numbers".to_string(),
        ));
    }

    Ok(())
}

/// Byte transform applied to an artifact before upload
#[derive(Clone, Default)]
pub enum Encryptor {
    #[default]
    None,
    Password(PasswordEncryptor),
}

impl Encryptor {
    /// Build from configuration. A weak or missing password is a config error.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, ArtifactError> {
        match config.method {
            EncryptionMethod::None => Ok(Self::None),
            EncryptionMethod::Password => {
                let password = config.password.as_deref().ok_or_else(|| {
                    ArtifactError::WeakPassword("Password is required for encryption".to_string())
                })?;
                PasswordEncryptor::new(password).map(Self::Password)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Password(_))
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, ArtifactError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Password(encryptor) => encryptor.encrypt(data),
        }
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, ArtifactError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Password(encryptor) => encryptor.decrypt(data),
        }
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("Encryptor::None"),
            Self::Password(_) => f.write_str("Encryptor::Password(..)"),
        }
    }
}

/// AES-256-GCM with an Argon2id derived key
#[derive(Clone)]
pub struct PasswordEncryptor {
    password: String,
}

impl PasswordEncryptor {
    pub fn new(password: &str) -> Result<Self, ArtifactError> {
        validate_password_strength(password)?;
        Ok(Self {
            password: password.to_string(),
        })
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], ArtifactError> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(self.password.as_bytes(), salt, &mut key)
            .map_err(|e| ArtifactError::Encryption(format!("Key derivation failed: {}", e)))?;
        Ok(key)
    }

    fn cipher(&self, salt: &[u8]) -> Result<Aes256Gcm, ArtifactError> {
        let key = self.derive_key(salt)?;
        Aes256Gcm::new_from_slice(&key)
            .map_err(|e| ArtifactError::Encryption(format!("Invalid key: {}", e)))
    }

    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, ArtifactError> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher(&salt)?
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|e| ArtifactError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut output = Vec::with_capacity(MAGIC.len() + SALT_LEN + NONCE_LEN + ciphertext.len());
        output.extend_from_slice(MAGIC);
        output.extend_from_slice(&salt);
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, ArtifactError> {
        let header = MAGIC.len() + SALT_LEN + NONCE_LEN;
        if data.len() < header || &data[..MAGIC.len()] != MAGIC {
            return Err(ArtifactError::Encryption(
                "Not a blackbox encrypted artifact".to_string(),
            ));
        }

        let salt = &data[MAGIC.len()..MAGIC.len() + SALT_LEN];
        let nonce = &data[MAGIC.len() + SALT_LEN..header];

        self.cipher(salt)?
            .decrypt(Nonce::from_slice(nonce), &data[header..])
            .map_err(|_| ArtifactError::Encryption("Decryption failed: wrong password or corrupt data".to_string()))
    }
}
