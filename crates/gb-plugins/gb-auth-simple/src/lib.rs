//! # gb-auth-simple
//!
//! SHA-256 based implementation of `IdentityProvider`.
//! Visitor identities are salted digests; raw addresses never reach storage.

use gb_core::traits::{ChatId, IdentityProvider};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

pub struct SimpleIdentityProvider {
    /// Secret mixed into every digest (e.g., from an environment variable)
    salt: SecretString,
    /// The only chat allowed to issue moderation commands
    operator_chat: ChatId,
}

impl SimpleIdentityProvider {
    pub fn new(salt: SecretString, operator_chat: ChatId) -> Self {
        Self { salt, operator_chat }
    }
}

impl IdentityProvider for SimpleIdentityProvider {
    /// Hex-encoded SHA-256 of salt and value.
    fn digest(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.expose_secret().as_bytes());
        hasher.update(value.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn is_operator(&self, chat: ChatId) -> bool {
        chat == self.operator_chat
    }
}
