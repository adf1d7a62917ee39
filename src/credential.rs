use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Letters, digits, and the punctuation accepted in generated passwords.
const ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_ []{}<>~`+=,.;:/?|";

pub const PASSWORD_LEN: usize = 12;

/// A generated account password. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn generate() -> Self {
        Self(random_string(PASSWORD_LEN))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Hex SHA-256 digest, the only form a repository keeps.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

fn random_string(len: usize) -> String {
    // Largest multiple of the alphabet size below 256; bytes above it are
    // rejected so every character is equally likely.
    let zone = (256 / ALPHABET.len() * ALPHABET.len()) as u8;
    let mut out = String::with_capacity(len);
    while out.len() < len {
        let bytes = Uuid::new_v4().into_bytes();
        // Bytes 6 and 8 carry the version and variant bits.
        for (i, b) in bytes.into_iter().enumerate() {
            if i == 6 || i == 8 || b >= zone {
                continue;
            }
            out.push(ALPHABET[b as usize % ALPHABET.len()] as char);
            if out.len() == len {
                break;
            }
        }
    }
    out
}
