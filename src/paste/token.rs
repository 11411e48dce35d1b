//! Unpredictable identifier generation.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{GuardError, Result};

/// Symbols a token is drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated paste ids.
pub const PASTE_ID_LENGTH: usize = 8;

/// Largest multiple of the alphabet size that fits in a byte. Bytes at or
/// above it are rejected so every symbol is equally likely.
const REJECTION_BOUND: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Generate a token of `length` symbols from the operating system CSPRNG.
pub fn generate(length: usize) -> Result<String> {
    generate_with(&mut OsRng, length)
}

/// Generate a token from the given random source.
pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> Result<String> {
    let mut token = String::with_capacity(length);
    let mut buf = [0u8; 32];

    while token.len() < length {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| GuardError::EntropyUnavailable(e.to_string()))?;

        for &byte in buf.iter().filter(|&&b| b < REJECTION_BOUND) {
            if token.len() == length {
                break;
            }
            token.push(ALPHABET[usize::from(byte) % ALPHABET.len()] as char);
        }
    }

    Ok(token)
}

/// Whether `token` only uses symbols from the alphabet.
pub fn is_valid(token: &str) -> bool {
    token.bytes().all(|b| ALPHABET.contains(&b))
}
