//! Payload decryption contract
//!
//! The cipher belongs to the server connection; sessions only hold a weak
//! reference and treat a dropped cipher as absent.

use crate::error::CryptoError;

/// Decrypts packet payloads
pub trait Cipher: Send + Sync {
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
