// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Secret vault: authenticated symmetric encryption for credentials at rest.
//!
//! Uses AES-256-GCM with a fresh random 96-bit nonce per encryption. The
//! persisted blob is `base64(nonce || ciphertext || tag)`, a single opaque
//! string. Decryption failures are deliberately uniform: truncated input,
//! tampered ciphertext, and a wrong key all produce [`VaultError::DecryptionFailed`]
//! with no distinguishing detail.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use zeroize::Zeroizing;

/// Size of the vault key in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Errors from vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
	/// Key material is not exactly [`KEY_SIZE`] bytes. Raised at
	/// construction, so a misconfigured key is a startup error rather than a
	/// runtime one.
	#[error("Invalid vault key length: expected {expected} bytes, got {actual}")]
	InvalidKeyLength { expected: usize, actual: usize },

	#[error("Encryption failed")]
	EncryptionFailed,

	/// Uniform failure for truncated, tampered, or wrong-key input.
	#[error("Decryption failed")]
	DecryptionFailed,
}

/// Vault holding a single fixed-length key, loaded once at startup.
pub struct SecretVault {
	key: Zeroizing<[u8; KEY_SIZE]>,
}

impl std::fmt::Debug for SecretVault {
	// Manual impl so the key bytes never appear in debug output.
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SecretVault").finish_non_exhaustive()
	}
}

impl SecretVault {
	/// Builds a vault from raw key material.
	pub fn new(key_bytes: &[u8]) -> Result<Self, VaultError> {
		let key: [u8; KEY_SIZE] =
			key_bytes
				.try_into()
				.map_err(|_| VaultError::InvalidKeyLength {
					expected: KEY_SIZE,
					actual: key_bytes.len(),
				})?;
		Ok(Self {
			key: Zeroizing::new(key),
		})
	}

	/// Builds a vault from a hex-encoded key, the format used in server
	/// configuration.
	pub fn from_hex(hex_key: &str) -> Result<Self, VaultError> {
		let bytes = hex::decode(hex_key).map_err(|_| VaultError::InvalidKeyLength {
			expected: KEY_SIZE,
			actual: hex_key.len() / 2,
		})?;
		Self::new(&bytes)
	}

	/// Encrypts `plaintext` into an opaque blob with a fresh random nonce.
	pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, VaultError> {
		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_ref()));

		let mut nonce_bytes = [0u8; NONCE_SIZE];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = cipher
			.encrypt(nonce, plaintext)
			.map_err(|_| VaultError::EncryptionFailed)?;

		let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
		blob.extend_from_slice(&nonce_bytes);
		blob.extend_from_slice(&ciphertext);
		Ok(BASE64.encode(blob))
	}

	/// Decrypts a blob produced by [`encrypt`](Self::encrypt).
	///
	/// The plaintext is returned in a [`Zeroizing`] buffer so callers do not
	/// leave secret bytes behind after use.
	pub fn decrypt(&self, blob: &str) -> Result<Zeroizing<Vec<u8>>, VaultError> {
		let bytes = BASE64
			.decode(blob)
			.map_err(|_| VaultError::DecryptionFailed)?;
		if bytes.len() <= NONCE_SIZE {
			return Err(VaultError::DecryptionFailed);
		}
		let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);

		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_ref()));
		let plaintext = cipher
			.decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
			.map_err(|_| VaultError::DecryptionFailed)?;
		Ok(Zeroizing::new(plaintext))
	}

	/// Convenience for string secrets (daemon tokens, API keys).
	pub fn decrypt_string(&self, blob: &str) -> Result<Zeroizing<String>, VaultError> {
		let bytes = self.decrypt(blob)?;
		let s = String::from_utf8(bytes.to_vec()).map_err(|_| VaultError::DecryptionFailed)?;
		Ok(Zeroizing::new(s))
	}
}

/// Generates a new random vault key.
///
/// Used during initial setup only, out of band from the runtime path.
pub fn generate_key() -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}
