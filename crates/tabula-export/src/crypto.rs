use aes::Aes256;
use cbc::{Decryptor, Encryptor};
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::DecodeError;

pub(crate) const AES_BLOCK_SIZE: usize = 16;
pub(crate) const KEY_SIZE: usize = 32;

/// Bring a caller-supplied key to exactly 32 bytes: right-padded with zero
/// bytes, truncated if longer.
pub(crate) fn normalize_key(key: &[u8]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    let len = key.len().min(KEY_SIZE);
    out[..len].copy_from_slice(&key[..len]);
    out
}

/// AES-256-CBC encryption of PKCS7-padded plaintext.
pub(crate) fn encrypt_aes_cbc(
    key: &[u8; KEY_SIZE],
    iv: &[u8; AES_BLOCK_SIZE],
    plain: &[u8],
) -> Vec<u8> {
    Encryptor::<Aes256>::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plain)
}

/// AES-256-CBC decryption with PKCS7 padding removal.
pub(crate) fn decrypt_aes_cbc(
    key: &[u8; KEY_SIZE],
    iv: &[u8; AES_BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    if ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(DecodeError::InvalidCiphertextLength(ciphertext.len()));
    }
    Decryptor::<Aes256>::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DecodeError::InvalidPadding)
}
