//! Encrypted binary export of configuration tables.
//!
//! The container layout is:
//!
//! ```text
//! +---------+---------+-------------------+--------------------------+
//! | "SHET"  | version | payload len (u32) | payload                  |
//! | 4 bytes | 1 byte  | little-endian     | IV (16) + AES-256-CBC ct |
//! +---------+---------+-------------------+--------------------------+
//! ```
//!
//! The ciphertext is the PKCS7-padded typed row encoding produced by
//! [`encode_rows`]. Keys of any length are accepted and brought to exactly
//! 32 bytes (zero-padded / truncated).

mod codec;
mod crypto;
mod error;

use rand::Rng;

use tabula_model::{ColumnDef, ConfigTable, Row};

pub use codec::{decode_rows, encode_rows};
pub use error::{DecodeError, EncodeError};

/// Container magic tag.
pub const MAGIC: [u8; 4] = *b"SHET";

/// Container format version; bump on any layout change.
pub const FORMAT_VERSION: u8 = 1;

/// Development fallback key. Production deployments supply their own
/// 32-byte key through configuration.
pub const DEFAULT_KEY: &[u8; 32] = b"your-32-byte-secret-key-here!123";

/// Serialize and encrypt one table into its container image.
pub fn export_table(table: &ConfigTable, key: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let plain = codec::encode_rows(table)?;
    let key = crypto::normalize_key(key);
    let mut iv = [0u8; crypto::AES_BLOCK_SIZE];
    rand::thread_rng().fill(&mut iv);
    let ciphertext = crypto::encrypt_aes_cbc(&key, &iv, &plain);

    let payload_len = (iv.len() + ciphertext.len()) as u32;
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + 4 + payload_len as usize);
    out.extend_from_slice(&MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&payload_len.to_le_bytes());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt and decode a container image back into rows.
///
/// `columns` must be the schema the image was exported with; the format is
/// not self-describing beyond its version byte.
pub fn read_rows(
    bytes: &[u8],
    columns: &[ColumnDef],
    key: &[u8],
) -> Result<Vec<Row>, DecodeError> {
    let rest = bytes.strip_prefix(&MAGIC[..]).ok_or(DecodeError::BadMagic)?;
    let (&version, rest) = rest.split_first().ok_or(DecodeError::BadMagic)?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    if rest.len() < 4 {
        return Err(DecodeError::LengthMismatch {
            declared: 0,
            actual: rest.len(),
        });
    }
    let (len_bytes, payload) = rest.split_at(4);
    let declared = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
        as usize;
    if payload.len() != declared {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }
    if payload.len() < crypto::AES_BLOCK_SIZE {
        return Err(DecodeError::MissingIv);
    }
    let (iv, ciphertext) = payload.split_at(crypto::AES_BLOCK_SIZE);
    let mut iv_bytes = [0u8; crypto::AES_BLOCK_SIZE];
    iv_bytes.copy_from_slice(iv);

    let key = crypto::normalize_key(key);
    let plain = crypto::decrypt_aes_cbc(&key, &iv_bytes, ciphertext)?;
    codec::decode_rows(&plain, columns)
}
