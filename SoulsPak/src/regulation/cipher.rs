//! Regulation ciphers
//!
//! Elden Ring and Dark Souls III store a 16-byte IV followed by AES-256-CBC
//! ciphertext. Dark Souls II uses AES-128-CTR with the counter built from the
//! first 11 bytes of a 32-byte header.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};

use super::RegulationVariant;
use crate::error::{Error, Result};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

const BLOCK: usize = 16;

/// Symmetric scheme and key for one title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherScheme {
    /// IV-prefixed AES-256-CBC, zero padded.
    Aes256Cbc { key: &'static [u8; 32] },
    /// AES-128-CTR after a 32-byte header. Decrypt only.
    Aes128Ctr { key: &'static [u8; 16] },
}

/// Output of a decryption: the header needed to encrypt again, and the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub header: Vec<u8>,
    pub plaintext: Vec<u8>,
}

impl CipherScheme {
    /// Bytes of unencrypted header in front of the ciphertext.
    #[must_use]
    pub fn header_len(self) -> usize {
        match self {
            Self::Aes256Cbc { .. } => BLOCK,
            Self::Aes128Ctr { .. } => 32,
        }
    }

    #[must_use]
    pub fn supports_encrypt(self) -> bool {
        matches!(self, Self::Aes256Cbc { .. })
    }

    pub fn decrypt(self, variant: RegulationVariant, blob: &[u8]) -> Result<Decrypted> {
        let fail = |message: String| Error::Decryption { variant, message };
        let header_len = self.header_len();
        if blob.len() <= header_len {
            return Err(fail(format!("file is only {} bytes", blob.len())));
        }
        let (header, body) = blob.split_at(header_len);

        let plaintext = match self {
            Self::Aes256Cbc { key } => {
                if body.len() % BLOCK != 0 {
                    return Err(fail(format!(
                        "ciphertext length {} is not a multiple of {BLOCK}",
                        body.len()
                    )));
                }
                let iv: [u8; BLOCK] = header
                    .try_into()
                    .map_err(|_| fail("header is not one block".to_string()))?;
                let mut buffer = body.to_vec();
                Aes256CbcDec::new(key.into(), &iv.into())
                    .decrypt_padded_mut::<NoPadding>(&mut buffer)
                    .map_err(|e| fail(format!("AES decryption failed: {e:?}")))?;
                buffer
            }
            Self::Aes128Ctr { key } => {
                let mut buffer = body.to_vec();
                Aes128Ctr::new(key.into(), &ctr_iv(header).into()).apply_keystream(&mut buffer);
                buffer
            }
        };
        Ok(Decrypted {
            header: header.to_vec(),
            plaintext,
        })
    }

    /// Encrypt `plaintext` behind `header`, zero padding to the block size.
    pub fn encrypt(self, variant: RegulationVariant, header: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let Self::Aes256Cbc { key } = self else {
            return Err(Error::ReencryptUnsupported { variant });
        };
        let iv: [u8; BLOCK] = header.try_into().map_err(|_| Error::Decryption {
            variant,
            message: format!("header must be {BLOCK} bytes, got {}", header.len()),
        })?;

        let padded_len = plaintext.len().div_ceil(BLOCK) * BLOCK;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);
        Aes256CbcEnc::new(key.into(), &iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
            .map_err(|e| Error::Decryption {
                variant,
                message: format!("AES encryption failed: {e:?}"),
            })?;

        let mut out = Vec::with_capacity(BLOCK + padded_len);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&buffer);
        Ok(out)
    }
}

/// `0x80`, then the first 11 header bytes, then a big-endian counter of 1.
fn ctr_iv(header: &[u8]) -> [u8; BLOCK] {
    let mut iv = [0u8; BLOCK];
    iv[0] = 0x80;
    iv[1..12].copy_from_slice(&header[..11]);
    iv[15] = 1;
    iv
}
