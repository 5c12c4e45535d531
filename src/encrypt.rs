// src/encrypt.rs

//! Package encryption for upload
//!
//! Encrypts a local installer file into the envelope the device-management
//! service expects for its `ProfileVersion1` encryption scheme:
//!
//! ```text
//! [ HMAC-SHA256 digest (32 bytes) | IV (16 bytes) | AES-256-CBC/PKCS7 ciphertext ]
//! ```
//!
//! The digest authenticates (IV || ciphertext). Key material comes from the
//! OS RNG and is returned in [`EncryptionMetadata`], which the commit stage
//! later hands to the service so it can decrypt and validate the payload.
//!
//! Encryption streams the source in fixed-size chunks, so files of any size
//! are handled without buffering them in memory. On any failure the partial
//! ciphertext file is removed before the error is returned.

use crate::error::{Error, Result};
use crate::remote::types::FileManifest;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Identifier of the encryption scheme this module produces.
pub const PROFILE_VERSION_1: &str = "ProfileVersion1";

/// Digest algorithm name reported alongside the plaintext digest.
pub const FILE_DIGEST_ALGORITHM: &str = "SHA256";

/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

/// Read buffer for streaming encryption (64 KiB, a multiple of the block size).
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Byte offset of the IV within the encrypted file.
const IV_OFFSET: u64 = 32;

/// Total header length (HMAC digest + IV) preceding the ciphertext.
const HEADER_LEN: u64 = 48;

/// Key material and digests for one encrypted package.
///
/// Produced once per encryption, consumed by the file manifest and the
/// commit request, never persisted beyond the publish call.
#[derive(Debug, Clone)]
pub struct EncryptionMetadata {
    /// AES-256 key (32 bytes)
    pub encryption_key: Vec<u8>,
    /// HMAC-SHA256 key (32 bytes)
    pub mac_key: Vec<u8>,
    /// CBC initialization vector (16 bytes)
    pub initialization_vector: Vec<u8>,
    /// HMAC-SHA256 digest of (IV || ciphertext)
    pub mac: Vec<u8>,
    /// SHA-256 digest of the plaintext
    pub file_digest: Vec<u8>,
    /// Encryption scheme identifier (`ProfileVersion1`)
    pub profile_identifier: String,
    /// Digest algorithm name (`SHA256`)
    pub file_digest_algorithm: String,
    /// Plaintext size in bytes
    pub size: u64,
    /// Encrypted file size in bytes (header + padded ciphertext)
    pub size_encrypted: u64,
}

/// Result of encrypting an installer package.
#[derive(Debug)]
pub struct EncryptedPackage {
    /// Path of the ciphertext file
    pub path: PathBuf,
    /// Key material and digests for the commit request
    pub metadata: EncryptionMetadata,
    /// File descriptor for content-file registration
    pub manifest: FileManifest,
}

/// Derive the ciphertext sibling path for a source file.
///
/// `installer.pkg` encrypts to `installer.pkg.enc` in the same directory.
pub fn derived_ciphertext_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "package".to_string());
    source.with_file_name(format!("{name}.enc"))
}

/// Encrypt an installer package to its derived sibling path.
pub fn encrypt_package(source: &Path) -> Result<EncryptedPackage> {
    let dest = derived_ciphertext_path(source);
    encrypt_package_to(source, &dest)
}

/// Encrypt an installer package to an explicit destination path.
///
/// A zero-byte source is accepted: PKCS7 pads the empty plaintext to one
/// full block, so the ciphertext is still well-formed.
pub fn encrypt_package_to(source: &Path, dest: &Path) -> Result<EncryptedPackage> {
    info!("Encrypting {} -> {}", source.display(), dest.display());

    match encrypt_inner(source, dest) {
        Ok(pkg) => Ok(pkg),
        Err(e) => {
            // Never leave a partial ciphertext behind.
            let _ = fs::remove_file(dest);
            Err(e)
        }
    }
}

fn encrypt_inner(source: &Path, dest: &Path) -> Result<EncryptedPackage> {
    let mut reader = File::open(source)
        .map_err(|e| Error::Encryption(format!("Failed to open {}: {e}", source.display())))?;
    let mut writer = File::create(dest)
        .map_err(|e| Error::Encryption(format!("Failed to create {}: {e}", dest.display())))?;

    // Fresh key material for every package.
    let mut encryption_key = vec![0u8; 32];
    let mut mac_key = vec![0u8; 32];
    let mut iv = vec![0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut encryption_key);
    OsRng.fill_bytes(&mut mac_key);
    OsRng.fill_bytes(&mut iv);

    // Header placeholder for the HMAC digest, then the IV. The digest is
    // written back once the ciphertext has been streamed.
    writer
        .write_all(&[0u8; 32])
        .and_then(|_| writer.write_all(&iv))
        .map_err(|e| Error::Encryption(format!("Failed to write header: {e}")))?;

    let mut cipher = Aes256CbcEnc::new_from_slices(&encryption_key, &iv)
        .map_err(|e| Error::Encryption(format!("Invalid key/IV length: {e}")))?;
    let mut hmac = HmacSha256::new_from_slice(&mac_key)
        .map_err(|e| Error::Encryption(format!("Invalid HMAC key length: {e}")))?;
    hmac.update(&iv);
    let mut plain_digest = Sha256::new();

    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
    let mut filled = 0usize;
    let mut plaintext_len: u64 = 0;
    let mut ciphertext_len: u64 = 0;

    loop {
        let read = reader
            .read(&mut buffer[filled..])
            .map_err(|e| Error::Encryption(format!("Failed to read source: {e}")))?;
        if read == 0 {
            break;
        }
        plain_digest.update(&buffer[filled..filled + read]);
        plaintext_len += read as u64;
        filled += read;

        // Encrypt whole blocks, carry the partial tail into the next read.
        let whole = (filled / BLOCK_SIZE) * BLOCK_SIZE;
        if whole > 0 {
            for block in buffer[..whole].chunks_mut(BLOCK_SIZE) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            hmac.update(&buffer[..whole]);
            writer
                .write_all(&buffer[..whole])
                .map_err(|e| Error::Encryption(format!("Failed to write ciphertext: {e}")))?;
            ciphertext_len += whole as u64;
            buffer.copy_within(whole..filled, 0);
            filled -= whole;
        }
    }

    // Final block: PKCS7 always emits one block, even for an empty tail.
    let mut tail = [0u8; BLOCK_SIZE];
    tail[..filled].copy_from_slice(&buffer[..filled]);
    let padded = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut tail, filled)
        .map_err(|_| Error::Encryption("PKCS7 padding failed".to_string()))?;
    hmac.update(padded);
    writer
        .write_all(padded)
        .map_err(|e| Error::Encryption(format!("Failed to write ciphertext: {e}")))?;
    ciphertext_len += padded.len() as u64;

    // Seal the header with the digest over (IV || ciphertext).
    let mac = hmac.finalize().into_bytes().to_vec();
    writer
        .seek(SeekFrom::Start(0))
        .and_then(|_| writer.write_all(&mac))
        .and_then(|_| writer.flush())
        .map_err(|e| Error::Encryption(format!("Failed to finalize header: {e}")))?;

    let file_digest = plain_digest.finalize().to_vec();
    let size_encrypted = HEADER_LEN + ciphertext_len;
    debug!(
        "Encrypted {} bytes -> {} bytes, sha256 {}",
        plaintext_len,
        size_encrypted,
        hex::encode(&file_digest)
    );

    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "package".to_string());

    let metadata = EncryptionMetadata {
        encryption_key,
        mac_key,
        initialization_vector: iv,
        mac,
        file_digest,
        profile_identifier: PROFILE_VERSION_1.to_string(),
        file_digest_algorithm: FILE_DIGEST_ALGORITHM.to_string(),
        size: plaintext_len,
        size_encrypted,
    };

    let manifest = FileManifest {
        name,
        size: plaintext_len,
        size_encrypted,
    };

    Ok(EncryptedPackage {
        path: dest.to_path_buf(),
        metadata,
        manifest,
    })
}

/// Decrypt an encrypted package back to plaintext.
///
/// Verifies the HMAC digest over (IV || ciphertext) before trusting the
/// output. Used by the round-trip tests and the `decrypt` diagnostics
/// command; the publish pipeline itself never decrypts.
pub fn decrypt_package(
    encrypted: &Path,
    metadata: &EncryptionMetadata,
    dest: &Path,
) -> Result<()> {
    let mut reader = File::open(encrypted)
        .map_err(|e| Error::Encryption(format!("Failed to open {}: {e}", encrypted.display())))?;

    let mut stored_mac = [0u8; 32];
    let mut iv = [0u8; BLOCK_SIZE];
    reader
        .read_exact(&mut stored_mac)
        .and_then(|_| reader.read_exact(&mut iv))
        .map_err(|e| Error::Encryption(format!("Truncated header: {e}")))?;

    // Authenticate before decrypting.
    let mut hmac = HmacSha256::new_from_slice(&metadata.mac_key)
        .map_err(|e| Error::Encryption(format!("Invalid HMAC key length: {e}")))?;
    hmac.update(&iv);
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| Error::Encryption(format!("Failed to read ciphertext: {e}")))?;
        if read == 0 {
            break;
        }
        hmac.update(&buffer[..read]);
    }
    hmac.verify_slice(&stored_mac)
        .map_err(|_| Error::Encryption("HMAC verification failed".to_string()))?;

    reader
        .seek(SeekFrom::Start(IV_OFFSET + BLOCK_SIZE as u64))
        .map_err(|e| Error::Encryption(format!("Seek failed: {e}")))?;

    let mut writer = File::create(dest)
        .map_err(|e| Error::Encryption(format!("Failed to create {}: {e}", dest.display())))?;
    let mut cipher = Aes256CbcDec::new_from_slices(&metadata.encryption_key, &iv)
        .map_err(|e| Error::Encryption(format!("Invalid key/IV length: {e}")))?;

    // Hold back one block so the final (padded) block can be unpadded.
    let mut holdback: Option<[u8; BLOCK_SIZE]> = None;
    let mut filled = 0usize;
    loop {
        let read = reader
            .read(&mut buffer[filled..])
            .map_err(|e| Error::Encryption(format!("Failed to read ciphertext: {e}")))?;
        if read == 0 {
            break;
        }
        filled += read;

        let whole = (filled / BLOCK_SIZE) * BLOCK_SIZE;
        if whole == 0 {
            continue;
        }
        if let Some(prev) = holdback.take() {
            let mut block = prev;
            cipher.decrypt_block_mut(GenericArray::from_mut_slice(&mut block));
            writer
                .write_all(&block)
                .map_err(|e| Error::Encryption(format!("Failed to write plaintext: {e}")))?;
        }
        // Keep the last whole block back; it may be the padded final block.
        let keep_from = whole - BLOCK_SIZE;
        for block in buffer[..keep_from].chunks_mut(BLOCK_SIZE) {
            cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        writer
            .write_all(&buffer[..keep_from])
            .map_err(|e| Error::Encryption(format!("Failed to write plaintext: {e}")))?;
        let mut kept = [0u8; BLOCK_SIZE];
        kept.copy_from_slice(&buffer[keep_from..whole]);
        holdback = Some(kept);

        buffer.copy_within(whole..filled, 0);
        filled -= whole;
    }

    if filled != 0 {
        return Err(Error::Encryption(format!(
            "Ciphertext length is not a multiple of the block size ({filled} trailing bytes)"
        )));
    }
    let mut last = holdback
        .ok_or_else(|| Error::Encryption("Ciphertext is empty".to_string()))?;
    let unpadded = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut last)
        .map_err(|_| Error::Encryption("Invalid PKCS7 padding".to_string()))?;
    writer
        .write_all(unpadded)
        .and_then(|_| writer.flush())
        .map_err(|e| Error::Encryption(format!("Failed to write plaintext: {e}")))?;

    Ok(())
}
