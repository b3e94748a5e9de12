//! Streaming WAV writer with deferred header fix-up and optional per-chunk encryption
//!
//! `hound` commits to a final data length up front and has no hook for
//! framing encrypted chunks, so the header here is written by hand: a
//! placeholder RIFF/fmt/data header is emitted at `open()`, sample data
//! streams through `write()`, and the real lengths are patched in by
//! seeking back into the file at `close()`.
//!
//! When an [`Encryptor`] is configured, each call to `write()` seals its
//! payload independently and the file on disk is a sequence of
//! `u32 length || ciphertext` frames rather than raw PCM following the
//! `data` chunk; the WAV header's `data` size then reflects the total size
//! of that framed region, not a playable PCM byte count. Plain (unencrypted)
//! files remain directly playable.

use crate::crypto::Encryptor;
use crate::error::CaptureError;
use byteorder::{LittleEndian, WriteBytesExt};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const HEADER_LEN: u64 = 44;
const DATA_SIZE_OFFSET: u64 = 40;
const RIFF_SIZE_OFFSET: u64 = 4;
const SAMPLE_RATE_OFFSET: u64 = 24;
const BYTE_RATE_OFFSET: u64 = 28;
const BLOCK_ALIGN_OFFSET: u64 = 32;

/// Per-writer configuration: output format plus an optional cipher.
#[derive(Clone)]
pub struct WavWriterConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub encryptor: Option<Arc<dyn Encryptor>>,
}

/// Streaming writer for a single WAV file.
///
/// `open()`, `write()` (repeatedly), then `close()`. Dropping a writer that
/// was never `close()`d leaves a file with a placeholder header; it is not
/// cleaned up automatically.
pub struct WavWriter {
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    config: Option<WavWriterConfig>,
    bytes_written: u64,
}

impl Default for WavWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WavWriter {
    /// Construct an unopened writer.
    pub fn new() -> Self {
        Self {
            file: None,
            path: None,
            config: None,
            bytes_written: 0,
        }
    }

    /// True once `open()` has succeeded and `close()` has not yet run.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Running count of bytes handed to disk so far, including the header
    /// and any encryption framing.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Create `path` (and its parent directory, if missing) and write a
    /// placeholder WAV header.
    pub fn open(&mut self, path: &Path, config: WavWriterConfig) -> Result<(), CaptureError> {
        if self.is_open() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut file = BufWriter::new(file);
        write_placeholder_header(&mut file, &config)?;
        file.flush()?;

        self.bytes_written = HEADER_LEN;
        self.path = Some(path.to_path_buf());
        self.config = Some(config);
        self.file = Some(file);
        Ok(())
    }

    /// Append a chunk of sample bytes (or, with an encryptor configured, seal
    /// and append it as a length-prefixed encrypted frame).
    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| CaptureError::StorageError("writer is not open".to_string()))?
            .clone();
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("writer is not open".to_string()))?;

        match &config.encryptor {
            None => {
                file.write_all(data)?;
                self.bytes_written += data.len() as u64;
            }
            Some(encryptor) => {
                let blob = encryptor.encrypt(data)?;
                file.write_u32::<LittleEndian>(blob.len() as u32)?;
                file.write_all(&blob)?;
                self.bytes_written += 4 + blob.len() as u64;
            }
        }
        Ok(())
    }

    /// Patch the RIFF/fmt/data header with final sizes, flush, and compute
    /// the SHA-256 checksum of the file as written to disk.
    ///
    /// `actual_sample_rate`, when given, overwrites the rate baked in at
    /// `open()` time — used when the mic rate probe determines the real
    /// output rate only after the header has already been written once.
    pub fn close(&mut self, actual_sample_rate: Option<u32>) -> Result<(u64, String), CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::StorageError("writer is not open".to_string()))?;
        let config = self
            .config
            .take()
            .ok_or_else(|| CaptureError::StorageError("writer is not open".to_string()))?;
        let path = self
            .path
            .take()
            .ok_or_else(|| CaptureError::StorageError("writer is not open".to_string()))?;

        let total_bytes = self.bytes_written;
        let data_size = total_bytes - HEADER_LEN;

        if let Some(rate) = actual_sample_rate {
            let byte_rate = rate * config.channels as u32 * config.bit_depth as u32 / 8;
            let block_align = config.channels * config.bit_depth / 8;
            file.seek(SeekFrom::Start(SAMPLE_RATE_OFFSET))?;
            file.write_u32::<LittleEndian>(rate)?;
            file.seek(SeekFrom::Start(BYTE_RATE_OFFSET))?;
            file.write_u32::<LittleEndian>(byte_rate)?;
            file.seek(SeekFrom::Start(BLOCK_ALIGN_OFFSET))?;
            file.write_u16::<LittleEndian>(block_align)?;
        }

        file.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        file.write_u32::<LittleEndian>(data_size as u32)?;

        file.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        file.write_u32::<LittleEndian>((total_bytes - 8) as u32)?;

        file.flush()?;
        drop(file);

        let checksum = checksum_file(&path)?;
        Ok((total_bytes, checksum))
    }
}

fn write_placeholder_header<W: Write>(w: &mut W, config: &WavWriterConfig) -> Result<(), CaptureError> {
    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(0)?; // file size - 8, patched at close()
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_u32::<LittleEndian>(16)?; // PCM fmt chunk size
    w.write_u16::<LittleEndian>(1)?; // PCM
    w.write_u16::<LittleEndian>(config.channels)?;
    w.write_u32::<LittleEndian>(config.sample_rate)?;
    let byte_rate = config.sample_rate * config.channels as u32 * config.bit_depth as u32 / 8;
    w.write_u32::<LittleEndian>(byte_rate)?;
    let block_align = config.channels * config.bit_depth / 8;
    w.write_u16::<LittleEndian>(block_align)?;
    w.write_u16::<LittleEndian>(config.bit_depth)?;

    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(0)?; // data size, patched at close()
    Ok(())
}

fn checksum_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
