use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use crate::error::Result;

/// Read size for streaming digests; files are never loaded whole.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Transport digest (MD5, compared with the store's ETag) and fixity digest
/// (SHA-256, kept as object metadata), both lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha256: String,
}

impl Checksums {
    pub fn compute_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::compute_reader(BufReader::with_capacity(CHUNK_SIZE, file))
    }

    pub fn compute_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut md5 = Md5::new();
        let mut sha256 = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            md5.update(&buf[..n]);
            sha256.update(&buf[..n]);
        }

        Ok(Self {
            md5: format!("{:x}", md5.finalize()),
            sha256: format!("{:x}", sha256.finalize()),
        })
    }

    pub fn compute_bytes(content: &[u8]) -> Self {
        Self {
            md5: format!("{:x}", Md5::digest(content)),
            sha256: format!("{:x}", Sha256::digest(content)),
        }
    }
}

/// MD5 of an in-memory buffer, lowercase hex.
pub fn md5_hex(content: &[u8]) -> String {
    format!("{:x}", Md5::digest(content))
}

/// ETag the store reports for an object uploaded in `segment_size` pieces:
/// the MD5 of the concatenated per-segment MD5 hex strings.
pub fn segmented_etag(path: impl AsRef<Path>, segment_size: u64) -> Result<String> {
    let mut file = BufReader::with_capacity(CHUNK_SIZE, File::open(path.as_ref())?);
    let mut manifest = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let mut segment = Md5::new();
        let mut remaining = segment_size;
        let mut read_any = false;

        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = file.read(&mut buf[..want])?;
            if n == 0 {
                break;
            }
            read_any = true;
            segment.update(&buf[..n]);
            remaining -= n as u64;
        }

        if !read_any {
            break;
        }
        manifest.update(format!("{:x}", segment.finalize()).as_bytes());
    }

    Ok(format!("{:x}", manifest.finalize()))
}
