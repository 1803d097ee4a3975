//! Enrolled reference images with SHA-256 integrity verification.
//!
//! Each enrolled reference is stored as two files in the store directory:
//!
//! - `<name>.ref`: the encoded image bytes exactly as enrolled
//! - `<name>.sha256`: hex SHA-256 digest of those bytes
//!
//! [`ReferenceStore::load`] refuses to hand out bytes whose digest no longer
//! matches, so a swapped or truncated reference is reported instead of being
//! compared against.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXT: &str = "ref";
const DIGEST_EXT: &str = "sha256";

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("invalid reference name: {0:?} (allowed: A-Z a-z 0-9 _ -)")]
    InvalidName(String),

    #[error("reference not enrolled: {name} ({path})")]
    MissingReference { name: String, path: PathBuf },

    #[error("failed to open reference file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read reference file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write reference file: {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "reference checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: String,
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// Hex SHA-256 digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hex SHA-256 digest of a file, streamed rather than read into memory.
pub fn sha256_file_hex(path: &Path) -> Result<String, ReferenceError> {
    let mut file = fs::File::open(path).map_err(|source| ReferenceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|source| ReferenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Directory of enrolled reference images.
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    dir: PathBuf,
}

impl ReferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store `bytes` as the reference for `name`, replacing any previous one.
    ///
    /// Both files are staged as `.part` siblings before either is renamed
    /// into place, so a failed write leaves the previous reference loadable.
    /// Returns the digest.
    pub fn enroll(&self, name: &str, bytes: &[u8]) -> Result<String, ReferenceError> {
        validate_name(name)?;
        fs::create_dir_all(&self.dir).map_err(|source| ReferenceError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let digest = sha256_hex(bytes);
        let image_path = self.image_path(name);
        let digest_path = self.digest_path(name);

        let image_part = write_part(&image_path, bytes)?;
        let digest_part = match write_part(&digest_path, format!("{digest}\n").as_bytes()) {
            Ok(part) => part,
            Err(e) => {
                let _ = fs::remove_file(&image_part);
                return Err(e);
            }
        };

        commit_part(&image_part, &image_path)?;
        commit_part(&digest_part, &digest_path)?;

        tracing::info!(name, digest = %digest, bytes = bytes.len(), "reference enrolled");
        Ok(digest)
    }

    /// Read the reference for `name` and verify it against its stored digest.
    pub fn load(&self, name: &str) -> Result<Vec<u8>, ReferenceError> {
        let (image_path, expected) = self.expected_digest(name)?;
        let bytes = read_file(&image_path)?;
        check_digest(name, image_path, expected, sha256_hex(&bytes))?;
        Ok(bytes)
    }

    /// Verify the stored reference without loading it into memory.
    pub fn verify(&self, name: &str) -> Result<(), ReferenceError> {
        let (image_path, expected) = self.expected_digest(name)?;
        let got = sha256_file_hex(&image_path)?;
        check_digest(name, image_path, expected, got)
    }

    /// Image path and recorded digest for an enrolled `name`.
    fn expected_digest(&self, name: &str) -> Result<(PathBuf, String), ReferenceError> {
        validate_name(name)?;
        let image_path = self.image_path(name);
        let digest_path = self.digest_path(name);

        if !image_path.exists() || !digest_path.exists() {
            return Err(ReferenceError::MissingReference {
                name: name.to_string(),
                path: image_path,
            });
        }

        let expected = read_file(&digest_path)?;
        let expected = String::from_utf8_lossy(&expected).trim().to_string();
        Ok((image_path, expected))
    }

    /// Delete the reference for `name`. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool, ReferenceError> {
        validate_name(name)?;
        let mut removed = false;
        for path in [self.image_path(name), self.digest_path(name)] {
            match fs::remove_file(&path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(ReferenceError::Write { path, source }),
            }
        }
        if removed {
            tracing::info!(name, "reference removed");
        }
        Ok(removed)
    }

    /// Names of all enrolled references, sorted. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<String>, ReferenceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ReferenceError::Open {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ReferenceError::Read {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn image_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{IMAGE_EXT}"))
    }

    fn digest_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{DIGEST_EXT}"))
    }
}

fn validate_name(name: &str) -> Result<(), ReferenceError> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ReferenceError::InvalidName(name.to_string()))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ReferenceError> {
    let mut file = fs::File::open(path).map_err(|source| ReferenceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|source| ReferenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(buf)
}

fn check_digest(
    name: &str,
    path: PathBuf,
    expected: String,
    got: String,
) -> Result<(), ReferenceError> {
    if got == expected {
        return Ok(());
    }
    tracing::warn!(name, path = %path.display(), "reference checksum mismatch");
    Err(ReferenceError::ChecksumMismatch {
        name: name.to_string(),
        path,
        expected,
        got,
    })
}

/// Write `bytes` to the `.part` sibling of `dest` and return its path.
fn write_part(dest: &Path, bytes: &[u8]) -> Result<PathBuf, ReferenceError> {
    let part_path = dest.with_extension(format!(
        "{}.part",
        dest.extension().and_then(|e| e.to_str()).unwrap_or_default()
    ));
    let write_err = |source| ReferenceError::Write {
        path: part_path.clone(),
        source,
    };

    let mut file = fs::File::create(&part_path).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    Ok(part_path)
}

fn commit_part(part: &Path, dest: &Path) -> Result<(), ReferenceError> {
    fs::rename(part, dest).map_err(|source| ReferenceError::Write {
        path: dest.to_path_buf(),
        source,
    })
}
