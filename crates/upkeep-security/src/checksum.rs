use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// An artifact whose digest matched one of the published checksums.
///
/// Only [`verify_artifact`] constructs this, so install steps that take it
/// cannot run on unverified bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedArtifact {
    path: PathBuf,
    sha256: String,
}

impl VerifiedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; READ_CHUNK_BYTES];
    loop {
        let read = reader
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn normalize_checksum(value: &str) -> String {
    let trimmed = value.trim();
    let trimmed = trimmed
        .split_once(':')
        .filter(|(algorithm, _)| algorithm.eq_ignore_ascii_case("sha256"))
        .map(|(_, digest)| digest)
        .unwrap_or(trimmed);
    trimmed.to_ascii_lowercase()
}

/// True when `actual` equals any of `acceptable` after normalization,
/// irrespective of list order or length. An empty list never matches.
pub fn matches_any(actual: &str, acceptable: &[String]) -> bool {
    let actual = normalize_checksum(actual);
    acceptable
        .iter()
        .any(|candidate| normalize_checksum(candidate) == actual)
}

pub fn verify_sha256_any(path: &Path, acceptable: &[String]) -> Result<bool> {
    let actual = sha256_file_hex(path)?;
    Ok(digest_matches(path, &actual, acceptable))
}

fn digest_matches(path: &Path, actual: &str, acceptable: &[String]) -> bool {
    let matched = matches_any(actual, acceptable);
    if matched {
        debug!(path = %path.display(), sha256 = %actual, "checksum matched");
    } else {
        warn!(
            path = %path.display(),
            sha256 = %actual,
            candidates = acceptable.len(),
            "checksum did not match any published digest"
        );
    }
    matched
}

pub fn verify_artifact(path: &Path, acceptable: &[String]) -> Result<VerifiedArtifact> {
    if acceptable.is_empty() {
        return Err(anyhow!(
            "no published checksums for {}; refusing to trust artifact",
            path.display()
        ));
    }
    let actual = sha256_file_hex(path)?;
    if !digest_matches(path, &actual, acceptable) {
        return Err(anyhow!(
            "checksum mismatch for {}: got {actual}, expected one of [{}]",
            path.display(),
            acceptable.join(", ")
        ));
    }
    Ok(VerifiedArtifact {
        path: path.to_path_buf(),
        sha256: actual,
    })
}
