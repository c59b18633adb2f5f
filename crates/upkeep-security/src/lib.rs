mod checksum;
mod ed25519;

pub use checksum::{
    matches_any, normalize_checksum, sha256_file_hex, sha256_hex, verify_artifact,
    verify_sha256_any, VerifiedArtifact,
};
pub use ed25519::{parse_public_key_hex, verify_detached_signature_hex};
