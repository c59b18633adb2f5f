use anyhow::{Context, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

pub fn parse_public_key_hex(public_key_hex: &str) -> Result<VerifyingKey> {
    let public_key_bytes =
        hex::decode(public_key_hex.trim()).context("failed to decode manifest public key hex")?;
    let public_key_len = public_key_bytes.len();
    let public_key_array: [u8; 32] = public_key_bytes.try_into().map_err(|_| {
        anyhow::anyhow!(
            "invalid manifest public key length: expected 32 bytes, got {}",
            public_key_len
        )
    })?;
    VerifyingKey::from_bytes(&public_key_array).context("invalid manifest public key bytes")
}

/// Checks a detached Ed25519 signature over `payload`. Malformed key or
/// signature encodings are errors; a well-formed signature that does not
/// verify yields `Ok(false)`.
pub fn verify_detached_signature_hex(
    payload: &[u8],
    public_key_hex: &str,
    signature_hex: &str,
) -> Result<bool> {
    let verifying_key = parse_public_key_hex(public_key_hex)?;
    let signature_bytes =
        hex::decode(signature_hex.trim()).context("failed to decode manifest signature hex")?;
    let signature_len = signature_bytes.len();
    let signature_array: [u8; 64] = signature_bytes.try_into().map_err(|_| {
        anyhow::anyhow!(
            "invalid manifest signature length: expected 64 bytes, got {}",
            signature_len
        )
    })?;
    let signature = Signature::from_bytes(&signature_array);

    Ok(verifying_key.verify(payload, &signature).is_ok())
}
