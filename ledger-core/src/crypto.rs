use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::transaction::TicketPayload;
use crate::types::LedgerError;

pub type PublicKey = VerifyingKey;
pub type SecretKey = SigningKey;

pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data` as lowercase hex.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash_data(data))
}

pub fn generate_keypair() -> (PublicKey, SecretKey) {
    let mut rng = OsRng;
    let secret = SigningKey::generate(&mut rng);
    let public = secret.verifying_key();
    (public, secret)
}

/// Ticket id for a key: the raw public key bytes as hex.
pub fn public_key_hex(public_key: &PublicKey) -> String {
    hex::encode(public_key.to_bytes())
}

pub fn secret_key_hex(secret_key: &SecretKey) -> String {
    hex::encode(secret_key.to_bytes())
}

pub fn signing_key_from_hex(seed_hex: &str) -> Result<SecretKey, LedgerError> {
    let bytes = hex::decode(seed_hex.trim())
        .map_err(|e| LedgerError::Serialization(format!("invalid secret key hex: {e}")))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| LedgerError::Serialization("secret key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

fn sign_message(message: &[u8], secret_key: &SecretKey) -> Signature {
    secret_key.sign(message)
}

/// Sign the canonical payload encoding; returns the signature as hex.
pub fn sign_payload(payload: &TicketPayload, secret_key: &SecretKey) -> Result<String, LedgerError> {
    let bytes = payload.canonical_bytes()?;
    Ok(hex::encode(sign_message(&bytes, secret_key).to_bytes()))
}

/// Check `signature_hex` over the canonical encoding of `payload` under `public_key_hex`.
///
/// Malformed hex, wrong lengths, points off the curve and plain mismatches all read as `false`.
pub fn verify_signature(payload: &TicketPayload, signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(message) = payload.canonical_bytes() else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    let Ok(pk_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(pk_arr) = <[u8; 32]>::try_from(pk_bytes.as_slice()) else {
        return false;
    };
    let Ok(public_key) = VerifyingKey::from_bytes(&pk_arr) else {
        return false;
    };
    public_key.verify(&message, &signature).is_ok()
}
