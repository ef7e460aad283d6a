// Copyright (c) 2025 SwarmOS Contributors
// SPDX-License-Identifier: BUSL-1.1
//! Signature verification shared by the Controller and Ledger HTTP surfaces:
//! secp256k1 ECDSA recovery over the keccak-256 hash of a prefixed message
//! (personal-sign / EIP-191 style), adapted from the node's client
//! authentication path to also cover the epoch-seal message.

use anyhow::{anyhow, Result};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 of `message` prefixed the way Ethereum's `personal_sign` does,
/// i.e. `"\x19Ethereum Signed Message:\n" || len(message) || message`.
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(prefixed.as_bytes());
    hasher.finalize(&mut hash);
    hash
}

/// Recovers the signer's address from a 65-byte compact signature (r || s || v)
/// and the message it was produced over. The address is the lowercase
/// 0x-prefixed hex of the last 20 bytes of the keccak-256 of the uncompressed
/// public key.
pub fn recover_address(message: &str, signature: &[u8]) -> Result<String> {
    if signature.len() != 65 {
        return Err(anyhow!(
            "invalid signature size: expected 65 bytes, got {}",
            signature.len()
        ));
    }

    let message_hash = eip191_hash(message);

    let signature_bytes = &signature[..64];
    let mut recovery_id = signature[64];
    if recovery_id >= 27 {
        recovery_id -= 27;
    }
    if recovery_id > 3 {
        return Err(anyhow!("invalid recovery id: expected 0-3, got {}", recovery_id));
    }

    let recovery_id = RecoveryId::try_from(recovery_id)
        .map_err(|e| anyhow!("failed to create recovery id: {}", e))?;
    let signature = Signature::try_from(signature_bytes)
        .map_err(|e| anyhow!("failed to parse signature: {}", e))?;
    let verifying_key = VerifyingKey::recover_from_prehash(&message_hash, &signature, recovery_id)
        .map_err(|e| anyhow!("failed to recover public key: {}", e))?;

    let public_key = verifying_key.to_encoded_point(false);
    let public_key_bytes = public_key.as_bytes();

    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(&public_key_bytes[1..]);
    hasher.finalize(&mut hash);

    Ok(format!("0x{}", hex::encode(&hash[12..])))
}

/// Job-submit signing message: `"SwarmOS Job Request\nType: {kind}\nClient:
/// {client}\nInput: {input_ref}\nTimestamp: {ts}\nNonce: {nonce}"`.
pub fn job_submit_message(kind: &str, client: &str, input_ref: &str, ts: i64, nonce: &str) -> String {
    format!(
        "SwarmOS Job Request\nType: {}\nClient: {}\nInput: {}\nTimestamp: {}\nNonce: {}",
        kind, client, input_ref, ts, nonce
    )
}

/// Derives the 0x-prefixed address for a signing key's own public key, the
/// same derivation `recover_address` performs in reverse. Used by the
/// service binaries to print the identity a loaded key signs as.
pub fn address_from_signing_key(signing_key: &SigningKey) -> String {
    let verifying_key = signing_key.verifying_key();
    let public_key = k256::PublicKey::from(verifying_key);
    let encoded = public_key.to_encoded_point(false);
    let mut hasher = Keccak::v256();
    let mut hash = [0u8; 32];
    hasher.update(&encoded.as_bytes()[1..]);
    hasher.finalize(&mut hash);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Job-complete signing message: binds the worker's completion report to the
/// job it claimed, its result reference, and the proof-of-execution hash it
/// computed, so a recovered signer has to be the worker that actually ran
/// the job and not merely an observer of its public `(job_id, result_ref)`.
pub fn job_complete_message(job_id: &str, result_ref: &str, poe_hash: &str) -> String {
    format!("{}:{}:{}", job_id, result_ref, poe_hash)
}

/// Epoch-seal signing message: `"SwarmOS Epoch Seal\nEpoch: {id}\nMerkle
/// Root: {hex_root}\nJobs: {n}\nDistributed: {amount}\nSealed: {iso_ts}"`.
pub fn epoch_seal_message(epoch_id: &str, hex_root: &str, jobs: u64, amount: &str, sealed_iso: &str) -> String {
    format!(
        "SwarmOS Epoch Seal\nEpoch: {}\nMerkle Root: {}\nJobs: {}\nDistributed: {}\nSealed: {}",
        epoch_id, hex_root, jobs, amount, sealed_iso
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn pubkey_to_address(public_key: &k256::PublicKey) -> String {
        let encoded = public_key.to_encoded_point(false);
        let uncompressed = encoded.as_bytes();
        let mut hasher = Keccak::v256();
        let mut hash = [0u8; 32];
        hasher.update(&uncompressed[1..]);
        hasher.finalize(&mut hash);
        format!("0x{}", hex::encode(&hash[12..]))
    }

    #[test]
    fn recovers_the_signing_address() {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let public_key = k256::PublicKey::from(verifying_key);
        let expected_address = pubkey_to_address(&public_key);

        let message = job_submit_message("spine-mri", &expected_address, "cid123", 1_700_000_000, "n1");
        let hash = eip191_hash(&message);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&hash)
            .expect("prehash signing");
        let signature_bytes = signature.to_bytes();

        let mut compact = [0u8; 65];
        compact[..64].copy_from_slice(&signature_bytes[..]);
        compact[64] = recovery_id.to_byte();

        let recovered = recover_address(&message, &compact).expect("recovery succeeds");
        assert_eq!(recovered, expected_address);
        assert_eq!(recovered.len(), 42);
        assert!(recovered.starts_with("0x"));
    }

    #[test]
    fn rejects_short_signature() {
        let result = recover_address("hello", &[0u8; 32]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("65 bytes"));
    }

    #[test]
    fn epoch_seal_message_matches_format() {
        let msg = epoch_seal_message("epoch-001", "abcd", 3, "1.23", "2026-01-01T00:00:00Z");
        assert_eq!(
            msg,
            "SwarmOS Epoch Seal\nEpoch: epoch-001\nMerkle Root: abcd\nJobs: 3\nDistributed: 1.23\nSealed: 2026-01-01T00:00:00Z"
        );
    }
}
