//! Signer gateway and local keypair management
//!
//! The pipeline hands an unsigned envelope to a [`Signer`] and gets back a
//! signed one; key custody stays behind the trait. [`LocalSigner`] is the
//! file-backed implementation used by the CLI and the deploy workflow.

use crate::error::{MarketplaceError, Result};
use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    DecoratedSignature, Hash, Limits, Signature, SignatureHint, TransactionEnvelope,
    TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction, WriteXdr,
};
use zeroize::Zeroize;

/// Signs transaction envelopes on behalf of one account.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Account address (`G...`) of the signing identity.
    fn address(&self) -> String;

    /// Sign the envelope, returning it with the signature attached.
    ///
    /// A refusal (hardware button, wallet dialog dismissed, bad key) is a
    /// `SignerDeclined` error.
    async fn sign(&self, envelope: &TransactionEnvelope) -> Result<TransactionEnvelope>;
}

/// ed25519 keypair signer bound to a network passphrase.
#[derive(Debug)]
pub struct LocalSigner {
    signing_key: SigningKey,
    network_id: [u8; 32],
    address: String,
}

impl LocalSigner {
    /// Build a signer from a raw 32-byte seed.
    pub fn from_seed(seed: [u8; 32], network_passphrase: &str) -> Result<Self> {
        if seed.iter().all(|&b| b == 0) {
            return Err(MarketplaceError::SignerDeclined(
                "all-zero seed rejected".to_string(),
            ));
        }
        let signing_key = SigningKey::from_bytes(&seed);
        let address =
            stellar_strkey::ed25519::PublicKey(signing_key.verifying_key().to_bytes()).to_string();
        Ok(Self {
            signing_key,
            network_id: network_id(network_passphrase),
            address,
        })
    }

    /// Load a keypair file. Two formats are accepted: an `S...` strkey seed
    /// string, or a JSON array of 32 seed bytes.
    pub fn from_file(path: &str, network_passphrase: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MarketplaceError::Config(format!("failed to read keypair file {path:?}: {e}"))
        })?;
        let trimmed = raw.trim();

        let mut seed: [u8; 32] = if trimmed.starts_with('S') {
            stellar_strkey::ed25519::PrivateKey::from_string(trimmed)
                .map_err(|_| MarketplaceError::Config("invalid secret seed strkey".to_string()))?
                .0
        } else {
            let bytes: Vec<u8> = serde_json::from_str(trimmed)
                .map_err(|e| MarketplaceError::Config(format!("invalid keypair JSON: {e}")))?;
            bytes.as_slice().try_into().map_err(|_| {
                MarketplaceError::Config(format!(
                    "invalid seed length: expected 32 bytes, got {}",
                    bytes.len()
                ))
            })?
        };

        let signer = Self::from_seed(seed, network_passphrase);
        seed.zeroize();
        signer
    }

    /// Fresh random keypair, for deploy accounts and simulation sources.
    pub fn random(network_passphrase: &str) -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        let address =
            stellar_strkey::ed25519::PublicKey(signing_key.verifying_key().to_bytes()).to_string();
        Self {
            signing_key,
            network_id: network_id(network_passphrase),
            address,
        }
    }

    /// Secret seed in strkey form, for persisting freshly generated deploy
    /// accounts.
    pub fn secret_seed(&self) -> String {
        stellar_strkey::ed25519::PrivateKey(self.signing_key.to_bytes()).to_string()
    }

    fn decorated_signature(&self, tx_hash: &[u8; 32]) -> Result<DecoratedSignature> {
        let signature = self.signing_key.sign(tx_hash);
        let public = self.signing_key.verifying_key().to_bytes();
        let hint: [u8; 4] = public[28..32].try_into().expect("public key is 32 bytes");
        Ok(DecoratedSignature {
            hint: SignatureHint(hint),
            signature: Signature(
                signature
                    .to_bytes()
                    .to_vec()
                    .try_into()
                    .map_err(|_| MarketplaceError::SignerDeclined("signature overflow".into()))?,
            ),
        })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign(&self, envelope: &TransactionEnvelope) -> Result<TransactionEnvelope> {
        let TransactionEnvelope::Tx(v1) = envelope else {
            return Err(MarketplaceError::SignerDeclined(
                "only v1 envelopes are supported".to_string(),
            ));
        };

        let payload = TransactionSignaturePayload {
            network_id: Hash(self.network_id),
            tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(v1.tx.clone()),
        };
        let payload_xdr = payload.to_xdr(Limits::none())?;
        let tx_hash: [u8; 32] = Sha256::digest(&payload_xdr).into();

        let mut signatures = v1.signatures.to_vec();
        signatures.push(self.decorated_signature(&tx_hash)?);

        let mut signed = v1.clone();
        signed.signatures = signatures
            .try_into()
            .map_err(|_| MarketplaceError::SignerDeclined("too many signatures".to_string()))?;
        Ok(TransactionEnvelope::Tx(signed))
    }
}

/// Network id: sha256 of the network passphrase.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}
