//! Contract installation workflow
//!
//! Two transactions through the same submission pipeline: upload the wasm
//! blob, then instantiate a contract from a (deployer address, salt)
//! preimage. The wasm hash is the local sha256 of the code and the contract
//! id is derived from the preimage, so neither needs to be read back from
//! the ledger.

use crate::error::{MarketplaceError, Result};
use crate::rpc::{HorizonClient, LedgerRpc};
use crate::task::TxReceipt;
use crate::telemetry::OperationContext;
use crate::tx::{submit_and_confirm, EnvelopeBuilder, OperationSpec, SubmissionConfig};
use crate::wallet::{network_id, LocalSigner, Signer};
use rand::RngCore;
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    ContractIdPreimage, ContractIdPreimageFromAddress, Hash, HashIdPreimage,
    HashIdPreimageContractId, Limits, Uint256, WriteXdr,
};
use tracing::info;

/// Result of a completed deployment.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    /// Address of the freshly created deployer account.
    pub deployer: String,

    /// Secret seed of the deployer, so the caller can keep it.
    pub secret_seed: String,

    /// sha256 of the uploaded code, hex-encoded.
    pub wasm_hash: String,

    /// Derived contract id (`C...`).
    pub contract_id: String,

    pub upload_receipt: TxReceipt,
    pub create_receipt: TxReceipt,
}

/// Create and fund a throwaway deployer account, then install and
/// instantiate the contract.
pub async fn deploy_contract(
    rpc: &dyn LedgerRpc,
    horizon: &HorizonClient,
    builder: &EnvelopeBuilder,
    submission: &SubmissionConfig,
    network_passphrase: &str,
    wasm: &[u8],
) -> Result<DeployOutcome> {
    let deployer = LocalSigner::random(network_passphrase);
    info!(address = %deployer.address(), "funding deployer account");
    horizon.fund(&deployer.address()).await?;

    // The account record is not visible until the funding transaction
    // closes; poll for it with the same budget used for confirmations.
    wait_for_account(horizon, &deployer.address(), submission).await?;

    deploy_contract_with(rpc, horizon, builder, submission, network_passphrase, &deployer, wasm)
        .await
}

/// Install and instantiate the contract with an existing funded deployer.
pub async fn deploy_contract_with(
    rpc: &dyn LedgerRpc,
    horizon: &HorizonClient,
    builder: &EnvelopeBuilder,
    submission: &SubmissionConfig,
    network_passphrase: &str,
    deployer: &LocalSigner,
    wasm: &[u8],
) -> Result<DeployOutcome> {
    if wasm.is_empty() {
        return Err(MarketplaceError::Build("empty wasm blob".to_string()));
    }
    let address = deployer.address();

    // Upload the code.
    let sequence = horizon.sequence(&address).await?;
    let upload = builder.build(
        &address,
        sequence,
        OperationSpec::UploadWasm {
            code: wasm.to_vec(),
        },
    )?;
    let ctx = OperationContext::new("upload_wasm");
    let upload_receipt =
        submit_and_confirm(rpc, deployer, upload, true, submission, &ctx).await?;

    let wasm_hash: [u8; 32] = Sha256::digest(wasm).into();
    info!(wasm_hash = %hex::encode(wasm_hash), "code installed");

    // Instantiate from the (deployer, salt) preimage.
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);

    let sequence = horizon.sequence(&address).await?;
    let create = builder.build(
        &address,
        sequence,
        OperationSpec::CreateContract {
            deployer: address.clone(),
            wasm_hash,
            salt,
        },
    )?;
    let ctx = OperationContext::new("create_contract");
    let create_receipt =
        submit_and_confirm(rpc, deployer, create, true, submission, &ctx).await?;

    let contract_id = derive_contract_id(network_passphrase, &address, &salt)?;
    info!(contract_id = %contract_id, "contract deployed");

    Ok(DeployOutcome {
        deployer: address,
        secret_seed: deployer.secret_seed(),
        wasm_hash: hex::encode(wasm_hash),
        contract_id,
        upload_receipt,
        create_receipt,
    })
}

/// Contract ids are deterministic: sha256 of the contract-id preimage
/// (network id + deployer address + salt), strkey-encoded.
pub fn derive_contract_id(
    network_passphrase: &str,
    deployer: &str,
    salt: &[u8; 32],
) -> Result<String> {
    let preimage = HashIdPreimage::ContractId(HashIdPreimageContractId {
        network_id: Hash(network_id(network_passphrase)),
        contract_id_preimage: ContractIdPreimage::Address(ContractIdPreimageFromAddress {
            address: crate::tx::scval::parse_address(deployer)?,
            salt: Uint256(*salt),
        }),
    });
    let bytes = preimage.to_xdr(Limits::none())?;
    let id: [u8; 32] = Sha256::digest(&bytes).into();
    Ok(stellar_strkey::Contract(id).to_string())
}

async fn wait_for_account(
    horizon: &HorizonClient,
    address: &str,
    submission: &SubmissionConfig,
) -> Result<()> {
    for _ in 0..submission.max_poll_attempts {
        if horizon.sequence(address).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(submission.poll_interval).await;
    }
    Err(MarketplaceError::Config(format!(
        "deployer account {address} never appeared on the network"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockLedger;
    use std::time::Duration;

    const TESTNET: &str = "Test SDF Network ; September 2015";

    #[test]
    fn contract_id_derivation_is_deterministic() {
        let deployer = "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ";
        let salt = [1u8; 32];

        let a = derive_contract_id(TESTNET, deployer, &salt).unwrap();
        let b = derive_contract_id(TESTNET, deployer, &salt).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with('C'));

        let other_salt = derive_contract_id(TESTNET, deployer, &[2u8; 32]).unwrap();
        assert_ne!(a, other_salt);

        let other_network = derive_contract_id(
            "Public Global Stellar Network ; September 2015",
            deployer,
            &salt,
        )
        .unwrap();
        assert_ne!(a, other_network);
    }

    #[tokio::test]
    async fn deploys_through_upload_then_create() {
        let deployer = LocalSigner::random(TESTNET);
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/accounts/{}", deployer.address()).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sequence":"10","balances":[{"balance":"10000.0000000","asset_type":"native"}]}"#)
            .expect_at_least(2)
            .create_async()
            .await;
        let horizon =
            HorizonClient::new(server.url(), server.url(), Duration::from_secs(5)).unwrap();

        let rpc = MockLedger::new()
            .simulate_ok_with_fee("5000")
            .accept_with_hash("deployhash")
            .poll_success(500)
            .poll_success(501);

        let outcome = deploy_contract_with(
            &rpc,
            &horizon,
            &EnvelopeBuilder::new(100, 30),
            &SubmissionConfig {
                poll_interval: Duration::from_millis(1),
                max_poll_attempts: 5,
            },
            TESTNET,
            &deployer,
            b"\0asm-fake-module",
        )
        .await
        .unwrap();

        assert_eq!(outcome.deployer, deployer.address());
        assert!(outcome.contract_id.starts_with('C'));
        assert_eq!(outcome.wasm_hash.len(), 64);
        // Upload and create are two separate submissions.
        assert_eq!(rpc.send_count(), 2);
    }

    #[tokio::test]
    async fn rejects_empty_wasm() {
        let deployer = LocalSigner::random(TESTNET);
        let server = mockito::Server::new_async().await;
        let horizon =
            HorizonClient::new(server.url(), server.url(), Duration::from_secs(5)).unwrap();
        let rpc = MockLedger::new();

        let err = deploy_contract_with(
            &rpc,
            &horizon,
            &EnvelopeBuilder::new(100, 30),
            &SubmissionConfig::default(),
            TESTNET,
            &deployer,
            b"",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketplaceError::Build(_)));
    }
}
