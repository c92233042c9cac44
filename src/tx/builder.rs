//! Unsigned envelope construction
//!
//! Builds a single-operation `TransactionEnvelope` from typed parameters:
//! source account, sequence, fee, timeout window, and one operation spec.
//! Contract invocations additionally get simulation results grafted on
//! before signing (`apply_simulation`), matching the prepare step the RPC
//! expects for Soroban transactions.

use crate::amount::Stroops;
use crate::error::{MarketplaceError, Result};
use crate::tx::scval::parse_address;
use std::time::{SystemTime, UNIX_EPOCH};
use stellar_xdr::curr::{
    Asset, ContractExecutable, ContractIdPreimage, ContractIdPreimageFromAddress,
    CreateContractArgs, Hash, HostFunction, InvokeContractArgs, InvokeHostFunctionOp, Limits, Memo,
    MuxedAccount, Operation, OperationBody, PaymentOp, Preconditions, ReadXdr, ScSymbol, ScVal,
    SequenceNumber, SorobanAuthorizationEntry, SorobanTransactionData, TimeBounds, TimePoint,
    Transaction, TransactionEnvelope, TransactionExt, TransactionV1Envelope, Uint256, VecM,
    WriteXdr,
};

/// One ledger operation, in typed form.
#[derive(Debug, Clone)]
pub enum OperationSpec {
    /// Invoke a function on a deployed contract.
    InvokeContract {
        contract_id: String,
        function: String,
        args: Vec<ScVal>,
    },
    /// Install contract code.
    UploadWasm { code: Vec<u8> },
    /// Instantiate a contract from installed code.
    CreateContract {
        deployer: String,
        wasm_hash: [u8; 32],
        salt: [u8; 32],
    },
    /// Classic native payment.
    Payment {
        destination: String,
        amount: Stroops,
    },
}

/// Builds unsigned envelopes with the network's fee and timeout settings.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    base_fee: u32,
    timeout_secs: u64,
}

impl EnvelopeBuilder {
    pub fn new(base_fee: u32, timeout_secs: u64) -> Self {
        Self {
            base_fee,
            timeout_secs,
        }
    }

    /// Build an unsigned envelope for `spec`.
    ///
    /// `sequence` is the account's current sequence number as reported by
    /// Horizon; the transaction consumes the next one.
    pub fn build(
        &self,
        source_account: &str,
        sequence: i64,
        spec: OperationSpec,
    ) -> Result<TransactionEnvelope> {
        let source = account_muxed(source_account)?;
        let operation = Operation {
            source_account: None,
            body: self.operation_body(spec)?,
        };
        let operations: VecM<Operation, 100> = vec![operation]
            .try_into()
            .map_err(|_| MarketplaceError::Build("operation list overflow".to_string()))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| MarketplaceError::Build(format!("system clock: {e}")))?
            .as_secs();

        let tx = Transaction {
            source_account: source,
            fee: self.base_fee,
            seq_num: SequenceNumber(sequence + 1),
            cond: Preconditions::Time(TimeBounds {
                min_time: TimePoint(0),
                max_time: TimePoint(now + self.timeout_secs),
            }),
            memo: Memo::None,
            operations,
            ext: TransactionExt::V0,
        };

        Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
            tx,
            signatures: VecM::default(),
        }))
    }

    fn operation_body(&self, spec: OperationSpec) -> Result<OperationBody> {
        match spec {
            OperationSpec::InvokeContract {
                contract_id,
                function,
                args,
            } => {
                let contract = stellar_strkey::Contract::from_string(&contract_id).map_err(|_| {
                    MarketplaceError::Build(format!("invalid contract id: {contract_id:?}"))
                })?;
                let function_name = ScSymbol(function.as_str().try_into().map_err(|_| {
                    MarketplaceError::Build(format!("invalid function name: {function:?}"))
                })?);
                let args: VecM<ScVal> = args
                    .try_into()
                    .map_err(|_| MarketplaceError::Build("argument list overflow".to_string()))?;

                Ok(OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                    host_function: HostFunction::InvokeContract(InvokeContractArgs {
                        contract_address: stellar_xdr::curr::ScAddress::Contract(Hash(contract.0)),
                        function_name,
                        args,
                    }),
                    auth: VecM::default(),
                }))
            }
            OperationSpec::UploadWasm { code } => {
                let code = code
                    .try_into()
                    .map_err(|_| MarketplaceError::Build("wasm blob too large".to_string()))?;
                Ok(OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                    host_function: HostFunction::UploadContractWasm(code),
                    auth: VecM::default(),
                }))
            }
            OperationSpec::CreateContract {
                deployer,
                wasm_hash,
                salt,
            } => Ok(OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::CreateContract(CreateContractArgs {
                    contract_id_preimage: ContractIdPreimage::Address(
                        ContractIdPreimageFromAddress {
                            address: parse_address(&deployer)?,
                            salt: Uint256(salt),
                        },
                    ),
                    executable: ContractExecutable::Wasm(Hash(wasm_hash)),
                }),
                auth: VecM::default(),
            })),
            OperationSpec::Payment {
                destination,
                amount,
            } => Ok(OperationBody::Payment(PaymentOp {
                destination: account_muxed(&destination)?,
                asset: Asset::Native,
                amount: amount.as_i64(),
            })),
        }
    }
}

/// Graft simulation results onto an unsigned envelope: Soroban transaction
/// data, the minimum resource fee on top of the base fee, and any auth
/// entries the host function requires.
pub fn apply_simulation(
    envelope: TransactionEnvelope,
    sim: &crate::rpc::types::SimulateTransactionResponse,
) -> Result<TransactionEnvelope> {
    if let Some(error) = &sim.error {
        return Err(MarketplaceError::Build(format!(
            "simulation failed: {error}"
        )));
    }

    let TransactionEnvelope::Tx(mut v1) = envelope else {
        return Err(MarketplaceError::Build(
            "only v1 envelopes are supported".to_string(),
        ));
    };

    if let Some(data_xdr) = &sim.transaction_data {
        let data = SorobanTransactionData::from_xdr_base64(data_xdr, Limits::none())?;
        v1.tx.ext = TransactionExt::V1(data);
    }

    if let Some(fee) = &sim.min_resource_fee {
        let resource_fee: u32 = fee
            .parse()
            .map_err(|_| MarketplaceError::Build(format!("bad minResourceFee: {fee:?}")))?;
        v1.tx.fee = v1.tx.fee.saturating_add(resource_fee);
    }

    if let Some(results) = &sim.results {
        if let Some(result) = results.first() {
            if !result.auth.is_empty() {
                let mut entries = Vec::with_capacity(result.auth.len());
                for auth_xdr in &result.auth {
                    entries.push(SorobanAuthorizationEntry::from_xdr_base64(
                        auth_xdr,
                        Limits::none(),
                    )?);
                }
                let mut ops: Vec<Operation> = v1.tx.operations.to_vec();
                if let Some(op) = ops.first_mut() {
                    if let OperationBody::InvokeHostFunction(ref mut invoke) = op.body {
                        invoke.auth = entries
                            .try_into()
                            .map_err(|_| MarketplaceError::Build("auth overflow".to_string()))?;
                    }
                }
                v1.tx.operations = ops
                    .try_into()
                    .map_err(|_| MarketplaceError::Build("operation list overflow".to_string()))?;
            }
        }
    }

    Ok(TransactionEnvelope::Tx(v1))
}

/// Base64-XDR encoding of an envelope, the form the RPC accepts.
pub fn envelope_to_base64(envelope: &TransactionEnvelope) -> Result<String> {
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

fn account_muxed(account: &str) -> Result<MuxedAccount> {
    let pk = stellar_strkey::ed25519::PublicKey::from_string(account)
        .map_err(|_| MarketplaceError::Build(format!("invalid account address: {account:?}")))?;
    Ok(MuxedAccount::Ed25519(Uint256(pk.0)))
}
