// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::domain::constants::{BPS_DENOMINATOR, DEFAULT_GAS_LIMIT, GAS_LIMIT_BUFFER_BPS, MAX_GAS_LIMIT};
use crate::network::gas::GasOracle;
use crate::network::nonce::NonceManager;
use crate::network::provider::HttpProvider;
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{ReceiptResponse, TxSignerSync};
use alloy::primitives::{Address, B256, Bytes, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::time::Duration;

/// A signed transaction accepted by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTx {
    pub hash: B256,
    pub nonce: u64,
}

/// Inclusion result read from a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionStatus {
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Everything the coordinator needs to move a transaction from the owner
/// account onto chain.
#[async_trait]
pub trait TransactionBackend: Send + Sync {
    /// Account that signs and pays for every transaction.
    fn owner(&self) -> Address;

    /// Static call from the owner against the latest state.
    async fn simulate(&self, to: Address, data: Bytes, value: U256) -> Result<Bytes, AppError>;

    /// Sign with the next pending nonce and broadcast.
    async fn submit(&self, to: Address, data: Bytes, value: U256) -> Result<SubmittedTx, AppError>;

    async fn receipt(&self, hash: B256) -> Result<Option<InclusionStatus>, AppError>;

    /// Number of owner transactions included so far.
    async fn confirmed_nonce(&self) -> Result<u64, AppError>;
}

pub struct RpcTransactionBackend {
    provider: HttpProvider,
    signer: PrivateKeySigner,
    chain_id: u64,
    nonce_manager: NonceManager,
    gas_oracle: GasOracle,
}

impl RpcTransactionBackend {
    pub fn new(
        provider: HttpProvider,
        signer: PrivateKeySigner,
        chain_id: u64,
        max_gas_price_gwei: u64,
    ) -> Self {
        let nonce_manager = NonceManager::new(provider.clone(), signer.address());
        let gas_oracle = GasOracle::new(provider.clone(), max_gas_price_gwei);
        Self {
            provider,
            signer,
            chain_id,
            nonce_manager,
            gas_oracle,
        }
    }

    fn request(&self, to: Address, data: Bytes, value: U256) -> TransactionRequest {
        TransactionRequest {
            from: Some(self.signer.address()),
            to: Some(TxKind::Call(to)),
            value: Some(value),
            input: TransactionInput::new(data),
            chain_id: Some(self.chain_id),
            ..Default::default()
        }
    }

    async fn gas_limit(&self, request: TransactionRequest) -> u64 {
        match self.provider.estimate_gas(request).await {
            Ok(estimate) => buffered_gas_limit(estimate),
            Err(e) => {
                tracing::warn!(target: "backend", error = %e, "Gas estimation failed; using default limit");
                DEFAULT_GAS_LIMIT
            }
        }
    }

    fn sign(&self, tx: &mut TxEip1559) -> Result<(Vec<u8>, B256), AppError> {
        let sig = TxSignerSync::sign_transaction_sync(&self.signer, tx)
            .map_err(|e| AppError::Strategy(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = tx.clone().into_signed(sig).into();
        Ok((signed.encoded_2718(), *signed.tx_hash()))
    }
}

/// Estimate plus a 20% margin, bounded by a hard ceiling.
pub fn buffered_gas_limit(estimate: u64) -> u64 {
    let buffered = u128::from(estimate) * u128::from(GAS_LIMIT_BUFFER_BPS) / u128::from(BPS_DENOMINATOR);
    (buffered.min(u128::from(MAX_GAS_LIMIT))) as u64
}

#[async_trait]
impl TransactionBackend for RpcTransactionBackend {
    fn owner(&self) -> Address {
        self.signer.address()
    }

    async fn simulate(&self, to: Address, data: Bytes, value: U256) -> Result<Bytes, AppError> {
        let request = self.request(to, data, value);
        self.provider
            .call(request)
            .await
            .map_err(|e| AppError::Strategy(format!("Simulation reverted: {}", e)))
    }

    async fn submit(&self, to: Address, data: Bytes, value: U256) -> Result<SubmittedTx, AppError> {
        let request = self.request(to, data.clone(), value);
        let gas_limit = self.gas_limit(request).await;
        let fees = self.gas_oracle.estimate_eip1559_fees().await?;
        let nonce = self.nonce_manager.next_nonce().await?;

        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit,
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input: data,
        };
        let (raw, hash) = self.sign(&mut tx)?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.provider.send_raw_transaction(raw.as_slice()).await {
                Ok(_) => break,
                Err(e) if attempts < 2 => {
                    tracing::warn!(target: "backend", error = %e, attempt = attempts, "Retrying raw tx send");
                }
                Err(e) => {
                    return Err(AppError::Transaction {
                        hash: format!("{:#x}", hash),
                        reason: format!("send failed: {}", e),
                    });
                }
            }
        }

        tracing::info!(
            target: "backend",
            tx_hash = %hash,
            nonce,
            gas_limit,
            max_fee_gwei = fees.max_fee_per_gas / 1_000_000_000,
            "Transaction broadcast"
        );
        Ok(SubmittedTx { hash, nonce })
    }

    async fn receipt(&self, hash: B256) -> Result<Option<InclusionStatus>, AppError> {
        let provider = self.provider.clone();
        let receipt = retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_receipt(hash).await }
            },
            2,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Receipt fetch failed: {}", e)))?;
        Ok(receipt.map(|r| InclusionStatus {
            success: r.status(),
            block_number: r.block_number,
        }))
    }

    async fn confirmed_nonce(&self) -> Result<u64, AppError> {
        self.nonce_manager.confirmed_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_limit_gets_margin_and_ceiling() {
        assert_eq!(buffered_gas_limit(100_000), 120_000);
        assert_eq!(buffered_gas_limit(0), 0);
        assert_eq!(buffered_gas_limit(MAX_GAS_LIMIT), MAX_GAS_LIMIT);
    }
}
