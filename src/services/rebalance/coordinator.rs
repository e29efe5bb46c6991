// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::data::abi::{ERC20, RebalanceRouter};
use crate::data::db::Database;
use crate::domain::error::PhaseError;
use crate::domain::types::{ApprovalRequest, ExecutionReceipt, Phase, TransactionBundle, TxStatus};
use crate::network::backend::TransactionBackend;
use crate::network::chain_reader::ChainReader;
use crate::services::rebalance::config::RebalanceConfig;
use crate::services::rebalance::confirmation::{Confirmation, await_confirmation};
use alloy::primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one phase bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    Built,
    Approved,
    Simulated,
    Broadcast,
    Confirmed,
    Dropped,
    Unconfirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub state: BundleState,
    pub calls: usize,
    pub approvals: Vec<ExecutionReceipt>,
    pub receipt: Option<ExecutionReceipt>,
}

impl PhaseOutcome {
    fn new(phase: Phase, calls: usize) -> Self {
        Self {
            phase,
            state: BundleState::Built,
            calls,
            approvals: Vec::new(),
            receipt: None,
        }
    }

    /// Nothing to do for this phase after re-reading balances.
    pub fn is_skipped(&self) -> bool {
        self.calls == 0
    }

    fn advance(&mut self, next: BundleState) {
        tracing::debug!(target: "coordinator", phase = %self.phase, from = ?self.state, to = ?next, "Bundle state");
        self.state = next;
    }
}

/// Approves, simulates, broadcasts and confirms phase bundles through the router.
pub struct ExecutionCoordinator<'a> {
    chain: &'a dyn ChainReader,
    backend: &'a dyn TransactionBackend,
    config: &'a RebalanceConfig,
    db: Option<&'a Database>,
    shutdown: Option<&'a CancellationToken>,
}

impl<'a> ExecutionCoordinator<'a> {
    pub fn new(
        chain: &'a dyn ChainReader,
        backend: &'a dyn TransactionBackend,
        config: &'a RebalanceConfig,
    ) -> Self {
        Self {
            chain,
            backend,
            config,
            db: None,
            shutdown: None,
        }
    }

    pub fn with_db(mut self, db: Option<&'a Database>) -> Self {
        self.db = db;
        self
    }

    pub fn with_shutdown(mut self, shutdown: &'a CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub async fn execute(&self, bundle: TransactionBundle) -> Result<PhaseOutcome, PhaseError> {
        let mut outcome = PhaseOutcome::new(bundle.phase, bundle.calls.len());
        if bundle.is_empty() {
            tracing::debug!(target: "coordinator", phase = %bundle.phase, "Empty bundle; skipping");
            return Ok(outcome);
        }

        for approval in &bundle.approvals {
            if let Some(receipt) = self.approve(bundle.phase, approval).await? {
                outcome.approvals.push(receipt);
            }
        }
        outcome.advance(BundleState::Approved);

        if self.shutdown.is_some_and(|s| s.is_cancelled()) {
            tracing::info!(target: "coordinator", phase = %bundle.phase, "Shutdown requested; not simulating");
            return Err(PhaseError::Cancelled);
        }

        let calldata: Bytes = RebalanceRouter::executeCall {
            calls: bundle
                .calls
                .iter()
                .map(|c| RebalanceRouter::RouterCall {
                    target: c.to,
                    value: c.value,
                    data: c.data.clone(),
                })
                .collect(),
            tokensReturn: bundle.tokens_return.clone(),
        }
        .abi_encode()
        .into();
        let value = bundle.total_value();

        self.simulate(bundle.phase, calldata.clone(), value).await?;
        outcome.advance(BundleState::Simulated);

        if self.config.dry_run {
            tracing::info!(
                target: "coordinator",
                phase = %bundle.phase,
                calls = bundle.calls.len(),
                "Dry-run: simulation passed, not broadcasting"
            );
            return Ok(outcome);
        }

        let submitted = self
            .backend
            .submit(self.config.router, calldata, value)
            .await
            .map_err(|e| {
                tracing::warn!(target: "coordinator", phase = %bundle.phase, error = %e, "Broadcast failed");
                PhaseError::from(e)
            })?;
        outcome.advance(BundleState::Broadcast);

        let confirmation =
            await_confirmation(self.backend, submitted, &self.config.confirmation).await;
        let receipt = ExecutionReceipt {
            phase: bundle.phase,
            tx_hash: submitted.hash,
            status: confirmation.status,
            nonce: submitted.nonce,
            block_number: confirmation.block_number,
        };
        self.record(Some(self.config.router), &receipt).await;
        outcome.receipt = Some(receipt.clone());

        let hash = format!("{:#x}", submitted.hash);
        match confirmation.status {
            TxStatus::Confirmed => {
                outcome.advance(BundleState::Confirmed);
                tracing::info!(
                    target: "coordinator",
                    phase = %bundle.phase,
                    tx_hash = %hash,
                    block = ?confirmation.block_number,
                    "Phase confirmed"
                );
                Ok(outcome)
            }
            TxStatus::Dropped => {
                outcome.advance(BundleState::Dropped);
                Err(PhaseError::Dropped {
                    hash,
                    nonce: submitted.nonce,
                })
            }
            TxStatus::Unconfirmed => {
                outcome.advance(BundleState::Unconfirmed);
                Err(PhaseError::Unconfirmed {
                    hash,
                    attempts: confirmation.attempts,
                })
            }
            TxStatus::Reverted => {
                outcome.advance(BundleState::Failed);
                tracing::warn!(target: "coordinator", phase = %bundle.phase, tx_hash = %hash, "Phase reverted on-chain");
                Err(PhaseError::Reverted { hash })
            }
        }
    }

    /// Submit one approval and wait for it, unless the allowance already covers it.
    async fn approve(
        &self,
        phase: Phase,
        approval: &ApprovalRequest,
    ) -> Result<Option<ExecutionReceipt>, PhaseError> {
        let owner = self.backend.owner();
        let failed = |reason: String| PhaseError::ApprovalFailed {
            token: approval.token,
            spender: approval.spender,
            reason,
        };

        let current = self
            .chain
            .allowance(approval.token, owner, approval.spender)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if current >= approval.amount {
            return Ok(None);
        }
        if self.config.dry_run {
            tracing::info!(
                target: "coordinator",
                token = %approval.token,
                spender = %approval.spender,
                amount = %approval.amount,
                "Dry-run: approval needed, not submitting"
            );
            return Ok(None);
        }

        let data: Bytes = ERC20::approveCall {
            spender: approval.spender,
            amount: approval.amount,
        }
        .abi_encode()
        .into();
        let submitted = self
            .backend
            .submit(approval.token, data, U256::ZERO)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let Confirmation {
            status,
            block_number,
            ..
        } = await_confirmation(self.backend, submitted, &self.config.confirmation).await;
        let receipt = ExecutionReceipt {
            phase,
            tx_hash: submitted.hash,
            status,
            nonce: submitted.nonce,
            block_number,
        };
        self.record(Some(approval.token), &receipt).await;

        if status != TxStatus::Confirmed {
            return Err(failed(format!(
                "approval {:#x} {}",
                submitted.hash,
                status.as_str()
            )));
        }
        tracing::info!(
            target: "coordinator",
            token = %approval.token,
            spender = %approval.spender,
            tx_hash = %submitted.hash,
            "Approval confirmed"
        );
        Ok(Some(receipt))
    }

    async fn simulate(&self, phase: Phase, calldata: Bytes, value: U256) -> Result<(), PhaseError> {
        let output = self
            .backend
            .simulate(self.config.router, calldata, value)
            .await
            .map_err(|e| {
                tracing::warn!(target: "coordinator", phase = %phase, error = %e, "Simulation reverted");
                PhaseError::SimulationFailed(e.to_string())
            })?;
        let success = RebalanceRouter::executeCall::abi_decode_returns(&output)
            .map_err(|e| PhaseError::SimulationFailed(format!("undecodable router output: {e}")))?;
        if !success {
            tracing::warn!(target: "coordinator", phase = %phase, "Router simulation returned false");
            return Err(PhaseError::SimulationFailed("router returned false".into()));
        }
        Ok(())
    }

    async fn record(&self, to: Option<Address>, receipt: &ExecutionReceipt) {
        if let Some(db) = self.db
            && let Err(e) = db
                .record_transaction(self.config.chain_id, self.backend.owner(), to, receipt)
                .await
        {
            tracing::warn!(target: "db", tx_hash = %receipt.tx_hash, error = %e, "Failed to record transaction");
        }
    }
}
