// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::types::TxStatus;
use crate::network::backend::{SubmittedTx, TransactionBackend};
use crate::services::rebalance::config::ConfirmationPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub attempts: u32,
}

/// Poll for a receipt until it arrives, the nonce is consumed by something
/// else, or the attempt budget runs out. Never resubmits.
pub async fn await_confirmation(
    backend: &dyn TransactionBackend,
    tx: SubmittedTx,
    policy: &ConfirmationPolicy,
) -> Confirmation {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match backend.receipt(tx.hash).await {
            Ok(Some(receipt)) => {
                let status = if receipt.success {
                    TxStatus::Confirmed
                } else {
                    TxStatus::Reverted
                };
                tracing::debug!(target: "confirm", tx_hash = %tx.hash, status = status.as_str(), attempt, "Receipt found");
                return Confirmation {
                    status,
                    block_number: receipt.block_number,
                    attempts: attempt,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(target: "confirm", tx_hash = %tx.hash, attempt, error = %e, "Receipt lookup failed");
            }
        }

        if policy.drop_detection {
            match backend.confirmed_nonce().await {
                Ok(count) if count > tx.nonce => {
                    // The receipt may land between the two reads.
                    if let Ok(Some(receipt)) = backend.receipt(tx.hash).await {
                        return Confirmation {
                            status: if receipt.success {
                                TxStatus::Confirmed
                            } else {
                                TxStatus::Reverted
                            },
                            block_number: receipt.block_number,
                            attempts: attempt,
                        };
                    }
                    tracing::warn!(
                        target: "confirm",
                        tx_hash = %tx.hash,
                        nonce = tx.nonce,
                        confirmed = count,
                        "Nonce consumed without receipt; transaction dropped"
                    );
                    return Confirmation {
                        status: TxStatus::Dropped,
                        block_number: None,
                        attempts: attempt,
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(target: "confirm", error = %e, "Nonce check failed");
                }
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    tracing::warn!(
        target: "confirm",
        tx_hash = %tx.hash,
        attempts = max_attempts,
        "Transaction still pending; giving up"
    );
    Confirmation {
        status: TxStatus::Unconfirmed,
        block_number: None,
        attempts: max_attempts,
    }
}
