// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::data::db::Database;
use crate::domain::types::VaultPosition;
use crate::network::chain_reader::ChainReader;
use alloy::primitives::{Address, U256};

/// Reads the owner's vault position for a token. Every call goes to chain.
pub struct VaultReconciler<'a> {
    chain: &'a dyn ChainReader,
    db: Option<&'a Database>,
    chain_id: u64,
}

impl<'a> VaultReconciler<'a> {
    pub fn new(chain: &'a dyn ChainReader, db: Option<&'a Database>, chain_id: u64) -> Self {
        Self { chain, db, chain_id }
    }

    pub async fn reconcile(
        &self,
        token: Address,
        vault: Option<Address>,
        owner: Address,
    ) -> Result<Option<VaultPosition>, AppError> {
        let Some(vault) = vault else {
            return Ok(None);
        };

        let asset = self.chain.vault_asset(vault).await?;
        if asset != token {
            return Err(AppError::Validation {
                field: "vaults".into(),
                message: format!("vault {vault:#x} holds {asset:#x}, not {token:#x}"),
            });
        }

        let shares = self.chain.vault_shares(vault, owner).await?;
        if shares.is_zero() {
            return Ok(None);
        }
        let redeemable = self.chain.preview_redeem(vault, shares).await?;

        let principal = match self.db {
            Some(db) => db
                .vault_principal(self.chain_id, vault, owner)
                .await
                .unwrap_or_else(|e| {
                    tracing::debug!(target: "vaults", vault = %vault, error = %e, "Principal lookup failed");
                    None
                }),
            None => None,
        };
        let accrued_interest = accrued_interest(redeemable, principal);

        tracing::debug!(
            target: "vaults",
            token = %token,
            vault = %vault,
            shares = %shares,
            redeemable = %redeemable,
            accrued = %accrued_interest,
            "Reconciled vault position"
        );

        Ok(Some(VaultPosition {
            vault,
            shares,
            redeemable,
            accrued_interest,
        }))
    }
}

/// Redeemable minus recorded principal; zero without history.
pub fn accrued_interest(redeemable: U256, principal: Option<U256>) -> U256 {
    principal
        .map(|p| redeemable.saturating_sub(p))
        .unwrap_or(U256::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_needs_recorded_principal() {
        let redeemable = U256::from(1_050u64);
        assert_eq!(accrued_interest(redeemable, None), U256::ZERO);
        assert_eq!(
            accrued_interest(redeemable, Some(U256::from(1_000u64))),
            U256::from(50u64)
        );
        // A loss reports no interest rather than underflowing.
        assert_eq!(
            accrued_interest(redeemable, Some(U256::from(2_000u64))),
            U256::ZERO
        );
    }
}
