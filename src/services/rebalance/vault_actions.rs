// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::data::abi::{ERC20, ERC4626Vault};
use crate::domain::types::{ApprovalRequest, Call, CallSet};
use alloy::primitives::{Address, U256};
use alloy_sol_types::SolCall;

/// Vault deposit/redeem calls run by the agent for `owner`.
pub trait VaultActionBuilder: Send + Sync {
    /// Deposit `assets` of `asset` into `vault`, shares minted to the owner.
    fn deposit(
        &self,
        vault: Address,
        asset: Address,
        assets: U256,
        owner: Address,
        agent: Address,
    ) -> Result<CallSet, AppError>;

    /// Burn `shares` of the owner's position, underlying paid to the owner.
    fn redeem(
        &self,
        vault: Address,
        asset: Address,
        shares: U256,
        owner: Address,
        agent: Address,
    ) -> Result<CallSet, AppError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Erc4626VaultActions;

impl VaultActionBuilder for Erc4626VaultActions {
    fn deposit(
        &self,
        vault: Address,
        asset: Address,
        assets: U256,
        owner: Address,
        agent: Address,
    ) -> Result<CallSet, AppError> {
        if assets.is_zero() {
            return Err(AppError::Strategy(format!("Zero deposit into {vault:#x}")));
        }
        let pull = ERC20::transferFromCall {
            from: owner,
            to: agent,
            amount: assets,
        };
        let approve = ERC20::approveCall {
            spender: vault,
            amount: assets,
        };
        let deposit = ERC4626Vault::depositCall {
            assets,
            receiver: owner,
        };
        Ok(CallSet {
            calls: vec![
                Call::new(asset, pull.abi_encode()),
                Call::new(asset, approve.abi_encode()),
                Call::new(vault, deposit.abi_encode()),
            ],
            approvals: vec![ApprovalRequest {
                token: asset,
                spender: agent,
                amount: assets,
            }],
            tokens_return: vec![asset],
        })
    }

    fn redeem(
        &self,
        vault: Address,
        asset: Address,
        shares: U256,
        owner: Address,
        agent: Address,
    ) -> Result<CallSet, AppError> {
        if shares.is_zero() {
            return Err(AppError::Strategy(format!("Zero redemption from {vault:#x}")));
        }
        // The vault spends the agent's share allowance when owner != caller.
        let redeem = ERC4626Vault::redeemCall {
            shares,
            receiver: owner,
            owner,
        };
        Ok(CallSet {
            calls: vec![Call::new(vault, redeem.abi_encode())],
            approvals: vec![ApprovalRequest {
                token: vault,
                spender: agent,
                amount: shares,
            }],
            tokens_return: vec![asset],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAULT: Address = Address::repeat_byte(0x77);
    const ASSET: Address = Address::repeat_byte(0x01);
    const OWNER: Address = Address::repeat_byte(0x0a);
    const AGENT: Address = Address::repeat_byte(0xa9);

    #[test]
    fn deposit_mints_shares_to_owner() {
        let set = Erc4626VaultActions
            .deposit(VAULT, ASSET, U256::from(500u64), OWNER, AGENT)
            .expect("deposit");
        assert_eq!(set.calls.len(), 3);
        let call = ERC4626Vault::depositCall::abi_decode(&set.calls[2].data).expect("decode");
        assert_eq!(call.receiver, OWNER);
        assert_eq!(call.assets, U256::from(500u64));
        assert_eq!(set.approvals[0].token, ASSET);
    }

    #[test]
    fn redeem_needs_share_allowance() {
        let set = Erc4626VaultActions
            .redeem(VAULT, ASSET, U256::from(42u64), OWNER, AGENT)
            .expect("redeem");
        assert_eq!(set.calls.len(), 1);
        assert_eq!(set.approvals[0].token, VAULT);
        assert_eq!(set.approvals[0].amount, U256::from(42u64));
        assert_eq!(set.tokens_return, vec![ASSET]);
    }

    #[test]
    fn zero_amounts_are_rejected() {
        assert!(Erc4626VaultActions
            .deposit(VAULT, ASSET, U256::ZERO, OWNER, AGENT)
            .is_err());
        assert!(Erc4626VaultActions
            .redeem(VAULT, ASSET, U256::ZERO, OWNER, AGENT)
            .is_err());
    }
}
