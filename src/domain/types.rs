// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Per-cycle data model shared by the rebalance pipeline.
//!
//! Everything here is built fresh from chain reads at the start of a cycle and
//! dropped at its end; nothing is carried between cycles.

use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, Bytes, U256};
use std::collections::BTreeMap;
use std::fmt;

/// Token identity plus spot balance of the owner, read once per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHolding {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub spot_balance: U256,
    pub vault: Option<Address>,
}

/// Owner's position in a yield vault whose underlying is the holding's token.
///
/// `redeemable` is a point-in-time estimate; anything that submits a
/// redemption must read it again first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPosition {
    pub vault: Address,
    pub shares: U256,
    pub redeemable: U256,
    pub accrued_interest: U256,
}

/// Quote-token base units paid for one whole token (10^decimals base units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QuotePrice(pub U256);

impl QuotePrice {
    /// `balance * price / 10^decimals`, rounding down. `None` on overflow.
    pub fn value_of(&self, balance: U256, decimals: u8) -> Option<U256> {
        balance
            .checked_mul(self.0)
            .map(|product| product / pow10(decimals))
    }

    /// Inverse of [`QuotePrice::value_of`]: how many token base units buy `value`.
    pub fn amount_for(&self, value: U256, decimals: u8) -> Option<U256> {
        if self.0.is_zero() {
            return None;
        }
        value
            .checked_mul(pow10(decimals))
            .map(|product| product / self.0)
    }
}

pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Rescale a base-unit amount between two decimal precisions.
pub fn rescale(amount: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    match from_decimals.cmp(&to_decimals) {
        std::cmp::Ordering::Equal => amount,
        std::cmp::Ordering::Less => amount.saturating_mul(pow10(to_decimals - from_decimals)),
        std::cmp::Ordering::Greater => amount / pow10(from_decimals - to_decimals),
    }
}

/// Lossy conversion for log output only.
pub fn units_to_f64(amount: U256, decimals: u8) -> f64 {
    let num = amount.to_string().parse::<f64>().unwrap_or(0.0);
    num / 10f64.powi(decimals as i32)
}

/// A holding valued in the quote currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    pub holding: TokenHolding,
    pub position: Option<VaultPosition>,
    /// Price used for the conversion; `None` when fixed decimal scaling applied.
    pub price: Option<QuotePrice>,
    pub value: U256,
}

impl Valuation {
    pub fn token(&self) -> Address {
        self.holding.address
    }

    pub fn redeemable(&self) -> U256 {
        self.position
            .as_ref()
            .map(|p| p.redeemable)
            .unwrap_or(U256::ZERO)
    }

    pub fn effective_balance(&self) -> U256 {
        self.holding.spot_balance.saturating_add(self.redeemable())
    }
}

/// Desired weights in basis points, keyed by token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationTarget {
    weights: BTreeMap<Address, u32>,
}

impl AllocationTarget {
    pub fn new(weights: impl IntoIterator<Item = (Address, u32)>) -> Self {
        Self {
            weights: weights.into_iter().collect(),
        }
    }

    pub fn total_bps(&self) -> u64 {
        self.weights.values().map(|w| u64::from(*w)).sum()
    }

    /// Weights must cover exactly 10000 bps.
    pub fn validate(&self) -> Result<(), AppError> {
        let total = self.total_bps();
        if total != BPS_DENOMINATOR {
            return Err(AppError::InvalidAllocation { total });
        }
        Ok(())
    }

    pub fn weight(&self, token: &Address) -> Option<u32> {
        self.weights.get(token).copied()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Address> {
        self.weights.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &u32)> {
        self.weights.iter()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceAction {
    /// Sell `amount` token base units for the quote token.
    Sell { token: Address, amount: U256 },
    /// Spend `quote_amount` quote base units on `token`.
    Buy { token: Address, quote_amount: U256 },
    Hold { token: Address },
}

impl RebalanceAction {
    pub fn token(&self) -> Address {
        match self {
            Self::Sell { token, .. } | Self::Buy { token, .. } | Self::Hold { token } => *token,
        }
    }

    pub fn is_trade(&self) -> bool {
        !matches!(self, Self::Hold { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Redeem,
    Sell,
    Buy,
    Deposit,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [Phase::Redeem, Phase::Sell, Phase::Buy, Phase::Deposit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Redeem => "redeem",
            Phase::Sell => "sell",
            Phase::Buy => "buy",
            Phase::Deposit => "deposit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call executed by the router on behalf of the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Call {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
        }
    }
}

/// Allowance the owner must grant before a bundle can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub token: Address,
    pub spender: Address,
    pub amount: U256,
}

/// Calls, approvals and return tokens produced by a swap or vault builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSet {
    pub calls: Vec<Call>,
    pub approvals: Vec<ApprovalRequest>,
    pub tokens_return: Vec<Address>,
}

/// Calls for a single phase, executed atomically by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBundle {
    pub phase: Phase,
    pub calls: Vec<Call>,
    pub approvals: Vec<ApprovalRequest>,
    pub tokens_return: Vec<Address>,
}

impl TransactionBundle {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            calls: Vec::new(),
            approvals: Vec::new(),
            tokens_return: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Merge approvals, summing amounts for the same (token, spender).
    pub fn require_approval(&mut self, approval: ApprovalRequest) {
        if let Some(existing) = self
            .approvals
            .iter_mut()
            .find(|a| a.token == approval.token && a.spender == approval.spender)
        {
            existing.amount = existing.amount.saturating_add(approval.amount);
            return;
        }
        self.approvals.push(approval);
    }

    pub fn return_token(&mut self, token: Address) {
        if !self.tokens_return.contains(&token) {
            self.tokens_return.push(token);
        }
    }

    pub fn extend(&mut self, set: CallSet) {
        self.calls.extend(set.calls);
        for approval in set.approvals {
            self.require_approval(approval);
        }
        for token in set.tokens_return {
            self.return_token(token);
        }
    }

    /// Native value forwarded with the router call.
    pub fn total_value(&self) -> U256 {
        self.calls
            .iter()
            .fold(U256::ZERO, |acc, c| acc.saturating_add(c.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Reverted,
    Dropped,
    Unconfirmed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Confirmed => "confirmed",
            TxStatus::Reverted => "reverted",
            TxStatus::Dropped => "dropped",
            TxStatus::Unconfirmed => "unconfirmed",
        }
    }
}

/// Outcome of one submitted transaction; diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub phase: Phase,
    pub tx_hash: B256,
    pub status: TxStatus,
    pub nonce: u64,
    pub block_number: Option<u64>,
}

/// Overbought/oversold pair for one token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signal {
    pub overbought: bool,
    pub oversold: bool,
}
