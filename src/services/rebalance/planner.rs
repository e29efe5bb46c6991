// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Turns valuations into buy/sell/hold decisions.
//!
//! Current weights are `value * 10000 / total`, truncated. A token is traded
//! only when its distance from the desired weight is strictly greater than
//! `limit_bps`, so a cycle that ran to completion leaves nothing to do on the
//! next one.

use crate::common::error::AppError;
use crate::domain::constants::BPS_DENOMINATOR;
use crate::domain::types::{
    AllocationTarget, QuotePrice, RebalanceAction, Signal, Valuation, rescale, units_to_f64,
};
use crate::network::price_source::PriceSource;
use crate::network::signals::SignalProvider;
use crate::services::rebalance::config::RebalanceConfig;
use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationDiff {
    pub token: Address,
    pub current_bps: u64,
    pub desired_bps: u32,
    /// Desired minus current; negative means overweight.
    pub difference: i64,
    /// Quote value that moves the token back onto its target.
    pub value_to_rebalance: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sell,
    Buy,
    Hold,
}

pub fn classify(difference: i64, limit_bps: u64) -> Direction {
    if difference.unsigned_abs() <= limit_bps {
        Direction::Hold
    } else if difference < 0 {
        Direction::Sell
    } else {
        Direction::Buy
    }
}

pub fn total_value(valuations: &[Valuation]) -> U256 {
    valuations
        .iter()
        .fold(U256::ZERO, |acc, v| acc.saturating_add(v.value))
}

/// Per-token distance from the target. Empty when the portfolio is worth nothing.
pub fn allocation_diffs(valuations: &[Valuation], desired: &AllocationTarget) -> Vec<AllocationDiff> {
    let total = total_value(valuations);
    if total.is_zero() {
        return Vec::new();
    }
    let denominator = U256::from(BPS_DENOMINATOR);
    valuations
        .iter()
        .map(|v| {
            let current_bps: u64 = (v.value.saturating_mul(denominator) / total).saturating_to();
            let desired_bps = desired.weight(&v.token()).unwrap_or(0);
            let difference = i64::from(desired_bps) - current_bps as i64;
            let value_to_rebalance =
                total.saturating_mul(U256::from(difference.unsigned_abs())) / denominator;
            AllocationDiff {
                token: v.token(),
                current_bps,
                desired_bps,
                difference,
                value_to_rebalance,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub total_value: U256,
    pub diffs: Vec<AllocationDiff>,
    pub actions: Vec<RebalanceAction>,
    /// Signals consulted, keyed by symbol.
    pub signals: BTreeMap<String, Signal>,
}

impl Plan {
    pub fn has_trades(&self) -> bool {
        self.actions.iter().any(RebalanceAction::is_trade)
    }
}

pub struct AllocationPlanner<'a> {
    prices: &'a dyn PriceSource,
    signals: &'a dyn SignalProvider,
    config: &'a RebalanceConfig,
    quote_token: Address,
    quote_decimals: u8,
}

impl<'a> AllocationPlanner<'a> {
    pub fn new(
        prices: &'a dyn PriceSource,
        signals: &'a dyn SignalProvider,
        config: &'a RebalanceConfig,
        quote_token: Address,
        quote_decimals: u8,
    ) -> Self {
        Self {
            prices,
            signals,
            config,
            quote_token,
            quote_decimals,
        }
    }

    /// `valuations` holds only tokens that could be valued this cycle; anything
    /// else in `desired` gets no action at all.
    pub async fn plan(
        &self,
        valuations: &[Valuation],
        desired: &AllocationTarget,
    ) -> Result<Plan, AppError> {
        desired.validate()?;

        let total = total_value(valuations);
        let mut plan = Plan {
            total_value: total,
            ..Plan::default()
        };
        if total.is_zero() {
            tracing::info!(target: "planner", "Portfolio has no value; holding everything");
            plan.actions = valuations
                .iter()
                .map(|v| RebalanceAction::Hold { token: v.token() })
                .collect();
            return Ok(plan);
        }

        plan.diffs = allocation_diffs(valuations, desired);
        for (valuation, diff) in valuations.iter().zip(plan.diffs.iter()) {
            let direction = classify(diff.difference, self.config.limit_bps);
            tracing::debug!(
                target: "planner",
                token = %diff.token,
                symbol = %valuation.holding.symbol,
                current_bps = diff.current_bps,
                desired_bps = diff.desired_bps,
                difference = diff.difference,
                ?direction,
                "Allocation diff"
            );

            let action = match direction {
                Direction::Hold => RebalanceAction::Hold { token: diff.token },
                _ if diff.token == self.quote_token => RebalanceAction::Hold { token: diff.token },
                Direction::Sell => self.sell_action(valuation, diff).await,
                Direction::Buy => RebalanceAction::Buy {
                    token: diff.token,
                    quote_amount: diff.value_to_rebalance,
                },
            };
            let action = self.gate(action, valuation, &mut plan.signals).await;
            if action.is_trade() {
                tracing::info!(
                    target: "planner",
                    symbol = %valuation.holding.symbol,
                    difference = diff.difference,
                    value = units_to_f64(diff.value_to_rebalance, self.quote_decimals),
                    action = ?action,
                    "Rebalance action"
                );
            }
            plan.actions.push(action);
        }
        Ok(plan)
    }

    async fn sell_action(&self, valuation: &Valuation, diff: &AllocationDiff) -> RebalanceAction {
        let token = diff.token;
        let decimals = valuation.holding.decimals;
        let amount = if self.config.uses_fixed_scaling(&token, &self.quote_token) {
            Some(rescale(diff.value_to_rebalance, self.quote_decimals, decimals))
        } else {
            match self.sell_price(valuation).await {
                Ok(price) => price.amount_for(diff.value_to_rebalance, decimals),
                Err(e) => {
                    tracing::warn!(target: "planner", token = %token, error = %e, "Re-pricing failed; holding");
                    None
                }
            }
        };

        match amount {
            Some(amount) if !amount.is_zero() => RebalanceAction::Sell {
                token,
                amount: amount.min(valuation.effective_balance()),
            },
            _ => RebalanceAction::Hold { token },
        }
    }

    async fn sell_price(&self, valuation: &Valuation) -> Result<QuotePrice, AppError> {
        if self.config.reuse_valuation_price
            && let Some(price) = valuation.price
        {
            return Ok(price);
        }
        self.prices.quote_value(valuation.token(), true).await
    }

    /// Sells wait for overbought, buys for oversold.
    async fn gate(
        &self,
        action: RebalanceAction,
        valuation: &Valuation,
        seen: &mut BTreeMap<String, Signal>,
    ) -> RebalanceAction {
        if !self.config.technical_analysis || !action.is_trade() {
            return action;
        }
        let symbol = valuation.holding.symbol.clone();
        let signal = match self
            .signals
            .signal(&symbol, &self.config.signal_timeframe)
            .await
        {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(target: "planner", symbol = %symbol, error = %e, "Signal unavailable; holding");
                return RebalanceAction::Hold {
                    token: action.token(),
                };
            }
        };
        seen.insert(symbol.clone(), signal);

        let allowed = match action {
            RebalanceAction::Sell { .. } => signal.overbought,
            RebalanceAction::Buy { .. } => signal.oversold,
            RebalanceAction::Hold { .. } => true,
        };
        if allowed {
            action
        } else {
            tracing::info!(
                target: "planner",
                symbol = %symbol,
                overbought = signal.overbought,
                oversold = signal.oversold,
                "Signal gate holds trade"
            );
            RebalanceAction::Hold {
                token: action.token(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_strict() {
        assert_eq!(classify(100, 100), Direction::Hold);
        assert_eq!(classify(-100, 100), Direction::Hold);
        assert_eq!(classify(101, 100), Direction::Buy);
        assert_eq!(classify(-101, 100), Direction::Sell);
        assert_eq!(classify(0, 0), Direction::Hold);
    }
}
