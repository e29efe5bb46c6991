// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Phase intents and their conversion into router bundles.
//!
//! Intents are computed once from the cycle snapshot. A bundle is only
//! materialized right before its phase runs, after reading balances again, so
//! the buy phase sees what the sell phase actually produced.

use crate::common::error::AppError;
use crate::data::db::VaultFlow;
use crate::domain::types::{Phase, RebalanceAction, TransactionBundle, Valuation};
use crate::network::chain_reader::ChainReader;
use crate::services::rebalance::config::RebalanceConfig;
use crate::services::rebalance::swaps::{SwapBuilder, SwapRequest};
use crate::services::rebalance::vault_actions::VaultActionBuilder;
use alloy::primitives::{Address, U256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemIntent {
    pub token: Address,
    pub vault: Address,
    /// Underlying amount wanted out of the vault.
    pub amount: U256,
}

/// Sell amounts are token units, buy amounts quote units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub token: Address,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositIntent {
    pub token: Address,
    pub vault: Address,
}

/// Quote token balances the buy phase can draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteLiquidity {
    pub token: Address,
    pub spot: U256,
    pub vault: Option<Address>,
    pub redeemable: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhasePlan {
    pub redeems: Vec<RedeemIntent>,
    pub sells: Vec<SwapIntent>,
    pub buys: Vec<SwapIntent>,
    pub deposits: Vec<DepositIntent>,
}

impl PhasePlan {
    pub fn intent_count(&self, phase: Phase) -> usize {
        match phase {
            Phase::Redeem => self.redeems.len(),
            Phase::Sell => self.sells.len(),
            Phase::Buy => self.buys.len(),
            Phase::Deposit => self.deposits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Phase::ORDER.iter().all(|p| self.intent_count(*p) == 0)
    }
}

/// Derive per-phase intents from the planner's actions.
pub fn build_phase_plan(
    actions: &[RebalanceAction],
    valuations: &[Valuation],
    quote: &QuoteLiquidity,
) -> PhasePlan {
    let mut plan = PhasePlan::default();
    let mut buy_spend = U256::ZERO;

    for action in actions {
        match action {
            RebalanceAction::Sell { token, amount } => {
                plan.sells.push(SwapIntent {
                    token: *token,
                    amount: *amount,
                });
                let Some(valuation) = valuations.iter().find(|v| v.token() == *token) else {
                    continue;
                };
                let spot = valuation.holding.spot_balance;
                if *amount <= spot {
                    continue;
                }
                if let Some(position) = &valuation.position {
                    let shortfall = (*amount - spot).min(position.redeemable);
                    if !shortfall.is_zero() {
                        plan.redeems.push(RedeemIntent {
                            token: *token,
                            vault: position.vault,
                            amount: shortfall,
                        });
                    }
                }
            }
            RebalanceAction::Buy {
                token,
                quote_amount,
            } => {
                buy_spend = buy_spend.saturating_add(*quote_amount);
                plan.buys.push(SwapIntent {
                    token: *token,
                    amount: *quote_amount,
                });
            }
            RebalanceAction::Hold { .. } => {}
        }
    }

    if buy_spend > quote.spot
        && let Some(vault) = quote.vault
    {
        let shortfall = (buy_spend - quote.spot).min(quote.redeemable);
        if !shortfall.is_zero() {
            plan.redeems.push(RedeemIntent {
                token: quote.token,
                vault,
                amount: shortfall,
            });
        }
    }

    if plan.sells.is_empty() && plan.buys.is_empty() {
        for valuation in valuations {
            if let Some(vault) = valuation.holding.vault {
                plan.deposits.push(DepositIntent {
                    token: valuation.token(),
                    vault,
                });
            }
        }
        if let Some(vault) = quote.vault
            && !plan.deposits.iter().any(|d| d.token == quote.token)
        {
            plan.deposits.push(DepositIntent {
                token: quote.token,
                vault,
            });
        }
    }

    plan
}

/// Vault movement to record once its phase confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFlow {
    pub vault: Address,
    pub flow: VaultFlow,
    pub amount: U256,
}

#[derive(Debug, Clone)]
pub struct MaterializedPhase {
    pub bundle: TransactionBundle,
    pub flows: Vec<PendingFlow>,
}

pub struct BatchBuilder<'a> {
    chain: &'a dyn ChainReader,
    swaps: &'a dyn SwapBuilder,
    vault_actions: &'a dyn VaultActionBuilder,
    config: &'a RebalanceConfig,
    owner: Address,
    quote_token: Address,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(
        chain: &'a dyn ChainReader,
        swaps: &'a dyn SwapBuilder,
        vault_actions: &'a dyn VaultActionBuilder,
        config: &'a RebalanceConfig,
        owner: Address,
        quote_token: Address,
    ) -> Self {
        Self {
            chain,
            swaps,
            vault_actions,
            config,
            owner,
            quote_token,
        }
    }

    pub async fn materialize(
        &self,
        phase: Phase,
        plan: &PhasePlan,
    ) -> Result<MaterializedPhase, AppError> {
        let mut out = MaterializedPhase {
            bundle: TransactionBundle::new(phase),
            flows: Vec::new(),
        };
        match phase {
            Phase::Redeem => self.redeems(&plan.redeems, &mut out).await?,
            Phase::Sell => self.sells(&plan.sells, &mut out).await?,
            Phase::Buy => self.buys(&plan.buys, &mut out).await?,
            Phase::Deposit => self.deposits(&plan.deposits, &mut out).await?,
        }
        tracing::debug!(
            target: "batch",
            phase = %phase,
            calls = out.bundle.calls.len(),
            approvals = out.bundle.approvals.len(),
            "Materialized bundle"
        );
        Ok(out)
    }

    async fn redeems(
        &self,
        intents: &[RedeemIntent],
        out: &mut MaterializedPhase,
    ) -> Result<(), AppError> {
        for intent in intents {
            let shares = self.chain.vault_shares(intent.vault, self.owner).await?;
            if shares.is_zero() {
                tracing::warn!(target: "batch", vault = %intent.vault, "No shares left to redeem");
                continue;
            }
            let redeemable = self.chain.preview_redeem(intent.vault, shares).await?;
            let amount = intent.amount.min(redeemable);
            if amount.is_zero() {
                continue;
            }
            let burn = if amount >= redeemable {
                shares
            } else {
                self.chain
                    .preview_withdraw(intent.vault, amount)
                    .await?
                    .min(shares)
            };
            let set = self.vault_actions.redeem(
                intent.vault,
                intent.token,
                burn,
                self.owner,
                self.config.router,
            )?;
            out.bundle.extend(set);
            out.flows.push(PendingFlow {
                vault: intent.vault,
                flow: VaultFlow::Redeem,
                amount,
            });
        }
        Ok(())
    }

    async fn sells(&self, intents: &[SwapIntent], out: &mut MaterializedPhase) -> Result<(), AppError> {
        for intent in intents {
            let balance = self.chain.balance_of(intent.token, self.owner).await?;
            let amount = intent.amount.min(balance);
            if amount.is_zero() {
                tracing::warn!(target: "batch", token = %intent.token, "Nothing to sell after re-read");
                continue;
            }
            if amount < intent.amount {
                tracing::info!(
                    target: "batch",
                    token = %intent.token,
                    planned = %intent.amount,
                    available = %amount,
                    "Sell capped at spot balance"
                );
            }
            let set = self
                .swaps
                .build_swap(&SwapRequest {
                    input: intent.token,
                    output: self.quote_token,
                    amount_in: amount,
                    slippage_bps: self.config.slippage_bps,
                    owner: self.owner,
                    agent: self.config.router,
                })
                .await?;
            out.bundle.extend(set);
        }
        Ok(())
    }

    /// Buys share the quote balance pro rata when it falls short.
    async fn buys(&self, intents: &[SwapIntent], out: &mut MaterializedPhase) -> Result<(), AppError> {
        if intents.is_empty() {
            return Ok(());
        }
        let balance = self.chain.balance_of(self.quote_token, self.owner).await?;
        let spend = intents
            .iter()
            .fold(U256::ZERO, |acc, i| acc.saturating_add(i.amount));
        for intent in intents {
            let amount = scale_to_budget(intent.amount, spend, balance);
            if amount.is_zero() {
                tracing::warn!(target: "batch", token = %intent.token, "No quote balance for buy");
                continue;
            }
            let set = self
                .swaps
                .build_swap(&SwapRequest {
                    input: self.quote_token,
                    output: intent.token,
                    amount_in: amount,
                    slippage_bps: self.config.slippage_bps,
                    owner: self.owner,
                    agent: self.config.router,
                })
                .await?;
            out.bundle.extend(set);
        }
        Ok(())
    }

    async fn deposits(
        &self,
        intents: &[DepositIntent],
        out: &mut MaterializedPhase,
    ) -> Result<(), AppError> {
        for intent in intents {
            let idle = self.chain.balance_of(intent.token, self.owner).await?;
            if idle.is_zero() {
                continue;
            }
            let set = self.vault_actions.deposit(
                intent.vault,
                intent.token,
                idle,
                self.owner,
                self.config.router,
            )?;
            out.bundle.extend(set);
            out.flows.push(PendingFlow {
                vault: intent.vault,
                flow: VaultFlow::Deposit,
                amount: idle,
            });
        }
        Ok(())
    }
}

/// `amount * budget / total` when the total exceeds the budget.
pub fn scale_to_budget(amount: U256, total: U256, budget: U256) -> U256 {
    if total <= budget || total.is_zero() {
        amount
    } else {
        amount.saturating_mul(budget) / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{TokenHolding, VaultPosition};

    const QUOTE: Address = Address::repeat_byte(0x01);
    const TOKEN_A: Address = Address::repeat_byte(0x0a);
    const TOKEN_B: Address = Address::repeat_byte(0x0b);
    const VAULT_A: Address = Address::repeat_byte(0x7a);
    const VAULT_Q: Address = Address::repeat_byte(0x71);

    fn valuation(token: Address, spot: u64, vault: Option<(Address, u64)>) -> Valuation {
        Valuation {
            holding: TokenHolding {
                address: token,
                symbol: "T".into(),
                decimals: 18,
                spot_balance: U256::from(spot),
                vault: vault.map(|(v, _)| v),
            },
            position: vault.map(|(v, redeemable)| VaultPosition {
                vault: v,
                shares: U256::from(redeemable),
                redeemable: U256::from(redeemable),
                accrued_interest: U256::ZERO,
            }),
            price: None,
            value: U256::from(spot),
        }
    }

    fn quote(spot: u64, vault: Option<(Address, u64)>) -> QuoteLiquidity {
        QuoteLiquidity {
            token: QUOTE,
            spot: U256::from(spot),
            vault: vault.map(|(v, _)| v),
            redeemable: U256::from(vault.map(|(_, r)| r).unwrap_or(0)),
        }
    }

    #[test]
    fn sell_short_of_spot_redeems_the_difference() {
        let actions = [RebalanceAction::Sell {
            token: TOKEN_A,
            amount: U256::from(150u64),
        }];
        let plan = build_phase_plan(
            &actions,
            &[valuation(TOKEN_A, 100, Some((VAULT_A, 500)))],
            &quote(0, None),
        );
        assert_eq!(
            plan.redeems,
            vec![RedeemIntent {
                token: TOKEN_A,
                vault: VAULT_A,
                amount: U256::from(50u64)
            }]
        );
        assert_eq!(plan.sells.len(), 1);
        assert!(plan.deposits.is_empty());
    }

    #[test]
    fn buys_beyond_quote_spot_redeem_from_quote_vault() {
        let actions = [RebalanceAction::Buy {
            token: TOKEN_B,
            quote_amount: U256::from(300u64),
        }];
        let plan = build_phase_plan(&actions, &[], &quote(100, Some((VAULT_Q, 150))));
        assert_eq!(plan.redeems.len(), 1);
        assert_eq!(plan.redeems[0].vault, VAULT_Q);
        assert_eq!(plan.redeems[0].amount, U256::from(150u64));
    }

    #[test]
    fn deposits_only_without_trades() {
        let vals = [valuation(TOKEN_A, 100, Some((VAULT_A, 0)))];
        let hold = [RebalanceAction::Hold { token: TOKEN_A }];
        let plan = build_phase_plan(&hold, &vals, &quote(10, Some((VAULT_Q, 0))));
        assert_eq!(plan.deposits.len(), 2);

        let trade = [RebalanceAction::Buy {
            token: TOKEN_A,
            quote_amount: U256::from(5u64),
        }];
        let plan = build_phase_plan(&trade, &vals, &quote(10, Some((VAULT_Q, 0))));
        assert!(plan.deposits.is_empty());
        assert!(plan.redeems.is_empty());
    }

    #[test]
    fn buys_scale_down_to_available_quote() {
        assert_eq!(
            scale_to_budget(U256::from(60u64), U256::from(100u64), U256::from(50u64)),
            U256::from(30u64)
        );
        assert_eq!(
            scale_to_budget(U256::from(60u64), U256::from(100u64), U256::from(500u64)),
            U256::from(60u64)
        );
    }
}
