// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::data::db::CycleAudit;
use crate::domain::error::PhaseError;
use crate::domain::types::{
    AllocationTarget, Phase, RebalanceAction, TokenHolding, Valuation, units_to_f64,
};
use crate::services::rebalance::batch::{
    BatchBuilder, PhasePlan, QuoteLiquidity, build_phase_plan,
};
use crate::services::rebalance::config::RebalanceConfig;
use crate::services::rebalance::context::RebalanceContext;
use crate::services::rebalance::coordinator::{BundleState, ExecutionCoordinator, PhaseOutcome};
use crate::services::rebalance::planner::{AllocationPlanner, Plan};
use crate::services::rebalance::valuation::ValuationEngine;
use crate::services::rebalance::vaults::VaultReconciler;
use alloy::primitives::{Address, U256};
use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedToken {
    pub token: Address,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    pub result: Result<PhaseOutcome, PhaseError>,
}

/// Everything a cycle saw and did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub owner: Address,
    pub valuations: Vec<Valuation>,
    pub excluded: Vec<ExcludedToken>,
    pub plan: Plan,
    pub phase_plan: PhasePlan,
    pub phases: Vec<PhaseReport>,
    /// Shutdown stopped the cycle before every phase ran.
    pub cancelled: bool,
}

impl CycleReport {
    pub fn actions(&self) -> &[RebalanceAction] {
        &self.plan.actions
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn confirmed_phases(&self) -> usize {
        self.phases
            .iter()
            .filter(|p| matches!(&p.result, Ok(o) if o.state == BundleState::Confirmed))
            .count()
    }

    pub fn failed_phases(&self) -> usize {
        self.phases.iter().filter(|p| p.result.is_err()).count()
    }

    pub fn summary(&self) -> String {
        let phases = self
            .phases
            .iter()
            .map(|p| match &p.result {
                Ok(o) if o.is_skipped() => format!("{}=skipped", p.phase),
                Ok(o) => format!("{}={:?}", p.phase, o.state).to_lowercase(),
                Err(e) => format!("{}=error({e})", p.phase),
            })
            .collect::<Vec<_>>()
            .join(",");
        let trades = self.plan.actions.iter().filter(|a| a.is_trade()).count();
        format!(
            "valued={} excluded={} trades={} phases=[{}]{}",
            self.valuations.len(),
            self.excluded.len(),
            trades,
            phases,
            if self.cancelled { " cancelled" } else { "" }
        )
    }
}

/// Run one rebalance cycle.
///
/// Only an invalid allocation or invalid config is an error; everything that
/// goes wrong later is reported per token or per phase in the result.
pub async fn rebalance(
    ctx: &RebalanceContext,
    desired: &AllocationTarget,
    quote_token: Address,
    config: &RebalanceConfig,
) -> Result<CycleReport, AppError> {
    config.validate()?;
    desired.validate()?;

    let owner = ctx.backend.owner();
    let mut report = CycleReport {
        owner,
        ..CycleReport::default()
    };

    let quote_decimals = match ctx.chain.token_metadata(quote_token).await {
        Ok(meta) => meta.decimals,
        Err(e) => {
            tracing::error!(target: "cycle", quote = %quote_token, error = %e, "Quote token unreadable; skipping cycle");
            report.excluded.push(ExcludedToken {
                token: quote_token,
                reason: e.to_string(),
            });
            audit(ctx, config, desired, &report).await;
            return Ok(report);
        }
    };

    let snapshots = join_all(
        desired
            .tokens()
            .map(|token| snapshot_token(ctx, config, *token, owner, quote_token, quote_decimals)),
    )
    .await;
    for (token, result) in desired.tokens().zip(snapshots) {
        match result {
            Ok(valuation) => report.valuations.push(valuation),
            Err(e) => {
                tracing::warn!(target: "cycle", token = %token, error = %e, "Token excluded from this cycle");
                report.excluded.push(ExcludedToken {
                    token: *token,
                    reason: e.to_string(),
                });
            }
        }
    }

    let planner = AllocationPlanner::new(
        ctx.prices.as_ref(),
        ctx.signals.as_ref(),
        config,
        quote_token,
        quote_decimals,
    );
    report.plan = planner.plan(&report.valuations, desired).await?;
    tracing::info!(
        target: "cycle",
        total_value = units_to_f64(report.plan.total_value, quote_decimals),
        trades = report.plan.actions.iter().filter(|a| a.is_trade()).count(),
        excluded = report.excluded.len(),
        "Plan ready"
    );

    let liquidity = quote_liquidity(ctx, config, &report.valuations, quote_token, owner).await;
    report.phase_plan = build_phase_plan(&report.plan.actions, &report.valuations, &liquidity);

    let builder = BatchBuilder::new(
        ctx.chain.as_ref(),
        ctx.swaps.as_ref(),
        ctx.vault_actions.as_ref(),
        config,
        owner,
        quote_token,
    );
    let coordinator = ExecutionCoordinator::new(ctx.chain.as_ref(), ctx.backend.as_ref(), config)
        .with_db(ctx.db.as_ref())
        .with_shutdown(&ctx.shutdown);

    for phase in Phase::ORDER {
        if report.phase_plan.intent_count(phase) == 0 {
            continue;
        }
        if ctx.shutdown.is_cancelled() {
            tracing::info!(target: "cycle", phase = %phase, "Shutdown requested; stopping before phase");
            report.cancelled = true;
            break;
        }

        let result = match builder.materialize(phase, &report.phase_plan).await {
            Ok(materialized) => {
                let result = coordinator.execute(materialized.bundle).await;
                if matches!(&result, Ok(o) if o.state == BundleState::Confirmed)
                    && let Some(db) = &ctx.db
                {
                    for flow in &materialized.flows {
                        if let Err(e) = db
                            .record_vault_flow(config.chain_id, flow.vault, owner, flow.flow, flow.amount)
                            .await
                        {
                            tracing::warn!(target: "db", vault = %flow.vault, error = %e, "Failed to record vault flow");
                        }
                    }
                }
                result
            }
            Err(e) => {
                tracing::warn!(target: "cycle", phase = %phase, error = %e, "Could not build phase bundle");
                Err(PhaseError::from(e))
            }
        };
        if let Err(e) = &result {
            tracing::warn!(target: "cycle", phase = %phase, error = %e, "Phase produced nothing; continuing");
            if matches!(e, PhaseError::Cancelled) {
                report.cancelled = true;
            }
        }
        let stop = matches!(result, Err(PhaseError::Cancelled));
        report.phases.push(PhaseReport { phase, result });
        if stop {
            break;
        }
    }

    tracing::info!(target: "cycle", summary = %report.summary(), "Cycle complete");
    audit(ctx, config, desired, &report).await;
    Ok(report)
}

async fn snapshot_token(
    ctx: &RebalanceContext,
    config: &RebalanceConfig,
    token: Address,
    owner: Address,
    quote_token: Address,
    quote_decimals: u8,
) -> Result<Valuation, AppError> {
    let meta = ctx.chain.token_metadata(token).await?;
    let spot_balance = ctx.chain.balance_of(token, owner).await?;
    let vault = config.vault_for(&token);
    let reconciler = VaultReconciler::new(ctx.chain.as_ref(), ctx.db.as_ref(), config.chain_id);
    let position = reconciler.reconcile(token, vault, owner).await?;
    let holding = TokenHolding {
        address: token,
        symbol: meta.symbol,
        decimals: meta.decimals,
        spot_balance,
        vault,
    };
    ValuationEngine::new(ctx.prices.as_ref(), config, quote_token, quote_decimals)
        .valuate(holding, position)
        .await
}

async fn quote_liquidity(
    ctx: &RebalanceContext,
    config: &RebalanceConfig,
    valuations: &[Valuation],
    quote_token: Address,
    owner: Address,
) -> QuoteLiquidity {
    if let Some(v) = valuations.iter().find(|v| v.token() == quote_token) {
        return QuoteLiquidity {
            token: quote_token,
            spot: v.holding.spot_balance,
            vault: v.holding.vault,
            redeemable: v.redeemable(),
        };
    }

    let vault = config.vault_for(&quote_token);
    let spot = ctx
        .chain
        .balance_of(quote_token, owner)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(target: "cycle", error = %e, "Quote balance unreadable");
            U256::ZERO
        });
    let reconciler = VaultReconciler::new(ctx.chain.as_ref(), ctx.db.as_ref(), config.chain_id);
    let redeemable = match reconciler.reconcile(quote_token, vault, owner).await {
        Ok(position) => position.map(|p| p.redeemable).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(target: "cycle", error = %e, "Quote vault unreadable");
            U256::ZERO
        }
    };
    QuoteLiquidity {
        token: quote_token,
        spot,
        vault,
        redeemable,
    }
}

async fn audit(
    ctx: &RebalanceContext,
    config: &RebalanceConfig,
    desired: &AllocationTarget,
    report: &CycleReport,
) {
    let Some(db) = &ctx.db else {
        return;
    };
    let weights: BTreeMap<String, u32> = desired
        .iter()
        .map(|(token, bps)| (format!("{token:#x}"), *bps))
        .collect();
    let actions: Vec<serde_json::Value> = report
        .plan
        .actions
        .iter()
        .map(|a| match a {
            RebalanceAction::Sell { token, amount } => {
                json!({"action": "sell", "token": format!("{token:#x}"), "amount": amount.to_string()})
            }
            RebalanceAction::Buy {
                token,
                quote_amount,
            } => {
                json!({"action": "buy", "token": format!("{token:#x}"), "quote_amount": quote_amount.to_string()})
            }
            RebalanceAction::Hold { token } => {
                json!({"action": "hold", "token": format!("{token:#x}")})
            }
        })
        .collect();

    let record = CycleAudit {
        chain_id: config.chain_id,
        owner: report.owner,
        weights_json: serde_json::to_string(&weights).unwrap_or_default(),
        signals_json: serde_json::to_string(&report.plan.signals).unwrap_or_default(),
        actions_json: serde_json::Value::Array(actions).to_string(),
        summary: report.summary(),
    };
    if let Err(e) = db.record_cycle(&record).await {
        tracing::warn!(target: "db", error = %e, "Failed to record cycle");
    }
}
