// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

mod common;

use alloy::primitives::{Address, U256};
use common::*;
use oxidity_rebalancer::domain::error::{AppError, PhaseError};
use oxidity_rebalancer::domain::types::{AllocationTarget, Phase, RebalanceAction};
use oxidity_rebalancer::network::signals::StaticSignals;
use oxidity_rebalancer::services::rebalance::coordinator::BundleState;
use oxidity_rebalancer::services::rebalance::rebalance;

const VAULT_A: Address = Address::repeat_byte(0x7a);

/// A is 70% of the portfolio, B 30%; quote balance is configurable.
fn seed_70_30(h: &Harness, quote_balance: U256) {
    h.chain.token(QUOTE, "USDC", 6, quote_balance);
    h.chain.token(TOKEN_A, "AAA", 18, units(35));
    h.chain.token(TOKEN_B, "BBB", 18, units(30));
    h.prices.set(TOKEN_A, 2_000_000_000);
    h.prices.set(TOKEN_B, 1_000_000_000);
}

fn half_half() -> AllocationTarget {
    AllocationTarget::new([(TOKEN_A, 5_000), (TOKEN_B, 5_000)])
}

#[tokio::test]
async fn overweight_token_is_sold_and_underweight_bought() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::from(50_000_000_000u64));

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &config())
        .await
        .expect("cycle");

    assert_eq!(report.plan.total_value, U256::from(100_000_000_000u64));
    assert_eq!(
        report.actions(),
        &[
            RebalanceAction::Sell {
                token: TOKEN_A,
                amount: units(10),
            },
            RebalanceAction::Buy {
                token: TOKEN_B,
                quote_amount: U256::from(20_000_000_000u64),
            },
        ]
    );

    let sell = report.phase(Phase::Sell).expect("sell phase");
    let outcome = sell.result.as_ref().expect("sell confirmed");
    assert_eq!(outcome.state, BundleState::Confirmed);
    assert_eq!(outcome.approvals.len(), 1);
    assert!(outcome.receipt.is_some());
    assert_eq!(report.confirmed_phases(), 2);
    assert_eq!(h.submissions_to(ROUTER), 2);
}

#[tokio::test]
async fn sell_is_broadcast_before_buy_is_built() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::from(50_000_000_000u64));

    rebalance(&h.ctx, &half_half(), QUOTE, &config())
        .await
        .expect("cycle");

    let events = h.events();
    let sell_broadcast = events
        .iter()
        .position(|e| matches!(e, Event::Submitted { to, .. } if *to == ROUTER))
        .expect("sell broadcast");
    let buy_built = events
        .iter()
        .position(|e| matches!(e, Event::SwapBuilt { input, .. } if *input == QUOTE))
        .expect("buy built");
    assert!(sell_broadcast < buy_built, "events: {events:?}");
}

#[tokio::test]
async fn allocation_short_of_full_bps_builds_nothing() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::ZERO);
    let desired = AllocationTarget::new([(TOKEN_A, 5_000), (TOKEN_B, 4_999)]);

    let err = rebalance(&h.ctx, &desired, QUOTE, &config())
        .await
        .expect_err("9999 bps must be rejected");

    assert!(matches!(err, AppError::InvalidAllocation { total: 9_999 }));
    assert!(h.events().is_empty());
    assert!(h.prices.calls.lock().expect("calls").is_empty());
}

#[tokio::test]
async fn unpriced_token_is_excluded_from_totals_and_actions() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::ZERO);
    h.chain.token(TOKEN_C, "CCC", 18, units(1_000));
    let desired = AllocationTarget::new([(TOKEN_A, 4_000), (TOKEN_B, 3_000), (TOKEN_C, 3_000)]);

    let mut cfg = config();
    cfg.dry_run = true;
    let report = rebalance(&h.ctx, &desired, QUOTE, &cfg)
        .await
        .expect("cycle");

    assert_eq!(report.excluded.len(), 1);
    assert_eq!(report.excluded[0].token, TOKEN_C);
    assert_eq!(report.plan.total_value, U256::from(100_000_000_000u64));
    assert!(report.actions().iter().all(|a| a.token() != TOKEN_C));
    assert_eq!(report.actions().len(), 2);
}

#[tokio::test]
async fn simulation_failure_abandons_only_that_phase() {
    let h = Harness::new(BackendScript {
        fail_simulations: [1].into_iter().collect(),
        ..BackendScript::default()
    });
    seed_70_30(&h, U256::from(50_000_000_000u64));

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &config())
        .await
        .expect("cycle");

    let sell = report.phase(Phase::Sell).expect("sell phase");
    assert!(matches!(sell.result, Err(PhaseError::SimulationFailed(_))));
    let buy = report.phase(Phase::Buy).expect("buy phase");
    assert_eq!(
        buy.result.as_ref().map(|o| o.state),
        Ok(BundleState::Confirmed)
    );
    assert_eq!(h.submissions_to(ROUTER), 1);
}

#[tokio::test]
async fn consumed_nonce_without_receipt_reports_dropped() {
    let h = Harness::new(BackendScript {
        drop_submissions: [1].into_iter().collect(),
        ..BackendScript::default()
    });
    seed_70_30(&h, U256::from(50_000_000_000u64));

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &config())
        .await
        .expect("cycle");

    let sell = report.phase(Phase::Sell).expect("sell phase");
    assert!(matches!(sell.result, Err(PhaseError::Dropped { .. })));
    assert_eq!(report.failed_phases(), 1);
    // No resubmission of the dropped bundle; the buy phase still runs once.
    assert_eq!(h.submissions_to(ROUTER), 2);
}

#[tokio::test]
async fn refused_broadcast_skips_phase_without_consuming_nonce() {
    let h = Harness::new(BackendScript {
        refuse_submissions: [1].into_iter().collect(),
        ..BackendScript::default()
    });
    seed_70_30(&h, U256::from(50_000_000_000u64));

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &config())
        .await
        .expect("cycle");

    let sell = report.phase(Phase::Sell).expect("sell phase");
    assert!(matches!(&sell.result, Err(PhaseError::Collaborator(msg)) if msg.contains("above cap")));
    let buy = report.phase(Phase::Buy).expect("buy phase");
    assert_eq!(
        buy.result.as_ref().map(|o| o.state),
        Ok(BundleState::Confirmed)
    );
    assert_eq!(h.submissions_to(ROUTER), 1);
}

#[tokio::test]
async fn dry_run_simulates_without_broadcasting() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::from(50_000_000_000u64));
    let mut cfg = config();
    cfg.dry_run = true;

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &cfg)
        .await
        .expect("cycle");

    assert!(
        !h.events()
            .iter()
            .any(|e| matches!(e, Event::Submitted { .. }))
    );
    let sell = report.phase(Phase::Sell).expect("sell phase");
    assert_eq!(
        sell.result.as_ref().map(|o| o.state),
        Ok(BundleState::Simulated)
    );
}

#[tokio::test]
async fn short_spot_balance_redeems_from_vault_first() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::from(50_000_000_000u64));
    h.chain.set_balance(TOKEN_A, units(5));
    h.chain.vault(VAULT_A, TOKEN_A, units(30), 11);
    let mut cfg = config();
    cfg.vaults.insert(TOKEN_A, VAULT_A);

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &cfg)
        .await
        .expect("cycle");

    assert_eq!(report.phase_plan.redeems.len(), 1);
    assert_eq!(report.phase_plan.redeems[0].vault, VAULT_A);
    let order: Vec<Phase> = report.phases.iter().map(|p| p.phase).collect();
    assert_eq!(order, vec![Phase::Redeem, Phase::Sell, Phase::Buy]);
    let redeem = report.phase(Phase::Redeem).expect("redeem phase");
    assert_eq!(
        redeem.result.as_ref().map(|o| o.state),
        Ok(BundleState::Confirmed)
    );
    assert!(report.phase_plan.deposits.is_empty());
}

#[tokio::test]
async fn balanced_portfolio_only_deposits_idle_funds() {
    let h = Harness::new(BackendScript::default());
    h.chain.token(QUOTE, "USDC", 6, U256::ZERO);
    h.chain.token(TOKEN_A, "AAA", 18, units(25));
    h.chain.token(TOKEN_B, "BBB", 18, units(50));
    h.prices.set(TOKEN_A, 2_000_000_000);
    h.prices.set(TOKEN_B, 1_000_000_000);
    h.chain.vault(VAULT_A, TOKEN_A, U256::ZERO, 10);
    let mut cfg = config();
    cfg.vaults.insert(TOKEN_A, VAULT_A);

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &cfg)
        .await
        .expect("cycle");

    assert!(report.actions().iter().all(|a| !a.is_trade()));
    assert!(report.phase_plan.sells.is_empty() && report.phase_plan.buys.is_empty());
    assert_eq!(report.phases.len(), 1);
    let deposit = report.phase(Phase::Deposit).expect("deposit phase");
    assert_eq!(
        deposit.result.as_ref().map(|o| o.state),
        Ok(BundleState::Confirmed)
    );
}

#[tokio::test]
async fn signal_gate_holds_trades_without_confirmation() {
    let signals = StaticSignals::new([
        ("AAA".to_string(), signal(false, false)),
        ("BBB".to_string(), signal(false, true)),
    ]);
    let h = Harness::with_signals(BackendScript::default(), signals);
    seed_70_30(&h, U256::from(50_000_000_000u64));
    let mut cfg = config();
    cfg.technical_analysis = true;
    cfg.dry_run = true;

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &cfg)
        .await
        .expect("cycle");

    assert_eq!(
        report.actions()[0],
        RebalanceAction::Hold { token: TOKEN_A }
    );
    assert!(matches!(report.actions()[1], RebalanceAction::Buy { token, .. } if token == TOKEN_B));
    assert_eq!(report.plan.signals.len(), 2);
}

#[tokio::test]
async fn shutdown_before_first_phase_runs_nothing() {
    let h = Harness::new(BackendScript::default());
    seed_70_30(&h, U256::from(50_000_000_000u64));
    h.ctx.shutdown.cancel();

    let report = rebalance(&h.ctx, &half_half(), QUOTE, &config())
        .await
        .expect("cycle");

    assert!(report.cancelled);
    assert!(report.phases.is_empty());
    assert!(h.events().is_empty());
}
