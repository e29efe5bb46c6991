// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod batch;
pub mod config;
pub mod confirmation;
pub mod context;
pub mod coordinator;
pub mod cycle;
pub mod planner;
pub mod swaps;
pub mod valuation;
pub mod vault_actions;
pub mod vaults;

pub use config::{ConfirmationPolicy, RebalanceConfig};
pub use context::RebalanceContext;
pub use cycle::{CycleReport, rebalance};
