// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::data::db::Database;
use crate::network::backend::TransactionBackend;
use crate::network::chain_reader::ChainReader;
use crate::network::price_source::PriceSource;
use crate::network::signals::SignalProvider;
use crate::services::rebalance::swaps::SwapBuilder;
use crate::services::rebalance::vault_actions::VaultActionBuilder;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Collaborators a cycle runs against. Cheap to clone; shared across cycles.
#[derive(Clone)]
pub struct RebalanceContext {
    pub chain: Arc<dyn ChainReader>,
    pub prices: Arc<dyn PriceSource>,
    pub swaps: Arc<dyn SwapBuilder>,
    pub vault_actions: Arc<dyn VaultActionBuilder>,
    pub signals: Arc<dyn SignalProvider>,
    pub backend: Arc<dyn TransactionBackend>,
    pub db: Option<Database>,
    /// Checked before each phase is simulated.
    pub shutdown: CancellationToken,
}
