// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use clap::Parser;
use oxidity_rebalancer::app::config::GlobalSettings;
use oxidity_rebalancer::app::logging::setup_logging;
use oxidity_rebalancer::domain::constants::wrapped_native_for_chain;
use oxidity_rebalancer::domain::error::AppError;
use oxidity_rebalancer::infrastructure::data::db::Database;
use oxidity_rebalancer::infrastructure::data::token_manager::TokenManager;
use oxidity_rebalancer::infrastructure::network::backend::RpcTransactionBackend;
use oxidity_rebalancer::infrastructure::network::chain_reader::{ChainReader, RpcChainReader};
use oxidity_rebalancer::infrastructure::network::price_source::DexQuotePriceSource;
use oxidity_rebalancer::infrastructure::network::provider::ConnectionFactory;
use oxidity_rebalancer::infrastructure::network::signals::{
    HttpSignalProvider, SignalProvider, StaticSignals,
};
use oxidity_rebalancer::services::rebalance::swaps::UniswapV2SwapBuilder;
use oxidity_rebalancer::services::rebalance::vault_actions::Erc4626VaultActions;
use oxidity_rebalancer::services::rebalance::{RebalanceContext, rebalance};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "oxidity rebalancer")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Simulate every phase but never broadcast
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Seconds between cycles (overrides config/env)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Print the last N audited cycles and transactions, then exit
    #[arg(long, value_name = "N")]
    history: Option<i64>,
}

async fn print_history(database_url: &str, limit: i64) -> Result<(), AppError> {
    let db = Database::new(database_url).await?;
    for cycle in db.recent_cycles(limit).await? {
        tracing::info!(
            target: "history",
            id = cycle.id,
            chain_id = cycle.chain_id,
            owner = %cycle.owner_address,
            at = %cycle.timestamp,
            weights = %cycle.weights_json,
            actions = %cycle.actions_json,
            summary = %cycle.summary,
            "Cycle"
        );
    }
    for tx in db.recent_transactions(limit).await? {
        tracing::info!(
            target: "history",
            hash = %tx.tx_hash,
            phase = %tx.phase,
            status = %tx.status,
            nonce = tx.nonce,
            block = ?tx.block_number,
            at = %tx.timestamp,
            "Transaction"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = GlobalSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(
        if settings.debug { "debug" } else { "info" },
        settings.log_json,
    );
    if cli.dry_run {
        settings.dry_run = true;
    }
    if let Some(secs) = cli.interval_secs {
        settings.interval_secs = secs;
    }
    if let Some(limit) = cli.history {
        return print_history(&settings.database_url(), limit.max(1)).await;
    }

    let tokenlist_path = settings.tokenlist_path()?;
    let tokens = TokenManager::load_from_file(&tokenlist_path)?;
    if tokens.is_empty() {
        return Err(AppError::Config(format!(
            "Tokenlist {tokenlist_path} has no usable entries"
        )));
    }
    let desired = settings.desired_allocation(&tokens)?;
    let quote_token = settings.quote_token_address(&tokens)?;
    let config = settings.rebalance_config(&tokens)?;

    let signer = settings.signer()?;
    let owner = signer.address();
    let rpc_url = settings.get_http_provider()?;
    let provider = ConnectionFactory::http(&rpc_url)?;
    let wrapped_native = wrapped_native_for_chain(settings.chain_id);

    let db = match Database::new(&settings.database_url()).await {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::warn!(target: "db", error = %e, "Audit store unavailable; running without history");
            None
        }
    };

    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(provider.clone()));
    let signals: Arc<dyn SignalProvider> = match settings.signals_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Arc::new(HttpSignalProvider::new(url)?),
        _ => {
            if config.technical_analysis {
                tracing::warn!(target: "config", "technical_analysis is on without SIGNALS_URL; every trade will hold");
            }
            Arc::new(StaticSignals::default())
        }
    };

    let shutdown = CancellationToken::new();
    let ctx = RebalanceContext {
        chain: chain.clone(),
        prices: Arc::new(DexQuotePriceSource::new(
            provider.clone(),
            config.dex_router,
            chain,
            quote_token,
            wrapped_native,
        )),
        swaps: Arc::new(UniswapV2SwapBuilder::new(
            provider.clone(),
            config.dex_router,
            wrapped_native,
        )),
        vault_actions: Arc::new(Erc4626VaultActions),
        signals,
        backend: Arc::new(RpcTransactionBackend::new(
            provider,
            signer,
            settings.chain_id,
            settings.max_gas_price_gwei,
        )),
        db,
        shutdown: shutdown.clone(),
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: "main", "Shutdown requested; finishing in-flight phase");
                shutdown.cancel();
            }
        });
    }

    tracing::info!(
        target: "main",
        chain_id = settings.chain_id,
        owner = %owner,
        router = %config.router,
        dex_router = %config.dex_router,
        tokens = desired.len(),
        dry_run = config.dry_run,
        "Rebalancer started"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(settings.interval_secs_value()));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match rebalance(&ctx, &desired, quote_token, &config).await {
            Ok(report) => {
                tracing::info!(
                    target: "main",
                    traded = report.plan.has_trades(),
                    confirmed = report.confirmed_phases(),
                    failed = report.failed_phases(),
                    summary = %report.summary(),
                    "Cycle finished"
                );
            }
            Err(e @ AppError::InvalidAllocation { .. }) => {
                tracing::error!(target: "main", error = %e, "Allocation rejected; fix configuration");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(target: "main", error = %e, "Cycle failed");
            }
        }

        if cli.once {
            break;
        }
    }

    tracing::info!(target: "main", "Rebalancer stopped");
    Ok(())
}
