// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::data_path::{resolve_data_path, resolve_required_data_path};
use crate::common::parsing::{parse_address_hex, parse_bps};
use crate::domain::constants::{self, BPS_DENOMINATOR};
use crate::domain::error::AppError;
use crate::domain::types::AllocationTarget;
use crate::infrastructure::data::token_manager::TokenManager;
use crate::services::rebalance::config::{ConfirmationPolicy, RebalanceConfig};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub log_json: bool,
    pub database_url: Option<String>,
    pub data_dir: Option<String>,
    pub tokenlist_path: Option<String>,

    // Identity
    pub wallet_key: String,
    pub wallet_address: Option<Address>,

    // Chain
    #[serde(default = "default_chain_id", alias = "selected_chainid")]
    pub chain_id: u64,
    #[serde(default = "default_protocol", alias = "selected_protocol")]
    pub protocol: String,
    pub http_provider: Option<String>,
    pub http_providers: Option<HashMap<String, String>>,
    #[serde(default = "default_max_gas")]
    pub max_gas_price_gwei: u64,

    // Contracts
    /// Agent contract that executes phase bundles.
    pub router_address: Option<Address>,
    /// Overrides the protocol's known V2 router.
    pub dex_router: Option<Address>,

    // Portfolio
    #[serde(default = "default_quote_token")]
    pub quote_token: String,
    /// Symbol or address -> weight in bps. Accepts a table, JSON, or `WETH:7000,USDC:3000`.
    #[serde(default, deserialize_with = "deserialize_keyed")]
    pub allocation: Option<HashMap<String, String>>,
    /// Underlying symbol -> vault address.
    #[serde(default, deserialize_with = "deserialize_keyed")]
    pub yearn_vaults: Option<HashMap<String, String>>,
    #[serde(default, deserialize_with = "deserialize_symbol_list")]
    pub pegged_stables: Vec<String>,

    // Decision
    #[serde(default = "default_limit_bps", alias = "limit", deserialize_with = "deserialize_bps")]
    pub limit_bps: u64,
    #[serde(
        default = "default_slippage_bps",
        alias = "slippage",
        deserialize_with = "deserialize_bps"
    )]
    pub slippage_bps: u64,
    #[serde(default = "default_false")]
    pub technical_analysis: bool,
    #[serde(default = "default_timeframe")]
    pub signal_timeframe: String,
    pub signals_url: Option<String>,
    #[serde(default = "default_false")]
    pub reuse_valuation_price: bool,

    // Execution
    #[serde(default = "default_false")]
    pub dry_run: bool,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_max_attempts")]
    pub receipt_max_attempts: u32,
    #[serde(default = "default_true")]
    pub drop_detection: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_chain_id() -> u64 {
    constants::CHAIN_ETHEREUM
}
fn default_protocol() -> String {
    "uniswap_v2".to_string()
}
fn default_max_gas() -> u64 {
    200
}
fn default_quote_token() -> String {
    "USDC".to_string()
}
fn default_limit_bps() -> u64 {
    constants::DEFAULT_LIMIT_BPS
}
fn default_slippage_bps() -> u64 {
    constants::DEFAULT_SLIPPAGE_BPS
}
fn default_timeframe() -> String {
    "1h".to_string()
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_receipt_max_attempts() -> u32 {
    constants::DEFAULT_RECEIPT_MAX_ATTEMPTS
}
fn default_interval_secs() -> u64 {
    3_600
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyedRaw {
    Map(HashMap<String, serde_json::Value>),
    Text(String),
}

fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// `KEY:value` pairs separated by commas, or a JSON object.
pub fn parse_keyed(raw: &str) -> Result<HashMap<String, String>, AppError> {
    let trimmed = raw.trim().trim_matches(|c| c == '`' || c == '\'');
    if trimmed.starts_with('{') {
        let map: HashMap<String, serde_json::Value> = serde_json::from_str(trimmed)
            .map_err(|e| AppError::Config(format!("Invalid JSON map '{trimmed}': {e}")))?;
        return Ok(map
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), value_to_string(v)))
            .collect());
    }

    let mut out = HashMap::new();
    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once(':')
            .or_else(|| part.split_once('='))
            .ok_or_else(|| AppError::Config(format!("Expected KEY:value, got '{part}'")))?;
        out.insert(key.trim().to_uppercase(), value.trim().to_string());
    }
    Ok(out)
}

fn deserialize_keyed<'de, D>(deserializer: D) -> Result<Option<HashMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<KeyedRaw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(KeyedRaw::Map(map)) => Ok(Some(
            map.into_iter()
                .map(|(k, v)| (k.trim().to_uppercase(), value_to_string(v)))
                .collect(),
        )),
        Some(KeyedRaw::Text(s)) => parse_keyed(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListRaw {
    List(Vec<String>),
    Text(String),
}

fn deserialize_symbol_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<ListRaw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ListRaw::List(items)) => items,
        Some(ListRaw::Text(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(ToString::to_string)
            .collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BpsRaw {
    Int(u64),
    Text(String),
}

fn deserialize_bps<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match BpsRaw::deserialize(deserializer)? {
        BpsRaw::Int(v) => Ok(v),
        BpsRaw::Text(s) => parse_bps(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid basis points '{s}'"))),
    }
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected) = path {
            builder = builder.add_source(File::from(Path::new(selected)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Environment (and .env) wins over the profile file; CLI flags win over both in main.
        builder = builder.add_source(Environment::default());

        let settings: GlobalSettings = builder.build()?.try_deserialize()?;
        if settings.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        Ok(settings)
    }

    pub fn get_http_provider(&self) -> Result<String, AppError> {
        if let Some(urls) = &self.http_providers
            && let Some(url) = urls.get(&self.chain_id.to_string())
        {
            return Ok(url.clone());
        }
        if let Some(url) = self
            .http_provider
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return Ok(url.to_string());
        }
        if let Ok(v) = std::env::var(format!("http_provider_{}", self.chain_id)) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        Err(AppError::Config(format!(
            "No RPC URL found for chain {}",
            self.chain_id
        )))
    }

    fn data_dir_value(&self) -> Option<String> {
        std::env::var("DATA_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.data_dir
                    .as_ref()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
    }

    fn resolve_path_setting(
        &self,
        env_key: &str,
        configured: Option<&str>,
        default_path: &str,
        required: bool,
    ) -> Result<String, AppError> {
        let raw = std::env::var(env_key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                configured
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| default_path.to_string());
        let data_dir = self.data_dir_value();
        let resolved = if required {
            resolve_required_data_path(&raw, data_dir.as_deref())?
        } else {
            resolve_data_path(&raw, data_dir.as_deref())
        };
        Ok(resolved.to_string_lossy().to_string())
    }

    pub fn tokenlist_path(&self) -> Result<String, AppError> {
        self.resolve_path_setting(
            "TOKENLIST_PATH",
            self.tokenlist_path.as_deref(),
            "data/tokenlist.json",
            true,
        )
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .ok()
            .or_else(|| self.database_url.clone())
            .unwrap_or_else(|| "sqlite://oxidity_rebalancer.db".to_string())
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, AppError> {
        let signer = PrivateKeySigner::from_str(self.wallet_key.trim())
            .map_err(|e| AppError::Config(format!("Invalid wallet key: {e}")))?;
        if let Some(expected) = self.wallet_address
            && expected != signer.address()
        {
            return Err(AppError::Config(format!(
                "WALLET_ADDRESS {expected:#x} does not match wallet key ({:#x})",
                signer.address()
            )));
        }
        Ok(signer)
    }

    pub fn receipt_poll_ms_value(&self) -> u64 {
        self.receipt_poll_ms.max(250)
    }

    pub fn receipt_max_attempts_value(&self) -> u32 {
        self.receipt_max_attempts.max(1)
    }

    pub fn interval_secs_value(&self) -> u64 {
        self.interval_secs.max(60)
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            max_attempts: self.receipt_max_attempts_value(),
            poll_interval: Duration::from_millis(self.receipt_poll_ms_value()),
            drop_detection: self.drop_detection,
        }
    }

    pub fn quote_token_address(&self, tokens: &TokenManager) -> Result<Address, AppError> {
        tokens.resolve(self.chain_id, &self.quote_token)
    }

    /// Weights as configured; the sum is checked at the start of every cycle.
    pub fn desired_allocation(&self, tokens: &TokenManager) -> Result<AllocationTarget, AppError> {
        let raw = self
            .allocation
            .as_ref()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::Config("ALLOCATION is missing".into()))?;
        let mut weights = Vec::with_capacity(raw.len());
        for (symbol, bps) in raw {
            let token = tokens.resolve(self.chain_id, symbol)?;
            let bps = parse_bps(bps)
                .filter(|v| *v <= BPS_DENOMINATOR)
                .ok_or_else(|| AppError::Validation {
                    field: format!("allocation.{symbol}"),
                    message: format!("'{bps}' is not a weight in 0..=10000 bps"),
                })?;
            weights.push((token, bps as u32));
        }
        Ok(AllocationTarget::new(weights))
    }

    pub fn rebalance_config(&self, tokens: &TokenManager) -> Result<RebalanceConfig, AppError> {
        let router = self
            .router_address
            .ok_or_else(|| AppError::Config("ROUTER_ADDRESS is missing".into()))?;
        let dex_router = self
            .dex_router
            .or_else(|| constants::v2_router_for(self.chain_id, &self.protocol))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Protocol {} has no router on chain {}; set DEX_ROUTER",
                    self.protocol, self.chain_id
                ))
            })?;

        let mut config = RebalanceConfig::new(self.chain_id, router, dex_router);
        config.protocol = self.protocol.to_lowercase();
        config.limit_bps = self.limit_bps;
        config.slippage_bps = self.slippage_bps;
        config.technical_analysis = self.technical_analysis;
        config.signal_timeframe = self.signal_timeframe.clone();
        config.confirmation = self.confirmation_policy();
        config.dry_run = self.dry_run;
        config.reuse_valuation_price = self.reuse_valuation_price;

        if let Some(vaults) = &self.yearn_vaults {
            for (symbol, vault) in vaults {
                let token = tokens.resolve(self.chain_id, symbol)?;
                let vault = parse_address_hex(vault)
                    .ok_or_else(|| AppError::InvalidAddress(vault.clone()))?;
                config.vaults.insert(token, vault);
            }
        }
        // Without an explicit list every stablecoin-tagged token is pegged.
        let pegged: HashSet<Address> = if self.pegged_stables.is_empty() {
            tokens.stablecoins(self.chain_id).into_iter().collect()
        } else {
            self.pegged_stables
                .iter()
                .map(|symbol| tokens.resolve(self.chain_id, symbol))
                .collect::<Result<_, _>>()?
        };
        config.pegged_stables = pegged;

        config.validate()?;
        Ok(config)
    }
}
