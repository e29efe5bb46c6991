// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

#![allow(dead_code)]

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use oxidity_rebalancer::data::abi::{ERC20, RebalanceRouter};
use oxidity_rebalancer::domain::error::AppError;
use oxidity_rebalancer::domain::types::{ApprovalRequest, Call, CallSet, QuotePrice, Signal};
use oxidity_rebalancer::network::backend::{InclusionStatus, SubmittedTx, TransactionBackend};
use oxidity_rebalancer::network::chain_reader::{ChainReader, TokenMetadata};
use oxidity_rebalancer::network::price_source::PriceSource;
use oxidity_rebalancer::network::signals::StaticSignals;
use oxidity_rebalancer::services::rebalance::swaps::{SwapBuilder, SwapRequest};
use oxidity_rebalancer::services::rebalance::vault_actions::Erc4626VaultActions;
use oxidity_rebalancer::services::rebalance::{
    ConfirmationPolicy, RebalanceConfig, RebalanceContext,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const OWNER: Address = Address::repeat_byte(0x0e);
pub const ROUTER: Address = Address::repeat_byte(0xa9);
pub const DEX: Address = Address::repeat_byte(0xd0);
pub const QUOTE: Address = Address::repeat_byte(0x01);
pub const TOKEN_A: Address = Address::repeat_byte(0x0a);
pub const TOKEN_B: Address = Address::repeat_byte(0x0b);
pub const TOKEN_C: Address = Address::repeat_byte(0x0c);

/// Everything the fakes did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SwapBuilt { input: Address, output: Address, amount: U256 },
    Simulated { calls: usize },
    Submitted { to: Address, nonce: u64 },
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

fn push(log: &EventLog, event: Event) {
    log.lock().expect("event log").push(event);
}

pub struct Vault {
    pub asset: Address,
    pub shares: U256,
    /// Underlying per share, in tenths.
    pub rate_tenths: u64,
}

#[derive(Default)]
pub struct ChainState {
    pub metadata: HashMap<Address, TokenMetadata>,
    pub balances: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    pub vaults: HashMap<Address, Vault>,
    pub broken: HashSet<Address>,
}

#[derive(Clone, Default)]
pub struct FakeChain {
    pub state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn token(&self, token: Address, symbol: &str, decimals: u8, balance: U256) {
        let mut state = self.state.lock().expect("state");
        state.metadata.insert(
            token,
            TokenMetadata {
                symbol: symbol.to_string(),
                decimals,
            },
        );
        state.balances.insert(token, balance);
    }

    pub fn vault(&self, vault: Address, asset: Address, shares: U256, rate_tenths: u64) {
        self.state.lock().expect("state").vaults.insert(
            vault,
            Vault {
                asset,
                shares,
                rate_tenths,
            },
        );
    }

    pub fn set_balance(&self, token: Address, balance: U256) {
        self.state.lock().expect("state").balances.insert(token, balance);
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, AppError> {
        let state = self.state.lock().expect("state");
        if state.broken.contains(&token) {
            return Err(AppError::Connection(format!("read failed for {token:#x}")));
        }
        state
            .metadata
            .get(&token)
            .cloned()
            .ok_or_else(|| AppError::Connection(format!("unknown token {token:#x}")))
    }

    async fn balance_of(&self, token: Address, _owner: Address) -> Result<U256, AppError> {
        Ok(self
            .state
            .lock()
            .expect("state")
            .balances
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(&self, token: Address, _owner: Address, spender: Address) -> Result<U256, AppError> {
        Ok(self
            .state
            .lock()
            .expect("state")
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn vault_shares(&self, vault: Address, _owner: Address) -> Result<U256, AppError> {
        Ok(self
            .state
            .lock()
            .expect("state")
            .vaults
            .get(&vault)
            .map(|v| v.shares)
            .unwrap_or_default())
    }

    async fn vault_asset(&self, vault: Address) -> Result<Address, AppError> {
        self.state
            .lock()
            .expect("state")
            .vaults
            .get(&vault)
            .map(|v| v.asset)
            .ok_or_else(|| AppError::Connection(format!("not a vault {vault:#x}")))
    }

    async fn preview_redeem(&self, vault: Address, shares: U256) -> Result<U256, AppError> {
        let state = self.state.lock().expect("state");
        let rate = state.vaults.get(&vault).map(|v| v.rate_tenths).unwrap_or(10);
        Ok(shares * U256::from(rate) / U256::from(10u64))
    }

    async fn preview_withdraw(&self, vault: Address, assets: U256) -> Result<U256, AppError> {
        let state = self.state.lock().expect("state");
        let rate = state.vaults.get(&vault).map(|v| v.rate_tenths).unwrap_or(10);
        Ok(assets * U256::from(10u64) / U256::from(rate))
    }
}

#[derive(Default)]
pub struct FakePrices {
    pub prices: Mutex<HashMap<Address, QuotePrice>>,
    pub calls: Mutex<Vec<Address>>,
}

impl FakePrices {
    pub fn set(&self, token: Address, price: u64) {
        self.prices
            .lock()
            .expect("prices")
            .insert(token, QuotePrice(U256::from(price)));
    }

    pub fn calls_for(&self, token: Address) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .filter(|t| **t == token)
            .count()
    }
}

#[async_trait]
impl PriceSource for FakePrices {
    async fn quote_value(&self, token: Address, _use_wrapped: bool) -> Result<QuotePrice, AppError> {
        self.calls.lock().expect("calls").push(token);
        self.prices
            .lock()
            .expect("prices")
            .get(&token)
            .copied()
            .ok_or(AppError::ValuationUnavailable {
                token,
                reason: "no quote".into(),
            })
    }
}

pub struct FakeSwaps {
    pub log: EventLog,
}

#[async_trait]
impl SwapBuilder for FakeSwaps {
    async fn build_swap(&self, request: &SwapRequest) -> Result<CallSet, AppError> {
        push(
            &self.log,
            Event::SwapBuilt {
                input: request.input,
                output: request.output,
                amount: request.amount_in,
            },
        );
        Ok(CallSet {
            calls: vec![Call::new(DEX, vec![0xde, 0xad])],
            approvals: vec![ApprovalRequest {
                token: request.input,
                spender: request.agent,
                amount: request.amount_in,
            }],
            tokens_return: vec![request.input, request.output],
        })
    }
}

#[derive(Default)]
pub struct BackendScript {
    /// 1-based simulation indexes that revert.
    pub fail_simulations: HashSet<usize>,
    /// 1-based router submissions that never get a receipt.
    pub drop_submissions: HashSet<usize>,
    /// 1-based router submissions the backend refuses to sign, as when gas is above the cap.
    pub refuse_submissions: HashSet<usize>,
}

pub struct FakeBackend {
    pub chain: FakeChain,
    pub log: EventLog,
    pub script: BackendScript,
    simulations: Mutex<usize>,
    router_submissions: Mutex<usize>,
    next_nonce: Mutex<u64>,
    receipts: Mutex<HashMap<B256, InclusionStatus>>,
}

impl FakeBackend {
    pub fn new(chain: FakeChain, log: EventLog, script: BackendScript) -> Self {
        Self {
            chain,
            log,
            script,
            simulations: Mutex::new(0),
            router_submissions: Mutex::new(0),
            next_nonce: Mutex::new(0),
            receipts: Mutex::new(HashMap::new()),
        }
    }
}

fn encoded_true() -> Bytes {
    let mut word = [0u8; 32];
    word[31] = 1;
    Bytes::from(word.to_vec())
}

#[async_trait]
impl TransactionBackend for FakeBackend {
    fn owner(&self) -> Address {
        OWNER
    }

    async fn simulate(&self, _to: Address, data: Bytes, _value: U256) -> Result<Bytes, AppError> {
        let index = {
            let mut n = self.simulations.lock().expect("simulations");
            *n += 1;
            *n
        };
        let call = RebalanceRouter::executeCall::abi_decode(&data)
            .map_err(|e| AppError::Strategy(format!("bad router calldata: {e}")))?;
        push(
            &self.log,
            Event::Simulated {
                calls: call.calls.len(),
            },
        );
        if self.script.fail_simulations.contains(&index) {
            return Err(AppError::Strategy("execution reverted".into()));
        }
        Ok(encoded_true())
    }

    async fn submit(&self, to: Address, data: Bytes, _value: U256) -> Result<SubmittedTx, AppError> {
        let router_index = (to == ROUTER).then(|| {
            let mut n = self.router_submissions.lock().expect("submissions");
            *n += 1;
            *n
        });
        if let Some(index) = router_index
            && self.script.refuse_submissions.contains(&index)
        {
            return Err(AppError::Strategy("Gas price above cap".into()));
        }

        let nonce = {
            let mut n = self.next_nonce.lock().expect("nonce");
            let current = *n;
            *n += 1;
            current
        };
        let hash = B256::left_padding_from(&(nonce + 1).to_be_bytes());
        push(&self.log, Event::Submitted { to, nonce });

        if let Some(index) = router_index {
            if self.script.drop_submissions.contains(&index) {
                return Ok(SubmittedTx { hash, nonce });
            }
        } else if let Ok(approve) = ERC20::approveCall::abi_decode(&data) {
            self.chain
                .state
                .lock()
                .expect("state")
                .allowances
                .insert((to, approve.spender), approve.amount);
        }

        self.receipts.lock().expect("receipts").insert(
            hash,
            InclusionStatus {
                success: true,
                block_number: Some(100 + nonce),
            },
        );
        Ok(SubmittedTx { hash, nonce })
    }

    async fn receipt(&self, hash: B256) -> Result<Option<InclusionStatus>, AppError> {
        Ok(self.receipts.lock().expect("receipts").get(&hash).copied())
    }

    async fn confirmed_nonce(&self) -> Result<u64, AppError> {
        // Every submitted nonce is consumed, dropped ones included.
        Ok(*self.next_nonce.lock().expect("nonce"))
    }
}

pub struct Harness {
    pub chain: FakeChain,
    pub prices: Arc<FakePrices>,
    pub backend: Arc<FakeBackend>,
    pub log: EventLog,
    pub ctx: RebalanceContext,
}

impl Harness {
    pub fn new(script: BackendScript) -> Self {
        Self::with_signals(script, StaticSignals::default())
    }

    pub fn with_signals(script: BackendScript, signals: StaticSignals) -> Self {
        let chain = FakeChain::default();
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let prices = Arc::new(FakePrices::default());
        let backend = Arc::new(FakeBackend::new(chain.clone(), log.clone(), script));
        let ctx = RebalanceContext {
            chain: Arc::new(chain.clone()),
            prices: prices.clone(),
            swaps: Arc::new(FakeSwaps { log: log.clone() }),
            vault_actions: Arc::new(Erc4626VaultActions),
            signals: Arc::new(signals),
            backend: backend.clone(),
            db: None,
            shutdown: CancellationToken::new(),
        };
        Self {
            chain,
            prices,
            backend,
            log,
            ctx,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().expect("event log").clone()
    }

    pub fn submissions_to(&self, target: Address) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Submitted { to, .. } if *to == target))
            .count()
    }
}

pub fn config() -> RebalanceConfig {
    let mut cfg = RebalanceConfig::new(1, ROUTER, DEX);
    cfg.limit_bps = 100;
    cfg.confirmation = ConfirmationPolicy {
        max_attempts: 3,
        poll_interval: Duration::ZERO,
        drop_detection: true,
    };
    cfg
}

pub fn signal(overbought: bool, oversold: bool) -> Signal {
    Signal {
        overbought,
        oversold,
    }
}

/// Whole units of an 18-decimal token.
pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}
