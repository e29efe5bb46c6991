// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::data::abi::{ERC20, UniV2Router};
use crate::domain::constants::{BPS_DENOMINATOR, SWAP_DEADLINE_SECS};
use crate::domain::types::{ApprovalRequest, Call, CallSet};
use crate::network::provider::HttpProvider;
use alloy::primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One exact-input swap executed by the agent on behalf of `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub input: Address,
    pub output: Address,
    pub amount_in: U256,
    pub slippage_bps: u64,
    /// Holder of `input`; grants the agent an allowance.
    pub owner: Address,
    /// Router contract that runs the calls.
    pub agent: Address,
}

#[async_trait]
pub trait SwapBuilder: Send + Sync {
    async fn build_swap(&self, request: &SwapRequest) -> Result<CallSet, AppError>;
}

pub struct UniswapV2SwapBuilder {
    router: UniV2Router::UniV2RouterInstance<HttpProvider>,
    wrapped_native: Address,
}

impl UniswapV2SwapBuilder {
    pub fn new(provider: HttpProvider, dex_router: Address, wrapped_native: Address) -> Self {
        Self {
            router: UniV2Router::new(dex_router, provider),
            wrapped_native,
        }
    }

    async fn best_path(&self, request: &SwapRequest) -> Result<(Vec<Address>, U256), AppError> {
        let mut paths = vec![vec![request.input, request.output]];
        if request.input != self.wrapped_native && request.output != self.wrapped_native {
            paths.push(vec![request.input, self.wrapped_native, request.output]);
        }

        let mut best: Option<(Vec<Address>, U256)> = None;
        for path in paths {
            let router = self.router.clone();
            let quote_path = path.clone();
            let amount_in = request.amount_in;
            let quote: Result<Vec<U256>, _> = retry_async(
                move |_| {
                    let c = router.clone();
                    let p = quote_path.clone();
                    async move { c.getAmountsOut(amount_in, p).call().await }
                },
                2,
                Duration::from_millis(100),
            )
            .await;
            match quote {
                Ok(amounts) => {
                    let out = amounts.last().copied().unwrap_or(U256::ZERO);
                    if !out.is_zero() && best.as_ref().is_none_or(|(_, b)| out > *b) {
                        best = Some((path, out));
                    }
                }
                Err(e) => {
                    tracing::debug!(target: "swaps", path_len = path.len(), error = %e, "V2 path quote failed");
                }
            }
        }
        best.ok_or_else(|| {
            AppError::Strategy(format!(
                "No V2 route from {:#x} to {:#x}",
                request.input, request.output
            ))
        })
    }
}

pub fn min_out_with_slippage(expected_out: U256, slippage_bps: u64) -> U256 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps);
    expected_out.saturating_mul(U256::from(keep)) / U256::from(BPS_DENOMINATOR)
}

/// Pull from the owner, let the agent approve the DEX, swap back into the agent.
pub fn encode_v2_swap(
    dex_router: Address,
    request: &SwapRequest,
    path: Vec<Address>,
    min_out: U256,
    deadline: u64,
) -> CallSet {
    let pull = ERC20::transferFromCall {
        from: request.owner,
        to: request.agent,
        amount: request.amount_in,
    };
    let approve = ERC20::approveCall {
        spender: dex_router,
        amount: request.amount_in,
    };
    let swap = UniV2Router::swapExactTokensForTokensCall {
        amountIn: request.amount_in,
        amountOutMin: min_out,
        path,
        to: request.agent,
        deadline: U256::from(deadline),
    };

    CallSet {
        calls: vec![
            Call::new(request.input, pull.abi_encode()),
            Call::new(request.input, approve.abi_encode()),
            Call::new(dex_router, swap.abi_encode()),
        ],
        approvals: vec![ApprovalRequest {
            token: request.input,
            spender: request.agent,
            amount: request.amount_in,
        }],
        tokens_return: vec![request.input, request.output],
    }
}

fn current_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[async_trait]
impl SwapBuilder for UniswapV2SwapBuilder {
    async fn build_swap(&self, request: &SwapRequest) -> Result<CallSet, AppError> {
        if request.amount_in.is_zero() {
            return Err(AppError::Strategy("Swap amount is zero".into()));
        }
        let (path, expected_out) = self.best_path(request).await?;
        let min_out = min_out_with_slippage(expected_out, request.slippage_bps);
        tracing::debug!(
            target: "swaps",
            input = %request.input,
            output = %request.output,
            amount_in = %request.amount_in,
            expected_out = %expected_out,
            min_out = %min_out,
            hops = path.len() - 1,
            "Built V2 swap"
        );
        Ok(encode_v2_swap(
            *self.router.address(),
            request,
            path,
            min_out,
            current_unix().saturating_add(SWAP_DEADLINE_SECS),
        ))
    }
}
