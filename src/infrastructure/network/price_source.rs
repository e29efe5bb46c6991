// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::data::abi::UniV2Router;
use crate::domain::constants::NATIVE_SENTINEL;
use crate::domain::types::{QuotePrice, pow10};
use crate::network::chain_reader::ChainReader;
use crate::network::provider::HttpProvider;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Prices a token in the quote currency.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Quote base units for one whole `token`. With `use_wrapped`, the native
    /// sentinel is priced through the chain's wrapped native token.
    async fn quote_value(&self, token: Address, use_wrapped: bool) -> Result<QuotePrice, AppError>;
}

/// Prices by asking a Uniswap-V2 style router what one whole token swaps for.
///
/// The quote includes the pool fee and the price impact of one unit, which is
/// negligible for the pools this agent trades against.
pub struct DexQuotePriceSource {
    router: UniV2Router::UniV2RouterInstance<HttpProvider>,
    reader: Arc<dyn ChainReader>,
    quote_token: Address,
    wrapped_native: Address,
}

impl DexQuotePriceSource {
    pub fn new(
        provider: HttpProvider,
        router: Address,
        reader: Arc<dyn ChainReader>,
        quote_token: Address,
        wrapped_native: Address,
    ) -> Self {
        Self {
            router: UniV2Router::new(router, provider),
            reader,
            quote_token,
            wrapped_native,
        }
    }

    /// Direct pool first, then hop through wrapped native.
    fn candidate_paths(&self, token: Address) -> Vec<Vec<Address>> {
        let mut paths = vec![vec![token, self.quote_token]];
        if token != self.wrapped_native && self.quote_token != self.wrapped_native {
            paths.push(vec![token, self.wrapped_native, self.quote_token]);
        }
        paths
    }

    async fn amounts_out(&self, amount_in: U256, path: Vec<Address>) -> Result<U256, AppError> {
        let router = self.router.clone();
        let amounts: Vec<U256> = retry_async(
            move |_| {
                let c = router.clone();
                let p = path.clone();
                async move { c.getAmountsOut(amount_in, p).call().await }
            },
            2,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Strategy(format!("V2 quote failed: {}", e)))?;
        amounts
            .last()
            .copied()
            .ok_or_else(|| AppError::Strategy("V2 quote missing amounts".into()))
    }
}

#[async_trait]
impl PriceSource for DexQuotePriceSource {
    async fn quote_value(&self, token: Address, use_wrapped: bool) -> Result<QuotePrice, AppError> {
        let token = if use_wrapped && token == NATIVE_SENTINEL {
            self.wrapped_native
        } else {
            token
        };
        if token == self.quote_token {
            let meta = self.reader.token_metadata(token).await?;
            return Ok(QuotePrice(pow10(meta.decimals)));
        }

        let meta = self.reader.token_metadata(token).await?;
        let one = pow10(meta.decimals);
        let mut last_err = None;
        for path in self.candidate_paths(token) {
            match self.amounts_out(one, path).await {
                Ok(out) if !out.is_zero() => return Ok(QuotePrice(out)),
                Ok(_) => last_err = Some("quote returned zero output".to_string()),
                Err(e) => last_err = Some(e.to_string()),
            }
        }
        Err(AppError::ValuationUnavailable {
            token,
            reason: last_err.unwrap_or_else(|| "no route".to_string()),
        })
    }
}
