// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::types::{TokenHolding, Valuation, VaultPosition, rescale, units_to_f64};
use crate::network::price_source::PriceSource;
use crate::services::rebalance::config::RebalanceConfig;
use alloy::primitives::Address;

/// Values holdings in the quote token.
pub struct ValuationEngine<'a> {
    prices: &'a dyn PriceSource,
    config: &'a RebalanceConfig,
    quote_token: Address,
    quote_decimals: u8,
}

impl<'a> ValuationEngine<'a> {
    pub fn new(
        prices: &'a dyn PriceSource,
        config: &'a RebalanceConfig,
        quote_token: Address,
        quote_decimals: u8,
    ) -> Self {
        Self {
            prices,
            config,
            quote_token,
            quote_decimals,
        }
    }

    /// Spot plus vault-redeemable balance converted at one price read.
    pub async fn valuate(
        &self,
        holding: TokenHolding,
        position: Option<VaultPosition>,
    ) -> Result<Valuation, AppError> {
        let token = holding.address;
        let effective = holding
            .spot_balance
            .saturating_add(position.as_ref().map(|p| p.redeemable).unwrap_or_default());

        let (price, value) = if self.config.uses_fixed_scaling(&token, &self.quote_token) {
            (
                None,
                rescale(effective, holding.decimals, self.quote_decimals),
            )
        } else {
            let price = self
                .prices
                .quote_value(token, true)
                .await
                .map_err(|e| match e {
                    AppError::ValuationUnavailable { .. } => e,
                    other => AppError::ValuationUnavailable {
                        token,
                        reason: other.to_string(),
                    },
                })?;
            let value = price.value_of(effective, holding.decimals).ok_or_else(|| {
                AppError::ValuationUnavailable {
                    token,
                    reason: format!("value overflows at price {}", price.0),
                }
            })?;
            (Some(price), value)
        };

        tracing::debug!(
            target: "valuation",
            token = %token,
            symbol = %holding.symbol,
            balance = units_to_f64(effective, holding.decimals),
            value = units_to_f64(value, self.quote_decimals),
            fixed = price.is_none(),
            "Valued holding"
        );

        Ok(Valuation {
            holding,
            position,
            price,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::QuotePrice;
    use alloy::primitives::U256;
    use async_trait::async_trait;

    struct FixedPrice(Option<QuotePrice>);

    #[async_trait]
    impl PriceSource for FixedPrice {
        async fn quote_value(&self, token: Address, _use_wrapped: bool) -> Result<QuotePrice, AppError> {
            self.0.ok_or(AppError::Connection(format!("no quote for {token:#x}")))
        }
    }

    fn holding(address: Address, decimals: u8, spot: u64) -> TokenHolding {
        TokenHolding {
            address,
            symbol: "TKN".into(),
            decimals,
            spot_balance: U256::from(spot),
            vault: None,
        }
    }

    fn config() -> RebalanceConfig {
        RebalanceConfig::new(1, Address::repeat_byte(0xaa), Address::repeat_byte(0xbb))
    }

    #[tokio::test]
    async fn quote_token_scales_without_price_call() {
        let quote = Address::repeat_byte(1);
        let cfg = config();
        let prices = FixedPrice(None);
        let engine = ValuationEngine::new(&prices, &cfg, quote, 6);
        let v = engine
            .valuate(holding(quote, 6, 1_500_000), None)
            .await
            .expect("fixed scaling");
        assert_eq!(v.value, U256::from(1_500_000u64));
        assert!(v.price.is_none());
    }

    #[tokio::test]
    async fn vault_redeemable_is_added_before_conversion() {
        let quote = Address::repeat_byte(1);
        let token = Address::repeat_byte(2);
        let cfg = config();
        // 3 quote units per whole token (decimals 2).
        let prices = FixedPrice(Some(QuotePrice(U256::from(3u64))));
        let engine = ValuationEngine::new(&prices, &cfg, quote, 0);
        let position = VaultPosition {
            vault: Address::repeat_byte(9),
            shares: U256::from(50u64),
            redeemable: U256::from(100u64),
            accrued_interest: U256::ZERO,
        };
        let v = engine
            .valuate(holding(token, 2, 200), Some(position))
            .await
            .expect("priced");
        assert_eq!(v.effective_balance(), U256::from(300u64));
        assert_eq!(v.value, U256::from(9u64));
    }

    #[tokio::test]
    async fn price_failure_is_valuation_unavailable() {
        let quote = Address::repeat_byte(1);
        let token = Address::repeat_byte(3);
        let cfg = config();
        let prices = FixedPrice(None);
        let engine = ValuationEngine::new(&prices, &cfg, quote, 6);
        let err = engine
            .valuate(holding(token, 18, 1), None)
            .await
            .expect_err("no price");
        assert!(matches!(err, AppError::ValuationUnavailable { token: t, .. } if t == token));
    }

    #[tokio::test]
    async fn overflowing_price_excludes_token() {
        let quote = Address::repeat_byte(1);
        let token = Address::repeat_byte(4);
        let cfg = config();
        let prices = FixedPrice(Some(QuotePrice(U256::MAX)));
        let engine = ValuationEngine::new(&prices, &cfg, quote, 6);
        let err = engine
            .valuate(holding(token, 18, 2), None)
            .await
            .expect_err("overflow");
        assert!(matches!(
            err,
            AppError::ValuationUnavailable { token: t, ref reason } if t == token && reason.contains("overflows")
        ));
    }
}
