// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, address};
use lazy_static::lazy_static;
use std::collections::HashMap;

// Common assets
pub const WETH_MAINNET: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const WETH_OPTIMISM: Address = address!("4200000000000000000000000000000000000006");
pub const WETH_ARBITRUM: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");
pub const WMATIC_POLYGON: Address = address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270");
pub const WBNB_BSC: Address = address!("BB4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");

/// Sentinel used by token lists for the chain's native coin.
pub const NATIVE_SENTINEL: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_OPTIMISM: u64 = 10;
pub const CHAIN_BSC: u64 = 56;
pub const CHAIN_POLYGON: u64 = 137;
pub const CHAIN_ARBITRUM: u64 = 42161;

// =============================================================================
// ALLOCATION & EXECUTION CONSTANTS
// =============================================================================

/// Full allocation in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

pub const DEFAULT_LIMIT_BPS: u64 = 100;
pub const DEFAULT_SLIPPAGE_BPS: u64 = 50;
pub const MAX_SLIPPAGE_BPS: u64 = 2_000;

pub const DEFAULT_RECEIPT_POLL_MS: u64 = 3_000;
pub const DEFAULT_RECEIPT_MAX_ATTEMPTS: u32 = 40;

pub const DEFAULT_GAS_LIMIT: u64 = 250_000;
pub const MAX_GAS_LIMIT: u64 = 8_000_000;
/// Headroom applied on top of `eth_estimateGas` for router bundles.
pub const GAS_LIMIT_BUFFER_BPS: u64 = 12_000;

/// Swap deadline horizon in seconds.
pub const SWAP_DEADLINE_SECS: u64 = 1_200;

lazy_static! {
    // Uniswap-V2 compatible routers keyed by protocol name.
    pub static ref V2_ROUTERS_MAINNET: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();
        m.insert("uniswap_v2", address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));
        m.insert("sushiswap", address!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F"));
        m
    };

    pub static ref V2_ROUTERS_OPTIMISM: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();
        m.insert("sushiswap", address!("2abf469074dc0b54d793850807e6eb5faf2625b1"));
        m
    };

    pub static ref V2_ROUTERS_ARBITRUM: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();
        m.insert("sushiswap", address!("1b02dA8Cb0d097eB8D57A175b88c7D8b47997506"));
        m.insert("camelot", address!("c873fEcbd354f5A56E00E710B90EF4201db2448d"));
        m
    };

    pub static ref V2_ROUTERS_POLYGON: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();
        m.insert("sushiswap", address!("1b02dA8Cb0d097eB8D57A175b88c7D8b47997506"));
        m.insert("quickswap", address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"));
        m
    };

    pub static ref V2_ROUTERS_BSC: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();
        m.insert("pancakeswap_v2", address!("10ED43C718714eb63d5aA57B78B54704E256024E"));
        m
    };

    pub static ref V2_ROUTERS_BY_CHAIN: HashMap<u64, &'static HashMap<&'static str, Address>> = {
        let mut m = HashMap::new();
        m.insert(CHAIN_ETHEREUM, &*V2_ROUTERS_MAINNET);
        m.insert(CHAIN_OPTIMISM, &*V2_ROUTERS_OPTIMISM);
        m.insert(CHAIN_ARBITRUM, &*V2_ROUTERS_ARBITRUM);
        m.insert(CHAIN_POLYGON, &*V2_ROUTERS_POLYGON);
        m.insert(CHAIN_BSC, &*V2_ROUTERS_BSC);
        m
    };

    pub static ref WRAPPED_NATIVE_BY_CHAIN: HashMap<u64, Address> = {
        let mut m = HashMap::new();
        m.insert(CHAIN_ETHEREUM, WETH_MAINNET);
        m.insert(CHAIN_OPTIMISM, WETH_OPTIMISM);
        m.insert(CHAIN_ARBITRUM, WETH_ARBITRUM);
        m.insert(CHAIN_POLYGON, WMATIC_POLYGON);
        m.insert(CHAIN_BSC, WBNB_BSC);
        m
    };
}

pub fn v2_router_for(chain_id: u64, protocol: &str) -> Option<Address> {
    V2_ROUTERS_BY_CHAIN
        .get(&chain_id)
        .and_then(|m| m.get(protocol.trim().to_ascii_lowercase().as_str()).copied())
}

pub fn wrapped_native_for_chain(chain_id: u64) -> Address {
    WRAPPED_NATIVE_BY_CHAIN
        .get(&chain_id)
        .copied()
        .unwrap_or(WETH_MAINNET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_lookup_is_case_insensitive() {
        assert_eq!(
            v2_router_for(CHAIN_ETHEREUM, "Uniswap_V2"),
            Some(address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"))
        );
        assert!(v2_router_for(CHAIN_BSC, "uniswap_v2").is_none());
    }

    #[test]
    fn unknown_chain_defaults_to_mainnet_weth() {
        assert_eq!(wrapped_native_for_chain(999_999), WETH_MAINNET);
        assert_eq!(wrapped_native_for_chain(CHAIN_POLYGON), WMATIC_POLYGON);
    }
}
