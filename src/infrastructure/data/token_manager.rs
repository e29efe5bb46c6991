// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::collections::HashMap;
use std::fs;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::domain::error::AppError;

/// Token list metadata used to resolve configured symbols.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenManager {
    tokens_by_chain: HashMap<u64, HashMap<Address, TokenInfo>>,
    symbols_by_chain: HashMap<u64, HashMap<String, Address>>,
}

#[derive(Deserialize)]
struct TokenEntry {
    symbol: String,
    #[serde(default)]
    tags: Vec<String>,
    decimals: u8,
    #[serde(default)]
    addresses: HashMap<String, String>,
}

impl TokenManager {
    fn is_stablecoin(info: &TokenInfo) -> bool {
        info.tags
            .iter()
            .any(|tag| tag.trim().eq_ignore_ascii_case("stablecoin"))
    }

    pub fn load_from_file(path: &str) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read tokenlist {path}: {e}")))?;
        Self::from_json(&raw)
            .map_err(|e| AppError::Config(format!("Invalid tokenlist JSON {path}: {e}")))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TokenEntry> = serde_json::from_str(raw)?;
        let mut manager = Self::default();

        for entry in entries {
            for (chain_str, addr_str) in entry.addresses {
                if let Ok(chain_id) = chain_str.parse::<u64>()
                    && let Ok(addr) = addr_str.parse::<Address>()
                {
                    manager.insert(
                        chain_id,
                        addr,
                        TokenInfo {
                            symbol: entry.symbol.clone(),
                            decimals: entry.decimals,
                            tags: entry.tags.clone(),
                        },
                    );
                }
            }
        }

        Ok(manager)
    }

    pub fn insert(&mut self, chain_id: u64, address: Address, info: TokenInfo) {
        self.symbols_by_chain
            .entry(chain_id)
            .or_default()
            .insert(info.symbol.to_uppercase(), address);
        self.tokens_by_chain
            .entry(chain_id)
            .or_default()
            .insert(address, info);
    }

    /// Symbol or literal address to an address on `chain_id`.
    pub fn resolve(&self, chain_id: u64, symbol_or_address: &str) -> Result<Address, AppError> {
        let key = symbol_or_address.trim();
        if key.starts_with("0x") || key.starts_with("0X") {
            return crate::common::parsing::parse_address_hex(key)
                .ok_or_else(|| AppError::InvalidAddress(key.to_string()));
        }
        self.symbols_by_chain
            .get(&chain_id)
            .and_then(|m| m.get(&key.to_uppercase()).copied())
            .ok_or_else(|| {
                AppError::Config(format!("Token {key} is not in the tokenlist for chain {chain_id}"))
            })
    }

    /// Stablecoin-tagged tokens on `chain_id`.
    pub fn stablecoins(&self, chain_id: u64) -> Vec<Address> {
        self.tokens_by_chain
            .get(&chain_id)
            .map(|m| {
                m.iter()
                    .filter(|(_, info)| Self::is_stablecoin(info))
                    .map(|(addr, _)| *addr)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens_by_chain.is_empty()
    }
}
