// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use oxidity_rebalancer::app::config::GlobalSettings;
use oxidity_rebalancer::data::token_manager::TokenManager;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Fail CI if config files contain 64-hex private keys or obvious secrets.
#[test]
fn no_committed_hex_keys_in_configs() {
    let re = Regex::new(r"0x?[a-fA-F0-9]{64}").expect("regex");
    let candidates = [
        "config.toml",
        "config.example.toml",
        "config.prod.toml",
        "config.dev.toml",
    ];
    for file in candidates {
        if !Path::new(file).exists() {
            continue;
        }
        let body = fs::read_to_string(file).expect("read config");
        for (idx, line) in body.lines().enumerate() {
            if re.is_match(line) {
                panic!("Secret-looking hex in {} at line {}", file, idx + 1);
            }
        }
    }
}

#[test]
fn example_config_resolves_against_bundled_tokenlist() {
    let settings =
        GlobalSettings::load_with_path(Some("config.example.toml")).expect("example config loads");
    let tokens = TokenManager::load_from_file("data/tokenlist.json").expect("tokenlist");

    let desired = settings.desired_allocation(&tokens).expect("allocation");
    assert_eq!(desired.len(), 3);
    assert_eq!(desired.total_bps(), 10_000);

    // Scalar keys must stay top-level, not fall into the allocation table.
    let allocation = settings.allocation.as_ref().expect("allocation table");
    assert!(!allocation.contains_key("RECEIPT_POLL_MS"));
    assert_eq!(settings.limit_bps, 100);
    assert_eq!(settings.slippage_bps, 50);
    assert_eq!(settings.receipt_poll_ms, 3_000);
    assert_eq!(settings.receipt_max_attempts, 40);
    assert_eq!(settings.interval_secs, 3_600);
    assert!(settings.dry_run);
    settings
        .quote_token_address(&tokens)
        .expect("quote token is listed");
}
