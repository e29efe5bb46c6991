// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod backend;
pub mod chain_reader;
pub mod gas;
pub mod nonce;
pub mod price_source;
pub mod provider;
pub mod signals;
