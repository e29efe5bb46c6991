// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::types::Signal;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Overbought/oversold indicators for a symbol on a timeframe.
#[async_trait]
pub trait SignalProvider: Send + Sync {
    async fn signal(&self, symbol: &str, timeframe: &str) -> Result<Signal, AppError>;
}

/// Fixed signals keyed by upper-case symbol; unknown symbols are neutral.
#[derive(Debug, Clone, Default)]
pub struct StaticSignals {
    signals: HashMap<String, Signal>,
}

impl StaticSignals {
    pub fn new(signals: impl IntoIterator<Item = (String, Signal)>) -> Self {
        Self {
            signals: signals
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect(),
        }
    }
}

#[async_trait]
impl SignalProvider for StaticSignals {
    async fn signal(&self, symbol: &str, _timeframe: &str) -> Result<Signal, AppError> {
        Ok(self
            .signals
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or_default())
    }
}

/// Indicator service answering `GET {base}/signals/{symbol}?timeframe=..`.
pub struct HttpSignalProvider {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SignalResponse {
    #[serde(default)]
    overbought: Option<serde_json::Value>,
    #[serde(default)]
    oversold: Option<serde_json::Value>,
}

impl HttpSignalProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Initialization(format!("Signal client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Indicator services answer with booleans, 0/1, or strings.
fn truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(serde_json::Value::String(s)) => {
            crate::common::parsing::parse_boolish(s).unwrap_or(false)
        }
        _ => false,
    }
}

#[async_trait]
impl SignalProvider for HttpSignalProvider {
    async fn signal(&self, symbol: &str, timeframe: &str) -> Result<Signal, AppError> {
        let url = format!("{}/signals/{}", self.base_url, symbol.to_uppercase());
        let resp = self
            .client
            .get(&url)
            .query(&[("timeframe", timeframe)])
            .send()
            .await
            .map_err(|e| AppError::Connection(format!("Signal request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::ApiCall {
                provider: "signals".into(),
                status: resp.status().as_u16(),
            });
        }
        let body: SignalResponse = resp.json().await.map_err(|e| AppError::ApiCall {
            provider: format!("signals JSON: {e}"),
            status: 0,
        })?;
        Ok(Signal {
            overbought: truthy(body.overbought.as_ref()),
            oversold: truthy(body.oversold.as_ref()),
        })
    }
}
