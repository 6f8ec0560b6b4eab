//! Kraken ticker price source
//!
//! Uses the last trade price (`c[0]`) of the configured pair.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use oracle_core::{SourceError, SourceResult};

use super::{get_json, parse_price, PriceSource};

pub struct KrakenSource {
    client: Client,
    url: String,
    pair: String,
}

impl KrakenSource {
    pub fn new(client: Client, base_url: &str, pair: &str) -> Self {
        Self {
            client,
            url: format!(
                "{}/0/public/Ticker?pair={}",
                base_url.trim_end_matches('/'),
                pair
            ),
            pair: pair.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn last_trade(&self, body: TickerResponse) -> SourceResult<f64> {
        // Kraken reports API errors with a 200 and a non-empty error list
        if !body.error.is_empty() {
            return Err(SourceError::Malformed(body.error.join("; ")));
        }

        let ticker = body
            .result
            .get(&self.pair)
            .ok_or_else(|| SourceError::Malformed(format!("pair {} missing", self.pair)))?;

        let last = ticker
            .c
            .first()
            .ok_or_else(|| SourceError::Malformed("empty last trade".into()))?;

        parse_price(last)
    }
}

#[derive(Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, Ticker>,
}

#[derive(Deserialize)]
struct Ticker {
    c: Vec<String>,
}

#[async_trait]
impl PriceSource for KrakenSource {
    fn name(&self) -> &str {
        "Kraken"
    }

    async fn fetch_price(&self, cancel: CancellationToken) -> SourceResult<f64> {
        let body: TickerResponse = get_json(&self.client, &self.url, &cancel).await?;
        self.last_trade(body)
    }
}
