//! Coinbase spot price source

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use oracle_core::SourceResult;

use super::{get_json, parse_price, PriceSource};

pub struct CoinbaseSource {
    client: Client,
    url: String,
}

impl CoinbaseSource {
    pub fn new(client: Client, base_url: &str, product: &str) -> Self {
        Self {
            client,
            url: format!(
                "{}/v2/prices/{}/spot",
                base_url.trim_end_matches('/'),
                product
            ),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Deserialize)]
struct SpotData {
    amount: String,
}

#[async_trait]
impl PriceSource for CoinbaseSource {
    fn name(&self) -> &str {
        "Coinbase"
    }

    async fn fetch_price(&self, cancel: CancellationToken) -> SourceResult<f64> {
        let body: SpotResponse = get_json(&self.client, &self.url, &cancel).await?;
        parse_price(&body.data.amount)
    }
}
