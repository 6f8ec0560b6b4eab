//! Price source adapters
//!
//! Every source implements [`PriceSource`]. The aggregation engine treats the
//! configured set as an arbitrary-length list and never cares which concrete
//! exchange sits behind a name.

pub mod coinbase;
pub mod kraken;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use oracle_core::{SourceError, SourceResult, SourcesConfig};

pub use coinbase::CoinbaseSource;
pub use kraken::KrakenSource;

/// Client-level timeout; per-request deadlines set by the engine are tighter
pub const HTTP_FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// A single external price source
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable name used in logs and metric labels; unique per configured set
    fn name(&self) -> &str;

    /// One round-trip for the current price.
    ///
    /// Implementations must return promptly once `cancel` fires. The caller
    /// also enforces its own deadline by dropping the future.
    async fn fetch_price(&self, cancel: CancellationToken) -> SourceResult<f64>;
}

/// Shared HTTP client with connection pooling
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder().timeout(HTTP_FALLBACK_TIMEOUT).build()
}

/// The built-in sources, sharing one client
pub fn default_sources(client: &Client, config: &SourcesConfig) -> Vec<Arc<dyn PriceSource>> {
    vec![
        Arc::new(CoinbaseSource::new(
            client.clone(),
            &config.coinbase_url,
            &config.coinbase_product,
        )),
        Arc::new(KrakenSource::new(
            client.clone(),
            &config.kraken_url,
            &config.kraken_pair,
        )),
    ]
}

/// GET `url` and decode the JSON body, giving up as soon as `cancel` fires
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    cancel: &CancellationToken,
) -> SourceResult<T> {
    let request = async {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        result = request => result,
    }
}

/// Exchanges quote prices as decimal strings
pub(crate) fn parse_price(raw: &str) -> SourceResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| SourceError::Malformed(format!("price {raw:?}: {e}")))
}
