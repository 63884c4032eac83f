use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::models::PriceSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Anything that can hand the pipeline a fresh price snapshot.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FetchError>;

    fn name(&self) -> &str;
}

/// Client for the CoinGecko `simple/price` endpoint.
///
/// One call asks for every configured asset in every configured quote currency.
/// No retries happen here; callers wrap the source if they want them.
pub struct CoinGeckoClient {
    client: Client,
    api_url: String,
    ids: String,
    vs_currencies: String,
    timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Network)?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            ids: config.assets.join(","),
            vs_currencies: config.currencies.join(","),
            timeout: config.timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FetchError> {
        debug!(
            "Calling price API: {} (ids={}, vs_currencies={})",
            self.api_url, self.ids, self.vs_currencies
        );

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("ids", self.ids.as_str()), ("vs_currencies", self.vs_currencies.as_str())])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let snapshot: PriceSnapshot =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;

        info!(
            "Fetched {} prices for {} assets from {}",
            snapshot.pair_count(),
            snapshot.0.len(),
            self.name()
        );
        Ok(snapshot)
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
