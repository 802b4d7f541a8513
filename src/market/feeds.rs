//! Per-venue quote sources and the ingestion loops that feed the price cache.
//!
//! Each venue exposes a public HTTP endpoint with its own response shape; a
//! `QuoteSource` normalizes that shape into `VenueQuote`s. One ingestion task
//! runs per venue and writes into the shared cache on its own timer.

use super::{PriceCache, Venue, VenueQuote};
use crate::error::Result;
use crate::utils::{mint_for_symbol, symbol_for_mint};
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Wait before re-polling a venue whose fetch failed.
const VENUE_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn venue(&self) -> Venue;

    /// Fetch and normalize the venue's current quotes. Network-bound; the
    /// ingestion loop treats any error as a NetworkError and backs off.
    async fn fetch_quotes(&self) -> Result<Vec<VenueQuote>>;
}

/// Polls one venue until the running flag clears. Errors are logged and the
/// task backs off rather than aborting, so one flaky venue cannot take down
/// ingestion for the others.
pub async fn run_ingestion_loop(
    source: Arc<dyn QuoteSource>,
    cache: Arc<PriceCache>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    let venue = source.venue();
    info!("Starting quote ingestion for venue '{}'", venue);
    while running.load(Ordering::Relaxed) {
        match source.fetch_quotes().await {
            Ok(quotes) => {
                let count = quotes.len();
                for quote in quotes {
                    cache.upsert(quote);
                }
                log::debug!("Venue '{}' published {} quotes", venue, count);
                sleep(poll_interval).await;
            }
            Err(e) => {
                warn!("Quote fetch for venue '{}' failed: {}", venue, e);
                sleep(VENUE_FAILURE_BACKOFF).await;
            }
        }
    }
    info!("Quote ingestion for venue '{}' stopped", venue);
}

// === Raydium ===

#[derive(Debug, Deserialize)]
pub struct RaydiumPoolsResponse {
    #[serde(default)]
    pub official: Vec<RaydiumApiPool>,
}

#[derive(Debug, Deserialize)]
pub struct RaydiumApiPool {
    #[serde(rename = "baseMint")]
    pub base_mint: String,
    #[serde(rename = "quoteMint")]
    pub quote_mint: String,
    #[serde(rename = "baseReserve", default)]
    pub base_reserve: f64,
    #[serde(rename = "quoteReserve", default)]
    pub quote_reserve: f64,
    #[serde(rename = "volume24h", default)]
    pub volume_24h: f64,
}

pub struct RaydiumSource {
    http: reqwest::Client,
    pools_url: String,
}

impl RaydiumSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            pools_url: "https://api.raydium.io/v2/sdk/liquidity/mainnet.json".to_string(),
        }
    }

    fn normalize(response: RaydiumPoolsResponse) -> Vec<VenueQuote> {
        let now = Utc::now();
        response
            .official
            .into_iter()
            .filter_map(|pool| {
                let base = Pubkey::from_str(&pool.base_mint).ok()?;
                let quote = Pubkey::from_str(&pool.quote_mint).ok()?;
                let base_symbol = symbol_for_mint(&base)?;
                let quote_symbol = symbol_for_mint(&quote)?;
                if pool.base_reserve <= 0.0 || pool.quote_reserve <= 0.0 {
                    return None;
                }
                Some(VenueQuote {
                    venue: Venue::Raydium,
                    pair: format!("{}/{}", base_symbol, quote_symbol),
                    price: pool.quote_reserve / pool.base_reserve,
                    volume_24h: pool.volume_24h,
                    liquidity: pool.quote_reserve,
                    spread_fraction: 0.003, // Raydium's standard pool fee tier
                    observed_at: now,
                })
            })
            .collect()
    }
}

#[async_trait]
impl QuoteSource for RaydiumSource {
    fn venue(&self) -> Venue {
        Venue::Raydium
    }

    async fn fetch_quotes(&self) -> Result<Vec<VenueQuote>> {
        let response: RaydiumPoolsResponse =
            self.http.get(&self.pools_url).send().await?.json().await?;
        Ok(Self::normalize(response))
    }
}

// === Orca ===

#[derive(Debug, Deserialize)]
pub struct OrcaPoolsResponse {
    #[serde(default)]
    pub whirlpools: Vec<OrcaApiPool>,
}

#[derive(Debug, Deserialize)]
pub struct OrcaApiPool {
    #[serde(rename = "tokenA")]
    pub token_a: OrcaApiToken,
    #[serde(rename = "tokenB")]
    pub token_b: OrcaApiToken,
    #[serde(default)]
    pub liquidity: OrcaApiLiquidity,
    #[serde(rename = "feeRate", default = "default_orca_fee_rate")]
    pub fee_rate: f64,
    #[serde(rename = "volume24h", default)]
    pub volume_24h: f64,
}

fn default_orca_fee_rate() -> f64 {
    0.003
}

#[derive(Debug, Deserialize)]
pub struct OrcaApiToken {
    pub mint: String,
    pub symbol: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrcaApiLiquidity {
    #[serde(rename = "tokenA", default)]
    pub token_a: f64,
    #[serde(rename = "tokenB", default)]
    pub token_b: f64,
}

pub struct OrcaSource {
    http: reqwest::Client,
    pools_url: String,
}

impl OrcaSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            pools_url: "https://api.orca.so/v1/whirlpool/list".to_string(),
        }
    }

    fn normalize(response: OrcaPoolsResponse) -> Vec<VenueQuote> {
        let now = Utc::now();
        response
            .whirlpools
            .into_iter()
            .filter_map(|pool| {
                if pool.liquidity.token_a <= 0.0 || pool.liquidity.token_b <= 0.0 {
                    return None;
                }
                Some(VenueQuote {
                    venue: Venue::Orca,
                    pair: format!("{}/{}", pool.token_a.symbol, pool.token_b.symbol),
                    price: pool.liquidity.token_b / pool.liquidity.token_a,
                    volume_24h: pool.volume_24h,
                    liquidity: pool.liquidity.token_b,
                    spread_fraction: pool.fee_rate,
                    observed_at: now,
                })
            })
            .collect()
    }
}

#[async_trait]
impl QuoteSource for OrcaSource {
    fn venue(&self) -> Venue {
        Venue::Orca
    }

    async fn fetch_quotes(&self) -> Result<Vec<VenueQuote>> {
        let response: OrcaPoolsResponse =
            self.http.get(&self.pools_url).send().await?.json().await?;
        Ok(Self::normalize(response))
    }
}

// === Jupiter ===

#[derive(Debug, Deserialize)]
pub struct JupiterPriceResponse {
    #[serde(default)]
    pub data: std::collections::HashMap<String, JupiterPriceEntry>,
}

#[derive(Debug, Deserialize)]
pub struct JupiterPriceEntry {
    pub price: f64,
}

pub struct JupiterSource {
    http: reqwest::Client,
    price_url: String,
    pairs: Vec<(String, String)>,
}

impl JupiterSource {
    /// Jupiter is an aggregator quoting pairwise prices; it reports neither
    /// volume nor liquidity, so those fields stay zero and such quotes never
    /// dominate the liquidity-capped volume math.
    pub fn new(http: reqwest::Client, pairs: Vec<(String, String)>) -> Self {
        Self {
            http,
            price_url: "https://price.jup.ag/v4/price".to_string(),
            pairs,
        }
    }
}

#[async_trait]
impl QuoteSource for JupiterSource {
    fn venue(&self) -> Venue {
        Venue::Jupiter
    }

    async fn fetch_quotes(&self) -> Result<Vec<VenueQuote>> {
        let mut quotes = Vec::new();
        for (base, quote_symbol) in &self.pairs {
            let (base_mint, quote_mint) = match (mint_for_symbol(base), mint_for_symbol(quote_symbol)) {
                (Some(b), Some(q)) => (b, q),
                _ => continue,
            };
            let response: JupiterPriceResponse = self
                .http
                .get(&self.price_url)
                .query(&[
                    ("ids", base_mint.to_string()),
                    ("vsToken", quote_mint.to_string()),
                ])
                .send()
                .await?
                .json()
                .await?;
            if let Some(entry) = response.data.get(&base_mint.to_string()) {
                if entry.price > 0.0 {
                    quotes.push(VenueQuote {
                        venue: Venue::Jupiter,
                        pair: format!("{}/{}", base, quote_symbol),
                        price: entry.price,
                        volume_24h: 0.0,
                        liquidity: 0.0,
                        spread_fraction: 0.001,
                        observed_at: Utc::now(),
                    });
                }
            }
        }
        Ok(quotes)
    }
}

// === Saber ===

#[derive(Debug, Deserialize)]
pub struct SaberPoolsResponse {
    #[serde(default)]
    pub pools: Vec<SaberApiPool>,
}

#[derive(Debug, Deserialize)]
pub struct SaberApiPool {
    #[serde(default)]
    pub tokens: Vec<SaberApiToken>,
    #[serde(default)]
    pub reserves: std::collections::HashMap<String, f64>,
    #[serde(rename = "volume24h", default)]
    pub volume_24h: f64,
}

#[derive(Debug, Deserialize)]
pub struct SaberApiToken {
    pub symbol: String,
    pub mint: String,
}

pub struct SaberSource {
    http: reqwest::Client,
    registry_url: String,
}

impl SaberSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            registry_url: "https://registry.saber.so/data/llama.mainnet.json".to_string(),
        }
    }

    fn normalize(response: SaberPoolsResponse) -> Vec<VenueQuote> {
        let now = Utc::now();
        response
            .pools
            .into_iter()
            .filter_map(|pool| {
                let token_a = pool.tokens.first()?;
                let token_b = pool.tokens.get(1)?;
                let reserve_a = *pool.reserves.get(&token_a.mint)?;
                let reserve_b = *pool.reserves.get(&token_b.mint)?;
                if reserve_a <= 0.0 || reserve_b <= 0.0 {
                    return None;
                }
                Some(VenueQuote {
                    venue: Venue::Saber,
                    pair: format!("{}/{}", token_a.symbol, token_b.symbol),
                    price: reserve_b / reserve_a,
                    volume_24h: pool.volume_24h,
                    liquidity: reserve_b,
                    spread_fraction: 0.0025, // Saber's stable-swap fee tier
                    observed_at: now,
                })
            })
            .collect()
    }
}

#[async_trait]
impl QuoteSource for SaberSource {
    fn venue(&self) -> Venue {
        Venue::Saber
    }

    async fn fetch_quotes(&self) -> Result<Vec<VenueQuote>> {
        let response: SaberPoolsResponse = self
            .http
            .get(&self.registry_url)
            .send()
            .await?
            .json()
            .await?;
        Ok(Self::normalize(response))
    }
}

/// Default source set for the supported venues.
pub fn default_sources() -> Vec<Arc<dyn QuoteSource>> {
    let http = reqwest::Client::new();
    let jupiter_pairs = vec![
        ("SOL".to_string(), "USDC".to_string()),
        ("RAY".to_string(), "USDC".to_string()),
        ("ORCA".to_string(), "USDC".to_string()),
    ];
    vec![
        Arc::new(RaydiumSource::new(http.clone())) as Arc<dyn QuoteSource>,
        Arc::new(OrcaSource::new(http.clone())),
        Arc::new(JupiterSource::new(http.clone(), jupiter_pairs)),
        Arc::new(SaberSource::new(http)),
    ]
}
