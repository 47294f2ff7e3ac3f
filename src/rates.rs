// src/rates.rs

use crate::config::RatesSection;
use crate::error::RateError;
use crate::heuristics::Currency;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use time::{Date, OffsetDateTime};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use urlencoding::encode;

/// Multiplicative rate: `amount_in_to = amount_in_from * rate`.
#[async_trait]
pub trait ExchangeRateResolver: Send + Sync {
    async fn resolve(&self, from: Currency, to: Currency, date: Date) -> Result<f64, RateError>;
}

/// Today's date in UTC, the key used for rate lookups.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Daily rates from the exchangerate.host timeseries endpoint.
pub struct ExchangeRateHost {
    client: Client,
    base_url: String,
    access_key: Option<String>,
}

impl ExchangeRateHost {
    pub fn new(client: Client, cfg: &RatesSection) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            access_key: cfg.access_key.clone(),
        }
    }

    fn timeseries_url(&self, from: Currency, to: Currency, date: Date) -> String {
        let mut url = format!(
            "{}/timeseries?base={from}&symbols={to}&start_date={date}&end_date={date}",
            self.base_url
        );
        if let Some(key) = &self.access_key {
            url.push_str(&format!("&access_key={}", encode(key)));
        }
        url
    }
}

#[async_trait]
impl ExchangeRateResolver for ExchangeRateHost {
    async fn resolve(&self, from: Currency, to: Currency, date: Date) -> Result<f64, RateError> {
        let url = self.timeseries_url(from, to, date);
        let http = |source| RateError::Http {
            url: url.clone(),
            source,
        };

        let resp = self.client.get(&url).send().await.map_err(http)?;
        let body: serde_json::Value = resp
            .error_for_status()
            .map_err(http)?
            .json()
            .await
            .map_err(http)?;

        let rate = rate_from_timeseries(&body, to, date).ok_or(RateError::Missing { from, to, date })?;
        info!(%from, %to, %date, rate, "Exchange rate");
        Ok(rate)
    }
}

/// `{"rates": {"2021-01-01": {"RUB": 20.0}}}` -> 20.0
fn rate_from_timeseries(body: &serde_json::Value, to: Currency, date: Date) -> Option<f64> {
    body.get("rates")?
        .get(date.to_string())?
        .get(to.code())?
        .as_f64()
}

/// Always answers with the same rate. Used when the config pins a rate.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub f64);

#[async_trait]
impl ExchangeRateResolver for FixedRate {
    async fn resolve(&self, _from: Currency, _to: Currency, _date: Date) -> Result<f64, RateError> {
        Ok(self.0)
    }
}

/// Remembers every rate it has seen, keyed by pair and date.
///
/// Concurrent requests for the same key share one lookup: the first caller
/// runs it, the others wait on the same cell. A failed lookup leaves the cell
/// empty so the next caller retries.
pub struct CachedRates<R> {
    inner: R,
    seen: Mutex<HashMap<(Currency, Currency, Date), Arc<OnceCell<f64>>>>,
}

impl<R> CachedRates<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: (Currency, Currency, Date)) -> Arc<OnceCell<f64>> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(seen.entry(key).or_default())
    }
}

#[async_trait]
impl<R: ExchangeRateResolver> ExchangeRateResolver for CachedRates<R> {
    async fn resolve(&self, from: Currency, to: Currency, date: Date) -> Result<f64, RateError> {
        let cell = self.cell((from, to, date));
        if let Some(rate) = cell.get() {
            debug!(%from, %to, %date, rate, "Exchange rate from cache");
            return Ok(*rate);
        }

        let rate = cell
            .get_or_try_init(|| self.inner.resolve(from, to, date))
            .await?;
        Ok(*rate)
    }
}
