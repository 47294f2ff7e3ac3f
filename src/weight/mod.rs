// src/weight/mod.rs

mod fixparts;
mod ford;

pub use fixparts::Fixparts;
pub use ford::FordPartsGiant;

use crate::error::WeightError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::ElementRef;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";

/// Looks up how much a part weighs, in kilograms.
#[async_trait]
pub trait WeightResolver: Send + Sync {
    async fn resolve(&self, part_number: &str) -> Result<f64, WeightError>;
}

/// HTTP client shared by the catalog scrapers.
pub fn catalog_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
}

/// GET a catalog page and return its body.
async fn fetch_page(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<String, WeightError> {
    let http = |source| WeightError::Http {
        url: url.to_string(),
        source,
    };

    let mut req = client.get(url);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    let resp = req.send().await.map_err(http)?;
    let resp = resp.error_for_status().map_err(http)?;
    resp.text().await.map_err(http)
}

/// Text of the first following sibling `<tag class="class">` of `el`.
fn sibling_text(el: ElementRef<'_>, tag: &str, class: Option<&str>) -> Option<String> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sib| {
            let value = sib.value();
            value.name() == tag && class.is_none_or(|c| value.classes().any(|have| have == c))
        })
        .map(|sib| sib.text().collect::<String>().trim().to_string())
}

/// Weights that are known without asking any catalog.
#[derive(Debug, Default, Clone)]
pub struct StaticWeights {
    weights: HashMap<String, f64>,
}

impl StaticWeights {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }
}

#[async_trait]
impl WeightResolver for StaticWeights {
    async fn resolve(&self, part_number: &str) -> Result<f64, WeightError> {
        self.weights
            .get(part_number)
            .copied()
            .ok_or_else(|| WeightError::NotListed(part_number.to_string()))
    }
}

/// Routes a part number to the resolver registered for its prefix.
///
/// Routes are tried in registration order; the first matching prefix wins.
#[derive(Default, Clone)]
pub struct WeightRegistry {
    known: StaticWeights,
    routes: Vec<(String, Arc<dyn WeightResolver>)>,
}

impl WeightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mercedes parts (`A...`) from fixparts-online, Ford parts (`FR...`, `GR...`)
    /// from fordpartsgiant.
    pub fn catalogs(client: Client) -> Self {
        Self::new()
            .route(&["A"], Fixparts::new(client.clone()))
            .route(&["FR", "GR"], FordPartsGiant::new(client))
    }

    pub fn route<R>(mut self, prefixes: &[&str], resolver: R) -> Self
    where
        R: WeightResolver + 'static,
    {
        let resolver: Arc<dyn WeightResolver> = Arc::new(resolver);
        for prefix in prefixes {
            self.routes.push((prefix.to_string(), Arc::clone(&resolver)));
        }
        self
    }

    /// Weights in this table are answered before any route is consulted.
    pub fn with_known(mut self, known: StaticWeights) -> Self {
        self.known = known;
        self
    }
}

#[async_trait]
impl WeightResolver for WeightRegistry {
    async fn resolve(&self, part_number: &str) -> Result<f64, WeightError> {
        if let Ok(weight) = self.known.resolve(part_number).await {
            debug!(part_number, weight, "Weight from static table");
            return Ok(weight);
        }

        let (prefix, resolver) = self
            .routes
            .iter()
            .find(|(prefix, _)| part_number.starts_with(prefix.as_str()))
            .ok_or_else(|| WeightError::UnsupportedPartNumber(part_number.to_string()))?;

        debug!(part_number, prefix = %prefix, "Routing weight lookup");
        resolver.resolve(part_number).await
    }
}
