// Ford weights from fordpartsgiant.com. The site lists weights in pounds.

use super::{WeightResolver, fetch_page, sibling_text};
use crate::error::WeightError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::info;
use urlencoding::encode;

const BASE_URL: &str = "https://www.fordpartsgiant.com";
const KG_PER_POUND: f64 = 0.45359237;

pub struct FordPartsGiant {
    client: Client,
}

impl FordPartsGiant {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WeightResolver for FordPartsGiant {
    async fn resolve(&self, part_number: &str) -> Result<f64, WeightError> {
        let url = format!("{BASE_URL}/parts/{}.html", encode(part_number));
        let page = fetch_page(&self.client, &url, &[]).await?;

        let raw = extract_item_weight(&page)
            .ok_or_else(|| WeightError::NotListed(part_number.to_string()))?;
        let pounds = parse_pounds(&raw).ok_or_else(|| WeightError::InvalidWeight {
            part_number: part_number.to_string(),
            value: raw.clone(),
        })?;

        let weight = pounds * KG_PER_POUND;
        info!(part_number, pounds, weight, "Ford weight");
        Ok(weight)
    }
}

/// Cell after the "Item Weight" label in the product details table.
fn extract_item_weight(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let cells = Selector::parse("td").ok()?;

    let label = doc
        .select(&cells)
        .find(|td| td.text().collect::<String>().trim() == "Item Weight")?;
    sibling_text(label, "td", None)
}

/// "7.95 Pounds" -> 7.95
fn parse_pounds(raw: &str) -> Option<f64> {
    raw.trim()
        .to_lowercase()
        .trim_end_matches("pounds")
        .trim_end_matches("pound")
        .trim()
        .parse()
        .ok()
}
