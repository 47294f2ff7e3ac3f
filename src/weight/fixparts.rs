// Mercedes weights from the fixparts-online catalog.

use super::{WeightResolver, fetch_page, sibling_text};
use crate::error::WeightError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};
use urlencoding::encode;

const BASE_URL: &str = "https://www.fixparts-online.com";

pub struct Fixparts {
    client: Client,
    base_url: String,
}

impl Fixparts {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    fn catalog_url(&self) -> String {
        format!("{}/en/Catalogs/", self.base_url)
    }

    fn product_url(&self, link: &str) -> String {
        if link.starts_with("http") {
            link.to_string()
        } else {
            format!("{}/{}", self.base_url, link.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl WeightResolver for Fixparts {
    async fn resolve(&self, part_number: &str) -> Result<f64, WeightError> {
        // The search endpoint answers XHR requests with an HTML fragment of result cards.
        let search_url = format!("{}?s={}", self.catalog_url(), encode(part_number));
        let results = fetch_page(
            &self.client,
            &search_url,
            &[
                ("X-Requested-With", "XMLHttpRequest"),
                (
                    "Content-Type",
                    "application/x-www-form-urlencoded; charset=UTF-8",
                ),
            ],
        )
        .await?;

        let link = extract_product_link(&results, part_number)
            .ok_or_else(|| WeightError::NotListed(part_number.to_string()))?;
        debug!(part_number, link = %link, "Found fixparts product page");

        let catalog_url = self.catalog_url();
        let page = fetch_page(
            &self.client,
            &self.product_url(&link),
            &[("referral", catalog_url.as_str())],
        )
        .await?;

        let raw = extract_weight(&page).ok_or_else(|| WeightError::NotListed(part_number.to_string()))?;
        let weight = parse_kilograms(&raw).ok_or_else(|| WeightError::InvalidWeight {
            part_number: part_number.to_string(),
            value: raw.clone(),
        })?;
        info!(part_number, weight, "Fixparts weight");
        Ok(weight)
    }
}

/// Link of the result card whose part number matches exactly.
fn extract_product_link(html: &str, part_number: &str) -> Option<String> {
    let doc = Html::parse_fragment(html);
    let cards = Selector::parse("div.mobile__table").ok()?;
    let link = Selector::parse("a.text-orange").ok()?;

    doc.select(&cards)
        .filter_map(|card| card.select(&link).next())
        .find(|a| {
            a.text()
                .collect::<String>()
                .trim()
                .eq_ignore_ascii_case(part_number)
        })
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
}

/// Raw value next to the "Weight" label on a product page.
fn extract_weight(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let names = Selector::parse("div.name").ok()?;

    let label = doc
        .select(&names)
        .find(|el| el.text().collect::<String>().trim() == "Weight")?;
    sibling_text(label, "div", Some("type"))
}

/// "0.919 kg" -> 0.919
fn parse_kilograms(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches("kg").trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"
        <div class="mobile__table">
            <a class="text-orange" href="/en/parts/a1679063100">A1679063100</a>
        </div>
        <div class="mobile__table">
            <a class="text-orange" href=" /en/parts/a1679063107 "> A1679063107 </a>
        </div>
    "#;

    const PRODUCT: &str = r#"
        <html><body>
            <div class="row">
                <div class="name">Brand</div>
                <div class="type">Mercedes-Benz</div>
            </div>
            <div class="row">
                <div class="name">Weight</div>
                <div class="hint"></div>
                <div class="type">0.919 kg</div>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_product_link() {
        assert_eq!(
            extract_product_link(SEARCH, "a1679063107").as_deref(),
            Some("/en/parts/a1679063107")
        );
        assert!(extract_product_link(SEARCH, "A0000000000").is_none());
    }

    #[test]
    fn test_extract_weight() {
        let raw = extract_weight(PRODUCT).unwrap();
        assert_eq!(raw, "0.919 kg");
        assert_eq!(parse_kilograms(&raw), Some(0.919));
    }

    #[test]
    fn test_weight_missing() {
        assert!(extract_weight("<div class=\"name\">Brand</div>").is_none());
        assert!(parse_kilograms("n/a").is_none());
    }

    #[test]
    fn test_product_url() {
        let fixparts = Fixparts::new(Client::new());
        assert_eq!(
            fixparts.product_url("/en/parts/a1"),
            "https://www.fixparts-online.com/en/parts/a1"
        );
        assert_eq!(
            fixparts.product_url("https://cdn.example/a1"),
            "https://cdn.example/a1"
        );
    }
}
