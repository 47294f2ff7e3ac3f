use crate::error::ConfigError;
use crate::heuristics::Currency;
use serde::Deserialize;
use std::collections::HashMap;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub constants: Constants,
    #[serde(default)]
    pub quote: QuoteSection,
    #[serde(default)]
    pub rates: RatesSection,
    #[serde(default)]
    pub weights: WeightsSection,
    #[serde(default)]
    pub llm: LlmSection,
}

/// Numbers the pricing and lead-time rules are built on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Constants {
    pub vat: f64,
    pub shipping_days: u32,
    pub profit_margin: f64,
    pub currency_conversion_charge: f64,
    pub back_order_lead_days: u32,
    /// Air shipping cost per kilogram, in the supplier currency.
    pub shipping_rate: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            vat: 0.05,
            shipping_days: 14,
            profit_margin: 0.2,
            currency_conversion_charge: 0.1,
            back_order_lead_days: 90,
            shipping_rate: 40.0,
        }
    }
}

impl Constants {
    /// Apply environment overrides on top of the file values.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, "AED_VAT", &mut self.vat)?;
        override_from(&lookup, "RU_SHIPPING_DAYS", &mut self.shipping_days)?;
        override_from(&lookup, "PROFIT_MARGIN", &mut self.profit_margin)?;
        override_from(
            &lookup,
            "CURRENCY_CONVERSION_CHARGE",
            &mut self.currency_conversion_charge,
        )?;
        override_from(&lookup, "BACK_ORDER_LEAD_DAYS", &mut self.back_order_lead_days)?;
        override_from(&lookup, "SHIPPING_RATE_AED", &mut self.shipping_rate)?;
        Ok(self)
    }
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteSection {
    pub source_currency: Currency,
    pub target_currency: Currency,
}

impl Default for QuoteSection {
    fn default() -> Self {
        Self {
            source_currency: Currency::Aed,
            target_currency: Currency::Rub,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatesSection {
    pub base_url: String,
    pub access_key: Option<String>,
    /// Skip the HTTP lookup and quote with this rate.
    pub fixed_rate: Option<f64>,
}

impl Default for RatesSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.exchangerate.host".to_string(),
            access_key: None,
            fixed_rate: None,
        }
    }
}

/// Part weights known up front, in kilograms. Checked before any catalog site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeightsSection {
    #[serde(default)]
    pub known: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    #[default]
    Heuristics,
    Ollama,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub backend: LlmBackend,
    #[serde(default = "default_ollama")]
    pub ollama: EndpointConfig,
    #[serde(default = "default_remote")]
    pub remote: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            ollama: default_ollama(),
            remote: default_remote(),
        }
    }
}

fn default_ollama() -> EndpointConfig {
    EndpointConfig {
        base_url: "http://localhost:11434/v1".to_string(),
        model: "qwen3:8b".to_string(),
    }
}

fn default_remote() -> EndpointConfig {
    EndpointConfig {
        base_url: "https://api.openai.com/v1".to_string(),
        model: "gpt-4o-mini".to_string(),
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
