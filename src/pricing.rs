// src/pricing.rs

use crate::config::Constants;
use crate::error::RateError;
use crate::heuristics::{Currency, ParsedLine};
use crate::rates::{self, ExchangeRateResolver};
use crate::weight::WeightResolver;
use serde::Serialize;
use time::Date;
use tracing::{debug, error};

/// A line ready to be sent back to the customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotedLine {
    pub price: f64,
    pub lead_days: u32,
    pub part_number: Option<String>,
    pub currency: Currency,
    pub weight: f64,
}

impl QuotedLine {
    /// Customer-facing text. Price is rounded to whole units, weight to grams.
    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(4);
        if let Some(part_number) = &self.part_number {
            lines.push(part_number.clone());
        }
        lines.push(format!("Price: {:.0} {}.", self.price, self.currency));
        lines.push(format!("Lead time: {} days.", self.lead_days));
        lines.push(format!("Weight: {:.3} kg.", self.weight));
        lines.join("\n")
    }
}

/// All quotes of one message, separated by a blank line.
pub fn format_reply(quotes: &[QuotedLine]) -> String {
    quotes
        .iter()
        .map(QuotedLine::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Selling price in the target currency.
///
/// VAT goes on before conversion, and price and shipping convert at the same
/// surcharged rate. The margin applies to the direct cost only, not to shipping.
pub fn calc_selling_price(constants: &Constants, price: f64, weight: f64, ex_rate: f64) -> f64 {
    let effective_rate = ex_rate * (1.0 + constants.currency_conversion_charge);
    let direct_cost = price * (1.0 + constants.vat) * effective_rate;
    let profit = direct_cost * constants.profit_margin;
    let shipping_cost = weight * constants.shipping_rate * effective_rate;
    direct_cost + profit + shipping_cost
}

pub struct PricingEngine<'a> {
    constants: &'a Constants,
    weights: &'a dyn WeightResolver,
    rates: &'a dyn ExchangeRateResolver,
    target: Currency,
}

impl<'a> PricingEngine<'a> {
    pub fn new(
        constants: &'a Constants,
        weights: &'a dyn WeightResolver,
        rates: &'a dyn ExchangeRateResolver,
        target: Currency,
    ) -> Self {
        Self {
            constants,
            weights,
            rates,
            target,
        }
    }

    pub fn constants(&self) -> &Constants {
        self.constants
    }

    /// Price one parsed line as of today.
    pub async fn prepare_output(&self, parsed: &ParsedLine) -> Result<QuotedLine, RateError> {
        self.prepare_output_on(parsed, rates::today()).await
    }

    /// Price one parsed line with the rate of `date`.
    ///
    /// A rate failure is returned. A weight failure is logged and the line is
    /// quoted without shipping.
    pub async fn prepare_output_on(
        &self,
        parsed: &ParsedLine,
        date: Date,
    ) -> Result<QuotedLine, RateError> {
        let ex_rate = self.rates.resolve(parsed.currency, self.target, date).await?;

        let mut weight = 0.0;
        if let Some(part_number) = &parsed.part_number {
            match self.weights.resolve(part_number).await {
                Ok(w) => {
                    debug!(part_number = %part_number, weight = w, "Got weight");
                    weight = w;
                }
                Err(e) => {
                    error!(part_number = %part_number, error = %e, "Error getting weight");
                }
            }
        }

        let quoted = QuotedLine {
            price: calc_selling_price(self.constants, parsed.price, weight, ex_rate),
            lead_days: parsed.lead_days.saturating_add(self.constants.shipping_days),
            part_number: parsed.part_number.clone(),
            currency: self.target,
            weight,
        };
        debug!(?quoted, "Prepared output line");
        Ok(quoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::FixedRate;
    use crate::weight::StaticWeights;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn constants() -> Constants {
        Constants {
            vat: 0.05,
            shipping_days: 14,
            profit_margin: 0.2,
            currency_conversion_charge: 0.1,
            back_order_lead_days: 90,
            shipping_rate: 40.0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    struct BrokenRates;

    #[async_trait]
    impl ExchangeRateResolver for BrokenRates {
        async fn resolve(&self, from: Currency, to: Currency, date: Date) -> Result<f64, RateError> {
            Err(RateError::Missing { from, to, date })
        }
    }

    #[test]
    fn test_calc_selling_price() {
        // effective 22, direct 2310, profit 462, shipping 880
        assert_close(calc_selling_price(&constants(), 100.0, 1.0, 20.0), 3652.0);
        assert_close(calc_selling_price(&constants(), 1000.0, 10.0, 20.0), 36520.0);
        assert_close(calc_selling_price(&constants(), 50.0, 0.0, 19.0), 1316.7);
        assert_close(calc_selling_price(&constants(), 0.0, 0.0, 20.0), 0.0);
    }

    #[test]
    fn test_margin_skips_shipping() {
        let mut c = constants();
        let base = calc_selling_price(&c, 0.0, 2.0, 20.0);
        c.profit_margin = 0.5;
        assert_close(calc_selling_price(&c, 0.0, 2.0, 20.0), base);
    }

    #[tokio::test]
    async fn test_prepare_output_without_part_number() {
        let c = constants();
        let weights = StaticWeights::default();
        let rates = FixedRate(20.0);
        let engine = PricingEngine::new(&c, &weights, &rates, Currency::Rub);

        let parsed = ParsedLine {
            price: 100.0,
            lead_days: 1,
            ..ParsedLine::default()
        };
        let out = engine.prepare_output(&parsed).await.unwrap();

        assert_close(out.price, 2772.0);
        assert_eq!(out.lead_days, 15);
        assert_eq!(out.part_number, None);
        assert_eq!(out.currency, Currency::Rub);
        assert_eq!(out.weight, 0.0);
    }

    #[tokio::test]
    async fn test_prepare_output_with_weight() {
        let c = constants();
        let weights = StaticWeights::new(HashMap::from([("A1678853300".to_string(), 10.0)]));
        let rates = FixedRate(20.0);
        let engine = PricingEngine::new(&c, &weights, &rates, Currency::Rub);

        let parsed = ParsedLine {
            part_number: Some("A1678853300".to_string()),
            price: 100.0,
            lead_days: 1,
            ..ParsedLine::default()
        };
        let out = engine.prepare_output(&parsed).await.unwrap();

        assert_close(out.price, 11572.0);
        assert_eq!(out.weight, 10.0);
        assert_eq!(out.part_number.as_deref(), Some("A1678853300"));
    }

    #[tokio::test]
    async fn test_weight_failure_quotes_without_shipping() {
        let c = constants();
        let weights = StaticWeights::default();
        let rates = FixedRate(20.0);
        let engine = PricingEngine::new(&c, &weights, &rates, Currency::Rub);

        let parsed = ParsedLine {
            part_number: Some("XK000".to_string()),
            price: 100.0,
            ..ParsedLine::default()
        };
        let out = engine.prepare_output(&parsed).await.unwrap();

        assert_eq!(out.weight, 0.0);
        assert_close(out.price, 2772.0);
        assert_eq!(out.part_number.as_deref(), Some("XK000"));
    }

    #[tokio::test]
    async fn test_rate_failure_propagates() {
        let c = constants();
        let weights = StaticWeights::default();
        let engine = PricingEngine::new(&c, &weights, &BrokenRates, Currency::Rub);

        let err = engine
            .prepare_output(&ParsedLine::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RateError::Missing { .. }));
    }

    #[test]
    fn test_render() {
        let quote = QuotedLine {
            price: 25828.4,
            lead_days: 24,
            part_number: Some("A1678853300".to_string()),
            currency: Currency::Rub,
            weight: 1.0,
        };
        assert_eq!(
            quote.render(),
            "A1678853300\nPrice: 25828 RUB.\nLead time: 24 days.\nWeight: 1.000 kg."
        );

        let bare = QuotedLine {
            part_number: None,
            weight: 0.0,
            ..quote.clone()
        };
        assert_eq!(
            format_reply(&[quote, bare]),
            "A1678853300\nPrice: 25828 RUB.\nLead time: 24 days.\nWeight: 1.000 kg.\n\n\
             Price: 25828 RUB.\nLead time: 24 days.\nWeight: 0.000 kg."
        );
    }
}
