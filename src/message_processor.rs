use crate::error::RateError;
use crate::heuristics::{self, Currency, ParsedLine};
use crate::pricing::{PricingEngine, QuotedLine};
use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{Instrument, info, info_span, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Turns a supplier message into parsed quote lines.
#[async_trait]
pub trait QuoteParser: Send + Sync {
    fn name(&self) -> &'static str;

    async fn parse(&self, text: &str) -> Result<Vec<ParsedLine>, BoxError>;
}

pub struct MessageProcessor<'a> {
    engine: PricingEngine<'a>,
    source: Currency,
}

impl<'a> MessageProcessor<'a> {
    pub fn new(engine: PricingEngine<'a>) -> Self {
        Self {
            engine,
            source: Currency::default(),
        }
    }

    /// Currency the supplier quotes in. Heuristic lines carry no currency of
    /// their own, so they are stamped with this one.
    pub fn source_currency(mut self, currency: Currency) -> Self {
        self.source = currency;
        self
    }

    fn heuristic_lines(&self, text: &str) -> Vec<ParsedLine> {
        heuristics::parse_message(text, self.engine.constants())
            .into_iter()
            .map(|line| ParsedLine {
                currency: self.source,
                ..line
            })
            .collect()
    }

    /// Parse every line with the heuristics and price it.
    ///
    /// One output per input line, in input order. Fails only when the
    /// exchange rate cannot be resolved.
    pub async fn process_message(&self, text: &str) -> Result<Vec<QuotedLine>, RateError> {
        let parsed = self.heuristic_lines(text);
        self.quote_lines(&parsed).await
    }

    /// Like [`process_message`](Self::process_message), with extraction done by
    /// `parser`. If the parser fails the heuristics take over.
    pub async fn process_with(
        &self,
        parser: &dyn QuoteParser,
        text: &str,
    ) -> Result<Vec<QuotedLine>, RateError> {
        let parsed = match parser.parse(text).await {
            Ok(lines) => {
                info!(parser = parser.name(), lines = lines.len(), "Quote extracted");
                lines
            }
            Err(e) => {
                warn!(parser = parser.name(), error = %e, "Extraction failed, falling back to heuristics");
                self.heuristic_lines(text)
            }
        };
        self.quote_lines(&parsed).await
    }

    /// Price already-parsed lines. Lines are priced concurrently; the output
    /// keeps their order.
    pub async fn quote_lines(&self, parsed: &[ParsedLine]) -> Result<Vec<QuotedLine>, RateError> {
        let quotes = try_join_all(parsed.iter().enumerate().map(|(idx, line)| {
            let span = info_span!("quote_line", idx, part_number = ?line.part_number);
            self.engine.prepare_output(line).instrument(span)
        }))
        .await?;

        info!(lines = quotes.len(), "Message quoted");
        Ok(quotes)
    }
}
