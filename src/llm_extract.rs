// src/llm_extract.rs

use crate::config::{Constants, EndpointConfig, LlmBackend, LlmSection};
use crate::heuristics::{Currency, ParsedLine};
use crate::message_processor::{BoxError, QuoteParser};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

/// Instructions for the model. `{back_order_lead_days}` is filled in from the
/// constants so both parsers agree on back orders.
const SYSTEM_PROMPT: &str = r#"You are an auto parts quote extraction assistant.
Given a supplier's reply to a price request, extract one record per quoted line and return ONLY valid JSON.

The JSON must be an array of objects matching this schema exactly:
[
  {
    "part_number": "string or null",
    "price": number,
    "vat": boolean,
    "lead_days": integer
  }
]

Notes:
- part_number is the leading catalog number of the line, without spaces or punctuation.
- price is the supplier's price as written, before VAT. Use 0 when no price is given.
- vat is false only when the line says the price is without VAT.
- lead_days is the delivery time in days. A week is 7 days, a month is 30 days.
  For a range such as "7-10 days" use the upper bound.
  Use {back_order_lead_days} for "back order" or "no ETA", 0 when absent.
- Keep the lines in the order they appear.
- Return ONLY the JSON array, no markdown fences, no commentary."#;

/// Longest message sent to the model.
const MAX_CHARS: usize = 12_000;

fn system_prompt(constants: &Constants) -> String {
    SYSTEM_PROMPT.replace(
        "{back_order_lead_days}",
        &constants.back_order_lead_days.to_string(),
    )
}

/// Quote extraction through an OpenAI-compatible chat completions endpoint.
pub struct LlmParser {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    prompt: String,
    currency: Currency,
}

impl LlmParser {
    /// Build a parser for the configured backend. `remote` needs `LLM_API_KEY`.
    pub fn new(
        client: Client,
        llm: &LlmSection,
        constants: &Constants,
        currency: Currency,
    ) -> Result<Self, BoxError> {
        let (endpoint, api_key): (&EndpointConfig, String) = match llm.backend {
            // Ollama wants some bearer token but ignores it
            LlmBackend::Ollama => (&llm.ollama, "ollama".to_string()),
            LlmBackend::Remote => (
                &llm.remote,
                std::env::var("LLM_API_KEY")
                    .map_err(|_| "LLM_API_KEY env var required for remote backend")?,
            ),
            LlmBackend::Heuristics => {
                return Err("Heuristics backend selected, no LLM endpoint".into());
            }
        };
        info!(backend = ?llm.backend, url = %endpoint.base_url, model = %endpoint.model, "LLM quote parser");

        Ok(Self {
            client,
            url: format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/')),
            model: endpoint.model.clone(),
            api_key,
            prompt: system_prompt(constants),
            currency,
        })
    }

    async fn complete(&self, text: &str) -> Result<String, BoxError> {
        let request = json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                { "role": "system", "content": self.prompt },
                {
                    "role": "user",
                    "content": format!(
                        "Extract the quote lines from the following supplier message:\n\n{}",
                        truncate_chars(text, MAX_CHARS)
                    ),
                },
            ],
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("LLM API error {status}: {body}").into());
        }

        let body: Value = response.json().await?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or("Empty response from LLM")?;
        Ok(content.to_string())
    }
}

#[async_trait]
impl QuoteParser for LlmParser {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn parse(&self, text: &str) -> Result<Vec<ParsedLine>, BoxError> {
        let content = self.complete(text).await?;
        debug!(model = %self.model, len = content.len(), "LLM response");
        parse_quote_lines(&content, self.currency)
    }
}

/// Decode the model's answer into quote lines stamped with `currency`.
///
/// A negative or non-finite price rejects the whole answer.
fn parse_quote_lines(content: &str, currency: Currency) -> Result<Vec<ParsedLine>, BoxError> {
    let json_str = extract_json_array(content)?;

    let lines: Vec<ParsedLine> = serde_json::from_str(json_str)
        .map_err(|e| format!("Failed to parse LLM response as quote lines: {e}\nRaw: {json_str}"))?;

    if let Some(bad) = lines.iter().find(|l| !l.price.is_finite() || l.price < 0.0) {
        return Err(format!("LLM returned an invalid price {} for {:?}", bad.price, bad.part_number).into());
    }

    Ok(lines
        .into_iter()
        .map(|line| ParsedLine {
            part_number: line
                .part_number
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty()),
            currency,
            ..line
        })
        .collect())
}

/// Outermost JSON array of a reply that may carry markdown fences or
/// reasoning text around it.
fn extract_json_array(s: &str) -> Result<&str, BoxError> {
    let start = s.find('[').ok_or("No '[' found in LLM response")?;
    let end = s.rfind(']').ok_or("No ']' found in LLM response")?;
    if end <= start {
        return Err("Malformed JSON in LLM response".into());
    }
    Ok(&s[start..=end])
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"<think>two lines, first has a range</think>
```json
[
  {"part_number": "a1678853300", "price": 900, "vat": true, "lead_days": 10},
  {"part_number": "", "price": 1000, "vat": false, "lead_days": 30}
]
```"#;

    #[test]
    fn test_extract_json_array() {
        assert_eq!(extract_json_array("ok [1, 2] done").unwrap(), "[1, 2]");
        assert!(extract_json_array("no array here").is_err());
        assert!(extract_json_array("] backwards [").is_err());
    }

    #[test]
    fn test_parse_quote_lines() {
        let lines = parse_quote_lines(RESPONSE, Currency::Aed).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].part_number.as_deref(), Some("A1678853300"));
        assert_eq!(lines[0].price, 900.0);
        assert!(lines[0].vat);
        assert_eq!(lines[0].lead_days, 10);
        assert_eq!(lines[1].part_number, None);
        assert!(!lines[1].vat);
        assert_eq!(lines[1].currency, Currency::Aed);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let lines = parse_quote_lines(r#"[{"price": 12.5}]"#, Currency::Usd).unwrap();
        assert_eq!(lines[0].part_number, None);
        assert!(lines[0].vat);
        assert_eq!(lines[0].lead_days, 0);
        assert_eq!(lines[0].currency, Currency::Usd);
    }

    #[test]
    fn test_garbage_response_is_an_error() {
        assert!(parse_quote_lines("I could not find any prices.", Currency::Aed).is_err());
        assert!(parse_quote_lines(r#"[{"price": "cheap"}]"#, Currency::Aed).is_err());
        assert!(parse_quote_lines(r#"[{"price": 10, "lead_days": -3}]"#, Currency::Aed).is_err());
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let content = r#"[{"part_number": "A1", "price": 100}, {"part_number": "A2", "price": -250}]"#;
        let err = parse_quote_lines(content, Currency::Aed).unwrap_err();
        assert!(err.to_string().contains("-250"));

        assert!(parse_quote_lines(r#"[{"price": 0}]"#, Currency::Aed).is_ok());
    }

    #[test]
    fn test_prompt_uses_back_order_days() {
        let constants = Constants {
            back_order_lead_days: 45,
            ..Constants::default()
        };
        let prompt = system_prompt(&constants);
        assert!(prompt.contains(r#"Use 45 for "back order""#));
        assert!(!prompt.contains("{back_order_lead_days}"));
        assert!(system_prompt(&Constants::default()).contains("Use 90 for"));
    }

    #[test]
    fn test_heuristics_backend_has_no_endpoint() {
        let parser = LlmParser::new(
            Client::new(),
            &LlmSection::default(),
            &Constants::default(),
            Currency::Aed,
        );
        assert!(parser.is_err());
    }

    #[test]
    fn test_ollama_endpoint() {
        let llm = LlmSection {
            backend: LlmBackend::Ollama,
            ..LlmSection::default()
        };
        let parser = LlmParser::new(Client::new(), &llm, &Constants::default(), Currency::Aed).unwrap();
        assert_eq!(parser.url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(parser.model, "qwen3:8b");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("цена 900", 4), "цена");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
