// src/heuristics/mod.rs

mod quote_line;

use crate::config::Constants;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Aed,
    Rub,
    Usd,
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Aed => "AED",
            Currency::Rub => "RUB",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AED" => Ok(Currency::Aed),
            "RUB" => Ok(Currency::Rub),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            other => Err(format!("unsupported currency '{other}'")),
        }
    }
}

/// One supplier quote line, as understood by the parser.
///
/// `price` and `lead_days` are never missing: a line that says nothing about
/// them carries `0`. Only the part number is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLine {
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_vat")]
    pub vat: bool,
    #[serde(default)]
    pub lead_days: u32,
    #[serde(default)]
    pub currency: Currency,
}

fn default_vat() -> bool {
    true
}

impl Default for ParsedLine {
    fn default() -> Self {
        Self {
            part_number: None,
            price: 0.0,
            vat: true,
            lead_days: 0,
            currency: Currency::default(),
        }
    }
}

/// Parse a single quote line.
///
/// The three stages run in order on whatever text the previous stage left
/// behind. A failing stage logs and falls back to its default; it never stops
/// the stages after it.
pub fn parse_line(raw: &str, constants: &Constants) -> ParsedLine {
    let line = raw.trim().to_lowercase();

    let (part_number, line) = match quote_line::part_number(&line) {
        Ok(found) => found,
        Err(e) => {
            error!(error = %e, "Error parsing part number");
            (None, line)
        }
    };

    let (price, vat, line) = match quote_line::price(&line) {
        Ok(found) => found,
        Err(e) => {
            error!(error = %e, "Error parsing price");
            (0.0, true, line)
        }
    };

    let lead_days = match quote_line::lead_time(&line, constants.back_order_lead_days) {
        Ok((days, _rest)) => days,
        Err(e) => {
            error!(error = %e, "Error parsing lead time");
            0
        }
    };

    let parsed = ParsedLine {
        part_number,
        price,
        vat,
        lead_days,
        ..ParsedLine::default()
    };
    debug!(?parsed, "Parsed input line");
    parsed
}

// \r\n, bare \r, vertical tab, form feed, file/group/record separators, NEL,
// line and paragraph separators
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r\n|[\n\r\x0b\x0c\x1c-\x1e\x{85}\x{2028}\x{2029}]").expect("line break pattern")
});

/// Parse every line of a message. Empty lines are kept, so the output lines
/// up 1:1 with the input.
pub fn parse_message(text: &str, constants: &Constants) -> Vec<ParsedLine> {
    split_lines(text)
        .into_iter()
        .map(|line| parse_line(line, constants))
        .collect()
}

/// Split on every kind of line break. A break at the very end does not start
/// another line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = LINE_BREAK.split(text).collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines
}
