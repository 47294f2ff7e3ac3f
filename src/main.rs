mod cli;
mod config;
mod error;
mod heuristics;
mod llm_extract;
mod message_processor;
mod pricing;
mod rates;
mod weight;

use cli::Command;
use config::{Config, LlmBackend};
use heuristics::ParsedLine;
use llm_extract::LlmParser;
use message_processor::{BoxError, MessageProcessor};
use pricing::PricingEngine;
use rates::{CachedRates, ExchangeRateHost, ExchangeRateResolver, FixedRate};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weight::{StaticWeights, WeightRegistry, WeightResolver};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // init tracing; stdout is reserved for the reply
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Install crypto provider
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    let args = cli::parse_args();
    let cfg = Config::load_or_default(&args.config)?;
    let constants = cfg
        .constants
        .clone()
        .with_env_overrides(|key| std::env::var(key).ok())?;
    info!(config = %args.config.display(), ?constants, "Loaded config");

    let source = cfg.quote.source_currency;
    let target = cfg.quote.target_currency;

    let client = weight::catalog_client()?;
    let weights = WeightRegistry::catalogs(client.clone())
        .with_known(StaticWeights::new(cfg.weights.known.clone()));
    let rates: Box<dyn ExchangeRateResolver> = match cfg.rates.fixed_rate {
        Some(rate) => {
            info!(rate, "Using fixed exchange rate");
            Box::new(FixedRate(rate))
        }
        None => Box::new(CachedRates::new(ExchangeRateHost::new(client.clone(), &cfg.rates))),
    };

    match args.command {
        Command::Quote { input, json } => {
            let text = read_input(input.as_deref()).await?;
            let engine = PricingEngine::new(&constants, &weights, rates.as_ref(), target);
            let processor = MessageProcessor::new(engine).source_currency(source);

            let quotes = match cfg.llm.backend {
                LlmBackend::Heuristics => processor.process_message(&text).await?,
                _ => match LlmParser::new(client, &cfg.llm, &constants, source) {
                    Ok(parser) => processor.process_with(&parser, &text).await?,
                    Err(e) => {
                        warn!(error = %e, "LLM backend unavailable, using heuristics");
                        processor.process_message(&text).await?
                    }
                },
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&quotes)?);
            } else {
                println!("{}", pricing::format_reply(&quotes));
            }
        }
        Command::Parse { input } => {
            let text = read_input(input.as_deref()).await?;
            let lines: Vec<ParsedLine> = heuristics::parse_message(&text, &constants)
                .into_iter()
                .map(|line| ParsedLine {
                    currency: source,
                    ..line
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
        Command::Rate { from, to } => {
            let from = from.unwrap_or(source);
            let to = to.unwrap_or(target);
            let date = rates::today();

            let rate = rates.resolve(from, to, date).await?;
            let effective = rate * (1.0 + constants.currency_conversion_charge);
            println!("{date} {from}->{to}: {rate} ({effective:.4} with conversion charge)");
        }
        Command::Weight { part_number } => {
            let part_number = part_number.trim().to_uppercase();
            let weight = weights.resolve(&part_number).await?;
            println!("{part_number}: {weight:.3} kg");
        }
    }

    Ok(())
}

/// Whole message from a file, or from stdin when no file is given.
async fn read_input(path: Option<&Path>) -> Result<String, std::io::Error> {
    match path {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            use tokio::io::AsyncReadExt;

            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}
