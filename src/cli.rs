// src/cli.rs

use crate::heuristics::Currency;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Re-quote supplier auto parts offers
#[derive(Parser, Debug)]
#[command(name = "parts_quote")]
#[command(about = "Parse supplier quotes and price them for resale", long_about = None)]
pub struct CliArgs {
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = ".config/parts_quote.toml",
        help = "TOML config file; defaults apply when it does not exist"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and price a supplier message
    Quote {
        #[arg(value_name = "FILE", help = "Message file; stdin when omitted")]
        input: Option<PathBuf>,

        #[arg(long, help = "Print quoted lines as JSON instead of the reply text")]
        json: bool,
    },
    /// Parse a supplier message without pricing it
    Parse {
        #[arg(value_name = "FILE", help = "Message file; stdin when omitted")]
        input: Option<PathBuf>,
    },
    /// Show today's exchange rate, surcharge included
    Rate {
        #[arg(long, value_name = "CURRENCY", help = "Defaults to the configured source currency")]
        from: Option<Currency>,

        #[arg(long, value_name = "CURRENCY", help = "Defaults to the configured target currency")]
        to: Option<Currency>,
    },
    /// Look up the shipping weight of one part
    Weight {
        #[arg(value_name = "PART")]
        part_number: String,
    },
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
