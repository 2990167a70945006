// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! `trtool` builds, extends and audits sigstore trusted root manifests.

mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use std::{path::PathBuf, process::ExitCode};
use trust_root::{EntryKind, RsaPadding};

/// Build and audit sigstore trusted root manifests.
///
/// Timestamps are RFC 3339, for example 2025-01-01T00:00:00Z.
#[derive(Parser, Debug)]
#[command(name = "trtool", version, about, long_about = None)]
pub struct Cli {
    /// JSON config file
    #[arg(short, long, env = "TRTOOL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a trusted root, optionally seeded with a CA and a TSA
    Init(InitArgs),

    /// Append a CA, TSA, transparency log or CT log to a trusted root
    Add(AddArgs),

    /// Check every entry of a trusted root and report all findings
    Verify(VerifyArgs),

    /// Create a signing config
    #[command(name = "sc-init")]
    ScInit(ScInitArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// PEM bundle with the certificate authority chain
    #[arg(long)]
    pub ca: Option<PathBuf>,

    /// Start of the CA validity window
    #[arg(long)]
    pub ca_start: Option<String>,

    /// End of the CA validity window
    #[arg(long)]
    pub ca_end: Option<String>,

    /// CA URI
    #[arg(long)]
    pub ca_uri: Option<String>,

    /// PEM bundle with the timestamping authority chain
    #[arg(long)]
    pub tsa: Option<PathBuf>,

    /// Start of the TSA validity window
    #[arg(long)]
    pub tsa_start: Option<String>,

    /// End of the TSA validity window
    #[arg(long)]
    pub tsa_end: Option<String>,

    /// TSA URI
    #[arg(long)]
    pub tsa_uri: Option<String>,

    /// Output file, stdout if absent
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Trusted root to extend, defaults to the configured trusted root
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Entry type: ca, tsa, tlog or ctlog
    #[arg(short = 't', long = "type")]
    pub kind: EntryKind,

    /// Authority URI or log base URL
    #[arg(long)]
    pub uri: String,

    /// PEM bundle for ca/tsa, PEM public key for tlog/ctlog
    #[arg(long)]
    pub pem: PathBuf,

    /// Start of the validity window, defaults to now
    #[arg(long)]
    pub start: Option<String>,

    /// End of the validity window
    #[arg(long)]
    pub end: Option<String>,

    /// RSA signature padding for log keys: pkcs1v15 or pss
    #[arg(long)]
    pub padding: Option<RsaPadding>,

    /// End for the previous entry, defaults to the new entry's start
    #[arg(long)]
    pub prev_end: Option<String>,

    /// Output file, stdout if absent
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Trusted root to verify, defaults to the configured trusted root
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScInitArgs {
    /// Certificate authority URL
    #[arg(long)]
    pub ca: Option<String>,

    /// OIDC provider URL
    #[arg(long)]
    pub op: Option<String>,

    /// Transparency log URLs
    #[arg(long, value_delimiter = ',')]
    pub tlog: Vec<String>,

    /// Timestamping authority URLs
    #[arg(long, value_delimiter = ',')]
    pub tsa: Vec<String>,

    /// Output file, stdout if absent
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command. Returns `false` if a verified trusted root is
/// invalid.
fn run(cli: &Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load --config {}", path.display()))?,
        None => AppConfig::default(),
    };
    logging::init(if cli.verbose {
        Some("debug")
    } else {
        config.logging_level.as_deref()
    });
    let settings = commands::Settings::new(&config)?;

    match &cli.command {
        Command::Init(args) => commands::init(args, &settings)?,
        Command::Add(args) => commands::add(args, &settings)?,
        Command::Verify(args) => return commands::verify(args, &settings),
        Command::ScInit(args) => commands::sc_init(args, &settings)?,
    }
    Ok(true)
}
