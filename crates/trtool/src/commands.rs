// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

use crate::{AddArgs, InitArgs, ScInitArgs, VerifyArgs};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use config::AppConfig;
use std::{
    fs,
    path::{Path, PathBuf},
};
use trust_root::{
    new_certificate_authority, new_transparency_log, parse_timestamp, verify_trusted_root,
    CertificateAuthority, EntryKind, RsaPadding, SigningConfig, TrustedRoot,
};
use url::Url;

/// Config values every command needs, resolved once.
#[derive(Debug)]
pub struct Settings {
    pub trusted_root: PathBuf,
    pub padding: RsaPadding,
    pub pretty: bool,
}

impl Settings {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let padding = match config.rsa_padding.as_deref() {
            Some(padding) => padding
                .parse::<RsaPadding>()
                .context("invalid rsa_padding in config")?,
            None => RsaPadding::default(),
        };
        Ok(Self {
            trusted_root: config.trusted_root.clone(),
            padding,
            pretty: config.pretty,
        })
    }
}

fn read_input(path: &Path, flag: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {flag} {}", path.display()))
}

fn write_output(out: Option<&Path>, json: &str) -> Result<()> {
    match out {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write --out {}", path.display()))?;
            let file = path.display().to_string();
            log::info!(file = file.as_str(); "Wrote output");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn check_uri(uri: &str, flag: &str) -> Result<()> {
    Url::parse(uri).with_context(|| format!("invalid {flag} '{uri}'"))?;
    Ok(())
}

fn optional_timestamp(field: &'static str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    Ok(value.map(|v| parse_timestamp(field, v)).transpose()?)
}

fn load_trusted_root(path: &Path) -> Result<TrustedRoot> {
    TrustedRoot::from_json(&read_input(path, "--file")?)
        .with_context(|| format!("failed to parse trusted root {}", path.display()))
}

/// The flags describing one authority passed to `init`.
struct AuthorityFlags<'a> {
    pem: Option<&'a Path>,
    start: Option<&'a str>,
    end: Option<&'a str>,
    uri: Option<&'a str>,
    names: [&'static str; 4],
}

impl AuthorityFlags<'_> {
    fn build(&self) -> Result<Option<CertificateAuthority>> {
        let [pem_flag, start_flag, end_flag, uri_flag] = self.names;
        let Some(pem) = self.pem else {
            if self.start.is_some() || self.end.is_some() || self.uri.is_some() {
                bail!("{start_flag}, {end_flag} and {uri_flag} require {pem_flag}");
            }
            return Ok(None);
        };
        let Some(start) = self.start else {
            bail!("{pem_flag} requires {start_flag}");
        };
        let start = parse_timestamp(start_flag, start)?;
        let end = optional_timestamp(end_flag, self.end)?;
        let uri = self.uri.unwrap_or_default();
        if !uri.is_empty() {
            check_uri(uri, uri_flag)?;
        }

        let ca = new_certificate_authority(&read_input(pem, pem_flag)?, start, end, uri)
            .with_context(|| format!("failed to build authority from {pem_flag} {}", pem.display()))?;
        Ok(Some(ca))
    }
}

fn build_init(args: &InitArgs) -> Result<TrustedRoot> {
    let ca = AuthorityFlags {
        pem: args.ca.as_deref(),
        start: args.ca_start.as_deref(),
        end: args.ca_end.as_deref(),
        uri: args.ca_uri.as_deref(),
        names: ["--ca", "--ca-start", "--ca-end", "--ca-uri"],
    }
    .build()?;
    let tsa = AuthorityFlags {
        pem: args.tsa.as_deref(),
        start: args.tsa_start.as_deref(),
        end: args.tsa_end.as_deref(),
        uri: args.tsa_uri.as_deref(),
        names: ["--tsa", "--tsa-start", "--tsa-end", "--tsa-uri"],
    }
    .build()?;
    Ok(TrustedRoot::init(ca, tsa))
}

pub fn init(args: &InitArgs, settings: &Settings) -> Result<()> {
    let root = build_init(args)?;
    write_output(args.out.as_deref(), &root.to_json(settings.pretty)?)
}

fn add_entry(
    root: &mut TrustedRoot,
    args: &AddArgs,
    padding: RsaPadding,
    now: DateTime<Utc>,
) -> Result<()> {
    check_uri(&args.uri, "--uri")?;
    let pem = read_input(&args.pem, "--pem")?;
    let start = match args.start.as_deref() {
        Some(start) => parse_timestamp("--start", start)?,
        None => now,
    };
    let end = optional_timestamp("--end", args.end.as_deref())?;
    let prev_end = optional_timestamp("--prev-end", args.prev_end.as_deref())?;
    let context = || format!("failed to build {} from --pem {}", args.kind, args.pem.display());

    let added = match args.kind {
        EntryKind::Authority(kind) => {
            let entry = new_certificate_authority(&pem, start, end, &args.uri)
                .with_context(context)?;
            root.add_authority(kind, entry, prev_end)
        }
        EntryKind::Log(kind) => {
            let padding = args.padding.unwrap_or(padding);
            let entry = new_transparency_log(&pem, start, end, &args.uri, padding)
                .with_context(context)?;
            root.add_log(kind, entry, prev_end)
        }
    };
    added.with_context(|| format!("failed to add {} {}", args.kind, args.uri))
}

pub fn add(args: &AddArgs, settings: &Settings) -> Result<()> {
    let path = args.file.as_deref().unwrap_or(&settings.trusted_root);
    let mut root = load_trusted_root(path)?;
    add_entry(&mut root, args, settings.padding, Utc::now())?;
    write_output(args.out.as_deref(), &root.to_json(settings.pretty)?)
}

/// Prints every finding. Returns whether the trusted root is valid.
pub fn verify(args: &VerifyArgs, settings: &Settings) -> Result<bool> {
    let path = args.file.as_deref().unwrap_or(&settings.trusted_root);
    let root = load_trusted_root(path)?;
    let report = verify_trusted_root(&root)
        .with_context(|| format!("failed to verify trusted root {}", path.display()))?;

    for finding in &report.findings {
        println!("{finding}");
    }
    let valid = report.is_valid();
    println!(
        "{}: {} is {}, {} failure(s), {} warning(s)",
        if valid { "OK" } else { "FAIL" },
        path.display(),
        if valid { "valid" } else { "invalid" },
        report.failures().count(),
        report.warnings().count()
    );
    Ok(valid)
}

fn build_signing_config(args: &ScInitArgs) -> Result<SigningConfig> {
    for url in args.ca.iter().chain(&args.op) {
        check_uri(url, "URL")?;
    }
    for url in args.tlog.iter().chain(&args.tsa) {
        check_uri(url, "URL")?;
    }
    Ok(SigningConfig::new(
        args.ca.clone().unwrap_or_default(),
        args.op.clone().unwrap_or_default(),
        args.tlog.clone(),
        args.tsa.clone(),
    ))
}

pub fn sc_init(args: &ScInitArgs, settings: &Settings) -> Result<()> {
    let config = build_signing_config(args)?;
    write_output(args.out.as_deref(), &config.to_json(settings.pretty)?)
}
