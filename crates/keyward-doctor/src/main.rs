// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keyward doctor
//
// Entry point. Initialises logging, opens a session on the platform key store
// (or the software emulator), prints a JSON capability report and optionally
// runs a self-test of every operation with throwaway keys.

mod selftest;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use keyward_bridge::{SecureKeyBackend, SoftwareBackend, SoftwareProfile};
use keyward_core::config::StoreConfig;
use keyward_core::error::{KeywardError, Result};
use keyward_store::{Capabilities, KeyWrapProtocol, Session};

#[derive(Debug, Parser)]
#[command(name = "keyward-doctor", version, about = "Report what the device key store can do")]
struct Args {
    /// Use the in-memory software emulator instead of the platform key store.
    #[arg(long)]
    software: bool,

    /// Platform version reported by the emulator.
    #[arg(long, default_value_t = 34, requires = "software")]
    platform_version: u32,

    /// Store configuration as a JSON file; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also run every operation once with throwaway keys.
    #[arg(long)]
    self_test: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    platform: String,
    capabilities: Capabilities,
    secure_import: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    self_test: Option<Vec<selftest::Check>>,
}

fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig> {
    match path {
        None => Ok(StoreConfig::default()),
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| {
                KeywardError::InvalidArgument(format!("cannot read {}: {e}", path.display()))
            })?;
            StoreConfig::from_json(&json)
        }
    }
}

fn run(args: &Args) -> Result<Report> {
    let config = load_config(args.config.as_ref())?;
    let backend: Arc<dyn SecureKeyBackend> = if args.software {
        Arc::new(SoftwareBackend::new(SoftwareProfile {
            platform_version: args.platform_version,
            ..SoftwareProfile::default()
        }))
    } else {
        keyward_bridge::platform_backend()
    };

    let session = Session::open(backend, config)?;
    let store = session.store();
    let secure_import = KeyWrapProtocol::new(store).probe_secure_import()?;

    let self_test = args.self_test.then(|| selftest::run(&session));
    Ok(Report {
        platform: store.backend().platform_name().to_owned(),
        capabilities: *store.capabilities(),
        secure_import,
        self_test,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(software = args.software, "keyward doctor starting");

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "key store unavailable");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "report serialization failed");
            return ExitCode::FAILURE;
        }
    }

    let failed = report
        .self_test
        .as_ref()
        .is_some_and(|checks| checks.iter().any(|c| !c.passed));
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
