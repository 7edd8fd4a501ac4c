// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use ccapassport::config::Config;
use ccapassport::evidence::TsmProvider;
use ccapassport::nonce::NonceGenerator;
use ccapassport::passport::Attester;
use ccapassport::selfcheck;
use ccapassport::session::CancelToken;
use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version)]
enum CCAPassportCli {
    Verify(VerifyArgs),
    SelfCheck(SelfCheckArgs),
}

#[derive(Debug, clap::Args)]
#[command(long_about = None,
    about = "Obtain an attestation result for this realm from the Veraison \
    service, verify its signature and save it")]
struct VerifyArgs {
    /// Where to write the verified attestation result
    #[arg(short, long, default_value = "ear.jwt")]
    ear: String,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(long_about = None,
    about = "Collect CCA evidence locally, decode it and print the platform \
    instance ID")]
struct SelfCheckArgs {
    /// configfs-tsm report directory
    #[arg(short, long)]
    tsm_root: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let res = match CCAPassportCli::parse() {
        CCAPassportCli::Verify(args) => verify(&args),
        CCAPassportCli::SelfCheck(args) => self_check(&args),
    };

    if let Err(e) = res {
        error!("{e}");
        std::process::exit(1);
    }
}

fn verify(args: &VerifyArgs) -> Result<(), Box<dyn Error>> {
    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let attester = Attester::new(cfg, Arc::new(TsmProvider::new()))?;

    let passport = attester.obtain(&CancelToken::new())?;

    println!("{}", passport.claims());

    passport.save(&args.ear)?;

    Ok(())
}

fn self_check(args: &SelfCheckArgs) -> Result<(), Box<dyn Error>> {
    let provider = match &args.tsm_root {
        Some(root) => TsmProvider::with_root(root),
        None => TsmProvider::new(),
    };

    let e = selfcheck::run(&NonceGenerator::new(), &provider)?;

    info!("Instance ID: {}", e.instance_id());

    Ok(())
}
