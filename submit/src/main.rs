mod config;
mod job;
mod platform;
mod wallet;

use crate::{
    config::SubmitConfig,
    job::JobSpec,
    platform::{JobEvent, PlatformClient},
    wallet::Keystore,
};
use clap::Parser;
use serde_json::Value;
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sigsearch-submit",
    about = "Submits the probeset-signature sweep to the compute platform"
)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data server base URL
    #[arg(long)]
    server_url: Option<String>,

    /// Override the platform scheduler URL
    #[arg(long)]
    scheduler_url: Option<String>,

    /// Number of signatures to try
    #[arg(short, long)]
    n_signatures: Option<u32>,

    /// Minimum signature length
    #[arg(long)]
    min_sig_length: Option<u32>,

    /// Maximum signature length
    #[arg(long)]
    max_sig_length: Option<u32>,

    /// Sweep seed
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut SubmitConfig) {
        if let Some(ref url) = self.server_url {
            config.server.base_url = url.clone();
        }
        if let Some(ref url) = self.scheduler_url {
            config.platform.scheduler_url = url.clone();
        }
        if let Some(n) = self.n_signatures {
            config.sweep.n_signatures = n;
        }
        if let Some(min) = self.min_sig_length {
            config.sweep.min_sig_length = min;
        }
        if let Some(max) = self.max_sig_length {
            config.sweep.max_sig_length = max;
        }
        if let Some(seed) = self.seed {
            config.sweep.seed = seed;
        }
    }
}

fn print_event(event: &JobEvent, job_id: &str) {
    match event {
        JobEvent::ReadyStateChange { state } => println!("State: {state}"),
        JobEvent::Accepted => {
            println!("  Job ID: {job_id}");
            println!("  Job accepted, awaiting results...");
        }
        JobEvent::Result { slice, value } => {
            // string results print verbatim, anything else as JSON
            match value {
                Value::String(result) => println!("    ✔ Slice {slice}: {result}"),
                other => println!("    ✔ Slice {slice}: {other}"),
            }
        }
        JobEvent::Error { detail } | JobEvent::NoFunds { detail } => {
            println!(
                "{}",
                serde_json::to_string_pretty(detail).unwrap_or_else(|_| detail.to_string())
            );
        }
        JobEvent::Complete => {}
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match SubmitConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {e}");
            exit(1);
        }
    };
    cli.apply(&mut config);

    if let Err(e) = config.preflight_checks() {
        error!("Submission aborted: {e}");
        exit(1);
    }

    // jobs are owned and manageable with the identity key, compute
    // credits come out of the payment account
    let keystore_dir = config.platform.keystore_dir.as_deref();
    let identity = match Keystore::load(keystore_dir, &config.platform.identity_keystore) {
        Ok(keystore) => keystore,
        Err(e) => {
            error!("Failed to load identity keystore: {e}");
            exit(1);
        }
    };
    let payment = match Keystore::load(keystore_dir, &config.platform.payment_keystore) {
        Ok(keystore) => keystore,
        Err(e) => {
            error!("Failed to load payment keystore: {e}");
            exit(1);
        }
    };

    let spec = JobSpec::signature_sweep(&config, &identity, &payment);
    let client = PlatformClient::new(&config.platform.scheduler_url);

    let handle = match client.submit(&spec) {
        Ok(handle) => handle,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    if let Err(e) = client.wait(&handle, |event| print_event(event, &handle.id)) {
        error!("Lost the job event feed: {e}");
        exit(1);
    }

    println!("Done.");
}
