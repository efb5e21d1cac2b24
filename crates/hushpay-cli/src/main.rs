//! hushpay - command line driver for private payment channels
//!
//! runs a scripted channel end to end, prints group parameters, and re-runs
//! the settlement check on exported ledger records and closing payloads.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hushpay::wire::{CloseRequest, CosignRequest, OpenRequest, UpdateRequest};
use hushpay::{
    verify_settlement, ChannelConfig, ChannelService, ClosingPayload, LedgerRecord,
    ParameterSet, Participant, SettlementRecord,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hushpay")]
#[command(about = "two-party payment channels with hidden balances")]
struct Cli {
    /// toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// override the group modulus
    #[arg(short, long, global = true)]
    params: Option<ParamsArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParamsArg {
    Modp2048,
    Modp768,
}

impl From<ParamsArg> for ParameterSet {
    fn from(arg: ParamsArg) -> Self {
        match arg {
            ParamsArg::Modp2048 => ParameterSet::Modp2048,
            ParamsArg::Modp768 => ParameterSet::Modp768,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Open a channel, apply payments, cosign and close, printing every view
    Demo {
        /// Alice's deposit
        #[arg(long, default_value = "100")]
        alice: i64,

        /// Bob's deposit
        #[arg(long, default_value = "25")]
        bob: i64,

        /// Payment as payer:amount, repeatable (e.g. alice:10)
        #[arg(long = "pay", value_parser = parse_payment, default_value = "alice:10")]
        payments: Vec<(Participant, i64)>,

        /// Fixed rng seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Write record.json and payload.json here before closing
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Print the group parameters
    Params,

    /// Check a closing payload against a ledger record
    Verify {
        /// Ledger record json
        #[arg(long)]
        record: PathBuf,

        /// Closing payload json
        #[arg(long)]
        payload: PathBuf,
    },
}

fn parse_payment(s: &str) -> std::result::Result<(Participant, i64), String> {
    let (payer, amount) = s
        .split_once(':')
        .ok_or_else(|| format!("expected payer:amount, got {s:?}"))?;
    let payer = payer.parse::<Participant>().map_err(|e| e.to_string())?;
    let amount = amount.parse::<i64>().map_err(|e| e.to_string())?;
    Ok((payer, amount))
}

fn load_config(path: Option<&Path>, params: Option<ParamsArg>) -> Result<ChannelConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        }
        None => ChannelConfig::default(),
    };
    if let Some(params) = params {
        config = config.with_parameter_set(params.into());
    }
    Ok(config)
}

fn print_json<T: Serialize>(label: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode json")?;
    println!("=== {label} ===\n{json}");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode json")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn run_demo(
    config: ChannelConfig,
    deposits: (i64, i64),
    payments: &[(Participant, i64)],
    seed: Option<u64>,
    export: Option<&Path>,
) -> Result<()> {
    let service = ChannelService::new(config);
    let service = match seed {
        Some(seed) => service.with_seed(seed),
        None => service,
    };

    let view = service.open(&OpenRequest {
        deposit_alice: deposits.0,
        deposit_bob: deposits.1,
        channel_id: None,
    })?;
    info!(channel_id = %view.channel_id, "demo channel opened");
    print_json("open", &view)?;

    for &(payer, delta) in payments {
        let view = service.update(&UpdateRequest {
            delta,
            payer,
            channel_id: None,
        })?;
        print_json(&format!("update {payer} -> {} ({delta})", payer.other()), &view)?;
    }

    let view = service.cosign(&CosignRequest::default())?;
    print_json("cosign", &view)?;

    if let Some(dir) = export {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let record = service
            .ledger()
            .record(&view.channel_id)?
            .context("ledger has no record for the demo channel")?;
        let payload = service.channel(None)?.closing_payload()?;
        write_json(&dir.join("record.json"), &record)?;
        write_json(&dir.join("payload.json"), &payload)?;
        info!(dir = %dir.display(), "exported record and payload");
    }

    let settlement = service.close(&CloseRequest::default())?;
    print_json("close", &settlement)?;
    print_json("history", &service.history(None)?)?;

    if !settlement.verified {
        bail!("settlement was not verified");
    }
    Ok(())
}

#[derive(Serialize)]
struct ParamsView {
    parameter_set: &'static str,
    bits: u64,
    p: String,
    q: String,
    g: String,
    h: String,
}

fn show_params(config: &ChannelConfig) -> Result<()> {
    let params = config.group_parameters();
    print_json(
        "group parameters",
        &ParamsView {
            parameter_set: params.parameter_set().name(),
            bits: params.p().bits(),
            p: params.p().to_str_radix(16),
            q: params.q().to_str_radix(16),
            g: params.g().to_str_radix(16),
            h: params.h().to_str_radix(16),
        },
    )
}

fn run_verify(config: &ChannelConfig, record: &Path, payload: &Path) -> Result<()> {
    let record: LedgerRecord = read_json(record)?;
    let payload: ClosingPayload = read_json(payload)?;
    let params = config.group_parameters();

    let verified = verify_settlement(&params, &record, &payload);
    let outcome = SettlementRecord {
        channel_id: record.channel_id.clone(),
        sequence: record.sequence,
        settled_balances: verified.then(|| payload.openings.as_ref().map(|o| o.balance)),
        verified,
    };
    print_json("settlement", &outcome)?;

    if !verified {
        bail!("settlement check failed for channel {}", record.channel_id);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hushpay=info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.params)?;

    match cli.command {
        Command::Demo {
            alice,
            bob,
            payments,
            seed,
            export,
        } => run_demo(config, (alice, bob), &payments, seed, export.as_deref()),
        Command::Params => show_params(&config),
        Command::Verify { record, payload } => run_verify(&config, &record, &payload),
    }
}
