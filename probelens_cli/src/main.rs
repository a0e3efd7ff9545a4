//! probelens CLI
//!
//! Wires the pipeline stages together over flat CSV tables:
//! probe records -> [anonymize ->] scan instances -> devices.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use probelens_core::devices::{eligible_for_linking, resolve_devices, DeviceLinkConfig};
use probelens_core::instances::resolve_instances;
use probelens_core::metrics::DeviceStats;
use probelens_io::{
    read_instances, read_probe_records, write_devices, write_instances, Anonymizer,
};

/// Probe-request analysis pipeline
#[derive(Parser, Debug)]
#[command(name = "probelens")]
#[command(about = "Resolve 802.11 probe requests into scan instances and devices", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group probe records into scan instances
    Instances {
        /// Probe-record CSV (DATE,TIME,MAC,HAS_WPS,UUID-E,IE,SN,SSID)
        #[arg(short, long)]
        input: PathBuf,

        /// Instance table to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge scan instances into devices
    Devices {
        /// Instance table produced by `instances`
        #[arg(short, long)]
        input: PathBuf,

        /// Device table to write
        #[arg(short, long)]
        output: PathBuf,

        /// SSID similarity a pair must strictly exceed to merge
        #[arg(short, long, default_value = "0.5")]
        threshold: f64,

        /// Print run statistics as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Run the full pipeline: probe records -> instances -> devices
    Pipeline {
        /// Probe-record CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for instances.csv / devices.csv
        #[arg(short, long)]
        out_dir: PathBuf,

        /// SSID similarity a pair must strictly exceed to merge
        #[arg(short, long, default_value = "0.5")]
        threshold: f64,

        /// Anonymize MAC tails and SSIDs before resolution
        #[arg(short, long)]
        anonymize: bool,

        /// Print run statistics as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Anonymize the MAC and SSID columns of a probe-record CSV
    Anonymize {
        /// Probe-record CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Anonymized CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Fixed salt for reproducible runs (random when omitted)
        #[arg(long)]
        salt: Option<String>,
    },
}

/// Reads probe records and resolves them into an instance table on disk.
fn run_instances(input: &Path, output: &Path) -> Result<usize> {
    let import = read_probe_records(input)
        .with_context(|| format!("failed to read probe records from {}", input.display()))?;
    if import.skipped_rows > 0 {
        warn!("Skipped {} rows without a MAC address", import.skipped_rows);
    }
    info!("Read {} probe records from {}", import.records.len(), input.display());

    let instances = resolve_instances(&import.records);
    write_instances(output, &instances)
        .with_context(|| format!("failed to write instance table to {}", output.display()))?;
    info!(
        "Resolved {} probe records into {} scan instances -> {}",
        import.records.len(),
        instances.len(),
        output.display()
    );
    Ok(instances.len())
}

/// Resolves an on-disk instance table into a device table, returning stats.
fn run_devices(input: &Path, output: &Path, threshold: f64) -> Result<DeviceStats> {
    let all_instances = read_instances(input)
        .with_context(|| format!("failed to read instance table from {}", input.display()))?;

    // Instances disclosing fewer than two informative SSIDs carry too
    // little signal for identity linking.
    let linkable: Vec<_> = all_instances
        .iter()
        .filter(|i| eligible_for_linking(i))
        .cloned()
        .collect();
    info!(
        "{} of {} instances eligible for device linking",
        linkable.len(),
        all_instances.len()
    );

    let config = DeviceLinkConfig {
        similarity_threshold: threshold,
    };
    let devices = resolve_devices(&linkable, &config);
    write_devices(output, &devices)
        .with_context(|| format!("failed to write device table to {}", output.display()))?;

    let stats = DeviceStats::from_devices(&devices);
    info!(
        "Identified {} devices from {} instances -> {}",
        stats.device_count,
        stats.instance_count,
        output.display()
    );
    info!(
        "Avg SSIDs per device: {:.2} (max {}); multi-MAC devices: {} ({:.2}%, max {} MACs)",
        stats.avg_ssids(),
        stats.max_ssids,
        stats.multi_mac_devices,
        stats.multi_mac_rate(),
        stats.max_macs
    );
    Ok(stats)
}

fn print_stats_json(stats: &DeviceStats) {
    let summary = serde_json::json!({
        "devices": stats.device_count,
        "instances": stats.instance_count,
        "avg_ssids": stats.avg_ssids(),
        "max_ssids": stats.max_ssids,
        "multi_mac_devices": stats.multi_mac_devices,
        "multi_mac_rate_pct": stats.multi_mac_rate(),
        "max_macs": stats.max_macs,
    });
    println!("{:#}", summary);
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Instances { input, output } => {
            run_instances(&input, &output)?;
        }

        Command::Devices {
            input,
            output,
            threshold,
            json,
        } => {
            let stats = run_devices(&input, &output, threshold)?;
            if json {
                print_stats_json(&stats);
            }
        }

        Command::Pipeline {
            input,
            out_dir,
            threshold,
            anonymize,
            json,
        } => {
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;

            let record_source = if anonymize {
                let anonymized = out_dir.join("anonymized_probes.csv");
                Anonymizer::new()
                    .anonymize_probe_csv(&input, &anonymized)
                    .with_context(|| format!("failed to anonymize {}", input.display()))?;
                info!("Anonymized probe table -> {}", anonymized.display());
                anonymized
            } else {
                input
            };

            let instances_csv = out_dir.join("instances.csv");
            run_instances(&record_source, &instances_csv)?;

            let devices_csv = out_dir.join("devices.csv");
            let stats = run_devices(&instances_csv, &devices_csv, threshold)?;
            if json {
                print_stats_json(&stats);
            }
        }

        Command::Anonymize {
            input,
            output,
            salt,
        } => {
            let anonymizer = match salt {
                Some(salt) => Anonymizer::with_salt(salt),
                None => Anonymizer::new(),
            };
            anonymizer
                .anonymize_probe_csv(&input, &output)
                .with_context(|| format!("failed to anonymize {}", input.display()))?;
            info!("Anonymized {} -> {}", input.display(), output.display());
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if let Err(e) = run(cli) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
