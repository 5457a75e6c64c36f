//! Optional CLI binary for the SPARC miner (feature-gated behind `cli`).
//!
//! `clawrtc-sparc --wallet <id> [--once | --dry-run | --show-payload]`

#[cfg(feature = "cli")]
use clawrtc_sparc::HardwareFacts;

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    use clap::{ArgGroup, Parser};
    use clawrtc_sparc::config::{CliOverrides, FileConfig};
    use clawrtc_sparc::{
        MinerConfig, RunMode, RustChainClient, Scheduler, SystemClock, SystemHost, TokioSleeper,
    };
    use colored::Colorize;
    use std::path::PathBuf;
    use std::process::ExitCode;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tracing_subscriber::EnvFilter;

    #[derive(Parser)]
    #[command(name = "clawrtc-sparc", version, about = "RustChain SPARC miner")]
    #[command(group(ArgGroup::new("mode").args(["once", "dry_run", "show_payload"])))]
    struct Cli {
        /// Wallet name/ID
        #[arg(long)]
        wallet: String,
        /// TLS proxy URL (for HTTPS via old SSL)
        #[arg(long)]
        proxy: Option<String>,
        /// Use HTTP instead of HTTPS
        #[arg(long)]
        use_http: bool,
        /// Attestation interval in seconds (default 300)
        #[arg(long)]
        interval: Option<u64>,
        /// Attest once and exit
        #[arg(long)]
        once: bool,
        /// Build the payload but don't submit it
        #[arg(long)]
        dry_run: bool,
        /// Print the attestation payload and exit
        #[arg(long)]
        show_payload: bool,
        /// Config file (default: ~/.clawrtc/sparc.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path),
        None => FileConfig::load_default(),
    };
    let config = file.and_then(|file| {
        let mode = RunMode::from_flags(cli.once, cli.dry_run, cli.show_payload)?;
        MinerConfig::resolve(
            CliOverrides {
                wallet: cli.wallet.clone(),
                proxy: cli.proxy.clone(),
                use_http: cli.use_http,
                interval_secs: cli.interval,
                mode,
            },
            file,
        )
    });
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red());
            return ExitCode::FAILURE;
        }
    };

    println!("Detecting SPARC hardware...");
    let facts = HardwareFacts::detect(&SystemHost);
    print_banner(&facts, &config.client_version);

    if !config.uses_tls() {
        println!("  Using HTTP (less secure)");
    } else if let Some(proxy) = &config.proxy {
        println!("  Using HTTPS via proxy: {proxy}");
    } else {
        println!("  Using HTTPS direct");
    }
    println!();
    println!("  Wallet:  {}", config.wallet);
    println!("  Node:    {}", config.node_url);
    println!();

    let client = match RustChainClient::new(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red());
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mode = config.mode;
    if mode == RunMode::Loop {
        println!("Press Ctrl+C to stop");
        println!();
    }

    let mut scheduler = Scheduler::new(config, facts, client, TokioSleeper, SystemClock);
    let cancel = AtomicBool::new(false);
    let summary = runtime.block_on(async {
        tokio::select! {
            summary = scheduler.run(&cancel) => Some(summary),
            _ = tokio::signal::ctrl_c() => {
                cancel.store(true, Ordering::Relaxed);
                None
            }
        }
    });

    let Some(summary) = summary else {
        println!("{}", "Stopped.".yellow());
        return ExitCode::SUCCESS;
    };

    if let Some(record) = &summary.preview {
        let json = match serde_json::to_string_pretty(record) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("{} {e}", "Error:".red());
                return ExitCode::FAILURE;
            }
        };
        if mode == RunMode::DryRun {
            println!("{}", "DRY RUN - would submit attestation".yellow());
        } else {
            println!("Payload preview:");
        }
        println!("{json}");
    }

    if let Some(outcome) = &summary.last_outcome {
        use clawrtc_sparc::SubmitOutcome;
        match outcome {
            SubmitOutcome::Accepted { next_window } => {
                println!("  {} Attestation accepted", "OK:".green());
                if let Some(window) = next_window {
                    println!("  Next window: {window}");
                }
            }
            SubmitOutcome::Rejected { reason } => println!("  {} {reason}", "WARN:".yellow()),
            SubmitOutcome::Unreachable { .. } => {
                println!("  {} Could not reach node", "FAIL:".red())
            }
        }
    }

    ExitCode::SUCCESS
}

#[cfg(feature = "cli")]
fn print_banner(facts: &HardwareFacts, version: &str) {
    use colored::Colorize;

    let cpu = &facts.processor;
    let fp = &facts.fingerprint;
    let obp: String = fp.obp_version.chars().take(40).collect();
    let rule = "=".repeat(60);

    println!();
    println!("{rule}");
    println!("  {}", format!("RUSTCHAIN SPARC MINER v{version}").bold());
    println!("  \"The Sun never sets on vintage hardware\"");
    println!("{rule}");
    println!();
    println!("  Hardware Detected:");
    println!("    CPU:        {}", cpu.model);
    println!("    Clock:      {} MHz", cpu.clock_mhz);
    println!("    CPUs:       {}", cpu.core_count);
    println!("    Hostid:     {}", fp.hostid);
    println!("    Memory:     {} MB", fp.memory_mb);
    println!("    OBP:        {obp}");
    println!();
    println!(
        "  Antiquity Bonus: {} ({})",
        format!("{:.1}x", cpu.family.multiplier()).green(),
        cpu.family
    );
    println!();

    let warnings = facts.warnings();
    if !warnings.is_empty() {
        println!("  {}", "WARNINGS:".yellow());
        for w in warnings {
            println!("    ! {w}");
        }
        println!();
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Build with: cargo build --features cli");
    std::process::exit(1);
}
