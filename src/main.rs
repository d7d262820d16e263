use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sslcheck::{
    config::Config,
    model::Report,
    output::{format_report, print_json, print_summary, OutputFormat},
    scan::ScanEvent,
    service::{Download, ScanService},
    store::JsonFileStore,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const SCAN_FAILED: u8 = 2;
}

#[derive(Parser)]
#[command(name = "sslcheck")]
#[command(
    author,
    version,
    about = "Analyze a domain's TLS configuration through SSL Labs"
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this file for persisted scan results
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full analysis and print the report
    Analyze {
        /// Domain to analyze (e.g. example.com)
        host: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the cached result for a host, starting a scan if there is none
    Query {
        /// Domain to look up
        host: String,
    },

    /// Write the text report of one cached host to report_<host>.txt
    Report {
        /// Domain whose cached report to write
        host: String,

        /// Directory for the report file
        #[arg(short = 'd', long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Write the text reports of all cached hosts to one file
    ReportAll {
        /// Directory for the report file
        #[arg(short = 'd', long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// List cached hosts
    List,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Delete persisted scan results
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "sslcheck=debug" } else { "sslcheck=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }

    match cli.command {
        Commands::Analyze {
            host,
            format,
            output,
        } => {
            let format = OutputFormat::from_str(&format).map_err(|e| anyhow!(e))?;
            run_analyze(&config, &host, format, output).await
        }
        Commands::Query { host } => {
            let service = ScanService::from_config(&config)?;
            let response = service.query(&host).await;
            print_json(&response)?;
            service.shutdown().await;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Report { host, output_dir } => {
            let service = ScanService::from_config(&config)?;
            let download = service.download(&host).ok_or_else(|| {
                anyhow!(
                    "No cached report for {}. Run 'sslcheck analyze {}' first.",
                    host,
                    host
                )
            })?;
            write_download(&download, &output_dir)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ReportAll { output_dir } => {
            let service = ScanService::from_config(&config)?;
            write_download(&service.download_all(), &output_dir)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::List => {
            let service = ScanService::from_config(&config)?;
            print_summary(&service.cache().snapshot());
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let store = JsonFileStore::new(config.store_path());
            store.clear()?;
            println!("Removed {}", store.path().display());
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_analyze(
    config: &Config,
    host: &str,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<u8> {
    let service = ScanService::from_config(config)?;
    let mut handle = service
        .analyze(host)
        .ok_or_else(|| anyhow!("A scan for {} is already running", host))?;

    let is_interactive = format == OutputFormat::Text && output.is_none();
    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Submitting {} to SSL Labs...", host));
        Some(pb)
    } else {
        None
    };

    let mut finished: Option<Report> = None;
    let mut exit = exit_codes::SUCCESS;

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                if let Some(ref pb) = progress {
                    pb.finish_with_message("Interrupted");
                }
                service.shutdown().await;
                return Ok(exit_codes::ERROR);
            }
        };

        match event {
            Some(ScanEvent::Report(report)) => {
                if let Some(ref pb) = progress {
                    pb.set_message(progress_message(host, &report));
                }
                if report.status.is_ready() {
                    finished = Some(report);
                }
            }
            Some(ScanEvent::Failed(err)) => {
                if let Some(ref pb) = progress {
                    pb.finish_and_clear();
                }
                eprintln!("Analysis of {} failed: {}", host, err);
                exit = if err.is_provider() {
                    exit_codes::SCAN_FAILED
                } else {
                    exit_codes::ERROR
                };
            }
            None => break,
        }
    }

    let Some(report) = finished else {
        return Ok(if exit == exit_codes::SUCCESS {
            exit_codes::ERROR
        } else {
            exit
        });
    };

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Analysis of {} complete", host));
    }

    let content = format_report(&report, format)?;
    match output {
        Some(path) => {
            std::fs::write(&path, content)?;
            println!("Report written to: {}", path.display());
        }
        None => println!("{}", content),
    }

    Ok(exit_codes::SUCCESS)
}

fn progress_message(host: &str, report: &Report) -> String {
    match report.progress() {
        Some(pct) => format!("{} {}: {}%", host, report.status, pct),
        None => format!("{} {}...", host, report.status),
    }
}

fn write_download(download: &Download, dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    let path = dir.join(&download.filename);
    std::fs::write(&path, &download.body)?;
    println!("Report written to: {}", path.display());
    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'sslcheck config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
