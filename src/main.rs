use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use proxy_checker::{
    logging,
    proxy::{pool::split_in_input_order, CheckerConfig, PoolRunner, ProbeMode, ProxyParser, ProxyType},
    report::{self, ConsoleReporter, RunReport},
    tui::CheckerDashboard,
    Config,
};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Filter a proxy list down to the entries that actually work
#[derive(Parser)]
#[command(name = "proxy-checker")]
#[command(about = "Filter a proxy list down to the entries that actually work")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log filter, e.g. "debug" or "proxy_checker=trace" (defaults to RUST_LOG, then "warn").
    /// With --tui the log goes to proxy-checker.log
    #[arg(long = "log", global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Quick check against IP echo services (proxies.txt -> working_proxies.txt)
    Check(RunArgs),
    /// Thorough check against real websites (working_proxies.txt -> verified_working_proxies.txt)
    Verify(RunArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    /// Input file containing proxies
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Output file for working proxies
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output file for failed proxies
    #[arg(short, long)]
    bad: Option<PathBuf>,
    /// Number of concurrent checks
    #[arg(short = 'n', long)]
    concurrency: Option<usize>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Write a JSON report of every result
    #[arg(long)]
    json: Option<PathBuf>,
    /// Show a live dashboard instead of line output
    #[arg(long)]
    tui: bool,
    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,
}

impl RunArgs {
    fn into_configs(self, mode: ProbeMode) -> (Config, CheckerConfig) {
        let defaults = Config::for_mode(mode);
        let config = Config {
            mode,
            input: self.input.unwrap_or(defaults.input),
            output: self.output.unwrap_or(defaults.output),
            bad_output: self.bad,
            json_report: self.json,
            tui: self.tui,
            pause_on_exit: !self.no_pause,
        };

        let mut checker = CheckerConfig::for_mode(mode);
        if let Some(n) = self.concurrency {
            checker = checker.with_concurrency(n);
        }
        if let Some(secs) = self.timeout {
            checker = checker.with_timeout(Duration::from_secs(secs));
        }
        (config, checker)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mode, args) = match cli.command {
        Some(Commands::Check(args)) => (ProbeMode::Quick, args),
        Some(Commands::Verify(args)) => (ProbeMode::Thorough, args),
        None => (ProbeMode::Quick, RunArgs::default()),
    };
    let (config, checker_config) = args.into_configs(mode);

    let log_target = logging::init(cli.log.as_deref(), config.tui)?;

    let outcome = run(&config, checker_config).await;

    if let logging::LogTarget::File(path) = &log_target {
        println!("Logs written to {}", path.display());
    }

    if config.pause_on_exit {
        report::pause(&mut io::stdin().lock(), &mut io::stdout())?;
    }
    outcome
}

async fn run(config: &Config, checker_config: CheckerConfig) -> Result<()> {
    let mut console = ConsoleReporter::stdout(config.mode);
    console.banner()?;

    if !config.input.exists() {
        console.missing_input(&config.input)?;
        return Ok(());
    }

    let parsed = ProxyParser::parse_file(&config.input, ProxyType::Http)?;
    if parsed.invalid > 0 {
        warn!(count = parsed.invalid, "some lines were not recognised as proxies");
    }
    console.loaded(&parsed, &config.input)?;
    if parsed.entries.is_empty() {
        return Ok(());
    }

    let total = parsed.entries.len();
    let started_at = Utc::now();
    let runner = PoolRunner::new(checker_config);

    let results = if config.tui {
        CheckerDashboard::new(runner, parsed.entries).run().await?
    } else {
        let mut io_error = None;
        let results = runner
            .check_proxies(parsed.entries, |result, progress| {
                if let Err(e) = console.on_result(result, progress) {
                    io_error.get_or_insert(e);
                }
            })
            .await;
        if let Some(e) = io_error {
            return Err(e).context("failed to write progress");
        }
        results
    };

    if let Some(path) = &config.json_report {
        RunReport::new(config.mode, started_at, total, &results).write_to(path)?;
    }

    let (working, failed) = split_in_input_order(results);
    console.summary(total, working.len())?;

    if working.is_empty() {
        console.none_working()?;
    } else {
        report::write_addresses(&working, &config.output)?;
        console.saved(&working, &config.output)?;
    }

    if let Some(path) = &config.bad_output {
        report::write_addresses(&failed, path)?;
        console.saved_failed(failed.len(), path)?;
    }
    if let Some(path) = &config.json_report {
        console.saved_report(path)?;
    }

    Ok(())
}
