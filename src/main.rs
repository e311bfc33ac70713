use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pingtrace::cli::{Args, Command, PingArgs, TraceArgs};
use pingtrace::lookup::ReverseDns;
use pingtrace::probe::IcmpTransport;
use pingtrace::report::{CsvReporter, JsonReporter, PingReporter, TextReporter, TraceReporter};
use pingtrace::trace::{PingSession, TraceSession, resolve_target};

/// Used when neither --log-filter nor RUST_LOG is set
const DEFAULT_LOG_FILTER: &str = "warn";

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref());

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(log_filter: Option<&str>) {
    let filter = log_filter
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match args.command {
        Command::Ping(ping) => run_ping(ping, cancel).await,
        Command::Traceroute(trace) => run_traceroute(trace, cancel).await,
    }
}

/// Cancel `cancel` on Ctrl-C; sessions notice it between probes
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::debug!("interrupted");
                cancel.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });
}

async fn run_ping(args: PingArgs, cancel: CancellationToken) -> Result<()> {
    let config = args.config()?;
    let target = resolve_target(&args.hostname)?;
    let network = IcmpTransport::open()?;
    let dns = (!args.no_dns).then(|| ReverseDns::new(Handle::current()));

    tokio::task::spawn_blocking(move || {
        let stdout = io::stdout().lock();
        let mut reporter: Box<dyn PingReporter> = if args.json {
            Box::new(JsonReporter::new(stdout, dns))
        } else {
            Box::new(TextReporter::new(stdout, dns))
        };
        PingSession::new(target, config, network).run(reporter.as_mut(), &cancel);
    })
    .await
    .context("ping session failed")
}

async fn run_traceroute(args: TraceArgs, cancel: CancellationToken) -> Result<()> {
    let config = args.config()?;
    let target = resolve_target(&args.hostname)?;
    let network = IcmpTransport::open()?;
    let dns = (!args.no_dns).then(|| ReverseDns::new(Handle::current()));

    tokio::task::spawn_blocking(move || {
        let stdout = io::stdout().lock();
        let mut reporter: Box<dyn TraceReporter> = if args.json {
            Box::new(JsonReporter::new(stdout, dns))
        } else if args.csv {
            Box::new(CsvReporter::new(stdout, dns))
        } else {
            Box::new(TextReporter::new(stdout, dns))
        };
        TraceSession::new(target, config, network).run(reporter.as_mut(), &cancel);
    })
    .await
    .context("traceroute session failed")
}
