use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vault_economy::application::ledger::Ledger;
use vault_economy::application::pending::PendingRequestQueue;
use vault_economy::application::service::PayService;
use vault_economy::config::Settings;
use vault_economy::infrastructure::clock::SystemClock;
use vault_economy::infrastructure::open_backends;
use vault_economy::infrastructure::scheduler::MainThreadHandle;
use vault_economy::interfaces::console::{ConsoleHost, ScriptRunner};
use vault_economy::interfaces::csv::balance_writer::BalanceWriter;
use vault_economy::interfaces::csv::script_reader::ScriptReader;
use vault_economy::logging::{LogFormat, init_logging};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Event script CSV file (`player,action,target,value`)
    input: PathBuf,

    /// JSON settings file. Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the flat-file backend
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to the durable database. If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("info", cli.log_format);

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).into_diagnostic()?,
        None => Settings::default(),
    };
    if let Some(dir) = cli.data_dir {
        settings.storage.data_dir = dir;
    }
    if let Some(path) = cli.db_path {
        settings.storage.use_durable_backend = true;
        settings.storage.durable.path = path;
    }

    let backends = open_backends(&settings.storage);
    let clock = Arc::new(SystemClock);
    let ledger = Arc::new(Ledger::new(backends.durable_balances, backends.flat_balances));
    let pending = Arc::new(PendingRequestQueue::with_fallback(
        backends.durable_requests,
        backends.flat_requests,
        ledger.durable_switch(),
        clock.clone(),
    ));
    ledger.load_all().await;

    let (main_context, _main_join) = MainThreadHandle::spawn();
    let host = Arc::new(ConsoleHost::new(Box::new(io::stdout()), main_context));
    let service = PayService::new(ledger, pending, host.clone(), clock, settings);
    let runner = ScriptRunner::new(service.clone(), host);

    let file = File::open(&cli.input).into_diagnostic()?;
    let mut applied = 0usize;
    for event in ScriptReader::new(file).events() {
        match event {
            Ok(event) => match runner.apply(&event).await {
                Ok(()) => applied += 1,
                Err(e) => warn!("Error applying event: {}", e),
            },
            Err(e) => warn!("Error reading event: {}", e),
        }
    }
    info!(applied, "Script finished");

    service.shutdown().await;

    let rows = runner.report().await;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer
        .write_balances(rows.iter().map(|(name, balance)| (name.as_str(), *balance)))
        .into_diagnostic()?;

    Ok(())
}
