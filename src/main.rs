use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use statusled::app::App;
use statusled::config::{Config, load_config, load_config_from_path};
use statusled::device::{Link, SerialConnector, ThreadSleeper};
use statusled::event::{Event, EventHandler};
use statusled::{format, logging};

#[derive(Parser)]
#[command(
    name = "statusled",
    about = "Show CPU and memory utilization on a serial LED peripheral"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device the peripheral is attached to
    #[arg(long)]
    device: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Open the device, check that it identifies itself, and exit.
    #[arg(long, default_value_t = false)]
    probe: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli)?;
    logging::init(cli.verbose, &config.general.log_level)?;

    if cli.probe {
        return probe(&config);
    }

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    let tick_rate = Duration::from_millis(config.general.refresh_rate_ms);
    let link = Link::new(config.device.path.clone(), SerialConnector, ThreadSleeper);
    let mut app = App::new(&config, link);
    let mut events = EventHandler::new(tick_rate);

    tracing::info!(
        device = %app.link.path().display(),
        stat = %app.cpu.path().display(),
        meminfo = %app.memory.path().display(),
        refresh_ms = config.general.refresh_rate_ms,
        "starting"
    );
    app.startup();

    while let Some(event) = events.next().await {
        match event {
            Event::Tick => {
                let report = app.tick();
                tracing::debug!(dispatch = ?report.dispatch, "{}", format::status_line(&report));
            }
            Event::Shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    app.shutdown();
    Ok(())
}

fn probe(config: &Config) -> Result<()> {
    let mut link = Link::new(config.device.path.clone(), SerialConnector, ThreadSleeper);
    link.acquire()
        .wrap_err_with(|| format!("cannot open {}", link.path().display()))?;
    link.identify()?;
    println!("{}: peripheral identified", link.path().display());
    link.release();
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(ref device) = cli.device {
        config.device.path = device.clone();
    }
    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if config.general.refresh_rate_ms == 0 {
        return Err(eyre!("refresh rate must be greater than 0"));
    }
    Ok(config)
}
