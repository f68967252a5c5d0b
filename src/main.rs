mod browser;
mod cli;
mod config;
mod dashboard;
mod error;
mod keeper;
mod logging;
mod pause;
mod reach;
mod remote;
mod scheduler;
mod signal;
mod supervisor;
mod ui;
mod watcher;
mod worker;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use browser::{BrowserSession, LaunchOptions};
use cli::{Cli, Command};
use config::{KeeperConfig, Settings};
use signal::ProcessSignal;
use supervisor::{Station, Supervisor};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = KeeperConfig::load(cli.config.as_deref())?;
    let _log_guard = logging::init(cli.verbose, config.log_dir.as_deref())?;
    debug!(?config, "configuration loaded");
    let settings = config.validate()?;

    match cli.command {
        Command::Run => run(settings),
        Command::Verify => verify_once(&settings),
        Command::Check { online } => check(&settings, online),
    }
}

fn launch_options(settings: &Settings) -> LaunchOptions {
    LaunchOptions {
        chrome_path: settings.chrome_path.clone(),
        headless: settings.headless,
    }
}

fn check(settings: &Settings, online: bool) -> Result<()> {
    ui::print_summary(settings);
    if !online {
        return Ok(());
    }
    let reach = reach::check_login_page(&settings.credentials)?;
    ui::print_reachability(&reach);
    if !reach.is_ready() {
        warn!(url = %reach.url, status = reach.status, "login page is not ready");
        anyhow::bail!("dashboard login page is not ready");
    }
    Ok(())
}

fn run(settings: Settings) -> Result<()> {
    let signal = ProcessSignal::new();
    signal.install_os_handlers()?;
    let session = BrowserSession::launch(&launch_options(&settings))?;

    let mut supervisor = Supervisor::new(settings, signal);
    supervisor.run(session)?;
    info!(state = %supervisor.state(), "webrtc-keeper exiting");
    Ok(())
}

fn verify_once(settings: &Settings) -> Result<()> {
    let signal = ProcessSignal::new();
    signal.install_os_handlers()?;
    let session = BrowserSession::launch(&launch_options(settings))?;

    let mut station = Station::new(session, settings, signal);
    let verified = station.verify();
    station.close();
    verified?;
    info!(user = %settings.credentials.username, "session verified");
    Ok(())
}
