use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::config::AppConfig;
use crate::management::comm::{ConsoleWriter, InstanceProcess};
use crate::management::console::ConsoleHub;
use crate::management::installer::SteamCmd;
use crate::management::instance::report;
use crate::management::Satisfactory;
use satisfactory_protocol::game::GameInfo;
use satisfactory_protocol::management::instance::{ConsoleLine, StreamKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "satisfactory-daemon", version, about = "Runs a Satisfactory dedicated server instance")]
pub struct Cli {
    /// Adapter configuration file, created with defaults when missing
    #[arg(long, short, default_value = "config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the server and keep it running until ctrl+c
    Start(StartArgs),
    /// Install or update the server files through SteamCMD
    Update(UpdateArgs),
    /// Write MaxPlayers into Game.ini without starting the server
    SyncConfig,
    /// Print game defaults and plugin metadata as JSON
    Info,
}

#[derive(Args)]
pub struct StartArgs {
    /// Seconds to wait for the server after ctrl+c, overrides the config file
    #[arg(long)]
    pub stop_timeout: Option<u64>,

    /// Kill the server when it does not exit in time
    #[arg(long)]
    pub kill_on_timeout: bool,
}

impl StartArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(secs) = self.stop_timeout {
            config.stop_timeout_secs = secs;
        }
        config.kill_on_timeout |= self.kill_on_timeout;
    }
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Skip SteamCMD file validation
    #[arg(long)]
    pub no_validate: bool,

    /// Beta branch to install, overrides the instance setting
    #[arg(long)]
    pub beta: Option<String>,
}

struct AppState {
    config: AppConfig,
    console: Arc<ConsoleHub>,
    server: Satisfactory,
}

fn init_app_state(config: AppConfig) -> AppState {
    let console = Arc::new(ConsoleHub::new(config.console_capacity));
    let root = crate::storage::ServerPaths::new(&config.servers_root)
        .server_files(config.instance.uuid);
    let installer = Arc::new(SteamCmd::new(&config.steamcmd_path, console.clone()));
    let server = Satisfactory::new(config.instance.clone(), root, console.clone(), installer)
        .with_options(config.adapter_options());
    AppState {
        config,
        console,
        server,
    }
}

pub async fn run_app(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Command::Start(args) = &cli.command {
        args.apply(&mut config);
    }
    info!(
        "satisfactory-daemon v{} managing instance(uuid={})",
        VERSION, config.instance.uuid
    );
    let state = init_app_state(config);

    match cli.command {
        Command::Start(_) => start(&state).await?,
        Command::Update(args) => update(&state, args).await?,
        Command::SyncConfig => {
            let path = state.server.create_server_cfg().await?;
            info!("config written to {}", path.display());
        }
        Command::Info => {
            let info = GameInfo::get();
            println!("{}", serde_json::to_string_pretty(&info)?);
            println!("{}", serde_json::to_string_pretty(&state.config)?);
        }
    }

    info!("Bye.");
    Ok(())
}

async fn start(state: &AppState) -> anyhow::Result<()> {
    let uuid = state.server.settings().uuid;
    let printer = tokio::spawn(print_console(state.console.subscribe(uuid)));

    let result = state.server.start().await;
    if let Some(error) = report(&result).error {
        printer.abort();
        bail!("server did not start: {}", error);
    }
    let mut process = result?;
    info!(
        "instance(uuid={}) running (pid={:?})",
        process.instance(),
        process.id()
    );
    if process.is_embedded() {
        forward_stdin(&mut process);
    }

    let interrupted = tokio::select! {
        status = process.wait() => {
            match status {
                Ok(status) if status.success() => info!("server exited with {}", status),
                Ok(status) => {
                    let last = state.console.snapshot(uuid).pop().map(|line| line.text);
                    warn!(
                        "server exited on its own with {}, last output: {}",
                        status,
                        last.as_deref().unwrap_or("<none>")
                    );
                }
                Err(err) => error!("failed to wait for server: {}", err),
            }
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        info!("stopping server...");
        let outcome = state.server.stop(&mut process).await?;
        info!("stop finished: {:?}", outcome);
        if !outcome.is_stopped() {
            warn!(
                "server (pid={:?}) is still running, stop it manually",
                process.id()
            );
        }
    }
    printer.abort();
    Ok(())
}

async fn update(state: &AppState, args: UpdateArgs) -> anyhow::Result<()> {
    let uuid = state.server.settings().uuid;
    let printer = tokio::spawn(print_console(state.console.subscribe(uuid)));

    let outcome = state
        .server
        .update(!args.no_validate, args.beta.as_deref())
        .await;
    printer.abort();
    info!(
        "installer (pid={:?}) finished with {:?}",
        outcome.process.as_ref().and_then(|process| process.id()),
        outcome.status
    );

    if !outcome.is_success() {
        bail!(
            "update failed: {}",
            outcome.report().error.unwrap_or_default()
        );
    }
    let path = state.server.create_server_cfg().await?;
    info!("update done, config at {}", path.display());
    Ok(())
}

async fn print_console(mut rx: broadcast::Receiver<ConsoleLine>) {
    loop {
        match rx.recv().await {
            Ok(line) => match line.stream {
                StreamKind::Stdout => println!("{}", line.text),
                StreamKind::Stderr => eprintln!("{}", line.text),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("console skipped {} lines", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Sends what is typed into this terminal to the server console.
fn forward_stdin(process: &mut InstanceProcess) {
    let mut writer: ConsoleWriter = match process.take_console_writer() {
        Ok(writer) => writer,
        Err(err) => {
            warn!("console input unavailable: {}", err);
            return;
        }
    };
    let (tx, mut rx) = mpsc::channel::<String>(16);

    // plain thread: a blocking stdin read must not hold up runtime shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(err) = writer.send_line(&line).await {
                warn!("could not send to server console: {}", err);
                break;
            }
        }
    });
}
