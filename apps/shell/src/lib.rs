mod backend;
mod commands;
pub mod config;
mod event_log;
mod events;
mod indicator;
mod presenter;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use boop_bridge::BridgeClient;
use boop_connection::{ConnectionController, ControllerError, RpcGateway, SequenceOutcome};

use commands::Command;
use config::ShellConfig;
use presenter::TerminalPresenter;
use state::ShellState;

type Controller = ConnectionController<BridgeClient, BridgeClient, TerminalPresenter>;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,boop=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = ShellConfig::load().unwrap_or_else(|e| {
        warn!("failed to load config, using defaults: {e:#}");
        ShellConfig::default()
    });
    if config::config_path().is_ok_and(|path| !path.exists()) {
        match cfg.save() {
            Ok(()) => info!("wrote default config"),
            Err(e) => warn!("failed to write default config: {e:#}"),
        }
    }

    let (backend, bridge) = backend::spawn(&cfg.backend)?;

    let presenter = TerminalPresenter::new();
    let controller = ConnectionController::with_policies(
        bridge.clone(),
        bridge.clone(),
        presenter.clone(),
        cfg.initial_retry.to_policy(),
        cfg.reconnect_retry.to_policy(),
    );
    let state = Arc::new(ShellState::new(presenter));

    let events = controller
        .take_events()
        .await
        .context("controller events already taken")?;
    let event_task = tokio::spawn(events::event_loop(events, state.clone()));

    let (fatal_tx, mut fatal_rx) = mpsc::channel::<ControllerError>(1);
    spawn_connect(&controller, fatal_tx.clone());

    println!("{}", commands::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let result = loop {
        tokio::select! {
            Some(err) = fatal_rx.recv() => {
                break Err(anyhow!(err).context("connection controller failed"));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
            () = bridge.closed() => {
                break Err(anyhow!("backend closed its output"));
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(anyhow!(e).context("failed to read terminal input")),
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break Ok(()),
                    Ok(cmd) => handle_command(cmd, &controller, &state, &fatal_tx),
                    Err(e) => println!("{e}"),
                }
            }
        }
    };

    shutdown(&controller, &bridge, backend, cfg.disconnect_timeout()).await;
    event_task.abort();
    result
}

fn spawn_connect(controller: &Controller, fatal: mpsc::Sender<ControllerError>) {
    let controller = controller.clone();
    tokio::spawn(async move {
        match controller.init_connection().await {
            Ok(SequenceOutcome::AlreadyRunning) => {
                println!("a connection attempt is already running");
            }
            Ok(outcome) => debug!(?outcome, "connection sequence finished"),
            Err(ControllerError::TornDown) => {}
            Err(e) => {
                let _ = fatal.send(e).await;
            }
        }
    });
}

fn handle_command(
    cmd: Command,
    controller: &Controller,
    state: &ShellState,
    fatal: &mpsc::Sender<ControllerError>,
) {
    match cmd {
        Command::Connect => spawn_connect(controller, fatal.clone()),
        Command::Ack => match state.presenter.acknowledge_oldest() {
            Some(id) => println!("dialog #{id} dismissed"),
            None => println!("no open dialog"),
        },
        Command::Status => {
            let attempt = controller.attempt_state();
            println!("{}", *state.indicator());
            println!(
                "phase: {:?}, attempts: {}, listening: {}, open dialogs: {}",
                attempt.phase,
                attempt.attempts_made,
                controller.is_listening(),
                state.presenter.open_dialogs()
            );
        }
        Command::Log => {
            for entry in state.log().iter() {
                println!("{}", entry.render());
            }
        }
        Command::Notices => {
            let notices = state.presenter.render_notices();
            if notices.is_empty() {
                println!("no notices");
            }
            for line in notices {
                println!("{line}");
            }
        }
        Command::Dismiss(id) => {
            if state.presenter.dismiss(id) {
                println!("notice #{id} dismissed");
            } else {
                println!("no notice #{id}");
            }
        }
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
}

/// Best-effort disconnect, then teardown and backend exit.
async fn shutdown(
    controller: &Controller,
    bridge: &BridgeClient,
    backend: backend::Backend,
    timeout: Duration,
) {
    info!("shutting down, disconnecting from boop server");

    if !bridge.is_closed() {
        match tokio::time::timeout(timeout, controller.gateway().disconnect()).await {
            Ok(Ok(())) => debug!("disconnected"),
            Ok(Err(e)) => warn!("disconnect failed: {e}"),
            Err(_) => warn!("disconnect timed out"),
        }
    }

    controller.teardown();
    bridge.close();
    backend.shutdown(timeout).await;
}
