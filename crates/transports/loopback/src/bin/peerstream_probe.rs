//! Loopback probe binary
//!
//! Starts several sessions on one in-memory hub, has the first one connect
//! to (and optionally call) every other one, prints what each session
//! observes, then tears everything down.
//!
//! # Usage
//!
//! ```bash
//! # Three peers, data channels only
//! cargo run --bin peerstream-probe -- --peers 3
//!
//! # Also place calls, and simulate a signalling drop on the last peer
//! RUST_LOG=peerstream_core=debug cargo run --bin peerstream-probe -- \
//!   --peers 4 --call --drop-signalling
//!
//! # Base every session on a TOML config (peer ids get a numeric suffix)
//! cargo run --bin peerstream-probe -- --config ./peerstream.toml
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use futures::StreamExt;
use peerstream_core::{
    CallOptions, ConnectOptions, ConnectionState, MediaStream, PeerEntry, PeerSession,
    SessionConfig,
};
use peerstream_loopback::LoopbackNetwork;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// PeerStream loopback probe
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of sessions to start
    #[arg(short, long, default_value_t = 3, env = "PEERSTREAM_PEERS")]
    peers: usize,

    /// Session config (TOML); `peer_id` is used as a prefix
    #[arg(short, long, env = "PEERSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Also call every other peer from the first one
    #[arg(long, default_value_t = false)]
    call: bool,

    /// Drop the last peer's signalling link once everything is connected
    #[arg(long, default_value_t = false)]
    drop_signalling: bool,

    /// How long to let events settle before tearing down, in milliseconds
    #[arg(long, default_value_t = 200)]
    settle_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "PEERSTREAM_LOG_LEVEL")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("peerstream-probe")
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run(args))
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.peers < 2 {
        bail!("--peers must be at least 2, got {}", args.peers);
    }

    let base = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let prefix = base.peer_id.clone().unwrap_or_else(|| "probe".to_string());

    let network = LoopbackNetwork::new();
    let mut sessions = Vec::with_capacity(args.peers);
    let mut watchers = Vec::new();

    for index in 0..args.peers {
        let id = format!("{}-{}", prefix, index);
        let config = SessionConfig {
            peer_id: Some(id.clone()),
            ..base.clone()
        };
        let session = PeerSession::new(config, network.factory())
            .with_context(|| format!("failed to start session {}", id))?;

        watchers.push(watch_state(id.clone(), &session));
        watchers.push(watch_peers(id.clone(), &session));
        sessions.push((id, session));
    }

    wait_until_open(&sessions).await?;
    info!("All {} sessions open: {:?}", args.peers, network.online_peers());

    let (caller_id, caller) = &sessions[0];
    for (id, _) in sessions.iter().skip(1) {
        caller.connect(id.as_str(), ConnectOptions::default())?;
        if args.call {
            caller.call(id.as_str(), CallOptions::default())?;
        }
    }
    info!("{} reached out to {} peers", caller_id, args.peers - 1);

    tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

    if args.drop_signalling {
        if let Some((id, _)) = sessions.last() {
            info!("Dropping signalling for {}", id);
            network.disconnect_peer(id)?;
            tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;
        }
    }

    for (id, session) in &sessions {
        let peers = session.peer_snapshot();
        println!(
            "{:<16} state={:<24} peers=[{}]",
            id,
            session.current_state().to_string(),
            describe(&peers)
        );
    }

    for (id, session) in &sessions {
        info!("Destroying {}", id);
        session.destroy();
    }
    for watcher in watchers {
        if let Err(e) = watcher.await {
            warn!("Watcher task failed: {}", e);
        }
    }

    Ok(())
}

/// Wait for every session to report `Open`
async fn wait_until_open(sessions: &[(String, PeerSession)]) -> anyhow::Result<()> {
    for (id, session) in sessions {
        let mut states = session.state();
        let opened = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(state) = states.next().await {
                match state {
                    ConnectionState::Open { .. } => return Ok(()),
                    ConnectionState::Errored { error, .. } => return Err(error),
                    _ => {}
                }
            }
            Ok(())
        })
        .await
        .with_context(|| format!("{} did not open in time", id))?;
        opened.with_context(|| format!("{} failed to open", id))?;
    }
    Ok(())
}

fn watch_state(id: String, session: &PeerSession) -> JoinHandle<()> {
    let mut states = session.state();
    tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("{:<16} state -> {}", id, state);
        }
    })
}

/// Print registry changes and answer incoming calls with a fake microphone
fn watch_peers(id: String, session: &PeerSession) -> JoinHandle<()> {
    let mut peers = session.peers();
    tokio::spawn(async move {
        while let Some(snapshot) = peers.next().await {
            println!("{:<16} peers -> [{}]", id, describe(&snapshot));

            for entry in &snapshot {
                if let Some(pending) = entry.pending_call() {
                    let mic = MediaStream::audio(format!("{}-mic", id));
                    if let Some(media) = pending.answer(mic) {
                        info!("{} answered call with {}", id, media.peer());
                    }
                }
            }
        }
    })
}

fn describe(peers: &[PeerEntry]) -> String {
    peers
        .iter()
        .map(|entry| {
            let mut parts = Vec::new();
            if entry.data_channel.is_some() {
                parts.push("data");
            }
            if entry.pending_call().is_some() {
                parts.push("call:pending");
            }
            if entry.media_channel().is_some() {
                parts.push("call:active");
            }
            format!("{}({})", entry.peer_id, parts.join("+"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
