//! Event replay runtime
//!
//! The controller runs on its own task and owns all forwarding state; events
//! reach it in order over an mpsc channel. Switch commands leave through a
//! second channel to a writer task that prints each one as a JSON line and
//! applies it to a simulated fabric.

use crate::auth::{FileMembership, MembershipProvider, StaticMembership};
use crate::config::Config;
use crate::controller::{Controller, ControllerEvent, Policy};
use crate::openflow::{Dpid, SimulatedFabric, SwitchChannel, SwitchCommand};
use crate::telemetry::MetricsRegistry;
use crate::topology::LoggingTopology;
use crate::{Error, Result};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Depth of the inbound event queue
const EVENT_QUEUE: usize = 1024;

/// What a replay run did
#[derive(Debug)]
pub struct ReplaySummary<W> {
    pub events: usize,
    /// Lines that were not valid events
    pub skipped_lines: usize,
    pub commands: usize,
    /// Commands the simulated switches refused
    pub rejected: usize,
    pub fabric: SimulatedFabric,
    pub metrics: Vec<(String, u64)>,
    pub output: W,
}

#[derive(Serialize)]
struct CommandRecord<'a> {
    dpid: Dpid,
    #[serde(flatten)]
    command: &'a SwitchCommand,
}

struct WriterOutcome<W> {
    commands: usize,
    rejected: usize,
    fabric: SimulatedFabric,
    output: W,
}

/// Membership provider selected by `[auth]`
pub fn membership_provider(config: &Config) -> Box<dyn MembershipProvider + Send> {
    match &config.auth.membership_file {
        Some(path) => Box::new(FileMembership::new(path.clone())),
        None => {
            warn!("no membership file configured, sessions will not authorize anyone");
            Box::new(StaticMembership::new())
        }
    }
}

/// Replay a JSON-lines event stream through a fresh controller.
pub async fn replay<R, W>(config: &Config, events: R, output: W) -> Result<ReplaySummary<W>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let metrics = Arc::new(MetricsRegistry::new());
    let bridges = config.bridge_table()?;

    let (command_tx, command_rx) = mpsc::unbounded_channel::<(Dpid, SwitchCommand)>();
    let mut controller = Controller::new(
        command_tx,
        membership_provider(config),
        Policy::from(config),
        config.session_ttl(),
        metrics.clone(),
    );

    let mut topology = LoggingTopology::new();
    let applied = controller.configure_bridges(&mut topology, &bridges);
    info!("configured {} bridge(s)", applied);

    let writer = tokio::spawn(write_commands(command_rx, output));

    let (event_tx, mut event_rx) = mpsc::channel::<ControllerEvent>(EVENT_QUEUE);
    let control = tokio::spawn(async move {
        let mut handled = 0usize;
        while let Some(event) = event_rx.recv().await {
            controller.handle_event(event);
            handled += 1;
        }
        handled
    });

    let mut skipped_lines = 0;
    let mut lines = events.lines();
    let mut lineno = 0;
    while let Some(line) = lines.next_line().await? {
        lineno += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match ControllerEvent::from_json_line(line) {
            Ok(event) => {
                if event_tx.send(event).await.is_err() {
                    warn!("controller task stopped, ending replay at line {}", lineno);
                    break;
                }
            }
            Err(e) => {
                warn!("line {}: {}", lineno, e);
                skipped_lines += 1;
            }
        }
    }
    drop(event_tx);

    let events = control.await.map_err(join_error)?;
    let outcome = writer.await.map_err(join_error)??;

    let metrics = metrics.export();
    for (name, value) in &metrics {
        if *value > 0 {
            info!("{} = {}", name, value);
        } else {
            debug!("{} = {}", name, value);
        }
    }

    Ok(ReplaySummary {
        events,
        skipped_lines,
        commands: outcome.commands,
        rejected: outcome.rejected,
        fabric: outcome.fabric,
        metrics,
        output: outcome.output,
    })
}

async fn write_commands<W>(
    mut commands: mpsc::UnboundedReceiver<(Dpid, SwitchCommand)>,
    mut output: W,
) -> Result<WriterOutcome<W>>
where
    W: AsyncWrite + Unpin,
{
    let mut fabric = SimulatedFabric::new();
    let mut sent = 0;
    let mut rejected = 0;

    while let Some((dpid, command)) = commands.recv().await {
        let record = CommandRecord {
            dpid,
            command: &command,
        };
        let mut line =
            serde_json::to_string(&record).map_err(|e| Error::Parse(e.to_string()))?;
        line.push('\n');
        output.write_all(line.as_bytes()).await?;

        if let Err(e) = fabric.send(dpid, command) {
            warn!("{}", e);
            rejected += 1;
        }
        sent += 1;
    }
    output.flush().await?;

    Ok(WriterOutcome {
        commands: sent,
        rejected,
        fabric,
        output,
    })
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, e))
}
