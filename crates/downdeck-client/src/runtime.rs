//! Async driver for the push channel: the one interpreter of the
//! [`ChannelMachine`]'s effects. Owns the transport and the retry timer,
//! fans reconciliation input out to the store-owning task over an mpsc
//! channel, and honors a watch-based shutdown signal so a pending retry is
//! always cancelable.

use crate::channel::{ChannelEvent, ChannelMachine, ChannelState, Effect};
use crate::config::ClientConfig;
use downdeck_core::wire::{decode_batch, ProgressBatch, TaskPage, DEFAULT_MAX_FRAME_BYTES};
use futures_util::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A live push connection. `next_frame` returning `Ok(None)` means the
/// peer closed the connection.
pub trait TransportLink: Send {
    fn subscribe<'a>(&'a mut self, topic: &'a str) -> BoxFuture<'a, Result<(), TransportError>>;
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>>;
}

/// Connection factory for the push channel; the real implementation wraps
/// whatever socket stack the embedding application uses.
pub trait Transport: Send {
    fn connect(&mut self) -> BoxFuture<'_, Result<Box<dyn TransportLink>, TransportError>>;
}

/// Seam for the pull endpoint, used for the resynchronizing snapshot
/// reload right after every (re)connect.
pub trait SnapshotFetcher: Send {
    fn fetch_page(
        &mut self,
        page: u32,
        size: u32,
    ) -> BoxFuture<'_, Result<TaskPage, TransportError>>;
}

/// What the driver hands to the store-owning task, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotice {
    StateChanged(ChannelState),
    /// Resynchronization point: apply as a full snapshot load.
    Snapshot(TaskPage),
    /// Apply as an incremental merge.
    Batch(ProgressBatch),
}

/// Run the channel until shutdown or until the notice receiver goes away.
///
/// Each reconnect re-subscribes and reloads a snapshot before batches
/// resume, so consumers can treat every [`ChannelNotice::Snapshot`] as a
/// fresh baseline.
pub async fn run_channel<T, F>(
    mut transport: T,
    mut fetcher: F,
    config: ClientConfig,
    tx: mpsc::Sender<ChannelNotice>,
    mut shutdown: watch::Receiver<bool>,
) where
    T: Transport,
    F: SnapshotFetcher,
{
    let mut machine =
        ChannelMachine::with_delays(config.connect_retry_delay, config.reconnect_delay);
    let effects = machine.handle(ChannelEvent::ConnectRequested);
    debug_assert_eq!(effects, vec![Effect::OpenTransport]);
    if notify_state(&tx, &machine).await.is_err() {
        return;
    }

    loop {
        if *shutdown.borrow() {
            machine.handle(ChannelEvent::Teardown);
            break;
        }

        let connected = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    machine.handle(ChannelEvent::Teardown);
                    break;
                }
                continue;
            }
            connected = transport.connect() => connected,
        };

        let retry_after = match connected {
            Ok(mut link) => {
                let effects = machine.handle(ChannelEvent::TransportOpen);
                if notify_state(&tx, &machine).await.is_err() {
                    return;
                }
                info!(event = "channel_connected");

                let mut resync_failed = false;
                if effects.contains(&Effect::Resubscribe) {
                    if let Err(err) = resync(&mut *link, &mut fetcher, &config, &tx).await {
                        warn!(event = "channel_resync_error", error = %err);
                        resync_failed = true;
                    }
                }
                if !resync_failed {
                    match pump(&mut *link, &mut machine, &tx, &mut shutdown).await {
                        PumpOutcome::Closed => {}
                        PumpOutcome::Shutdown => {
                            machine.handle(ChannelEvent::Teardown);
                            break;
                        }
                    }
                }
                let effects = machine.handle(ChannelEvent::TransportClosed);
                if notify_state(&tx, &machine).await.is_err() {
                    return;
                }
                retry_delay(&effects)
            }
            Err(err) => {
                warn!(event = "channel_connect_error", error = %err);
                let effects = machine.handle(ChannelEvent::ConnectFailed(err.to_string()));
                if notify_state(&tx, &machine).await.is_err() {
                    return;
                }
                retry_delay(&effects)
            }
        };

        let Some(delay) = retry_after else {
            break;
        };
        let mut tore_down = false;
        {
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            // Cancels the pending retry.
                            machine.handle(ChannelEvent::Teardown);
                            tore_down = true;
                            break;
                        }
                    }
                    _ = &mut sleep => {
                        machine.handle(ChannelEvent::RetryElapsed);
                        break;
                    }
                }
            }
        }
        if tore_down {
            break;
        }
        if notify_state(&tx, &machine).await.is_err() {
            return;
        }
    }
    info!(event = "channel_stop");
}

enum PumpOutcome {
    Closed,
    Shutdown,
}

async fn resync<F: SnapshotFetcher>(
    link: &mut dyn TransportLink,
    fetcher: &mut F,
    config: &ClientConfig,
    tx: &mpsc::Sender<ChannelNotice>,
) -> Result<(), TransportError> {
    link.subscribe(&config.progress_topic).await?;
    debug!(event = "channel_subscribed", topic = %config.progress_topic);
    // A failed reload is not fatal; the view stays stale until the next
    // reconnect or caller-driven refresh.
    match fetcher.fetch_page(0, config.page_size).await {
        Ok(page) => {
            let _ = tx.send(ChannelNotice::Snapshot(page)).await;
        }
        Err(err) => warn!(event = "snapshot_reload_error", error = %err),
    }
    Ok(())
}

async fn pump(
    link: &mut dyn TransportLink,
    machine: &mut ChannelMachine,
    tx: &mpsc::Sender<ChannelNotice>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpOutcome {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return PumpOutcome::Shutdown;
                }
            }
            frame = link.next_frame() => match frame {
                Ok(Some(body)) => match decode_batch(&body, DEFAULT_MAX_FRAME_BYTES) {
                    Ok(batch) => {
                        machine.note_batch();
                        if tx.send(ChannelNotice::Batch(batch)).await.is_err() {
                            return PumpOutcome::Shutdown;
                        }
                    }
                    // A bad frame is skipped, not fatal to the channel.
                    Err(err) => warn!(event = "channel_decode_error", error = %err),
                },
                Ok(None) => {
                    info!(event = "channel_closed_by_peer");
                    return PumpOutcome::Closed;
                }
                Err(err) => {
                    warn!(event = "channel_read_error", error = %err);
                    return PumpOutcome::Closed;
                }
            }
        }
    }
}

async fn notify_state(
    tx: &mpsc::Sender<ChannelNotice>,
    machine: &ChannelMachine,
) -> Result<(), mpsc::error::SendError<ChannelNotice>> {
    tx.send(ChannelNotice::StateChanged(machine.state())).await
}

fn retry_delay(effects: &[Effect]) -> Option<Duration> {
    effects.iter().find_map(|effect| match effect {
        Effect::ScheduleRetry(delay) => Some(*delay),
        _ => None,
    })
}
