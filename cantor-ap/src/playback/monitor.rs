//! Background timers feeding the coordinator

use super::events::Command;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

/// Start the progress sampler for `generation`
///
/// Sends a `ProgressTick` every `interval` until aborted or the coordinator
/// is gone. The caller must abort the handle when leaving a sampling state.
pub(crate) fn start_progress_sampler(
    tx: mpsc::UnboundedSender<Command>,
    generation: u64,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        debug!(generation, "Progress sampler started ({}ms interval)", interval.as_millis());

        loop {
            ticker.tick().await;
            if tx.send(Command::ProgressTick { generation }).is_err() {
                break;
            }
        }
    })
}

/// Deliver `SegmentPauseElapsed` after `pause`
pub(crate) fn start_segment_pause(
    tx: mpsc::UnboundedSender<Command>,
    generation: u64,
    next_index: usize,
    pause: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        time::sleep(pause).await;
        let _ = tx.send(Command::SegmentPauseElapsed { generation, next_index });
    })
}
