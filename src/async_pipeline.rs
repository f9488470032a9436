// THEORY:
// The `async_pipeline` module lets a `MotionEngine` live on its own tokio task so a
// capture loop never has to wait for analysis. Frames flow in over a bounded `mpsc`
// queue and every zone transition flows out over a `broadcast` channel, so any
// number of consumers (UI, sound, logging) can listen without owning the engine.
//
// Key architectural principles:
// 1.  **Ticks Stay Synchronous**: the task simply pulls a frame and calls `tick`.
//     Each tick still runs to completion before the next frame is looked at, and
//     change handlers registered on the engine still fire inside the tick.
// 2.  **Caller-Owned Drop Policy**: `submit` waits for room in the queue, `offer`
//     drops the frame when the queue is full. Which one to use is the capture
//     loop's decision.
// 3.  **Engine Comes Back**: `shutdown` closes the queue, lets the task drain what
//     is already queued, and hands the engine back to the caller.

use crate::core_modules::active_zone::ZoneSnapshot;
use crate::core_modules::frame::Frame;
use crate::error::{EngineError, Result};
use crate::pipeline::MotionEngine;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives `engine` from any stream of frames until the stream ends, publishing every
/// transition on `events`. Returns the engine once the stream is exhausted.
pub async fn run<S>(
    mut engine: MotionEngine,
    frames: S,
    events: broadcast::Sender<ZoneSnapshot>,
) -> Result<MotionEngine>
where
    S: Stream<Item = Frame>,
{
    futures::pin_mut!(frames);
    while let Some(frame) = frames.next().await {
        let report = engine.tick(frame)?;
        for transition in report.transitions {
            // No subscribers is not an error; transitions are also in the zones.
            let _ = events.send(transition);
        }
    }
    info!(frames = engine.frame_count(), "frame stream ended");
    Ok(engine)
}

/// Handle to an engine running on a background task.
#[derive(Debug)]
pub struct EngineTask {
    frames: mpsc::Sender<Frame>,
    events: broadcast::Sender<ZoneSnapshot>,
    task: JoinHandle<Result<MotionEngine>>,
}

/// Moves `engine` onto a tokio task fed by a queue holding up to `capacity` frames.
///
/// Must be called from within a tokio runtime.
pub fn spawn(engine: MotionEngine, capacity: usize) -> EngineTask {
    let (frames, mut receiver) = mpsc::channel::<Frame>(capacity.max(1));
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let stream = futures::stream::poll_fn(move |cx| receiver.poll_recv(cx));
    let task = tokio::spawn(run(engine, stream, events.clone()));
    EngineTask {
        frames,
        events,
        task,
    }
}

fn stopped() -> EngineError {
    EngineError::TaskFailed("engine task is no longer running".to_string())
}

impl EngineTask {
    /// A receiver for every transition published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ZoneSnapshot> {
        self.events.subscribe()
    }

    /// Queues a frame, waiting for room if the queue is full.
    pub async fn submit(&self, frame: Frame) -> Result<()> {
        self.frames.send(frame).await.map_err(|_| stopped())
    }

    /// Queues a frame if there is room. Returns `false` when the frame was dropped.
    pub fn offer(&self, frame: Frame) -> Result<bool> {
        match self.frames.try_send(frame) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("frame queue full, dropping frame");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(stopped()),
        }
    }

    /// Closes the queue, waits for queued frames to be processed and returns the engine.
    pub async fn shutdown(self) -> Result<MotionEngine> {
        let EngineTask { frames, task, .. } = self;
        drop(frames);
        task.await
            .map_err(|err| EngineError::TaskFailed(err.to_string()))?
    }
}
