//! Progress channel for one publish run
//!
//! A [`ProgressChannel`] is the producing half of the run's event
//! stream: one producer (the engine task), one consumer (whoever holds
//! the receiver). Sends to a consumer that went away are dropped
//! silently; the run carries on and finishes regardless. There is no
//! replay: a consumer arriving after the terminal event receives
//! nothing.
//!
//! [`ProgressChannel::finish`] takes the channel by value, so emitting
//! a second terminal event is a compile error rather than a runtime
//! invariant.

use tokio::sync::mpsc;

use cardpress_core::domain::ProgressEvent;

/// Bounded capacity of the event stream
///
/// Large enough that a briefly stalled consumer never back-pressures an
/// upload; small enough that an absent consumer costs bounded memory.
const CHANNEL_CAPACITY: usize = 64;

/// Producing side of a publish run's event stream
pub struct ProgressChannel {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressChannel {
    /// Creates a channel pair for one run
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Emits a `start` event for a track
    pub async fn track_started(&self, current: u32, total: u32, title: &str) {
        self.send(ProgressEvent::TrackStarted {
            current,
            total,
            title: title.to_string(),
        })
        .await;
    }

    /// Emits a `log` event carrying one pipeline step line
    pub async fn track_log(&self, current: u32, total: u32, title: &str, message: &str) {
        self.send(ProgressEvent::TrackLog {
            current,
            total,
            title: title.to_string(),
            message: message.to_string(),
        })
        .await;
    }

    /// Emits a `complete` event for a track
    pub async fn track_completed(&self, current: u32, total: u32, title: &str) {
        self.send(ProgressEvent::TrackCompleted {
            current,
            total,
            title: title.to_string(),
        })
        .await;
    }

    /// Emits a per-track `error` event; the run continues
    pub async fn track_failed(&self, current: u32, total: u32, title: &str, error: &str) {
        self.send(ProgressEvent::TrackFailed {
            current,
            total,
            title: title.to_string(),
            error: error.to_string(),
        })
        .await;
    }

    /// Emits the terminal event and closes the stream
    ///
    /// Consumes the channel: no further events can be produced for this
    /// run. The receiver observes the event followed by end-of-stream.
    pub async fn finish(self, event: ProgressEvent) {
        debug_assert!(event.is_terminal(), "finish takes terminal events only");
        let _ = self.tx.send(event).await;
    }

    /// A disconnected consumer never fails the run
    async fn send(&self, event: ProgressEvent) {
        let _ = self.tx.send(event).await;
    }
}
