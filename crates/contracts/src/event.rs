//! Scene notifications delivered to the session by message passing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TryRecvError};

use crate::ActorId;

/// Lifecycle notifications pushed by the host scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// A new actor entered the scene
    Spawned(ActorId),
    /// An actor is being removed
    Destroyed(ActorId),
    /// An actor was hit by another one (or by nothing in particular)
    Hit {
        actor: ActorId,
        other: Option<ActorId>,
    },
}

impl SceneEvent {
    pub fn actor(&self) -> ActorId {
        match *self {
            Self::Spawned(id) | Self::Destroyed(id) => id,
            Self::Hit { actor, .. } => actor,
        }
    }
}

/// Sending half handed to the host scene
///
/// Events sent while the receiving side is paused are dropped on the spot
/// instead of queueing.
#[derive(Debug, Clone)]
pub struct SceneEventSender {
    tx: mpsc::UnboundedSender<SceneEvent>,
    accepting: Arc<AtomicBool>,
}

impl SceneEventSender {
    /// Deliver `event`; `Err` only once the receiver is gone
    pub fn send(&self, event: SceneEvent) -> Result<(), SendError<SceneEvent>> {
        if !self.accepting.load(Ordering::Acquire) {
            return if self.tx.is_closed() {
                Err(SendError(event))
            } else {
                Ok(())
            };
        }
        self.tx.send(event)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}

/// Receiving half drained by the session every tick
#[derive(Debug)]
pub struct SceneEventReceiver {
    rx: mpsc::UnboundedReceiver<SceneEvent>,
    accepting: Arc<AtomicBool>,
}

impl SceneEventReceiver {
    pub fn try_recv(&mut self) -> Result<SceneEvent, TryRecvError> {
        self.rx.try_recv()
    }

    /// Open or pause delivery for every sender of this channel
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Events buffered and not yet received
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything buffered; returns how many events were dropped
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// Create a connected event channel, accepting events
pub fn scene_event_channel() -> (SceneEventSender, SceneEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let accepting = Arc::new(AtomicBool::new(true));
    (
        SceneEventSender {
            tx,
            accepting: accepting.clone(),
        },
        SceneEventReceiver { rx, accepting },
    )
}
