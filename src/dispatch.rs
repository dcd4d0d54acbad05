//! Listener channels and the dispatcher that fires them.
//!
//! External consumers observe the session by registering callbacks
//! against named channels. Registration is de-duplicated by callback
//! identity and returns a [`ListenerHandle`] for explicit removal, so a
//! connection can scope its subscriptions to its own lifetime. Fires
//! run in registration order with per-callback panic isolation; the
//! `graphic` channel is served asynchronously by one bounded worker so
//! a burst of answers can never pile up tasks or block the submitter.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bank::{QuestionPrompt, QuestionReport};
use crate::roster::Standing;
use crate::session::Phase;

/// Depth of the graphic broadcast queue; fires beyond this are dropped.
const GRAPHIC_QUEUE_DEPTH: usize = 64;

/// The named listener channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A question opened its answer window.
    Question,
    /// An answer landed; tallies changed.
    Graphic,
    /// Reserved for wait-screen consumers; nothing in the engine fires
    /// it, but external callers may through [`Dispatcher::fire`].
    Wait,
    /// Standings changed (after each question, and once at the end).
    Score,
    /// The session is over.
    End,
}

impl Channel {
    /// Every channel, in slot order.
    pub const ALL: [Self; 5] = [
        Self::Question,
        Self::Graphic,
        Self::Wait,
        Self::Score,
        Self::End,
    ];

    /// Stable lowercase name, used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Graphic => "graphic",
            Self::Wait => "wait",
            Self::Score => "score",
            Self::End => "end",
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Question => 0,
            Self::Graphic => 1,
            Self::Wait => 2,
            Self::Score => 3,
            Self::End => 4,
        }
    }
}

/// Event delivered to listeners; the shape varies by channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Fired on the `question` channel when an answer window opens.
    Question {
        /// The question now accepting answers.
        question: QuestionPrompt,
        /// Length of the answer window in seconds.
        seconds: u64,
    },
    /// Fired on the `score` channel after each answer window closes and
    /// once more when the session ends.
    Score {
        /// Ranked standings at this point.
        standings: Vec<Standing>,
        /// 1-based number of the question just played.
        current: usize,
        /// Total questions in this session.
        total: usize,
        /// Phase at fire time (`running` mid-game, `end` at the finish).
        phase: Phase,
    },
    /// Fired on the `graphic` channel after an answer is recorded.
    Graphic {
        /// The answered question with updated tallies.
        question: QuestionReport,
    },
    /// Payload-free event for the `wait` channel.
    Wait,
    /// Fired on the `end` channel after the closing grace period.
    End,
}

/// Callback registered against a channel.
pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Proof of registration; pass to [`Dispatcher::unregister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    channel: Channel,
    id: u64,
}

struct SlotEntry {
    id: u64,
    callback: Listener,
}

struct ChannelTable {
    slots: [Vec<SlotEntry>; 5],
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| Vec::new()),
        }
    }
}

#[derive(Default)]
struct Shared {
    // std::sync::Mutex is intentional: held briefly to snapshot or edit
    // the listener lists, never across .await points.
    table: Mutex<ChannelTable>,
    next_id: AtomicU64,
}

/// Registry of listeners across the five channels.
///
/// Cheap to clone; clones share the same channel table and graphic
/// worker.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    graphic_tx: mpsc::Sender<SessionEvent>,
}

impl Dispatcher {
    /// Creates the dispatcher and spawns its graphic worker.
    ///
    /// Must be called inside a tokio runtime. The worker exits when the
    /// last dispatcher clone is dropped.
    #[must_use]
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        let (graphic_tx, mut graphic_rx) = mpsc::channel::<SessionEvent>(GRAPHIC_QUEUE_DEPTH);

        let worker_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(event) = graphic_rx.recv().await {
                fire_table(&worker_shared, Channel::Graphic, &event);
            }
            debug!("graphic worker stopped");
        });

        Self { shared, graphic_tx }
    }

    /// Registers `callback` on `channel`.
    ///
    /// Returns `None` when this exact callback (same allocation) is
    /// already registered there; the existing registration stands.
    pub fn register(&self, callback: Listener, channel: Channel) -> Option<ListenerHandle> {
        let mut table = self.lock_table();
        let slots = &mut table.slots[channel.slot()];
        if slots
            .iter()
            .any(|entry| Arc::ptr_eq(&entry.callback, &callback))
        {
            return None;
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        slots.push(SlotEntry { id, callback });
        debug!(channel = channel.as_str(), listener = id, "listener registered");
        Some(ListenerHandle { channel, id })
    }

    /// Removes a registration. Returns `false` when the handle no longer
    /// names a live registration (already unregistered, or wiped by a
    /// session reset).
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        let mut table = self.lock_table();
        let slots = &mut table.slots[handle.channel.slot()];
        let before = slots.len();
        slots.retain(|entry| entry.id != handle.id);
        let removed = before != slots.len();
        if removed {
            debug!(
                channel = handle.channel.as_str(),
                listener = handle.id,
                "listener unregistered"
            );
        }
        removed
    }

    /// Invokes every listener on `channel` in registration order.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    pub fn fire(&self, channel: Channel, event: &SessionEvent) {
        fire_table(&self.shared, channel, event);
    }

    /// Queues a graphic broadcast for the worker.
    ///
    /// Never blocks: when the queue is full the broadcast is dropped and
    /// logged, and the submitting caller proceeds untouched.
    pub fn enqueue_graphic(&self, report: QuestionReport) {
        let event = SessionEvent::Graphic { question: report };
        match self.graphic_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("graphic queue full; dropping broadcast");
                counter!("quizroom_graphic_drops_total").increment(1);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("graphic worker gone; dropping broadcast");
            }
        }
    }

    /// Empties the `question`, `graphic`, and `wait` channels. Score and
    /// end subscriptions survive, so long-lived scoreboard and
    /// end-screen connections keep streaming across session resets.
    pub fn clear_transient(&self) {
        let mut table = self.lock_table();
        for channel in [Channel::Question, Channel::Graphic, Channel::Wait] {
            table.slots[channel.slot()].clear();
        }
    }

    /// Number of live registrations on `channel`.
    #[must_use]
    pub fn listener_count(&self, channel: Channel) -> usize {
        self.lock_table().slots[channel.slot()].len()
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, ChannelTable> {
        self.shared.table.lock().expect("listener table lock poisoned")
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn fire_table(shared: &Shared, channel: Channel, event: &SessionEvent) {
    // Snapshot under the lock, invoke outside it, so a listener may
    // register or unregister from inside its own callback.
    let callbacks: Vec<(u64, Listener)> = {
        let table = shared.table.lock().expect("listener table lock poisoned");
        table.slots[channel.slot()]
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.callback)))
            .collect()
    };

    for (id, callback) in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
            warn!(
                channel = channel.as_str(),
                listener = id,
                "listener panicked; continuing with the rest"
            );
        }
    }
    counter!("quizroom_listener_fires_total", "channel" => channel.as_str()).increment(1);
}
