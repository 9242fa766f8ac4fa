// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

//! Event bus and module plumbing shared by every shuttle tracking module.

use common::{
    position::PositionPtr,
    roster::RosterPtr,
    tracking::{AnchorView, DriverPosition, TrackingSession, TrackingState},
};
use strum_macros::EnumDiscriminants;
use tracing::debug;

/// Represents a high-level event in the system.
///
/// Each `Event` wraps an [`EventKind`], which defines the actual type
/// and data carried by the event.
///
/// This structure is designed to be passed through an [`EventBus`]
/// between asynchronous modules.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// The inner event type and associated data.
    pub kind: EventKind,
}

impl Event {
    /// Returns the payload free type of the event.
    pub fn event_type(&self) -> EventKindType {
        EventKindType::from(&self.kind)
    }
}

/// A thread-safe shared pointer to a [`DriverPosition`].
pub type DriverPositionPtr = std::sync::Arc<DriverPosition>;

/// A thread-safe shared pointer to a [`TrackingSession`] snapshot.
pub type TrackingSessionPtr = std::sync::Arc<TrackingSession>;

/// A thread-safe shared pointer to an [`AnchorView`].
pub type AnchorViewPtr = std::sync::Arc<AnchorView>;

/// Enumerates the different kinds of events that can be emitted
/// and transmitted via the [`EventBus`].
///
/// The derived [`EventKindType`] carries only the variant and is used to wait
/// for or match on a kind of event without caring about the payload.
#[derive(Clone, Debug, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(EventKindType), derive(Hash))]
pub enum EventKind {
    /// Indicates that a module shall terminate.
    QuitEvent,

    /// A fix of the active driver session.
    ///
    /// This is the candidate for upstream publication. Whoever publishes
    /// positions to the remote side subscribes to this event.
    PositionEvent(PositionPtr),

    /// The position of a driver, as supplied by the publishing channel.
    DriverPositionEvent(DriverPositionPtr),

    /// A roster snapshot after a poll, fresh or stale.
    RosterEvent(RosterPtr),

    /// Request of the display layer to switch location sharing on (`true`) or off.
    ToggleTrackingEvent(bool),

    /// The driver tracking state machine entered a new state.
    TrackingStateEvent(TrackingState),

    /// The driver tracking session changed.
    TrackingSessionEvent(TrackingSessionPtr),

    /// New display anchors for the viewer screen.
    AnchorsEvent(AnchorViewPtr),
}

/// Returns a reference to the payload of `$kind` if it is the variant `$variant`.
///
/// ```
/// use module_core::{EventKind, payload_ref};
///
/// let kind = EventKind::ToggleTrackingEvent(true);
/// assert_eq!(payload_ref!(kind, EventKind::ToggleTrackingEvent), Some(&true));
/// assert_eq!(payload_ref!(kind, EventKind::TrackingStateEvent), None);
/// ```
#[macro_export]
macro_rules! payload_ref {
    ($kind:expr, $variant:path) => {
        match &$kind {
            $variant(payload) => Some(payload),
            _ => None,
        }
    };
}

/// A simple asynchronous event bus for publishing and subscribing to [`Event`]s.
///
/// The event bus uses a [`tokio::sync::broadcast::channel`] under the hood,
/// allowing multiple receivers to listen for the same stream of events.
///
/// Each published event is cloned and distributed to all active subscribers.
/// If no subscribers exist at the time of publication, the event is discarded silently.
pub struct EventBus {
    /// The broadcast sender used internally to distribute events.
    sender: tokio::sync::broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new [`EventBus`] with a fixed buffer capacity of 100 messages.
    ///
    /// When the buffer is full, the oldest messages are dropped automatically
    /// as new ones are published.
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(100);
        EventBus { sender }
    }

    /// Subscribes to the event bus and returns a [`tokio::sync::broadcast::Receiver`].
    ///
    /// The returned receiver will receive all future events published after the
    /// subscription is created.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publishes an [`Event`] to all active subscribers.
    ///
    /// If no subscribers exist, the event is discarded silently.
    pub fn publish(&self, event: &Event) {
        let _ = self.sender.send(event.clone());
    }

    /// Returns a sender that publishes on this bus.
    ///
    /// Used by code that has to publish from outside a module, e.g. a signal handler.
    pub fn sender(&self) -> tokio::sync::broadcast::Sender<Event> {
        self.sender.clone()
    }

    /// Creates a [`ModuleCtx`] bound to this [`EventBus`].
    ///
    /// The returned context can be used by modules implementing [`Module`]
    /// to send and receive events within their execution scope.
    pub fn context(&self) -> ModuleCtx {
        ModuleCtx::new(self)
    }
}

/// Provides a default instance of [`EventBus`].
impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Defines the common interface for an asynchronous module
/// that can be executed and communicate via the [`EventBus`].
#[async_trait::async_trait]
pub trait Module {
    /// Runs the module asynchronously until completion.
    ///
    /// This function typically contains the module's main event loop,
    /// reacting to messages received through the [`ModuleCtx`].
    async fn run(&mut self) -> Result<(), ()>;
}

/// Provides a module-scoped context for interacting with the [`EventBus`].
///
/// Each `ModuleCtx` owns both a sender and a receiver, allowing the module
/// to both publish and listen for events concurrently.
pub struct ModuleCtx {
    /// The broadcast sender used to publish events.
    pub sender: tokio::sync::broadcast::Sender<Event>,

    /// The broadcast receiver used to listen for events.
    pub receiver: tokio::sync::broadcast::Receiver<Event>,
}

impl ModuleCtx {
    /// Constructs a new [`ModuleCtx`] from the given [`EventBus`].
    ///
    /// Clones the internal broadcast sender and creates a new receiver.
    pub fn new(event_bus: &EventBus) -> Self {
        ModuleCtx {
            sender: event_bus.sender.clone(),
            receiver: event_bus.subscribe(),
        }
    }

    /// Publishes `kind` on the bus.
    ///
    /// Returns an error if nobody listens, which callers usually ignore.
    pub fn publish_event(
        &self,
        kind: EventKind,
    ) -> Result<(), tokio::sync::broadcast::error::SendError<Event>> {
        debug!("Publishing {:?}", EventKindType::from(&kind));
        self.sender.send(Event { kind }).map(|_| ())
    }
}

pub mod test_helper;
