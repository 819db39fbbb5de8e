//! Quiz session client.
//!
//! Provides the WebSocket session channel, the inbound event router, the
//! round scheduler and the state they maintain.

mod channel;
mod events;
mod router;
mod scheduler;
mod state;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{ConnectionState, SessionChannel};
pub use events::{EventBus, SessionEvent, Subscription};
pub use router::{Directive, EventRouter};
pub use scheduler::{
    NotificationItem, NotificationQueue, RoundPhase, RoundScheduler, RoundTimer, TickOutcome,
};
pub use state::{AnswerState, ChatLine, SessionIdentity, SessionSnapshot, SessionStore, SessionView};
pub use transport::{
    CloseCode, Connector, Transport, TransportEvent, WebSocketConnector, WebSocketTransport,
};
