//! HTTP and WebSocket gateway for Rollcall.
//!
//! Connections authenticate once at handshake, are tracked in the
//! [`ConnectionRegistry`], and send protocol events that the
//! [`EventDispatcher`] applies to the session and fans out via [`Delivery`].

/// Registry of live connections.
pub mod connection;
/// Unicast and broadcast delivery.
pub mod delivery;
/// Bearer token authentication.
pub mod middleware;
/// Wire envelopes.
pub mod protocol;
/// Event dispatch.
pub mod router;
/// HTTP and WebSocket server.
pub mod server;

pub use connection::{ConnectionId, ConnectionRegistry, Peer};
pub use delivery::{Delivery, Dispatch, Target};
pub use middleware::{TokenEntry, TokenVerifier};
pub use protocol::{InboundEvent, OutboundEvent};
pub use router::{EventDispatcher, MessageRouter};
pub use server::GatewayServer;
