//! Presentation boundary: outbound full-state pushes and inbound dispatch

pub mod broadcaster;
pub mod dispatcher;

pub use broadcaster::StateBroadcaster;
pub use dispatcher::MessageDispatcher;
