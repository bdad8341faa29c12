pub mod constants;
pub mod envelope;
pub mod events;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{ErrorBody, Message};
pub use events::{BackendErrorPayload, ConnectionStatus, ConnectionStatusPayload};
