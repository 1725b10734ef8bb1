//! Error taxonomy for the bridge.
//!
//! Only the failures a caller can act on surface here. Permission
//! violations, foreign-origin messages, unknown message kinds and
//! unregistering unknown events are absorbed where they happen and logged.

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A live bridge already exists for this room and the duplicate policy rejects inserts.
    #[error("iframe bridge already inserted in room {room_id}")]
    AlreadyInserted { room_id: String },
    /// The room's replicated attributes do not match the bridge attribute schema.
    #[error("invalid bridge attributes: {0}")]
    InvalidAttributes(#[from] serde_json::Error),
    /// The room carries no bridge attributes to attach to.
    #[error("room has no bridge attributes")]
    MissingAttributes,
    /// Insert options failed validation.
    #[error("invalid insert options: {0}")]
    InvalidOptions(String),
    /// The bridge was destroyed.
    #[error("iframe bridge destroyed")]
    Destroyed,
    /// Environment configuration could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),
}
