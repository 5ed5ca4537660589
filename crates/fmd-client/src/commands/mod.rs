//! Device commands and the wipe interlock.

mod gateway;
mod interlock;
mod kinds;
mod pin;

use chrono::{DateTime, Utc};

pub use gateway::CommandGateway;
pub use interlock::{InterlockStatus, SafetyInterlock};
pub use kinds::{
    sanitize_lock_message, Camera, CommandKind, RingerMode, MAX_LOCK_MESSAGE_LEN,
};
pub use pin::{validate_pin, RECOMMENDED_PIN_LEN};

/// Server acceptance of a command.
///
/// This does not mean the device executed it: the protocol has no
/// device-side acknowledgment. Check for effects (a new location, a photo)
/// separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Command verb, without arguments
    pub command: String,
    pub accepted_at: DateTime<Utc>,
}
