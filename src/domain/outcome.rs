//! Reply strings exchanged on the responses topic.
//!
//! Replies carry no error codes, only text, so the strings below are the wire
//! contract between the dispatcher and every caller of the broker.

pub const PLACE_RESERVED: &str = "Place reserved";
pub const SOLD_OUT: &str = "sold out";
pub const NO_SUCH_CONCERT: &str = "no such concert";
pub const ALREADY_REGISTERED: &str = "user is already registered";
pub const PROCESSING_DEADLINE_EXCEEDED: &str = "processing deadline exceeded";

// Older dispatchers spelled it this way.
const ALREADY_REGISTERED_LEGACY: &str = "user is already registred";

/// Caller-side reading of a reply string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Reserved,
    SoldOut,
    NoSuchConcert,
    AlreadyRegistered,
    Failed(String),
}

impl BookingOutcome {
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim() {
            PLACE_RESERVED => Self::Reserved,
            SOLD_OUT => Self::SoldOut,
            NO_SUCH_CONCERT => Self::NoSuchConcert,
            ALREADY_REGISTERED | ALREADY_REGISTERED_LEGACY => Self::AlreadyRegistered,
            other => Self::Failed(other.to_string()),
        }
    }
}
