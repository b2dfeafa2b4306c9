// Kafka topic definitions
pub struct Topics;

impl Topics {
    pub const REQUESTS: &'static str = "requests";
    pub const RESPONSES: &'static str = "responses";
}

// Key prefixes used by the RocksDB event store
pub struct Stores;

impl Stores {
    pub const CONCERT_PREFIX: &'static str = "concert:";
    pub const REGISTRATION_PREFIX: &'static str = "registration:";
}

pub fn concert_key(concert: &str) -> String {
    format!("{}{}", Stores::CONCERT_PREFIX, concert)
}

// The concert name is length-prefixed so that no two (concert, username) pairs share a key.
pub fn registration_key(concert: &str, username: &str) -> String {
    format!("{}{}:{}#{}", Stores::REGISTRATION_PREFIX, concert.len(), concert, username)
}
