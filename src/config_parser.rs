use crate::{BookingError, ConcertSeed, Result, ServiceConfig, StoreBackend};
use config::ConfigError;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Prefix of environment variables that override file settings, e.g. `TICKETS_REPLY_TIMEOUT_MS`.
pub const ENV_PREFIX: &str = "TICKETS";

/// Parse Java properties file into ServiceConfig
pub fn parse_properties_file<P: AsRef<Path>>(path: P, application_id: &str) -> Result<ServiceConfig> {
    let properties = read_properties(path.as_ref())?;

    let mut config = ServiceConfig {
        application_id: application_id.to_string(),
        ..ServiceConfig::default()
    };

    for (key, value) in properties {
        apply_property(&mut config, key, value)?;
    }

    Ok(config)
}

/// Merge a second properties file over an existing config. Later values win.
pub fn merge_properties<P: AsRef<Path>>(mut config: ServiceConfig, path: P) -> Result<ServiceConfig> {
    let properties = read_properties(path.as_ref())?;

    for (key, value) in properties {
        apply_property(&mut config, key, value)?;
    }

    Ok(config)
}

/// Apply `TICKETS_*` environment variables on top of the config.
pub fn apply_env_overrides(config: ServiceConfig) -> Result<ServiceConfig> {
    let source = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;
    apply_overrides(config, &source)
}

/// Apply overrides from an already built `config::Config`.
///
/// Recognized keys: `bootstrap_servers`, `requests_topic`, `responses_topic`,
/// `reply_timeout_ms`, `processing_timeout_ms`, `http_host`, `http_port`,
/// `store_backend`, `state_dir`, `concerts`.
pub fn apply_overrides(mut config: ServiceConfig, source: &config::Config) -> Result<ServiceConfig> {
    if let Some(value) = lookup(source.get_string("bootstrap_servers"))? {
        config.kafka.bootstrap_servers = value;
    }
    if let Some(value) = lookup(source.get_string("requests_topic"))? {
        config.requests_topic = value;
    }
    if let Some(value) = lookup(source.get_string("responses_topic"))? {
        config.responses_topic = value;
    }
    if let Some(value) = lookup(source.get_int("reply_timeout_ms"))? {
        config.reply_timeout_ms = non_negative("reply_timeout_ms", value)?;
    }
    if let Some(value) = lookup(source.get_int("processing_timeout_ms"))? {
        config.processing_timeout_ms = non_negative("processing_timeout_ms", value)?;
    }
    if let Some(value) = lookup(source.get_string("http_host"))? {
        config.http_host = value;
    }
    if let Some(value) = lookup(source.get_int("http_port"))? {
        config.http_port = u16::try_from(value)
            .map_err(|_| BookingError::InvalidArgument(format!("http_port out of range: {}", value)))?;
    }
    if let Some(value) = lookup(source.get_string("store_backend"))? {
        config.store_backend = parse_backend(&value)?;
    }
    if let Some(value) = lookup(source.get_string("state_dir"))? {
        config.state_dir = value;
    }
    if let Some(value) = lookup(source.get_string("concerts"))? {
        config.concerts = parse_concert_list(&value)?;
    }

    Ok(config)
}

/// A missing key is skipped; a present but malformed one is an error.
fn lookup<T>(found: std::result::Result<T, ConfigError>) -> Result<Option<T>> {
    match found {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse `name:capacity` pairs separated by commas.
pub fn parse_concert_list(value: &str) -> Result<Vec<ConcertSeed>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, capacity) = entry.rsplit_once(':').ok_or_else(|| {
                BookingError::InvalidArgument(format!("Concert entry must be name:capacity, got '{}'", entry))
            })?;
            let capacity = capacity.trim().parse::<u32>().map_err(|e| {
                BookingError::InvalidArgument(format!("Invalid capacity in '{}': {}", entry, e))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(BookingError::InvalidArgument(format!("Concert name missing in '{}'", entry)));
            }
            Ok(ConcertSeed {
                name: name.to_string(),
                capacity,
            })
        })
        .collect()
}

fn read_properties(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path).map_err(|e| {
        BookingError::InvalidArgument(format!("Failed to open config file {:?}: {}", path, e))
    })?;

    java_properties::read(BufReader::new(file))
        .map_err(|e| BookingError::InvalidArgument(format!("Failed to parse properties: {}", e)))
}

fn apply_property(config: &mut ServiceConfig, key: String, value: String) -> Result<()> {
    match key.as_str() {
        "bootstrap.servers" => config.kafka.bootstrap_servers = value,
        "security.protocol" => config.kafka.security_protocol = Some(value),
        "sasl.mechanism" => config.kafka.sasl_mechanism = Some(value),
        "sasl.username" => config.kafka.sasl_username = Some(value),
        "sasl.password" => config.kafka.sasl_password = Some(value),
        "ssl.ca.location" => config.kafka.ssl_ca_location = Some(value),
        "requests.topic" => config.requests_topic = value,
        "responses.topic" => config.responses_topic = value,
        "reply.timeout.ms" => config.reply_timeout_ms = parse_millis(&key, &value)?,
        "processing.timeout.ms" => config.processing_timeout_ms = parse_millis(&key, &value)?,
        "http.host" => config.http_host = value,
        "http.port" => {
            config.http_port = value.trim().parse().map_err(|e| {
                BookingError::InvalidArgument(format!("Invalid http.port '{}': {}", value, e))
            })?;
        }
        "store.backend" => config.store_backend = parse_backend(&value)?,
        "state.dir" => config.state_dir = value,
        "concerts" => config.concerts = parse_concert_list(&value)?,
        _ => {
            debug!("Passing '{}' through to the Kafka client", key);
            config.kafka.additional_properties.insert(key, value);
        }
    }
    Ok(())
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|e| {
        BookingError::InvalidArgument(format!("Invalid {} '{}': {}", key, value, e))
    })
}

fn parse_backend(value: &str) -> Result<StoreBackend> {
    StoreBackend::parse(value)
        .ok_or_else(|| BookingError::InvalidArgument(format!("Unknown store backend: {}", value)))
}

fn non_negative(key: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| BookingError::InvalidArgument(format!("{} must not be negative", key)))
}
