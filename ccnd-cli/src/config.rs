//! Environment-driven configuration (§6), loaded through the `config` crate
//! layered over defaults rather than ad-hoc `std::env::var` calls scattered
//! through the binary.

use config::{Config, Environment};
use log::LevelFilter;
use std::path::PathBuf;

const DEFAULT_LOCAL_PORT: u16 = 4485;
const DEFAULT_DATA_DIRECTORY: &str = "./ccnr-data";
const DEFAULT_GLOBAL_PREFIX: &str = "ccnx:/ccnr";

pub struct DaemonConfig {
    pub local_port: u16,
}

pub struct RepositoryConfig {
    pub directory: PathBuf,
    pub global_prefix: String,
    pub debug: LevelFilter,
}

/// Reads `CCN_LOCAL_PORT` (default 4485).
pub fn load_daemon_config() -> anyhow::Result<DaemonConfig> {
    let settings = Config::builder()
        .set_default("local_port", DEFAULT_LOCAL_PORT as i64)?
        .add_source(Environment::with_prefix("CCN"))
        .build()?;
    Ok(DaemonConfig { local_port: settings.get_int("local_port")? as u16 })
}

/// Reads `CCNR_DIRECTORY`, `CCNR_GLOBAL_PREFIX`, `CCNR_DEBUG`.
pub fn load_repository_config() -> anyhow::Result<RepositoryConfig> {
    let settings = Config::builder()
        .set_default("directory", DEFAULT_DATA_DIRECTORY)?
        .set_default("global_prefix", DEFAULT_GLOBAL_PREFIX)?
        .set_default("debug", "INFO")?
        .add_source(Environment::with_prefix("CCNR"))
        .build()?;
    Ok(RepositoryConfig {
        directory: PathBuf::from(settings.get_string("directory")?),
        global_prefix: settings.get_string("global_prefix")?,
        debug: parse_debug_level(&settings.get_string("debug")?),
    })
}

/// Maps `CCNR_DEBUG`'s symbolic levels, or a bare integer, onto
/// `log::LevelFilter` (§6).
fn parse_debug_level(raw: &str) -> LevelFilter {
    match raw.trim().to_ascii_uppercase().as_str() {
        "NONE" => LevelFilter::Off,
        "SEVERE" | "ERROR" => LevelFilter::Error,
        "WARNING" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "FINE" => LevelFilter::Debug,
        "FINER" | "FINEST" => LevelFilter::Trace,
        other => match other.parse::<u8>() {
            Ok(0) => LevelFilter::Off,
            Ok(1) => LevelFilter::Error,
            Ok(2) => LevelFilter::Warn,
            Ok(3) => LevelFilter::Info,
            Ok(4) => LevelFilter::Debug,
            Ok(_) => LevelFilter::Trace,
            Err(_) => LevelFilter::Info,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_levels_map_onto_level_filter() {
        assert_eq!(parse_debug_level("NONE"), LevelFilter::Off);
        assert_eq!(parse_debug_level("warning"), LevelFilter::Warn);
        assert_eq!(parse_debug_level("FINEST"), LevelFilter::Trace);
    }

    #[test]
    fn integer_levels_map_onto_the_same_ladder() {
        assert_eq!(parse_debug_level("0"), LevelFilter::Off);
        assert_eq!(parse_debug_level("3"), LevelFilter::Info);
        assert_eq!(parse_debug_level("9"), LevelFilter::Trace);
    }

    #[test]
    fn unrecognized_value_falls_back_to_info() {
        assert_eq!(parse_debug_level("garbage"), LevelFilter::Info);
    }
}
