// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use serde::de::DeserializeOwned;
use std::{fs, io, path::Path, path::PathBuf};
use thiserror::Error;
use tracing::{debug, info_span, Span};

/// Installs the global `fmt` subscriber. `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Span naming the program or subsystem that emits the events inside it.
///
/// Enter it for the lifetime of a component so every event is tagged with
/// `component{name=..}` instead of a global program-name prefix.
pub fn component_span(name: &str) -> Span {
    info_span!("component", name)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Reads a TOML config file. A missing file yields `T::default()`.
pub fn load_config<T>(path: &Path) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            return Ok(T::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        title: String,
        width: u32,
    }

    impl Default for Sample {
        fn default() -> Self {
            Sample {
                title: "default".into(),
                width: 640,
            }
        }
    }

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "neotetris-core-{}-{}.toml",
            name,
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("neotetris-core-definitely-missing.toml");
        let cfg: Sample = load_config(&path).unwrap();
        assert_eq!(cfg, Sample::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let path = scratch_file("partial", "title = \"tetris\"\n");
        let cfg: Sample = load_config(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(cfg.title, "tetris");
        assert_eq!(cfg.width, 640);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = scratch_file("malformed", "width = \"wide\"\n");
        let res: Result<Sample, _> = load_config(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(res, Err(ConfigError::Parse { .. })));
    }
}
