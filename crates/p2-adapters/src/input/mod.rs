//! Input data: where it comes from and how it is decoded.

mod env;

use std::{
    fmt,
    io::Read,
    path::{Path, PathBuf},
};

use tracing::{debug, info, instrument, warn};

use p2_core::application::ApplicationError;
use p2_core::domain::{DataFormat, DomainError, InputData};
use p2_core::error::{P2Error, P2Result};

pub use env::{from_process_env, from_vars, parse_env_lines};

/// `--format` value that picks the format from the input file's extension.
pub const FORMAT_AUTO: &str = "auto";
/// `--format` value equivalent to `--use-env-key`.
pub const FORMAT_ENVKEY: &str = "envkey";

/// Where raw input bytes are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// The process environment, already a key/value map.
    Environment,
    File(PathBuf),
    Stdin,
    /// The value of one environment variable.
    EnvKey(String),
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("<environment>"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdin => f.write_str("<stdin>"),
            Self::EnvKey(name) => write!(f, "${name}"),
        }
    }
}

/// A resolved input: source plus decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub source: InputSource,
    pub format: DataFormat,
}

impl InputSpec {
    /// Resolve `--format`, `--input` and `--use-env-key`.
    ///
    /// - `auto` without an input reads the process environment
    /// - `auto` with an input file picks the format from its extension
    /// - an explicit format without an input reads stdin
    /// - `envkey` (or `use_env_key`) reads the variable named by `input`
    pub fn resolve(format: &str, input: Option<&str>, use_env_key: bool) -> P2Result<Self> {
        let format = format.trim().to_lowercase();
        let use_env_key = use_env_key || format == FORMAT_ENVKEY;
        let input = input.filter(|i| !i.is_empty());

        if use_env_key {
            let name = input.ok_or_else(|| P2Error::Configuration {
                message: "--use-env-key needs --input naming an environment variable".into(),
            })?;
            let format = match format.as_str() {
                FORMAT_AUTO | FORMAT_ENVKEY => DataFormat::Env,
                other => other.parse()?,
            };
            return Ok(Self {
                source: InputSource::EnvKey(name.to_owned()),
                format,
            });
        }

        let spec = match (format.as_str(), input) {
            (FORMAT_AUTO, None) => Self {
                source: InputSource::Environment,
                format: DataFormat::Env,
            },
            (FORMAT_AUTO, Some(path)) => {
                let path = Path::new(path);
                let format = DataFormat::from_extension(path).ok_or_else(|| {
                    DomainError::UnsupportedFormat(
                        path.extension()
                            .map(|e| e.to_string_lossy().into_owned())
                            .unwrap_or_else(|| path.display().to_string()),
                    )
                })?;
                Self {
                    source: InputSource::File(path.to_path_buf()),
                    format,
                }
            }
            (explicit, None) => Self {
                source: InputSource::Stdin,
                format: explicit.parse()?,
            },
            (explicit, Some(path)) => Self {
                source: InputSource::File(PathBuf::from(path)),
                format: explicit.parse()?,
            },
        };
        Ok(spec)
    }

    pub fn is_environment(&self) -> bool {
        self.source == InputSource::Environment
    }
}

/// Read and decode the input, then apply `--include-env`.
///
/// The reserved `p2` key is dropped with a warning.
#[instrument(skip_all, fields(source = %spec.source, format = %spec.format))]
pub fn load(spec: &InputSpec, include_env: bool) -> P2Result<InputData> {
    let mut data = match &spec.source {
        InputSource::Environment => from_process_env(),
        source => decode(spec.format, &read_raw(source)?, &source.to_string())?,
    };

    if include_env {
        if spec.is_environment() {
            warn!("--include-env has no effect when data source is already the environment");
        } else {
            info!("Including environment variables");
            data.overlay(from_process_env());
        }
    }

    if data.remove("p2").is_some() {
        warn!("Input key 'p2' is reserved for path metadata and was ignored");
    }

    debug!(keys = data.len(), "Input data loaded");
    Ok(data)
}

fn read_raw(source: &InputSource) -> P2Result<Vec<u8>> {
    let unreadable = |reason: String| ApplicationError::InputDecode {
        format: "raw".into(),
        origin: source.to_string(),
        reason,
    };

    match source {
        InputSource::File(path) => {
            std::fs::read(path).map_err(|e| unreadable(format!("could not read: {e}")).into())
        }
        InputSource::Stdin => {
            let mut buf = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .map_err(|e| unreadable(format!("could not read: {e}")))?;
            Ok(buf)
        }
        InputSource::EnvKey(name) => std::env::var(name)
            .map(String::into_bytes)
            .map_err(|e| unreadable(e.to_string()).into()),
        InputSource::Environment => Ok(Vec::new()),
    }
}

/// Decode raw bytes in `format`. `origin` names the source in errors.
pub fn decode(format: DataFormat, raw: &[u8], origin: &str) -> P2Result<InputData> {
    let failed = |reason: String| ApplicationError::InputDecode {
        format: format.to_string(),
        origin: origin.to_owned(),
        reason,
    };

    match format {
        DataFormat::Env => {
            let text = std::str::from_utf8(raw).map_err(|e| failed(e.to_string()))?;
            Ok(parse_env_lines(text)?)
        }
        DataFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_slice(raw).map_err(|e| failed(e.to_string()))?;
            Ok(InputData::from_value(value)?)
        }
        DataFormat::Yaml => {
            if raw.iter().all(u8::is_ascii_whitespace) {
                return Ok(InputData::new());
            }
            let value: serde_json::Value =
                serde_yaml::from_slice(raw).map_err(|e| failed(e.to_string()))?;
            Ok(InputData::from_value(value)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn resolve(format: &str, input: Option<&str>, use_env_key: bool) -> InputSpec {
        InputSpec::resolve(format, input, use_env_key).unwrap()
    }

    #[test]
    fn resolution_table() {
        assert_eq!(
            resolve("auto", None, false),
            InputSpec {
                source: InputSource::Environment,
                format: DataFormat::Env
            }
        );
        assert_eq!(
            resolve("auto", Some("data.yml"), false),
            InputSpec {
                source: InputSource::File("data.yml".into()),
                format: DataFormat::Yaml
            }
        );
        assert_eq!(
            resolve("json", None, false),
            InputSpec {
                source: InputSource::Stdin,
                format: DataFormat::Json
            }
        );
        assert_eq!(
            resolve("env", Some("vars.txt"), false),
            InputSpec {
                source: InputSource::File("vars.txt".into()),
                format: DataFormat::Env
            }
        );
        assert_eq!(
            resolve("auto", Some("P2_DATA"), true),
            InputSpec {
                source: InputSource::EnvKey("P2_DATA".into()),
                format: DataFormat::Env
            }
        );
        assert_eq!(
            resolve("envkey", Some("P2_DATA"), false).source,
            InputSource::EnvKey("P2_DATA".into())
        );
        assert_eq!(
            resolve("json", Some("P2_DATA"), true).format,
            DataFormat::Json
        );
    }

    #[test]
    fn resolution_errors() {
        assert!(matches!(
            InputSpec::resolve("auto", Some("data.txt"), false),
            Err(P2Error::Domain(DomainError::UnsupportedFormat(ext))) if ext == "txt"
        ));
        assert!(matches!(
            InputSpec::resolve("toml", None, false),
            Err(P2Error::Domain(DomainError::UnsupportedFormat(_)))
        ));
        assert!(matches!(
            InputSpec::resolve("auto", None, true),
            Err(P2Error::Configuration { .. })
        ));
    }

    #[test]
    fn all_formats_decode_to_the_same_data() {
        let env = decode(DataFormat::Env, b"name=Sally\ncity='New York'\n", "t").unwrap();
        let json = decode(
            DataFormat::Json,
            br#"{"name": "Sally", "city": "New York"}"#,
            "t",
        )
        .unwrap();
        let yaml = decode(DataFormat::Yaml, b"name: Sally\ncity: New York\n", "t").unwrap();

        assert_eq!(env, json);
        assert_eq!(json, yaml);
    }

    #[test]
    fn structured_input_keeps_nesting() {
        let data = decode(DataFormat::Yaml, b"app:\n  ports: [80, 443]\n", "t").unwrap();
        assert_eq!(data.get("app"), Some(&json!({"ports": [80, 443]})));
    }

    #[test]
    fn top_level_lists_are_rejected() {
        let err = decode(DataFormat::Json, b"[1, 2]", "t").unwrap_err();
        assert!(matches!(
            err,
            P2Error::Domain(DomainError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn malformed_input_names_format_and_origin() {
        let err = decode(DataFormat::Json, b"{oops", "in.json").unwrap_err();
        match err {
            P2Error::Application(ApplicationError::InputDecode { format, origin, .. }) => {
                assert_eq!(format, "json");
                assert_eq!(origin, "in.json");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_yaml_is_empty_data() {
        assert!(decode(DataFormat::Yaml, b"\n", "t").unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn env_key_source_and_include_env_overlay() {
        // SAFETY: serialized with the other environment-mutating tests.
        unsafe {
            std::env::set_var("P2_TEST_PAYLOAD", r#"{"name": "from-key", "p2": "reserved"}"#);
            std::env::set_var("P2_TEST_OVERLAY", "env-wins");
        }

        let spec = resolve("json", Some("P2_TEST_PAYLOAD"), true);
        let data = load(&spec, false).unwrap();
        assert_eq!(data.get("name"), Some(&json!("from-key")));
        assert!(!data.contains_key("p2"));
        assert!(!data.contains_key("P2_TEST_OVERLAY"));

        let data = load(&spec, true).unwrap();
        assert_eq!(data.get("P2_TEST_OVERLAY"), Some(&json!("env-wins")));

        unsafe {
            std::env::remove_var("P2_TEST_PAYLOAD");
            std::env::remove_var("P2_TEST_OVERLAY");
        }
    }

    #[test]
    #[serial]
    fn missing_env_key_is_reported() {
        let spec = resolve("auto", Some("P2_TEST_DOES_NOT_EXIST"), true);
        assert!(matches!(
            load(&spec, false),
            Err(P2Error::Application(ApplicationError::InputDecode { .. }))
        ));
    }

    #[test]
    fn file_source_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.env");
        std::fs::write(&path, "name=Sally\n").unwrap();

        let spec = resolve("auto", Some(path.to_str().unwrap()), false);
        let data = load(&spec, false).unwrap();
        assert_eq!(data.get("name"), Some(&json!("Sally")));
    }
}
