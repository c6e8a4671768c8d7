//! Built-in p2 filters.
//!
//! - `SetOwner`, `SetGroup`, `SetMode`: change the file being rendered
//! - `indent`, `replace`: text shaping
//! - `to_json`, `to_yaml`, `to_toml`: serialization
//! - `to_base64`, `from_base64`, `string`, `bytes`, `to_gzip`, `from_gzip`: encodings
//!
//! Filters return a typed [`FilterError`] wrapped as an evaluator error, so
//! callers can tell validation problems from lookups and I/O.

use std::io::{Read, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use minijinja::{
    Environment, Error, State,
    value::{Rest, Value, ValueKind},
};
use serde::Serialize;

use p2_core::application::FilterError;

use super::jinja::{current_scope, filter_failure};

const DEFAULT_GZIP_LEVEL: i64 = 9;

/// Register every built-in filter, overriding same-named evaluator builtins.
pub fn register(env: &mut Environment<'static>) {
    env.add_filter("SetOwner", set_owner);
    env.add_filter("SetGroup", set_group);
    env.add_filter("SetMode", set_mode);

    env.add_filter("indent", indent);
    env.add_filter("replace", replace);

    env.add_filter("to_json", to_json);
    env.add_filter("to_yaml", to_yaml);
    env.add_filter("to_toml", to_toml);

    env.add_filter("to_base64", to_base64);
    env.add_filter("from_base64", from_base64);
    env.add_filter("string", string);
    env.add_filter("bytes", bytes);
    env.add_filter("to_gzip", to_gzip);
    env.add_filter("from_gzip", from_gzip);
}

fn invalid(filter: &'static str, message: impl Into<String>) -> Error {
    filter_failure(FilterError::validation(filter, message))
}

fn codec(filter: &'static str, err: impl std::fmt::Display) -> Error {
    filter_failure(FilterError::codec(filter, err.to_string()))
}

fn integer(value: &Value) -> Option<i64> {
    if value.kind() == ValueKind::Number {
        value.as_i64()
    } else {
        None
    }
}

/// Bytes held by a string or byte-sequence value.
fn raw_bytes(value: &Value) -> Option<&[u8]> {
    match value.kind() {
        ValueKind::String | ValueKind::Bytes => value.as_bytes(),
        _ => None,
    }
}

// ============================================================================
// Ownership and permissions
// ============================================================================

#[derive(Clone, Copy)]
enum Principal {
    User,
    Group,
}

impl Principal {
    fn filter(self) -> &'static str {
        match self {
            Self::User => "SetOwner",
            Self::Group => "SetGroup",
        }
    }

    /// Numeric id for an integer value or a user/group name.
    fn resolve(self, value: &Value) -> Result<u32, Error> {
        let filter = self.filter();
        if let Some(id) = integer(value) {
            return u32::try_from(id)
                .map_err(|_| invalid(filter, format!("id {id} is out of range")));
        }
        match value.as_str() {
            Some(name) => self.lookup(name),
            None => Err(invalid(filter, "input must be of type 'string' or 'integer'")),
        }
    }

    #[cfg(unix)]
    fn lookup(self, name: &str) -> Result<u32, Error> {
        use nix::unistd::{Group, User};

        let filter = self.filter();
        let found = match self {
            Self::User => User::from_name(name).map(|u| u.map(|u| u.uid.as_raw())),
            Self::Group => Group::from_name(name).map(|g| g.map(|g| g.gid.as_raw())),
        };
        match found {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(filter_failure(FilterError::lookup(
                filter,
                format!("no such {}: {name}", self.noun()),
            ))),
            Err(errno) => Err(filter_failure(FilterError::lookup(
                filter,
                format!("looking up {} {name}: {errno}", self.noun()),
            ))),
        }
    }

    #[cfg(not(unix))]
    fn lookup(self, name: &str) -> Result<u32, Error> {
        Err(filter_failure(FilterError::lookup(
            self.filter(),
            format!("cannot look up {} {name} on this platform", self.noun()),
        )))
    }

    fn noun(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

fn change_owner(state: &State, value: &Value, principal: Principal) -> Result<Value, Error> {
    let filter = principal.filter();
    let namespace = current_scope(state, filter)?;
    let scope = namespace.scope();
    if scope.is_stdout() {
        return Ok(Value::from(""));
    }

    let id = principal.resolve(value)?;
    let (uid, gid) = match principal {
        Principal::User => (Some(id), None),
        Principal::Group => (None, Some(id)),
    };
    scope
        .set_owner(uid, gid)
        .map_err(|e| filter_failure(FilterError::io(filter, e.to_string())))?;
    Ok(Value::from(""))
}

fn set_owner(state: &State, value: Value) -> Result<Value, Error> {
    change_owner(state, &value, Principal::User)
}

fn set_group(state: &State, value: Value) -> Result<Value, Error> {
    change_owner(state, &value, Principal::Group)
}

/// `"0640" | SetMode`
fn set_mode(state: &State, value: Value) -> Result<Value, Error> {
    const NAME: &str = "SetMode";
    let namespace = current_scope(state, NAME)?;
    let scope = namespace.scope();
    if scope.is_stdout() {
        return Ok(Value::from(""));
    }

    let digits = value
        .as_str()
        .ok_or_else(|| invalid(NAME, "input must be of type 'string' in octal format"))?;
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|e| invalid(NAME, format!("{digits:?} is not an octal mode: {e}")))?;
    scope
        .set_mode(mode)
        .map_err(|e| filter_failure(FilterError::io(NAME, e.to_string())))?;
    Ok(Value::from(""))
}

// ============================================================================
// Text
// ============================================================================

/// Prefix every line, blank ones included.
fn indent(value: Value, prefix: Value) -> Result<String, Error> {
    const NAME: &str = "indent";
    let text = value
        .as_str()
        .ok_or_else(|| invalid(NAME, "input must be of type 'string'"))?;
    let prefix = match (prefix.as_str(), integer(&prefix)) {
        (Some(literal), _) => literal.to_owned(),
        (None, Some(width)) => {
            let width = usize::try_from(width)
                .map_err(|_| invalid(NAME, "width must not be negative"))?;
            " ".repeat(width)
        }
        (None, None) => return Err(invalid(NAME, "parameter must be a string or an integer")),
    };

    Ok(text
        .split('\n')
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// `x | replace(["old", "new", 1])` or `x | replace("old", "new", 1)`.
fn replace(value: Value, args: Rest<Value>) -> Result<String, Error> {
    const NAME: &str = "replace";
    let text = value
        .as_str()
        .ok_or_else(|| invalid(NAME, "input must be of type 'string'"))?;

    let parts: Vec<Value> = match args.as_slice() {
        [list] if list.kind() == ValueKind::Seq => list.try_iter()?.collect(),
        positional => positional.to_vec(),
    };
    let (from, to, count) = match parts.as_slice() {
        [from, to] => (from.to_string(), to.to_string(), None),
        [from, to, count] => {
            let raw = count.to_string();
            let count = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid(NAME, format!("count {raw:?} is not an integer")))?;
            (from.to_string(), to.to_string(), Some(count))
        }
        _ => {
            return Err(invalid(
                NAME,
                "parameter must be [match, replacement] or [match, replacement, count]",
            ));
        }
    };

    Ok(match count.and_then(|n| usize::try_from(n).ok()) {
        Some(n) => text.replacen(&from, &to, n),
        None => text.replace(&from, &to),
    })
}

// ============================================================================
// Serialization
// ============================================================================

/// Compact without a parameter; indented by N spaces, 4 spaces (bool) or a
/// literal string otherwise.
fn to_json(value: Value, indent: Option<Value>) -> Result<String, Error> {
    const NAME: &str = "to_json";
    let indent = indent.and_then(|param| {
        if let Some(width) = integer(&param) {
            Some(" ".repeat(usize::try_from(width).unwrap_or(0)))
        } else if param.kind() == ValueKind::Bool {
            Some("    ".to_owned())
        } else {
            param.as_str().map(str::to_owned)
        }
    });

    let Some(indent) = indent else {
        return serde_json::to_string(&value).map_err(|e| codec(NAME, e));
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(|e| codec(NAME, e))?;
    String::from_utf8(buf).map_err(|e| codec(NAME, e))
}

fn to_yaml(value: Value) -> Result<String, Error> {
    serde_yaml::to_string(&value).map_err(|e| codec("to_yaml", e))
}

fn to_toml(value: Value) -> Result<String, Error> {
    const NAME: &str = "to_toml";
    if value.kind() != ValueKind::Map {
        return Err(invalid(NAME, "top-level value must be a map"));
    }
    toml::to_string(&value).map_err(|e| codec(NAME, e))
}

// ============================================================================
// Encodings
// ============================================================================

fn to_base64(value: Value) -> Result<String, Error> {
    raw_bytes(&value)
        .map(|bytes| STANDARD.encode(bytes))
        .ok_or_else(|| invalid("to_base64", "input must be a string or bytes"))
}

fn from_base64(value: Value) -> Result<Value, Error> {
    const NAME: &str = "from_base64";
    let text = value
        .as_str()
        .ok_or_else(|| invalid(NAME, "input must be of type 'string'"))?;
    let decoded = STANDARD.decode(text.trim()).map_err(|e| codec(NAME, e))?;
    Ok(Value::from_bytes(decoded))
}

fn string(value: Value) -> Result<Value, Error> {
    const NAME: &str = "string";
    match value.kind() {
        ValueKind::String => Ok(value),
        ValueKind::Bytes => {
            let bytes = value.as_bytes().unwrap_or_default().to_vec();
            String::from_utf8(bytes)
                .map(Value::from)
                .map_err(|e| codec(NAME, e))
        }
        _ => Err(invalid(NAME, "input must be a string or bytes")),
    }
}

fn bytes(value: Value) -> Result<Value, Error> {
    match value.kind() {
        ValueKind::Bytes => Ok(value),
        ValueKind::String => Ok(Value::from_bytes(
            value.as_bytes().unwrap_or_default().to_vec(),
        )),
        _ => Err(invalid("bytes", "input must be a string or bytes")),
    }
}

fn to_gzip(value: Value, level: Option<Value>) -> Result<Value, Error> {
    const NAME: &str = "to_gzip";
    if value.kind() != ValueKind::Bytes {
        return Err(invalid(NAME, "input must be bytes"));
    }
    let level = match level {
        None => DEFAULT_GZIP_LEVEL,
        Some(param) => integer(&param)
            .ok_or_else(|| invalid(NAME, "compression level must be an integer"))?,
    };
    let level = u32::try_from(level)
        .ok()
        .filter(|l| *l <= 9)
        .ok_or_else(|| invalid(NAME, format!("compression level {level} is not in 0..=9")))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(value.as_bytes().unwrap_or_default())
        .map_err(|e| codec(NAME, e))?;
    let compressed = encoder.finish().map_err(|e| codec(NAME, e))?;
    Ok(Value::from_bytes(compressed))
}

fn from_gzip(value: Value) -> Result<Value, Error> {
    const NAME: &str = "from_gzip";
    if value.kind() != ValueKind::Bytes {
        return Err(invalid(NAME, "input must be bytes"));
    }
    let mut decoder = GzDecoder::new(value.as_bytes().unwrap_or_default());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| codec(NAME, e))?;
    Ok(Value::from_bytes(out))
}
