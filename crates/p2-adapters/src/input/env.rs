//! `KEY=value` input, from text or from the process environment.

use p2_core::domain::{DomainError, InputData, is_identifier};

const NO_SEPARATOR: &str = "Could not find an equals value to split on";
const ARRAY_VALUE: &str = "Improperly escaped environment variable. p2 does not parse arrays.";

/// Decode env-file text.
///
/// Each non-blank line not starting with `#` is split on its first `=`.
/// Values are shell-unquoted and must come out as exactly one word (or
/// none, giving an empty string).
pub fn parse_env_lines(text: &str) -> Result<InputData, DomainError> {
    let mut data = InputData::new();
    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| env_error(NO_SEPARATOR, line))?;
        let mut words =
            shell_words::split(value).map_err(|e| env_error(&e.to_string(), line))?;
        if words.len() > 1 {
            return Err(env_error(ARRAY_VALUE, line));
        }
        data.insert(key, words.pop().unwrap_or_default());
    }
    Ok(data)
}

fn env_error(reason: &str, line: &str) -> DomainError {
    DomainError::EnvironmentVariables {
        reason: reason.to_owned(),
        raw_env_var: line.to_owned(),
    }
}

/// Identifier-named variables from `vars`; everything else is dropped.
pub fn from_vars<I, K, V>(vars: I) -> InputData
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .filter(|(k, _)| is_identifier(k))
        .collect()
}

/// The current process environment, minus non-UTF-8 and non-identifier entries.
pub fn from_process_env() -> InputData {
    from_vars(
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_and_quoted_values() {
        let data = parse_env_lines(
            "name=Sally\n\
             greeting=\"hello world\"\n\
             single='it''s'\n\
             empty=\n\
             url=http://x/?a=b\n",
        )
        .unwrap();

        assert_eq!(data.get("name"), Some(&json!("Sally")));
        assert_eq!(data.get("greeting"), Some(&json!("hello world")));
        assert_eq!(data.get("single"), Some(&json!("its")));
        assert_eq!(data.get("empty"), Some(&json!("")));
        assert_eq!(data.get("url"), Some(&json!("http://x/?a=b")));
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let data = parse_env_lines("\n# comment\r\n  \nA=1\r\n  #B=2\n#C=3\n").unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.get("A"), Some(&json!("1")));
        assert_eq!(data.get("#C"), None);
    }

    #[test]
    fn line_without_separator_is_reported_verbatim() {
        let err = parse_env_lines("A=1\nnot a pair\n").unwrap_err();
        assert_eq!(
            err,
            DomainError::EnvironmentVariables {
                reason: NO_SEPARATOR.into(),
                raw_env_var: "not a pair".into(),
            }
        );
    }

    #[test]
    fn arrays_are_rejected() {
        let err = parse_env_lines("LIST=a b c\n").unwrap_err();
        assert!(matches!(
            err,
            DomainError::EnvironmentVariables { ref reason, ref raw_env_var }
                if reason == ARRAY_VALUE && raw_env_var == "LIST=a b c"
        ));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err = parse_env_lines("A=\"open\n").unwrap_err();
        assert!(matches!(err, DomainError::EnvironmentVariables { .. }));
    }

    #[test]
    fn only_identifier_keys_survive() {
        let data = from_vars([
            ("HOME", "/root"),
            ("BASH_FUNC_x%%", "() { :; }"),
            ("_private", "1"),
        ]);
        assert_eq!(data.len(), 2);
        assert!(data.contains_key("HOME"));
        assert!(data.contains_key("_private"));
    }
}
