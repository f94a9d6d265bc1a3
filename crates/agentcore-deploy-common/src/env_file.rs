//! dotenv-style configuration files
//!
//! Supported syntax:
//!
//! ```text
//! # comment
//! KEY=value
//! export OTHER="quoted # not a comment"
//! SINGLE='single quoted'
//! EMPTY=
//! ```
//!
//! Unquoted values are trimmed and lose any ` #` trailing comment. Values
//! inside matching quotes are taken verbatim.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::path::Path;

/// Parsed configuration variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    vars: BTreeMap<String, String>,
}

impl EnvFile {
    /// Parse file contents.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut vars = BTreeMap::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").map_or(line, str::trim_start);

            let malformed = || ConfigError::MalformedLine {
                line: idx + 1,
                content: raw.to_string(),
            };

            let (key, value) = line.split_once('=').ok_or_else(malformed)?;
            let key = key.trim();
            if !is_valid_key(key) {
                return Err(malformed());
            }

            vars.insert(key.to_string(), parse_value(value.trim()));
        }

        Ok(Self { vars })
    }

    /// Read and parse a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Like [`EnvFile::load`], but a missing file yields an empty set.
    pub fn load_optional(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Layer overrides on top of the file; override values win.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in overrides {
            self.vars.insert(k.into(), v.into());
        }
        self
    }

    /// Raw value, including empty strings
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value, treating an empty string as unset
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Fail with every key in `keys` that is unset or empty.
    pub fn require(&self, keys: &[&str]) -> Result<(), ConfigError> {
        let missing: Vec<String> = keys
            .iter()
            .filter(|k| self.non_empty(k).is_none())
            .map(|k| k.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingKeys(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_value(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }

    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_basic_file() {
        let env = EnvFile::parse(
            "# demo users\n\
             DEMO_ADMIN_PHONE=+15551230001\n\
             \n\
             export AWS_REGION=us-west-2\n\
             PROJECT = octank  # trailing comment\n",
        )
        .unwrap();

        assert_eq!(env.len(), 3);
        assert_eq!(env.get("DEMO_ADMIN_PHONE"), Some("+15551230001"));
        assert_eq!(env.get("AWS_REGION"), Some("us-west-2"));
        assert_eq!(env.get("PROJECT"), Some("octank"));
    }

    #[test]
    fn test_quoted_values_are_verbatim() {
        let env = EnvFile::parse("A=\"has # hash\"\nB='  padded  '\nC=\"\"\n").unwrap();
        assert_eq!(env.get("A"), Some("has # hash"));
        assert_eq!(env.get("B"), Some("  padded  "));
        assert_eq!(env.get("C"), Some(""));
    }

    #[test]
    fn test_empty_value_is_present_but_not_non_empty() {
        let env = EnvFile::parse("USER_POOL_ID=\n").unwrap();
        assert_eq!(env.get("USER_POOL_ID"), Some(""));
        assert_eq!(env.non_empty("USER_POOL_ID"), None);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = EnvFile::parse("A=1\nnot a pair\n").unwrap_err();
        match err {
            ConfigError::MalformedLine { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(EnvFile::parse("1ABC=x\n").is_err());
        assert!(EnvFile::parse("=x\n").is_err());
    }

    #[test]
    fn test_overrides_win() {
        let env = EnvFile::parse("AWS_REGION=us-east-1\n")
            .unwrap()
            .with_overrides([("AWS_REGION", "eu-west-1")]);
        assert_eq!(env.get("AWS_REGION"), Some("eu-west-1"));
    }

    #[test]
    fn test_require_lists_every_missing_key() {
        let env = EnvFile::parse("DEMO_ADMIN_PHONE=+15551230001\nDEMO_STUDENT_PHONE=\n").unwrap();
        let err = env
            .require(&["DEMO_ADMIN_PHONE", "DEMO_PROFESSOR_PHONE", "DEMO_STUDENT_PHONE"])
            .unwrap_err();
        match err {
            ConfigError::MissingKeys(keys) => {
                assert_eq!(keys, vec!["DEMO_PROFESSOR_PHONE", "DEMO_STUDENT_PHONE"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "AGENT_CONTAINER_URI=123.dkr.ecr.us-east-1.amazonaws.com/agent:latest").unwrap();

        let env = EnvFile::load(file.path()).unwrap();
        assert_eq!(
            env.get("AGENT_CONTAINER_URI"),
            Some("123.dkr.ecr.us-east-1.amazonaws.com/agent:latest")
        );
    }

    #[test]
    fn test_load_optional_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::load_optional(&dir.path().join(".env")).unwrap();
        assert!(env.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EnvFile::load(&dir.path().join(".env")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn unquoted_values_round_trip(
            key in "[A-Z_][A-Z0-9_]{0,15}",
            value in "[a-zA-Z0-9./:@+-]{0,30}",
        ) {
            let env = EnvFile::parse(&format!("{key}={value}\n")).unwrap();
            prop_assert_eq!(env.get(&key), Some(value.as_str()));
        }

        #[test]
        fn double_quoted_values_round_trip(
            key in "[A-Z_][A-Z0-9_]{0,15}",
            value in "[a-zA-Z0-9 #./:'-]{0,30}",
        ) {
            let env = EnvFile::parse(&format!("export {key}=\"{value}\"\n")).unwrap();
            prop_assert_eq!(env.get(&key), Some(value.as_str()));
        }

        #[test]
        fn comment_lines_never_produce_entries(comment in "[^\n]{0,40}") {
            let env = EnvFile::parse(&format!("#{comment}\n")).unwrap();
            prop_assert!(env.is_empty());
        }
    }
}
