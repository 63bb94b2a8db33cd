//! Argument store
//!
//! Resolves the raw invocation arguments into a name/value map once at startup.
//! The rules are deliberately loose so that any task can define its own options
//! without declaring them up front:
//!
//! - `--name=value` and `--name value` set `name`
//! - `-x` sets the flag `x` to an empty string, and a following value token is
//!   consumed as its value
//! - `-abc` sets `a`, `b` and `c` to empty strings

use std::collections::BTreeMap;

/// Resolved mapping from option name to value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    values: BTreeMap<String, String>,
}

impl Arguments {
    /// Parse the arguments of the current process, skipping the program name
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse an explicit list of argument tokens
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        let mut last_key: Option<String> = None;

        for arg in args {
            let arg = arg.as_ref();

            if let Some(long) = arg.strip_prefix("--") {
                match long.split_once('=') {
                    Some((key, value)) => {
                        values.insert(key.to_string(), value.to_string());
                        last_key = None;
                    }
                    None => {
                        values.insert(long.to_string(), String::new());
                        last_key = Some(long.to_string());
                    }
                }
                continue;
            }

            if let Some(short) = arg.strip_prefix('-') {
                if short.chars().count() > 1 {
                    // A cluster of flags never takes a value
                    for flag in short.chars() {
                        values.insert(flag.to_string(), String::new());
                    }
                    last_key = None;
                } else {
                    values.insert(short.to_string(), String::new());
                    last_key = Some(short.to_string());
                }
                continue;
            }

            // A bare token is the value of the preceding option, if it can take one
            if let Some(key) = last_key.take().filter(|key| !key.is_empty()) {
                values.insert(key, arg.to_string());
            }
        }

        Self { values }
    }

    /// Build a store directly from name/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Value of the argument, if it was given
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Value of the argument or the given default when it is absent
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Whether the argument was given at all, regardless of its value
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Whether any of the given aliases was given
    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
