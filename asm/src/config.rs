use crate::error::Error;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Accept undocumented opcodes (`ixh`, `sll`, ED aliases, ...)
    pub allow_undocumented: bool,
    /// Address of the first line
    pub start_address: u16,
    /// Constants defined before the first line
    pub defines: IndexMap<String, i32>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allow_undocumented: true,
            start_address: 0,
            defines: IndexMap::new(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &str) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{path}: {e}")))
    }
}

/// Parses `NAME=value` as given to `-D`.
pub fn parse_define(arg: &str) -> Result<(String, i32), Error> {
    let (name, value) = match arg.split_once('=') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (arg.trim(), "1"),
    };
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(Error::Config(format!("invalid symbol name `{name}`")));
    }
    Ok((name.to_string(), parse_value(value)? as i32))
}

/// Parses a number written as `0x1F`, `$1F`, `1FH`, `0b101`, `%101` or
/// decimal, as accepted by `--origin`.
pub fn parse_value(text: &str) -> Result<u32, Error> {
    let lower = text.trim().to_ascii_lowercase();
    let (digits, radix) = if let Some(d) = lower.strip_prefix("0x").or(lower.strip_prefix('$')) {
        (d, 16)
    } else if let Some(d) = lower.strip_prefix("0b").or(lower.strip_prefix('%')) {
        (d, 2)
    } else if let Some(d) = lower.strip_suffix('h') {
        (d, 16)
    } else {
        (lower.as_str(), 10)
    };
    u32::from_str_radix(digits, radix).map_err(|_| Error::Config(format!("invalid number `{text}`")))
}
