//! Constant Catalog
//!
//! Named native constants (share modes, creation dispositions, handle
//! flags, error codes, ...) read from `#define NAME value` lines of a C
//! header. A header is bundled with the crate; configuration may point at
//! another header whose definitions override the bundled ones.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::WinffiConfig;
use crate::error::{Error, Result};

/// Header bundled with the crate.
pub const CONSTANTS_HEADER: &str = include_str!("constants.h");

static DEFINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*#define\s+([A-Z][A-Z0-9_]*)\s+(\S+)\s*(?:/\*.*\*/)?\s*$")
        .expect("constant pattern is valid")
});

/// Named integer constants supplied by the binding layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    constants: BTreeMap<String, i64>,
}

impl Catalog {
    /// Parse every `#define NAME value` line of `header`.
    ///
    /// Lines that are not simple integer definitions are skipped.
    pub fn parse(header: &str) -> Self {
        let mut constants = BTreeMap::new();
        for line in header.lines() {
            let Some(caps) = DEFINE.captures(line) else {
                continue;
            };
            if let Some(value) = parse_value(&caps[2]) {
                constants.insert(caps[1].to_string(), value);
            }
        }
        Self { constants }
    }

    /// The header bundled with the crate.
    pub fn bundled() -> Self {
        Self::parse(CONSTANTS_HEADER)
    }

    /// Read and parse a header file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let header = std::fs::read_to_string(path).map_err(|e| {
            Error::Runtime(format!(
                "failed to read constants header '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&header))
    }

    /// Bundled constants, overridden by the configured header if any.
    pub fn from_config(config: &WinffiConfig) -> Result<Self> {
        let mut catalog = Self::bundled();
        if let Some(header) = &config.catalog.header {
            let extra = Self::load(header)?;
            debug!(header = %header.display(), count = extra.len(), "merging constants");
            catalog.merge(extra);
        }
        Ok(catalog)
    }

    /// Add `other`'s definitions, replacing existing names.
    pub fn merge(&mut self, other: Catalog) {
        self.constants.extend(other.constants);
    }

    pub fn get(&self, name: &str) -> Result<i64> {
        self.constants
            .get(name)
            .copied()
            .ok_or_else(|| Error::Runtime(format!("unknown constant: {}", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// All constants in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Constants whose name contains `pattern` (case-insensitive)
    pub fn matching<'a>(&'a self, pattern: &str) -> impl Iterator<Item = (&'a str, i64)> + 'a {
        let pattern = pattern.to_uppercase();
        self.iter().filter(move |(name, _)| name.contains(&pattern))
    }
}

fn parse_value(raw: &str) -> Option<i64> {
    let raw = raw.trim_start_matches('(').trim_end_matches(')');
    let raw = raw.trim_end_matches(|c| c == 'L' || c == 'U' || c == 'l' || c == 'u');
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}
