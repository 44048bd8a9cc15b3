//! Path pattern compilation and matching.
//!
//! A route pattern is a regular expression (the `regex` crate dialect, which
//! accepts Python style `(?P<name>...)` groups) that must match the *whole*
//! request path. A pattern captures values either positionally or by name,
//! never both; `(?:...)` groups are not captures. A trailing `.*` is the
//! only way for a pattern to accept an arbitrary suffix.
use std::{borrow::Cow, fmt};

use regex::Regex;
use thiserror::Error;

/// Errors raised while compiling a route pattern.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PatternError {
    #[error("pattern '{pattern}' must start with '/'")]
    NotRooted { pattern: String },

    #[error("pattern '{pattern}' is not a valid regular expression: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("pattern '{pattern}' mixes named and positional captures")]
    MixedCaptureStyles { pattern: String },
}

/// How a compiled pattern exposes its captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStyle {
    /// The pattern has no capturing groups.
    None,
    Positional,
    Named,
}

/// Values extracted from a path by a successful match.
///
/// Optional groups that did not take part in the match are kept as `None` so
/// positions stay stable. Named captures keep their group order, which makes
/// [`CaptureSet::get`] meaningful for both styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSet {
    Positional(Vec<Option<String>>),
    Named(Vec<(String, Option<String>)>),
}

impl CaptureSet {
    pub fn empty() -> Self {
        Self::Positional(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of the capture at `index`, in group order.
    pub fn get(&self, index: usize) -> Option<&str> {
        match self {
            Self::Positional(values) => values.get(index)?.as_deref(),
            Self::Named(pairs) => pairs.get(index)?.1.as_deref(),
        }
    }

    /// Value of a named capture. Always `None` for positional sets.
    pub fn named(&self, name: &str) -> Option<&str> {
        match self {
            Self::Positional(_) => None,
            Self::Named(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| value.as_deref()),
        }
    }

    /// All values in group order, dropping the names.
    pub fn values(&self) -> Vec<Option<&str>> {
        match self {
            Self::Positional(values) => values.iter().map(|v| v.as_deref()).collect(),
            Self::Named(pairs) => pairs.iter().map(|(_, v)| v.as_deref()).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Positional(values) => serde_json::json!(values),
            Self::Named(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::json!(v)))
                    .collect(),
            ),
        }
    }
}

/// A route pattern compiled into an anchored matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
    style: CaptureStyle,
    names: Vec<String>,
}

impl CompiledPattern {
    /// Compile `pattern`. Called once per route at startup.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotRooted {
                pattern: pattern.to_string(),
            });
        }

        let regex =
            Regex::new(&format!("^(?:{pattern})$")).map_err(|e| PatternError::InvalidRegex {
                pattern: pattern.to_string(),
                source: Box::new(e),
            })?;

        // Group 0 is the whole match.
        let mut names = Vec::new();
        let mut positional = 0usize;
        for name in regex.capture_names().skip(1) {
            match name {
                Some(name) => names.push(name.to_string()),
                None => positional += 1,
            }
        }

        let style = match (names.is_empty(), positional) {
            (true, 0) => CaptureStyle::None,
            (true, _) => CaptureStyle::Positional,
            (false, 0) => CaptureStyle::Named,
            (false, _) => {
                return Err(PatternError::MixedCaptureStyles {
                    pattern: pattern.to_string(),
                });
            }
        };

        Ok(Self {
            source: pattern.to_string(),
            regex,
            style,
            names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn style(&self) -> CaptureStyle {
        self.style
    }

    /// Number of capturing groups.
    pub fn capture_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    pub fn capture_names(&self) -> &[String] {
        &self.names
    }

    /// Match the full `path`, returning the percent-decoded captures.
    pub fn matches(&self, path: &str) -> Option<CaptureSet> {
        let caps = self.regex.captures(path)?;

        let set = match self.style {
            CaptureStyle::None => CaptureSet::empty(),
            CaptureStyle::Positional => CaptureSet::Positional(
                caps.iter()
                    .skip(1)
                    .map(|m| m.map(|m| decode(m.as_str())))
                    .collect(),
            ),
            CaptureStyle::Named => CaptureSet::Named(
                self.names
                    .iter()
                    .map(|name| (name.clone(), caps.name(name).map(|m| decode(m.as_str()))))
                    .collect(),
            ),
        };
        Some(set)
    }
}

impl fmt::Display for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// Segments that do not decode to UTF-8 are passed through untouched.
fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}
