use serde::{Deserialize, Serialize};
use std::fmt;

/// Token left in place when the packaging step did not substitute a date.
pub const BUILD_STAMP_PLACEHOLDER: &str = "__DATE__";

/// Compile-time stamp, if the packaging step exported `OCD_BUILD_STAMP`.
const COMPILED_STAMP: Option<&str> = option_env!("OCD_BUILD_STAMP");

/// When the application was packaged.
///
/// Immutable once constructed. The shell displays it verbatim and never
/// parses or validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildStamp(String);

impl BuildStamp {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn placeholder() -> Self {
        Self(BUILD_STAMP_PLACEHOLDER.to_string())
    }

    /// Stamp baked in at compile time, falling back to the placeholder.
    pub fn compiled() -> Self {
        COMPILED_STAMP
            .filter(|value| !value.is_empty())
            .map(Self::new)
            .unwrap_or_else(Self::placeholder)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when packaging skipped the substitution step.
    pub fn is_placeholder(&self) -> bool {
        self.0 == BUILD_STAMP_PLACEHOLDER
    }
}

impl Default for BuildStamp {
    fn default() -> Self {
        Self::compiled()
    }
}

impl fmt::Display for BuildStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildStamp {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BuildStamp {
    fn from(value: String) -> Self {
        Self(value)
    }
}
