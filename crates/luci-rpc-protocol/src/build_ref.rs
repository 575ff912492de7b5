//! Build references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A builder plus an optional build number or build ID.
///
/// Without a build number this refers to the most recent build of the
/// builder. Equality and hashing are by value, so a `BuildRef` can key a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildRef {
    pub builder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
}

impl BuildRef {
    /// The latest build of `builder_name`.
    pub fn latest(builder_name: impl Into<String>) -> Self {
        Self {
            builder_name: builder_name.into(),
            build_number: None,
            build_id: None,
        }
    }

    /// A specific build number of `builder_name`.
    pub fn numbered(builder_name: impl Into<String>, build_number: u64) -> Self {
        Self {
            build_number: Some(build_number),
            ..Self::latest(builder_name)
        }
    }

    /// Attach a Buildbucket build ID.
    pub fn with_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }

    /// True when this reference means "whatever ran most recently".
    pub fn is_latest(&self) -> bool {
        self.build_number.is_none() && self.build_id.is_none()
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.build_number, &self.build_id) {
            (Some(number), _) => write!(f, "{}#{}", self.builder_name, number),
            (None, Some(id)) => write!(f, "{} ({})", self.builder_name, id),
            (None, None) => write!(f, "{} (latest)", self.builder_name),
        }
    }
}

/// A `builder[:number]` string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBuildRefError(String);

impl fmt::Display for ParseBuildRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid build reference {:?}: expected BUILDER or BUILDER:NUMBER", self.0)
    }
}

impl std::error::Error for ParseBuildRefError {}

/// Parses `builder` (latest) or `builder:number`.
impl FromStr for BuildRef {
    type Err = ParseBuildRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseBuildRefError(s.to_string());
        match s.rsplit_once(':') {
            Some((builder, number)) if !builder.is_empty() => {
                let number = number.parse().map_err(|_| invalid())?;
                Ok(Self::numbered(builder, number))
            }
            Some(_) => Err(invalid()),
            None if s.is_empty() => Err(invalid()),
            None => Ok(Self::latest(s)),
        }
    }
}
