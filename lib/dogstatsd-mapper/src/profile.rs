use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

/// Configuration name of [`MatchType::Wildcard`].
pub const MATCH_TYPE_WILDCARD: &str = "wildcard";
/// Configuration name of [`MatchType::Regex`].
pub const MATCH_TYPE_REGEX: &str = "regex";

/// Syntax of a mapping's `match` pattern.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MatchType {
    /// Literal pattern where each `*` captures any run of characters, referenced as `$N` in templates.
    ///
    /// Wildcard patterns must match the whole metric name.
    #[default]
    Wildcard,

    /// Regular expression, with numbered groups referenced as `${N}` in templates.
    ///
    /// The expression is used as written and may match anywhere in the metric name. Anchor it with `^` and `$` to
    /// avoid matching in the middle of a name and dropping the text around the match from the rewritten name.
    Regex,
}

impl MatchType {
    /// Parses a match type as written in the configuration.
    ///
    /// An empty value is treated the same as an absent one, and selects [`MatchType::Wildcard`]. Returns `None` for
    /// unrecognized values.
    pub fn from_config(value: &str) -> Option<Self> {
        match value {
            "" | MATCH_TYPE_WILDCARD => Some(Self::Wildcard),
            MATCH_TYPE_REGEX => Some(Self::Regex),
            _ => None,
        }
    }

    /// Returns the configuration name of this match type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wildcard => MATCH_TYPE_WILDCARD,
            Self::Regex => MATCH_TYPE_REGEX,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, ordered group of mapping rules.
///
/// When `prefix` is non-empty, metric names that do not start with it skip every mapping in the profile.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MappingProfile {
    /// Profile name, used in diagnostics.
    #[serde(default)]
    pub name: String,

    /// Prefix a metric name must start with for the profile's mappings to be tested. Empty matches all names.
    #[serde(default)]
    pub prefix: String,

    /// Mappings, in evaluation order.
    #[serde(default)]
    pub mappings: Vec<MetricMapping>,
}

impl MappingProfile {
    /// Creates an empty profile with the given name and prefix.
    pub fn new<N: Into<String>, P: Into<String>>(name: N, prefix: P) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            mappings: Vec::new(),
        }
    }

    /// Appends a mapping to the profile.
    pub fn with_mapping(mut self, mapping: MetricMapping) -> Self {
        self.mappings.push(mapping);
        self
    }
}

/// A single rule rewriting a matching metric name into a new name and a set of tags.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MetricMapping {
    /// Pattern a metric name must match, interpreted according to `match_type`.
    #[serde(rename = "match")]
    pub metric_match: String,

    /// Syntax of `metric_match`: `wildcard` (also when empty) or `regex`.
    ///
    /// Kept as written so that an unrecognized value is reported against its profile and mapping when the mapper is
    /// built. See [`MatchType::from_config`].
    #[serde(default)]
    pub match_type: String,

    /// Template for the rewritten metric name.
    pub name: String,

    /// Tag keys, and templates for their values.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl MetricMapping {
    /// Creates a wildcard mapping.
    pub fn wildcard<M: Into<String>, N: Into<String>>(metric_match: M, name: N) -> Self {
        Self {
            metric_match: metric_match.into(),
            match_type: MATCH_TYPE_WILDCARD.to_string(),
            name: name.into(),
            tags: HashMap::new(),
        }
    }

    /// Creates a regular expression mapping.
    pub fn regex<M: Into<String>, N: Into<String>>(metric_match: M, name: N) -> Self {
        Self {
            metric_match: metric_match.into(),
            match_type: MATCH_TYPE_REGEX.to_string(),
            name: name.into(),
            tags: HashMap::new(),
        }
    }

    /// Adds a tag whose value is rendered from the given template.
    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, key: K, template: V) -> Self {
        self.tags.insert(key.into(), template.into());
        self
    }
}
