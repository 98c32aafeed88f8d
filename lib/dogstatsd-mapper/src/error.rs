use snafu::Snafu;

/// A mapper configuration error.
///
/// Every error is raised while building a [`MetricMapper`][crate::MetricMapper]; once a mapper exists, lookups cannot
/// fail. Mapping-level variants identify the offending rule by profile name and the zero-based position of the mapping
/// within that profile.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum MapperError {
    /// A regular expression `match` could not be compiled.
    #[snafu(display(
        "profile '{}', mapping #{}: invalid regular expression `{}`: {}",
        profile,
        mapping,
        pattern,
        source
    ))]
    InvalidRegex {
        /// Name of the profile containing the mapping.
        profile: String,

        /// Index of the mapping within its profile.
        mapping: usize,

        /// The pattern as written in the configuration.
        pattern: String,

        /// Error source.
        source: regex::Error,
    },

    /// A wildcard `match` was rejected.
    #[snafu(display(
        "profile '{}', mapping #{}: invalid wildcard pattern `{}`: {}",
        profile,
        mapping,
        pattern,
        reason
    ))]
    InvalidWildcard {
        /// Name of the profile containing the mapping.
        profile: String,

        /// Index of the mapping within its profile.
        mapping: usize,

        /// The pattern as written in the configuration.
        pattern: String,

        /// Why the pattern was rejected.
        reason: &'static str,
    },

    /// The output name template was empty.
    #[snafu(display("profile '{}', mapping #{}: name is required", profile, mapping))]
    MissingName {
        /// Name of the profile containing the mapping.
        profile: String,

        /// Index of the mapping within its profile.
        mapping: usize,
    },

    /// A name or tag template could not be parsed.
    #[snafu(display(
        "profile '{}', mapping #{}: malformed template `{}`: {}",
        profile,
        mapping,
        template,
        reason
    ))]
    MalformedTemplate {
        /// Name of the profile containing the mapping.
        profile: String,

        /// Index of the mapping within its profile.
        mapping: usize,

        /// The template as written in the configuration.
        template: String,

        /// Why the template was rejected.
        reason: String,
    },

    /// A name or tag template referenced a capture group that the pattern cannot produce.
    #[snafu(display(
        "profile '{}', mapping #{}: template `{}` references capture group {}, but the pattern only has {}",
        profile,
        mapping,
        template,
        index,
        groups
    ))]
    CaptureOutOfRange {
        /// Name of the profile containing the mapping.
        profile: String,

        /// Index of the mapping within its profile.
        mapping: usize,

        /// The template as written in the configuration.
        template: String,

        /// The referenced capture group.
        index: usize,

        /// Number of capture groups the pattern defines.
        groups: usize,
    },

    /// The `match_type` of a mapping was not recognized.
    #[snafu(display(
        "profile '{}', mapping #{}: invalid match type '{}', must be `wildcard` or `regex`",
        profile,
        mapping,
        value
    ))]
    InvalidMatchType {
        /// Name of the profile containing the mapping.
        profile: String,

        /// Index of the mapping within its profile.
        mapping: usize,

        /// The match type as written in the configuration.
        value: String,
    },

    /// Mapper configuration could not be loaded or decoded.
    #[snafu(display("failed to load mapper configuration: {}", source))]
    Configuration {
        /// Error source.
        source: Box<figment::Error>,
    },
}
