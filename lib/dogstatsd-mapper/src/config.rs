use std::{path::Path, str::FromStr};

use figment::{
    providers::{Env, Format as _, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use snafu::ResultExt as _;
use tracing::debug;

use crate::{
    error::{Configuration, MapperError},
    mapper::MetricMapper,
    profile::MappingProfile,
};

const fn default_cache_size() -> i64 {
    1000
}

/// Metric mapper configuration.
///
/// Mirrors the Datadog Agent settings:
///
/// ```yaml
/// dogstatsd_mapper_cache_size: 1000
/// dogstatsd_mapper_profiles:
///   - name: nsq
///     prefix: "nsq."
///     mappings:
///       - match: "nsq.statsd.topic.*.*"
///         name: "nsq.statsd.topic.$2"
///         tags:
///           nsq_topic: "$1"
/// ```
///
/// Profiles may also be given as a JSON-encoded string, which is how they are provided through a single environment
/// variable.
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct MapperConfiguration {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    dogstatsd_mapper_profiles: MapperProfiles,

    /// Maximum number of cached outcomes. Zero or negative values disable caching.
    #[serde(default = "default_cache_size")]
    dogstatsd_mapper_cache_size: i64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct MapperProfiles(Vec<MappingProfile>);

impl FromStr for MapperProfiles {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let profiles: Vec<MappingProfile> = serde_json::from_str(s)?;
        Ok(MapperProfiles(profiles))
    }
}

impl MapperConfiguration {
    /// Creates a new `MapperConfiguration` from already-decoded profiles.
    pub fn new(profiles: Vec<MappingProfile>, cache_size: i64) -> Self {
        Self {
            dogstatsd_mapper_profiles: MapperProfiles(profiles),
            dogstatsd_mapper_cache_size: cache_size,
        }
    }

    /// Extracts the configuration from the given `Figment`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized, an error is returned.
    pub fn from_figment(figment: &Figment) -> Result<Self, MapperError> {
        figment.extract().map_err(Box::new).context(Configuration)
    }

    /// Parses the configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// If the document is not valid YAML, or could not be deserialized, an error is returned.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, MapperError> {
        Self::from_figment(&Figment::from(Yaml::string(yaml)))
    }

    /// Loads the configuration from a YAML file.
    ///
    /// A missing file is treated as an empty document, yielding no profiles.
    ///
    /// # Errors
    ///
    /// If the file is not valid YAML, or could not be deserialized, an error is returned.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, MapperError> {
        Self::from_figment(&Figment::from(Yaml::file(path.as_ref())))
    }

    /// Loads the configuration from environment variables with the given prefix.
    ///
    /// An underscore is appended to the prefix if it does not already end with one, so a prefix of `DD` reads
    /// `DD_DOGSTATSD_MAPPER_PROFILES` and `DD_DOGSTATSD_MAPPER_CACHE_SIZE`.
    ///
    /// # Errors
    ///
    /// If a variable could not be deserialized, an error is returned.
    pub fn from_environment(prefix: &str) -> Result<Self, MapperError> {
        let prefix = if prefix.ends_with('_') {
            prefix.to_string()
        } else {
            format!("{}_", prefix)
        };

        Self::from_figment(&Figment::from(Env::prefixed(&prefix)))
    }

    /// Returns the configured profiles.
    pub fn profiles(&self) -> &[MappingProfile] {
        &self.dogstatsd_mapper_profiles.0
    }

    /// Returns the effective cache capacity.
    pub fn cache_capacity(&self) -> usize {
        usize::try_from(self.dogstatsd_mapper_cache_size).unwrap_or(0)
    }

    /// Builds a [`MetricMapper`] from this configuration.
    ///
    /// # Errors
    ///
    /// If any mapping is invalid, an error is returned. See [`MetricMapper::new`].
    pub fn build(&self) -> Result<MetricMapper, MapperError> {
        if self.dogstatsd_mapper_cache_size < 0 {
            debug!(
                cache_size = self.dogstatsd_mapper_cache_size,
                "Negative mapper cache size configured. Caching disabled."
            );
        }

        MetricMapper::new(self.profiles(), self.cache_capacity())
    }
}
