use std::{num::NonZeroUsize, ops::Range, sync::Arc};

use tracing::{debug, trace};

use crate::{
    cache::{Outcome, ResultCache},
    error::MapperError,
    pattern::CompiledMapping,
    profile::MappingProfile,
};

/// The result of mapping a metric name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MapResult {
    /// Rewritten metric name.
    pub name: String,

    /// Tags extracted from the metric name, in `key:value` form.
    ///
    /// Tags are ordered by key.
    pub tags: Vec<String>,
}

/// A profile's slice of the flattened mapping list.
#[derive(Clone, Debug)]
struct ProfileSpan {
    name: String,
    prefix: String,
    mappings: Range<usize>,
}

impl ProfileSpan {
    fn accepts(&self, metric_name: &str) -> bool {
        self.prefix.is_empty() || metric_name.starts_with(self.prefix.as_str())
    }
}

/// Rewrites metric names, extracting dynamic name segments into tags.
///
/// Mappings are evaluated in declaration order across all profiles, and the first mapping whose pattern matches wins.
/// Profiles with a non-empty prefix are skipped entirely for metric names that do not start with that prefix.
///
/// A `MetricMapper` is immutable once built, other than its internal result cache, and can be shared freely between
/// threads.
pub struct MetricMapper {
    mappings: Vec<CompiledMapping>,
    profiles: Vec<ProfileSpan>,
    cache: Option<ResultCache>,
}

impl MetricMapper {
    /// Creates a new `MetricMapper` from the given profiles.
    ///
    /// Up to `cache_capacity` outcomes are cached, keyed by metric name. A capacity of zero disables caching.
    ///
    /// # Errors
    ///
    /// If any mapping has an unrecognized match type, an invalid pattern, or a name or tag template that is malformed or references a capture group
    /// the pattern does not define, an error is returned identifying the profile and mapping.
    pub fn new(profiles: &[MappingProfile], cache_capacity: usize) -> Result<Self, MapperError> {
        let mut mappings = Vec::with_capacity(profiles.iter().map(|p| p.mappings.len()).sum());
        let mut spans = Vec::with_capacity(profiles.len());

        for profile in profiles {
            let start = mappings.len();
            for (i, mapping) in profile.mappings.iter().enumerate() {
                let compiled = CompiledMapping::compile(&profile.name, i, mapping)?;
                trace!(
                    profile = %profile.name,
                    mapping = i,
                    pattern = compiled.pattern().as_str(),
                    "Compiled metric mapping."
                );
                mappings.push(compiled);
            }

            spans.push(ProfileSpan {
                name: profile.name.clone(),
                prefix: profile.prefix.clone(),
                mappings: start..mappings.len(),
            });
        }

        let cache = NonZeroUsize::new(cache_capacity).map(ResultCache::new);

        debug!(
            profiles = spans.len(),
            mappings = mappings.len(),
            cache_capacity,
            "Built metric mapper."
        );

        Ok(Self {
            mappings,
            profiles: spans,
            cache,
        })
    }

    /// Maps the given metric name.
    ///
    /// Returns `None` if no mapping matches, in which case the metric should pass through unmodified.
    pub fn map(&self, metric_name: &str) -> Option<Arc<MapResult>> {
        let Some(cache) = &self.cache else {
            return self.evaluate(metric_name);
        };

        if let Some(outcome) = cache.get(metric_name) {
            return outcome;
        }

        let outcome = self.evaluate(metric_name);
        cache.insert(metric_name, outcome.clone());
        outcome
    }

    fn evaluate(&self, metric_name: &str) -> Outcome {
        self.profiles
            .iter()
            .filter(|profile| profile.accepts(metric_name))
            .flat_map(|profile| &self.mappings[profile.mappings.clone()])
            .find_map(|mapping| mapping.apply(metric_name))
            .map(Arc::new)
    }

    /// Returns the name and prefix of each profile, in evaluation order.
    pub fn profiles(&self) -> impl Iterator<Item = (&str, &str)> {
        self.profiles.iter().map(|p| (p.name.as_str(), p.prefix.as_str()))
    }

    /// Returns the total number of mappings across all profiles.
    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }

    /// Returns the number of cached outcomes.
    ///
    /// Always zero when caching is disabled.
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, ResultCache::len)
    }

    /// Returns the configured cache capacity, or zero if caching is disabled.
    pub fn cache_capacity(&self) -> usize {
        self.cache.as_ref().map_or(0, ResultCache::capacity)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::profile::MetricMapping;

    fn nsq_profiles() -> Vec<MappingProfile> {
        vec![MappingProfile::new("nsq", "nsq.")
            .with_mapping(
                MetricMapping::wildcard("nsq.statsd.topic.*.channel.*.*", "nsq.statsd.topic.channel.$3")
                    .with_tag("nsq_topic", "$1")
                    .with_tag("nsq_channel", "$2"),
            )
            .with_mapping(
                MetricMapping::wildcard("nsq.statsd.topic.*.*", "nsq.statsd.topic.$2").with_tag("nsq_topic", "$1"),
            )]
    }

    fn mapped(name: &str, tags: &[&str]) -> MapResult {
        let mut tags = tags.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        tags.sort();
        MapResult {
            name: name.to_string(),
            tags,
        }
    }

    fn sorted(result: Option<Arc<MapResult>>) -> Option<MapResult> {
        result.map(|r| {
            let mut r = MapResult::clone(&r);
            r.tags.sort();
            r
        })
    }

    #[test]
    fn wildcard_scenarios() {
        let mapper = MetricMapper::new(&nsq_profiles(), 100).unwrap();

        let cases = [
            (
                "nsq.statsd.topic.top-name.metric-name",
                Some(mapped("nsq.statsd.topic.metric-name", &["nsq_topic:top-name"])),
            ),
            (
                "nsq.statsd.topic.top.name.metric-name",
                Some(mapped("nsq.statsd.topic.metric-name", &["nsq_topic:top.name"])),
            ),
            (
                "nsq.statsd.topic.top-name.channel.chan-name.metric-name",
                Some(mapped(
                    "nsq.statsd.topic.channel.metric-name",
                    &["nsq_topic:top-name", "nsq_channel:chan-name"],
                )),
            ),
            ("nsq.something-else", None),
            ("statsd.topic.top-name.metric-name", None),
        ];

        for (input, expected) in cases {
            assert_eq!(sorted(mapper.map(input)), expected, "input: {}", input);
        }
    }

    #[test]
    fn first_match_wins_across_profiles() {
        let profiles = vec![
            MappingProfile::new("first", "").with_mapping(MetricMapping::wildcard("app.*", "first.$1")),
            MappingProfile::new("second", "app.").with_mapping(MetricMapping::wildcard("app.*", "second.$1")),
        ];
        let mapper = MetricMapper::new(&profiles, 0).unwrap();

        assert_eq!(mapper.map("app.requests").unwrap().name, "first.requests");
    }

    #[test]
    fn first_match_wins_within_profile() {
        let profiles = vec![MappingProfile::new("p", "")
            .with_mapping(MetricMapping::regex(r"^app\.(.+)$", "generic"))
            .with_mapping(MetricMapping::regex(r"^app\.requests$", "specific"))];
        let mapper = MetricMapper::new(&profiles, 0).unwrap();

        assert_eq!(mapper.map("app.requests").unwrap().name, "generic");
    }

    #[test]
    fn prefix_skips_profile() {
        // The pattern would match, but the prefix rules the profile out first.
        let profiles = vec![MappingProfile::new("p", "other.").with_mapping(MetricMapping::wildcard("*", "all"))];
        let mapper = MetricMapper::new(&profiles, 0).unwrap();

        assert!(mapper.map("app.requests").is_none());
        assert_eq!(mapper.map("other.requests").unwrap().name, "all");
    }

    #[test]
    fn no_match_is_cached() {
        let mapper = MetricMapper::new(&nsq_profiles(), 10).unwrap();

        assert!(mapper.map("nsq.something-else").is_none());
        assert_eq!(mapper.cache_len(), 1);
        assert!(mapper.map("nsq.something-else").is_none());
        assert_eq!(mapper.cache_len(), 1);
    }

    #[test]
    fn cache_disabled() {
        let mapper = MetricMapper::new(&nsq_profiles(), 0).unwrap();
        assert_eq!(mapper.cache_capacity(), 0);

        assert!(mapper.map("nsq.statsd.topic.a.b").is_some());
        assert_eq!(mapper.cache_len(), 0);
    }

    #[test]
    fn cache_is_bounded() {
        let mapper = MetricMapper::new(&nsq_profiles(), 2).unwrap();
        for i in 0..5 {
            mapper.map(&format!("nsq.statsd.topic.t{}.m", i));
        }
        assert_eq!(mapper.cache_len(), 2);
        assert_eq!(mapper.cache_capacity(), 2);
    }

    #[test]
    fn error_identifies_profile_and_mapping() {
        let profiles = vec![
            MappingProfile::new("good", "").with_mapping(MetricMapping::wildcard("a.*", "a")),
            MappingProfile::new("bad", "")
                .with_mapping(MetricMapping::wildcard("b.*", "b"))
                .with_mapping(MetricMapping::wildcard("b.*.c", "b.$2")),
        ];

        match MetricMapper::new(&profiles, 0) {
            Err(MapperError::CaptureOutOfRange { profile, mapping, .. }) => {
                assert_eq!(profile, "bad");
                assert_eq!(mapping, 1);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn invalid_match_type_identifies_profile_and_mapping() {
        let mut bad = MetricMapping::regex(r"^b\.(.*)$", "b.${1}");
        bad.match_type = "regexp".to_string();

        let profiles = vec![
            MappingProfile::new("good", "").with_mapping(MetricMapping::wildcard("a.*", "a")),
            MappingProfile::new("typo", "b.")
                .with_mapping(MetricMapping::wildcard("b.*.c", "b.c"))
                .with_mapping(bad),
        ];

        match MetricMapper::new(&profiles, 0) {
            Err(MapperError::InvalidMatchType { profile, mapping, value }) => {
                assert_eq!(profile, "typo");
                assert_eq!(mapping, 1);
                assert_eq!(value, "regexp");
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn introspection() {
        let mapper = MetricMapper::new(&nsq_profiles(), 5).unwrap();
        assert_eq!(mapper.mapping_count(), 2);
        assert_eq!(mapper.profiles().collect::<Vec<_>>(), vec![("nsq", "nsq.")]);
    }

    #[test]
    fn mapper_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MetricMapper>();
    }

    #[test]
    fn concurrent_lookups() {
        let mapper = Arc::new(MetricMapper::new(&nsq_profiles(), 8).unwrap());

        let handles = (0..4)
            .map(|t| {
                let mapper = Arc::clone(&mapper);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let result = mapper.map(&format!("nsq.statsd.topic.t{}.m{}", (t + i) % 16, i % 3));
                        let result = result.expect("should match");
                        assert_eq!(result.tags, vec![format!("nsq_topic:t{}", (t + i) % 16)]);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(mapper.cache_len() <= 8);
    }

    fn metric_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "nsq\\.statsd\\.topic\\.[a-z.-]{1,12}\\.[a-z_]{1,8}",
            "nsq\\.statsd\\.topic\\.[a-z.]{1,8}\\.channel\\.[a-z.]{1,8}\\.[a-z_]{1,8}",
            "[a-z.]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn property_prefix_is_transparent(name in metric_name()) {
            let with_prefix = MetricMapper::new(&nsq_profiles(), 0).unwrap();

            let mut profiles = nsq_profiles();
            for profile in &mut profiles {
                profile.prefix.clear();
            }
            let without_prefix = MetricMapper::new(&profiles, 0).unwrap();

            prop_assert_eq!(with_prefix.map(&name), without_prefix.map(&name));
        }

        #[test]
        fn property_cache_is_transparent(names in proptest::collection::vec(metric_name(), 1..32)) {
            let cached = MetricMapper::new(&nsq_profiles(), 4).unwrap();
            let uncached = MetricMapper::new(&nsq_profiles(), 0).unwrap();

            // Look every name up twice so that some lookups are served from the cache.
            for name in names.iter().chain(names.iter()) {
                prop_assert_eq!(cached.map(name), uncached.map(name));
            }
        }

        #[test]
        fn property_wildcard_captures_reassemble(topic in "[a-z][a-z.]{0,10}[a-z]", metric in "[a-z_]{1,8}") {
            let mapper = MetricMapper::new(&nsq_profiles(), 0).unwrap();
            prop_assume!(!topic.contains(".channel."));

            let input = format!("nsq.statsd.topic.{}.{}", topic, metric);
            let result = mapper.map(&input).unwrap();

            // The greedy first wildcard leaves only the final segment to the second.
            let (expected_topic, expected_metric) = input["nsq.statsd.topic.".len()..].rsplit_once('.').unwrap();
            prop_assert_eq!(&result.name, &format!("nsq.statsd.topic.{}", expected_metric));
            prop_assert_eq!(&result.tags, &vec![format!("nsq_topic:{}", expected_topic)]);
        }
    }
}
