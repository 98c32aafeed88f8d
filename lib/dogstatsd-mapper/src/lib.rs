//! DogStatsD metric name mapping.
//!
//! Metric names arriving over DogStatsD often embed dynamic identifiers, such as a queue or topic name, inside their
//! dotted segments. This crate rewrites such names according to user-declared mapping profiles: the dynamic fragments
//! are captured out of the name and re-emitted as tags, producing a metric name with bounded cardinality.
//!
//! ```
//! use dogstatsd_mapper::{MappingProfile, MetricMapper, MetricMapping};
//!
//! let profiles = vec![MappingProfile::new("nsq", "nsq.").with_mapping(
//!     MetricMapping::wildcard("nsq.statsd.topic.*.*", "nsq.statsd.topic.$2").with_tag("nsq_topic", "$1"),
//! )];
//!
//! let mapper = MetricMapper::new(&profiles, 1000).unwrap();
//! let result = mapper.map("nsq.statsd.topic.orders.depth").unwrap();
//! assert_eq!(result.name, "nsq.statsd.topic.depth");
//! assert_eq!(result.tags, vec!["nsq_topic:orders".to_string()]);
//!
//! assert!(mapper.map("redis.uptime").is_none());
//! ```
#![deny(missing_docs)]

mod cache;

mod config;
pub use self::config::MapperConfiguration;

mod error;
pub use self::error::MapperError;

mod mapper;
pub use self::mapper::{MapResult, MetricMapper};

mod pattern;

mod profile;
pub use self::profile::{MappingProfile, MatchType, MetricMapping, MATCH_TYPE_REGEX, MATCH_TYPE_WILDCARD};

mod template;
