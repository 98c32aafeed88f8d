//! Translation of mapping rules into executable patterns.

use regex::Regex;
use snafu::{OptionExt as _, ResultExt as _};

use crate::{
    error::{
        CaptureOutOfRange, InvalidMatchType, InvalidRegex, InvalidWildcard, MalformedTemplate, MapperError, MissingName,
    },
    mapper::MapResult,
    profile::{MatchType, MetricMapping},
    template::{ReferenceSyntax, Template},
};

/// Compiled `match` pattern of a mapping.
#[derive(Clone, Debug)]
pub(crate) enum CompiledPattern {
    /// Translated wildcard pattern, anchored at both ends.
    Wildcard(Regex),

    /// User-provided regular expression, compiled verbatim.
    Regex(Regex),
}

impl CompiledPattern {
    fn regex(&self) -> &Regex {
        match self {
            Self::Wildcard(re) | Self::Regex(re) => re,
        }
    }

    fn reference_syntax(&self) -> ReferenceSyntax {
        match self {
            Self::Wildcard(_) => ReferenceSyntax::Bare,
            Self::Regex(_) => ReferenceSyntax::Braced,
        }
    }

    /// Returns the number of capture groups, not counting the implicit whole-match group.
    pub fn groups(&self) -> usize {
        self.regex().captures_len() - 1
    }

    pub fn as_str(&self) -> &str {
        self.regex().as_str()
    }
}

/// Translates a wildcard pattern into regular expression syntax.
///
/// Literal characters are escaped and each `*` becomes a greedy capture group that may span dots. The result is
/// anchored at both ends.
pub(crate) fn translate_wildcard(pattern: &str) -> Result<String, &'static str> {
    if pattern.is_empty() {
        return Err("pattern must not be empty");
    }
    if pattern.contains("**") {
        return Err("pattern must not contain consecutive `*`");
    }

    let mut translated = String::with_capacity(pattern.len() * 2 + 2);
    translated.push('^');
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        if ch == '*' {
            translated.push_str("(.*)");
        } else {
            translated.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
        }
    }
    translated.push('$');

    Ok(translated)
}

/// A mapping rule ready to be evaluated against metric names.
#[derive(Clone, Debug)]
pub(crate) struct CompiledMapping {
    pattern: CompiledPattern,
    name: Template,
    tags: Vec<(String, Template)>,
}

impl CompiledMapping {
    /// Compiles the given mapping.
    ///
    /// `profile` and `index` only serve to identify the mapping in errors.
    pub fn compile(profile: &str, index: usize, mapping: &MetricMapping) -> Result<Self, MapperError> {
        let match_type = MatchType::from_config(&mapping.match_type).context(InvalidMatchType {
            profile,
            mapping: index,
            value: mapping.match_type.as_str(),
        })?;

        let pattern = match match_type {
            MatchType::Wildcard => {
                let translated = translate_wildcard(&mapping.metric_match).map_err(|reason| {
                    InvalidWildcard {
                        profile,
                        mapping: index,
                        pattern: mapping.metric_match.as_str(),
                        reason,
                    }
                    .build()
                })?;

                // Everything user-provided has been escaped, so only a size limit could reject this.
                let re = Regex::new(&translated).context(InvalidRegex {
                    profile,
                    mapping: index,
                    pattern: mapping.metric_match.as_str(),
                })?;
                CompiledPattern::Wildcard(re)
            }
            MatchType::Regex => {
                let re = Regex::new(&mapping.metric_match).context(InvalidRegex {
                    profile,
                    mapping: index,
                    pattern: mapping.metric_match.as_str(),
                })?;
                CompiledPattern::Regex(re)
            }
        };

        if mapping.name.is_empty() {
            return MissingName { profile, mapping: index }.fail();
        }

        let name = compile_template(profile, index, &pattern, &mapping.name)?;

        let mut tags = mapping
            .tags
            .iter()
            .map(|(key, value)| compile_template(profile, index, &pattern, value).map(|t| (key.clone(), t)))
            .collect::<Result<Vec<_>, _>>()?;
        tags.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self { pattern, name, tags })
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Tests the given metric name, rendering the output name and tags if it matches.
    pub fn apply(&self, metric_name: &str) -> Option<MapResult> {
        let captures = self.pattern.regex().captures(metric_name)?;

        let name = self.name.render(&captures);
        let tags = self
            .tags
            .iter()
            .map(|(key, template)| {
                let mut tag = String::with_capacity(key.len() + 16);
                tag.push_str(key);
                tag.push(':');
                template.render_into(&captures, &mut tag);
                tag
            })
            .collect();

        Some(MapResult { name, tags })
    }
}

fn compile_template(
    profile: &str, index: usize, pattern: &CompiledPattern, template: &str,
) -> Result<Template, MapperError> {
    let re = pattern.regex();
    let resolve_name = |name: &str| re.capture_names().position(|group| group == Some(name));

    let parsed = Template::parse(template, pattern.reference_syntax(), resolve_name).map_err(|e| {
        MalformedTemplate {
            profile,
            mapping: index,
            template,
            reason: e.reason(),
        }
        .build()
    })?;

    let groups = pattern.groups();
    match parsed.max_capture() {
        Some(referenced) if referenced > groups => CaptureOutOfRange {
            profile,
            mapping: index,
            template,
            index: referenced,
            groups,
        }
        .fail(),
        _ => Ok(parsed),
    }
}
