//! Output name and tag templates.
//!
//! Templates are split once, when a mapper is built, into literal text and capture group references, so that
//! rendering a match is a straight concatenation.

use regex::Captures;

/// How capture group references are written in a template.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ReferenceSyntax {
    /// `$N`, used by wildcard mappings.
    Bare,

    /// `${N}` or `${name}`, used by regular expression mappings.
    Braced,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Capture(usize),
}

/// Reasons a template cannot be parsed.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum TemplateError {
    Unterminated,
    InvalidReference(String),
    UnknownGroup(String),
}

impl TemplateError {
    pub fn reason(&self) -> String {
        match self {
            Self::Unterminated => "unterminated `${` reference".to_string(),
            Self::InvalidReference(reference) => format!("invalid capture group reference `{}`", reference),
            Self::UnknownGroup(name) => format!("no capture group named `{}`", name),
        }
    }
}

/// A pre-parsed template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template.
    ///
    /// `resolve_name` maps a named group to its index, and is only consulted for braced references.
    pub fn parse<F>(template: &str, syntax: ReferenceSyntax, resolve_name: F) -> Result<Self, TemplateError>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let mut builder = SegmentsBuilder::default();
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            builder.push_literal(&rest[..pos]);
            let after = &rest[pos + 1..];

            match syntax {
                ReferenceSyntax::Bare => {
                    let digits = after.bytes().take_while(u8::is_ascii_digit).count();
                    if digits == 0 {
                        builder.push_literal("$");
                        rest = after;
                        continue;
                    }

                    let index = parse_index(&after[..digits])?;
                    builder.push_capture(index);
                    rest = &after[digits..];
                }
                ReferenceSyntax::Braced => {
                    let Some(inner) = after.strip_prefix('{') else {
                        builder.push_literal("$");
                        rest = after;
                        continue;
                    };

                    let end = inner.find('}').ok_or(TemplateError::Unterminated)?;
                    let reference = &inner[..end];
                    let index = if !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_digit()) {
                        parse_index(reference)?
                    } else if is_group_name(reference) {
                        resolve_name(reference).ok_or_else(|| TemplateError::UnknownGroup(reference.to_string()))?
                    } else {
                        return Err(TemplateError::InvalidReference(reference.to_string()));
                    };
                    builder.push_capture(index);
                    rest = &inner[end + 1..];
                }
            }
        }

        builder.push_literal(rest);
        Ok(Self {
            segments: builder.segments,
        })
    }

    /// Returns the highest capture group index referenced, if any.
    pub fn max_capture(&self) -> Option<usize> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Capture(index) => Some(*index),
                Segment::Literal(_) => None,
            })
            .max()
    }

    /// Renders the template into `out` using the given captures.
    ///
    /// Groups that did not participate in the match render as the empty string.
    pub fn render_into(&self, captures: &Captures<'_>, out: &mut String) {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Capture(index) => {
                    if let Some(matched) = captures.get(*index) {
                        out.push_str(matched.as_str());
                    }
                }
            }
        }
    }

    pub fn render(&self, captures: &Captures<'_>) -> String {
        let mut out = String::new();
        self.render_into(captures, &mut out);
        out
    }

    #[cfg(test)]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

#[derive(Default)]
struct SegmentsBuilder {
    segments: Vec<Segment>,
}

impl SegmentsBuilder {
    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        match self.segments.last_mut() {
            Some(Segment::Literal(existing)) => existing.push_str(text),
            _ => self.segments.push(Segment::Literal(text.to_string())),
        }
    }

    fn push_capture(&mut self, index: usize) {
        self.segments.push(Segment::Capture(index));
    }
}

fn parse_index(digits: &str) -> Result<usize, TemplateError> {
    digits
        .parse()
        .map_err(|_| TemplateError::InvalidReference(digits.to_string()))
}

fn is_group_name(reference: &str) -> bool {
    !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;

    fn no_names(_: &str) -> Option<usize> {
        None
    }

    fn literal(text: &str) -> Segment {
        Segment::Literal(text.to_string())
    }

    #[test]
    fn bare_references() {
        let template = Template::parse("nsq.$1.metric.$2", ReferenceSyntax::Bare, no_names).unwrap();
        assert_eq!(
            template.segments(),
            &[
                literal("nsq."),
                Segment::Capture(1),
                literal(".metric."),
                Segment::Capture(2)
            ]
        );
        assert_eq!(template.max_capture(), Some(2));
    }

    #[test]
    fn bare_multi_digit_and_stray_dollar() {
        let template = Template::parse("$12$-cost$", ReferenceSyntax::Bare, no_names).unwrap();
        assert_eq!(template.segments(), &[Segment::Capture(12), literal("$-cost$")]);
    }

    #[test]
    fn bare_ignores_braces() {
        let template = Template::parse("${1}", ReferenceSyntax::Bare, no_names).unwrap();
        assert_eq!(template.segments(), &[literal("${1}")]);
        assert_eq!(template.max_capture(), None);
    }

    #[test]
    fn braced_references() {
        let template = Template::parse("${1}.${2}${3}", ReferenceSyntax::Braced, no_names).unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Capture(1),
                literal("."),
                Segment::Capture(2),
                Segment::Capture(3)
            ]
        );
    }

    #[test]
    fn braced_ignores_bare_references() {
        let template = Template::parse("cost.$1", ReferenceSyntax::Braced, no_names).unwrap();
        assert_eq!(template.segments(), &[literal("cost.$1")]);
    }

    #[test]
    fn braced_named_groups() {
        let resolve = |name: &str| (name == "topic").then_some(4);
        let template = Template::parse("t:${topic}", ReferenceSyntax::Braced, resolve).unwrap();
        assert_eq!(template.segments(), &[literal("t:"), Segment::Capture(4)]);

        let err = Template::parse("${channel}", ReferenceSyntax::Braced, resolve).unwrap_err();
        assert_eq!(err, TemplateError::UnknownGroup("channel".to_string()));
    }

    #[test]
    fn braced_errors() {
        assert_eq!(
            Template::parse("a.${1", ReferenceSyntax::Braced, no_names).unwrap_err(),
            TemplateError::Unterminated
        );
        assert_eq!(
            Template::parse("a.${}", ReferenceSyntax::Braced, no_names).unwrap_err(),
            TemplateError::InvalidReference(String::new())
        );
        assert_eq!(
            Template::parse("a.${1-2}", ReferenceSyntax::Braced, no_names).unwrap_err(),
            TemplateError::InvalidReference("1-2".to_string())
        );
    }

    #[test]
    fn render_with_unmatched_group() {
        let re = Regex::new(r"^(a)|(b)$").unwrap();
        let captures = re.captures("a").unwrap();

        let template = Template::parse("[${1}|${2}]", ReferenceSyntax::Braced, no_names).unwrap();
        assert_eq!(template.render(&captures), "[a|]");
    }

    #[test]
    fn render_plain_literal() {
        let re = Regex::new("x").unwrap();
        let captures = re.captures("x").unwrap();

        let template = Template::parse("constant.name", ReferenceSyntax::Bare, no_names).unwrap();
        assert_eq!(template.max_capture(), None);
        assert_eq!(template.render(&captures), "constant.name");
    }
}
