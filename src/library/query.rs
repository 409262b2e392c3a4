// Query language for picking tracks
//
//   term            substring of artist / album / albumartist / title / genre / path
//   field:value     case-insensitive substring of one field
//   field::regex    regular expression against one field
//   ^term           negate any of the above
//
// All terms must match. Missing fields compare as "", so `mood::^$` finds untagged moods.

use regex::{Regex, RegexBuilder};

use super::LibraryError;

const DEFAULT_FIELDS: &[&str] = &["artist", "album", "albumartist", "title", "genre", "path"];

#[derive(Debug, Clone)]
enum Matcher {
    Substring(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Substring(needle) => value.to_lowercase().contains(needle),
            Matcher::Pattern(regex) => regex.is_match(value),
        }
    }
}

#[derive(Debug, Clone)]
struct Term {
    field: Option<String>,
    matcher: Matcher,
    negated: bool,
}

impl Term {
    fn parse(raw: &str) -> Result<Self, LibraryError> {
        let (negated, body) = match raw.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let (field, matcher) = match body.split_once(':') {
            Some((field, rest)) if is_field_name(field) => {
                let matcher = match rest.strip_prefix(':') {
                    Some(pattern) => Matcher::Pattern(compile(raw, pattern)?),
                    None => Matcher::Substring(rest.to_lowercase()),
                };
                (Some(field.to_lowercase()), matcher)
            }
            _ => (None, Matcher::Substring(body.to_lowercase())),
        };

        Ok(Self { field, matcher, negated })
    }

    fn matches<'a>(&self, lookup: &impl Fn(&str) -> Option<&'a str>) -> bool {
        let hit = match &self.field {
            Some(field) => self.matcher.matches(lookup(field.as_str()).unwrap_or("")),
            None => DEFAULT_FIELDS
                .iter()
                .any(|&field| lookup(field).is_some_and(|value| self.matcher.matches(value))),
        };
        hit != self.negated
    }
}

fn is_field_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn compile(term: &str, pattern: &str) -> Result<Regex, LibraryError> {
    RegexBuilder::new(pattern)
        .build()
        .map_err(|e| LibraryError::InvalidQuery {
            term: term.to_string(),
            reason: e.to_string(),
        })
}

/// Parsed query - an AND of terms
#[derive(Debug, Clone, Default)]
pub struct Query {
    terms: Vec<Term>,
}

impl Query {
    pub fn parse<S: AsRef<str>>(terms: &[S]) -> Result<Self, LibraryError> {
        let terms = terms
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !t.is_empty())
            .map(Term::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    /// `lookup` resolves a field name to its value for the item being tested
    pub fn matches<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.terms.iter().all(|term| term.matches(&lookup))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
