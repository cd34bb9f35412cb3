//! Include-pattern matching for precache file discovery.
//!
//! Supports the glob subset the precache patterns use:
//!
//! | Syntax | Meaning |
//! |---|---|
//! | `*` | any run of characters within one path segment |
//! | `?` | one character within a segment |
//! | `**` | zero or more whole segments |
//! | `{a,b}` | alternatives (expanded before matching, may nest) |
//! | `!(a\|b)` | one segment that is none of the alternatives |
//!
//! Segments starting with `.` are only matched by pattern segments that
//! start with `.` themselves, so dotfiles stay out of the precache.
//!
//! The `regex` crate has no lookaround, so negated segments are kept as a
//! separate matcher rather than folded into one big regex.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("invalid glob pattern {pattern:?}: {reason}")]
pub struct GlobError {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
enum Segment {
    /// `**`
    Globstar,
    /// Ordinary segment; `dot` is true when the pattern itself starts with `.`.
    Match { regex: Regex, dot: bool },
    /// `!(…)`
    Not(Regex),
}

impl Segment {
    fn matches(&self, name: &str) -> bool {
        match self {
            Segment::Globstar => !name.starts_with('.'),
            Segment::Match { regex, dot } => {
                (*dot || !name.starts_with('.')) && regex.is_match(name)
            }
            Segment::Not(regex) => !name.starts_with('.') && !regex.is_match(name),
        }
    }
}

/// A compiled glob. Matches `/`-separated paths relative to the glob root.
#[derive(Debug, Clone)]
pub struct Glob {
    alternatives: Vec<Vec<Segment>>,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let err = |reason: &str| GlobError {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        if pattern.is_empty() {
            return Err(err("empty pattern"));
        }
        if pattern.starts_with('/') {
            return Err(err("patterns are relative to the glob root"));
        }

        let alternatives = expand_braces(pattern)
            .map_err(|reason| err(&reason))?
            .iter()
            .map(|expanded| {
                expanded
                    .split('/')
                    .map(compile_segment)
                    .collect::<Result<Vec<_>, String>>()
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(|reason| err(&reason))?;

        Ok(Self { alternatives })
    }

    /// Whether `path` (relative, `/`-separated) matches.
    pub fn is_match(&self, path: &str) -> bool {
        let names: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.alternatives
            .iter()
            .any(|segments| match_segments(segments, &names))
    }
}

fn match_segments(segments: &[Segment], names: &[&str]) -> bool {
    match segments.split_first() {
        None => names.is_empty(),
        Some((Segment::Globstar, rest)) => {
            // Zero segments, or consume one and stay on the globstar.
            match_segments(rest, names)
                || names
                    .split_first()
                    .is_some_and(|(name, tail)| {
                        Segment::Globstar.matches(name) && match_segments(segments, tail)
                    })
        }
        Some((segment, rest)) => names
            .split_first()
            .is_some_and(|(name, tail)| segment.matches(name) && match_segments(rest, tail)),
    }
}

fn compile_segment(segment: &str) -> Result<Segment, String> {
    if segment == "**" {
        return Ok(Segment::Globstar);
    }
    if let Some(inner) = segment.strip_prefix("!(").and_then(|s| s.strip_suffix(')')) {
        let alternatives: Vec<String> = inner
            .split('|')
            .map(segment_regex_body)
            .collect::<Result<_, _>>()?;
        let regex =
            Regex::new(&format!("^(?:{})$", alternatives.join("|"))).map_err(|e| e.to_string())?;
        return Ok(Segment::Not(regex));
    }
    let body = segment_regex_body(segment)?;
    let regex = Regex::new(&format!("^{body}$")).map_err(|e| e.to_string())?;
    Ok(Segment::Match {
        regex,
        dot: segment.starts_with('.'),
    })
}

fn segment_regex_body(segment: &str) -> Result<String, String> {
    if segment.contains("**") {
        return Err("`**` must be a whole path segment".to_string());
    }
    let mut out = String::new();
    for c in segment.chars() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '(' | ')' | '|' | '!' => return Err(format!("unsupported `{c}` outside `!(…)`")),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    Ok(out)
}

/// Expand `{a,b}` alternatives, innermost groups included.
///
/// `*.{js,css}` → `["*.js", "*.css"]`. A pattern without braces expands to
/// itself.
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, String> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err("unbalanced `}`".to_string());
        }
        return Ok(vec![pattern.to_string()]);
    };

    // Find the matching close brace and top-level commas inside it.
    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(i),
            _ => {}
        }
    }
    let close = close.ok_or_else(|| "unbalanced `{`".to_string())?;

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(&commas);
    bounds.push(close);

    let mut expanded = Vec::new();
    for pair in bounds.windows(2) {
        let option = &pattern[pair[0] + 1..pair[1]];
        expanded.extend(expand_braces(&format!("{prefix}{option}{suffix}"))?);
    }
    Ok(expanded)
}
