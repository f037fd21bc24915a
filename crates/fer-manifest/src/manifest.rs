//! Parser and renderer for `fer.ret`, the per-project manifest (spec.md
//! §6): a simplified dotted-section key-value grammar, parsed with `nom`
//! (repurposed here for this bespoke grammar rather than a full language).

use std::collections::BTreeMap;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{char, line_ending, multispace0, none_of, space0},
    combinator::{map, opt, recognize, value},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Raw(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Raw(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Raw(s) => write!(f, "{s}"),
        }
    }
}

/// A parsed manifest: section name -> (key -> value), in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub sections: Vec<(String, Vec<(String, Value)>)>,
}

pub const DEFAULT_SECTION: &str = "default";

impl Manifest {
    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.iter().find(|(name, _)| name == section)?.1.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn project_name(&self) -> Option<&str> {
        self.get(DEFAULT_SECTION, "name").and_then(Value::as_str)
    }

    pub fn remote_enabled(&self) -> bool {
        self.get("remote", "enabled").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn remote_share(&self) -> bool {
        self.get("remote", "share").and_then(Value::as_bool).unwrap_or(true)
    }

    pub fn cache_path(&self) -> &str {
        self.get("cache", "path").and_then(Value::as_str).unwrap_or(".fer-cache")
    }

    pub fn dependencies(&self) -> BTreeMap<String, String> {
        self.sections
            .iter()
            .find(|(name, _)| name == "dependencies")
            .map(|(_, kvs)| kvs.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Malformed(String),
}

/// Parses a complete `fer.ret` document.
pub fn parse(input: &str) -> Result<Manifest, ManifestError> {
    match parse_document(input) {
        Ok((remainder, manifest)) if remainder.trim().is_empty() => Ok(manifest),
        Ok((remainder, _)) => Err(ManifestError::Malformed(format!("unparsed trailing input: {remainder:?}"))),
        Err(err) => Err(ManifestError::Malformed(err.to_string())),
    }
}

/// Renders a manifest back to `fer.ret` text. `parse(render(parse(x))) ==
/// parse(x)` for well-formed `x` (spec.md §8 round-trip property) because
/// rendering always re-quotes string values and reproduces boolean/numeric
/// values in their canonical form, even if the original used a bare token.
pub fn render(manifest: &Manifest) -> String {
    let mut out = String::new();
    for (section, entries) in &manifest.sections {
        if section != DEFAULT_SECTION || !entries.is_empty() {
            out.push_str(&format!("[{section}]\n"));
        }
        for (key, value) in entries {
            out.push_str(&format!("{key} = {value}\n"));
        }
        out.push('\n');
    }
    out
}

fn parse_document(input: &str) -> IResult<&str, Manifest> {
    map(many0(alt((map(parse_section, Some), map(blank_or_comment_line, |_| None)))), |sections| {
        let mut manifest = Manifest::default();
        for section in sections.into_iter().flatten() {
            manifest.sections.push(section);
        }
        merge_duplicate_sections(&mut manifest);
        manifest
    })(input)
}

fn merge_duplicate_sections(manifest: &mut Manifest) {
    let mut merged: Vec<(String, Vec<(String, Value)>)> = Vec::new();
    for (name, entries) in manifest.sections.drain(..) {
        if let Some((_, existing)) = merged.iter_mut().find(|(n, _)| n == &name) {
            existing.extend(entries);
        } else {
            merged.push((name, entries));
        }
    }
    manifest.sections = merged;
}

fn blank_or_comment_line(input: &str) -> IResult<&str, ()> {
    value((), tuple((space0, opt(comment), line_ending)))(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), is_not("\r\n"))(input)
}

fn parse_section(input: &str) -> IResult<&str, (String, Vec<(String, Value)>)> {
    let (input, header) = opt(section_header)(input)?;
    let (input, entries) = many0(alt((map(key_value_line, Some), map(blank_or_comment_line, |_| None))))(input)?;
    let name = header.unwrap_or(DEFAULT_SECTION).to_string();
    Ok((input, (name, entries.into_iter().flatten().collect())))
}

fn section_header(input: &str) -> IResult<&str, &str> {
    terminated(delimited(char('['), take_while1(|c: char| c != ']'), char(']')), tuple((space0, opt(line_ending))))(input)
}

fn key_value_line(input: &str) -> IResult<&str, (String, Value)> {
    let (input, _) = multispace0(input)?;
    let (input, key) = take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '/' || c == '.')(input)?;
    let (input, _) = delimited(space0, char('='), space0)(input)?;
    let (input, value) = parse_value(input)?;
    let (input, _) = tuple((space0, opt(comment), opt(line_ending)))(input)?;
    Ok((input, (key.to_string(), value)))
}

fn parse_value(input: &str) -> IResult<&str, Value> {
    alt((
        map(quoted_string, Value::Str),
        value(Value::Bool(true), tag("true")),
        value(Value::Bool(false), tag("false")),
        map(double, |f| if f.fract() == 0.0 && f.abs() < i64::MAX as f64 { Value::Int(f as i64) } else { Value::Float(f) }),
        map(raw_token, |s: &str| Value::Raw(s.to_string())),
    ))(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(opt(escaped_transform(none_of("\"\\"), '\\', alt((value('"', char('"')), value('\\', char('\\')))))), |s| s.unwrap_or_default()),
        char('"'),
    )(input)
}

fn raw_token(input: &str) -> IResult<&str, &str> {
    recognize(take_while1(|c: char| !c.is_whitespace() && c != '#'))(input)
}

fn separated_identifiers(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list0(char('.'), take_while1(|c: char| c.is_alphanumeric() || c == '_'))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_sections_and_default_keys() {
        let text = "name = \"demo\"\n\n[remote]\nenabled = true\nshare = false\n\n[dependencies]\ngithub.com/acme/widgets = \"v1.2.0\"\n";
        let manifest = parse(text).unwrap();
        assert_eq!(manifest.project_name(), Some("demo"));
        assert!(manifest.remote_enabled());
        assert!(!manifest.remote_share());
        assert_eq!(manifest.dependencies().get("github.com/acme/widgets"), Some(&"v1.2.0".to_string()));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let text = "# a comment\nname = \"x\"\n\n# another\n[remote]\n# inline\nenabled = true\n";
        let manifest = parse(text).unwrap();
        assert_eq!(manifest.project_name(), Some("x"));
        assert!(manifest.remote_enabled());
    }

    #[test]
    fn round_trip_through_render() {
        let text = "name = \"demo\"\n\n[remote]\nenabled = true\n";
        let first = parse(text).unwrap();
        let rendered = render(&first);
        let second = parse(&rendered).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_identifier_helper_handles_dotted_keys() {
        let (_, parts) = separated_identifiers("a.b.c").unwrap();
        assert_eq!(parts, vec!["a", "b", "c"]);
    }

    #[rstest::rstest]
    #[case("\"demo\"", Value::Str("demo".to_string()))]
    #[case("true", Value::Bool(true))]
    #[case("false", Value::Bool(false))]
    #[case("42", Value::Int(42))]
    #[case("1.5", Value::Float(1.5))]
    #[case("v1.2.0", Value::Raw("v1.2.0".to_string()))]
    fn value_alternation_picks_the_first_matching_kind(#[case] input: &str, #[case] expected: Value) {
        let (_, value) = parse_value(input).unwrap();
        assert_eq!(value, expected);
    }
}
