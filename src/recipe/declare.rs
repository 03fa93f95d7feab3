//! Parser for `declare -p` dumps: the line-oriented format bash emits to
//! describe its own variables, used as the boundary between a build recipe
//! (a PKGBUILD, sourced by a helper script) and this crate.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// One bash variable, either a scalar or an indexed array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// `declare -- name="value"`
    Scalar(String),
    /// `declare -a name=([0]="a" [1]="b")`
    Array(Vec<String>),
}

impl Value {
    /// Borrow the scalar string, or `None` for an array.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Array(_) => None,
        }
    }

    /// Borrow the array elements, or an empty slice for a scalar (a PKGBUILD
    /// field that is merely absent parses the same way as one declared
    /// empty).
    #[must_use]
    pub fn as_array(&self) -> &[String] {
        match self {
            Self::Array(items) => items,
            Self::Scalar(_) => &[],
        }
    }
}

/// Parse a full `declare -p` dump into a name→value map.
///
/// Later bindings of the same name overwrite earlier ones, matching bash's
/// own last-assignment-wins semantics for a script that may `declare` the
/// same variable more than once (e.g. a PKGBUILD `package()` override).
///
/// # Errors
/// [`Error::RecipeParseError`] if a line does not match `declare -<opts>
/// <name>=...` or an array line's bracketed index is not a valid integer.
pub fn parse(dump: &str) -> Result<HashMap<String, Value>> {
    let mut vars = HashMap::new();
    for line in dump.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (name, value) = parse_declare_line(line)?;
        vars.insert(name, value);
    }
    Ok(vars)
}

fn parse_declare_line(line: &str) -> Result<(String, Value)> {
    let rest = line
        .strip_prefix("declare -")
        .ok_or_else(|| Error::RecipeParseError(format!("expected `declare -`: {line}")))?;

    let (opts, rest) = rest
        .split_once(' ')
        .ok_or_else(|| Error::RecipeParseError(format!("missing variable name: {line}")))?;

    let (name, value_str) = rest
        .split_once('=')
        .ok_or_else(|| Error::RecipeParseError(format!("missing `=`: {line}")))?;

    if opts.contains('A') {
        return Err(Error::RecipeParseError(
            "associative arrays are not supported".to_string(),
        ));
    }

    if opts.contains('a') {
        Ok((name.to_string(), Value::Array(parse_array(value_str)?)))
    } else {
        Ok((name.to_string(), Value::Scalar(unquote(value_str))))
    }
}

fn parse_array(value_str: &str) -> Result<Vec<String>> {
    let inner = value_str
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::RecipeParseError(format!("malformed array literal: {value_str}")))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut slots: HashMap<usize, String> = HashMap::new();
    let mut next_index = 0usize;
    for term in split_array_terms(inner) {
        if let Some(rest) = term.strip_prefix('[') {
            let (idx_str, value) = rest
                .split_once(']')
                .ok_or_else(|| Error::RecipeParseError(format!("malformed array index: {term}")))?;
            let value = value.strip_prefix('=').unwrap_or(value);
            let idx: usize = idx_str
                .parse()
                .map_err(|_| Error::RecipeParseError(format!("non-integer array index: {idx_str}")))?;
            slots.insert(idx, unquote(value));
            next_index = idx + 1;
        } else {
            slots.insert(next_index, unquote(term));
            next_index += 1;
        }
    }

    let size = slots.keys().copied().max().map_or(0, |m| m + 1);
    let mut arr = vec![String::new(); size];
    for (idx, value) in slots {
        arr[idx] = value;
    }
    Ok(arr)
}

/// Split on unquoted spaces, the way bash's own array-literal output never
/// embeds a raw space inside an unquoted term.
fn split_array_terms(s: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut in_quotes: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        match in_quotes {
            Some(q) if ch == q => in_quotes = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => in_quotes = Some(ch),
            None if ch == ' ' => {
                if idx > start {
                    terms.push(&s[start..idx]);
                }
                start = idx + 1;
            }
            None => {}
        }
    }
    if start < s.len() {
        terms.push(&s[start..]);
    }
    terms
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        let first = bytes[0] as char;
        let last = bytes[bytes.len() - 1] as char;
        if (first == '"' && last == '"') || (first == '\'' && last == '\'') {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar() {
        let vars = parse(r#"declare -- pkgname="foo""#).expect("parses");
        assert_eq!(vars["pkgname"].as_scalar(), Some("foo"));
    }

    #[test]
    fn parses_indexed_array() {
        let vars = parse(r#"declare -a depends=([0]="a" [1]="b")"#).expect("parses");
        assert_eq!(vars["depends"].as_array(), ["a", "b"]);
    }

    #[test]
    fn parses_array_without_explicit_indices() {
        let vars = parse(r#"declare -a depends=("a" "b" "c")"#).expect("parses");
        assert_eq!(vars["depends"].as_array(), ["a", "b", "c"]);
    }

    #[test]
    fn parses_empty_array() {
        let vars = parse(r"declare -a depends=()").expect("parses");
        assert_eq!(vars["depends"].as_array().len(), 0);
    }

    #[test]
    fn later_binding_overwrites_earlier() {
        let dump = "declare -- pkgver=\"1.0\"\ndeclare -- pkgver=\"2.0\"\n";
        let vars = parse(dump).expect("parses");
        assert_eq!(vars["pkgver"].as_scalar(), Some("2.0"));
    }

    #[test]
    fn rejects_associative_arrays() {
        let err = parse(r#"declare -A foo=([a]="b")"#).expect_err("rejected");
        assert!(matches!(err, Error::RecipeParseError(_)));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(parse("not a declare line").is_err());
    }

    #[test]
    fn full_dump_round_trip() {
        let dump = concat!(
            "declare -- pkgname=\"example\"\n",
            "declare -- pkgver=\"1.2.3\"\n",
            "declare -- pkgrel=\"1\"\n",
            "declare -a depends=([0]=\"glibc\" [1]=\"gcc-libs\")\n",
        );
        let vars = parse(dump).expect("parses");
        assert_eq!(vars.len(), 4);
        assert_eq!(vars["pkgname"].as_scalar(), Some("example"));
        assert_eq!(vars["depends"].as_array(), ["glibc", "gcc-libs"]);
    }
}
