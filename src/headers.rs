//! Ordered, duplicate-permitting header collection.
//!
//! Lookup is ASCII case-insensitive; the original case is kept for
//! serialization. Repeated names stay separate entries in arrival order.

use crate::error::{ParserError, Result};

/// One header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    fields: Vec<HeaderField>,
}

/// RFC 7230 token characters.
fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            matches!(
                b,
                b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                    | b'_' | b'`' | b'|' | b'~' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z'
            )
        })
}

/// Validates a header name for outbound use. A leading `:` is allowed so
/// HTTP/2 pseudo-headers go through the same collection.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let token = name.strip_prefix(':').unwrap_or(name);
    if !is_token(token) {
        return Err(ParserError::invalid_argument(format!("invalid header name {name:?}")));
    }
    Ok(())
}

pub(crate) fn validate_value(value: &str) -> Result<()> {
    if value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(ParserError::invalid_argument("header value contains CR, LF or NUL"));
    }
    Ok(())
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeaderField> {
        self.fields.iter()
    }

    pub fn as_slice(&self) -> &[HeaderField] {
        &self.fields
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.is_named(name))
            .map(|f| f.value.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.is_named(name))
            .map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is_named(name))
    }

    /// Append a field, validating name and value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let field = HeaderField::new(name, value);
        validate_name(&field.name)?;
        validate_value(&field.value)?;
        self.fields.push(field);
        Ok(())
    }

    /// Append without validation; used for fields that came off the wire.
    pub(crate) fn push_unchecked(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    /// Replace every `name` entry by a single one, keeping the position of
    /// the first occurrence.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let field = HeaderField::new(name, value);
        validate_name(&field.name)?;
        validate_value(&field.value)?;
        match self.fields.iter().position(|f| f.is_named(&field.name)) {
            Some(pos) => {
                let name = field.name.clone();
                self.fields[pos] = field;
                let mut idx = 0;
                self.fields.retain(|f| {
                    let keep = idx <= pos || !f.is_named(&name);
                    idx += 1;
                    keep
                });
            }
            None => self.fields.push(field),
        }
        Ok(())
    }

    /// Remove every `name` entry, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| !f.is_named(name));
        before - self.fields.len()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Whether a comma-separated header contains `token` (case-insensitive).
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }
}

impl<'a> IntoIterator for &'a HttpHeaders {
    type Item = &'a HeaderField;
    type IntoIter = std::slice::Iter<'a, HeaderField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<HeaderField> for HttpHeaders {
    fn from_iter<I: IntoIterator<Item = HeaderField>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
