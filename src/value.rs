//! Scalar values carried by report rows and filter conditions.
//!
//! Report rows mix typed columns with free-form custom field values, and
//! filter conditions arrive from clients as raw JSON scalars. `FieldValue`
//! covers both: it deserializes untagged, so `"red"`, `42`, `1.5`, `true`
//! and `null` all map directly onto the matching variant.

use serde::{Deserialize, Serialize};

/// A dynamically-typed scalar field value.
///
/// # Examples
///
/// ```
/// use custodia::FieldValue;
///
/// let v: FieldValue = serde_json::from_str("42").unwrap();
/// assert!(v.is_int());
/// assert_eq!(v.coerce_text(), "42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent / SQL NULL.
    #[default]
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text value.
    Text(String),
}

impl FieldValue {
    /// Returns true for [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for [`FieldValue::Bool`].
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns true for [`FieldValue::Int`].
    #[must_use]
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Returns true for [`FieldValue::Float`].
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Returns true for [`FieldValue::Text`].
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Borrows the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces the value to its canonical string form.
    ///
    /// Every comparison operator in the filter chain works on this form,
    /// so `Int(5)` and `Text("5")` compare equal under `=`. Null coerces
    /// to the empty string, which the `IS NULL` operator also recognizes
    /// as absent.
    #[must_use]
    pub fn coerce_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Whether the value counts as absent under `IS NULL` semantics:
    /// null or an empty string.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_deserialization() {
        let v: FieldValue = serde_json::from_str("\"red\"").unwrap();
        assert_eq!(v, FieldValue::Text("red".to_string()));

        let v: FieldValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, FieldValue::Int(42));

        let v: FieldValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(v, FieldValue::Float(1.5));

        let v: FieldValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, FieldValue::Bool(true));

        let v: FieldValue = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(FieldValue::Int(5).coerce_text(), "5");
        assert_eq!(FieldValue::Float(5.5).coerce_text(), "5.5");
        // Whole floats print without a trailing fraction, matching how
        // clients that send every number as a double expect `=` to behave.
        assert_eq!(FieldValue::Float(5.0).coerce_text(), "5");
        assert_eq!(FieldValue::Bool(false).coerce_text(), "false");
        assert_eq!(FieldValue::Null.coerce_text(), "");
        assert_eq!(FieldValue::Text("x".into()).coerce_text(), "x");
    }

    #[test]
    fn test_is_absent() {
        assert!(FieldValue::Null.is_absent());
        assert!(FieldValue::Text(String::new()).is_absent());
        assert!(!FieldValue::Text("a".into()).is_absent());
        assert!(!FieldValue::Int(0).is_absent());
    }

    #[test]
    fn test_from_option() {
        let v: FieldValue = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: FieldValue = Some("x").into();
        assert_eq!(v.as_text(), Some("x"));
    }
}
