//! Filter chains and the shared boolean fold.
//!
//! A report filter is an ordered chain of conditions. Each condition
//! carries the connector (AND/OR) that joins it to the **next** condition,
//! and the chain reduces left-to-right: the running result combines with
//! each condition in turn, using the connector stored on the condition
//! immediately before it. There is no precedence; `a OR b AND c` means
//! `(a OR b) AND c`.
//!
//! The same chain is evaluated in two places: compiled into the WHERE
//! clause of the backing query, or matched in-memory against materialized
//! rows. Both paths go through the one generic [`fold_chain`], so their
//! semantics cannot drift apart.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::record::ReportRow;
use crate::value::FieldValue;

/// Boolean operator joining a condition to the next one in the chain.
///
/// Fail-safe: only the literal string `"OR"` parses as OR; every other
/// value, including lowercase `"or"` and garbage, is AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connector {
    /// Both sides must hold.
    #[default]
    And,
    /// Either side may hold.
    Or,
}

impl Connector {
    /// The SQL keyword for this connector.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Combines two boolean results with this connector.
    #[must_use]
    pub const fn apply(self, lhs: bool, rhs: bool) -> bool {
        match self {
            Self::And => lhs && rhs,
            Self::Or => lhs || rhs,
        }
    }
}

impl Serialize for Connector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.keyword())
    }
}

impl<'de> Deserialize<'de> for Connector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == "OR" { Self::Or } else { Self::And })
    }
}

/// The comparison operators a condition may use.
///
/// Parsing is exact and case-sensitive; anything else is unrecognized and
/// handled per the chain rules (no compiled clause, `false` in-memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// String-coerced equality.
    Eq,
    /// String-coerced inequality.
    Ne,
    /// Lexicographic greater-than on coerced strings.
    Gt,
    /// Lexicographic less-than on coerced strings.
    Lt,
    /// Lexicographic greater-or-equal on coerced strings.
    Ge,
    /// Lexicographic less-or-equal on coerced strings.
    Le,
    /// Substring match (case-insensitive in-memory, `%v%` compiled).
    Like,
    /// Negated substring match.
    NotLike,
    /// Field absent, null, or empty string.
    IsNull,
    /// Field present and non-empty.
    IsNotNull,
}

impl Operator {
    /// Parses the wire operator string. Exact match only.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            "LIKE" => Some(Self::Like),
            "NOT LIKE" => Some(Self::NotLike),
            "IS NULL" => Some(Self::IsNull),
            "IS NOT NULL" => Some(Self::IsNotNull),
            _ => None,
        }
    }
}

/// One condition in a filter chain.
///
/// This is the literal shape a calling API layer deserializes from a
/// client-submitted request body; the serde aliases keep the original
/// upper-camel wire casing working alongside the snake_case one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field name the condition tests.
    #[serde(alias = "Field")]
    pub field: String,

    /// Raw operator string; see [`Operator::parse`].
    #[serde(alias = "Operator")]
    pub operator: String,

    /// Comparison value.
    #[serde(alias = "Value", default)]
    pub value: FieldValue,

    /// Connector joining this condition to the NEXT one in the chain.
    /// Never consulted on the last condition.
    #[serde(alias = "LogicOperator", default)]
    pub connector: Connector,
}

impl FilterCondition {
    /// Builds a condition with the default AND connector.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            connector: Connector::And,
        }
    }

    /// Sets the trailing connector to OR.
    #[must_use]
    pub fn or_next(mut self) -> Self {
        self.connector = Connector::Or;
        self
    }
}

/// Left fold over a condition chain, generic in the leaf evaluator.
///
/// Each condition is evaluated by `leaf`; a `None` leaf contributes
/// nothing but still leaves its connector behind for the condition after
/// it. Contributing leaves combine left-to-right, taking the connector
/// from the condition at the immediately preceding chain position.
/// Returns `None` when no condition contributed.
pub fn fold_chain<T>(
    conditions: &[FilterCondition],
    mut leaf: impl FnMut(&FilterCondition) -> Option<T>,
    mut combine: impl FnMut(T, Connector, T) -> T,
) -> Option<T> {
    let mut acc: Option<T> = None;
    for (i, cond) in conditions.iter().enumerate() {
        let Some(value) = leaf(cond) else { continue };
        acc = Some(match acc {
            None => value,
            // acc is Some, so some earlier condition contributed and i >= 1.
            Some(prev) => combine(prev, conditions[i - 1].connector, value),
        });
    }
    acc
}

/// Evaluates one condition against a (possibly absent) field value.
///
/// `IS NULL` / `IS NOT NULL` see absence directly; every other operator
/// treats an absent field as a non-match, then compares on the coerced
/// string forms. Ordering operators are lexicographic, not numeric, even
/// for values that look numeric.
#[must_use]
pub fn matches_condition(cond: &FilterCondition, actual: Option<&FieldValue>) -> bool {
    match Operator::parse(&cond.operator) {
        Some(Operator::IsNull) => actual.map_or(true, FieldValue::is_absent),
        Some(Operator::IsNotNull) => actual.is_some_and(|v| !v.is_absent()),
        Some(op) => {
            let Some(actual) = actual else {
                return false;
            };
            let lhs = actual.coerce_text();
            let rhs = cond.value.coerce_text();
            match op {
                Operator::Eq => lhs == rhs,
                Operator::Ne => lhs != rhs,
                Operator::Gt => lhs > rhs,
                Operator::Lt => lhs < rhs,
                Operator::Ge => lhs >= rhs,
                Operator::Le => lhs <= rhs,
                Operator::Like => lhs.to_lowercase().contains(&rhs.to_lowercase()),
                Operator::NotLike => !lhs.to_lowercase().contains(&rhs.to_lowercase()),
                Operator::IsNull | Operator::IsNotNull => unreachable!("handled above"),
            }
        }
        // Unrecognized operators fail closed.
        None => false,
    }
}

/// In-memory chain evaluation against a report row.
///
/// An empty chain passes every row.
#[must_use]
pub fn matches_chain(conditions: &[FilterCondition], row: &ReportRow) -> bool {
    fold_chain(
        conditions,
        |cond| Some(matches_condition(cond, row.get(&cond.field))),
        |lhs, op, rhs| op.apply(lhs, rhs),
    )
    .unwrap_or(true)
}

/// A compiled boolean clause plus its bound parameters, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryClause {
    /// SQL text with `?` placeholders, parenthesized per fold step.
    pub text: String,
    /// Parameters bound left to right.
    pub params: Vec<FieldValue>,
}

/// Compiles a chain into a single boolean clause for the backing query.
///
/// `resolve_column` maps a condition's field name to its column
/// reference; conditions whose field does not resolve, or whose operator
/// is unrecognized, compile to no clause. Combining parenthesizes the
/// running clause at every step, so the compiled text reduces left to
/// right exactly like the in-memory fold regardless of SQL operator
/// precedence. Returns `None` when nothing compiled.
pub fn compile_chain(
    conditions: &[FilterCondition],
    resolve_column: impl Fn(&str) -> Option<&'static str>,
) -> Option<QueryClause> {
    fold_chain(
        conditions,
        |cond| compile_condition(cond, resolve_column(&cond.field)?),
        |lhs, op, rhs| QueryClause {
            text: format!("({} {} {})", lhs.text, op.keyword(), rhs.text),
            params: [lhs.params, rhs.params].concat(),
        },
    )
}

fn compile_condition(cond: &FilterCondition, column: &str) -> Option<QueryClause> {
    let (text, params) = match Operator::parse(&cond.operator)? {
        Operator::Eq => (format!("{column} = ?"), vec![cond.value.clone()]),
        Operator::Ne => (format!("{column} != ?"), vec![cond.value.clone()]),
        Operator::Gt => (format!("{column} > ?"), vec![cond.value.clone()]),
        Operator::Lt => (format!("{column} < ?"), vec![cond.value.clone()]),
        Operator::Ge => (format!("{column} >= ?"), vec![cond.value.clone()]),
        Operator::Le => (format!("{column} <= ?"), vec![cond.value.clone()]),
        Operator::Like => (
            format!("{column} LIKE ?"),
            vec![FieldValue::Text(format!("%{}%", cond.value.coerce_text()))],
        ),
        Operator::NotLike => (
            format!("{column} NOT LIKE ?"),
            vec![FieldValue::Text(format!("%{}%", cond.value.coerce_text()))],
        ),
        Operator::IsNull => (format!("{column} IS NULL"), vec![]),
        Operator::IsNotNull => (format!("{column} IS NOT NULL"), vec![]),
    };
    Some(QueryClause { text, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> ReportRow {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), FieldValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_connector_parsing_fail_safe() {
        let or: Connector = serde_json::from_str("\"OR\"").unwrap();
        assert_eq!(or, Connector::Or);
        for raw in ["\"AND\"", "\"or\"", "\"XOR\"", "\"\""] {
            let c: Connector = serde_json::from_str(raw).unwrap();
            assert_eq!(c, Connector::And, "{raw} should parse as AND");
        }
    }

    #[test]
    fn test_wire_casing_aliases() {
        let json = r#"{"Field":"Name","Operator":"=","Value":"x","LogicOperator":"OR"}"#;
        let cond: FilterCondition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.field, "Name");
        assert_eq!(cond.connector, Connector::Or);

        // Connector and value are optional on the wire.
        let json = r#"{"field":"Name","operator":"IS NULL"}"#;
        let cond: FilterCondition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.connector, Connector::And);
        assert!(cond.value.is_null());
    }

    #[test]
    fn test_operator_parse_exact() {
        assert_eq!(Operator::parse("NOT LIKE"), Some(Operator::NotLike));
        assert_eq!(Operator::parse("not like"), None);
        assert_eq!(Operator::parse("=="), None);
        assert_eq!(Operator::parse(" ="), None);
    }

    #[test]
    fn test_matches_condition_operators() {
        let v = FieldValue::from("Laptop");
        assert!(matches_condition(&FilterCondition::new("f", "=", "Laptop"), Some(&v)));
        assert!(matches_condition(&FilterCondition::new("f", "!=", "Desk"), Some(&v)));
        assert!(matches_condition(&FilterCondition::new("f", "LIKE", "lap"), Some(&v)));
        assert!(matches_condition(&FilterCondition::new("f", "NOT LIKE", "desk"), Some(&v)));
        assert!(!matches_condition(&FilterCondition::new("f", "LIKE", "desk"), Some(&v)));
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        // "10" sorts before "9" as a string; the quirk is intentional.
        let v = FieldValue::from("10");
        assert!(matches_condition(&FilterCondition::new("f", "<", "9"), Some(&v)));
        assert!(!matches_condition(&FilterCondition::new("f", ">", "9"), Some(&v)));

        let v = FieldValue::Int(10);
        assert!(matches_condition(&FilterCondition::new("f", "<", FieldValue::Int(9)), Some(&v)));
    }

    #[test]
    fn test_is_null_semantics() {
        let cond = FilterCondition::new("f", "IS NULL", FieldValue::Null);
        assert!(matches_condition(&cond, None));
        assert!(matches_condition(&cond, Some(&FieldValue::Null)));
        assert!(matches_condition(&cond, Some(&FieldValue::Text(String::new()))));
        assert!(!matches_condition(&cond, Some(&FieldValue::from("x"))));

        let cond = FilterCondition::new("f", "IS NOT NULL", FieldValue::Null);
        assert!(!matches_condition(&cond, None));
        assert!(!matches_condition(&cond, Some(&FieldValue::Text(String::new()))));
        assert!(matches_condition(&cond, Some(&FieldValue::from("x"))));
    }

    #[test]
    fn test_unrecognized_operator_fails_closed() {
        let v = FieldValue::from("x");
        assert!(!matches_condition(&FilterCondition::new("f", "~", "x"), Some(&v)));
    }

    #[test]
    fn test_absent_field_fails_comparisons() {
        assert!(!matches_condition(&FilterCondition::new("f", "=", ""), None));
        assert!(!matches_condition(&FilterCondition::new("f", "NOT LIKE", "zzz"), None));
    }

    #[test]
    fn test_chain_left_fold_or_then_and() {
        // a OR b AND c folds as (a OR b) AND c.
        let chain = vec![
            FilterCondition::new("color", "=", "red").or_next(),
            FilterCondition::new("size", "=", "large"),
            FilterCondition::new("site", "=", "HQ"),
        ];

        // a=false, b=true, c=true -> (false OR true) AND true = true
        assert!(matches_chain(
            &chain,
            &row(&[("color", "blue"), ("size", "large"), ("site", "HQ")])
        ));
        // a=true, b=false, c=false -> (true OR false) AND false = false
        assert!(!matches_chain(
            &chain,
            &row(&[("color", "red"), ("size", "small"), ("site", "remote")])
        ));
        // all true
        assert!(matches_chain(
            &chain,
            &row(&[("color", "red"), ("size", "large"), ("site", "HQ")])
        ));
        // all false
        assert!(!matches_chain(
            &chain,
            &row(&[("color", "blue"), ("size", "small"), ("site", "remote")])
        ));
    }

    #[test]
    fn test_last_connector_never_consulted() {
        let chain = vec![
            FilterCondition::new("a", "=", "1"),
            FilterCondition::new("b", "=", "2").or_next(),
        ];
        // Trailing OR on the last condition must not change AND folding.
        assert!(!matches_chain(&chain, &row(&[("a", "1"), ("b", "x")])));
    }

    #[test]
    fn test_empty_chain_passes() {
        assert!(matches_chain(&[], &row(&[("a", "1")])));
    }

    #[test]
    fn test_fold_skips_leaf_but_keeps_connector() {
        // The middle condition contributes nothing; the condition after it
        // combines using the middle condition's connector (OR), not the
        // first condition's AND.
        let chain = vec![
            FilterCondition::new("a", "=", "1"),
            FilterCondition::new("skip", "=", "x").or_next(),
            FilterCondition::new("b", "=", "2"),
        ];
        let folded = fold_chain(
            &chain,
            |cond| {
                if cond.field == "skip" {
                    None
                } else {
                    Some(cond.field == "b")
                }
            },
            |lhs, op, rhs| op.apply(lhs, rhs),
        );
        // false OR true = true; with the AND from position 0 it would be false.
        assert_eq!(folded, Some(true));
    }

    #[test]
    fn test_compile_chain_parenthesizes_left_fold() {
        let chain = vec![
            FilterCondition::new("name", "=", "red").or_next(),
            FilterCondition::new("name", "=", "large"),
            FilterCondition::new("name", "LIKE", "HQ"),
        ];
        let clause = compile_chain(&chain, |_| Some("a.name")).unwrap();
        assert_eq!(
            clause.text,
            "((a.name = ? OR a.name = ?) AND a.name LIKE ?)"
        );
        assert_eq!(
            clause.params,
            vec![
                FieldValue::from("red"),
                FieldValue::from("large"),
                FieldValue::from("%HQ%"),
            ]
        );
    }

    #[test]
    fn test_compile_single_condition() {
        let chain = vec![FilterCondition::new("name", "IS NULL", FieldValue::Null)];
        let clause = compile_chain(&chain, |_| Some("a.notes")).unwrap();
        assert_eq!(clause.text, "a.notes IS NULL");
        assert!(clause.params.is_empty());
    }

    #[test]
    fn test_compile_drops_unresolved_and_unrecognized() {
        let chain = vec![
            FilterCondition::new("nope", "=", "1"),
            FilterCondition::new("name", "~", "2"),
        ];
        assert_eq!(
            compile_chain(&chain, |f| (f == "name").then_some("a.name")),
            None
        );

        let chain = vec![
            FilterCondition::new("nope", "=", "1").or_next(),
            FilterCondition::new("name", "=", "2"),
        ];
        let clause = compile_chain(&chain, |f| (f == "name").then_some("a.name")).unwrap();
        assert_eq!(clause.text, "a.name = ?");
    }

    #[test]
    fn test_compile_empty_chain() {
        assert_eq!(compile_chain(&[], |_| Some("a.name")), None);
    }
}
