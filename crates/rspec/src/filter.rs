//! Filter predicate algebra used by every `get_*` query of the RSpec layer.
//!
//! A filter is a set of clauses keyed by field name. The first character of
//! a key may select an operator:
//!
//! | prefix | meaning |
//! |--------|---------|
//! | `=` (default) | equality, or membership when either side is a list; `*` in a string pattern is a wildcard |
//! | `~` | negation of `=` |
//! | `<` | the value is a strict dot-ancestor of the field (`x` < `x.y`) |
//! | `[` | the value is an ancestor of, or equal to, the field |
//! | `>` | the value is a strict dot-descendant of the field |
//! | `]` | the value is a descendant of, or equal to, the field |
//! | `&` | non-empty intersection (bitwise AND for numbers) |
//! | `\|` | non-empty union (bitwise OR for numbers) |
//! | `{` | the field contains the value |
//!
//! Numeric operands of the ordering operators read as `value OP field`, the
//! same direction as the hierarchical reading. All clauses must hold.

use std::collections::BTreeMap;

use crate::model::{Lease, Link, Node};

/// A field value as seen by the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(i64),
    List(Vec<String>),
}

impl FieldValue {
    fn texts(&self) -> Vec<String> {
        match self {
            FieldValue::Text(s) => vec![s.clone()],
            FieldValue::Number(n) => vec![n.to_string()],
            FieldValue::List(items) => items.clone(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::List(value.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Ancestor,
    AncestorOrEqual,
    Descendant,
    DescendantOrEqual,
    BitAnd,
    BitOr,
    Contains,
}

impl Operator {
    /// Split an operator prefix off a filter key.
    pub fn split(key: &str) -> (Operator, &str) {
        let op = match key.chars().next() {
            Some('=') => Operator::Equal,
            Some('~') => Operator::NotEqual,
            Some('<') => Operator::Ancestor,
            Some('[') => Operator::AncestorOrEqual,
            Some('>') => Operator::Descendant,
            Some(']') => Operator::DescendantOrEqual,
            Some('&') => Operator::BitAnd,
            Some('|') => Operator::BitOr,
            Some('{') => Operator::Contains,
            _ => return (Operator::Equal, key),
        };
        (op, &key[1..])
    }
}

/// Anything that exposes named fields to a [`Filter`].
pub trait Filterable {
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl Filterable for BTreeMap<String, FieldValue> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub op: Operator,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clause; `key` may carry an operator prefix.
    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        let (op, field) = Operator::split(key);
        self.clauses.push(Clause {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &impl Filterable) -> bool {
        self.clauses.iter().all(|clause| match record.field(&clause.field) {
            Some(field) => evaluate(clause.op, &field, &clause.value),
            None => clause.op == Operator::NotEqual,
        })
    }
}

/// `ancestor` is a strict dot-prefix of `name`.
fn is_ancestor(ancestor: &str, name: &str) -> bool {
    name.len() > ancestor.len()
        && name.starts_with(ancestor)
        && name.as_bytes()[ancestor.len()] == b'.'
}

fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn any_pair(field: &FieldValue, value: &FieldValue, pred: impl Fn(&str, &str) -> bool) -> bool {
    let fields = field.texts();
    let values = value.texts();
    fields
        .iter()
        .any(|f| values.iter().any(|v| pred(f.as_str(), v.as_str())))
}

fn evaluate(op: Operator, field: &FieldValue, value: &FieldValue) -> bool {
    if let (FieldValue::Number(f), FieldValue::Number(v)) = (field, value) {
        let (f, v) = (*f, *v);
        return match op {
            Operator::Equal => f == v,
            Operator::NotEqual => f != v,
            Operator::Ancestor => v < f,
            Operator::AncestorOrEqual => v <= f,
            Operator::Descendant => v > f,
            Operator::DescendantOrEqual => v >= f,
            Operator::BitAnd => f & v != 0,
            Operator::BitOr => f | v != 0,
            Operator::Contains => f.to_string().contains(&v.to_string()),
        };
    }

    match op {
        Operator::Equal => any_pair(field, value, |f, v| glob_match(v, f)),
        Operator::NotEqual => !any_pair(field, value, |f, v| glob_match(v, f)),
        Operator::Ancestor => any_pair(field, value, |f, v| is_ancestor(v, f)),
        Operator::AncestorOrEqual => any_pair(field, value, |f, v| f == v || is_ancestor(v, f)),
        Operator::Descendant => any_pair(field, value, |f, v| is_ancestor(f, v)),
        Operator::DescendantOrEqual => any_pair(field, value, |f, v| f == v || is_ancestor(f, v)),
        Operator::BitAnd => any_pair(field, value, |f, v| f == v),
        Operator::BitOr => !field.texts().is_empty() || !value.texts().is_empty(),
        Operator::Contains => match field {
            FieldValue::List(items) => value.texts().iter().any(|v| items.contains(v)),
            _ => any_pair(field, value, |f, v| f.contains(v)),
        },
    }
}

// ──────────────────────────────────────────────
// Model projections
// ──────────────────────────────────────────────

fn text(value: &Option<String>) -> Option<FieldValue> {
    value.clone().map(FieldValue::Text)
}

fn flag(value: Option<bool>) -> Option<FieldValue> {
    value.map(|b| FieldValue::Text(b.to_string()))
}

impl Filterable for Node {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "component_id" => Some(FieldValue::Text(self.component_id.clone())),
            "component_manager_id" => text(&self.component_manager_id),
            "component_name" => text(&self.component_name),
            "authority_id" => text(&self.authority_id),
            "client_id" => text(&self.client_id),
            "sliver_id" => text(&self.sliver_id),
            "hostname" => text(&self.hostname),
            "site_id" => text(&self.site_id),
            "boot_state" => text(&self.boot_state),
            "exclusive" => flag(self.exclusive),
            "available" => flag(self.available),
            "granularity" => self.granularity.map(|g| FieldValue::Number(g as i64)),
            "hardware_types" => Some(FieldValue::List(
                self.hardware_types.iter().map(|h| h.name.clone()).collect(),
            )),
            "sliver_types" => Some(FieldValue::List(
                self.slivers
                    .iter()
                    .filter_map(|s| s.sliver_type.clone())
                    .collect(),
            )),
            _ => self
                .tags
                .iter()
                .find(|t| t.name == name)
                .map(|t| FieldValue::Text(t.value.clone())),
        }
    }
}

impl Filterable for Lease {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "lease_id" => text(&self.lease_id),
            "component_id" => Some(FieldValue::Text(self.component_id.clone())),
            "slice_id" => Some(FieldValue::Text(self.slice_id.clone())),
            "start_time" => Some(FieldValue::Number(self.start_time as i64)),
            "duration" => Some(FieldValue::Number(self.duration as i64)),
            _ => None,
        }
    }
}

impl Filterable for Link {
    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "component_id" => text(&self.component_id),
            "component_name" => text(&self.component_name),
            "client_id" => text(&self.client_id),
            "link_type" => text(&self.link_type),
            "component_managers" => Some(FieldValue::List(self.component_managers.clone())),
            "interface_refs" => Some(FieldValue::List(self.interface_refs.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, FieldValue)]) -> BTreeMap<String, FieldValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn hierarchical_ancestor_matches_and_negation_rejects() {
        let rec = record(&[("a", "x.y".into())]);
        assert!(Filter::new().with("<a", "x").matches(&rec));
        assert!(!Filter::new().with("~a", "x.y").matches(&rec));
    }

    #[test]
    fn ancestor_is_strict_and_label_aligned() {
        let rec = record(&[("a", "x.y".into())]);
        assert!(!Filter::new().with("<a", "x.y").matches(&rec));
        assert!(Filter::new().with("[a", "x.y").matches(&rec));
        assert!(!Filter::new().with("<a", "x.").matches(&rec));
        assert!(!Filter::new().with("<a", "xx").matches(&rec));
    }

    #[test]
    fn descendant_variants() {
        let rec = record(&[("a", "plc".into())]);
        assert!(Filter::new().with(">a", "plc.princeton").matches(&rec));
        assert!(!Filter::new().with(">a", "plc").matches(&rec));
        assert!(Filter::new().with("]a", "plc").matches(&rec));
    }

    #[test]
    fn equality_supports_lists_and_wildcards() {
        let rec = record(&[("host", "node1.site.org".into())]);
        assert!(Filter::new().with("host", "node1.site.org").matches(&rec));
        assert!(Filter::new().with("host", "*node1*").matches(&rec));
        assert!(Filter::new().with("host", "node*.org").matches(&rec));
        assert!(!Filter::new().with("host", "*node2*").matches(&rec));
        assert!(Filter::new()
            .with("=host", vec!["a", "node1.site.org"])
            .matches(&rec));
        assert!(Filter::new().with("~host", vec!["a", "b"]).matches(&rec));
    }

    #[test]
    fn set_and_bitwise_operators() {
        let rec = record(&[
            ("types", vec!["pc", "vm"].into()),
            ("mask", FieldValue::Number(0b0101)),
        ]);
        assert!(Filter::new().with("&types", vec!["vm", "switch"]).matches(&rec));
        assert!(!Filter::new().with("&types", vec!["switch"]).matches(&rec));
        assert!(Filter::new().with("|types", vec!["switch"]).matches(&rec));
        assert!(Filter::new().with("&mask", 0b0100i64).matches(&rec));
        assert!(!Filter::new().with("&mask", 0b1010i64).matches(&rec));
        assert!(Filter::new().with("|mask", 0i64).matches(&rec));
        assert!(Filter::new().with("{types", "vm").matches(&rec));
    }

    #[test]
    fn containment_on_text() {
        let rec = record(&[("name", "planetlab1.cs.princeton.edu".into())]);
        assert!(Filter::new().with("{name", "princeton").matches(&rec));
        assert!(!Filter::new().with("{name", "mit").matches(&rec));
    }

    #[test]
    fn numeric_ordering_reads_value_then_field() {
        let rec = record(&[("start", FieldValue::Number(100))]);
        assert!(Filter::new().with("<start", 50i64).matches(&rec));
        assert!(!Filter::new().with("<start", 100i64).matches(&rec));
        assert!(Filter::new().with("[start", 100i64).matches(&rec));
        assert!(Filter::new().with(">start", 150i64).matches(&rec));
    }

    #[test]
    fn clauses_are_conjunctive_and_missing_fields_fail() {
        let rec = record(&[("a", "1".into()), ("b", "2".into())]);
        assert!(Filter::new().with("a", "1").with("b", "2").matches(&rec));
        assert!(!Filter::new().with("a", "1").with("b", "3").matches(&rec));
        assert!(!Filter::new().with("c", "1").matches(&rec));
        assert!(Filter::new().with("~c", "1").matches(&rec));
        assert!(Filter::new().matches(&rec));
    }

    #[test]
    fn node_projection_exposes_tags_and_hardware() {
        let mut node = Node::new("urn:publicid:IDN+plc+node+n1").with_hardware_type("pc");
        node.tags.push(crate::model::Tag::new("arch", "x86_64"));
        assert!(Filter::new().with("arch", "x86_64").matches(&node));
        assert!(Filter::new().with("hardware_types", "pc").matches(&node));
        assert!(Filter::new().with("component_id", "*n1*").matches(&node));
    }
}
