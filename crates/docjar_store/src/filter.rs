//! Query filters and projections.

use docjar_codec::{Document, DocumentId, Value, ID_FIELD};

/// A condition on one document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The field equals the value. `Eq(Null)` also matches a missing field.
    Eq(Value),
    /// The field differs from the value. A missing field counts as `Null`.
    Ne(Value),
    /// The field is present (`true`) or absent (`false`).
    Exists(bool),
}

impl Condition {
    /// Returns true if `field` (absent when `None`) satisfies the condition.
    #[must_use]
    pub fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Eq(Value::Null) => field.map_or(true, Value::is_null),
            Condition::Eq(expected) => field == Some(expected),
            Condition::Ne(unexpected) => field.unwrap_or(&Value::Null) != unexpected,
            Condition::Exists(present) => field.is_some() == *present,
        }
    }
}

/// A conjunction of field conditions, at most one per field.
///
/// Setting a condition on a field that already has one replaces it,
/// the way assigning a key in a query document does.
///
/// ```
/// use docjar_codec::doc;
/// use docjar_store::Filter;
///
/// let filter = Filter::new().eq("parent", "root").exists("key", true);
/// assert!(filter.matches(&doc! { "parent" => "root", "key" => "a" }));
/// assert!(!filter.matches(&doc! { "parent" => "root" }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    /// Creates an empty filter, matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter selecting one document by `_id`.
    #[must_use]
    pub fn by_id(id: DocumentId) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    /// Adds (or replaces) an equality condition.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    /// Adds (or replaces) an inequality condition.
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    /// Adds (or replaces) an existence condition.
    #[must_use]
    pub fn exists(self, field: impl Into<String>, present: bool) -> Self {
        self.with(field, Condition::Exists(present))
    }

    /// Adds (or replaces) a condition.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.set(field, condition);
        self
    }

    /// Sets the condition on a field, replacing any previous one.
    pub fn set(&mut self, field: impl Into<String>, condition: Condition) {
        let field = field.into();
        match self.conditions.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => *existing = condition,
            None => self.conditions.push((field, condition)),
        }
    }

    /// Adds every condition of `other` on a field this filter leaves
    /// unconstrained. Conditions already present are never overridden.
    pub fn merge_missing(&mut self, other: &Filter) {
        for (field, condition) in &other.conditions {
            if self.condition(field).is_none() {
                self.conditions.push((field.clone(), condition.clone()));
            }
        }
    }

    /// The condition on a field, if any.
    #[must_use]
    pub fn condition(&self, field: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, c)| c)
    }

    /// All conditions in the order they were added.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(f, c)| (f.as_str(), c))
    }

    /// The `_id` this filter pins with an equality condition, if any.
    #[must_use]
    pub fn id(&self) -> Option<DocumentId> {
        match self.condition(ID_FIELD) {
            Some(Condition::Eq(value)) => value.as_id(),
            _ => None,
        }
    }

    /// Returns true if the filter has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns true if the document satisfies every condition.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(document.get(field)))
    }
}

/// Which fields a query returns. `_id` is always returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Every field.
    #[default]
    All,
    /// Only the listed fields.
    Fields(Vec<String>),
}

impl Projection {
    /// A projection returning only the given fields.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Fields(fields.into_iter().map(Into::into).collect())
    }

    /// A projection returning only `_id`.
    #[must_use]
    pub fn id_only() -> Self {
        Projection::Fields(Vec::new())
    }

    /// Applies the projection to a document.
    #[must_use]
    pub fn apply(&self, document: Document) -> Document {
        match self {
            Projection::All => document,
            Projection::Fields(fields) => document.project(fields.as_slice()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docjar_codec::doc;
    use proptest::prelude::*;

    #[test]
    fn eq_matches_value() {
        let f = Filter::new().eq("name", "one");
        assert!(f.matches(&doc! { "name" => "one" }));
        assert!(!f.matches(&doc! { "name" => "two" }));
        assert!(!f.matches(&doc! {}));
    }

    #[test]
    fn eq_null_matches_missing() {
        let f = Filter::new().eq("name", Value::Null);
        assert!(f.matches(&doc! {}));
        assert!(f.matches(&doc! { "name" => Value::Null }));
        assert!(!f.matches(&doc! { "name" => "x" }));
    }

    #[test]
    fn ne_null_means_present_and_not_null() {
        let f = Filter::new().ne("key", Value::Null);
        assert!(f.matches(&doc! { "key" => "a" }));
        assert!(!f.matches(&doc! { "key" => Value::Null }));
        assert!(!f.matches(&doc! {}));
    }

    #[test]
    fn exists() {
        let f = Filter::new().exists("key", true);
        assert!(f.matches(&doc! { "key" => Value::Null }));
        assert!(!f.matches(&doc! {}));
        assert!(Filter::new().exists("key", false).matches(&doc! {}));
    }

    #[test]
    fn setting_a_field_twice_replaces() {
        let f = Filter::new().exists("key", true).eq("key", "a");
        assert_eq!(f.conditions().count(), 1);
        assert_eq!(f.condition("key"), Some(&Condition::Eq("a".into())));
    }

    #[test]
    fn merge_missing_keeps_callers_conditions() {
        let mut f = Filter::new().eq("parent", "mine");
        f.merge_missing(&Filter::new().eq("parent", "scope").exists("key", true));
        assert_eq!(f.condition("parent"), Some(&Condition::Eq("mine".into())));
        assert_eq!(f.condition("key"), Some(&Condition::Exists(true)));
    }

    #[test]
    fn by_id_exposes_id() {
        let id = DocumentId::new();
        assert_eq!(Filter::by_id(id).id(), Some(id));
        assert_eq!(Filter::new().exists(ID_FIELD, true).id(), None);
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().is_empty());
        assert!(Filter::new().matches(&doc! { "a" => 1i64 }));
    }

    #[test]
    fn projection_keeps_id() {
        let id = DocumentId::new();
        let d = doc! { ID_FIELD => id, "key" => "k", "body" => "long" };
        assert_eq!(
            Projection::fields(["key"]).apply(d.clone()),
            doc! { ID_FIELD => id, "key" => "k" }
        );
        assert_eq!(Projection::id_only().apply(d.clone()), doc! { ID_FIELD => id });
        assert_eq!(Projection::All.apply(d.clone()), d);
    }

    proptest! {
        #[test]
        fn merge_never_overrides(
            mine in prop::collection::vec(("[a-d]", any::<i64>()), 0..4),
            scope in prop::collection::vec(("[a-d]", any::<i64>()), 0..4),
        ) {
            let mut filter = mine.iter().fold(Filter::new(), |f, (k, v)| f.eq(k.as_str(), *v));
            let before = filter.clone();
            let other = scope.iter().fold(Filter::new(), |f, (k, v)| f.eq(k.as_str(), *v));
            filter.merge_missing(&other);

            for (field, condition) in before.conditions() {
                prop_assert_eq!(filter.condition(field), Some(condition));
            }
            for (field, _) in other.conditions() {
                prop_assert!(filter.condition(field).is_some());
            }
        }
    }
}
