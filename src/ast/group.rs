use super::predicate::{FilterSyntaxError, Predicate};

/// Parenthesized list of predicates.
///
/// `or` decides how the group joins the group before it; `inner_or` is the
/// default combinator between its predicates, overridden per predicate by a
/// combinator hint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGroup {
    pub predicates: Vec<Predicate>,
    pub or: bool,
    pub inner_or: bool,
}

impl FilterGroup {
    pub fn new(or: bool, inner_or: bool) -> Self {
        FilterGroup {
            predicates: Vec::new(),
            or,
            inner_or,
        }
    }

    /// Build a group from hand-written `key=value` filters.
    pub fn parse<I, S>(queries: I, or: bool, inner_or: bool) -> Result<Self, FilterSyntaxError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let predicates = queries
            .into_iter()
            .map(|q| q.as_ref().parse::<Predicate>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterGroup {
            predicates,
            or,
            inner_or,
        })
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
