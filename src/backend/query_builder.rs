//! Translation from the abstract query tree to wire-ready search terms.

use crate::models::{ParamBag, Query, QueryGroup, SearchTerm};

const DEFAULT_HANDLER: &str = "AllFields";

/// Builds the `query` triples slot of a [`ParamBag`] from an abstract
/// [`Query`].
///
/// Pure translation: no term validation, no side effects. The advanced
/// search form produces a group of sub-groups; only the *first* sub-group
/// is translated, matching the single-level advanced search the wire
/// protocol supports. Deeper nesting is ignored rather than rejected.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self
    }

    /// Translate a query into a bag with the triples slot filled
    pub fn build(&self, query: &Query) -> ParamBag {
        let mut bag = ParamBag::new();
        bag.set_terms(self.terms_for(query));
        bag
    }

    fn terms_for(&self, query: &Query) -> Vec<SearchTerm> {
        match query {
            Query::Term(term) => vec![SearchTerm {
                index: term
                    .handler
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HANDLER.to_string()),
                term: term.term.clone(),
                operator: term.operator.clone(),
            }],
            Query::Group(group) => {
                if let Some(inner) = first_sub_group(group) {
                    flatten_group(inner)
                } else {
                    flatten_group(group)
                }
            }
        }
    }
}

/// The first group-typed member of a group, if any
fn first_sub_group(group: &QueryGroup) -> Option<&QueryGroup> {
    group.queries.iter().find_map(|member| match member {
        Query::Group(inner) => Some(inner),
        Query::Term(_) => None,
    })
}

/// Flatten a group's immediate terms, each carrying the group operator
/// (`NOT` when the group is negated). Nested groups below this level are
/// skipped.
fn flatten_group(group: &QueryGroup) -> Vec<SearchTerm> {
    let operator = if group.negated {
        "NOT".to_string()
    } else {
        group.operator.as_str().to_string()
    };

    group
        .queries
        .iter()
        .filter_map(|member| match member {
            Query::Term(term) => Some(SearchTerm {
                index: term
                    .handler
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HANDLER.to_string()),
                term: term.term.clone(),
                operator: Some(operator.clone()),
            }),
            Query::Group(_) => None,
        })
        .collect()
}
