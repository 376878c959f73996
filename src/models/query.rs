//! Abstract query model consumed by the query builder.
//!
//! A [`Query`] is either a single term bound to a search handler or a group
//! of queries joined by a boolean operator. Queries are immutable once
//! built; this crate consumes them, it never produces them.

use serde::{Deserialize, Serialize};

/// Boolean operator joining the members of a query group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    And,
    Or,
}

impl GroupOperator {
    /// Wire representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupOperator::And => "AND",
            GroupOperator::Or => "OR",
        }
    }
}

/// A single search term bound to an abstract handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermQuery {
    /// Abstract search handler (e.g. "AllFields", "Title"); None means the
    /// default handler
    pub handler: Option<String>,

    /// The literal search string; blank terms are passed through unchanged
    pub term: String,

    /// Optional per-term operator carried into the wire precision
    pub operator: Option<String>,
}

/// A group of queries joined by a boolean operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryGroup {
    /// Operator joining the group members
    pub operator: GroupOperator,

    /// Whether the whole group is negated (translated to a NOT operator)
    pub negated: bool,

    /// Group members, terms or nested groups
    pub queries: Vec<Query>,
}

/// Abstract query tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Group(QueryGroup),
}

impl Query {
    /// Create a single-term query for the given handler
    pub fn term(handler: impl Into<String>, term: impl Into<String>) -> Self {
        Query::Term(TermQuery {
            handler: Some(handler.into()),
            term: term.into(),
            operator: None,
        })
    }

    /// Create a single-term query using the default handler
    pub fn simple(term: impl Into<String>) -> Self {
        Query::Term(TermQuery {
            handler: None,
            term: term.into(),
            operator: None,
        })
    }

    /// Create a query group
    pub fn group(operator: GroupOperator, queries: Vec<Query>) -> Self {
        Query::Group(QueryGroup {
            operator,
            negated: false,
            queries,
        })
    }

    /// Create a negated query group
    pub fn negated_group(operator: GroupOperator, queries: Vec<Query>) -> Self {
        Query::Group(QueryGroup {
            operator,
            negated: true,
            queries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_wire_form() {
        assert_eq!(GroupOperator::And.as_str(), "AND");
        assert_eq!(GroupOperator::Or.as_str(), "OR");
    }

    #[test]
    fn test_term_constructors() {
        match Query::term("Title", "dogs") {
            Query::Term(t) => {
                assert_eq!(t.handler.as_deref(), Some("Title"));
                assert_eq!(t.term, "dogs");
                assert!(t.operator.is_none());
            }
            _ => panic!("Expected a term query"),
        }

        match Query::simple("cats") {
            Query::Term(t) => assert!(t.handler.is_none()),
            _ => panic!("Expected a term query"),
        }
    }
}
