//! Request parameter containers: the caller-facing [`ParamBag`] and the
//! per-call [`SearchArgs`] the connectors consume.

use serde::{Deserialize, Serialize};

/// How a filter combines its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    /// Implicit AND: one include clause per value
    And,
    /// OR: values combined into a single include clause
    Or,
    /// NOT: values excluded
    Not,
}

impl FilterOp {
    /// Parse a facet operator string, defaulting to AND
    pub fn parse(op: &str) -> Self {
        match op {
            "OR" => FilterOp::Or,
            "NOT" => FilterOp::Not,
            _ => FilterOp::And,
        }
    }
}

/// A single facet filter applied to a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    /// Facet field name, without the wire `facet_` prefix
    pub field: String,

    /// How the values combine
    pub op: FilterOp,

    /// Selected facet values
    pub values: Vec<String>,
}

impl Filter {
    /// Create a new filter
    pub fn new(field: impl Into<String>, op: FilterOp, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            op,
            values,
        }
    }
}

/// A `{index, operator, term}` triple produced by the query builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTerm {
    /// Abstract handler name, mapped to a wire index by each connector
    pub index: String,

    /// The literal search string
    pub term: String,

    /// Operator inherited from the enclosing query group, if any
    pub operator: Option<String>,
}

/// Ordered multi-valued parameter container.
///
/// Scalar options live in an ordered `name -> values` multimap; the two
/// structured keys of the wire protocol (the query triples and the filter
/// list) have typed slots. Pass-through array keys (`facets`,
/// `groupFilters`, `rangeFilters`) travel in the scalar map and survive
/// merges verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamBag {
    params: Vec<(String, Vec<String>)>,
    terms: Vec<SearchTerm>,
    filters: Vec<Filter>,
}

impl ParamBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values of a parameter
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.params.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = vec![value];
        } else {
            self.params.push((name, vec![value]));
        }
    }

    /// Append a value to a parameter
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.params.iter_mut().find(|(n, _)| *n == name) {
            entry.1.push(value);
        } else {
            self.params.push((name, vec![value]));
        }
    }

    /// All values of a parameter
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// First value of a parameter
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// First value of a parameter interpreted as a boolean ("true"/"1")
    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.first(name).map(|v| v == "true" || v == "1")
    }

    /// First value of a parameter parsed as an unsigned integer
    pub fn usize_param(&self, name: &str) -> Option<usize> {
        self.first(name).and_then(|v| v.parse().ok())
    }

    /// Replace the query triples slot
    pub fn set_terms(&mut self, terms: Vec<SearchTerm>) {
        self.terms = terms;
    }

    /// The query triples slot
    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Append a filter to the filter list
    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// The filter list
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Merge another bag into this one. Scalar parameters from `other`
    /// replace existing values; a non-empty term slot replaces ours;
    /// filters are appended.
    pub fn merge(&mut self, other: &ParamBag) {
        for (name, values) in &other.params {
            if let Some(entry) = self.params.iter_mut().find(|(n, _)| n == name) {
                entry.1 = values.clone();
            } else {
                self.params.push((name.clone(), values.clone()));
            }
        }
        if !other.terms.is_empty() {
            self.terms = other.terms.clone();
        }
        self.filters.extend(other.filters.iter().cloned());
    }
}

/// Normalized per-call search arguments.
///
/// Built fresh for every request by merging caller-supplied parameters over
/// hard-coded defaults; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchArgs {
    /// Treat every term as a phrase ("exact" precision)
    pub phrase: bool,

    /// Whether the caller is on campus (affects full-text availability)
    pub on_campus: bool,

    /// Request "did you mean" suggestions
    pub did_you_mean: bool,

    /// Facet filters, pcAvailability already lifted out
    pub filter_list: Vec<Filter>,

    /// Include results without local fulltext holdings
    pub pc_availability: bool,

    /// 1-based page number
    pub page_number: usize,

    /// Page size; the legacy API accepts 0, REST clamps to >= 1
    pub limit: usize,

    /// Sort field; None or "relevance" means relevance ranking
    pub sort: Option<String>,

    /// Whether highlighting was requested
    pub highlight: bool,

    /// Opening marker wrapped around highlighted snippets
    pub highlight_start: String,

    /// Closing marker wrapped around highlighted snippets
    pub highlight_end: String,
}

impl Default for SearchArgs {
    fn default() -> Self {
        Self {
            phrase: false,
            on_campus: false,
            did_you_mean: false,
            filter_list: Vec::new(),
            pc_availability: false,
            page_number: 1,
            limit: 20,
            sort: None,
            highlight: false,
            highlight_start: String::new(),
            highlight_end: String::new(),
        }
    }
}

impl SearchArgs {
    /// Build arguments from a parameter bag, merging over the defaults.
    ///
    /// A synthetic `pcAvailability` entry in the filter list is lifted into
    /// the top-level boolean instead of being sent as a facet.
    pub fn from_bag(bag: &ParamBag) -> Self {
        let mut args = SearchArgs::default();

        if let Some(v) = bag.bool_param("phrase") {
            args.phrase = v;
        }
        if let Some(v) = bag.bool_param("onCampus") {
            args.on_campus = v;
        }
        if let Some(v) = bag.bool_param("didYouMean") {
            args.did_you_mean = v;
        }
        if let Some(v) = bag.bool_param("pcAvailability") {
            args.pc_availability = v;
        }
        if let Some(v) = bag.bool_param("highlight") {
            args.highlight = v;
        }
        if let Some(v) = bag.usize_param("pageNumber") {
            args.page_number = v.max(1);
        }
        if let Some(v) = bag.usize_param("limit") {
            args.limit = v;
        }
        if let Some(v) = bag.first("sort") {
            args.sort = Some(v.to_string());
        }
        if let Some(v) = bag.first("highlightStart") {
            args.highlight_start = v.to_string();
        }
        if let Some(v) = bag.first("highlightEnd") {
            args.highlight_end = v.to_string();
        }

        for filter in bag.filters() {
            if filter.field == "pcAvailability" {
                args.pc_availability = filter
                    .values
                    .first()
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false);
            } else {
                args.filter_list.push(filter.clone());
            }
        }

        args
    }
}
