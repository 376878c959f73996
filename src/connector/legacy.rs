//! Legacy XML brief-search connector.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LegacyConfig;
use crate::connector::cache::{CachingClient, ResponseCache};
use crate::connector::highlight::{apply_highlighting, process_description};
use crate::connector::xml::XmlNode;
use crate::connector::{map_index, precision_for, sanitize_term, Connector, ConnectorError};
use crate::models::{
    cdi_prefixed, normalize_issns, strip_record_prefix, DocumentItem, FacetValue, FilterOp,
    QueryResponse, SearchArgs, SearchTerm,
};
use crate::utils::HttpTransport;

/// Connector for the Primo brief-search XML API
/// (`PrimoWebServices/xservice/search/brief`).
///
/// Supports:
/// - Search with facet filters, pagination and highlighting
/// - Single-record retrieval by id
/// - Batch record retrieval (the REST API lacks this)
#[derive(Debug, Clone)]
pub struct LegacyConnector {
    base_url: String,
    institution: String,
    client: CachingClient,
}

impl LegacyConnector {
    /// Create a new legacy connector
    pub fn new(
        config: &LegacyConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Option<Arc<dyn ResponseCache>>,
    ) -> Self {
        Self {
            base_url: config.url.clone(),
            institution: config.institution.clone(),
            client: CachingClient::new(transport, cache),
        }
    }

    /// Build the query-string parameters for a search. Returns None when no
    /// usable term survives the index mapping, in which case the caller
    /// must answer with the canned empty response.
    fn build_search_params(
        &self,
        institution: &str,
        terms: &[SearchTerm],
        args: &SearchArgs,
    ) -> Option<Vec<(String, String)>> {
        let mut params: Vec<(String, String)> = vec![
            ("institution".into(), institution.to_string()),
            ("onCampus".into(), args.on_campus.to_string()),
        ];

        let mut have_term = false;
        for term in terms {
            // unknown handlers are silently skipped by this protocol; the
            // REST connector falls back to "any" instead
            let Some(index) = map_index(&term.index) else {
                tracing::debug!(handler = %term.index, "skipping term with unknown handler");
                continue;
            };
            let lookfor = sanitize_term(term.term.trim());
            if lookfor.trim().is_empty() {
                continue;
            }
            have_term = true;
            let precision = precision_for(args.phrase, term.operator.as_deref());
            params.push(("query".into(), format!("{},{},{}", index, precision, lookfor)));
        }

        if !have_term {
            return None;
        }

        for filter in &args.filter_list {
            let field = format!("facet_{}", filter.field);
            match filter.op {
                FilterOp::Or => {
                    let values: Vec<String> =
                        filter.values.iter().map(|v| sanitize_term(v)).collect();
                    params.push((
                        "query_inc".into(),
                        format!("{},exact,{}", field, values.join(",")),
                    ));
                }
                FilterOp::Not => {
                    for value in &filter.values {
                        params.push((
                            "query_exc".into(),
                            format!("{},exact,{}", field, sanitize_term(value)),
                        ));
                    }
                }
                FilterOp::And => {
                    for value in &filter.values {
                        params.push((
                            "query_inc".into(),
                            format!("{},exact,{}", field, sanitize_term(value)),
                        ));
                    }
                }
            }
        }

        // 1-based start index; the legacy API accepts limit 0
        let indx = (args.page_number.max(1) - 1) * args.limit + 1;
        params.push(("indx".into(), indx.to_string()));
        params.push(("bulkSize".into(), args.limit.to_string()));

        if args.did_you_mean {
            params.push(("dym".into(), "true".into()));
        }
        if args.highlight {
            params.push(("highlight".into(), "true".into()));
        }
        params.push(("pcAvailability".into(), args.pc_availability.to_string()));

        // legacy sort field names pass through unmapped
        if let Some(sort) = &args.sort {
            params.push(("sortField".into(), sort.clone()));
        }

        Some(params)
    }

    fn build_url(&self, params: &[(String, String)]) -> String {
        let query_string: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect();
        format!("{}?{}", self.base_url, query_string.join("&"))
    }

    async fn call(&self, url: &str, args: &SearchArgs) -> Result<QueryResponse, ConnectorError> {
        tracing::debug!(%url, "primo brief-search request");
        let response = self.client.get(url, &[], true).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, "primo brief-search request failed");
            return Err(ConnectorError::Api {
                status: response.status,
                body: response.body,
            });
        }
        self.process(&response.body, args)
    }

    /// Parse the brief-search XML payload into a normalized response.
    fn process(&self, xml: &str, args: &SearchArgs) -> Result<QueryResponse, ConnectorError> {
        if xml.trim().is_empty() {
            return Err(ConnectorError::Parse("empty response body".into()));
        }

        let root = XmlNode::parse(xml)?;
        let mut result = QueryResponse::default();

        if let Some(error) = root.descendants("ERROR").first() {
            result.error = error.attr("MESSAGE").map(str::to_string);
        }

        let docset = root
            .descendants("DOCSET")
            .into_iter()
            .next()
            .ok_or_else(|| ConnectorError::Parse("missing DOCSET element".into()))?;
        result.record_count = docset
            .attr("TOTALHITS")
            .ok_or_else(|| ConnectorError::Parse("missing TOTALHITS attribute".into()))?
            .parse()
            .map_err(|_| ConnectorError::Parse("invalid TOTALHITS attribute".into()))?;

        for doc in root.descendants("DOC") {
            result.documents.push(self.parse_doc(doc, args)?);
        }

        for facet in root.descendants("FACET") {
            let Some(name) = facet.attr("NAME") else {
                continue;
            };
            let values: Vec<FacetValue> = facet
                .children_named("FACET_VALUES")
                .iter()
                .filter_map(|node| {
                    node.attr("KEY").map(|key| FacetValue {
                        value: key.to_string(),
                        count: node.attr("VALUE").and_then(|v| v.parse().ok()),
                    })
                })
                .collect();
            result.facets.insert(name.to_string(), values);
        }

        for transforms in root.descendants("QUERYTRANSFORMS") {
            if let Some(query) = transforms.attr("QUERY") {
                result.did_you_mean.push(query.to_string());
            }
            for child in &transforms.children {
                if let Some(query) = child.attr("QUERY") {
                    result.did_you_mean.push(query.to_string());
                }
            }
        }

        Ok(result)
    }

    fn parse_doc(&self, doc: &XmlNode, args: &SearchArgs) -> Result<DocumentItem, ConnectorError> {
        // local-name lookup absorbs the first-document prefix quirk
        let record = doc
            .descendants("record")
            .into_iter()
            .next()
            .ok_or_else(|| ConnectorError::Parse("document without record element".into()))?;

        let display = record.child("display");
        let addata = record.child("addata");
        let search = record.child("search");
        let control = record.child("control");
        let delivery = record.child("delivery");

        let mut item = DocumentItem {
            record_id: strip_record_prefix(&text(control, "recordid")),
            title: text(display, "title"),
            format: texts(display, "type"),
            creator: split_list(&text(display, "creator")),
            subjects: split_list(&text(display, "subject")),
            is_part_of: text(display, "ispartof"),
            language: text(display, "language"),
            source: text(display, "source"),
            identifier: text(display, "identifier"),
            fulltext: text(delivery, "fulltext"),
            publisher: text(display, "publisher"),
            peer_reviewed: texts(display, "lds50").iter().any(|v| v == "peer_reviewed"),
            container_title: text(addata, "jtitle"),
            container_volume: text(addata, "volume"),
            container_issue: text(addata, "issue"),
            container_start_page: text(addata, "spage"),
            container_end_page: text(addata, "epage"),
            doi: texts(addata, "doi"),
            full_record: record.to_value(),
            ..Default::default()
        };

        let description = text(display, "description");
        item.description = if description.is_empty() {
            text(search, "description")
        } else {
            description
        };

        let mut issns = texts(search, "issn");
        issns.extend(texts(addata, "issn"));
        issns.extend(texts(addata, "eissn"));
        item.issn = normalize_issns(issns);

        item.cites = texts(display, "cites")
            .iter()
            .map(|v| cdi_prefixed(v))
            .collect();
        item.cited_by = texts(display, "citedby")
            .iter()
            .map(|v| cdi_prefixed(v))
            .collect();

        // the GETIT element carries the delivery link in GETIT1, with
        // GETIT2 as the fallback
        if let Some(getit) = doc.descendants("GETIT").into_iter().next() {
            item.url = getit
                .attr("GETIT1")
                .filter(|v| !v.is_empty())
                .or_else(|| getit.attr("GETIT2"))
                .unwrap_or_default()
                .to_string();
        }

        apply_highlighting(&mut item, args);
        item.description = process_description(&item.description);

        Ok(item)
    }
}

fn text(parent: Option<&XmlNode>, name: &str) -> String {
    parent
        .and_then(|p| p.child(name))
        .map(|n| n.text.trim().to_string())
        .unwrap_or_default()
}

fn texts(parent: Option<&XmlNode>, name: &str) -> Vec<String> {
    parent
        .map(|p| {
            p.children_named(name)
                .iter()
                .map(|n| n.text.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

#[async_trait]
impl Connector for LegacyConnector {
    fn institution_code(&self) -> &str {
        &self.institution
    }

    async fn query(
        &self,
        institution: &str,
        terms: &[SearchTerm],
        args: &SearchArgs,
    ) -> Result<QueryResponse, ConnectorError> {
        let Some(params) = self.build_search_params(institution, terms, args) else {
            tracing::debug!("no usable search terms; returning canned empty result");
            return Ok(QueryResponse::empty_search_disallowed());
        };
        let url = self.build_url(&params);
        self.call(&url, args).await
    }

    async fn get_record(
        &self,
        record_id: &str,
        inst_code: Option<&str>,
        on_campus: bool,
    ) -> Result<QueryResponse, ConnectorError> {
        if record_id.trim().is_empty() {
            return Ok(QueryResponse::empty_search_disallowed());
        }

        let args = SearchArgs {
            on_campus,
            pc_availability: true,
            limit: 1,
            ..Default::default()
        };
        let institution = inst_code.unwrap_or(&self.institution);

        let params = vec![
            ("institution".to_string(), institution.to_string()),
            ("onCampus".to_string(), on_campus.to_string()),
            (
                "query".to_string(),
                format!("rid,contains,{}", sanitize_term(record_id.trim())),
            ),
            ("indx".to_string(), "1".to_string()),
            ("bulkSize".to_string(), "1".to_string()),
            ("pcAvailability".to_string(), "true".to_string()),
        ];
        let url = self.build_url(&params);
        self.call(&url, &args).await
    }

    async fn get_records(
        &self,
        record_ids: &[String],
        inst_code: Option<&str>,
        on_campus: bool,
    ) -> Result<QueryResponse, ConnectorError> {
        let ids: Vec<String> = record_ids
            .iter()
            .map(|id| sanitize_term(id.trim()))
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(QueryResponse::empty_search_disallowed());
        }

        let args = SearchArgs {
            on_campus,
            pc_availability: true,
            limit: ids.len(),
            ..Default::default()
        };
        let institution = inst_code.unwrap_or(&self.institution);

        let params = vec![
            ("institution".to_string(), institution.to_string()),
            ("onCampus".to_string(), on_campus.to_string()),
            (
                "query".to_string(),
                format!("rid,contains,{}", ids.join(" OR ")),
            ),
            ("indx".to_string(), "1".to_string()),
            ("bulkSize".to_string(), ids.len().to_string()),
            ("pcAvailability".to_string(), "true".to_string()),
        ];
        let url = self.build_url(&params);
        self.call(&url, &args).await
    }
}
