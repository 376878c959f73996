//! REST/JSON connector with guest-JWT authentication.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::RestConfig;
use crate::connector::cache::{CachingClient, ResponseCache};
use crate::connector::highlight::{apply_highlighting, process_description};
use crate::connector::token::TokenCache;
use crate::connector::{map_index, precision_for, sanitize_term, Connector, ConnectorError};
use crate::models::{
    cdi_prefixed, normalize_issns, strip_record_prefix, DocumentItem, FacetValue, FilterOp,
    QueryResponse, SearchArgs, SearchTerm,
};
use crate::utils::HttpTransport;

/// Authorization state of one logical search call. A 403 on the first
/// attempt discards the token and retries once with a fresh one; a 403 on
/// the retry is a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthAttempt {
    First,
    Retried,
}

/// Connector for the Primo REST API (`pnxs` search endpoint).
///
/// Authenticates with a guest JWT fetched per institution and held in a
/// [`TokenCache`]; an optional static API key takes precedence when
/// configured.
#[derive(Debug, Clone)]
pub struct RestConnector {
    search_url: String,
    jwt_url: String,
    institution: String,
    lang: String,
    search_cdi: bool,
    api_key: Option<String>,
    client: CachingClient,
    // token fetches bypass the response cache
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenCache>,
}

impl RestConnector {
    /// Create a new REST connector
    pub fn new(
        config: &RestConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Option<Arc<dyn ResponseCache>>,
        tokens: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            search_url: config.search_url.clone(),
            jwt_url: config.jwt_url.clone(),
            institution: config.institution.clone(),
            lang: config.lang.clone(),
            search_cdi: config.search_cdi,
            api_key: config.api_key.clone(),
            client: CachingClient::new(transport.clone(), cache),
            transport,
            tokens,
        }
    }

    /// Map an abstract sort name onto the REST API's field name. Relevance
    /// is the implicit default and is expressed by omitting the parameter.
    fn map_sort(sort: Option<&str>) -> Option<String> {
        match sort {
            None | Some("relevance") => None,
            Some("scdate") => Some("date".to_string()),
            Some("screator") => Some("author".to_string()),
            Some("stitle") => Some("title".to_string()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Build the query-string parameters for a search. Returns None when
    /// neither a usable term nor a filter survives, in which case the caller
    /// must answer with the canned empty response.
    fn build_search_params(
        &self,
        institution: &str,
        terms: &[SearchTerm],
        args: &SearchArgs,
    ) -> Option<Vec<(String, String)>> {
        let mut q_components = Vec::new();
        for term in terms {
            let lookfor = sanitize_term(term.term.trim());
            if lookfor.trim().is_empty() {
                continue;
            }
            // unknown handlers fall back to the catch-all index here; the
            // legacy connector skips them instead
            let index = map_index(&term.index).unwrap_or("any");
            let precision = precision_for(args.phrase, term.operator.as_deref());
            q_components.push(format!("{},{},{}", index, precision, lookfor));
        }

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut multi = Vec::new();
        for filter in &args.filter_list {
            let field = format!("facet_{}", filter.field);
            match filter.op {
                FilterOp::Or => {
                    for value in &filter.values {
                        multi.push(format!("{},include,{}", field, sanitize_term(value)));
                    }
                }
                FilterOp::Not => {
                    for value in &filter.values {
                        exclude.push(format!("{},exact,{}", field, sanitize_term(value)));
                    }
                }
                FilterOp::And => {
                    for value in &filter.values {
                        include.push(format!("{},exact,{}", field, sanitize_term(value)));
                    }
                }
            }
        }

        if q_components.is_empty() && include.is_empty() && exclude.is_empty() && multi.is_empty()
        {
            return None;
        }

        let mut params: Vec<(String, String)> = vec![
            ("inst".into(), institution.to_string()),
            ("lang".into(), self.lang.clone()),
        ];
        if self.search_cdi {
            params.push(("searchCDI".into(), "true".into()));
        }
        if !q_components.is_empty() {
            params.push(("q".into(), q_components.join(";")));
        }
        if !include.is_empty() {
            params.push(("qInclude".into(), include.join("|,|")));
        }
        if !exclude.is_empty() {
            params.push(("qExclude".into(), exclude.join("|,|")));
        }
        if !multi.is_empty() {
            params.push(("multiFacets".into(), multi.join("|,|")));
        }

        // 0-based offset; this API rejects a zero page size
        let limit = args.limit.max(1);
        let offset = (args.page_number.max(1) - 1) * limit;
        params.push(("offset".into(), offset.to_string()));
        params.push(("limit".into(), limit.to_string()));
        params.push(("pcAvailability".into(), args.pc_availability.to_string()));

        if let Some(sort) = Self::map_sort(args.sort.as_deref()) {
            params.push(("sort".into(), sort));
        }

        Some(params)
    }

    fn build_url(&self, params: &[(String, String)]) -> String {
        let query_string: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect();
        format!("{}?{}", self.search_url, query_string.join("&"))
    }

    /// Obtain a bearer token for the institution, reusing the cached one
    /// unless `force_new` is set.
    async fn token_for(
        &self,
        institution: &str,
        force_new: bool,
    ) -> Result<String, ConnectorError> {
        if !force_new {
            if let Some(token) = self.tokens.get(institution) {
                return Ok(token);
            }
        }

        let url = self
            .jwt_url
            .replace("{{INSTCODE}}", &urlencoding::encode(institution));
        tracing::debug!(%url, "fetching guest JWT");
        let response = self.transport.get(&url, &[]).await?;
        if !response.is_success() {
            return Err(ConnectorError::Auth(format!(
                "JWT endpoint returned status {}",
                response.status
            )));
        }

        // the endpoint answers with a JSON-encoded string
        let token: String = serde_json::from_str(&response.body)
            .unwrap_or_else(|_| response.body.trim().trim_matches('"').to_string());
        if token.is_empty() {
            return Err(ConnectorError::Auth("JWT endpoint returned an empty token".into()));
        }

        self.tokens.set(institution, token.clone());
        Ok(token)
    }

    async fn call(
        &self,
        institution: &str,
        url: &str,
        args: &SearchArgs,
    ) -> Result<QueryResponse, ConnectorError> {
        let mut attempt = AuthAttempt::First;
        loop {
            let headers = if let Some(key) = &self.api_key {
                vec![("Authorization".to_string(), format!("apikey {}", key))]
            } else {
                let token = self
                    .token_for(institution, attempt == AuthAttempt::Retried)
                    .await?;
                vec![("Authorization".to_string(), format!("Bearer {}", token))]
            };

            tracing::debug!(%url, ?attempt, "primo REST request");
            let response = self.client.get(url, &headers, true).await?;

            if response.status == 403 {
                match attempt {
                    AuthAttempt::First => {
                        tracing::warn!(%institution, "REST call rejected; renewing JWT and retrying");
                        self.tokens.clear(institution);
                        attempt = AuthAttempt::Retried;
                        continue;
                    }
                    AuthAttempt::Retried => {
                        return Err(ConnectorError::Auth(
                            "access denied after token renewal".into(),
                        ));
                    }
                }
            }

            if !response.is_success() {
                tracing::warn!(status = response.status, "primo REST request failed");
                return Err(ConnectorError::Api {
                    status: response.status,
                    body: response.body,
                });
            }

            return self.process_response(&response.body, args);
        }
    }

    /// Parse the JSON payload into a normalized response.
    fn process_response(
        &self,
        body: &str,
        args: &SearchArgs,
    ) -> Result<QueryResponse, ConnectorError> {
        let payload: RestResponse = serde_json::from_str(body)?;
        let mut result = QueryResponse {
            record_count: payload.info.total,
            ..Default::default()
        };
        if let Some(suggestion) = payload.info.did_u_mean {
            if !suggestion.is_empty() {
                result.did_you_mean.push(suggestion);
            }
        }

        for doc in payload.docs {
            result.documents.push(self.parse_doc(&doc, args)?);
        }

        for facet in payload.facets {
            let mut values: Vec<FacetValue> = facet
                .values
                .into_iter()
                .map(|v| FacetValue {
                    value: v.value,
                    count: Some(v.count),
                })
                .collect();

            // values the session has already selected may be absent from
            // the response; force them in without a count so they surface
            // at the top
            for filter in &args.filter_list {
                if filter.field != facet.name || filter.op == FilterOp::Not {
                    continue;
                }
                for selected in &filter.values {
                    match values.iter_mut().find(|v| v.value == *selected) {
                        Some(value) => value.count = None,
                        None => values.push(FacetValue {
                            value: selected.clone(),
                            count: None,
                        }),
                    }
                }
            }

            values.sort_by(|a, b| {
                b.count
                    .unwrap_or(u64::MAX)
                    .cmp(&a.count.unwrap_or(u64::MAX))
            });
            result.facets.insert(facet.name, values);
        }

        Ok(result)
    }

    fn parse_doc(&self, doc: &RestDoc, args: &SearchArgs) -> Result<DocumentItem, ConnectorError> {
        let pnx: Pnx = serde_json::from_value(doc.pnx.clone())?;

        let mut item = DocumentItem {
            record_id: strip_record_prefix(first(&pnx.control.recordid)),
            title: first(&pnx.display.title).to_string(),
            format: pnx.display.r#type.clone(),
            creator: clean_list(&pnx.display.creator),
            subjects: clean_list(&pnx.display.subject),
            is_part_of: first(&pnx.display.ispartof).to_string(),
            language: first(&pnx.display.language).to_string(),
            source: first(&pnx.display.source).to_string(),
            identifier: first(&pnx.display.identifier).to_string(),
            fulltext: first(&pnx.delivery.fulltext).to_string(),
            publisher: first(&pnx.display.publisher).to_string(),
            peer_reviewed: pnx.display.lds50.iter().any(|v| v == "peer_reviewed"),
            container_title: first(&pnx.addata.jtitle).to_string(),
            container_volume: first(&pnx.addata.volume).to_string(),
            container_issue: first(&pnx.addata.issue).to_string(),
            container_start_page: first(&pnx.addata.spage).to_string(),
            container_end_page: first(&pnx.addata.epage).to_string(),
            doi: clean_list(&pnx.addata.doi),
            full_record: doc.pnx.clone(),
            ..Default::default()
        };

        item.description = if pnx.display.description.is_empty() {
            first(&pnx.search.description).to_string()
        } else {
            first(&pnx.display.description).to_string()
        };

        let mut issns = pnx.search.issn.clone();
        issns.extend(pnx.addata.issn.clone());
        issns.extend(pnx.addata.eissn.clone());
        item.issn = normalize_issns(issns);

        item.cites = pnx.display.cites.iter().map(|v| cdi_prefixed(v)).collect();
        item.cited_by = pnx
            .display
            .citedby
            .iter()
            .map(|v| cdi_prefixed(v))
            .collect();

        apply_highlighting(&mut item, args);
        item.description = process_description(&item.description);

        Ok(item)
    }
}

fn first(values: &[String]) -> &str {
    values.first().map(String::as_str).unwrap_or_default()
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    #[serde(default)]
    info: RestInfo,
    #[serde(default)]
    docs: Vec<RestDoc>,
    #[serde(default)]
    facets: Vec<RestFacet>,
}

#[derive(Debug, Default, Deserialize)]
struct RestInfo {
    #[serde(default)]
    total: usize,
    #[serde(default, rename = "did_u_mean")]
    did_u_mean: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestDoc {
    pnx: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RestFacet {
    name: String,
    #[serde(default)]
    values: Vec<RestFacetValue>,
}

#[derive(Debug, Deserialize)]
struct RestFacetValue {
    value: String,
    #[serde(default)]
    count: u64,
}

/// Typed view of the PNX sections the document mapping reads. The raw
/// value is kept alongside as `full_record`, so unknown sections are not
/// lost by this projection.
#[derive(Debug, Default, Deserialize)]
struct Pnx {
    #[serde(default)]
    control: PnxControl,
    #[serde(default)]
    display: PnxDisplay,
    #[serde(default)]
    addata: PnxAddata,
    #[serde(default)]
    search: PnxSearch,
    #[serde(default)]
    delivery: PnxDelivery,
}

#[derive(Debug, Default, Deserialize)]
struct PnxControl {
    #[serde(default)]
    recordid: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PnxDisplay {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default, rename = "type")]
    r#type: Vec<String>,
    #[serde(default)]
    creator: Vec<String>,
    #[serde(default)]
    subject: Vec<String>,
    #[serde(default)]
    description: Vec<String>,
    #[serde(default)]
    language: Vec<String>,
    #[serde(default)]
    source: Vec<String>,
    #[serde(default)]
    identifier: Vec<String>,
    #[serde(default)]
    publisher: Vec<String>,
    #[serde(default)]
    ispartof: Vec<String>,
    #[serde(default)]
    lds50: Vec<String>,
    #[serde(default)]
    cites: Vec<String>,
    #[serde(default)]
    citedby: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PnxAddata {
    #[serde(default)]
    issn: Vec<String>,
    #[serde(default)]
    eissn: Vec<String>,
    #[serde(default)]
    jtitle: Vec<String>,
    #[serde(default)]
    volume: Vec<String>,
    #[serde(default)]
    issue: Vec<String>,
    #[serde(default)]
    spage: Vec<String>,
    #[serde(default)]
    epage: Vec<String>,
    #[serde(default)]
    doi: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PnxSearch {
    #[serde(default)]
    description: Vec<String>,
    #[serde(default)]
    issn: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PnxDelivery {
    #[serde(default)]
    fulltext: Vec<String>,
}

#[async_trait]
impl Connector for RestConnector {
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
            tracing::debug!("no usable search terms or filters; returning canned empty result");
            return Ok(QueryResponse::empty_search_disallowed());
        };
        let url = self.build_url(&params);
        self.call(institution, &url, args).await
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

        let mut params: Vec<(String, String)> = vec![
            ("inst".to_string(), institution.to_string()),
            ("lang".to_string(), self.lang.clone()),
        ];
        if self.search_cdi {
            params.push(("searchCDI".to_string(), "true".to_string()));
        }
        // the id is quoted so embedded spaces survive the triple encoding
        params.push((
            "q".to_string(),
            format!("rid,contains,\"{}\"", sanitize_term(record_id.trim())),
        ));
        params.push(("offset".to_string(), "0".to_string()));
        params.push(("limit".to_string(), "1".to_string()));
        params.push(("pcAvailability".to_string(), "true".to_string()));

        let url = self.build_url(&params);
        self.call(institution, &url, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::token::MemoryTokenCache;
    use crate::models::Filter;
    use crate::utils::StubTransport;

    const REST_FIXTURE: &str = r#"{
        "info": { "total": 42, "did_u_mean": "moon landings" },
        "docs": [
            { "pnx": {
                "control": { "recordid": ["TN_doc_one"] },
                "display": {
                    "title": ["The <span class=\"searchword\">moon</span> landing"],
                    "type": ["article"],
                    "creator": ["Armstrong, Neil", "Aldrin, Buzz"],
                    "subject": ["Space flight"],
                    "description": ["<P>An account.<p>With details."],
                    "language": ["eng"],
                    "publisher": ["NASA Press"],
                    "lds50": ["peer_reviewed"],
                    "cites": ["12345"],
                    "citedby": ["cdi_67890"]
                },
                "search": { "issn": ["0028-0836"] },
                "addata": {
                    "issn": ["00280836"],
                    "eissn": ["1476-4687"],
                    "jtitle": ["Nature"],
                    "volume": ["224"]
                }
            }},
            { "pnx": {
                "control": { "recordid": ["TN_doc_two"] },
                "display": { "title": ["Second document"] }
            }}
        ],
        "facets": [
            { "name": "creationdate", "values": [
                { "value": "1969", "count": 7 },
                { "value": "1970", "count": 3 }
            ]}
        ]
    }"#;

    fn connector(stub: Arc<StubTransport>) -> RestConnector {
        let config = RestConfig {
            search_url: "http://primo.example.org/pnxs".into(),
            jwt_url: "http://primo.example.org/guestJwt/{{INSTCODE}}".into(),
            institution: "MEMBER".into(),
            lang: "en_US".into(),
            search_cdi: false,
            api_key: None,
        };
        RestConnector::new(&config, stub, None, Arc::new(MemoryTokenCache::default()))
    }

    fn term(index: &str, lookfor: &str) -> SearchTerm {
        SearchTerm {
            index: index.to_string(),
            term: lookfor.to_string(),
            operator: None,
        }
    }

    fn push_jwt(stub: &StubTransport, token: &str) {
        stub.push_response(200, &format!("\"{}\"", token));
    }

    #[tokio::test]
    async fn test_empty_search_short_circuits_without_http() {
        let stub = Arc::new(StubTransport::new());
        let connector = connector(stub.clone());

        let response = connector
            .query("MEMBER", &[], &SearchArgs::default())
            .await
            .unwrap();

        assert_eq!(response.error.as_deref(), Some("empty_search_disallowed"));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn test_filters_alone_are_a_usable_search() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        let args = SearchArgs {
            filter_list: vec![Filter::new("rtype", FilterOp::And, vec!["books".into()])],
            ..Default::default()
        };
        let response = connector.query("MEMBER", &[], &args).await.unwrap();

        assert_eq!(response.record_count, 42);
        let url = stub.requests().last().unwrap().clone();
        assert!(!url.contains("q="), "unexpected q in url: {}", url);
        assert!(
            url.contains(&format!(
                "qInclude={}",
                urlencoding::encode("facet_rtype,exact,books")
            )),
            "unexpected url: {}",
            url
        );
    }

    #[tokio::test]
    async fn test_unknown_handler_defaults_to_any() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        connector
            .query(
                "MEMBER",
                &[term("CallNumber", "QA76")],
                &SearchArgs::default(),
            )
            .await
            .unwrap();

        let url = stub.requests().last().unwrap().clone();
        assert!(
            url.contains(&format!("q={}", urlencoding::encode("any,contains,QA76"))),
            "unexpected url: {}",
            url
        );
    }

    #[tokio::test]
    async fn test_pagination_yields_zero_based_offset_and_clamped_limit() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        push_jwt(&stub, "tok2");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        let args = SearchArgs {
            page_number: 3,
            limit: 20,
            ..Default::default()
        };
        connector
            .query("MEMBER", &[term("AllFields", "moon")], &args)
            .await
            .unwrap();
        let url = stub.requests()[1].clone();
        assert!(url.contains("offset=40"), "unexpected url: {}", url);
        assert!(url.contains("limit=20"), "unexpected url: {}", url);

        // a zero page size is clamped rather than rejected
        let args = SearchArgs {
            page_number: 1,
            limit: 0,
            sort: Some("unmapped".into()),
            ..Default::default()
        };
        connector
            .query("OTHER", &[term("AllFields", "moon")], &args)
            .await
            .unwrap();
        let url = stub.requests().last().unwrap().clone();
        assert!(url.contains("offset=0"), "unexpected url: {}", url);
        assert!(url.contains("limit=1"), "unexpected url: {}", url);
    }

    #[tokio::test]
    async fn test_sort_alias_mapping() {
        let stub = Arc::new(StubTransport::new());
        let connector = connector(stub.clone());

        for (sort, expected) in [
            (Some("scdate"), Some("sort=date")),
            (Some("screator"), Some("sort=author")),
            (Some("stitle"), Some("sort=title")),
            (Some("relevance"), None),
            (None, None),
        ] {
            push_jwt(&stub, "tok");
            stub.push_response(200, REST_FIXTURE);
            let args = SearchArgs {
                sort: sort.map(str::to_string),
                ..Default::default()
            };
            // a different institution per case avoids the token cache
            // eliding the queued JWT response
            let inst = format!("INST{}", sort.unwrap_or("none"));
            connector
                .query(&inst, &[term("AllFields", "moon")], &args)
                .await
                .unwrap();
            let url = stub.requests().last().unwrap().clone();
            match expected {
                Some(fragment) => {
                    assert!(url.contains(fragment), "expected {} in {}", fragment, url)
                }
                None => assert!(!url.contains("sort="), "unexpected sort in {}", url),
            }
        }
    }

    #[tokio::test]
    async fn test_or_filters_use_multi_facets() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        let args = SearchArgs {
            filter_list: vec![
                Filter::new("lang", FilterOp::Or, vec!["eng".into(), "ger".into()]),
                Filter::new("tlevel", FilterOp::Not, vec!["online".into()]),
            ],
            ..Default::default()
        };
        connector
            .query("MEMBER", &[term("AllFields", "moon")], &args)
            .await
            .unwrap();

        let url = stub.requests().last().unwrap().clone();
        assert!(
            url.contains(&format!(
                "multiFacets={}",
                urlencoding::encode("facet_lang,include,eng|,|facet_lang,include,ger")
            )),
            "unexpected url: {}",
            url
        );
        assert!(
            url.contains(&format!(
                "qExclude={}",
                urlencoding::encode("facet_tlevel,exact,online")
            )),
            "unexpected url: {}",
            url
        );
    }

    #[tokio::test]
    async fn test_token_is_reused_across_calls() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        connector
            .query("MEMBER", &[term("AllFields", "moon")], &SearchArgs::default())
            .await
            .unwrap();
        connector
            .query("MEMBER", &[term("AllFields", "cats")], &SearchArgs::default())
            .await
            .unwrap();

        assert_eq!(stub.requests_matching("guestJwt"), 1);
        assert_eq!(stub.request_count(), 3);
    }

    #[tokio::test]
    async fn test_forbidden_renews_token_and_retries_once() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "stale");
        stub.push_response(403, "token expired");
        push_jwt(&stub, "fresh");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        let response = connector
            .query("MEMBER", &[term("AllFields", "moon")], &SearchArgs::default())
            .await
            .unwrap();

        assert_eq!(response.record_count, 42);
        // exactly two search attempts and two token fetches
        assert_eq!(stub.request_count(), 4);
        assert_eq!(stub.requests_matching("guestJwt"), 2);
    }

    #[tokio::test]
    async fn test_second_forbidden_propagates() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "stale");
        stub.push_response(403, "denied");
        push_jwt(&stub, "fresh");
        stub.push_response(403, "denied again");
        let connector = connector(stub.clone());

        let result = connector
            .query("MEMBER", &[term("AllFields", "moon")], &SearchArgs::default())
            .await;

        assert!(matches!(result, Err(ConnectorError::Auth(_))));
        assert_eq!(stub.request_count(), 4);
    }

    #[tokio::test]
    async fn test_jwt_endpoint_failure_is_an_auth_error() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(500, "boom");
        let connector = connector(stub);

        let result = connector
            .query("MEMBER", &[term("AllFields", "moon")], &SearchArgs::default())
            .await;
        assert!(matches!(result, Err(ConnectorError::Auth(_))));
    }

    #[tokio::test]
    async fn test_jwt_url_substitutes_institution_code() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        connector
            .query(
                "MY MEMBER",
                &[term("AllFields", "moon")],
                &SearchArgs::default(),
            )
            .await
            .unwrap();

        assert!(stub.requests()[0].ends_with("/guestJwt/MY%20MEMBER"));
    }

    #[tokio::test]
    async fn test_api_key_skips_the_jwt_dance() {
        let stub = Arc::new(StubTransport::new());
        stub.push_response(200, REST_FIXTURE);
        let config = RestConfig {
            search_url: "http://primo.example.org/pnxs".into(),
            jwt_url: "http://primo.example.org/guestJwt/{{INSTCODE}}".into(),
            institution: "MEMBER".into(),
            lang: "en_US".into(),
            search_cdi: false,
            api_key: Some("secret".into()),
        };
        let connector = RestConnector::new(
            &config,
            stub.clone(),
            None,
            Arc::new(MemoryTokenCache::default()),
        );

        connector
            .query("MEMBER", &[term("AllFields", "moon")], &SearchArgs::default())
            .await
            .unwrap();

        assert_eq!(stub.requests_matching("guestJwt"), 0);
        assert_eq!(stub.request_count(), 1);
    }

    #[tokio::test]
    async fn test_process_response_maps_documents() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub);

        let args = SearchArgs {
            highlight: true,
            highlight_start: "<b>".into(),
            highlight_end: "</b>".into(),
            ..Default::default()
        };
        let response = connector
            .query("MEMBER", &[term("AllFields", "moon")], &args)
            .await
            .unwrap();

        assert_eq!(response.record_count, 42);
        assert_eq!(response.documents.len(), 2);
        assert_eq!(response.did_you_mean, ["moon landings"]);

        let first = &response.documents[0];
        assert_eq!(first.record_id, "doc_one");
        assert_eq!(first.title, "The moon landing");
        assert_eq!(
            first.highlight_details.get("title").map(Vec::as_slice),
            Some(&["The <b>moon</b> landing".to_string()][..])
        );
        assert_eq!(first.creator, ["Armstrong, Neil", "Aldrin, Buzz"]);
        assert!(first.peer_reviewed);
        assert_eq!(first.container_title, "Nature");
        assert_eq!(first.description, "An account.<br>With details.");
        assert_eq!(first.issn, ["0028-0836", "1476-4687"]);
        // the prefix is added where missing and never doubled
        assert_eq!(first.cites, ["cdi_12345"]);
        assert_eq!(first.cited_by, ["cdi_67890"]);

        assert_eq!(response.documents[1].record_id, "doc_two");
    }

    #[tokio::test]
    async fn test_selected_facet_values_sort_first() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub);

        let args = SearchArgs {
            filter_list: vec![Filter::new(
                "creationdate",
                FilterOp::And,
                vec!["1971".into()],
            )],
            ..Default::default()
        };
        let response = connector
            .query("MEMBER", &[term("AllFields", "moon")], &args)
            .await
            .unwrap();

        let values = response.facets.get("creationdate").unwrap();
        assert_eq!(values[0].value, "1971");
        assert_eq!(values[0].count, None);
        assert_eq!(values[1].value, "1969");
        assert_eq!(values[2].value, "1970");
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_parse_error() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, "not json");
        let connector = connector(stub);

        let result = connector
            .query("MEMBER", &[term("AllFields", "moon")], &SearchArgs::default())
            .await;
        assert!(matches!(result, Err(ConnectorError::Parse(_))));
    }

    #[tokio::test]
    async fn test_get_record_quotes_the_id() {
        let stub = Arc::new(StubTransport::new());
        push_jwt(&stub, "tok");
        stub.push_response(200, REST_FIXTURE);
        let connector = connector(stub.clone());

        connector.get_record("doc_one", None, false).await.unwrap();

        let url = stub.requests().last().unwrap().clone();
        assert!(
            url.contains(&format!(
                "q={}",
                urlencoding::encode("rid,contains,\"doc_one\"")
            )),
            "unexpected url: {}",
            url
        );
        assert!(url.contains("pcAvailability=true"), "unexpected url: {}", url);
        assert!(url.contains("limit=1"), "unexpected url: {}", url);
    }

    #[tokio::test]
    async fn test_get_records_is_not_implemented() {
        let stub = Arc::new(StubTransport::new());
        let connector = connector(stub);

        let result = connector
            .get_records(&["a".to_string()], None, false)
            .await;
        assert!(matches!(result, Err(ConnectorError::NotImplemented)));
    }
}
