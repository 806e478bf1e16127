//! Solr-compatible adapter over the core admin, schema, update and select APIs.
//!
//! Solr cores have no atomic alias primitive here, so `resolve_alias` and
//! `swap_alias` report [`SearchError::Unsupported`].

use super::IndexBackend;
use crate::search::config::BackendKind;
use crate::search::cursor::SortKey;
use crate::search::document::ItemDocument;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::{QueryFilter, QueryPage};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const BACKEND: &str = "solr";

/// Commit window for single-document writes (milliseconds)
const COMMIT_WITHIN_MS: &str = "1000";

#[derive(Clone)]
pub struct SolrBackend {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    response: SelectResponse,
}

#[derive(Debug, Deserialize)]
struct SelectResponse {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<SolrHit>,
}

#[derive(Debug, Deserialize)]
struct SolrHit {
    identifier: String,
    datestamp: String,
}

#[derive(Debug, Deserialize)]
struct CoreStatusBody {
    #[serde(default)]
    status: HashMap<String, Value>,
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn solr_date(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SolrBackend {
    pub fn new(url: &str, timeout_secs: u64) -> SearchResult<Self> {
        let base_url = Url::parse(url).map_err(|e| {
            SearchError::InvalidConfiguration(format!("Invalid Solr URL {}: {}", url, e))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                SearchError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> SearchResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                SearchError::InvalidConfiguration(format!(
                    "Solr URL cannot be a base: {}",
                    self.base_url
                ))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    async fn check(response: Response, context: &str) -> SearchResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND || body.contains("non-existent core") {
            Err(SearchError::NotFound(context.to_string()))
        } else {
            Err(SearchError::Transport(format!(
                "{} returned status {}: {}",
                context, status, body
            )))
        }
    }

    pub(crate) fn filter_queries(filter: &QueryFilter, after: Option<&SortKey>) -> Vec<String> {
        let mut fqs = vec![format!(
            "datestamp:[{} TO {}]",
            solr_date(&filter.from),
            solr_date(&filter.until)
        )];
        if let Some(ref set) = filter.set {
            fqs.push(format!("sets:{}", quote(set)));
        }
        if let Some(ref format) = filter.format {
            fqs.push(format!("formats:{}", quote(format)));
        }
        if let Some(key) = after {
            let date = solr_date(&key.datestamp);
            fqs.push(format!(
                "datestamp:{{{date} TO *] OR (datestamp:{exact} AND identifier:{{{id} TO *])",
                date = date,
                exact = quote(&date),
                id = quote(&key.identifier),
            ));
        }
        fqs
    }

    async fn select(
        &self,
        index: &str,
        fqs: &[String],
        rows: usize,
    ) -> SearchResult<SelectResponse> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", "*:*".to_string()),
            ("rows", rows.to_string()),
            ("fl", "identifier,datestamp".to_string()),
            ("sort", "datestamp asc,identifier asc".to_string()),
            ("wt", "json".to_string()),
        ];
        params.extend(fqs.iter().map(|fq| ("fq", fq.clone())));

        let response = self
            .client
            .get(self.endpoint(&[index, "select"])?)
            .query(&params)
            .send()
            .await?;
        let response = Self::check(response, &format!("core {}", index)).await?;
        let body: SelectBody = response.json().await?;
        Ok(body.response)
    }

    async fn update(&self, index: &str, body: Value, commit: bool) -> SearchResult<()> {
        let param = if commit {
            ("commit", "true")
        } else {
            ("commitWithin", COMMIT_WITHIN_MS)
        };
        let response = self
            .client
            .post(self.endpoint(&[index, "update"])?)
            .query(&[param])
            .json(&body)
            .send()
            .await?;
        Self::check(response, &format!("core {}", index)).await?;
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for SolrBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Solr
    }

    async fn create_index(&self, name: &str, mapping: &str) -> SearchResult<bool> {
        let fields = match serde_json::from_str::<Value>(mapping) {
            Ok(value) => value.get("fields").cloned(),
            Err(_) => None,
        };
        let Some(fields) = fields else {
            warn!(core = %name, "Solr mapping has no 'fields' array");
            return Ok(false);
        };

        let response = self
            .client
            .get(self.endpoint(&["admin", "cores"])?)
            .query(&[
                ("action", "CREATE"),
                ("name", name),
                ("configSet", "_default"),
                ("wt", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("already exists") {
                debug!(core = %name, "Core already exists");
                return Ok(true);
            }
            return Err(SearchError::Transport(format!(
                "create core {} returned status {}: {}",
                name, status, body
            )));
        }

        let response = self
            .client
            .post(self.endpoint(&[name, "schema"])?)
            .json(&json!({ "add-field": fields }))
            .send()
            .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(core = %name, body = %body, "Solr schema rejected");
            return Ok(false);
        }

        info!(core = %name, "Core created");
        Ok(true)
    }

    async fn drop_index(&self, name: &str) -> SearchResult<()> {
        let response = self
            .client
            .get(self.endpoint(&["admin", "cores"])?)
            .query(&[
                ("action", "UNLOAD"),
                ("core", name),
                ("deleteIndex", "true"),
                ("wt", "json"),
            ])
            .send()
            .await?;
        Self::check(response, &format!("core {}", name)).await?;
        info!(core = %name, "Core unloaded");
        Ok(())
    }

    async fn refresh(&self, name: &str) -> SearchResult<()> {
        self.update(name, json!({ "commit": {} }), true).await
    }

    async fn upsert(&self, index: &str, doc_id: &str, doc: &ItemDocument) -> SearchResult<()> {
        self.update(index, json!([doc.to_solr_doc()]), false).await?;
        debug!(core = %index, doc_id = %doc_id, "Document upserted");
        Ok(())
    }

    async fn delete(&self, index: &str, doc_id: &str) -> SearchResult<()> {
        // Solr acknowledges deletes of absent ids, so check existence first.
        let existing = self
            .select(index, &[format!("id:{}", quote(doc_id))], 0)
            .await?;
        if existing.num_found == 0 {
            return Err(SearchError::NotFound(format!(
                "document {} in {}",
                doc_id, index
            )));
        }

        self.update(index, json!({ "delete": { "id": doc_id } }), false)
            .await?;
        debug!(core = %index, doc_id = %doc_id, "Document deleted");
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        filter: &QueryFilter,
        page_size: usize,
        after: Option<&SortKey>,
    ) -> SearchResult<QueryPage> {
        let page = self
            .select(index, &Self::filter_queries(filter, after), page_size)
            .await?;

        // The after-key filter narrows numFound; report the unpaginated total.
        let total = if after.is_some() {
            self.select(index, &Self::filter_queries(filter, None), 0)
                .await?
                .num_found
        } else {
            page.num_found
        };

        let hits = page
            .docs
            .into_iter()
            .map(|hit| {
                let datestamp = DateTime::parse_from_rfc3339(&hit.datestamp)
                    .map_err(|e| {
                        SearchError::Transport(format!(
                            "Malformed datestamp {}: {}",
                            hit.datestamp, e
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(SortKey::new(datestamp, hit.identifier))
            })
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(QueryPage { hits, total })
    }

    async fn count(&self, index: &str) -> SearchResult<u64> {
        Ok(self.select(index, &[], 0).await?.num_found)
    }

    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint(&["admin", "cores"])?)
            .query(&[("action", "STATUS"), ("wt", "json")])
            .send()
            .await?;
        let response = Self::check(response, "core status").await?;
        let body: CoreStatusBody = response.json().await?;

        let mut names: Vec<String> = body
            .status
            .into_keys()
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn resolve_alias(&self, _alias: &str) -> SearchResult<Option<String>> {
        Err(SearchError::Unsupported {
            backend: BACKEND,
            operation: "resolve_alias",
        })
    }

    async fn swap_alias(&self, _alias: &str, _from: Option<&str>, _to: &str) -> SearchResult<()> {
        Err(SearchError::Unsupported {
            backend: BACKEND,
            operation: "swap_alias",
        })
    }
}
