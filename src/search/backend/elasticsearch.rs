//! Elasticsearch-compatible REST adapter

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

#[derive(Clone)]
pub struct ElasticsearchBackend {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: TotalHits,
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    sort: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

impl ElasticsearchBackend {
    pub fn new(url: &str, timeout_secs: u64) -> SearchResult<Self> {
        let base_url = Url::parse(url).map_err(|e| {
            SearchError::InvalidConfiguration(format!("Invalid Elasticsearch URL {}: {}", url, e))
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
                    "Elasticsearch URL cannot be a base: {}",
                    self.base_url
                ))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// Map 404 to `NotFound` and every other non-2xx status to `Transport`
    async fn check(response: Response, context: &str) -> SearchResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            Err(SearchError::NotFound(context.to_string()))
        } else {
            Err(SearchError::Transport(format!(
                "{} returned status {}: {}",
                context, status, body
            )))
        }
    }

    fn filter_clauses(filter: &QueryFilter) -> Vec<Value> {
        let mut clauses = vec![json!({
            "range": {
                "datestamp": {
                    "gte": filter.from.to_rfc3339_opts(SecondsFormat::Millis, true),
                    "lte": filter.until.to_rfc3339_opts(SecondsFormat::Millis, true),
                }
            }
        })];
        if let Some(ref set) = filter.set {
            clauses.push(json!({ "term": { "sets": set } }));
        }
        if let Some(ref format) = filter.format {
            clauses.push(json!({ "term": { "formats": format } }));
        }
        clauses
    }

    pub(crate) fn search_body(
        filter: &QueryFilter,
        page_size: usize,
        after: Option<&SortKey>,
    ) -> Value {
        let mut body = json!({
            "size": page_size,
            "track_total_hits": true,
            "_source": false,
            "query": { "bool": { "filter": Self::filter_clauses(filter) } },
            "sort": [ { "datestamp": "asc" }, { "identifier": "asc" } ],
        });
        if let Some(key) = after {
            body["search_after"] = json!([key.datestamp.timestamp_millis(), key.identifier]);
        }
        body
    }

    fn hit_to_key(hit: &Hit) -> SearchResult<SortKey> {
        let millis = hit.sort.first().and_then(Value::as_i64);
        let identifier = hit.sort.get(1).and_then(Value::as_str);
        match (millis, identifier) {
            (Some(millis), Some(identifier)) => {
                let datestamp = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                    SearchError::Transport(format!("Sort value out of range: {}", millis))
                })?;
                Ok(SortKey::new(datestamp, identifier))
            }
            _ => Err(SearchError::Transport(format!(
                "Malformed sort values in hit: {:?}",
                hit.sort
            ))),
        }
    }
}

#[async_trait]
impl IndexBackend for ElasticsearchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Elasticsearch
    }

    async fn create_index(&self, name: &str, mapping: &str) -> SearchResult<bool> {
        let response = self
            .client
            .put(self.endpoint(&[name])?)
            .header("Content-Type", "application/json")
            .body(mapping.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(index = %name, "Index created");
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            let error_type = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["type"].as_str().map(str::to_string));
            if error_type.as_deref() == Some("resource_already_exists_exception") {
                debug!(index = %name, "Index already exists");
                return Ok(true);
            }
            warn!(index = %name, status = %status, body = %body, "Index mapping rejected");
            return Ok(false);
        }

        Err(SearchError::Transport(format!(
            "create index {} returned status {}: {}",
            name, status, body
        )))
    }

    async fn drop_index(&self, name: &str) -> SearchResult<()> {
        let response = self.client.delete(self.endpoint(&[name])?).send().await?;
        Self::check(response, &format!("index {}", name)).await?;
        info!(index = %name, "Index dropped");
        Ok(())
    }

    async fn refresh(&self, name: &str) -> SearchResult<()> {
        let response = self
            .client
            .post(self.endpoint(&[name, "_refresh"])?)
            .send()
            .await?;
        Self::check(response, &format!("index {}", name)).await?;
        Ok(())
    }

    async fn upsert(&self, index: &str, doc_id: &str, doc: &ItemDocument) -> SearchResult<()> {
        let response = self
            .client
            .put(self.endpoint(&[index, "_doc", doc_id])?)
            .json(&doc.to_elasticsearch_source())
            .send()
            .await?;
        Self::check(response, &format!("index {}", index)).await?;
        debug!(index = %index, doc_id = %doc_id, "Document upserted");
        Ok(())
    }

    async fn delete(&self, index: &str, doc_id: &str) -> SearchResult<()> {
        let response = self
            .client
            .delete(self.endpoint(&[index, "_doc", doc_id])?)
            .send()
            .await?;
        Self::check(response, &format!("document {} in {}", doc_id, index)).await?;
        debug!(index = %index, doc_id = %doc_id, "Document deleted");
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        filter: &QueryFilter,
        page_size: usize,
        after: Option<&SortKey>,
    ) -> SearchResult<QueryPage> {
        let response = self
            .client
            .post(self.endpoint(&[index, "_search"])?)
            .json(&Self::search_body(filter, page_size, after))
            .send()
            .await?;
        let response = Self::check(response, &format!("index {}", index)).await?;

        let body: SearchBody = response.json().await?;
        let hits = body
            .hits
            .hits
            .iter()
            .map(Self::hit_to_key)
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(QueryPage {
            hits,
            total: body.hits.total.value,
        })
    }

    async fn count(&self, index: &str) -> SearchResult<u64> {
        let response = self
            .client
            .get(self.endpoint(&[index, "_count"])?)
            .send()
            .await?;
        let response = Self::check(response, &format!("index {}", index)).await?;
        let body: CountBody = response.json().await?;
        Ok(body.count)
    }

    async fn list_indices(&self, prefix: &str) -> SearchResult<Vec<String>> {
        let pattern = format!("{}*", prefix);
        let response = self
            .client
            .get(self.endpoint(&["_cat", "indices", &pattern])?)
            .query(&[("format", "json"), ("h", "index")])
            .send()
            .await?;

        let response = match Self::check(response, &format!("indices {}", pattern)).await {
            Ok(response) => response,
            Err(SearchError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let rows: Vec<CatIndex> = response.json().await?;
        let mut names: Vec<String> = rows.into_iter().map(|row| row.index).collect();
        names.sort();
        Ok(names)
    }

    async fn resolve_alias(&self, alias: &str) -> SearchResult<Option<String>> {
        let response = self
            .client
            .get(self.endpoint(&["_alias", alias])?)
            .send()
            .await?;

        let response = match Self::check(response, &format!("alias {}", alias)).await {
            Ok(response) => response,
            Err(SearchError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let body: HashMap<String, Value> = response.json().await?;
        let mut indices: Vec<String> = body.into_keys().collect();
        indices.sort();
        if indices.len() > 1 {
            warn!(alias = %alias, indices = ?indices, "Alias points at more than one index");
        }
        Ok(indices.pop())
    }

    async fn swap_alias(&self, alias: &str, from: Option<&str>, to: &str) -> SearchResult<()> {
        let mut actions = Vec::new();
        if let Some(from) = from {
            actions.push(json!({ "remove": { "index": from, "alias": alias } }));
        }
        actions.push(json!({ "add": { "index": to, "alias": alias } }));

        let response = self
            .client
            .post(self.endpoint(&["_aliases"])?)
            .json(&json!({ "actions": actions }))
            .send()
            .await?;
        Self::check(response, &format!("alias {}", alias)).await?;

        info!(alias = %alias, from = ?from, to = %to, "Alias repointed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_search_body_includes_search_after() {
        let ts = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let key = SortKey::new(ts, "oai:x:9");
        let filter = QueryFilter::default().with_set("maths").with_format("oai_dc");

        let body = ElasticsearchBackend::search_body(&filter, 25, Some(&key));

        assert_eq!(body["size"], 25);
        assert_eq!(body["search_after"][0], ts.timestamp_millis());
        assert_eq!(body["search_after"][1], "oai:x:9");
        assert_eq!(body["query"]["bool"]["filter"].as_array().unwrap().len(), 3);
        assert_eq!(body["sort"][1]["identifier"], "asc");
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let backend = ElasticsearchBackend::new("http://localhost:9200/", 5).unwrap();
        let url = backend.endpoint(&["items3", "_doc", "oai:x:1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/items3/_doc/oai:x:1");
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(ElasticsearchBackend::new("not a url", 5).is_err());
    }
}
