//! Solr adapter against a mocked HTTP endpoint

use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server};
use oai_index_sync::search::*;
use serde_json::json;

const MAPPING: &str = r#"{"fields": [{"name": "identifier", "type": "string"}]}"#;

fn backend(server: &Server) -> SolrBackend {
    SolrBackend::new(&format!("{}/solr", server.url()), 5).unwrap()
}

fn core_action(action: &str, key: &str, name: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("action".into(), action.into()),
        Matcher::UrlEncoded(key.into(), name.into()),
    ])
}

#[tokio::test]
async fn test_create_core_outcomes() {
    let mut server = Server::new_async().await;
    let created = server
        .mock("GET", "/solr/admin/cores")
        .match_query(core_action("CREATE", "name", "items2"))
        .with_status(200)
        .with_body(r#"{"responseHeader":{"status":0},"core":"items2"}"#)
        .create_async()
        .await;
    let schema = server
        .mock("POST", "/solr/items2/schema")
        .match_body(Matcher::Json(json!({
            "add-field": [{ "name": "identifier", "type": "string" }]
        })))
        .with_status(200)
        .with_body(r#"{"responseHeader":{"status":0}}"#)
        .create_async()
        .await;
    let exists = server
        .mock("GET", "/solr/admin/cores")
        .match_query(core_action("CREATE", "name", "items3"))
        .with_status(400)
        .with_body(r#"{"error":{"msg":"Core with name 'items3' already exists."}}"#)
        .create_async()
        .await;
    let bare_core = server
        .mock("GET", "/solr/admin/cores")
        .match_query(core_action("CREATE", "name", "items4"))
        .with_status(200)
        .with_body(r#"{"responseHeader":{"status":0},"core":"items4"}"#)
        .create_async()
        .await;
    let rejected = server
        .mock("POST", "/solr/items4/schema")
        .with_status(400)
        .with_body(r#"{"errors":[{"errorMessages":["Field 'identifier' already exists."]}]}"#)
        .create_async()
        .await;

    let solr = backend(&server);
    assert!(solr.create_index("items2", MAPPING).await.unwrap());
    assert!(solr.create_index("items3", MAPPING).await.unwrap());
    assert!(!solr.create_index("items4", MAPPING).await.unwrap());
    // No request is made for a mapping without fields.
    assert!(!solr.create_index("items5", r#"{"mappings": {}}"#).await.unwrap());

    created.assert_async().await;
    schema.assert_async().await;
    exists.assert_async().await;
    bare_core.assert_async().await;
    rejected.assert_async().await;
}

#[tokio::test]
async fn test_delete_checks_existence_first() {
    let mut server = Server::new_async().await;
    let absent = server
        .mock("GET", "/solr/items1/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("rows".into(), "0".into()),
            Matcher::UrlEncoded("fq".into(), r#"id:"oai:x:2""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"response":{"numFound":0,"docs":[]}}"#)
        .create_async()
        .await;
    let present = server
        .mock("GET", "/solr/items1/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("rows".into(), "0".into()),
            Matcher::UrlEncoded("fq".into(), r#"id:"oai:x:1""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"response":{"numFound":1,"docs":[]}}"#)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/solr/items1/update")
        .match_query(Matcher::UrlEncoded("commitWithin".into(), "1000".into()))
        .match_body(Matcher::Json(json!({ "delete": { "id": "oai:x:1" } })))
        .with_status(200)
        .with_body(r#"{"responseHeader":{"status":0}}"#)
        .expect(1)
        .create_async()
        .await;

    let solr = backend(&server);
    assert!(solr.delete("items1", "oai:x:2").await.unwrap_err().is_not_found());
    solr.delete("items1", "oai:x:1").await.unwrap();

    absent.assert_async().await;
    present.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn test_query_after_key_reports_unpaginated_total() {
    let mut server = Server::new_async().await;
    let after = SortKey::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), "oai:x:1");
    let after_fq = "datestamp:{2024-01-01T00:00:00.000Z TO *] OR \
                    (datestamp:\"2024-01-01T00:00:00.000Z\" AND identifier:{\"oai:x:1\" TO *])";

    let page = server
        .mock("GET", "/solr/items/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("rows".into(), "2".into()),
            Matcher::UrlEncoded("sort".into(), "datestamp asc,identifier asc".into()),
            Matcher::UrlEncoded("fq".into(), r#"formats:"oai_dc""#.into()),
            Matcher::UrlEncoded("fq".into(), after_fq.into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "response": {
                    "numFound": 3,
                    "docs": [
                        { "identifier": "oai:x:2", "datestamp": "2024-01-02T00:00:00Z" },
                        { "identifier": "oai:x:3", "datestamp": "2024-01-02T00:00:00Z" }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    let total = server
        .mock("GET", "/solr/items/select")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("rows".into(), "0".into()),
            Matcher::UrlEncoded("fq".into(), r#"formats:"oai_dc""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"response":{"numFound":7,"docs":[]}}"#)
        .create_async()
        .await;

    let solr = backend(&server);
    let result = solr
        .query("items", &QueryFilter::default().with_format("oai_dc"), 2, Some(&after))
        .await
        .unwrap();

    assert_eq!(result.total, 7);
    assert_eq!(result.ids(), vec!["oai:x:2".to_string(), "oai:x:3".to_string()]);
    assert_eq!(
        result.last_key().unwrap().datestamp,
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    );
    page.assert_async().await;
    total.assert_async().await;
}

#[tokio::test]
async fn test_list_cores_by_prefix() {
    let mut server = Server::new_async().await;
    let status = server
        .mock("GET", "/solr/admin/cores")
        .match_query(Matcher::UrlEncoded("action".into(), "STATUS".into()))
        .with_status(200)
        .with_body(r#"{"status":{"items7":{},"items12":{},"authors1":{}}}"#)
        .create_async()
        .await;

    let solr = backend(&server);
    assert_eq!(
        solr.list_indices("items").await.unwrap(),
        vec!["items12".to_string(), "items7".to_string()]
    );
    status.assert_async().await;
}

#[tokio::test]
async fn test_missing_core_is_not_found() {
    let mut server = Server::new_async().await;
    let unload = server
        .mock("GET", "/solr/admin/cores")
        .match_query(core_action("UNLOAD", "core", "items9"))
        .with_status(400)
        .with_body(r#"{"error":{"msg":"Cannot unload non-existent core [items9]"}}"#)
        .create_async()
        .await;
    let select = server
        .mock("GET", "/solr/items9/select")
        .with_status(404)
        .create_async()
        .await;
    let broken = server
        .mock("GET", "/solr/items1/select")
        .with_status(500)
        .with_body("server error")
        .create_async()
        .await;

    let solr = backend(&server);
    assert!(solr.drop_index("items9").await.unwrap_err().is_not_found());
    assert!(solr.count("items9").await.unwrap_err().is_not_found());
    assert!(matches!(
        solr.count("items1").await,
        Err(SearchError::Transport(_))
    ));

    unload.assert_async().await;
    select.assert_async().await;
    broken.assert_async().await;
}
