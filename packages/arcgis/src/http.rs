//! `ArcGIS` `MapServer` / `FeatureServer` query endpoint over HTTP.
//!
//! Identifier pages use `returnIdsOnly=true&f=json`; feature chunks use
//! `objectIds=...&returnGeometry=true&f=geojson` so the response is already
//! a standard `GeoJSON` `FeatureCollection`.

use async_trait::async_trait;
use tree_zones_arcgis_models::PaginationConfig;
use tree_zones_models::ObjectId;

use crate::{ArcGisError, GeodataService, retry};

const USER_AGENT: &str = concat!("tree_zones/", env!("CARGO_PKG_VERSION"));

/// [`GeodataService`] backed by an `ArcGIS` layer query URL.
pub struct ArcGisHttpService {
    client: reqwest::Client,
    query_url: String,
    max_retries: u32,
}

impl ArcGisHttpService {
    /// Creates a client for `query_url` (up to `.../query`) with the
    /// timeout and retry settings from `pagination`.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the HTTP client cannot be built.
    pub fn new(
        query_url: impl Into<String>,
        pagination: &PaginationConfig,
    ) -> Result<Self, ArcGisError> {
        let client = reqwest::Client::builder()
            .timeout(pagination.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            query_url: query_url.into(),
            max_retries: pagination.max_retries,
        })
    }

    #[must_use]
    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

#[async_trait]
impl GeodataService for ArcGisHttpService {
    async fn query_ids(
        &self,
        where_clause: &str,
        offset: u64,
        record_count: usize,
    ) -> Result<Vec<ObjectId>, ArcGisError> {
        let params = id_query_params(where_clause, offset, record_count);
        let body = retry::send_json(
            || self.client.get(&self.query_url).query(&params),
            self.max_retries,
        )
        .await?;

        parse_id_page(&body)
    }

    async fn query_features(
        &self,
        ids: &[ObjectId],
        out_fields: &str,
    ) -> Result<Vec<serde_json::Value>, ArcGisError> {
        let params = feature_query_params(ids, out_fields);
        let body = retry::send_json(
            || self.client.get(&self.query_url).query(&params),
            self.max_retries,
        )
        .await?;

        parse_feature_page(body)
    }
}

/// Query parameters for one page of identifiers.
#[must_use]
pub fn id_query_params(
    where_clause: &str,
    offset: u64,
    record_count: usize,
) -> Vec<(&'static str, String)> {
    vec![
        ("where", where_clause.to_string()),
        ("returnIdsOnly", "true".to_string()),
        ("f", "json".to_string()),
        ("resultOffset", offset.to_string()),
        ("resultRecordCount", record_count.to_string()),
    ]
}

/// Query parameters for the full features of one identifier chunk.
#[must_use]
pub fn feature_query_params(ids: &[ObjectId], out_fields: &str) -> Vec<(&'static str, String)> {
    vec![
        ("objectIds", join_ids(ids)),
        ("outFields", out_fields.to_string()),
        ("returnGeometry", "true".to_string()),
        ("f", "geojson".to_string()),
    ]
}

/// Comma-joins identifiers for the `objectIds` parameter.
#[must_use]
pub fn join_ids(ids: &[ObjectId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a `returnIdsOnly` response.
///
/// A missing or `null` `objectIds` means no (more) identifiers.
///
/// # Errors
///
/// Returns [`ArcGisError::MalformedResponse`] for an `ArcGIS` error body
/// (sent with HTTP 200) or an `objectIds` value that is not a list of
/// integers.
pub fn parse_id_page(body: &serde_json::Value) -> Result<Vec<ObjectId>, ArcGisError> {
    check_api_error(body)?;

    match body.get("objectIds") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(ids)) => ids
            .iter()
            .map(|id| {
                id.as_i64().map(ObjectId).ok_or_else(|| {
                    ArcGisError::malformed(format!("object ID {id} is not an integer"))
                })
            })
            .collect(),
        Some(other) => Err(ArcGisError::malformed(format!(
            "objectIds is not an array: {other}"
        ))),
    }
}

/// Parses an `f=geojson` feature response into its features.
///
/// # Errors
///
/// Returns [`ArcGisError::MalformedResponse`] for an `ArcGIS` error body or
/// a body without a `features` array.
pub fn parse_feature_page(
    mut body: serde_json::Value,
) -> Result<Vec<serde_json::Value>, ArcGisError> {
    check_api_error(&body)?;

    match body.get_mut("features").map(serde_json::Value::take) {
        Some(serde_json::Value::Array(features)) => Ok(features),
        _ => Err(ArcGisError::malformed(
            "No features array in ArcGIS response",
        )),
    }
}

/// `ArcGIS` reports query errors as `{"error": {"code": ..., "message": ...}}`
/// with HTTP 200.
fn check_api_error(body: &serde_json::Value) -> Result<(), ArcGisError> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };
    let message = error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown error");
    let code = error.get("code").and_then(serde_json::Value::as_i64);
    Err(ArcGisError::malformed(match code {
        Some(code) => format!("ArcGIS API error {code}: {message}"),
        None => format!("ArcGIS API error: {message}"),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use tokio_util::sync::CancellationToken;
    use tree_zones_arcgis_models::{CourtesyDelay, RetrievalState};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::retrieve::Retriever;

    fn pairs(request: &wiremock::Request) -> Vec<(String, String)> {
        request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn service_for(server: &MockServer, max_retries: u32) -> ArcGisHttpService {
        let pagination = PaginationConfig {
            max_retries,
            courtesy: CourtesyDelay::NONE,
            ..PaginationConfig::default()
        };
        ArcGisHttpService::new(format!("{}/query", server.uri()), &pagination).unwrap()
    }

    #[test]
    fn id_query_asks_for_identifiers_only() {
        let params = id_query_params("DIAMETER > 10", 2000, 1000);
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        assert_eq!(
            params,
            vec![
                ("where", "DIAMETER > 10"),
                ("returnIdsOnly", "true"),
                ("f", "json"),
                ("resultOffset", "2000"),
                ("resultRecordCount", "1000"),
            ]
        );
    }

    #[test]
    fn feature_query_asks_for_geojson_with_geometry() {
        let params = feature_query_params(&[ObjectId(4), ObjectId(5)], "*");
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        assert_eq!(
            params,
            vec![
                ("objectIds", "4,5"),
                ("outFields", "*"),
                ("returnGeometry", "true"),
                ("f", "geojson"),
            ]
        );
    }

    #[tokio::test]
    async fn id_request_carries_paging_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("returnIdsOnly", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "objectIds": [11, 12] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server, 0);
        let ids = service.query_ids("1=1", 1000, 500).await.unwrap();
        assert_eq!(ids, vec![ObjectId(11), ObjectId(12)]);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            pairs(&requests[0]),
            owned(&[
                ("where", "1=1"),
                ("returnIdsOnly", "true"),
                ("f", "json"),
                ("resultOffset", "1000"),
                ("resultRecordCount", "500"),
            ])
        );
    }

    #[tokio::test]
    async fn feature_request_carries_chunk_identifiers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .and(query_param("f", "geojson"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": { "OBJECTID": 7 }, "geometry": null },
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server, 0);
        let features = service
            .query_features(&[ObjectId(7), ObjectId(8)], "DIAMETER,SPP_COM")
            .await
            .unwrap();
        assert_eq!(features.len(), 1);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            pairs(&requests[0]),
            owned(&[
                ("objectIds", "7,8"),
                ("outFields", "DIAMETER,SPP_COM"),
                ("returnGeometry", "true"),
                ("f", "geojson"),
            ])
        );
    }

    #[tokio::test]
    async fn cancellation_abandons_retry_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let pagination = PaginationConfig {
            courtesy: CourtesyDelay::NONE,
            ..PaginationConfig::default()
        };
        let service = service_for(&server, 2);
        let mut retriever = Retriever::new(service, &pagination)
            .unwrap()
            .with_cancellation(cancel);

        let start = Instant::now();
        let retrieval = retriever.retrieve_all("1=1").await;

        // The first backoff alone is 2 s.
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(retrieval.cancelled);
        assert!(matches!(
            retrieval.id_interruption.as_ref().map(|i| &i.error),
            Some(ArcGisError::Cancelled)
        ));
        assert_eq!(retrieval.state, RetrievalState::PartiallyFailed);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[test]
    fn parses_id_page() {
        let body = serde_json::json!({
            "objectIdFieldName": "OBJECTID",
            "objectIds": [3, 1, 2],
        });
        assert_eq!(
            parse_id_page(&body).unwrap(),
            vec![ObjectId(3), ObjectId(1), ObjectId(2)]
        );
    }

    #[test]
    fn missing_or_null_ids_mean_end_of_data() {
        let body = serde_json::json!({ "objectIdFieldName": "OBJECTID" });
        assert!(parse_id_page(&body).unwrap().is_empty());

        let body = serde_json::json!({ "objectIdFieldName": "OBJECTID", "objectIds": null });
        assert!(parse_id_page(&body).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_integer_ids() {
        let body = serde_json::json!({ "objectIds": [1, "two"] });
        assert!(parse_id_page(&body).unwrap_err().is_malformed());

        let body = serde_json::json!({ "objectIds": "1,2" });
        assert!(parse_id_page(&body).unwrap_err().is_malformed());
    }

    #[test]
    fn api_error_body_is_malformed() {
        let body = serde_json::json!({
            "error": { "code": 400, "message": "Invalid query parameters", "details": [] }
        });
        let err = parse_id_page(&body).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("400"));
        assert!(parse_feature_page(body).unwrap_err().is_malformed());
    }

    #[test]
    fn parses_feature_page() {
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": 1,
                    "geometry": { "type": "Point", "coordinates": [-89.385_608, 43.056_392] },
                    "properties": { "OBJECTID": 1, "DIAMETER": 6.0 },
                },
            ],
        });
        let features = parse_feature_page(body).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["properties"]["OBJECTID"], 1);
    }

    #[test]
    fn feature_page_without_features_is_malformed() {
        let body = serde_json::json!({ "type": "FeatureCollection" });
        assert!(parse_feature_page(body).unwrap_err().is_malformed());
    }

    #[test]
    fn joins_ids_with_commas() {
        assert_eq!(join_ids(&[ObjectId(1), ObjectId(22), ObjectId(333)]), "1,22,333");
        assert_eq!(join_ids(&[]), "");
    }
}
