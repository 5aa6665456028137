use crate::config::ServiceConfig;
use crate::error::TransportError;
use crate::types::{Feature, Point};
use geojson::GeoJson;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Resolves the feature under a map point.
///
/// Calls are independent: nothing is shared, cancelled or de-duplicated
/// between two queries in flight.
pub trait AttributeFetcher: Send + Sync + 'static {
    fn query_at(
        &self,
        point: Point,
        layer_endpoint: &str,
    ) -> impl Future<Output = Result<Option<Feature>, TransportError>> + Send;
}

/// Client for an ArcGIS REST map service.
#[derive(Debug, Clone)]
pub struct ArcGisClient {
    http: reqwest::Client,
    spatial_reference: u32,
}

impl ArcGisClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, spatial_reference: config.spatial_reference })
    }

    /// GET a JSON document. Service-level errors come back as a normal
    /// body and are left for the caller to inspect with [`service_error`].
    pub async fn fetch_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, reqwest::Error> {
        self.http
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }

    fn query_params(&self, point: Point) -> Vec<(&'static str, String)> {
        let wkid = self.spatial_reference.to_string();
        vec![
            ("geometry", format!("{},{}", point.x, point.y)),
            ("geometryType", "esriGeometryPoint".to_string()),
            ("inSR", wkid.clone()),
            ("outSR", wkid),
            ("spatialRel", "esriSpatialRelIntersects".to_string()),
            ("outFields", "*".to_string()),
            ("returnGeometry", "true".to_string()),
            ("f", "geojson".to_string()),
        ]
    }
}

impl AttributeFetcher for ArcGisClient {
    async fn query_at(
        &self,
        point: Point,
        layer_endpoint: &str,
    ) -> Result<Option<Feature>, TransportError> {
        let url = format!("{}/query", layer_endpoint.trim_end_matches('/'));
        debug!(%url, x = point.x, y = point.y, "querying feature layer");
        let body = self.fetch_json(&url, &self.query_params(point)).await?;
        first_feature(body)
    }
}

/// ArcGIS reports failures as `{"error": {"code": .., "message": ..}}`,
/// often with a 200 status.
pub fn service_error(body: &Value) -> Option<(i64, String)> {
    let error = body.get("error")?;
    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Some((code, message))
}

/// First feature of a GeoJSON query response, in service order.
fn first_feature(body: Value) -> Result<Option<Feature>, TransportError> {
    if let Some((code, message)) = service_error(&body) {
        return Err(TransportError::Service { code, message });
    }

    let collection = match GeoJson::from_json_value(body) {
        Ok(GeoJson::FeatureCollection(fc)) => fc,
        Ok(_) => return Err(TransportError::Decode("expected a FeatureCollection".to_string())),
        Err(e) => return Err(TransportError::Decode(e.to_string())),
    };

    let Some(feature) = collection.features.into_iter().next() else {
        return Ok(None);
    };

    let geometry = match feature.geometry {
        Some(geometry) => {
            let geometry: geo::Geometry<f64> = geometry
                .value
                .try_into()
                .map_err(|e: geojson::Error| TransportError::Decode(e.to_string()))?;
            Some(geometry)
        }
        None => None,
    };

    Ok(Some(Feature::new(feature.properties.unwrap_or_default(), geometry)))
}


#[cfg(test)]
mod tests {
    use super::testing::fake_service;
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn ohio_collection() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": 39,
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-84.8, 38.4], [-80.5, 38.4], [-80.5, 41.9], [-84.8, 41.9], [-84.8, 38.4]]]
                    },
                    "properties": {"STATE_NAME": "Ohio", "POP2000": 11353140, "FEMALES": 5800000, "MALES": 5553140}
                },
                {
                    "type": "Feature",
                    "id": 21,
                    "geometry": null,
                    "properties": {"STATE_NAME": "Kentucky"}
                }
            ]
        })
    }

    fn client() -> ArcGisClient {
        ArcGisClient::new(&ServiceConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn first_feature_wins() {
        let router = Router::new().route(
            "/Census/MapServer/3/query",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["geometry"], "-83,40.1");
                assert_eq!(params["geometryType"], "esriGeometryPoint");
                assert_eq!(params["outFields"], "*");
                assert_eq!(params["returnGeometry"], "true");
                assert_eq!(params["inSR"], "4326");
                Json(ohio_collection())
            }),
        );
        let base = fake_service(router).await;

        let feature = client()
            .query_at(Point::new(-83.0, 40.1), &format!("{base}/Census/MapServer/3"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(feature.attribute("STATE_NAME"), Some(&json!("Ohio")));
        assert!(matches!(feature.geometry, Some(geo::Geometry::Polygon(_))));
    }

    #[tokio::test]
    async fn empty_result_is_none() {
        let router = Router::new().route(
            "/layer/query",
            get(|| async { Json(json!({"type": "FeatureCollection", "features": []})) }),
        );
        let base = fake_service(router).await;

        let result = client().query_at(Point::new(0.0, 0.0), &format!("{base}/layer/")).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn service_error_payload_is_transport_error() {
        let router = Router::new().route(
            "/layer/query",
            get(|| async {
                Json(json!({"error": {"code": 400, "message": "Invalid or missing input parameters."}}))
            }),
        );
        let base = fake_service(router).await;

        let err = client()
            .query_at(Point::new(0.0, 0.0), &format!("{base}/layer"))
            .await
            .unwrap_err();
        match err {
            TransportError::Service { code, message } => {
                assert_eq!(code, 400);
                assert!(message.contains("Invalid"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn http_failure_is_transport_error() {
        let router = Router::new().route(
            "/layer/query",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = fake_service(router).await;

        let err = client()
            .query_at(Point::new(0.0, 0.0), &format!("{base}/layer"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }

    #[test]
    fn non_collection_body_is_decode_error() {
        let body = json!({"type": "Point", "coordinates": [1.0, 2.0]});
        assert!(matches!(first_feature(body), Err(TransportError::Decode(_))));
    }
}
