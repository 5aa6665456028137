use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A map coordinate in the service's spatial reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One queried region: its raw attributes and (when returned) its outline.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub attributes: Map<String, Value>,
    pub geometry: Option<Geometry<f64>>,
}

impl Feature {
    pub fn new(attributes: Map<String, Value>, geometry: Option<Geometry<f64>>) -> Self {
        Self { attributes, geometry }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// GeoJSON form handed to external listeners.
    pub fn to_geojson(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: self
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: None,
            properties: Some(self.attributes.clone()),
            foreign_members: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use serde_json::json;

    pub fn census_feature(name: &str, population: f64, females: f64, males: f64) -> Feature {
        let attributes = json!({
            "STATE_NAME": name,
            "POP2000": population,
            "FEMALES": females,
            "MALES": males,
        });
        let outline = polygon![
            (x: -84.8, y: 38.4),
            (x: -80.5, y: 38.4),
            (x: -80.5, y: 41.9),
            (x: -84.8, y: 41.9),
        ];
        Feature::new(
            attributes.as_object().cloned().unwrap_or_default(),
            Some(Geometry::MultiPolygon(MultiPolygon::new(vec![outline]))),
        )
    }

    pub fn ohio() -> Feature {
        census_feature("Ohio", 11353140.0, 5800000.0, 5553140.0)
    }
}
