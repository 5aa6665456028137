use crate::config::{AppConfig, HighlightConfig, MapConfig};
use crate::error::InitializationError;
use crate::fetcher::{service_error, ArcGisClient};
use crate::types::Point;
use geo::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Outline and fill used for the selected region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightStyle {
    pub outline: [u8; 3],
    pub outline_width: f64,
    pub fill: [f64; 4],
}

impl From<&HighlightConfig> for HighlightStyle {
    fn from(config: &HighlightConfig) -> Self {
        Self {
            outline: config.outline,
            outline_width: config.outline_width,
            fill: config.fill,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graphic {
    pub geometry: Geometry<f64>,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub container: String,
    pub legend_container: String,
    pub modal_container: String,
    pub center: [f64; 2],
    pub zoom: u8,
    pub basemap: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayLayer {
    pub map_server: String,
    pub visible_layers: Vec<u32>,
    pub name: String,
    pub geometry_type: Option<String>,
}

/// Everything the page needs to build its own map widget.
#[derive(Debug, Clone, Serialize)]
pub struct MapDescription {
    pub ready: bool,
    pub view: MapView,
    pub overlay: Option<OverlayLayer>,
    pub legend: Vec<LegendEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerInfo {
    pub name: String,
    #[serde(rename = "geometryType")]
    pub geometry_type: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldInfo {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LegendResponse {
    #[serde(default)]
    layers: Vec<LegendLayer>,
}

#[derive(Debug, Clone, Deserialize)]
struct LegendLayer {
    #[serde(rename = "layerId")]
    layer_id: u32,
    #[serde(default)]
    legend: Vec<LegendEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegendEntry {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "imageData", default)]
    pub image_data: String,
    #[serde(rename = "contentType", default)]
    pub content_type: String,
}

/// Sender half of the click stream, cloned into whatever receives clicks.
#[derive(Debug, Clone)]
pub struct ClickSender(mpsc::UnboundedSender<Point>);

impl ClickSender {
    /// Returns false once nothing listens for clicks any more.
    pub fn click(&self, point: Point) -> bool {
        self.0.send(point).is_ok()
    }
}

/// One point per click, in click order. Points are not retained.
#[derive(Debug)]
pub struct ClickStream(mpsc::UnboundedReceiver<Point>);

impl ClickStream {
    pub async fn next(&mut self) -> Option<Point> {
        self.0.recv().await
    }
}

#[derive(Debug)]
enum HostStatus {
    Ready { overlay: OverlayLayer, legend: Vec<LegendEntry> },
    Unavailable,
}

/// The map: its view, the census overlay and the graphics drawn on top.
#[derive(Debug)]
pub struct MapHost {
    view: MapView,
    status: HostStatus,
    graphics: Vec<Graphic>,
}

impl MapHost {
    pub async fn initialize(
        config: &AppConfig,
        client: &ArcGisClient,
    ) -> Result<Self, InitializationError> {
        let map = &config.map;
        for id in [&map.container, &map.legend_container, &map.modal_container] {
            validate_container(id)?;
        }

        let service = &config.service;
        let layer_url = service.layer_endpoint();
        let info: LayerInfo = serde_json::from_value(load(client, &layer_url).await?)
            .map_err(|source| InitializationError::Metadata { url: layer_url.clone(), source })?;

        for field in config.fields.names() {
            if !info.fields.iter().any(|f| f.name == field) {
                warn!(field, layer = %info.name, "configured attribute not in layer schema");
            }
        }

        let legend = match load_legend(client, &service.map_server, service.layer).await {
            Ok(legend) => legend,
            Err(e) => {
                warn!("legend unavailable, continuing without it: {e}");
                Vec::new()
            }
        };

        info!(layer = %info.name, legend_entries = legend.len(), "map host ready");

        Ok(Self {
            view: view_from(&config.map),
            status: HostStatus::Ready {
                overlay: OverlayLayer {
                    map_server: service.map_server.clone(),
                    visible_layers: vec![service.layer],
                    name: info.name,
                    geometry_type: info.geometry_type,
                },
                legend,
            },
            graphics: Vec::new(),
        })
    }

    /// A host whose initialization failed: blank map, clicks ignored.
    pub fn unavailable(map: &MapConfig) -> Self {
        Self { view: view_from(map), status: HostStatus::Unavailable, graphics: Vec::new() }
    }

    #[cfg(test)]
    pub(crate) fn ready_for_tests(map: &MapConfig) -> Self {
        Self {
            view: view_from(map),
            status: HostStatus::Ready {
                overlay: OverlayLayer {
                    map_server: "http://localhost/MapServer".to_string(),
                    visible_layers: vec![3],
                    name: "states".to_string(),
                    geometry_type: None,
                },
                legend: Vec::new(),
            },
            graphics: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, HostStatus::Ready { .. })
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }

    pub fn overlay(&self) -> Option<&OverlayLayer> {
        match &self.status {
            HostStatus::Ready { overlay, .. } => Some(overlay),
            HostStatus::Unavailable => None,
        }
    }

    pub fn legend(&self) -> &[LegendEntry] {
        match &self.status {
            HostStatus::Ready { legend, .. } => legend,
            HostStatus::Unavailable => &[],
        }
    }

    pub fn describe(&self) -> MapDescription {
        MapDescription {
            ready: self.is_ready(),
            view: self.view.clone(),
            overlay: self.overlay().cloned(),
            legend: self.legend().to_vec(),
        }
    }

    pub fn clicks() -> (ClickSender, ClickStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClickSender(tx), ClickStream(rx))
    }

    pub fn set_highlight(&mut self, geometry: Option<&Geometry<f64>>, style: &HighlightStyle) {
        let Some(geometry) = geometry else {
            return;
        };
        self.graphics.clear();
        self.graphics.push(Graphic { geometry: geometry.clone(), style: style.clone() });
    }

    pub fn highlight(&self) -> Option<&Graphic> {
        self.graphics.last()
    }

    pub fn graphics(&self) -> &[Graphic] {
        &self.graphics
    }
}

impl Graphic {
    /// GeoJSON feature carrying the style as properties, for the page.
    pub fn to_geojson(&self) -> Value {
        let geometry = geojson::Geometry::new(geojson::Value::from(&self.geometry));
        json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": {
                "outline": self.style.outline,
                "outline_width": self.style.outline_width,
                "fill": self.style.fill,
            }
        })
    }
}

fn view_from(map: &MapConfig) -> MapView {
    MapView {
        container: map.container.clone(),
        legend_container: map.legend_container.clone(),
        modal_container: map.modal_container.clone(),
        center: map.center,
        zoom: map.zoom,
        basemap: map.basemap.clone(),
    }
}

fn validate_container(id: &str) -> Result<(), InitializationError> {
    let valid = !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(InitializationError::InvalidContainer(id.to_string()))
    }
}

/// Legend entries of the visible sub-layer only.
async fn load_legend(
    client: &ArcGisClient,
    map_server: &str,
    layer: u32,
) -> Result<Vec<LegendEntry>, InitializationError> {
    let url = format!("{}/legend", map_server.trim_end_matches('/'));
    let legend: LegendResponse = serde_json::from_value(load(client, &url).await?)
        .map_err(|source| InitializationError::Metadata { url: url.clone(), source })?;
    Ok(legend
        .layers
        .into_iter()
        .filter(|l| l.layer_id == layer)
        .flat_map(|l| l.legend)
        .collect())
}

async fn load(client: &ArcGisClient, url: &str) -> Result<Value, InitializationError> {
    let body = client
        .fetch_json(url, &[("f", "json".to_string())])
        .await
        .map_err(|source| InitializationError::ServiceUnavailable { url: url.to_string(), source })?;
    if let Some((code, message)) = service_error(&body) {
        return Err(InitializationError::Service { url: url.to_string(), code, message });
    }
    Ok(body)
}
