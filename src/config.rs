use serde::Deserialize;
use std::path::Path;
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub map: MapConfig,
    pub service: ServiceConfig,
    pub fields: FieldConfig,
    pub highlight: HighlightConfig,
    pub chart: ChartConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// DOM id of the map container in the viewer page
    pub container: String,
    pub legend_container: String,
    pub modal_container: String,
    pub center: [f64; 2],
    pub zoom: u8,
    pub basemap: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            container: "mapNode".to_string(),
            legend_container: "legendNode".to_string(),
            modal_container: "content".to_string(),
            center: [-96.0, 39.0],
            zoom: 4,
            basemap: "gray".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub map_server: String,
    /// The only sub-layer made visible and queried
    pub layer: u32,
    pub spatial_reference: u32,
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            map_server: "https://sampleserver6.arcgisonline.com/arcgis/rest/services/Census/MapServer"
                .to_string(),
            layer: 3,
            spatial_reference: 4326,
            timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    pub fn layer_endpoint(&self) -> String {
        format!("{}/{}", self.map_server.trim_end_matches('/'), self.layer)
    }
}

/// Attribute names read from the census layer.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FieldConfig {
    pub state_name: String,
    pub population: String,
    pub females: String,
    pub males: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            state_name: "STATE_NAME".to_string(),
            population: "POP2000".to_string(),
            females: "FEMALES".to_string(),
            males: "MALES".to_string(),
        }
    }
}

impl FieldConfig {
    pub fn names(&self) -> [&str; 4] {
        [&self.state_name, &self.population, &self.females, &self.males]
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HighlightConfig {
    pub outline: [u8; 3],
    pub outline_width: f64,
    /// RGBA, alpha in 0..=1
    pub fill: [f64; 4],
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            outline: [255, 0, 0],
            outline_width: 2.5,
            fill: [0.0, 0.0, 0.0, 0.25],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChartConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub inner_radius: f64,
    pub palette: [String; 2],
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 300.0,
            height: 300.0,
            margin: 60.0,
            inner_radius: 130.0,
            palette: ["#0eede9".to_string(), "#11fc92".to_string()],
        }
    }
}

impl ChartConfig {
    pub fn outer_radius(&self) -> f64 {
        self.width.min(self.height) / 2.0 - self.margin
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Falls back to the stock viewer settings when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}
