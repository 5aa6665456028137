use crate::chart::{donut_commands, ChartSurface, DrawCommand};
use crate::config::{AppConfig, ChartConfig, FieldConfig};
use crate::error::DataShapeError;
use crate::map_host::{Graphic, HighlightStyle, MapHost};
use crate::stats::{CensusRecord, SelectionStats};
use crate::types::Feature;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// What the attribute dialog shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalContent {
    pub state_name: String,
    pub population: f64,
    pub female_count: f64,
    pub male_count: f64,
    pub female_percent: f64,
    pub male_percent: f64,
}

impl ModalContent {
    fn new(record: &CensusRecord, stats: &SelectionStats) -> Self {
        Self {
            state_name: record.state_name.clone(),
            population: record.population,
            female_count: stats.female_count,
            male_count: stats.male_count,
            female_percent: stats.female_percent,
            male_percent: stats.male_percent,
        }
    }
}

/// Everything derived from one resolved feature. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub seq: u64,
    pub feature: Feature,
    pub record: CensusRecord,
    pub stats: SelectionStats,
    pub modal: ModalContent,
    pub chart: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionState {
    #[default]
    Empty,
    Showing(Arc<Selection>),
}

impl SelectionState {
    pub fn selection(&self) -> Option<&Arc<Selection>> {
        match self {
            SelectionState::Empty => None,
            SelectionState::Showing(selection) => Some(selection),
        }
    }
}

/// What the page can see after the last applied selection.
#[derive(Debug, Clone, Default)]
pub struct ViewSnapshot {
    pub selection: SelectionState,
    pub highlight: Option<Graphic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The query found nothing under the point.
    NoFeature,
    /// A later click has already resolved.
    Stale,
}

pub struct SelectionPresenter {
    fields: FieldConfig,
    chart_config: ChartConfig,
    style: HighlightStyle,
    state: SelectionState,
    surface: ChartSurface,
    modal_opens: u64,
    /// Highest click number whose query has come back, whatever it held.
    highest_resolved: u64,
    view: watch::Sender<Arc<ViewSnapshot>>,
    events: broadcast::Sender<Feature>,
}

impl SelectionPresenter {
    pub fn new(config: &AppConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        let (view, _) = watch::channel(Arc::new(ViewSnapshot::default()));
        Self {
            fields: config.fields.clone(),
            chart_config: config.chart.clone(),
            style: HighlightStyle::from(&config.highlight),
            state: SelectionState::Empty,
            surface: ChartSurface::default(),
            modal_opens: 0,
            highest_resolved: 0,
            view,
            events,
        }
    }

    /// Subscribe to "feature selected", sent once per applied selection.
    pub fn subscribe(&self) -> broadcast::Receiver<Feature> {
        self.events.subscribe()
    }

    pub fn events(&self) -> broadcast::Sender<Feature> {
        self.events.clone()
    }

    /// Snapshots are published before the matching "feature selected".
    pub fn watch(&self) -> watch::Receiver<Arc<ViewSnapshot>> {
        self.view.subscribe()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn surface(&self) -> &ChartSurface {
        &self.surface
    }

    pub fn modal_opens(&self) -> u64 {
        self.modal_opens
    }

    /// Records that the query for click `seq` came back. Returns false when
    /// a later click already has, in which case its result must be ignored.
    pub fn mark_resolved(&mut self, seq: u64) -> bool {
        if seq <= self.highest_resolved {
            return false;
        }
        self.highest_resolved = seq;
        true
    }

    /// Shows the feature resolved for click `seq`.
    ///
    /// Any resolution of a later click, even an empty or failed one, makes
    /// this result stale, so the latest click wins whatever order the
    /// queries resolve in.
    pub fn present(
        &mut self,
        seq: u64,
        feature: Option<Feature>,
        host: &mut MapHost,
    ) -> Result<Outcome, DataShapeError> {
        if !self.mark_resolved(seq) {
            debug!(seq, "dropping stale selection");
            return Ok(Outcome::Stale);
        }
        let Some(feature) = feature else {
            return Ok(Outcome::NoFeature);
        };

        let record = CensusRecord::project(&feature, &self.fields)?;
        let stats = SelectionStats::from_record(&record);
        if stats.is_degenerate() {
            warn!(seq, state = %record.state_name, "no population counts, chart will be empty");
        }

        host.set_highlight(feature.geometry.as_ref(), &self.style);

        let modal = ModalContent::new(&record, &stats);
        self.modal_opens += 1;

        let chart = donut_commands(&stats, &self.chart_config);
        self.surface.render(chart.clone());

        self.state = SelectionState::Showing(Arc::new(Selection {
            seq,
            feature: feature.clone(),
            record,
            stats,
            modal,
            chart,
        }));

        self.view.send_replace(Arc::new(ViewSnapshot {
            selection: self.state.clone(),
            highlight: host.highlight().cloned(),
        }));
        // no listeners is fine
        let _ = self.events.send(feature);
        Ok(Outcome::Applied)
    }
}
