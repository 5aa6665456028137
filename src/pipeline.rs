//! The click → query → present loop.
//!
//! One driver task owns the map host and the presenter. Each click is
//! numbered and its query runs as its own task; resolutions come back on a
//! channel in whatever order the service answers, and the presenter keeps
//! only the most recent click's result.

use crate::error::TransportError;
use crate::fetcher::AttributeFetcher;
use crate::map_host::{ClickSender, ClickStream, MapHost};
use crate::presenter::{Outcome, SelectionPresenter};
pub use crate::presenter::ViewSnapshot;
use crate::types::{Feature, Point};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct Resolution {
    seq: u64,
    point: Point,
    result: Result<Option<Feature>, TransportError>,
}

pub struct PipelineHandle {
    pub clicks: ClickSender,
    pub view: watch::Receiver<Arc<ViewSnapshot>>,
    events: broadcast::Sender<Feature>,
    pub task: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Feature> {
        self.events.subscribe()
    }

    pub fn events(&self) -> broadcast::Sender<Feature> {
        self.events.clone()
    }
}

pub struct SelectionPipeline<F> {
    host: MapHost,
    fetcher: Arc<F>,
    presenter: SelectionPresenter,
    layer_endpoint: String,
}

impl<F: AttributeFetcher> SelectionPipeline<F> {
    pub fn new(
        host: MapHost,
        fetcher: F,
        presenter: SelectionPresenter,
        layer_endpoint: String,
    ) -> Self {
        Self { host, fetcher: Arc::new(fetcher), presenter, layer_endpoint }
    }

    pub fn spawn(self) -> PipelineHandle {
        let (clicks, stream) = MapHost::clicks();
        let view = self.presenter.watch();
        let events = self.presenter.events();
        let task = tokio::spawn(self.run(stream));
        PipelineHandle { clicks, view, events, task }
    }

    async fn run(mut self, mut clicks: ClickStream) {
        let (resolved_tx, mut resolved) = mpsc::unbounded_channel::<Resolution>();
        let mut next_seq = 0u64;

        loop {
            tokio::select! {
                click = clicks.next() => {
                    let Some(point) = click else { break };
                    if !self.host.is_ready() {
                        warn!(x = point.x, y = point.y, "map unavailable, ignoring click");
                        continue;
                    }
                    next_seq += 1;
                    self.dispatch(next_seq, point, resolved_tx.clone());
                }
                Some(resolution) = resolved.recv() => {
                    self.resolve(resolution);
                }
            }
        }

        // Let queries already in flight land before stopping.
        drop(resolved_tx);
        while let Some(resolution) = resolved.recv().await {
            self.resolve(resolution);
        }
        info!("selection pipeline stopped");
    }

    fn dispatch(&self, seq: u64, point: Point, tx: mpsc::UnboundedSender<Resolution>) {
        let fetcher = Arc::clone(&self.fetcher);
        let endpoint = self.layer_endpoint.clone();
        tokio::spawn(async move {
            let result = fetcher.query_at(point, &endpoint).await;
            let _ = tx.send(Resolution { seq, point, result });
        });
    }

    fn resolve(&mut self, resolution: Resolution) {
        let Resolution { seq, point, result } = resolution;
        let feature = match result {
            Ok(feature) => feature,
            Err(e) => {
                error!(seq, x = point.x, y = point.y, "attribute query failed: {e}");
                // still the latest answer: older clicks may not replace it
                self.presenter.mark_resolved(seq);
                return;
            }
        };

        match self.presenter.present(seq, feature, &mut self.host) {
            Ok(Outcome::Applied) => info!(seq, "selection applied"),
            Ok(Outcome::NoFeature) => info!(seq, x = point.x, y = point.y, "no feature at point"),
            Ok(Outcome::Stale) => info!(seq, "discarded result of an older click"),
            Err(e) => warn!(seq, "feature rejected: {e}"),
        }
    }
}
