use crate::chart::{donut_slices, to_svg, DonutSlice};
use crate::config::AppConfig;
use crate::html::VIEWER_HTML;
use crate::map_host::{ClickSender, MapDescription};
use crate::pipeline::PipelineHandle;
use crate::presenter::{ModalContent, ViewSnapshot};
use crate::stats::SelectionStats;
use crate::types::{Feature, Point};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub struct AppState {
    pub map: MapDescription,
    pub clicks: ClickSender,
    pub view: watch::Receiver<Arc<ViewSnapshot>>,
    pub events: broadcast::Sender<Feature>,
}

#[derive(Serialize)]
pub struct SelectionResponse {
    seq: u64,
    modal: ModalContent,
    stats: SelectionStats,
    slices: [DonutSlice; 2],
}

pub async fn start_server(
    config: &AppConfig,
    map: MapDescription,
    pipeline: PipelineHandle,
) -> Result<()> {
    let state = Arc::new(AppState {
        map,
        clicks: pipeline.clicks.clone(),
        view: pipeline.view.clone(),
        events: pipeline.events(),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/map", get(map_handler))
        .route("/api/click", post(click_handler))
        .route("/api/selection", get(selection_handler))
        .route("/api/chart.svg", get(chart_handler))
        .route("/api/highlight", get(highlight_handler))
        .route("/api/events", get(events_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(VIEWER_HTML)
}

async fn map_handler(State(state): State<Arc<AppState>>) -> Json<MapDescription> {
    Json(state.map.clone())
}

async fn click_handler(
    State(state): State<Arc<AppState>>,
    Json(point): Json<Point>,
) -> Response {
    if !state.map.ready {
        return (StatusCode::SERVICE_UNAVAILABLE, "map is not available").into_response();
    }
    if !state.clicks.click(point) {
        warn!("selection pipeline has stopped");
        return (StatusCode::SERVICE_UNAVAILABLE, "selection pipeline stopped").into_response();
    }
    (StatusCode::ACCEPTED, Json(point)).into_response()
}

fn snapshot(state: &AppState) -> Arc<ViewSnapshot> {
    state.view.borrow().clone()
}

async fn selection_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = snapshot(&state);
    match snapshot.selection.selection() {
        Some(selection) => Json(SelectionResponse {
            seq: selection.seq,
            modal: selection.modal.clone(),
            stats: selection.stats,
            slices: donut_slices(&selection.stats),
        })
        .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn chart_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = snapshot(&state);
    match snapshot.selection.selection() {
        Some(selection) => (
            [(header::CONTENT_TYPE, "image/svg+xml")],
            to_svg(&selection.chart),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn highlight_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = snapshot(&state);
    match &snapshot.highlight {
        Some(graphic) => Json(graphic.to_geojson()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.events.subscribe();
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(feature) => {
                    let event = Event::default()
                        .event("feature-selected")
                        .json_data(feature.to_geojson());
                    return Some((event, rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener fell behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
