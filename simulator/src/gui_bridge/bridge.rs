use crate::gui_bridge::model::{
    DeletedCount, ErrorBody, MarkerIds, MarkerInput, ScanParams, StatsView,
};
use anyhow::{Context, Result};
use spectrumcore::model::NewMarker;
use spectrumcore::prelude::{CoreError, CoreResult, ErrorKind};
use spectrumcore::storage::ChangeEvent;
use spectrumcore::SpectrumService;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Builder;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::Filter;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateKey => StatusCode::CONFLICT,
        ErrorKind::InvalidPage | ErrorKind::InvalidFilter => StatusCode::BAD_REQUEST,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::InvalidRecord | ErrorKind::UnknownScan | ErrorKind::BulkDelete => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn error_response(err: &CoreError) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        log::warn!("[bridge] {}", err);
    }
    warp::reply::with_status(warp::reply::json(&ErrorBody::from(err)), status).into_response()
}

fn respond<T: Serialize>(result: CoreResult<T>, status: StatusCode) -> Response {
    match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), status).into_response(),
        Err(err) => error_response(&err),
    }
}

fn with_service(
    service: Arc<SpectrumService>,
) -> impl Filter<Extract = (Arc<SpectrumService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

async fn log_changes(mut feed: broadcast::Receiver<ChangeEvent>) {
    loop {
        match feed.recv().await {
            Ok(event) => log::debug!("[bridge] change #{} {:?}", event.sequence, event.kind),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("[bridge] change feed lagged, {skipped} events skipped")
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// HTTP surface over a [`SpectrumService`].
pub struct GuiBridge {
    service: Arc<SpectrumService>,
}

impl GuiBridge {
    pub fn new(service: Arc<SpectrumService>) -> Self {
        Self { service }
    }

    pub fn routes(&self) -> BoxedFilter<(Response,)> {
        let svc = with_service(self.service.clone());

        let list = warp::path!("scans")
            .and(warp::get())
            .and(warp::query::<ScanParams>())
            .and(svc.clone())
            .map(|params: ScanParams, service: Arc<SpectrumService>| {
                respond(
                    params.query().and_then(|query| service.query(&query)),
                    StatusCode::OK,
                )
            });

        let latest = warp::path!("scans" / "latest")
            .and(warp::get())
            .and(warp::query::<ScanParams>())
            .and(svc.clone())
            .map(|params: ScanParams, service: Arc<SpectrumService>| {
                let latest = params
                    .filter()
                    .and_then(|filter| service.latest(&filter))
                    .and_then(|scan| {
                        scan.ok_or_else(|| CoreError::NotFound("no scan matches".into()))
                    });
                respond(latest, StatusCode::OK)
            });

        let scan = warp::path!("scans" / Uuid)
            .and(warp::get())
            .and(svc.clone())
            .map(|id: Uuid, service: Arc<SpectrumService>| {
                respond(service.scan(id), StatusCode::OK)
            });

        let step = warp::path!("scans" / Uuid / "step")
            .and(warp::get())
            .and(warp::query::<ScanParams>())
            .and(svc.clone())
            .map(|id: Uuid, params: ScanParams, service: Arc<SpectrumService>| {
                let step = service.scan(id).and_then(|reference| {
                    service.step(
                        &reference.key(),
                        params.direction()?,
                        params.ordering()?,
                        &params.filter()?,
                    )
                });
                respond(step, StatusCode::OK)
            });

        let analysis = warp::path!("scans" / Uuid / "analysis" / u64)
            .and(warp::post())
            .and(svc.clone())
            .map(|id: Uuid, preset: u64, service: Arc<SpectrumService>| {
                respond(service.apply(id, preset), StatusCode::OK)
            });

        let list_markers = warp::path!("scans" / Uuid / "markers")
            .and(warp::get())
            .and(svc.clone())
            .map(|id: Uuid, service: Arc<SpectrumService>| {
                respond(service.list_markers(id), StatusCode::OK)
            });

        let create_marker = warp::path!("scans" / Uuid / "markers")
            .and(warp::post())
            .and(warp::body::json())
            .and(svc.clone())
            .map(|id: Uuid, input: MarkerInput, service: Arc<SpectrumService>| {
                let created = service.scan(id).and_then(|scan| {
                    let mut marker = NewMarker::new(
                        scan.key(),
                        input.marker_name,
                        input.frequency_mhz,
                        input.power_dbm,
                        input.marker_type,
                    );
                    marker.notes = input.notes;
                    service.create_marker(marker)
                });
                respond(created, StatusCode::CREATED)
            });

        let delete_markers = warp::path!("scans" / Uuid / "markers")
            .and(warp::delete())
            .and(warp::query::<MarkerIds>())
            .and(svc.clone())
            .map(|id: Uuid, ids: MarkerIds, service: Arc<SpectrumService>| {
                let deleted = ids.parse().and_then(|ids| match ids {
                    Some(ids) => service.delete_markers(id, &ids),
                    None => service.clear_markers(id),
                });
                respond(deleted.map(|deleted| DeletedCount { deleted }), StatusCode::OK)
            });

        let delete_marker = warp::path!("markers" / u64)
            .and(warp::delete())
            .and(svc.clone())
            .map(|id: u64, service: Arc<SpectrumService>| {
                respond(service.delete_marker(id), StatusCode::OK)
            });

        let presets = warp::path!("presets")
            .and(warp::get())
            .and(svc.clone())
            .map(|service: Arc<SpectrumService>| respond(service.presets(), StatusCode::OK));

        let stats = warp::path!("stats")
            .and(warp::get())
            .and(svc.clone())
            .map(|service: Arc<SpectrumService>| {
                let view = service.statistics().map(|store| StatsView {
                    store,
                    metrics: service.metrics(),
                });
                respond(view, StatusCode::OK)
            });

        let instances = warp::path!("instances")
            .and(warp::get())
            .and(svc)
            .map(|service: Arc<SpectrumService>| {
                respond(service.instance_names(), StatusCode::OK)
            });

        list.or(latest)
            .unify()
            .or(scan)
            .unify()
            .or(step)
            .unify()
            .or(analysis)
            .unify()
            .or(list_markers)
            .unify()
            .or(create_marker)
            .unify()
            .or(delete_markers)
            .unify()
            .or(delete_marker)
            .unify()
            .or(presets)
            .unify()
            .or(stats)
            .unify()
            .or(instances)
            .unify()
            .boxed()
    }

    /// Serves the routes on a background thread with its own runtime, and logs
    /// the store's change feed there.
    pub fn spawn(&self, address: SocketAddr) -> Result<thread::JoinHandle<()>> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building bridge runtime")?;
        let routes = self.routes();
        let feed = self.service.subscribe();
        let handle = thread::Builder::new()
            .name("gui-bridge".into())
            .spawn(move || {
                runtime.block_on(async move {
                    tokio::spawn(log_changes(feed));
                    warp::serve(routes).run(address).await;
                });
            })
            .context("spawning bridge thread")?;
        self.publish_status(&format!("HTTP bridge listening on http://{address}"));
        Ok(handle)
    }

    pub fn publish_status(&self, message: &str) {
        log::info!("[bridge] {}", message);
    }
}
