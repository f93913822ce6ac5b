use std::sync::Arc;

use compute::{Aggregator, LayerDataState};
use foundation::ids::LayerId;
use foundation::time::Year;
use parking_lot::Mutex;
use runtime::store::Store;
use runtime::task::TaskHandle;
use runtime::timeline::Timeline;
use tracing::{debug, warn};

use crate::overlay::{OverlaySynchronizer, SyncReport};
use crate::state::ViewState;
use crate::surface::RenderSurface;

/// Drives the aggregator and the synchronizer from a `Store<ViewState>`.
///
/// Data is refetched only when the active set or the year changes; every
/// change runs a synchronization pass.
pub struct MapSession<S> {
    store: Arc<Store<ViewState>>,
    aggregator: Arc<Aggregator>,
    synchronizer: OverlaySynchronizer,
    surface: Arc<Mutex<S>>,
    data: LayerDataState,
    last_query: Option<(Vec<LayerId>, Year)>,
}

impl<S> MapSession<S>
where
    S: RenderSurface + Send + 'static,
{
    pub fn new(store: Arc<Store<ViewState>>, aggregator: Arc<Aggregator>, surface: Arc<Mutex<S>>) -> Self {
        let synchronizer = OverlaySynchronizer::new(aggregator.catalog().clone());
        Self {
            store,
            aggregator,
            synchronizer,
            surface,
            data: LayerDataState::new(),
            last_query: None,
        }
    }

    pub fn data(&self) -> &LayerDataState {
        &self.data
    }

    pub fn synchronizer(&self) -> &OverlaySynchronizer {
        &self.synchronizer
    }

    pub async fn refresh(&mut self) -> SyncReport {
        let view = self.store.get();
        let query = (view.active_ids(), view.year);

        if self.last_query.as_ref() != Some(&query) {
            let ticket = self.data.begin();
            let outcome = self.aggregator.fetch_all_data(&query.0, query.1).await;
            if let Some(e) = &outcome.error {
                warn!(year = %query.1, error = %e, "layer data incomplete");
            }
            if self.data.apply(ticket, outcome) {
                self.last_query = Some(query);
            } else {
                debug!(year = %query.1, "layer data superseded");
            }
        }

        let mut surface = self.surface.lock();
        self.synchronizer
            .sync(&mut *surface, &view, Some(&self.data.data))
    }

    /// Refresh now and after every store change, until cancelled.
    pub fn spawn(mut self) -> TaskHandle {
        let mut changes = self.store.subscribe();
        TaskHandle::spawn(async move {
            self.refresh().await;
            while changes.changed().await.is_ok() {
                self.refresh().await;
            }
        })
    }
}

/// Play `timeline` by writing each new year into `store`.
pub fn play_timeline(store: Arc<Store<ViewState>>, timeline: &Timeline) -> TaskHandle {
    let from = store.get().year;
    timeline.play(from, move |year| {
        store.update(|v| v.set_year(year));
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use catalog::{Catalog, SourceRef};
    use compute::Aggregator;
    use foundation::ids::LayerId;
    use foundation::time::Year;
    use parking_lot::Mutex;
    use providers::{
        BoxFuture, ProviderError, RegionalStatsProvider, SeriesProvider, SeriesResponse,
    };
    use runtime::store::Store;
    use runtime::timeline::Timeline;

    use super::{MapSession, play_timeline};
    use crate::headless::HeadlessSurface;
    use crate::state::ViewState;
    use crate::surface::RenderSurface;

    #[derive(Default)]
    struct NoSeries;

    impl SeriesProvider for NoSeries {
        fn fetch_series<'a>(
            &'a self,
            _entity: &'a str,
            _variable: &'a str,
        ) -> BoxFuture<'a, Result<SeriesResponse, ProviderError>> {
            Box::pin(async { Ok(SeriesResponse::empty()) })
        }
    }

    #[derive(Default)]
    struct Regional {
        values: HashMap<String, f64>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl RegionalStatsProvider for Regional {
        fn fetch_value<'a>(
            &'a self,
            source: &'a SourceRef,
            _year: Year,
        ) -> BoxFuture<'a, Result<Option<f64>, ProviderError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(self.values.get(&source.entity).copied())
            })
        }
    }

    struct Fixture {
        store: Arc<Store<ViewState>>,
        regional: Arc<Regional>,
        surface: Arc<Mutex<HeadlessSurface>>,
        session: MapSession<HeadlessSurface>,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let store = Arc::new(Store::new(ViewState::from_catalog(&catalog, Year(2020))));
        let regional = Arc::new(Regional {
            values: HashMap::from([("region/census/06".to_string(), 700_000.0)]),
            ..Default::default()
        });
        let aggregator = Arc::new(Aggregator::new(catalog, Arc::new(NoSeries), regional.clone()));
        let surface = Arc::new(Mutex::new(HeadlessSurface::new()));
        let session = MapSession::new(store.clone(), aggregator, surface.clone());
        Fixture {
            store,
            regional,
            surface,
            session,
        }
    }

    #[tokio::test]
    async fn refresh_fetches_once_per_query() {
        let mut f = fixture();
        let housing = LayerId::from("housing");
        f.store.update(|v| v.toggle_layer(&housing));

        let report = f.session.refresh().await;
        assert_eq!(report.added, vec![housing.clone()]);
        assert!(f.session.data().has_data(&housing));
        let calls = f.regional.calls.load(Ordering::SeqCst);
        assert_eq!(calls, 4);

        // Intensity only: no refetch, repaint only.
        f.store.update(|v| v.set_intensity(&housing, 0.2));
        let report = f.session.refresh().await;
        assert_eq!(report.repainted, vec![housing.clone()]);
        assert_eq!(f.regional.calls.load(Ordering::SeqCst), calls);

        // Year change: refetch.
        f.store.update(|v| v.set_year(Year(2021)));
        f.session.refresh().await;
        assert_eq!(f.regional.calls.load(Ordering::SeqCst), calls * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_sharing_an_aggregator_keep_their_own_data() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let regional = Arc::new(Regional {
            values: HashMap::from([("region/census/06".to_string(), 700_000.0)]),
            delay: Some(Duration::from_millis(10)),
            ..Default::default()
        });
        let aggregator = Arc::new(Aggregator::new(catalog.clone(), Arc::new(NoSeries), regional));
        let housing = LayerId::from("housing");

        let session = |year: i32| {
            let view = ViewState::from_catalog(&catalog, Year(year)).toggle_layer(&housing);
            let surface = Arc::new(Mutex::new(HeadlessSurface::new()));
            MapSession::new(Arc::new(Store::new(view)), aggregator.clone(), surface)
        };
        let mut a = session(2020);
        let mut b = session(2021);

        tokio::join!(a.refresh(), b.refresh());
        assert!(a.data().has_data(&housing));
        assert!(b.data().has_data(&housing));
    }

    #[tokio::test]
    async fn overlays_render_without_data() {
        let mut f = fixture();
        let migration = LayerId::from("migration");
        f.store.update(|v| v.toggle_layer(&migration));
        let report = f.session.refresh().await;
        assert_eq!(report.added, vec![migration.clone()]);
        assert!(!f.session.data().has_data(&migration));
        assert!(f.surface.lock().has_source("migration-source"));
    }

    #[tokio::test]
    async fn spawned_session_follows_store() {
        let f = fixture();
        let handle = f.session.spawn();
        f.store
            .update(|v| v.toggle_layer(&LayerId::from("economy")));

        let mut rendered = false;
        for _ in 0..100 {
            if f.surface.lock().has_source("economy-source") {
                rendered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.cancel();
        assert!(rendered);
    }

    #[tokio::test(start_paused = true)]
    async fn timeline_writes_years_into_store() {
        let f = fixture();
        let mut timeline = Timeline::new(Year(2019), Year(2021));
        timeline.interval = Duration::from_secs(1);
        let handle = play_timeline(f.store.clone(), &timeline);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(f.store.get().year, Year(2021));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.store.get().year, Year(2019));
        handle.cancel();
    }
}
