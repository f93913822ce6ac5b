use std::sync::Arc;
use std::time::Duration;

use catalog::{SearchKind, SearchResult};
use parking_lot::Mutex;
use runtime::generation::{Generation, GenerationCounter};
use runtime::task::TaskHandle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::popup;
use crate::surface::{CameraMotion, Easing, Marker, Popup, RenderSurface, SurfaceError};

pub const SEARCH_MARKER_ID: &str = "search-result-marker";
pub const SEARCH_POPUP_ID: &str = "search-result-popup";
pub const SEARCH_MARKER_COLOR: &str = "#f39c12";

pub const SPIN_DURATION: Duration = Duration::from_millis(2000);
pub const FLY_DURATION: Duration = Duration::from_millis(2500);
pub const COMPLETION_DELAY: Duration = Duration::from_millis(500);

pub fn zoom_for(kind: SearchKind) -> f64 {
    match kind {
        SearchKind::Event => 8.0,
        SearchKind::Invention => 10.0,
        SearchKind::Person => 7.0,
        SearchKind::Location => 5.0,
    }
}

/// A running presentation. `done` resolves once the sequence completes; it
/// errors if the presentation was superseded.
#[derive(Debug)]
pub struct Presentation {
    pub generation: Generation,
    pub done: oneshot::Receiver<Generation>,
}

/// Places the marker and popup for a search hit and moves the camera to it.
///
/// Only one presentation runs at a time: starting a new one cancels the
/// previous task, and every stage re-checks its generation before touching
/// the surface.
pub struct SearchPresenter<S> {
    surface: Arc<Mutex<S>>,
    generations: Arc<GenerationCounter>,
    current: Option<TaskHandle>,
    marker_placed: bool,
    popup_placed: bool,
}

impl<S> SearchPresenter<S>
where
    S: RenderSurface + Send + 'static,
{
    pub fn new(surface: Arc<Mutex<S>>) -> Self {
        Self {
            surface,
            generations: Arc::new(GenerationCounter::new()),
            current: None,
            marker_placed: false,
            popup_placed: false,
        }
    }

    pub fn present(&mut self, result: SearchResult) -> Presentation {
        self.cancel();
        let generation = self.generations.begin();
        let (tx, done) = oneshot::channel();

        {
            let shared = self.surface.clone();
            let mut surface = shared.lock();
            self.clear_placed(&mut *surface);
            let marker = Marker {
                id: SEARCH_MARKER_ID.to_string(),
                coordinates: result.coordinates,
                color: SEARCH_MARKER_COLOR.to_string(),
            };
            let popup = Popup {
                id: SEARCH_POPUP_ID.to_string(),
                coordinates: result.coordinates,
                html: popup::search_html(&result),
            };
            match surface.add_marker(marker) {
                Ok(()) => self.marker_placed = true,
                Err(e) => warn!(error = %e, "failed to place search marker"),
            }
            match surface.show_popup(popup) {
                Ok(()) => self.popup_placed = true,
                Err(e) => warn!(error = %e, "failed to show search popup"),
            }
        }

        debug!(generation = generation.0, title = result.title(), "presenting search result");
        let task = animate(
            self.surface.clone(),
            self.generations.clone(),
            generation,
            result,
            tx,
        );
        self.current = Some(TaskHandle::spawn(task));
        Presentation { generation, done }
    }

    /// Stop the running animation, if any. The marker stays in place.
    pub fn cancel(&mut self) {
        if let Some(h) = self.current.take() {
            h.cancel();
        }
    }

    /// Cancel the animation and remove the marker and popup.
    pub fn clear(&mut self) {
        self.cancel();
        self.generations.begin();
        let shared = self.surface.clone();
        let mut surface = shared.lock();
        self.clear_placed(&mut *surface);
    }

    fn clear_placed(&mut self, surface: &mut S) {
        if std::mem::take(&mut self.popup_placed) {
            if let Err(e) = surface.remove_popup(SEARCH_POPUP_ID) {
                warn!(error = %e, "failed to clear search popup");
            }
        }
        if std::mem::take(&mut self.marker_placed) {
            if let Err(e) = surface.remove_marker(SEARCH_MARKER_ID) {
                warn!(error = %e, "failed to clear search marker");
            }
        }
    }
}

async fn animate<S>(
    surface: Arc<Mutex<S>>,
    generations: Arc<GenerationCounter>,
    generation: Generation,
    result: SearchResult,
    done: oneshot::Sender<Generation>,
) where
    S: RenderSurface + Send + 'static,
{
    let stage = |motion: CameraMotion| -> Option<Result<(), SurfaceError>> {
        if !generations.is_current(generation) {
            return None;
        }
        Some(surface.lock().animate(motion))
    };

    let bearing = surface.lock().camera().bearing;
    let spin = CameraMotion::Rotate {
        bearing: bearing + 360.0,
        duration: SPIN_DURATION,
        easing: Easing::Linear,
    };
    match stage(spin) {
        None => return,
        Some(Err(e)) => warn!(error = %e, "spin animation failed"),
        Some(Ok(())) => {}
    }
    tokio::time::sleep(SPIN_DURATION).await;

    let fly = CameraMotion::FlyTo {
        center: result.coordinates,
        zoom: zoom_for(result.kind()),
        duration: FLY_DURATION,
    };
    match stage(fly) {
        None => return,
        Some(Err(e)) => warn!(error = %e, "fly-to animation failed"),
        Some(Ok(())) => {}
    }
    tokio::time::sleep(FLY_DURATION + COMPLETION_DELAY).await;

    if generations.is_current(generation) {
        let _ = done.send(generation);
    }
}
