use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use chrono::Utc;
use fleet_tracker_lib::{ping_sequence::PingSequence, time_format::format_relative};
use geo_types::Point;
use tokio::sync::Mutex;

use crate::{
    directions::{DirectionsProvider, select_waypoints},
    scene::{CLOSE_ZOOM, MapScene, Marker, MarkerKind, RoutePath, bounds_of, ping_point},
};

/// Turns a ping sequence into a drawable route on the shared scene:
/// road-snapped when the directions provider cooperates, a geodesic
/// polyline otherwise. Recomputed from scratch on every sequence change.
pub struct RouteReconstructionEngine<D> {
    scene: Arc<Mutex<MapScene>>,
    provider: D,
    /// Bumped at the start of every redraw. A provider response whose
    /// generation is no longer current is stale and must not touch the
    /// scene.
    generation: AtomicU64,
    /// While set, playback owns the current-position marker and redraws
    /// leave it in place.
    playback_active: Arc<AtomicBool>,
}

impl<D: DirectionsProvider> RouteReconstructionEngine<D> {
    pub fn new(
        scene: Arc<Mutex<MapScene>>,
        provider: D,
        playback_active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            scene,
            provider,
            generation: AtomicU64::new(0),
            playback_active,
        }
    }

    /// Full redraw for the given sequence. Previous paths and markers are
    /// always discarded first.
    pub async fn redraw(&self, pings: &PingSequence) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(newest) = pings.newest().map(ping_point) else {
            let mut scene = self.scene.lock().await;
            scene.clear_drawn();
            scene.live_position = None;
            return;
        };

        if pings.len() == 1 {
            let mut scene = self.scene.lock().await;
            let held = self.held_cursor(&scene);
            scene.clear_drawn();
            let zoom = scene.viewport.zoom;
            scene.set_view(newest, zoom);
            scene.live_position = Some(newest);
            place_markers(&mut scene, pings, held);
            return;
        }

        // Earliest ping is the origin, newest the destination; the rest
        // are waypoint candidates.
        let Some(origin) = pings.earliest().map(ping_point) else {
            return;
        };
        let waypoints = select_waypoints(pings.intermediate());

        let route = self.provider.driving_route(origin, newest, &waypoints).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("discarding stale directions response");
            return;
        }

        let mut scene = self.scene.lock().await;
        let held = self.held_cursor(&scene);
        scene.clear_drawn();

        match route {
            Ok(path) => {
                if let Some(bounds) = bounds_of(&path) {
                    scene.fit_bounds(bounds);
                }
                scene.route = Some(RoutePath::RoadSnapped(path));
            }
            Err(err) => {
                tracing::warn!("road snapping failed, using geodesic fallback: {err}");
                let raw: Vec<Point> = pings.iter().map(ping_point).collect();
                if let Some(bounds) = bounds_of(&raw) {
                    scene.fit_bounds(bounds);
                }
                scene.route = Some(RoutePath::Fallback(raw));
            }
        }

        scene.live_position = Some(newest);
        place_markers(&mut scene, pings, held);
    }

    /// Recenters on the live position at a fixed close zoom, independent
    /// of the reconstruction pipeline.
    pub async fn center_on_current(&self) {
        let mut scene = self.scene.lock().await;
        let Some(position) = scene.live_position else {
            return;
        };
        scene.set_view(position, CLOSE_ZOOM);
    }

    /// The marker position playback owns right now, if any.
    fn held_cursor(&self, scene: &MapScene) -> Option<Point> {
        if self.playback_active.load(Ordering::SeqCst) {
            scene.current_marker().map(|m| m.position)
        } else {
            None
        }
    }
}

/// One checkpoint marker per ping except the newest, which gets the
/// distinguished current-position marker. Labels show the sample age.
fn place_markers(scene: &mut MapScene, pings: &PingSequence, held_cursor: Option<Point>) {
    let now = Utc::now();

    for (index, ping) in pings.iter().enumerate() {
        let (kind, position) = if index == 0 {
            (
                MarkerKind::CurrentPosition,
                held_cursor.unwrap_or_else(|| ping_point(ping)),
            )
        } else {
            (MarkerKind::Checkpoint, ping_point(ping))
        };

        scene.markers.push(Marker {
            position,
            kind,
            label: format_relative(ping.timestamp, now),
        });
    }
}
