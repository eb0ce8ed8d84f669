use fleet_tracker_lib::ping::Ping;
use geo_types::{Point, Rect, coord};

/// Default view before anything has been drawn.
pub const DEFAULT_ZOOM: f64 = 8.0;
/// Zoom used when centering on the current position.
pub const CLOSE_ZOOM: f64 = 16.0;

/// Scene coordinates are `geo_types::Point` with x = longitude,
/// y = latitude.
pub fn ping_point(ping: &Ping) -> Point {
    Point::new(ping.longitude, ping.latitude)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutePath {
    /// Road-accurate path returned by the directions provider.
    RoadSnapped(Vec<Point>),
    /// Great-circle polyline straight through the raw pings.
    Fallback(Vec<Point>),
}

impl RoutePath {
    pub fn points(&self) -> &[Point] {
        match self {
            RoutePath::RoadSnapped(points) | RoutePath::Fallback(points) => points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Checkpoint,
    CurrentPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: Point,
    pub kind: MarkerKind,
    /// Shown when the marker is activated.
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseLayer {
    Streets,
    Satellite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub center: Point,
    pub zoom: f64,
    /// Set when the view was fitted to a drawn route.
    pub bounds: Option<Rect>,
}

/// Headless model of the rendered map surface. The reconstruction engine
/// and the playback controller are the only writers.
#[derive(Debug)]
pub struct MapScene {
    pub route: Option<RoutePath>,
    pub markers: Vec<Marker>,
    pub viewport: Viewport,
    pub route_visible: bool,
    pub checkpoints_visible: bool,
    pub base_layer: BaseLayer,
    /// Newest live coordinate, kept so playback can snap back to it.
    pub live_position: Option<Point>,
}

impl Default for MapScene {
    fn default() -> Self {
        Self {
            route: None,
            markers: Vec::new(),
            viewport: Viewport {
                center: Point::new(0.0, 0.0),
                zoom: DEFAULT_ZOOM,
                bounds: None,
            },
            route_visible: true,
            checkpoints_visible: true,
            base_layer: BaseLayer::Streets,
            live_position: None,
        }
    }
}

impl MapScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the drawn route and all markers. Every redraw starts here,
    /// so nothing accumulates across updates.
    pub fn clear_drawn(&mut self) {
        self.route = None;
        self.markers.clear();
    }

    pub fn set_view(&mut self, center: Point, zoom: f64) {
        self.viewport = Viewport {
            center,
            zoom,
            bounds: None,
        };
    }

    /// Fits the viewport to the given bounds, keeping the zoom level for
    /// the renderer to resolve.
    pub fn fit_bounds(&mut self, bounds: Rect) {
        self.viewport = Viewport {
            center: bounds.center().into(),
            zoom: self.viewport.zoom,
            bounds: Some(bounds),
        };
    }

    pub fn current_marker(&self) -> Option<&Marker> {
        self.markers
            .iter()
            .find(|m| m.kind == MarkerKind::CurrentPosition)
    }

    /// Moves the current-position marker, creating it if the scene has
    /// none yet.
    pub fn set_current_position(&mut self, position: Point) {
        if let Some(marker) = self
            .markers
            .iter_mut()
            .find(|m| m.kind == MarkerKind::CurrentPosition)
        {
            marker.position = position;
        } else {
            self.markers.push(Marker {
                position,
                kind: MarkerKind::CurrentPosition,
                label: String::new(),
            });
        }
    }

    pub fn toggle_route(&mut self) {
        self.route_visible = !self.route_visible;
    }

    pub fn toggle_checkpoints(&mut self) {
        self.checkpoints_visible = !self.checkpoints_visible;
    }

    pub fn set_base_layer(&mut self, layer: BaseLayer) {
        self.base_layer = layer;
    }
}

/// Smallest rectangle containing all of `points`.
pub fn bounds_of(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let (mut min_x, mut min_y) = (first.x(), first.y());
    let (mut max_x, mut max_y) = (first.x(), first.y());

    for point in points {
        min_x = min_x.min(point.x());
        min_y = min_y.min(point.y());
        max_x = max_x.max(point.x());
        max_y = max_y.max(point.y());
    }

    Some(Rect::new(
        coord! { x: min_x, y: min_y },
        coord! { x: max_x, y: max_y },
    ))
}
