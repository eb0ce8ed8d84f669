use async_trait::async_trait;
use fleet_tracker_lib::ping::Ping;
use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::scene::ping_point;

/// The provider caps origin + destination + waypoints at 25 per request,
/// which leaves 23 slots for intermediate waypoints.
pub const MAX_WAYPOINTS: usize = 23;

#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    #[error("directions request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directions request rejected: {0}")]
    Rejected(reqwest::StatusCode),
}

/// External road-routing service. Failures carry no more meaning to the
/// caller than "fall back to geodesic rendering".
#[async_trait]
pub trait DirectionsProvider: Send + Sync + 'static {
    /// Requests one driving-mode route through the given waypoints.
    async fn driving_route(
        &self,
        origin: Point,
        destination: Point,
        waypoints: &[Point],
    ) -> Result<Vec<Point>, DirectionsError>;
}

/// Picks at most [`MAX_WAYPOINTS`] intermediate pings, preserving order.
/// Short runs pass through untouched; longer ones are downsampled by
/// taking every `n / 23`-th ping until 23 are selected, which keeps the
/// overall shape and always respects the provider ceiling.
pub fn select_waypoints(intermediate: &[Ping]) -> Vec<Point> {
    if intermediate.len() <= MAX_WAYPOINTS {
        return intermediate.iter().map(ping_point).collect();
    }

    let step = intermediate.len() / MAX_WAYPOINTS;
    intermediate
        .iter()
        .step_by(step)
        .take(MAX_WAYPOINTS)
        .map(ping_point)
        .collect()
}

#[derive(Serialize)]
struct WirePoint {
    latitude: f64,
    longitude: f64,
}

impl From<Point> for WirePoint {
    fn from(point: Point) -> Self {
        Self {
            latitude: point.y(),
            longitude: point.x(),
        }
    }
}

#[derive(Serialize)]
struct RouteRequest {
    origin: WirePoint,
    destination: WirePoint,
    waypoints: Vec<WirePoint>,
    mode: &'static str,
}

#[derive(Deserialize)]
struct RouteResponse {
    path: Vec<ResponsePoint>,
}

#[derive(Deserialize)]
struct ResponsePoint {
    latitude: f64,
    longitude: f64,
}

pub struct HttpDirectionsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpDirectionsProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl DirectionsProvider for HttpDirectionsProvider {
    async fn driving_route(
        &self,
        origin: Point,
        destination: Point,
        waypoints: &[Point],
    ) -> Result<Vec<Point>, DirectionsError> {
        let request = RouteRequest {
            origin: origin.into(),
            destination: destination.into(),
            waypoints: waypoints.iter().copied().map(Into::into).collect(),
            mode: "driving",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectionsError::Rejected(response.status()));
        }

        let route: RouteResponse = response.json().await?;
        Ok(route
            .path
            .into_iter()
            .map(|p| Point::new(p.longitude, p.latitude))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn pings(count: usize) -> Vec<Ping> {
        (0..count)
            .map(|i| {
                Ping::new(
                    56.0 + i as f64 * 0.01,
                    10.0,
                    Utc::now() - Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    #[test]
    fn small_counts_pass_through_in_order() {
        for count in [0, 1, 5, MAX_WAYPOINTS] {
            let input = pings(count);
            let selected = select_waypoints(&input);
            assert_eq!(selected.len(), count);
            let expected: Vec<Point> = input.iter().map(ping_point).collect();
            assert_eq!(selected, expected);
        }
    }

    #[test]
    fn twenty_eight_intermediates_take_the_first_twenty_three() {
        // A 30-ping sequence has 28 intermediates: step = 28 / 23 = 1,
        // so the first 23 are used.
        let input = pings(28);
        let selected = select_waypoints(&input);

        assert_eq!(selected.len(), MAX_WAYPOINTS);
        let expected: Vec<Point> = input[..MAX_WAYPOINTS].iter().map(ping_point).collect();
        assert_eq!(selected, expected);
    }

    #[test]
    fn large_counts_are_downsampled_evenly() {
        let input = pings(100);
        let selected = select_waypoints(&input);

        // step = 100 / 23 = 4: every fourth ping, first 23 of them.
        assert_eq!(selected.len(), MAX_WAYPOINTS);
        assert_eq!(selected[0], ping_point(&input[0]));
        assert_eq!(selected[1], ping_point(&input[4]));
        assert_eq!(selected[22], ping_point(&input[88]));
    }

    #[test]
    fn never_exceeds_the_ceiling() {
        for count in [24, 47, 230, 1000] {
            assert_eq!(select_waypoints(&pings(count)).len(), MAX_WAYPOINTS);
        }
    }
}
