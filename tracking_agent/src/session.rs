use fleet_tracker_lib::ping::Ping;

/// Everything the agent holds for one tracked route. Created on start,
/// wiped on stop, and passed explicitly into every handler so there is no
/// ambient mutable state.
#[derive(Debug, Default)]
pub struct TrackingSession {
    pub route_id: Option<String>,
    pub auth_token: Option<String>,
    pub last_reported: Option<Ping>,
    pub active: bool,
}

impl TrackingSession {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
