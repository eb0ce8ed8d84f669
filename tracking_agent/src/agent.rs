use std::time::Duration;

use fleet_tracker_lib::{
    comms::{AgentMessage, ConsumerMessage},
    ping::Ping,
};
use tokio::{
    sync::{broadcast, mpsc},
    time::{Interval, MissedTickBehavior, interval},
};

use crate::{session::TrackingSession, transport::PingTransport};

/// Ask for a fresh position every two minutes while tracking.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Samples closer than this to the last reported position are not worth
/// reporting again.
pub const MIN_MOVEMENT_METERS: f64 = 10.0;

/// Accept a sample when nothing was reported yet, or when it moved
/// strictly more than [`MIN_MOVEMENT_METERS`] since the last report.
/// A sample sitting exactly on the threshold is dropped.
pub fn movement_filter(last_reported: Option<&Ping>, sample: &Ping) -> bool {
    match last_reported {
        None => true,
        Some(last) => last.distance_to(sample) > MIN_MOVEMENT_METERS,
    }
}

/// Handle to a running agent task. Cheap to clone; one handle per
/// consumer.
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<ConsumerMessage>,
    requests: broadcast::Sender<AgentMessage>,
}

impl AgentHandle {
    pub async fn send(&self, message: ConsumerMessage) {
        if self.commands.send(message).await.is_err() {
            tracing::error!("agent task is gone");
        }
    }

    pub async fn start(&self, route_id: impl Into<String>) {
        self.send(ConsumerMessage::StartTracking {
            route_id: route_id.into(),
        })
        .await;
    }

    pub async fn stop(&self) {
        self.send(ConsumerMessage::StopTracking).await;
    }

    pub async fn update_route(&self, route_id: impl Into<String>) {
        self.send(ConsumerMessage::UpdateRoute {
            route_id: route_id.into(),
        })
        .await;
    }

    pub async fn update_token(&self, token: impl Into<String>) {
        self.send(ConsumerMessage::UpdateToken {
            token: token.into(),
        })
        .await;
    }

    pub async fn reply_position(&self, location: Ping) {
        self.send(ConsumerMessage::PositionReply { location }).await;
    }

    /// Subscribe to the position requests the agent broadcasts each poll
    /// cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentMessage> {
        self.requests.subscribe()
    }
}

/// The resident tracking process. Single task, cooperative: commands,
/// poll ticks and position replies are handled one at a time, so the
/// session needs no locking. Every failure is absorbed here; nothing
/// escalates out of the loop.
pub struct TrackingAgent<T: PingTransport> {
    session: TrackingSession,
    transport: T,
    requests: broadcast::Sender<AgentMessage>,
    poll_interval: Duration,
    /// Set when a position request went out and no reply came back yet.
    /// Still set at the next tick means the window expired: a sampling
    /// gap, not an error.
    awaiting_reply: bool,
}

impl<T: PingTransport> TrackingAgent<T> {
    pub fn spawn(transport: T) -> AgentHandle {
        Self::spawn_with_interval(transport, POLL_INTERVAL)
    }

    pub fn spawn_with_interval(transport: T, poll_interval: Duration) -> AgentHandle {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (requests_tx, _) = broadcast::channel(16);

        let agent = TrackingAgent {
            session: TrackingSession::default(),
            transport,
            requests: requests_tx.clone(),
            poll_interval,
            awaiting_reply: false,
        };

        tokio::spawn(agent.run(commands_rx));

        AgentHandle {
            commands: commands_tx,
            requests: requests_tx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<ConsumerMessage>) {
        let mut poll = new_poll_timer(self.poll_interval);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut poll).await,
                    // All handles dropped, nothing can reach us anymore.
                    None => break,
                },
                _ = poll.tick(), if self.session.active => self.poll_cycle(),
            }
        }
    }

    async fn handle_command(&mut self, command: ConsumerMessage, poll: &mut Interval) {
        match command {
            ConsumerMessage::StartTracking { route_id } => {
                tracing::info!("tracking started for route {route_id}");
                self.session.clear();
                self.session.route_id = Some(route_id);
                self.session.active = true;
                self.awaiting_reply = false;
                // Re-arm the timer; its first tick fires immediately,
                // which doubles as the initial sample request.
                *poll = new_poll_timer(self.poll_interval);
            }
            ConsumerMessage::StopTracking => {
                tracing::info!("tracking stopped");
                self.session.clear();
                self.awaiting_reply = false;
            }
            ConsumerMessage::UpdateRoute { route_id } => {
                tracing::debug!("route updated to {route_id}");
                self.session.route_id = Some(route_id);
            }
            ConsumerMessage::UpdateToken { token } => {
                tracing::debug!("auth token updated");
                self.session.auth_token = Some(token);
            }
            ConsumerMessage::PositionReply { location } => {
                self.handle_sample(location).await;
            }
        }
    }

    /// One poll cycle: broadcast a position request to whoever is
    /// listening. Zero consumers means this cycle yields nothing.
    fn poll_cycle(&mut self) {
        if self.awaiting_reply {
            tracing::debug!("no position reply within the poll window, sampling gap");
            self.awaiting_reply = false;
        }

        let Some(route_id) = self.session.route_id.clone() else {
            return;
        };

        match self.requests.send(AgentMessage::PositionRequest { route_id }) {
            Ok(receivers) => {
                tracing::trace!("position request broadcast to {receivers} consumers");
                self.awaiting_reply = true;
            }
            Err(_) => tracing::debug!("no consumers connected, skipping sample cycle"),
        }
    }

    async fn handle_sample(&mut self, sample: Ping) {
        self.awaiting_reply = false;

        if !self.session.active {
            // Late reply after stop.
            return;
        }

        if !movement_filter(self.session.last_reported.as_ref(), &sample) {
            tracing::trace!("sample within {MIN_MOVEMENT_METERS} m of last report, dropped");
            return;
        }

        let Some(route_id) = self.session.route_id.clone() else {
            return;
        };
        let Some(token) = self.session.auth_token.clone() else {
            tracing::warn!("no auth token set, dropping accepted sample");
            return;
        };

        // The sample counts as reported once a send is attempted, even if
        // the send fails. Failed samples are lost, there is no retry.
        if let Err(err) = self.transport.send(&route_id, &token, &sample).await {
            tracing::warn!("failed to report ping: {err}");
        }
        self.session.last_reported = Some(sample);
    }
}

fn new_poll_timer(period: Duration) -> Interval {
    let mut poll = interval(period);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    poll
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::transport::TransportError;

    /// Offset in degrees latitude that moves a point by roughly the given
    /// number of meters.
    fn lat_offset(meters: f64) -> f64 {
        meters / 111_194.9
    }

    fn ping(latitude: f64) -> Ping {
        Ping::new(latitude, 10.0, Utc::now())
    }

    #[derive(Clone, Default)]
    struct RecordingTransport {
        calls: Arc<Mutex<Vec<(String, String, Ping)>>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, String, Ping)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PingTransport for RecordingTransport {
        async fn send(
            &self,
            route_id: &str,
            auth_token: &str,
            ping: &Ping,
        ) -> Result<(), TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((route_id.to_string(), auth_token.to_string(), ping.clone()));
            if self.fail {
                Err(TransportError::Status(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                ))
            } else {
                Ok(())
            }
        }
    }

    fn test_agent(transport: RecordingTransport) -> TrackingAgent<RecordingTransport> {
        let (requests, _) = broadcast::channel(16);
        TrackingAgent {
            session: TrackingSession::default(),
            transport,
            requests,
            poll_interval: POLL_INTERVAL,
            awaiting_reply: false,
        }
    }

    #[test]
    fn movement_filter_accepts_first_sample() {
        assert!(movement_filter(None, &ping(56.0)));
    }

    #[test]
    fn movement_filter_is_strictly_greater_than_threshold() {
        let last = ping(56.0);

        // ~9.99 m away: at or below the threshold, dropped.
        let near = ping(56.0 + lat_offset(9.99));
        assert!(!movement_filter(Some(&last), &near));

        // ~10.06 m away: strictly past the threshold, accepted.
        let far = ping(56.0 + lat_offset(10.06));
        assert!(movement_filter(Some(&last), &far));
    }

    #[tokio::test]
    async fn sample_without_token_is_dropped_before_transport() {
        let transport = RecordingTransport::default();
        let mut agent = test_agent(transport.clone());
        let mut poll = new_poll_timer(POLL_INTERVAL);

        agent
            .handle_command(
                ConsumerMessage::StartTracking {
                    route_id: "R1".into(),
                },
                &mut poll,
            )
            .await;

        agent.handle_sample(ping(56.0)).await;

        assert!(transport.calls().is_empty());
        assert!(agent.session.last_reported.is_none());
    }

    #[tokio::test]
    async fn nearby_sample_is_dropped() {
        let transport = RecordingTransport::default();
        let mut agent = test_agent(transport.clone());
        let mut poll = new_poll_timer(POLL_INTERVAL);

        agent
            .handle_command(
                ConsumerMessage::StartTracking {
                    route_id: "R1".into(),
                },
                &mut poll,
            )
            .await;
        agent
            .handle_command(
                ConsumerMessage::UpdateToken {
                    token: "secret".into(),
                },
                &mut poll,
            )
            .await;

        let first = ping(56.0);
        agent.handle_sample(first.clone()).await;

        // ~3 m further: suppressed, no second transport call.
        agent.handle_sample(ping(56.0 + lat_offset(3.0))).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "R1");
        assert_eq!(calls[0].1, "secret");
        assert_eq!(agent.session.last_reported, Some(first));
    }

    #[tokio::test]
    async fn failed_send_is_lost_but_counts_as_reported() {
        let transport = RecordingTransport::failing();
        let mut agent = test_agent(transport.clone());
        let mut poll = new_poll_timer(POLL_INTERVAL);

        agent
            .handle_command(
                ConsumerMessage::StartTracking {
                    route_id: "R1".into(),
                },
                &mut poll,
            )
            .await;
        agent
            .handle_command(
                ConsumerMessage::UpdateToken {
                    token: "secret".into(),
                },
                &mut poll,
            )
            .await;

        let sample = ping(56.0);
        agent.handle_sample(sample.clone()).await;

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(agent.session.last_reported, Some(sample));
    }

    #[tokio::test]
    async fn stop_clears_the_session() {
        let transport = RecordingTransport::default();
        let mut agent = test_agent(transport);
        let mut poll = new_poll_timer(POLL_INTERVAL);

        agent
            .handle_command(
                ConsumerMessage::StartTracking {
                    route_id: "R1".into(),
                },
                &mut poll,
            )
            .await;
        agent
            .handle_command(
                ConsumerMessage::UpdateToken {
                    token: "secret".into(),
                },
                &mut poll,
            )
            .await;
        agent.handle_command(ConsumerMessage::StopTracking, &mut poll).await;

        assert!(!agent.session.active);
        assert!(agent.session.route_id.is_none());
        assert!(agent.session.auth_token.is_none());
        assert!(agent.session.last_reported.is_none());
    }

    #[tokio::test]
    async fn update_route_does_not_touch_the_rest_of_the_session() {
        let transport = RecordingTransport::default();
        let mut agent = test_agent(transport.clone());
        let mut poll = new_poll_timer(POLL_INTERVAL);

        agent
            .handle_command(
                ConsumerMessage::StartTracking {
                    route_id: "R1".into(),
                },
                &mut poll,
            )
            .await;
        agent
            .handle_command(
                ConsumerMessage::UpdateToken {
                    token: "secret".into(),
                },
                &mut poll,
            )
            .await;
        agent
            .handle_command(
                ConsumerMessage::UpdateRoute {
                    route_id: "R2".into(),
                },
                &mut poll,
            )
            .await;

        assert!(agent.session.active);
        assert_eq!(agent.session.route_id.as_deref(), Some("R2"));
        assert_eq!(agent.session.auth_token.as_deref(), Some("secret"));

        agent.handle_sample(ping(56.0)).await;
        assert_eq!(transport.calls()[0].0, "R2");
    }

    #[tokio::test]
    async fn cycle_without_consumers_is_skipped() {
        let transport = RecordingTransport::default();
        let mut agent = test_agent(transport);
        let mut poll = new_poll_timer(POLL_INTERVAL);

        agent
            .handle_command(
                ConsumerMessage::StartTracking {
                    route_id: "R1".into(),
                },
                &mut poll,
            )
            .await;

        // No subscribers: the cycle yields nothing and no reply is
        // awaited.
        agent.poll_cycle();
        assert!(!agent.awaiting_reply);

        let _rx = agent.requests.subscribe();
        agent.poll_cycle();
        assert!(agent.awaiting_reply);
    }

    #[tokio::test(start_paused = true)]
    async fn start_requests_a_sample_immediately_and_then_periodically() {
        let handle = TrackingAgent::spawn(RecordingTransport::default());
        let mut requests = handle.subscribe();

        handle.start("R1").await;

        let first = requests.recv().await.unwrap();
        assert_eq!(
            first,
            AgentMessage::PositionRequest {
                route_id: "R1".into()
            }
        );

        // The next request arrives one poll interval later (the paused
        // clock auto-advances while we wait).
        let second = requests.recv().await.unwrap();
        assert_eq!(
            second,
            AgentMessage::PositionRequest {
                route_id: "R1".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_after_stop_is_ignored() {
        let transport = RecordingTransport::default();
        let handle = TrackingAgent::spawn(transport.clone());
        let mut requests = handle.subscribe();

        handle.start("R1").await;
        handle.update_token("secret").await;
        requests.recv().await.unwrap();

        handle.stop().await;
        handle.reply_position(ping(56.0)).await;

        // Give the agent task a chance to process the queue.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(transport.calls().is_empty());
    }
}
