use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use fleet_tracker_lib::ping_sequence::PingSequence;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::scene::{MapScene, ping_point};

/// Delay between playback steps at 1x speed.
const STEP_INTERVAL_MS: f64 = 1000.0;

/// The speed multipliers the controls offer. Anything else is ignored.
pub const SPEED_STEPS: [f64; 4] = [0.5, 1.0, 2.0, 4.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub cursor: usize,
    pub speed_multiplier: f64,
    pub running: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            cursor: 0,
            speed_multiplier: 1.0,
            running: false,
        }
    }
}

/// Replays a ping sequence as an animation of the current-position
/// marker, newest to earliest, independent of live updates. While a
/// replay runs it owns the marker; live redraws leave it alone until
/// [`PlaybackController::stop`].
pub struct PlaybackController {
    scene: Arc<Mutex<MapScene>>,
    state: Arc<Mutex<PlaybackState>>,
    playback_active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackController {
    pub fn new(scene: Arc<Mutex<MapScene>>, playback_active: Arc<AtomicBool>) -> Self {
        Self {
            scene,
            state: Arc::new(Mutex::new(PlaybackState::default())),
            playback_active,
            task: None,
        }
    }

    pub async fn state(&self) -> PlaybackState {
        *self.state.lock().await
    }

    /// Speed only changes between runs; a running replay keeps its pace.
    pub async fn set_speed(&self, multiplier: f64) {
        if !SPEED_STEPS.contains(&multiplier) {
            tracing::debug!("ignoring unrecognized playback speed {multiplier}");
            return;
        }
        let mut state = self.state.lock().await;
        if state.running {
            return;
        }
        state.speed_multiplier = multiplier;
    }

    /// Starts replaying. No-op when a replay is already running or there
    /// is nothing to animate.
    pub async fn play(&mut self, pings: PingSequence) {
        if pings.len() < 2 {
            return;
        }

        let delay = {
            let mut state = self.state.lock().await;
            if state.running {
                return;
            }
            state.running = true;
            state.cursor = 0;
            Duration::from_millis((STEP_INTERVAL_MS / state.speed_multiplier) as u64)
        };

        self.playback_active.store(true, Ordering::SeqCst);

        let scene = self.scene.clone();
        let state = self.state.clone();
        let playback_active = self.playback_active.clone();

        self.task = Some(tokio::spawn(async move {
            let last = pings.len() - 1;
            loop {
                let cursor = state.lock().await.cursor;
                if let Some(ping) = pings.get(cursor) {
                    scene.lock().await.set_current_position(ping_point(ping));
                }
                if cursor >= last {
                    break;
                }
                state.lock().await.cursor = cursor + 1;
                tokio::time::sleep(delay).await;
            }

            state.lock().await.running = false;
            playback_active.store(false, Ordering::SeqCst);
        }));
    }

    /// Cancels the pending step so no late step can fire, resets the
    /// state and snaps the marker back to the live position when one is
    /// known.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        *self.state.lock().await = PlaybackState::default();
        self.playback_active.store(false, Ordering::SeqCst);

        let mut scene = self.scene.lock().await;
        if let Some(live) = scene.live_position {
            scene.set_current_position(live);
        }
    }
}
