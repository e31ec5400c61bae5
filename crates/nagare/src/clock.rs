use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::Instant;

use crate::event::{EventSender, StreamEvent, Subscription};

/// The playback position the stream buffers ahead of.
pub trait PlaybackClock {
    /// Starts raising [`StreamEvent::TimeUpdate`] while the position moves and
    /// [`StreamEvent::Stalled`] once it stops moving without being paused.
    fn attach(&mut self, events: EventSender) -> Subscription;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    fn duration(&self) -> Option<f64>;

    fn paused(&self) -> bool;
}

#[derive(Debug)]
struct ClockState {
    position: f64,
    duration: Option<f64>,
    paused: bool,
    last_tick: Instant,
}

impl ClockState {
    fn advance(&mut self, speed: f64) {
        let now = Instant::now();
        if !self.paused {
            let elapsed = now.duration_since(self.last_tick).as_secs_f64();
            self.position += elapsed * speed;
            if let Some(duration) = self.duration {
                self.position = self.position.min(duration);
            }
        }
        self.last_tick = now;
    }
}

/// A clock that plays back in wall time, `speed` media seconds per second.
///
/// It stalls when it reaches the duration.
#[derive(Clone)]
pub struct WallClock {
    speed: f64,
    tick: Duration,
    state: Arc<Mutex<ClockState>>,
}

impl WallClock {
    pub fn new(speed: f64, tick: Duration) -> Self {
        Self {
            speed,
            tick,
            state: Arc::new(Mutex::new(ClockState {
                position: 0.0,
                duration: None,
                paused: false,
                last_tick: Instant::now(),
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ClockState) -> R) -> R {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    pub fn play(&self) {
        let speed = self.speed;
        self.with_state(|state| {
            state.advance(speed);
            state.paused = false;
        });
    }

    pub fn pause(&self) {
        let speed = self.speed;
        self.with_state(|state| {
            state.advance(speed);
            state.paused = true;
        });
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.with_state(|state| state.duration = duration);
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new(1.0, Duration::from_millis(250))
    }
}

impl PlaybackClock for WallClock {
    fn attach(&mut self, events: EventSender) -> Subscription {
        let state = self.state.clone();
        let speed = self.speed;
        let tick = self.tick;

        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // the first tick completes immediately
            interval.tick().await;

            let mut last_position = f64::NEG_INFINITY;
            let mut stalled = false;
            loop {
                interval.tick().await;
                if events.is_closed() {
                    break;
                }
                let (position, paused) = {
                    let mut state = match state.lock() {
                        Ok(state) => state,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    state.advance(speed);
                    (state.position, state.paused)
                };

                if position > last_position {
                    last_position = position;
                    stalled = false;
                    events.emit(StreamEvent::TimeUpdate);
                } else if !paused && !stalled {
                    stalled = true;
                    events.emit(StreamEvent::Stalled);
                }
            }
        });

        Subscription::new(move || ticker.abort())
    }

    fn current_time(&self) -> f64 {
        let speed = self.speed;
        self.with_state(|state| {
            state.advance(speed);
            state.position
        })
    }

    fn duration(&self) -> Option<f64> {
        self.with_state(|state| state.duration)
    }

    fn paused(&self) -> bool {
        self.with_state(|state| state.paused)
    }
}
