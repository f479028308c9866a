use super::TranslateError;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

const DEFAULT_DT_MIN: Duration = Duration::from_millis(1);
const DEFAULT_DT_MAX: Duration = Duration::from_millis(50);
const SLOWDOWN_DEBOUNCE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
struct Timing {
    dt_min: Duration,
    dt_max: Duration,
    last_request: Instant,
}

impl Timing {
    fn new(now: Instant) -> Self {
        Timing {
            dt_min: DEFAULT_DT_MIN,
            dt_max: DEFAULT_DT_MAX,
            last_request: now,
        }
    }

    fn mid(&self) -> Duration {
        (self.dt_min + self.dt_max) / 2
    }
}

/// Adaptive pacing for calls to a slow, flaky upstream.
///
/// Each label keeps a window `[dt_min, dt_max]`; a call may start once more
/// than the window midpoint has passed since the previous one. Successes
/// narrow the window, failures and timeouts widen it before retrying.
#[derive(Debug)]
pub struct RateLimiter {
    timings: Mutex<HashMap<String, Timing>>,
    last_slowdown: Mutex<Instant>,
    request_timeout: Duration,
    max_attempts: u32,
}

impl RateLimiter {
    pub fn new(request_timeout: Duration, max_attempts: u32) -> Self {
        RateLimiter {
            timings: Mutex::new(HashMap::new()),
            last_slowdown: Mutex::new(Instant::now()),
            request_timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs `call` under `label`'s pacing, retrying failures and timeouts
    /// until it succeeds or `max_attempts` calls have been made.
    pub async fn call<F, Fut, T, E>(&self, label: &str, mut call: F) -> Result<T, TranslateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            self.wait_turn(label).await;
            match timeout(self.request_timeout, call()).await {
                Ok(Ok(value)) => {
                    self.speed_up(label);
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    warn!("{} attempt {}/{} failed: {}", label, attempt, self.max_attempts, e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        "{} attempt {}/{} timed out after {:?}",
                        label, attempt, self.max_attempts, self.request_timeout
                    );
                    last_error = format!("timed out after {:?}", self.request_timeout);
                }
            }
            self.slow_down(label);
        }

        Err(TranslateError::Exhausted {
            label: label.to_string(),
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn wait_turn(&self, label: &str) {
        loop {
            let pause = {
                let mut timings = self.timings();
                let now = Instant::now();
                let timing = timings
                    .entry(label.to_string())
                    .or_insert_with(|| Timing::new(now));
                if now.duration_since(timing.last_request) > timing.mid() {
                    timing.last_request = now;
                    None
                } else {
                    Some(timing.dt_min)
                }
            };
            match pause {
                Some(pause) => sleep(pause).await,
                None => return,
            }
        }
    }

    fn speed_up(&self, label: &str) {
        if let Some(timing) = self.timings().get_mut(label) {
            timing.dt_max = timing.mid();
            timing.dt_min = timing.dt_min.mul_f64(0.999);
            debug!("speed up {}: {:?} {:?}", label, timing.dt_min, timing.dt_max);
        }
    }

    fn slow_down(&self, label: &str) {
        let now = Instant::now();
        let mut last_slowdown = self
            .last_slowdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if now.duration_since(*last_slowdown) <= SLOWDOWN_DEBOUNCE {
            return;
        }
        *last_slowdown = now;

        if let Some(timing) = self.timings().get_mut(label) {
            timing.dt_min = timing.mid();
            timing.dt_max = timing.dt_max.mul_f64(1.01);
            debug!("slow down {}: {:?} {:?}", label, timing.dt_min, timing.dt_max);
        }
    }

    fn timings(&self) -> std::sync::MutexGuard<'_, HashMap<String, Timing>> {
        self.timings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn window(&self, label: &str) -> Option<(Duration, Duration)> {
        self.timings()
            .get(label)
            .map(|timing| (timing.dt_min, timing.dt_max))
    }
}
