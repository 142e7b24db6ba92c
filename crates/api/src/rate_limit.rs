use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window request limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct ClientRateLimiter {
    windows: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl ClientRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests,
        }
    }

    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    fn allow_at(&self, client: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock();

        // Forget clients whose newest hit has left the window.
        windows.retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.duration_since(*last) <= self.window)
        });

        let hits = windows.entry(client.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.duration_since(*first) > self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests {
            if hits.is_empty() {
                windows.remove(client);
            }
            return false;
        }
        hits.push_back(now);
        true
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}
