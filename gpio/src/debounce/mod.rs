use std::time::{Duration, Instant};

/// A schedule-once debounce timer.
///
/// Started when a disambiguation window opens and consulted until it fires;
/// a window is never re-armed, a new one is started instead.
#[derive(Copy, Clone, Debug)]
pub struct DebounceWindow {
    deadline: Instant,
}

impl DebounceWindow {
    pub fn start(length: Duration) -> Self {
        DebounceWindow {
            deadline: Instant::now() + length,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_window_is_expired() {
        let window = DebounceWindow::start(Duration::ZERO);
        assert!(window.expired());
    }

    #[test]
    fn long_window_is_pending() {
        let window = DebounceWindow::start(Duration::from_secs(3600));
        assert!(!window.expired());
        assert!(window.deadline() > Instant::now());
    }
}
