use std::collections::VecDeque;
use std::time::{Duration, Instant};

const MAX_TOASTS: usize = 5;
const TOAST_LIFETIME: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub level: Level,
    pub text: String,
    shown_at: Instant,
}

/// Short-lived notifications, oldest first. Pushing past capacity drops the oldest.
#[derive(Debug, Default)]
pub struct Toasts {
    queue: VecDeque<Toast>,
}

impl Toasts {
    pub fn push_at<T: Into<String>>(&mut self, level: Level, text: T, now: Instant) {
        if self.queue.len() >= MAX_TOASTS {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            level,
            text: text.into(),
            shown_at: now,
        });
    }

    pub fn info<T: Into<String>>(&mut self, text: T) {
        self.push_at(Level::Info, text, Instant::now());
    }

    pub fn success<T: Into<String>>(&mut self, text: T) {
        self.push_at(Level::Success, text, Instant::now());
    }

    pub fn warn<T: Into<String>>(&mut self, text: T) {
        self.push_at(Level::Warning, text, Instant::now());
    }

    pub fn error<T: Into<String>>(&mut self, text: T) {
        self.push_at(Level::Error, text, Instant::now());
    }

    pub fn expire(&mut self, now: Instant) {
        self.queue
            .retain(|t| now.saturating_duration_since(t.shown_at) < TOAST_LIFETIME);
    }

    pub fn dismiss(&mut self, index: usize) {
        self.queue.remove(index);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }
}
