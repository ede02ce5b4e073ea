pub trait Clock: Send {
    fn now_epoch_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_ms(&self) -> i64 {
        self.0
    }
}
