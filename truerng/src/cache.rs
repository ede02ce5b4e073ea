use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    clock::{Clock, SystemClock},
    notify::{LogNotifier, Notifier},
    source::{DECIMAL_PLACES, FetchResult, PendingFetch, RandomSource, validate_batch},
};

pub type Fallback = Box<dyn FnMut() -> f64 + Send>;

/// Raises values at or below machine epsilon to epsilon, so a draw is never 0.
pub fn clamp_positive(value: f64) -> f64 {
    if value <= f64::EPSILON {
        f64::EPSILON
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillPolicy {
    pub capacity: usize,
    pub refill_threshold: f64,
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self {
            capacity: 10,
            refill_threshold: 0.5,
        }
    }
}

impl FillPolicy {
    pub fn new(capacity: usize, refill_threshold: f64) -> Self {
        Self {
            capacity,
            refill_threshold,
        }
    }

    /// True once `len / capacity` has dropped strictly below the threshold.
    pub fn is_low(&self, len: usize) -> bool {
        (len as f64) / (self.capacity as f64) < self.refill_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Disabled,
    MissingCredential,
    EmptyBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    Fallback(FallbackReason),
}

pub struct SupplyCache {
    buffer: Vec<f64>,
    policy: FillPolicy,
    source: Option<Box<dyn RandomSource>>,
    in_flight: Option<PendingFetch>,
    enabled: bool,
    has_alerted: bool,
    show_seeds: bool,
    fallback: Fallback,
    clock: Box<dyn Clock>,
    notifier: Box<dyn Notifier>,
}

impl std::fmt::Debug for SupplyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupplyCache")
            .field("buffered", &self.buffer.len())
            .field("policy", &self.policy)
            .field("bound", &self.source.is_some())
            .field("awaiting_response", &self.in_flight.is_some())
            .field("enabled", &self.enabled)
            .field("has_alerted", &self.has_alerted)
            .finish()
    }
}

impl SupplyCache {
    pub fn new(fallback: impl FnMut() -> f64 + Send + 'static) -> Self {
        Self {
            buffer: Vec::new(),
            policy: FillPolicy::default(),
            source: None,
            in_flight: None,
            enabled: true,
            has_alerted: false,
            show_seeds: false,
            fallback: Box::new(fallback),
            clock: Box::new(SystemClock),
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn configure(&mut self, capacity: usize, refill_threshold: f64) {
        log::debug!("Fill policy: capacity {capacity}, refill below {refill_threshold}");
        self.policy = FillPolicy::new(capacity, refill_threshold);
    }

    /// Replaces the source. A fetch already in flight is left alone and its
    /// values are still appended when it lands.
    pub fn bind(&mut self, source: Option<Box<dyn RandomSource>>) {
        self.source = source;
        if self.source.is_some() {
            log::debug!("Random source bound");
            self.refill();
        } else {
            log::debug!("Random source unbound");
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::debug!("Enabled: {enabled}");
        }
        self.enabled = enabled;
    }

    pub fn set_show_seeds(&mut self, show_seeds: bool) {
        self.show_seeds = show_seeds;
    }

    pub fn policy(&self) -> FillPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn has_alerted(&self) -> bool {
        self.has_alerted
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn buffer(&self) -> &[f64] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn has_usable_source(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.has_credential())
    }

    /// Requests a new batch of `capacity` values unless disabled, unbound, or a
    /// request is already outstanding. Never blocks.
    pub fn refill(&mut self) {
        if !self.enabled {
            return;
        }
        self.poll();
        if self.in_flight.is_some() {
            log::debug!("Refill skipped: still awaiting a response");
            return;
        }
        let Some(source) = self.source.as_ref().filter(|s| s.has_credential()) else {
            return;
        };
        let count = self.policy.capacity;
        log::debug!("Requesting {count} new random numbers");
        self.in_flight = Some(source.fetch(count, DECIMAL_PLACES));
    }

    /// Applies the in-flight fetch if it has finished. Returns whether one landed.
    pub fn poll(&mut self) -> bool {
        let Some(result) = self.in_flight.as_ref().and_then(|p| p.try_take()) else {
            return false;
        };
        if let Some(pending) = self.in_flight.take() {
            self.land(pending.requested(), result);
        }
        true
    }

    /// Blocks for at most `timeout` until the in-flight fetch lands. A disabled
    /// cache returns `false` at once and leaves the fetch parked.
    pub fn wait_for_refill(&mut self, timeout: Duration) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(result) = self.in_flight.as_ref().and_then(|p| p.wait(timeout)) else {
            return false;
        };
        if let Some(pending) = self.in_flight.take() {
            self.land(pending.requested(), result);
        }
        true
    }

    fn land(&mut self, requested: usize, result: FetchResult) {
        match result.and_then(|values| validate_batch(values, requested)) {
            Ok(values) => {
                log::debug!("New numbers: {values:?}");
                if self.show_seeds {
                    self.notifier.seeds_fetched(&values);
                }
                self.buffer.extend(values);
            }
            Err(e) => {
                log::warn!("Refill failed: {e}");
            }
        }
    }

    pub fn availability(&mut self) -> Availability {
        if !self.enabled {
            return Availability::Fallback(FallbackReason::Disabled);
        }
        self.poll();
        if !self.has_usable_source() {
            if !self.has_alerted {
                self.has_alerted = true;
                self.notifier.missing_credential();
            }
            return Availability::Fallback(FallbackReason::MissingCredential);
        }
        if self.buffer.is_empty() {
            self.refill();
            return Availability::Fallback(FallbackReason::EmptyBuffer);
        }
        Availability::Ready
    }

    /// Removes the value at `now_ms mod len` and returns it, clamped away from 0.
    /// Falls back if the buffer is empty.
    pub fn take(&mut self) -> f64 {
        if self.buffer.is_empty() {
            return self.fallback();
        }
        let len = self.buffer.len() as i64;
        let index = self.clock.now_epoch_ms().rem_euclid(len) as usize;
        clamp_positive(self.buffer.remove(index))
    }

    pub fn refill_if_low(&mut self) {
        if self.policy.is_low(self.buffer.len()) {
            self.refill();
        }
    }

    pub fn fallback(&mut self) -> f64 {
        clamp_positive((self.fallback)())
    }

    pub fn draw(&mut self) -> f64 {
        match self.availability() {
            Availability::Ready => {
                let value = self.take();
                self.refill_if_low();
                value
            }
            Availability::Fallback(reason) => {
                log::trace!("Fallback draw: {reason:?}");
                self.fallback()
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        notify::testing::RecordingNotifier,
        roller::Roller,
        source::{SourceError, testing::ScriptedSource},
    };

    pub fn test_cache() -> SupplyCache {
        let mut roller = Roller::test_rng();
        SupplyCache::new(move || roller.uniform())
    }

    /// A cache bound to a scripted source holding exactly `values`.
    pub fn loaded_cache(values: &[f64]) -> (SupplyCache, ScriptedSource) {
        let source = ScriptedSource::new();
        let mut cache = test_cache();
        cache.configure(values.len(), 0.5);
        cache.bind(Some(Box::new(source.clone())));
        source.resolve_next(Ok(values.to_vec()));
        assert!(cache.poll());
        (cache, source)
    }

    #[test]
    fn test_draw_picks_clock_index_and_clamps() {
        let (cache, _source) = loaded_cache(&[0.1, 0.9, 0.00000000001]);
        let mut cache = cache.with_clock(FixedClock(1_700_000_000_000));
        assert_eq!(1_700_000_000_000_i64 % 3, 2);

        let value = cache.draw();
        assert_eq!(value, f64::EPSILON);
        assert_eq!(cache.buffer(), &[0.1, 0.9]);
    }

    #[test]
    fn test_draw_removes_exactly_one() {
        let (cache, _source) = loaded_cache(&[0.1, 0.2, 0.3, 0.4]);
        let mut cache = cache.with_clock(FixedClock(1));
        let value = cache.draw();
        assert_eq!(value, 0.2);
        assert_eq!(cache.buffer(), &[0.1, 0.3, 0.4]);
    }

    #[test]
    fn test_draw_always_in_unit_interval() {
        let (mut cache, source) = loaded_cache(&[0.0, 0.5, 0.99999, 0.0]);
        for _ in 0..100 {
            let v = cache.draw();
            assert!(v.is_finite() && v > 0.0 && v < 1.0, "{v}");
        }
        assert!(source.requests().len() >= 2);

        let mut zero = SupplyCache::new(|| 0.0);
        zero.set_enabled(false);
        assert_eq!(zero.draw(), f64::EPSILON);
    }

    #[test]
    fn test_disabled_uses_fallback_without_touching_buffer() {
        let (mut cache, source) = loaded_cache(&[0.1, 0.2, 0.3]);
        cache.set_enabled(false);
        cache.set_enabled(false);
        assert!(!cache.is_enabled());

        let mut expected = Roller::test_rng();
        for _ in 0..10 {
            assert_eq!(cache.draw(), clamp_positive(expected.uniform()));
        }
        assert_eq!(cache.buffer(), &[0.1, 0.2, 0.3]);
        assert_eq!(source.requests().len(), 1);
    }

    #[test]
    fn test_refill_is_single_flight() {
        let source = ScriptedSource::new();
        let mut cache = test_cache();
        cache.bind(Some(Box::new(source.clone())));
        cache.refill();
        cache.refill();
        assert_eq!(source.requests().len(), 1);
        assert_eq!(source.outstanding(), 1);
        assert!(cache.is_awaiting_response());

        source.fill_next(0.5);
        cache.refill();
        assert_eq!(source.requests().len(), 2);
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_refill_threshold_is_strict() {
        let (mut cache, source) = loaded_cache(&[0.5; 10]);
        assert_eq!(cache.policy(), FillPolicy::new(10, 0.5));

        for _ in 0..5 {
            cache.draw();
        }
        assert_eq!(cache.len(), 5);
        assert_eq!(source.requests().len(), 1);

        cache.draw();
        assert_eq!(cache.len(), 4);
        assert_eq!(source.requests().len(), 2);
    }

    #[test]
    fn test_refill_appends_past_capacity() {
        let (mut cache, source) = loaded_cache(&[0.1, 0.2, 0.3]);
        cache.configure(10, 0.5);
        cache.refill();
        source.fill_next(0.7);
        assert!(cache.poll());
        assert_eq!(cache.len(), 13);
    }

    #[test]
    fn test_missing_credential_alerts_once() {
        let notifier = RecordingNotifier::default();
        let mut roller = Roller::test_rng();
        let mut cache = SupplyCache::new(move || roller.uniform()).with_notifier(notifier.clone());

        let mut expected = Roller::test_rng();
        assert_eq!(cache.draw(), clamp_positive(expected.uniform()));
        assert!(cache.has_alerted());
        assert_eq!(cache.draw(), clamp_positive(expected.uniform()));
        assert_eq!(notifier.alerts(), 1);

        cache.bind(Some(Box::new(ScriptedSource::without_credential())));
        cache.draw();
        assert_eq!(notifier.alerts(), 1);
    }

    #[test]
    fn test_empty_buffer_falls_back_and_refills() {
        let source = ScriptedSource::new();
        let mut cache = test_cache();
        cache.bind(Some(Box::new(source.clone())));
        assert_eq!(source.requests().len(), 1);

        let value = cache.draw();
        assert!(value > 0.0 && value < 1.0);
        assert_eq!(source.requests().len(), 1);

        source.fill_next(0.25);
        assert_eq!(cache.draw(), 0.25);
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn test_failed_or_short_fetch_leaves_buffer() {
        let (mut cache, source) = loaded_cache(&[0.1, 0.2, 0.3, 0.4]);
        cache.refill();
        source.resolve_next(Err(SourceError::Service {
            code: 503,
            message: "unavailable".to_string(),
        }));
        assert!(cache.poll());
        assert_eq!(cache.len(), 4);
        assert!(!cache.is_awaiting_response());

        cache.refill();
        source.resolve_next(Ok(vec![0.5, 0.5]));
        assert!(cache.poll());
        assert_eq!(cache.len(), 4);
        assert_eq!(source.requests().len(), 3);
    }

    #[test]
    fn test_stale_binding_still_appends() {
        let first = ScriptedSource::new();
        let second = ScriptedSource::new();
        let mut cache = test_cache();
        cache.bind(Some(Box::new(first.clone())));
        cache.bind(Some(Box::new(second.clone())));
        assert!(second.requests().is_empty());

        first.fill_next(0.3);
        assert!(cache.poll());
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_unbound_refill_is_noop() {
        let mut cache = test_cache();
        cache.refill();
        assert!(!cache.is_awaiting_response());
        assert!(!cache.poll());
    }

    struct ThreadedSource;

    impl RandomSource for ThreadedSource {
        fn has_credential(&self) -> bool {
            true
        }

        fn fetch(&self, count: usize, _decimal_places: u32) -> PendingFetch {
            PendingFetch::spawn(count, move || Ok(vec![0.42; count]))
        }
    }

    #[test]
    fn test_wait_for_refill_lands_spawned_fetch() {
        let mut cache = test_cache();
        cache.bind(Some(Box::new(ThreadedSource)));
        assert!(cache.wait_for_refill(Duration::from_secs(5)));
        assert_eq!(cache.len(), 10);
        assert!(!cache.wait_for_refill(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_for_refill_leaves_disabled_buffer_alone() {
        let mut cache = test_cache();
        cache.bind(Some(Box::new(ThreadedSource)));
        cache.set_enabled(false);

        assert!(!cache.wait_for_refill(Duration::from_secs(5)));
        assert_eq!(cache.len(), 0);
        assert!(cache.is_awaiting_response());

        cache.set_enabled(true);
        assert!(cache.wait_for_refill(Duration::from_secs(5)));
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_show_seeds_announces_batches() {
        let notifier = RecordingNotifier::default();
        let source = ScriptedSource::new();
        let mut cache = test_cache().with_notifier(notifier.clone());
        cache.configure(2, 0.5);
        cache.set_show_seeds(true);
        cache.bind(Some(Box::new(source.clone())));
        source.resolve_next(Ok(vec![0.1, 0.2]));
        cache.poll();
        assert_eq!(notifier.batches(), vec![vec![0.1, 0.2]]);
    }
}
