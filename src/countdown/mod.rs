//! Countdown lifecycle service for active skill timers.
//!
//! Timers are keyed by skill id; refreshing an existing id replaces its
//! schedule in place, which is what keeps the at-most-one-active-timer
//! invariant.  The service owns no thread — drive it from the trigger
//! callback path and a periodic external tick calling
//! [`CountdownService::emit_updates`].  Callers serialize access (in
//! practice by holding it behind a mutex); the service itself does not
//! lock.
//!
//! The clock is injectable for tests: either swap the time source or pass
//! an explicit `now` to any operation.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Events and snapshots
// ---------------------------------------------------------------------------

/// Event kinds emitted by the countdown lifecycle service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEventKind {
    Updated,
    Removed,
}

/// Immutable event payload emitted for countdown updates and removals.
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownEvent {
    pub kind: CountdownEventKind,
    pub skill_id: i64,
    pub duration_secs: f64,
    pub remaining_secs: f64,
    pub completed: bool,
}

/// Read-only snapshot of one active countdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCountdown {
    pub skill_id: i64,
    pub duration_secs: f64,
    pub started_at: f64,
    pub ends_at: f64,
    pub remaining_secs: f64,
}

/// Invalid input to the countdown service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CountdownError {
    /// Durations must be finite and >= 0; zero means "already expired".
    #[error("duration must be >= 0 seconds, got {0}")]
    InvalidDuration(f64),
}

// ---------------------------------------------------------------------------
// Internal timer state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TimerState {
    duration_secs: f64,
    started_at: f64,
    ends_at: f64,
}

impl TimerState {
    fn remaining(&self, now: f64) -> f64 {
        (self.ends_at - now).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Monotonic seconds provider.  The default counts from process start.
pub type TimeSource = Arc<dyn Fn() -> f64 + Send + Sync>;

fn monotonic_secs() -> f64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// Handle returned by [`CountdownService::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SubscriberCallback = Box<dyn Fn(&CountdownEvent) + Send>;

// ---------------------------------------------------------------------------
// CountdownService
// ---------------------------------------------------------------------------

/// Owns countdown timer lifecycle independent of any capture or GUI layer.
pub struct CountdownService {
    time_source: TimeSource,
    timers: BTreeMap<i64, TimerState>,
    subscribers: Vec<(SubscriptionId, SubscriberCallback)>,
    next_subscription: u64,
}

impl CountdownService {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(monotonic_secs))
    }

    pub fn with_time_source(time_source: TimeSource) -> Self {
        Self {
            time_source,
            timers: BTreeMap::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Register an event subscriber; callbacks run synchronously, in
    /// subscription order, once per resulting event.
    pub fn subscribe(
        &mut self,
        callback: impl Fn(&CountdownEvent) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber; returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Number of currently active countdowns.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Start or restart a countdown by skill id.
    ///
    /// Existing ids are refreshed in place so a skill never has two live
    /// timers.  A zero duration means "already expired": any existing timer
    /// is removed and a completed removal is emitted immediately.  Negative
    /// or non-finite durations are rejected.
    pub fn refresh(
        &mut self,
        skill_id: i64,
        duration_secs: f64,
        now: Option<f64>,
    ) -> Result<CountdownEvent, CountdownError> {
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(CountdownError::InvalidDuration(duration_secs));
        }
        let now = self.resolve_now(now);

        if duration_secs == 0.0 {
            self.timers.remove(&skill_id);
            let event = CountdownEvent {
                kind: CountdownEventKind::Removed,
                skill_id,
                duration_secs: 0.0,
                remaining_secs: 0.0,
                completed: true,
            };
            self.notify(&event);
            return Ok(event);
        }

        let state = TimerState {
            duration_secs,
            started_at: now,
            ends_at: now + duration_secs,
        };
        self.timers.insert(skill_id, state);
        let event = CountdownEvent {
            kind: CountdownEventKind::Updated,
            skill_id,
            duration_secs,
            remaining_secs: duration_secs,
            completed: false,
        };
        self.notify(&event);
        Ok(event)
    }

    /// Remove an active countdown and emit a removal event.
    ///
    /// `completed` marks the removal as an expiry (remaining reported as
    /// zero) rather than a cancellation (remaining reported as time left).
    /// Returns `None` when no timer existed for the id.
    pub fn remove(
        &mut self,
        skill_id: i64,
        completed: bool,
        now: Option<f64>,
    ) -> Option<CountdownEvent> {
        let state = self.timers.remove(&skill_id)?;
        let now = self.resolve_now(now);
        let event = CountdownEvent {
            kind: CountdownEventKind::Removed,
            skill_id,
            duration_secs: state.duration_secs,
            remaining_secs: if completed { 0.0 } else { state.remaining(now) },
            completed,
        };
        self.notify(&event);
        Some(event)
    }

    /// Emit one event per active countdown at `now`.
    ///
    /// Expired timers emit a completed removal and leave the active set;
    /// live timers emit an update with their remaining time.  One call can
    /// mix both.  This is the only operation a periodic tick needs.
    pub fn emit_updates(&mut self, now: Option<f64>) -> Vec<CountdownEvent> {
        let now = self.resolve_now(now);
        let mut events = Vec::with_capacity(self.timers.len());
        let mut expired = Vec::new();

        for (skill_id, state) in &self.timers {
            let remaining = state.remaining(now);
            if remaining <= 0.0 {
                expired.push(*skill_id);
                events.push(CountdownEvent {
                    kind: CountdownEventKind::Removed,
                    skill_id: *skill_id,
                    duration_secs: state.duration_secs,
                    remaining_secs: 0.0,
                    completed: true,
                });
            } else {
                events.push(CountdownEvent {
                    kind: CountdownEventKind::Updated,
                    skill_id: *skill_id,
                    duration_secs: state.duration_secs,
                    remaining_secs: remaining,
                    completed: false,
                });
            }
        }

        for skill_id in expired {
            self.timers.remove(&skill_id);
        }
        for event in &events {
            self.notify(event);
        }
        events
    }

    /// Snapshot of one active countdown, if present.
    pub fn get_active(&self, skill_id: i64, now: Option<f64>) -> Option<ActiveCountdown> {
        let state = self.timers.get(&skill_id)?;
        let now = self.resolve_now(now);
        Some(self.snapshot(skill_id, state, now))
    }

    /// Snapshots of all active countdowns, ordered by skill id.
    pub fn list_active(&self, now: Option<f64>) -> Vec<ActiveCountdown> {
        let now = self.resolve_now(now);
        self.timers
            .iter()
            .map(|(skill_id, state)| self.snapshot(*skill_id, state, now))
            .collect()
    }

    /// Drop all active timers without emitting events.  Used at session
    /// boundaries where subscribers expect a clean slate, not a burst of
    /// removals.
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    fn snapshot(&self, skill_id: i64, state: &TimerState, now: f64) -> ActiveCountdown {
        ActiveCountdown {
            skill_id,
            duration_secs: state.duration_secs,
            started_at: state.started_at,
            ends_at: state.ends_at,
            remaining_secs: state.remaining(now),
        }
    }

    fn resolve_now(&self, now: Option<f64>) -> f64 {
        now.unwrap_or_else(|| (self.time_source)())
    }

    fn notify(&self, event: &CountdownEvent) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }
}

impl Default for CountdownService {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collector() -> (Arc<Mutex<Vec<CountdownEvent>>>, impl Fn(&CountdownEvent) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |event: &CountdownEvent| seen.lock().unwrap().push(event.clone())
        };
        (seen, sink)
    }

    // ---- Refresh -----------------------------------------------------------

    #[test]
    fn refresh_twice_keeps_one_timer() {
        let mut service = CountdownService::new();
        service.refresh(7, 5.0, Some(0.0)).expect("refresh");
        assert_eq!(service.active_count(), 1);
        service.refresh(7, 5.0, Some(1.0)).expect("refresh");
        assert_eq!(service.active_count(), 1);

        // The replacement restarted the schedule.
        let active = service.get_active(7, Some(1.0)).expect("active");
        assert_eq!(active.started_at, 1.0);
        assert_eq!(active.ends_at, 6.0);
        assert_eq!(active.remaining_secs, 5.0);
    }

    #[test]
    fn zero_duration_is_an_immediate_completed_removal() {
        let mut service = CountdownService::new();
        let (seen, sink) = collector();
        service.subscribe(sink);

        service.refresh(1, 3.0, Some(0.0)).expect("refresh");
        let event = service.refresh(1, 0.0, Some(1.0)).expect("refresh");

        assert_eq!(event.kind, CountdownEventKind::Removed);
        assert!(event.completed);
        assert_eq!(event.remaining_secs, 0.0);
        assert_eq!(service.active_count(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].kind, CountdownEventKind::Removed);
    }

    #[test]
    fn negative_duration_is_rejected_and_creates_nothing() {
        let mut service = CountdownService::new();
        let result = service.refresh(5, -1.0, Some(0.0));
        assert_eq!(result, Err(CountdownError::InvalidDuration(-1.0)));
        assert_eq!(service.active_count(), 0);
    }

    #[test]
    fn refresh_emits_updated_with_full_duration() {
        let mut service = CountdownService::new();
        let event = service.refresh(2, 4.5, Some(10.0)).expect("refresh");
        assert_eq!(event.kind, CountdownEventKind::Updated);
        assert_eq!(event.remaining_secs, 4.5);
        assert!(!event.completed);
    }

    // ---- Remove ------------------------------------------------------------

    #[test]
    fn remove_reports_time_left_unless_completed() {
        let mut service = CountdownService::new();
        service.refresh(3, 10.0, Some(0.0)).expect("refresh");

        let cancelled = service.remove(3, false, Some(4.0)).expect("event");
        assert_eq!(cancelled.remaining_secs, 6.0);
        assert!(!cancelled.completed);

        service.refresh(3, 10.0, Some(0.0)).expect("refresh");
        let completed = service.remove(3, true, Some(4.0)).expect("event");
        assert_eq!(completed.remaining_secs, 0.0);
        assert!(completed.completed);

        assert!(service.remove(3, false, Some(5.0)).is_none());
    }

    // ---- Tick --------------------------------------------------------------

    #[test]
    fn emit_updates_mixes_completions_and_live_updates() {
        let mut service = CountdownService::new();
        service.refresh(1, 1.0, Some(0.0)).expect("refresh"); // expires at 1.0
        service.refresh(2, 3.0, Some(0.0)).expect("refresh"); // expires at 3.0

        let events = service.emit_updates(Some(1.5));
        assert_eq!(events.len(), 2);

        let expired = &events[0];
        assert_eq!(expired.skill_id, 1);
        assert_eq!(expired.kind, CountdownEventKind::Removed);
        assert!(expired.completed);
        assert_eq!(expired.remaining_secs, 0.0);

        let live = &events[1];
        assert_eq!(live.skill_id, 2);
        assert_eq!(live.kind, CountdownEventKind::Updated);
        assert_eq!(live.remaining_secs, 1.5);

        assert_eq!(service.active_count(), 1);
    }

    #[test]
    fn injected_time_source_drives_implicit_now() {
        let clock = Arc::new(Mutex::new(0.0_f64));
        let source: TimeSource = {
            let clock = Arc::clone(&clock);
            Arc::new(move || *clock.lock().unwrap())
        };
        let mut service = CountdownService::with_time_source(source);

        service.refresh(4, 2.0, None).expect("refresh");
        *clock.lock().unwrap() = 2.5;
        let events = service.emit_updates(None);
        assert_eq!(events.len(), 1);
        assert!(events[0].completed);
        assert_eq!(service.active_count(), 0);
    }

    // ---- Snapshots ---------------------------------------------------------

    #[test]
    fn list_active_is_ordered_by_skill_id() {
        let mut service = CountdownService::new();
        service.refresh(9, 5.0, Some(0.0)).expect("refresh");
        service.refresh(1, 5.0, Some(0.0)).expect("refresh");
        service.refresh(4, 5.0, Some(0.0)).expect("refresh");

        let ids: Vec<i64> = service
            .list_active(Some(0.0))
            .iter()
            .map(|a| a.skill_id)
            .collect();
        assert_eq!(ids, vec![1, 4, 9]);
    }

    #[test]
    fn clear_drops_timers_silently() {
        let mut service = CountdownService::new();
        let (seen, sink) = collector();
        service.subscribe(sink);
        service.refresh(1, 5.0, Some(0.0)).expect("refresh");

        let before = seen.lock().unwrap().len();
        service.clear();
        assert_eq!(service.active_count(), 0);
        assert_eq!(seen.lock().unwrap().len(), before);
    }

    // ---- Subscribers -------------------------------------------------------

    #[test]
    fn subscribers_fire_in_subscription_order() {
        let mut service = CountdownService::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            service.subscribe(move |_event| order.lock().unwrap().push(tag));
        }

        service.refresh(1, 2.0, Some(0.0)).expect("refresh");
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut service = CountdownService::new();
        let (seen, sink) = collector();
        let id = service.subscribe(sink);

        service.refresh(1, 2.0, Some(0.0)).expect("refresh");
        assert!(service.unsubscribe(id));
        assert!(!service.unsubscribe(id));
        service.refresh(1, 2.0, Some(1.0)).expect("refresh");

        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
