//! Session controller tying the router to the countdown service.
//!
//! [`TrackerRuntime`] is the piece an application embeds: it owns one
//! [`InputRouter`] and one [`CountdownService`], and wires triggered skills
//! into countdown refreshes.  Session boundaries are strict: held-modifier
//! state is reset and stale countdowns are cleared on every start and stop,
//! so nothing armed or ticking leaks from one session into the next.

use std::sync::{Arc, Mutex};

use crate::adapter::{ErrorCallback, InputError};
use crate::config::SkillRule;
use crate::countdown::CountdownService;
use crate::input::InputEvent;
use crate::router::InputRouter;

/// Owns router start/stop and the active countdown state.
pub struct TrackerRuntime {
    router: InputRouter,
    countdown: Arc<Mutex<CountdownService>>,
}

impl TrackerRuntime {
    /// Runtime over the standard keyboard/mouse/gamepad router.
    pub fn new() -> Self {
        Self::with_router(InputRouter::new())
    }

    /// Runtime over a caller-assembled router.
    pub fn with_router(router: InputRouter) -> Self {
        let countdown = Arc::new(Mutex::new(CountdownService::new()));

        let sink = Arc::clone(&countdown);
        router.set_triggered_callback(Some(Arc::new(
            move |_event: &InputEvent, triggered: &[SkillRule]| {
                if triggered.is_empty() {
                    return;
                }
                let mut service = sink.lock().unwrap_or_else(|p| p.into_inner());
                for rule in triggered {
                    // Durations are repaired to >= 0 by the config layer,
                    // but clamp anyway so a bad rule cannot kill dispatch.
                    let duration = rule.duration_secs.max(0.0);
                    if let Err(error) = service.refresh(rule.id, duration, None) {
                        log::warn!("skill {} countdown refresh rejected: {error}", rule.id);
                    }
                }
            },
        )));

        Self { router, countdown }
    }

    pub fn is_running(&self) -> bool {
        self.router.is_running()
    }

    /// The countdown service driven by this runtime.  Lock it to subscribe,
    /// tick, or read snapshots.
    pub fn countdown(&self) -> Arc<Mutex<CountdownService>> {
        Arc::clone(&self.countdown)
    }

    /// The underlying router, for event/error subscriptions.
    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    /// Forward router and adapter faults to `callback`.
    pub fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        self.router.set_error_callback(callback);
    }

    /// Replace the active rule set.  Takes effect immediately, also while
    /// a session is running; held-modifier state starts over.
    pub fn set_skill_rules(&self, rules: impl IntoIterator<Item = SkillRule>) {
        self.router.set_skill_rules(rules);
    }

    /// Start a capture session.  No-op when already running.
    ///
    /// Held-key state and leftover countdowns from a previous session are
    /// cleared before capture comes up.  On failure the router has already
    /// rolled its adapters back and the runtime is left fully stopped.
    pub fn start(&mut self) -> Result<(), InputError> {
        if self.is_running() {
            return Ok(());
        }
        self.router.reset_keys();
        self.countdown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();

        match self.router.start() {
            Ok(()) => {
                log::debug!("tracker session started");
                Ok(())
            }
            Err(error) => {
                self.router.reset_keys();
                Err(error)
            }
        }
    }

    /// Stop the capture session.  No-op when not running.
    ///
    /// Cleanup (key reset, countdown clear) always completes, even when an
    /// adapter fails to stop; the failure is reported afterwards.
    pub fn stop(&mut self) -> Result<(), InputError> {
        let result = if self.is_running() {
            self.router.stop()
        } else {
            Ok(())
        };

        self.router.reset_keys();
        self.countdown
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
        log::debug!("tracker session stopped");
        result
    }
}

impl Default for TrackerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackerRuntime {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            log::warn!("tracker runtime teardown incomplete: {error}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{EventCallback, InputAdapter};
    use crate::input::InputSource;
    use std::time::{Duration, Instant};

    /// Minimal adapter stub; optionally refuses to start or stop.
    struct StubAdapter {
        family: InputSource,
        running: bool,
        fail_start: bool,
        fail_stop: bool,
    }

    impl StubAdapter {
        fn ok(family: InputSource) -> Self {
            Self {
                family,
                running: false,
                fail_start: false,
                fail_stop: false,
            }
        }
    }

    impl InputAdapter for StubAdapter {
        fn family(&self) -> InputSource {
            self.family
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn set_event_callback(&mut self, _callback: Option<EventCallback>) {}

        fn set_error_callback(&mut self, _callback: Option<ErrorCallback>) {}

        fn start(&mut self) -> Result<(), InputError> {
            if self.fail_start {
                return Err(InputError::BackendStart {
                    family: self.family,
                    message: "scripted failure".into(),
                });
            }
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), InputError> {
            self.running = false;
            if self.fail_stop {
                return Err(InputError::Capture {
                    family: self.family,
                    message: "device wedged".into(),
                });
            }
            Ok(())
        }
    }

    fn runtime_with(adapters: Vec<Box<dyn InputAdapter>>) -> TrackerRuntime {
        let _ = env_logger::builder().is_test(true).try_init();
        TrackerRuntime::with_router(InputRouter::with_adapters(adapters))
    }

    fn press(code: &str) -> InputEvent {
        InputEvent::with_timestamp(code, InputSource::Keyboard, 0.0, true).expect("event")
    }

    fn rule(id: i64, skill_key: &str, duration_secs: f64) -> SkillRule {
        SkillRule {
            id,
            skill_key: Some(skill_key.to_string()),
            duration_secs,
            ..SkillRule::default()
        }
    }

    fn wait_for_active(runtime: &TrackerRuntime, count: usize) {
        let countdown = runtime.countdown();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if countdown.lock().unwrap().active_count() == count {
                return;
            }
            assert!(Instant::now() < deadline, "countdown never reached {count}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn triggered_skills_refresh_countdowns() {
        let mut runtime = runtime_with(vec![Box::new(StubAdapter::ok(InputSource::Keyboard))]);
        runtime.set_skill_rules([rule(1, "F8", 3.0)]);
        runtime.start().expect("start");

        runtime.router().route_input_event(press("F8"));
        wait_for_active(&runtime, 1);

        let countdown = runtime.countdown();
        let active = countdown
            .lock()
            .unwrap()
            .get_active(1, Some(0.0))
            .expect("active countdown");
        assert_eq!(active.duration_secs, 3.0);

        runtime.stop().expect("stop");
    }

    #[test]
    fn stop_clears_countdowns_and_session_state() {
        let mut runtime = runtime_with(vec![Box::new(StubAdapter::ok(InputSource::Keyboard))]);
        runtime.set_skill_rules([rule(1, "F8", 3.0)]);
        runtime.start().expect("start");
        runtime.router().route_input_event(press("F8"));
        wait_for_active(&runtime, 1);

        runtime.stop().expect("stop");
        assert_eq!(runtime.countdown().lock().unwrap().active_count(), 0);
        assert!(!runtime.is_running());
    }

    #[test]
    fn start_is_idempotent_and_clears_stale_countdowns() {
        let mut runtime = runtime_with(vec![Box::new(StubAdapter::ok(InputSource::Keyboard))]);
        runtime.set_skill_rules([rule(1, "F8", 3.0)]);

        runtime.start().expect("start");
        runtime.start().expect("second start is a no-op");
        runtime.router().route_input_event(press("F8"));
        wait_for_active(&runtime, 1);
        runtime.stop().expect("stop");

        // A fresh session begins with no active countdowns.
        runtime.start().expect("restart");
        assert_eq!(runtime.countdown().lock().unwrap().active_count(), 0);
        runtime.stop().expect("stop");
    }

    #[test]
    fn failed_start_leaves_runtime_stopped() {
        let mut failing = StubAdapter::ok(InputSource::Gamepad);
        failing.fail_start = true;
        let mut runtime = runtime_with(vec![
            Box::new(StubAdapter::ok(InputSource::Keyboard)),
            Box::new(failing),
        ]);

        assert!(runtime.start().is_err());
        assert!(!runtime.is_running());
        assert_eq!(runtime.countdown().lock().unwrap().active_count(), 0);
    }

    #[test]
    fn stop_failure_still_completes_cleanup() {
        let mut wedged = StubAdapter::ok(InputSource::Mouse);
        wedged.fail_stop = true;
        let mut runtime = runtime_with(vec![Box::new(wedged)]);
        runtime.set_skill_rules([rule(1, "F8", 3.0)]);
        runtime.start().expect("start");
        runtime.router().route_input_event(press("F8"));
        wait_for_active(&runtime, 1);

        let error = runtime.stop().expect_err("stop must surface the failure");
        assert!(matches!(error, InputError::StopIncomplete { .. }));
        // Cleanup ran regardless.
        assert_eq!(runtime.countdown().lock().unwrap().active_count(), 0);
        assert!(!runtime.is_running());
    }

    #[test]
    fn disabled_rules_do_not_refresh() {
        let mut runtime = runtime_with(vec![Box::new(StubAdapter::ok(InputSource::Keyboard))]);
        let mut disabled = rule(2, "F7", 4.0);
        disabled.is_enabled = false;
        runtime.set_skill_rules([disabled]);
        runtime.start().expect("start");

        runtime.router().route_input_event(press("F7"));
        // Give dispatch a moment; nothing may appear.
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(runtime.countdown().lock().unwrap().active_count(), 0);

        runtime.stop().expect("stop");
    }
}
