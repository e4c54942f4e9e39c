use crate::config::Timings;
use crate::model::{Blush, CharacterState, Mode, ModeContext, PointerId};
use crate::render::GroomingOptions;
use crate::timers::{TimerId, TimerQueue};

const BOB_SPEED_AWAKE: f64 = 0.0012;
const BOB_AMP_AWAKE: f64 = 1.0;
const BOB_SPEED_ASLEEP: f64 = 0.0007;
const BOB_AMP_ASLEEP: f64 = 0.6;

/// Effects that land after a delay. Each carries what it needs to tell
/// whether it has been overtaken by a later transition.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Deferred {
    BlinkEnd {
        generation: u64,
        mode: Mode,
        restore: bool,
    },
    SleepSettle {
        generation: u64,
        mode: Mode,
    },
    LongPress {
        pointer: PointerId,
        mode: Mode,
    },
    CelebrationEnd {
        token: u64,
    },
}

/// Owns the character's transient state and every delayed effect acting on it.
///
/// Time is passed in as milliseconds on a monotonic clock. Operations that
/// return `bool` report whether something visible changed, so the caller
/// knows to request a repaint.
pub(crate) struct InteractionStateMachine {
    state: CharacterState,
    mode: Mode,
    timings: Timings,
    night: bool,
    /// Bumped by every transition; deferred effects carry the value they saw.
    generation: u64,
    timers: TimerQueue<Deferred>,
    press_pointer: Option<PointerId>,
    press_timer: Option<TimerId>,
    /// Restore value of the blink currently in flight.
    pending_blink: Option<bool>,
    celebration: u64,
}

impl InteractionStateMachine {
    pub(crate) fn new(timings: Timings, night: bool) -> Self {
        Self {
            state: CharacterState::default(),
            mode: Mode::default(),
            timings,
            night,
            generation: 0,
            timers: TimerQueue::default(),
            press_pointer: None,
            press_timer: None,
            pending_blink: None,
            celebration: 0,
        }
    }

    pub(crate) fn state(&self) -> &CharacterState {
        &self.state
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn night(&self) -> bool {
        self.night
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn idle_limit_ms(&self) -> f64 {
        let ms = if self.night {
            self.timings.idle_night_ms
        } else {
            self.timings.idle_day_ms
        };
        ms as f64
    }

    /// Earliest pending deferred effect, if any.
    pub(crate) fn next_deadline(&self) -> Option<f64> {
        self.timers.next_due()
    }

    /// Grooming as it should be painted; a celebration sticks the tongue out.
    pub(crate) fn shown_grooming(&self, opts: GroomingOptions) -> GroomingOptions {
        GroomingOptions {
            tongue: opts.tongue || self.state.celebrating,
            ..opts
        }
    }

    fn bump(&mut self) {
        self.generation += 1;
        self.pending_blink = None;
    }

    fn cancel_press(&mut self) {
        if let Some(id) = self.press_timer.take() {
            self.timers.cancel(id);
        }
        self.press_pointer = None;
        self.state.pressing = false;
        self.state.long_press_fired = false;
    }

    pub(crate) fn switch_mode(&mut self, mode: Mode, ctx: ModeContext) -> bool {
        // a blink cut short by the switch still reopens the eyes
        if let Some(restore) = self.pending_blink.take() {
            self.state.awake = restore;
        }
        let from = self.mode;
        self.mode = mode;
        self.night = ctx.night;
        self.bump();
        self.cancel_press();
        self.state.idle_ms = 0.0;
        self.state.celebrating = false;

        if mode.continuous_animation() {
            self.state.awake = true;
        } else {
            self.state.bob = 0.0;
        }

        if from == Mode::Birthday && mode != Mode::Birthday && self.state.blush == Blush::Birthday {
            self.state.blush = Blush::Off;
        }
        if mode == Mode::Birthday {
            // the panel opens blushing only on the day itself
            self.state.blush = if ctx.birthday_today {
                Blush::Birthday
            } else {
                Blush::Off
            };
        }

        log::info!(
            "mode {:?} -> {:?} (night={}, idle limit {} ms)",
            from,
            mode,
            self.night,
            self.idle_limit_ms()
        );
        true
    }

    /// Time-of-day predicate flipped mid-session.
    pub(crate) fn set_time_of_day(&mut self, night: bool) {
        if self.night != night {
            log::debug!("time of day changed, night={night}");
            self.night = night;
        }
    }

    pub(crate) fn blink(&mut self, now_ms: f64) -> bool {
        let restore = self.pending_blink.unwrap_or(self.state.awake);
        self.bump();
        self.pending_blink = Some(restore);
        self.state.awake = false;
        self.timers.schedule(
            now_ms + self.timings.blink_ms as f64,
            Deferred::BlinkEnd {
                generation: self.generation,
                mode: self.mode,
                restore,
            },
        );
        true
    }

    pub(crate) fn put_to_sleep(&mut self, now_ms: f64) -> bool {
        self.bump();
        self.state.awake = true;
        self.timers.schedule(
            now_ms + self.timings.sleep_delay_ms as f64,
            Deferred::SleepSettle {
                generation: self.generation,
                mode: self.mode,
            },
        );
        log::debug!("settling to sleep");
        true
    }

    pub(crate) fn wake(&mut self) -> bool {
        self.bump();
        self.state.awake = true;
        self.state.idle_ms = 0.0;
        log::info!("woken up");
        true
    }

    pub(crate) fn toggle_blush(&mut self) -> bool {
        self.state.blush = if self.state.blush.is_visible() {
            Blush::Off
        } else {
            Blush::Manual
        };
        true
    }

    pub(crate) fn clear_blush(&mut self) -> bool {
        let changed = self.state.blush.is_visible();
        self.state.blush = Blush::Off;
        changed
    }

    pub(crate) fn celebrate(&mut self, now_ms: f64) -> bool {
        self.bump();
        self.state.awake = true;
        self.state.idle_ms = 0.0;
        // an asked-for blush outlives the birthday panel
        if self.state.blush == Blush::Off {
            self.state.blush = Blush::Manual;
        }
        self.state.celebrating = true;
        self.celebration += 1;
        self.timers.schedule(
            now_ms + self.timings.celebrate_ms as f64,
            Deferred::CelebrationEnd {
                token: self.celebration,
            },
        );
        true
    }

    /// Per-frame update. Only the continuous-animation mode breathes and dozes.
    pub(crate) fn frame(&mut self, dt_ms: f64, ts_ms: f64) -> bool {
        if !self.mode.continuous_animation() {
            let moved = self.state.bob != 0.0;
            self.state.bob = 0.0;
            return moved;
        }

        self.state.idle_ms += dt_ms.max(0.0);
        if self.state.awake && self.state.idle_ms > self.idle_limit_ms() {
            self.bump();
            self.state.awake = false;
            log::info!("dozed off after {:.0} ms idle", self.state.idle_ms);
        }

        let (speed, amp) = if self.state.awake {
            (BOB_SPEED_AWAKE, BOB_AMP_AWAKE)
        } else {
            (BOB_SPEED_ASLEEP, BOB_AMP_ASLEEP)
        };
        self.state.bob = (ts_ms * speed).sin() * amp;
        true
    }

    pub(crate) fn pointer_down(&mut self, id: PointerId, now_ms: f64) -> bool {
        if !self.mode.continuous_animation() {
            return false;
        }
        self.cancel_press();
        log::trace!("pointer {} down", id.0);
        self.state.pressing = true;
        self.press_pointer = Some(id);
        self.press_timer = Some(self.timers.schedule(
            now_ms + self.timings.long_press_ms as f64,
            Deferred::LongPress {
                pointer: id,
                mode: self.mode,
            },
        ));
        false
    }

    pub(crate) fn pointer_up(&mut self, id: PointerId, now_ms: f64) -> bool {
        // a long press that came due before this release wins over the tap
        let mut changed = self.fire_due(now_ms);
        if !self.mode.continuous_animation() || self.press_pointer != Some(id) {
            return changed;
        }
        let long_press = self.state.long_press_fired;
        self.cancel_press();
        if !long_press {
            changed |= self.blink(now_ms);
        }
        changed
    }

    pub(crate) fn pointer_leave(&mut self, id: PointerId) -> bool {
        if self.press_pointer == Some(id) {
            self.cancel_press();
        }
        false
    }

    /// Apply every deferred effect due at or before `now_ms`.
    pub(crate) fn fire_due(&mut self, now_ms: f64) -> bool {
        let mut changed = false;
        while let Some((due, effect)) = self.timers.pop_due(now_ms) {
            changed |= self.apply(due, effect);
        }
        changed
    }

    fn apply(&mut self, due_ms: f64, effect: Deferred) -> bool {
        match effect {
            Deferred::BlinkEnd {
                generation,
                mode,
                restore,
            } => {
                if generation != self.generation || mode != self.mode {
                    log::trace!("stale blink end dropped");
                    return false;
                }
                self.pending_blink = None;
                self.state.awake = restore;
                true
            }
            Deferred::SleepSettle { generation, mode } => {
                if generation != self.generation || mode != self.mode {
                    log::trace!("stale sleep settle dropped");
                    return false;
                }
                self.state.awake = false;
                log::info!("fell asleep");
                true
            }
            Deferred::LongPress { pointer, mode } => {
                self.press_timer = None;
                if !self.state.pressing || self.press_pointer != Some(pointer) || mode != self.mode {
                    log::trace!("stale long press dropped");
                    return false;
                }
                self.state.long_press_fired = true;
                log::debug!("long press");
                self.put_to_sleep(due_ms)
            }
            Deferred::CelebrationEnd { token } => {
                if token != self.celebration || !self.state.celebrating {
                    return false;
                }
                self.state.celebrating = false;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PointerId = PointerId(0);

    fn day() -> ModeContext {
        ModeContext::default()
    }

    fn night() -> ModeContext {
        ModeContext {
            night: true,
            birthday_today: false,
        }
    }

    fn machine_in(mode: Mode, ctx: ModeContext) -> InteractionStateMachine {
        let mut m = InteractionStateMachine::new(Timings::default(), ctx.night);
        let _ = m.switch_mode(mode, ctx);
        m
    }

    #[test]
    fn blink_round_trip_passes_through_closed() {
        let mut m = machine_in(Mode::Daily, day());
        assert!(m.blink(1000.0));
        assert!(!m.state().awake);
        assert!(!m.fire_due(1159.0));
        assert!(!m.state().awake);
        assert!(m.fire_due(1160.0));
        assert!(m.state().awake);
        assert_eq!(m.next_deadline(), None);
    }

    #[test]
    fn wake_beats_a_pending_blink() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.blink(0.0);
        let _ = m.wake();
        let _ = m.fire_due(500.0);
        assert!(m.state().awake);
    }

    #[test]
    fn wake_beats_a_pending_sleep() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.put_to_sleep(0.0);
        let _ = m.wake();
        let _ = m.fire_due(1000.0);
        assert!(m.state().awake);
        assert_eq!(m.next_deadline(), None);
    }

    #[test]
    fn blink_on_a_sleeping_hedgehog_keeps_it_asleep() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.put_to_sleep(0.0);
        let _ = m.fire_due(140.0);
        assert!(!m.state().awake);
        let _ = m.blink(200.0);
        let _ = m.fire_due(1000.0);
        assert!(!m.state().awake);
    }

    #[test]
    fn overlapping_blinks_never_strand_closed_eyes() {
        let mut m = machine_in(Mode::Daily, day());
        let _ = m.blink(0.0);
        let _ = m.blink(80.0);
        let _ = m.blink(120.0);
        let _ = m.fire_due(200.0);
        // the first two reverts are stale; the last one is still pending
        assert!(!m.state().awake);
        let _ = m.fire_due(280.0);
        assert!(m.state().awake);
    }

    #[test]
    fn put_to_sleep_winks_then_settles() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.put_to_sleep(0.0);
        assert!(m.state().awake);
        let _ = m.fire_due(139.0);
        assert!(m.state().awake);
        let _ = m.fire_due(140.0);
        assert!(!m.state().awake);
        let _ = m.fire_due(100_000.0);
        assert!(!m.state().awake);
    }

    #[test]
    fn wake_resets_idle_time() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.frame(5000.0, 5000.0);
        assert_eq!(m.state().idle_ms, 5000.0);
        let _ = m.wake();
        assert!(m.state().awake);
        assert_eq!(m.state().idle_ms, 0.0);
    }

    #[test]
    fn dozes_off_after_the_night_threshold() {
        let mut m = machine_in(Mode::Sleep, night());
        let _ = m.frame(10_000.0, 10_000.0);
        assert!(m.state().awake);
        let _ = m.frame(1.0, 10_001.0);
        assert!(!m.state().awake);
    }

    #[test]
    fn daytime_needs_the_longer_threshold() {
        let mut m = machine_in(Mode::Sleep, day());
        let mut ts = 0.0;
        while ts < 10_001.0 {
            ts += 16.0;
            let _ = m.frame(16.0, ts);
        }
        assert!(m.state().awake);
        while ts <= 30_000.0 {
            ts += 16.0;
            let _ = m.frame(16.0, ts);
        }
        assert!(!m.state().awake);
    }

    #[test]
    fn time_of_day_change_moves_the_threshold() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.frame(12_000.0, 12_000.0);
        assert!(m.state().awake);
        m.set_time_of_day(true);
        let _ = m.frame(16.0, 12_016.0);
        assert!(!m.state().awake);
    }

    #[test]
    fn static_modes_do_not_accumulate_idle_or_bob() {
        let mut m = machine_in(Mode::Daily, night());
        let _ = m.frame(60_000.0, 60_000.0);
        assert!(m.state().awake);
        assert_eq!(m.state().idle_ms, 0.0);
        assert_eq!(m.state().bob, 0.0);
    }

    #[test]
    fn bob_shrinks_while_asleep() {
        let mut m = machine_in(Mode::Sleep, day());
        let mut ts = 0.0;
        for _ in 0..200 {
            ts += 16.0;
            let _ = m.frame(16.0, ts);
            assert!(m.state().bob.abs() <= 1.0);
        }
        let _ = m.put_to_sleep(ts);
        let _ = m.fire_due(ts + 140.0);
        for _ in 0..200 {
            ts += 16.0;
            let _ = m.frame(16.0, ts);
            assert!(m.state().bob.abs() <= 0.6 + 1e-9);
        }
    }

    #[test]
    fn short_tap_blinks_only() {
        let mut m = machine_in(Mode::Sleep, day());
        assert!(!m.pointer_down(P, 0.0));
        assert!(m.pointer_up(P, 100.0));
        assert!(!m.state().awake);
        assert!(!m.state().pressing);
        let _ = m.fire_due(260.0);
        assert!(m.state().awake);
        // the cancelled long press never lands
        let _ = m.fire_due(10_000.0);
        assert!(m.state().awake);
        assert!(!m.state().long_press_fired);
    }

    #[test]
    fn long_press_sleeps_and_swallows_the_tap() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.pointer_down(P, 0.0);
        assert!(m.fire_due(520.0));
        assert!(m.state().long_press_fired);
        assert!(m.state().awake);
        let _ = m.fire_due(660.0);
        assert!(!m.state().awake);
        let _ = m.pointer_up(P, 700.0);
        let _ = m.fire_due(2000.0);
        assert!(!m.state().awake);
    }

    #[test]
    fn long_press_due_before_a_late_release_still_wins() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.pointer_down(P, 0.0);
        // host never polled between the deadline and the release
        let _ = m.pointer_up(P, 600.0);
        let _ = m.fire_due(660.0);
        assert!(!m.state().awake);
        assert!(!m.state().pressing);
    }

    #[test]
    fn pointer_leave_cancels_the_press() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.pointer_down(P, 0.0);
        assert!(!m.pointer_leave(P));
        assert!(!m.state().pressing);
        let _ = m.fire_due(5000.0);
        assert!(m.state().awake);
        // release after leaving is ignored
        let _ = m.pointer_up(P, 5001.0);
        assert!(m.state().awake);
    }

    #[test]
    fn other_pointers_are_ignored() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.pointer_down(P, 0.0);
        let _ = m.pointer_leave(PointerId(7));
        let _ = m.pointer_up(PointerId(7), 50.0);
        assert!(m.state().pressing);
        assert!(m.state().awake);
    }

    #[test]
    fn presses_outside_bedtime_do_nothing() {
        let mut m = machine_in(Mode::Care, day());
        let _ = m.pointer_down(P, 0.0);
        assert!(!m.state().pressing);
        assert_eq!(m.next_deadline(), None);
        assert!(!m.pointer_up(P, 50.0));
        assert!(m.state().awake);
    }

    #[test]
    fn entering_bedtime_always_starts_awake() {
        let mut m = machine_in(Mode::Sleep, night());
        let _ = m.frame(20_000.0, 20_000.0);
        assert!(!m.state().awake);
        let _ = m.switch_mode(Mode::Daily, night());
        assert!(!m.state().awake);
        let _ = m.switch_mode(Mode::Sleep, night());
        assert!(m.state().awake);
        assert_eq!(m.state().idle_ms, 0.0);
        assert!(!m.state().pressing);
        assert!(!m.state().long_press_fired);
    }

    #[test]
    fn mode_switch_clears_a_held_press() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.pointer_down(P, 0.0);
        let _ = m.switch_mode(Mode::Sleep, day());
        let _ = m.fire_due(1000.0);
        assert!(m.state().awake);
        assert!(!m.state().long_press_fired);
    }

    #[test]
    fn delayed_sleep_is_dropped_after_a_mode_change() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.put_to_sleep(0.0);
        let _ = m.switch_mode(Mode::Care, day());
        assert!(!m.fire_due(1000.0));
        assert!(m.state().awake);
    }

    #[test]
    fn mode_switch_settles_a_blink_in_flight() {
        let mut m = machine_in(Mode::Sleep, day());
        let _ = m.blink(0.0);
        let _ = m.switch_mode(Mode::Quote, day());
        assert!(m.state().awake);
        assert!(!m.fire_due(1000.0));
        assert!(m.state().awake);
    }

    #[test]
    fn birthday_blush_is_cleared_on_exit() {
        let ctx = ModeContext {
            night: false,
            birthday_today: true,
        };
        let mut m = machine_in(Mode::Birthday, ctx);
        assert_eq!(m.state().blush, Blush::Birthday);
        let _ = m.switch_mode(Mode::Daily, ctx);
        assert_eq!(m.state().blush, Blush::Off);
    }

    #[test]
    fn celebration_blush_survives_leaving_on_an_ordinary_day() {
        let mut m = machine_in(Mode::Birthday, day());
        let _ = m.celebrate(0.0);
        let _ = m.fire_due(2000.0);
        let _ = m.switch_mode(Mode::Daily, day());
        assert_eq!(m.state().blush, Blush::Manual);
    }

    #[test]
    fn birthday_panel_opens_without_blush_on_other_days() {
        let mut m = machine_in(Mode::Daily, day());
        let _ = m.toggle_blush();
        let _ = m.switch_mode(Mode::Birthday, day());
        assert!(!m.state().blush.is_visible());
    }

    #[test]
    fn manual_blush_survives_other_mode_switches() {
        let mut m = machine_in(Mode::Daily, day());
        let _ = m.toggle_blush();
        let _ = m.switch_mode(Mode::Care, day());
        let _ = m.switch_mode(Mode::Quote, day());
        assert_eq!(m.state().blush, Blush::Manual);
    }

    #[test]
    fn no_birthday_blush_on_other_days() {
        let mut m = machine_in(Mode::Birthday, day());
        assert_eq!(m.state().blush, Blush::Off);
    }

    #[test]
    fn celebration_shows_the_tongue_for_a_while() {
        let mut m = machine_in(Mode::Birthday, day());
        let opts = GroomingOptions::default();
        assert!(!m.shown_grooming(opts).tongue);
        let _ = m.celebrate(0.0);
        assert!(m.shown_grooming(opts).tongue);
        assert!(m.state().blush.is_visible());
        let _ = m.celebrate(600.0);
        // the first timeout belongs to the earlier celebration
        let _ = m.fire_due(900.0);
        assert!(m.shown_grooming(opts).tongue);
        let _ = m.fire_due(1500.0);
        assert!(!m.shown_grooming(opts).tongue);
    }

    #[test]
    fn transitions_bump_the_generation() {
        let mut m = machine_in(Mode::Daily, day());
        let g = m.generation();
        let _ = m.blink(0.0);
        let _ = m.wake();
        assert_eq!(m.generation(), g + 2);
    }
}
