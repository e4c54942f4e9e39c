use crate::sim::InteractionStateMachine;
use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FrameHandle(pub(crate) u64);

/// The host's "call me before the next repaint" primitive.
pub(crate) trait FrameSource {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScheduleState {
    pub(crate) needs_redraw: bool,
    pub(crate) running: bool,
    pub(crate) last_frame_ms: f64,
    pub(crate) last_draw_ms: f64,
}

/// Runs the frame pump only while a repaint is owed or the mode animates.
pub(crate) struct RenderScheduler<F> {
    state: ScheduleState,
    pending: Option<FrameHandle>,
    frames: F,
    paint_interval_ms: f64,
}

impl<F: FrameSource> RenderScheduler<F> {
    /// `paint_interval_ms` caps paints while animating continuously.
    pub(crate) fn new(frames: F, paint_interval_ms: f64) -> Self {
        Self {
            state: ScheduleState {
                needs_redraw: true,
                running: false,
                last_frame_ms: 0.0,
                last_draw_ms: f64::NEG_INFINITY,
            },
            pending: None,
            frames,
            paint_interval_ms,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &ScheduleState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.state.running
    }

    pub(crate) fn frames(&self) -> &F {
        &self.frames
    }

    pub(crate) fn frames_mut(&mut self) -> &mut F {
        &mut self.frames
    }

    pub(crate) fn request_redraw(&mut self) {
        self.state.needs_redraw = true;
    }

    pub(crate) fn ensure_running(&mut self, continuous: bool, now_ms: f64) {
        if self.state.running || (!self.state.needs_redraw && !continuous) {
            return;
        }
        self.state.running = true;
        self.state.last_frame_ms = now_ms;
        self.pending = Some(self.frames.request_frame());
        log::debug!("frame pump started");
    }

    /// One frame callback. Returns whether a paint happened.
    pub(crate) fn pump_once<P>(
        &mut self,
        ts_ms: f64,
        machine: &mut InteractionStateMachine,
        paint: P,
    ) -> Result<bool>
    where
        P: FnOnce(&InteractionStateMachine) -> Result<()>,
    {
        // this callback is the one that was pending
        self.pending = None;
        if !self.state.running {
            return Ok(false);
        }

        let dt = ts_ms - self.state.last_frame_ms;
        self.state.last_frame_ms = ts_ms;

        let continuous = machine.mode().continuous_animation();
        if machine.frame(dt, ts_ms) {
            self.state.needs_redraw = true;
        }

        let min_gap = if continuous { self.paint_interval_ms } else { 0.0 };
        let mut painted = false;
        if self.state.needs_redraw && ts_ms - self.state.last_draw_ms >= min_gap {
            self.state.needs_redraw = false;
            self.state.last_draw_ms = ts_ms;
            if let Err(e) = paint(machine) {
                // no callback is pending now, so let ensure_running restart us
                self.stop();
                return Err(e);
            }
            painted = true;
        }

        if self.state.needs_redraw || continuous {
            self.pending = Some(self.frames.request_frame());
        } else {
            self.stop();
        }
        Ok(painted)
    }

    fn stop(&mut self) {
        self.state.running = false;
        if let Some(h) = self.pending.take() {
            self.frames.cancel_frame(h);
        }
        log::debug!("frame pump idle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timings;
    use crate::model::{Mode, ModeContext};

    #[derive(Default)]
    struct ManualFrames {
        next: u64,
        pending: Option<FrameHandle>,
        requested: u32,
    }

    impl FrameSource for ManualFrames {
        fn request_frame(&mut self) -> FrameHandle {
            let h = FrameHandle(self.next);
            self.next += 1;
            self.pending = Some(h);
            self.requested += 1;
            h
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            if self.pending == Some(handle) {
                self.pending = None;
            }
        }
    }

    impl ManualFrames {
        /// Deliver the pending callback, if any.
        fn take(&mut self) -> bool {
            self.pending.take().is_some()
        }
    }

    fn setup(mode: Mode) -> (RenderScheduler<ManualFrames>, InteractionStateMachine) {
        let mut m = InteractionStateMachine::new(Timings::default(), false);
        let _ = m.switch_mode(mode, ModeContext::default());
        (RenderScheduler::new(ManualFrames::default(), 1000.0 / 30.0), m)
    }

    /// Deliver frames every `step` ms until the pump stops or `until` is reached.
    fn run(
        s: &mut RenderScheduler<ManualFrames>,
        m: &mut InteractionStateMachine,
        from: f64,
        step: f64,
        until: f64,
    ) -> Vec<f64> {
        let mut paints = Vec::new();
        let mut ts = from;
        while ts <= until && s.frames_mut().take() {
            let painted = s.pump_once(ts, m, |_| Ok(())).unwrap_or(false);
            if painted {
                paints.push(ts);
            }
            ts += step;
        }
        paints
    }

    #[test]
    fn request_redraw_is_idempotent() {
        let (mut s, _) = setup(Mode::Daily);
        s.request_redraw();
        s.request_redraw();
        assert!(s.state().needs_redraw);
        assert_eq!(s.frames().requested, 0);
    }

    #[test]
    fn static_repaint_paints_once_then_stops() {
        let (mut s, mut m) = setup(Mode::Daily);
        s.ensure_running(false, 0.0);
        assert!(s.is_running());
        let paints = run(&mut s, &mut m, 16.0, 16.0, 1000.0);
        assert_eq!(paints, vec![16.0]);
        assert!(!s.is_running());
        assert_eq!(s.frames().pending, None);
        assert!(!s.state().needs_redraw);
    }

    #[test]
    fn nothing_to_do_means_no_pump() {
        let (mut s, mut m) = setup(Mode::Quote);
        s.ensure_running(false, 0.0);
        let _ = run(&mut s, &mut m, 16.0, 16.0, 100.0);
        let before = s.frames().requested;
        s.ensure_running(false, 200.0);
        assert!(!s.is_running());
        assert_eq!(s.frames().requested, before);
    }

    #[test]
    fn ensure_running_twice_keeps_one_callback() {
        let (mut s, _) = setup(Mode::Daily);
        s.ensure_running(false, 0.0);
        s.ensure_running(false, 1.0);
        assert_eq!(s.frames().requested, 1);
    }

    #[test]
    fn static_modes_paint_every_request_without_a_cap() {
        let (mut s, mut m) = setup(Mode::Care);
        let mut paints = 0;
        for ts in [0.0, 5.0, 10.0] {
            s.request_redraw();
            s.ensure_running(false, ts);
            assert!(s.frames_mut().take());
            if s.pump_once(ts + 1.0, &mut m, |_| Ok(())).unwrap_or(false) {
                paints += 1;
            }
            assert!(!s.is_running());
        }
        assert_eq!(paints, 3);
    }

    #[test]
    fn continuous_mode_caps_paints() {
        let (mut s, mut m) = setup(Mode::Sleep);
        s.ensure_running(true, 0.0);
        let paints = run(&mut s, &mut m, 16.0, 16.0, 1000.0);
        assert!(s.is_running());
        // 62 callbacks at ~60 Hz, painted every third one
        assert_eq!(paints.len(), 21);
        assert_eq!(s.frames().requested, 63);
        for pair in paints.windows(2) {
            assert!(pair[1] - pair[0] >= 1000.0 / 30.0);
        }
    }

    #[test]
    fn continuous_mode_advances_the_character() {
        let (mut s, mut m) = setup(Mode::Sleep);
        s.ensure_running(true, 0.0);
        let _ = run(&mut s, &mut m, 16.0, 16.0, 480.0);
        assert!(m.state().idle_ms > 400.0);
        assert!(m.state().bob != 0.0);
    }

    #[test]
    fn leaving_continuous_mode_lets_the_pump_stop() {
        let (mut s, mut m) = setup(Mode::Sleep);
        s.ensure_running(true, 0.0);
        let _ = run(&mut s, &mut m, 16.0, 16.0, 160.0);
        let _ = m.switch_mode(Mode::Daily, ModeContext::default());
        s.request_redraw();
        let paints = run(&mut s, &mut m, 176.0, 16.0, 1000.0);
        assert_eq!(paints.len(), 1);
        assert!(!s.is_running());
        assert_eq!(s.frames().pending, None);
    }

    #[test]
    fn a_failed_paint_is_reported() {
        let (mut s, mut m) = setup(Mode::Daily);
        s.ensure_running(false, 0.0);
        assert!(s.frames_mut().take());
        let r = s.pump_once(16.0, &mut m, |_| anyhow::bail!("surface gone"));
        assert!(r.is_err());
        assert!(!s.is_running());
        assert_eq!(s.frames().pending, None);

        s.request_redraw();
        s.ensure_running(false, 32.0);
        assert!(s.is_running());
        let paints = run(&mut s, &mut m, 48.0, 16.0, 1000.0);
        assert_eq!(paints, vec![48.0]);
    }

    #[test]
    fn idle_after_any_sequence() {
        let (mut s, mut m) = setup(Mode::Daily);
        let mut ts = 0.0;
        for step in 0..40 {
            ts += 7.0;
            match step % 4 {
                0 => s.request_redraw(),
                1 => {
                    let _ = m.blink(ts);
                    s.request_redraw();
                }
                2 => s.ensure_running(false, ts),
                _ => {
                    if s.frames_mut().take() {
                        let _ = s.pump_once(ts, &mut m, |_| Ok(()));
                    }
                }
            }
        }
        s.ensure_running(false, ts);
        let _ = run(&mut s, &mut m, ts + 16.0, 16.0, ts + 1000.0);
        assert!(!s.state().needs_redraw);
        assert!(!s.is_running());
        assert_eq!(s.frames().pending, None);
    }
}
