use crate::canvas::Pixel;
use crate::config::{load_settings, project_paths, save_settings_atomic, Settings};
use crate::input::{collect_input, map_event, Command};
use crate::logging;
use crate::model::{Mode, ModeContext};
use crate::render::{render, GroomingOptions, DESIGN_SIZE};
use crate::scheduler::{FrameHandle, FrameSource, RenderScheduler};
use crate::sim::InteractionStateMachine;
use crate::term::{canvas_to_cells, draw_text, CellBuffer, Terminal, HUD_TOP};
use crate::Args;
use anyhow::Result;
use chrono::{Local, Timelike};
use crossterm::style::Color;
use std::time::{Duration, Instant};

/// Longest we block on input with nothing scheduled; bounds how late a
/// day/night flip is noticed.
const IDLE_WAIT_MS: f64 = 1000.0;

/* -----------------------------
   Host frame callbacks
------------------------------ */

/// One pending callback at a time, delivered no faster than the fps cap.
struct HostFrames {
    next: u64,
    pending: Option<FrameHandle>,
    interval_ms: f64,
    last_ms: f64,
}

impl HostFrames {
    fn new(interval_ms: f64) -> Self {
        Self {
            next: 0,
            pending: None,
            interval_ms,
            last_ms: f64::NEG_INFINITY,
        }
    }

    /// Milliseconds until the pending callback is due.
    fn due_in(&self, now_ms: f64) -> Option<f64> {
        self.pending
            .map(|_| (self.last_ms + self.interval_ms - now_ms).max(0.0))
    }

    fn take_due(&mut self, now_ms: f64) -> bool {
        match self.due_in(now_ms) {
            Some(wait) if wait <= 0.0 => {
                if let Some(FrameHandle(id)) = self.pending.take() {
                    log::trace!("frame {id} due");
                }
                self.last_ms = now_ms;
                true
            }
            _ => false,
        }
    }
}

impl FrameSource for HostFrames {
    fn request_frame(&mut self) -> FrameHandle {
        let h = FrameHandle(self.next);
        self.next += 1;
        self.pending = Some(h);
        h
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

struct Clock(Instant);

impl Clock {
    fn now_ms(&self) -> f64 {
        self.0.elapsed().as_secs_f64() * 1000.0
    }
}

fn mode_context(settings: &Settings, force_night: Option<bool>) -> ModeContext {
    let now = Local::now();
    ModeContext {
        night: force_night.unwrap_or_else(|| settings.is_night(now.hour())),
        birthday_today: settings.birthday.falls_on(now.date_naive()),
    }
}

pub(crate) struct App {
    settings: Settings,
    term: Terminal,
    machine: InteractionStateMachine,
    scheduler: RenderScheduler<HostFrames>,
    grooming: GroomingOptions,
    force_night: Option<bool>,
    clock: Clock,
    should_quit: bool,
}

impl App {
    fn init(settings: Settings, args: &Args) -> Result<Self> {
        let force_night = if args.night {
            Some(true)
        } else if args.day {
            Some(false)
        } else {
            None
        };

        let ctx = mode_context(&settings, force_night);
        let mut machine = InteractionStateMachine::new(settings.timings, ctx.night);
        machine.switch_mode(args.mode, ctx);

        let scheduler = RenderScheduler::new(
            HostFrames::new(settings.frame_interval_ms()),
            settings.paint_interval_ms(),
        );

        let term = Terminal::begin()?;
        log::info!(
            "terminal {}x{}, canvas {}x{} px",
            term.cols,
            term.rows,
            term.canvas.width(),
            term.canvas.height()
        );

        let mut app = Self {
            grooming: settings.grooming.clamped(),
            settings,
            term,
            machine,
            scheduler,
            force_night,
            clock: Clock(Instant::now()),
            should_quit: false,
        };
        app.request_repaint(0.0);
        Ok(app)
    }

    fn run(&mut self) -> Result<()> {
        while !self.should_quit {
            if self.term.resize_if_needed()? {
                let now = self.clock.now_ms();
                self.request_repaint(now);
            }

            let now = self.clock.now_ms();
            for ev in collect_input(self.wait_timeout(now))? {
                if let Some(cmd) = map_event(&ev, self.term.rows) {
                    self.handle(cmd);
                }
                if self.should_quit {
                    break;
                }
            }

            let now = self.clock.now_ms();
            self.refresh_time_of_day(now);
            if self.machine.fire_due(now) {
                self.request_repaint(now);
            }
            if self.scheduler.frames_mut().take_due(now) {
                self.pump(now)?;
            }
        }
        log::info!("bye");
        Ok(())
    }

    /// Block on input until the next frame or deferred effect is due.
    fn wait_timeout(&self, now_ms: f64) -> Duration {
        let frame = self.scheduler.frames().due_in(now_ms);
        let timer = self.machine.next_deadline().map(|d| (d - now_ms).max(0.0));
        let ms = [frame, timer]
            .into_iter()
            .flatten()
            .fold(IDLE_WAIT_MS, f64::min);
        Duration::from_secs_f64(ms / 1000.0)
    }

    fn request_repaint(&mut self, now_ms: f64) {
        self.scheduler.request_redraw();
        self.scheduler
            .ensure_running(self.machine.mode().continuous_animation(), now_ms);
    }

    fn refresh_time_of_day(&mut self, now_ms: f64) {
        let night = mode_context(&self.settings, self.force_night).night;
        if night != self.machine.night() {
            self.machine.set_time_of_day(night);
            self.request_repaint(now_ms);
        }
    }

    fn handle(&mut self, cmd: Command) {
        if !cmd.available_in(self.machine.mode()) {
            return;
        }
        let now = self.clock.now_ms();
        let changed = match cmd {
            Command::Quit => {
                self.should_quit = true;
                false
            }
            Command::SwitchMode(mode) => {
                let ctx = mode_context(&self.settings, self.force_night);
                self.machine.switch_mode(mode, ctx)
            }
            Command::Blink => self.machine.blink(now),
            Command::Sleep => self.machine.put_to_sleep(now),
            Command::Wake => self.machine.wake(),
            Command::ToggleBlush => self.machine.toggle_blush(),
            Command::ToggleTongue => {
                self.grooming.tongue = !self.grooming.tongue;
                true
            }
            Command::Dirty(delta) => {
                self.grooming.nudge_dirty(delta);
                true
            }
            Command::Mesh(delta) => {
                self.grooming.nudge_mesh(delta);
                true
            }
            Command::ResetCare => {
                reset_care(&mut self.grooming, &mut self.machine);
                true
            }
            Command::Celebrate => self.machine.celebrate(now),
            Command::PointerDown(id) => self.machine.pointer_down(id, now),
            Command::PointerUp(id) => self.machine.pointer_up(id, now),
            Command::PointerLeave(id) => self.machine.pointer_leave(id),
            Command::Resize => true,
        };
        if changed {
            self.request_repaint(now);
        }
    }

    fn pump(&mut self, now_ms: f64) -> Result<()> {
        let Self {
            scheduler,
            machine,
            term,
            grooming,
            settings,
            ..
        } = self;
        let painted = scheduler.pump_once(now_ms, machine, |m| {
            paint_frame(term, m, grooming, settings.enable_color)
        })?;
        if painted {
            log::trace!("painted at {now_ms:.0} ms");
        }
        Ok(())
    }
}

/// Back to stock grooming, not the configured starting point.
fn reset_care(grooming: &mut GroomingOptions, machine: &mut InteractionStateMachine) {
    *grooming = GroomingOptions::default();
    machine.clear_blush();
}

fn paint_frame(
    term: &mut Terminal,
    machine: &InteractionStateMachine,
    grooming: &GroomingOptions,
    enable_color: bool,
) -> Result<()> {
    let bg = Color::Black;
    term.cur.clear(bg);
    term.canvas.clear(Pixel::default());

    let w = term.canvas.width() as f32;
    let h = term.canvas.height() as f32;
    let st = machine.state();
    let cx = w * 0.5;
    let cy = h * 0.5 + h * 0.02 + st.bob as f32 * h * 0.01;
    let scale = w.min(h) / DESIGN_SIZE;
    render(
        &mut term.canvas,
        cx,
        cy,
        scale,
        st.awake,
        st.blush.is_visible(),
        machine.shown_grooming(*grooming),
    );

    canvas_to_cells(&term.canvas, &mut term.cur, HUD_TOP, enable_color, bg);
    draw_hud(&mut term.cur, machine, grooming);
    term.present()
}

/* -----------------------------
   Status lines
------------------------------ */

fn draw_hud(buf: &mut CellBuffer, machine: &InteractionStateMachine, grooming: &GroomingOptions) {
    let bg = Color::Black;
    let mut x = 1u16;
    for (i, mode) in Mode::ALL.into_iter().enumerate() {
        let tab = format!("{} {}", i + 1, mode.label());
        let current = mode == machine.mode();
        let fg = if current { Color::Yellow } else { Color::DarkGrey };
        draw_text(buf, x, 0, &tab, fg, bg, current);
        x = x.saturating_add(tab.chars().count() as u16 + 2);
    }

    let status = status_line(machine, grooming);
    let sx = buf.w.saturating_sub(status.chars().count() as u16 + 1).max(x);
    draw_text(buf, sx, 0, &status, Color::Grey, bg, false);

    let hint = format!(" {} | q quit", machine.mode().hint());
    draw_text(buf, 0, buf.h.saturating_sub(1), &hint, Color::DarkGrey, bg, false);
}

fn status_line(machine: &InteractionStateMachine, grooming: &GroomingOptions) -> String {
    let st = machine.state();
    let mut parts = vec![if st.awake { "awake" } else { "asleep" }.to_string()];
    if machine.mode().continuous_animation() {
        parts.push(if machine.night() { "night" } else { "day" }.to_string());
    }
    if st.blush.is_visible() {
        parts.push("blush".to_string());
    }
    if machine.mode() == Mode::Care {
        parts.push(format!(
            "dirt {:.2} mesh {:.2} tongue {}",
            grooming.dirty,
            grooming.mesh,
            if grooming.tongue { "on" } else { "off" }
        ));
    }
    parts.join(" | ")
}

pub(crate) fn run(args: Args) -> Result<()> {
    let paths = project_paths()?;
    let mut settings = load_settings(&paths.settings_path);
    settings.apply_args(&args);

    if args.write_config {
        save_settings_atomic(&paths.settings_path, &settings)?;
        println!("wrote {}", paths.settings_path.display());
        return Ok(());
    }

    logging::init(&paths.log_path, &settings.log_level)?;
    log::info!("starting in {:?}, data dir {}", args.mode, paths.data_dir.display());

    let mut app = App::init(settings, &args)?;
    let result = app.run();
    let ended = app.term.end();
    result.and(ended)
}
