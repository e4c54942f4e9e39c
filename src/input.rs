use crate::model::{Mode, PointerId};
use crate::term::{HUD_BOTTOM, HUD_TOP};
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::time::Duration;

/// The terminal has a single pointer.
pub(crate) const MOUSE: PointerId = PointerId(0);

const GROOMING_STEP: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Command {
    Quit,
    SwitchMode(Mode),
    Blink,
    Sleep,
    Wake,
    ToggleBlush,
    ToggleTongue,
    Dirty(f32),
    Mesh(f32),
    ResetCare,
    Celebrate,
    PointerDown(PointerId),
    PointerUp(PointerId),
    PointerLeave(PointerId),
    Resize,
}

impl Command {
    /// Whether the command does anything in `mode`, mirroring which controls each panel shows.
    pub(crate) fn available_in(&self, mode: Mode) -> bool {
        match self {
            Command::Sleep | Command::Wake => mode == Mode::Sleep,
            Command::ToggleBlush => matches!(mode, Mode::Daily | Mode::Care),
            Command::ToggleTongue | Command::Dirty(_) | Command::Mesh(_) | Command::ResetCare => {
                mode == Mode::Care
            }
            Command::Celebrate => mode == Mode::Birthday,
            _ => true,
        }
    }
}

/// Wait up to `timeout` for the first event, then drain whatever else is queued.
pub(crate) fn collect_input(timeout: Duration) -> anyhow::Result<Vec<Event>> {
    let mut out = Vec::new();
    if !event::poll(timeout)? {
        return Ok(out);
    }
    loop {
        out.push(event::read()?);
        if out.len() >= 32 || !event::poll(Duration::ZERO)? {
            break;
        }
    }
    Ok(out)
}

/// Translate a terminal event for a screen `rows` tall.
pub(crate) fn map_event(ev: &Event, rows: u16) -> Option<Command> {
    match ev {
        Event::Key(k) if k.kind == KeyEventKind::Press => {
            if k.modifiers.contains(KeyModifiers::CONTROL) {
                return matches!(k.code, KeyCode::Char('c')).then_some(Command::Quit);
            }
            map_key(k.code)
        }
        Event::Mouse(m) => map_mouse(m, rows),
        Event::FocusLost => Some(Command::PointerLeave(MOUSE)),
        Event::Resize(_, _) => Some(Command::Resize),
        _ => None,
    }
}

fn map_key(code: KeyCode) -> Option<Command> {
    let cmd = match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char(c @ '1'..='5') => {
            let i = c as usize - '1' as usize;
            Command::SwitchMode(Mode::ALL[i])
        }
        KeyCode::Char('b') => Command::Blink,
        KeyCode::Char('s') => Command::Sleep,
        KeyCode::Char('w') => Command::Wake,
        KeyCode::Char('r') => Command::ToggleBlush,
        KeyCode::Char('t') => Command::ToggleTongue,
        KeyCode::Char('[') => Command::Dirty(-GROOMING_STEP),
        KeyCode::Char(']') => Command::Dirty(GROOMING_STEP),
        KeyCode::Char('-') => Command::Mesh(-GROOMING_STEP),
        KeyCode::Char('=') | KeyCode::Char('+') => Command::Mesh(GROOMING_STEP),
        KeyCode::Char('x') => Command::ResetCare,
        KeyCode::Char('c') => Command::Celebrate,
        _ => return None,
    };
    Some(cmd)
}

fn over_canvas(row: u16, rows: u16) -> bool {
    row >= HUD_TOP && row < rows.saturating_sub(HUD_BOTTOM)
}

fn map_mouse(m: &MouseEvent, rows: u16) -> Option<Command> {
    match m.kind {
        MouseEventKind::Down(MouseButton::Left) if over_canvas(m.row, rows) => {
            Some(Command::PointerDown(MOUSE))
        }
        MouseEventKind::Up(MouseButton::Left) => Some(Command::PointerUp(MOUSE)),
        MouseEventKind::Drag(MouseButton::Left) if !over_canvas(m.row, rows) => {
            Some(Command::PointerLeave(MOUSE))
        }
        _ => None,
    }
}
