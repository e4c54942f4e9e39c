use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Mode {
    #[default]
    Daily,
    Sleep,
    Care,
    Birthday,
    Quote,
}

impl Mode {
    pub(crate) const ALL: [Mode; 5] = [
        Mode::Daily,
        Mode::Sleep,
        Mode::Care,
        Mode::Birthday,
        Mode::Quote,
    ];

    /// Only the bedtime mode keeps the frame pump alive for breathing and dozing.
    pub(crate) fn continuous_animation(self) -> bool {
        matches!(self, Mode::Sleep)
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Mode::Daily => "Today",
            Mode::Sleep => "Bedtime",
            Mode::Care => "Care",
            Mode::Birthday => "Birthday",
            Mode::Quote => "Quote",
        }
    }

    pub(crate) fn hint(self) -> &'static str {
        match self {
            Mode::Daily => "b blink | r blush",
            Mode::Sleep => "click blink | hold to sleep | b blink | s sleep | w wake",
            Mode::Care => "[ ] dirt | - = mesh | t tongue | r blush | x reset | b blink",
            Mode::Birthday => "c celebrate | b blink",
            Mode::Quote => "b blink",
        }
    }
}

/// Where the current blush came from, so leaving birthday mode only clears its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Blush {
    #[default]
    Off,
    Manual,
    Birthday,
}

impl Blush {
    pub(crate) fn is_visible(self) -> bool {
        !matches!(self, Blush::Off)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PointerId(pub(crate) u32);

/// Environment facts a mode switch needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ModeContext {
    pub(crate) night: bool,
    pub(crate) birthday_today: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CharacterState {
    pub(crate) awake: bool,
    pub(crate) blush: Blush,
    /// Breathing offset, -1..=1.
    pub(crate) bob: f64,
    pub(crate) idle_ms: f64,
    pub(crate) pressing: bool,
    pub(crate) long_press_fired: bool,
    pub(crate) celebrating: bool,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            awake: true,
            blush: Blush::Off,
            bob: 0.0,
            idle_ms: 0.0,
            pressing: false,
            long_press_fired: false,
            celebrating: false,
        }
    }
}
