use crate::error::BirthdayError;
use crate::render::GroomingOptions;
use crate::Args;
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Delays driving the character's timed transitions, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Timings {
    pub(crate) blink_ms: u64,
    pub(crate) sleep_delay_ms: u64,
    pub(crate) long_press_ms: u64,
    pub(crate) celebrate_ms: u64,
    pub(crate) idle_night_ms: u64,
    pub(crate) idle_day_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            blink_ms: 160,
            sleep_delay_ms: 140,
            long_press_ms: 520,
            celebrate_ms: 900,
            idle_night_ms: 10_000,
            idle_day_ms: 30_000,
        }
    }
}

/// Month and day, written `MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct Birthday {
    month: u32,
    day: u32,
}

impl Birthday {
    pub(crate) fn new(month: u32, day: u32) -> Self {
        Self {
            month: month.clamp(1, 12),
            day: day.clamp(1, 31),
        }
    }

    pub(crate) fn falls_on(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

impl Default for Birthday {
    fn default() -> Self {
        Self::new(9, 18)
    }
}

impl fmt::Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for Birthday {
    type Err = BirthdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BirthdayError::Malformed(s.to_string());
        let (m, d) = s.trim().split_once('-').ok_or_else(malformed)?;
        let month = m.trim().parse::<u32>().map_err(|_| malformed())?;
        let day = d.trim().parse::<u32>().map_err(|_| malformed())?;
        Ok(Self::new(month, day))
    }
}

impl TryFrom<String> for Birthday {
    type Error = BirthdayError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Birthday> for String {
    fn from(b: Birthday) -> Self {
        b.to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) paint_hz: u32,
    pub(crate) enable_color: bool,
    pub(crate) birthday: Birthday,
    pub(crate) night_start_hour: u32,
    pub(crate) night_end_hour: u32,
    pub(crate) grooming: GroomingOptions,
    pub(crate) timings: Timings,
    pub(crate) log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            paint_hz: 30,
            enable_color: true,
            birthday: Birthday::default(),
            night_start_hour: 22,
            night_end_hour: 6,
            grooming: GroomingOptions::default(),
            timings: Timings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Command-line values win over the file.
    pub(crate) fn apply_args(&mut self, args: &Args) {
        if let Some(fps) = args.fps {
            self.fps_cap = fps;
        }
        if args.no_color {
            self.enable_color = false;
        }
        if let Some(b) = args.birthday {
            self.birthday = b;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
    }

    pub(crate) fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps_cap.clamp(10, 240) as f64
    }

    pub(crate) fn paint_interval_ms(&self) -> f64 {
        1000.0 / self.paint_hz.clamp(1, 240) as f64
    }

    pub(crate) fn is_night(&self, hour: u32) -> bool {
        is_night(hour, self.night_start_hour, self.night_end_hour)
    }
}

/// Night is `[start, end)` in local hours and may wrap past midnight.
pub(crate) fn is_night(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

pub(crate) struct Paths {
    pub(crate) data_dir: PathBuf,
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "hedgehog", "Hedgehog")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("hedgehog.log"),
        data_dir: dir,
    })
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // rename over an existing file is not atomic everywhere; clear it first
    if to.exists() {
        fs::remove_file(to).with_context(|| format!("removing old {}", to.display()))?;
    }
    fs::rename(from, to).with_context(|| format!("replacing {}", to.display()))?;
    Ok(())
}
