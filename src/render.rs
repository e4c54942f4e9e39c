use crate::noise::hash01;
use crate::surface::{LineCap, Rgba, Surface};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Reference size the artwork is authored at; callers scale it to fit.
pub(crate) const DESIGN_SIZE: f32 = 280.0;

/* -----------------------------
   Palette
------------------------------ */

pub(crate) const BACK: Rgba = Rgba::hex(0x8a7a43);
pub(crate) const MESH_LINE: Rgba = Rgba::rgba(255, 255, 255, 0.55);
pub(crate) const SPECKLE_LIGHT: Rgba = Rgba::rgba(255, 255, 255, 0.75);
pub(crate) const SPECKLE_DARK: Rgba = Rgba::rgba(70, 55, 35, 0.85);
pub(crate) const FACE: Rgba = Rgba::hex(0xd8cbbb);
pub(crate) const FACE_SPECKLE: Rgba = Rgba::rgba(120, 95, 70, 0.8);
pub(crate) const EAR_OUTER: Rgba = Rgba::hex(0xc9b8a6);
pub(crate) const EAR_INNER: Rgba = Rgba::hex(0xb8a796);
pub(crate) const EAR_RIM: Rgba = Rgba::rgba(90, 70, 50, 0.9);
pub(crate) const EYE: Rgba = Rgba::hex(0x1f1a17);
pub(crate) const EYE_GLINT: Rgba = Rgba::rgba(255, 255, 255, 0.55);
pub(crate) const LID: Rgba = Rgba::hex(0x2b1a16);
pub(crate) const NOSE: Rgba = Rgba::hex(0x141312);
pub(crate) const NOSE_SHADE: Rgba = Rgba::rgba(0, 0, 0, 1.0);
pub(crate) const NOSE_GLINT: Rgba = Rgba::rgba(255, 255, 255, 0.20);
pub(crate) const NOSE_SHEEN: Rgba = Rgba::rgba(255, 255, 255, 0.22);
pub(crate) const MOUTH: Rgba = Rgba::hex(0x4a2a1f);
pub(crate) const TONGUE: Rgba = Rgba::hex(0xff8fb2);
pub(crate) const BLUSH: Rgba = Rgba::rgba(255, 105, 180, 0.18);
pub(crate) const PAW: Rgba = Rgba::hex(0xc9b8a6);

// speckle thresholds on the noise field
const BACK_SPECKLE_MIN: f32 = 0.62;
const BACK_SPECKLE_LIGHT: f32 = 0.86;
const FACE_SPECKLE_MIN: f32 = 0.72;
// decorrelates the face texture from the back texture
const FACE_NOISE_OFFSET: (f32, f32) = (999.0, 777.0);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct GroomingOptions {
    /// Worn-fabric speckle density, 0..=1.
    pub(crate) dirty: f32,
    /// Cross-hatch opacity on the back, 0..=1.
    pub(crate) mesh: f32,
    pub(crate) tongue: bool,
}

impl Default for GroomingOptions {
    fn default() -> Self {
        Self {
            dirty: 0.18,
            mesh: 0.55,
            tongue: false,
        }
    }
}

impl GroomingOptions {
    pub(crate) fn clamped(self) -> Self {
        Self {
            dirty: clamp01(self.dirty),
            mesh: clamp01(self.mesh),
            tongue: self.tongue,
        }
    }

    pub(crate) fn nudge_dirty(&mut self, delta: f32) {
        self.dirty = clamp01(self.dirty + delta);
    }

    pub(crate) fn nudge_mesh(&mut self, delta: f32) {
        self.mesh = clamp01(self.mesh + delta);
    }
}

/// Everything one repaint depends on besides placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RenderParameters {
    pub(crate) awake: bool,
    pub(crate) blush: bool,
    pub(crate) dirty: f32,
    pub(crate) mesh: f32,
    pub(crate) tongue: bool,
}

impl RenderParameters {
    pub(crate) fn new(awake: bool, blush: bool, opts: GroomingOptions) -> Self {
        let opts = opts.clamped();
        Self {
            awake,
            blush,
            dirty: opts.dirty,
            mesh: opts.mesh,
            tongue: opts.tongue,
        }
    }
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Repaint the hedgehog centered on `(cx, cy)`, one design unit = `scale` pixels.
///
/// Only the character's own region is painted; clearing is the caller's job.
pub(crate) fn render<S: Surface>(
    s: &mut S,
    cx: f32,
    cy: f32,
    scale: f32,
    awake: bool,
    blush: bool,
    opts: GroomingOptions,
) {
    render_params(s, cx, cy, scale, &RenderParameters::new(awake, blush, opts));
}

pub(crate) fn render_params<S: Surface>(s: &mut S, cx: f32, cy: f32, scale: f32, p: &RenderParameters) {
    let dirty = clamp01(p.dirty);
    let mesh = clamp01(p.mesh);

    s.save();
    s.translate(cx, cy);
    s.scale(scale, scale);

    draw_back(s, dirty, mesh);
    draw_face(s, dirty);
    draw_ear(s, -68.0, -14.0, -1.0);
    draw_ear(s, 68.0, -14.0, 1.0);
    draw_eyes(s, p.awake);
    // never stick the tongue out in its sleep
    draw_nose(s, p.awake && p.tongue);
    if p.blush {
        draw_blush(s);
    }
    draw_paws(s);

    s.restore();
}

fn fill_circle<S: Surface>(s: &mut S, x: f32, y: f32, r: f32) {
    s.begin_path();
    s.arc(x, y, r, 0.0, TAU);
    s.fill();
}

fn ellipse_path<S: Surface>(s: &mut S, x: f32, y: f32, rx: f32, ry: f32) {
    s.begin_path();
    s.ellipse(x, y, rx, ry, 0.0, 0.0, TAU);
}

fn fill_ellipse<S: Surface>(s: &mut S, x: f32, y: f32, rx: f32, ry: f32) {
    ellipse_path(s, x, y, rx, ry);
    s.fill();
}

/* -----------------------------
   Layers, back to front
------------------------------ */

fn draw_back<S: Surface>(s: &mut S, dirty: f32, mesh: f32) {
    s.save();
    s.set_fill(BACK);
    fill_ellipse(s, 0.0, 0.0, 95.0, 112.0);

    s.set_global_alpha(0.16 * mesh);
    s.set_stroke(MESH_LINE);
    s.set_line_width(1.0);
    for i in (-110..=110).step_by(8) {
        let i = i as f32;
        s.begin_path();
        s.move_to(-110.0, i);
        s.line_to(110.0, i - 60.0);
        s.stroke();

        s.begin_path();
        s.move_to(-110.0, i - 60.0);
        s.line_to(110.0, i);
        s.stroke();
    }
    s.set_global_alpha(1.0);

    s.save();
    ellipse_path(s, 0.0, 0.0, 95.0, 112.0);
    s.clip();
    for gx in (-90..=90).step_by(6) {
        for gy in (-105..=105).step_by(6) {
            let (gx, gy) = (gx as f32, gy as f32);
            let v = hash01(gx, gy);
            if v < BACK_SPECKLE_MIN {
                continue;
            }
            let a = (v - BACK_SPECKLE_MIN) / (1.0 - BACK_SPECKLE_MIN);
            s.set_global_alpha(0.10 + a * 0.20 * dirty);
            s.set_fill(if v > BACK_SPECKLE_LIGHT {
                SPECKLE_LIGHT
            } else {
                SPECKLE_DARK
            });
            fill_circle(s, gx + (v - 0.5) * 4.0, gy + (0.5 - v) * 4.0, 2.2 + a * 1.8);
        }
    }
    s.restore();
    s.restore();
}

fn draw_face<S: Surface>(s: &mut S, dirty: f32) {
    s.save();
    s.set_fill(FACE);
    fill_ellipse(s, 0.0, 18.0, 84.0, 78.0);

    ellipse_path(s, 0.0, 18.0, 84.0, 78.0);
    s.clip();

    s.set_fill(FACE_SPECKLE);
    for gx in (-80..=80).step_by(7) {
        for gy in (-55..=85).step_by(7) {
            let (gx, gy) = (gx as f32, gy as f32);
            let v = hash01(gx + FACE_NOISE_OFFSET.0, gy + FACE_NOISE_OFFSET.1);
            if v < FACE_SPECKLE_MIN {
                continue;
            }
            s.set_global_alpha(0.05 + (v - FACE_SPECKLE_MIN) * 0.20 * dirty);
            fill_circle(s, gx, gy + 18.0, 1.6);
        }
    }
    s.restore();
}

/// Floppy ear turned outward; `flip` is -1 for the left ear, 1 for the right.
fn draw_ear<S: Surface>(s: &mut S, x: f32, y: f32, flip: f32) {
    s.save();
    s.translate(x, y);
    s.rotate(flip * 0.35);

    s.set_fill(EAR_OUTER);
    fill_ellipse(s, 0.0, 0.0, 16.0, 20.0);

    s.set_fill(EAR_INNER);
    fill_ellipse(s, flip * 4.0, 3.0, 10.0, 14.0);

    s.set_global_alpha(0.35);
    s.set_stroke(EAR_RIM);
    s.set_line_width(2.0);
    s.begin_path();
    s.arc(0.0, 0.0, 16.0, PI * 0.2, PI * 0.9);
    s.stroke();

    s.restore();
}

fn draw_eyes<S: Surface>(s: &mut S, awake: bool) {
    s.save();
    if awake {
        s.set_fill(EYE);
        fill_circle(s, -30.0, 8.0, 9.5);
        fill_circle(s, 30.0, 8.0, 9.5);

        s.set_fill(EYE_GLINT);
        fill_circle(s, -33.0, 5.0, 2.2);
        fill_circle(s, 27.0, 5.0, 2.2);
    } else {
        s.set_stroke(LID);
        s.set_line_width(4.5);
        s.set_line_cap(LineCap::Round);
        for x in [-30.0, 30.0] {
            s.begin_path();
            s.move_to(x - 12.0, 8.0);
            s.quadratic_curve_to(x, 16.0, x + 12.0, 8.0);
            s.stroke();
        }
    }
    s.restore();
}

fn draw_nose<S: Surface>(s: &mut S, tongue: bool) {
    s.save();
    s.set_fill(NOSE);
    fill_circle(s, 0.0, 48.0, 17.0);

    s.set_global_alpha(0.25);
    s.set_fill(NOSE_SHADE);
    fill_ellipse(s, 0.0, 52.0, 14.0, 6.0);
    s.set_global_alpha(1.0);

    s.set_fill(NOSE_GLINT);
    fill_circle(s, -6.0, 44.0, 3.5);
    s.set_fill(NOSE_SHEEN);
    fill_ellipse(s, -6.0, 44.0, 5.0, 4.0);

    s.set_global_alpha(0.25);
    s.set_stroke(MOUTH);
    s.set_line_width(3.0);
    s.set_line_cap(LineCap::Round);
    s.begin_path();
    s.move_to(-10.0, 62.0);
    s.quadratic_curve_to(0.0, 66.0, 10.0, 62.0);
    s.stroke();
    s.set_global_alpha(1.0);

    if tongue {
        s.set_fill(TONGUE);
        s.begin_path();
        s.move_to(-5.0, 63.0);
        s.quadratic_curve_to(0.0, 74.0, 5.0, 63.0);
        s.close_path();
        s.fill();
    }
    s.restore();
}

fn draw_blush<S: Surface>(s: &mut S) {
    s.save();
    s.set_fill(BLUSH);
    fill_circle(s, -52.0, 40.0, 13.0);
    fill_circle(s, 52.0, 40.0, 13.0);
    s.restore();
}

fn draw_paws<S: Surface>(s: &mut S) {
    s.save();
    s.set_fill(PAW);
    fill_ellipse(s, -42.0, 96.0, 14.0, 12.0);
    fill_ellipse(s, 42.0, 96.0, 14.0, 12.0);

    s.set_global_alpha(0.28);
    fill_ellipse(s, -42.0, 100.0, 12.0, 6.0);
    fill_ellipse(s, 42.0, 100.0, 12.0, 6.0);
    s.restore();
}
