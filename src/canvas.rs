use crate::error::SurfaceError;
use crate::surface::{LineCap, Rgba, Surface};
use std::f32::consts::TAU;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

/* -----------------------------
   Affine transform (canvas order: x' = a·x + c·y + e, y' = b·x + d·y + f)
------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq)]
struct Affine {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Affine {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += self.a * tx + self.c * ty;
        self.f += self.b * tx + self.d * ty;
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.a *= sx;
        self.b *= sx;
        self.c *= sy;
        self.d *= sy;
    }

    fn rotate(&mut self, radians: f32) {
        let (sin, cos) = radians.sin_cos();
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = a * cos + c * sin;
        self.b = b * cos + d * sin;
        self.c = c * cos - a * sin;
        self.d = d * cos - b * sin;
    }

    /// Geometric-mean scale factor, used to size strokes and arc tessellation.
    fn linear_scale(&self) -> f32 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

/* -----------------------------
   Coverage masks
------------------------------ */

struct Mask {
    x0: i32,
    y0: i32,
    w: i32,
    h: i32,
    bits: Vec<bool>,
}

impl Mask {
    fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Option<Self> {
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        let (w, h) = (x1 - x0, y1 - y0);
        Some(Self {
            x0,
            y0,
            w,
            h,
            bits: vec![false; (w as usize) * (h as usize)],
        })
    }

    fn set(&mut self, x: i32, y: i32) {
        let (lx, ly) = (x - self.x0, y - self.y0);
        if lx >= 0 && ly >= 0 && lx < self.w && ly < self.h {
            self.bits[(ly * self.w + lx) as usize] = true;
        }
    }

    fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|&(_, &on)| on)
            .map(|(i, _)| {
                let i = i as i32;
                (self.x0 + i % self.w, self.y0 + i / self.w)
            })
    }
}

#[derive(Clone)]
struct DrawState {
    transform: Affine,
    fill: Rgba,
    stroke: Rgba,
    line_width: f32,
    line_cap: LineCap,
    global_alpha: f32,
    /// Full-canvas clip; `None` means unclipped.
    clip: Option<Rc<Vec<bool>>>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            fill: Rgba::hex(0x000000),
            stroke: Rgba::hex(0x000000),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            global_alpha: 1.0,
            clip: None,
        }
    }
}

/// Points are stored already transformed into device space.
#[derive(Default)]
struct SubPath {
    pts: Vec<(f32, f32)>,
    closed: bool,
}

/* -----------------------------
   Pixel canvas
------------------------------ */

pub(crate) struct PixelCanvas {
    w: u32,
    h: u32,
    px: Vec<Pixel>,
    state: DrawState,
    stack: Vec<DrawState>,
    path: Vec<SubPath>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Result<Self, SurfaceError> {
        let len = (w as usize).checked_mul(h as usize);
        match len {
            Some(len) if len > 0 => Ok(Self {
                w,
                h,
                px: vec![Pixel::default(); len],
                state: DrawState::default(),
                stack: Vec::new(),
                path: Vec::new(),
            }),
            _ => Err(SurfaceError::Unavailable {
                width: w,
                height: h,
            }),
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.w
    }

    pub(crate) fn height(&self) -> u32 {
        self.h
    }

    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.px[self.idx(x, y)]
    }

    #[cfg(test)]
    pub(crate) fn pixels(&self) -> &[Pixel] {
        &self.px
    }

    pub(crate) fn clear(&mut self, p: Pixel) {
        self.px.fill(p);
    }

    fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }

    fn current_point(&self) -> Option<(f32, f32)> {
        self.path.last().and_then(|sp| sp.pts.last().copied())
    }

    fn push_point(&mut self, p: (f32, f32)) {
        match self.path.last_mut() {
            Some(sp) if !sp.closed => sp.pts.push(p),
            _ => self.path.push(SubPath {
                pts: vec![p],
                closed: false,
            }),
        }
    }

    /// Device-space bounds of the current path, clamped to the canvas, padded by `pad`.
    fn path_bounds(&self, pad: f32) -> Option<(i32, i32, i32, i32)> {
        let mut pts = self.path.iter().flat_map(|sp| sp.pts.iter());
        let &(fx, fy) = pts.next()?;
        let (mut x0, mut y0, mut x1, mut y1) = (fx, fy, fx, fy);
        for &(x, y) in pts {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
            return None;
        }
        Some((
            ((x0 - pad).floor() as i32).max(0),
            ((y0 - pad).floor() as i32).max(0),
            ((x1 + pad).ceil() as i32 + 1).min(self.w as i32),
            ((y1 + pad).ceil() as i32 + 1).min(self.h as i32),
        ))
    }

    /// Nonzero-winding scanline coverage of the current path, sampled at pixel centers.
    fn fill_mask(&self) -> Option<Mask> {
        let (bx0, by0, bx1, by1) = self.path_bounds(0.0)?;
        let mut mask = Mask::new(bx0, by0, bx1, by1)?;

        let mut edges: Vec<((f32, f32), (f32, f32))> = Vec::new();
        for sp in &self.path {
            if sp.pts.len() < 2 {
                continue;
            }
            for w in sp.pts.windows(2) {
                edges.push((w[0], w[1]));
            }
            // fills always close their subpaths
            if let (Some(&first), Some(&last)) = (sp.pts.first(), sp.pts.last()) {
                edges.push((last, first));
            }
        }

        let mut xs: Vec<(f32, i32)> = Vec::new();
        for py in by0..by1 {
            let sy = py as f32 + 0.5;
            xs.clear();
            for &((x0, y0), (x1, y1)) in &edges {
                if y0 == y1 {
                    continue;
                }
                let (lo, hi, dir) = if y0 < y1 { (y0, y1, 1) } else { (y1, y0, -1) };
                if sy < lo || sy >= hi {
                    continue;
                }
                let t = (sy - y0) / (y1 - y0);
                xs.push((x0 + t * (x1 - x0), dir));
            }
            xs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            let mut span_start = 0.0;
            for &(x, dir) in &xs {
                let before = winding;
                winding += dir;
                if before == 0 && winding != 0 {
                    span_start = x;
                } else if before != 0 && winding == 0 {
                    let first = (span_start - 0.5).ceil() as i32;
                    let last = (x - 0.5).ceil() as i32;
                    for px in first.max(bx0)..last.min(bx1) {
                        mask.set(px, py);
                    }
                }
            }
        }
        Some(mask)
    }

    fn stroke_mask(&self) -> Option<Mask> {
        let half = (self.state.line_width * self.state.transform.linear_scale() * 0.5).max(0.5);
        let (bx0, by0, bx1, by1) = self.path_bounds(half)?;
        let mut mask = Mask::new(bx0, by0, bx1, by1)?;
        let butt = self.state.line_cap == LineCap::Butt;

        for sp in &self.path {
            let mut segs: Vec<((f32, f32), (f32, f32))> =
                sp.pts.windows(2).map(|w| (w[0], w[1])).collect();
            if sp.closed && sp.pts.len() > 2 {
                if let (Some(&first), Some(&last)) = (sp.pts.first(), sp.pts.last()) {
                    segs.push((last, first));
                }
            }
            let count = segs.len();
            for (i, &((x0, y0), (x1, y1))) in segs.iter().enumerate() {
                // Only the open ends of a subpath get caps; interior joins are rounded.
                let cap_start = butt && !sp.closed && i == 0;
                let cap_end = butt && !sp.closed && i + 1 == count;

                let (dx, dy) = (x1 - x0, y1 - y0);
                let len2 = dx * dx + dy * dy;
                let sx0 = ((x0.min(x1) - half).floor() as i32).max(bx0);
                let sy0 = ((y0.min(y1) - half).floor() as i32).max(by0);
                let sx1 = ((x0.max(x1) + half).ceil() as i32 + 1).min(bx1);
                let sy1 = ((y0.max(y1) + half).ceil() as i32 + 1).min(by1);

                for py in sy0..sy1 {
                    for px in sx0..sx1 {
                        let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                        let t = if len2 > 0.0 {
                            ((cx - x0) * dx + (cy - y0) * dy) / len2
                        } else {
                            0.0
                        };
                        if (cap_start && t < 0.0) || (cap_end && t > 1.0) {
                            continue;
                        }
                        let t = t.clamp(0.0, 1.0);
                        let (nx, ny) = (x0 + t * dx - cx, y0 + t * dy - cy);
                        if nx * nx + ny * ny <= half * half {
                            mask.set(px, py);
                        }
                    }
                }
            }
        }
        Some(mask)
    }

    fn composite(&mut self, mask: &Mask, color: Rgba) {
        let alpha = (color.a * self.state.global_alpha).clamp(0.0, 1.0);
        let a = (alpha * 255.0 + 0.5) as u8;
        if a == 0 {
            return;
        }
        let src = Pixel {
            r: color.r,
            g: color.g,
            b: color.b,
            a,
        };
        let clip = self.state.clip.clone();
        for (x, y) in mask.iter() {
            if let Some(clip) = &clip {
                if !clip[self.idx(x as u32, y as u32)] {
                    continue;
                }
            }
            self.blend_over(x, y, src);
        }
    }
}

impl Surface for PixelCanvas {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(s) = self.stack.pop() {
            self.state = s;
        }
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.state.transform.translate(x, y);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.state.transform.scale(sx, sy);
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform.rotate(radians);
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.state.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    fn set_fill(&mut self, color: Rgba) {
        self.state.fill = color;
    }

    fn set_stroke(&mut self, color: Rgba) {
        self.state.stroke = color;
    }

    fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    fn set_line_cap(&mut self, cap: LineCap) {
        self.state.line_cap = cap;
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.state.transform.apply(x, y);
        self.path.push(SubPath {
            pts: vec![p],
            closed: false,
        });
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.state.transform.apply(x, y);
        self.push_point(p);
    }

    fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32) {
        const STEPS: usize = 16;
        let c = self.state.transform.apply(cpx, cpy);
        let end = self.state.transform.apply(x, y);
        let start = match self.current_point() {
            Some(p) => p,
            None => {
                self.push_point(c);
                c
            }
        };
        // affine maps preserve Bezier curves, so flatten in device space
        for i in 1..=STEPS {
            let t = i as f32 / STEPS as f32;
            let u = 1.0 - t;
            self.push_point((
                u * u * start.0 + 2.0 * u * t * c.0 + t * t * end.0,
                u * u * start.1 + 2.0 * u * t * c.1 + t * t * end.1,
            ));
        }
    }

    fn arc(&mut self, cx: f32, cy: f32, r: f32, start: f32, end: f32) {
        self.ellipse(cx, cy, r, r, 0.0, start, end);
    }

    fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, rotation: f32, start: f32, end: f32) {
        let mut sweep = end - start;
        if sweep < 0.0 {
            sweep = sweep.rem_euclid(TAU);
        }
        let sweep = sweep.min(TAU);

        let device_r = rx.abs().max(ry.abs()) * self.state.transform.linear_scale();
        let full = (device_r * 1.5).clamp(16.0, 180.0);
        let steps = ((sweep / TAU) * full).ceil().max(2.0) as usize;

        let (rs, rc) = rotation.sin_cos();
        for i in 0..=steps {
            let t = start + sweep * (i as f32 / steps as f32);
            let (ex, ey) = (rx * t.cos(), ry * t.sin());
            let (lx, ly) = (cx + ex * rc - ey * rs, cy + ex * rs + ey * rc);
            let p = self.state.transform.apply(lx, ly);
            self.push_point(p);
        }
    }

    fn close_path(&mut self) {
        if let Some(sp) = self.path.last_mut() {
            sp.closed = true;
        }
    }

    fn fill(&mut self) {
        if let Some(mask) = self.fill_mask() {
            let color = self.state.fill;
            self.composite(&mask, color);
        }
    }

    fn stroke(&mut self) {
        if let Some(mask) = self.stroke_mask() {
            let color = self.state.stroke;
            self.composite(&mask, color);
        }
    }

    fn clip(&mut self) {
        let mut next = vec![false; self.px.len()];
        if let Some(mask) = self.fill_mask() {
            for (x, y) in mask.iter() {
                let i = self.idx(x as u32, y as u32);
                let allowed = self.state.clip.as_ref().map_or(true, |c| c[i]);
                next[i] = allowed;
            }
        }
        self.state.clip = Some(Rc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    const RED: Rgba = Rgba::hex(0xff0000);

    fn opaque_count(c: &PixelCanvas) -> usize {
        c.pixels().iter().filter(|p| p.a > 0).count()
    }

    #[test]
    fn zero_sized_surface_is_rejected() {
        assert_eq!(
            PixelCanvas::new(0, 12).err(),
            Some(SurfaceError::Unavailable {
                width: 0,
                height: 12
            })
        );
        assert!(PixelCanvas::new(4, 0).is_err());
        assert!(PixelCanvas::new(1, 1).is_ok());
    }

    #[test]
    fn filled_circle_covers_about_pi_r_squared() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(64, 64)?;
        c.set_fill(RED);
        c.begin_path();
        c.arc(32.0, 32.0, 10.0, 0.0, TAU);
        c.fill();

        let n = opaque_count(&c) as f32;
        let expect = std::f32::consts::PI * 100.0;
        assert!((n - expect).abs() < expect * 0.08, "{n} vs {expect}");
        assert_eq!(c.pixel(32, 32), Pixel { r: 255, g: 0, b: 0, a: 255 });
        assert_eq!(c.pixel(0, 0), Pixel::default());
        Ok(())
    }

    #[test]
    fn transform_scales_and_translates_paths() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(40, 40)?;
        c.translate(20.0, 20.0);
        c.scale(2.0, 2.0);
        c.set_fill(RED);
        c.begin_path();
        c.move_to(-5.0, -5.0);
        c.line_to(5.0, -5.0);
        c.line_to(5.0, 5.0);
        c.line_to(-5.0, 5.0);
        c.fill();

        assert_eq!(opaque_count(&c), 400);
        assert_eq!(c.pixel(10, 10).a, 255);
        assert_eq!(c.pixel(9, 10).a, 0);
        assert_eq!(c.pixel(29, 29).a, 255);
        assert_eq!(c.pixel(30, 29).a, 0);
        Ok(())
    }

    #[test]
    fn restore_undoes_transform_and_alpha() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(20, 20)?;
        c.save();
        c.translate(100.0, 100.0);
        c.set_global_alpha(0.0);
        c.restore();

        c.set_fill(RED);
        c.begin_path();
        c.arc(10.0, 10.0, 3.0, 0.0, TAU);
        c.fill();
        assert_eq!(c.pixel(10, 10).a, 255);
        Ok(())
    }

    #[test]
    fn clip_limits_later_fills_until_restore() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(30, 30)?;
        c.save();
        c.begin_path();
        c.move_to(0.0, 0.0);
        c.line_to(15.0, 0.0);
        c.line_to(15.0, 30.0);
        c.line_to(0.0, 30.0);
        c.clip();

        c.set_fill(RED);
        c.begin_path();
        c.move_to(0.0, 0.0);
        c.line_to(30.0, 0.0);
        c.line_to(30.0, 30.0);
        c.line_to(0.0, 30.0);
        c.fill();
        assert_eq!(opaque_count(&c), 15 * 30);
        c.restore();

        c.fill();
        assert_eq!(opaque_count(&c), 30 * 30);
        Ok(())
    }

    #[test]
    fn global_alpha_scales_paint_alpha() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(10, 10)?;
        c.set_global_alpha(0.5);
        c.set_fill(Rgba::rgba(255, 255, 255, 0.5));
        c.begin_path();
        c.arc(5.0, 5.0, 4.0, 0.0, TAU);
        c.fill();
        // 0.25 * 255 rounds to 64
        assert_eq!(c.pixel(5, 5).a, 64);
        Ok(())
    }

    #[test]
    fn out_of_range_alpha_is_clamped() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(10, 10)?;
        c.set_global_alpha(7.5);
        c.set_fill(RED);
        c.begin_path();
        c.arc(5.0, 5.0, 4.0, 0.0, TAU);
        c.fill();
        assert_eq!(c.pixel(5, 5).a, 255);

        c.set_global_alpha(-2.0);
        c.set_fill(Rgba::hex(0x00ff00));
        c.fill();
        assert_eq!(c.pixel(5, 5).r, 255);
        Ok(())
    }

    #[test]
    fn stroke_draws_a_line_of_the_requested_width() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(40, 20)?;
        c.set_stroke(RED);
        c.set_line_width(4.0);
        c.begin_path();
        c.move_to(5.0, 10.0);
        c.line_to(35.0, 10.0);
        c.stroke();

        assert_eq!(c.pixel(20, 10).a, 255);
        assert_eq!(c.pixel(20, 8).a, 255);
        assert_eq!(c.pixel(20, 11).a, 255);
        assert_eq!(c.pixel(20, 14).a, 0);
        // butt caps stop at the endpoints
        assert_eq!(c.pixel(3, 10).a, 0);
        assert_eq!(c.pixel(37, 10).a, 0);
        Ok(())
    }

    #[test]
    fn round_caps_extend_past_endpoints() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(40, 20)?;
        c.set_stroke(RED);
        c.set_line_width(6.0);
        c.set_line_cap(LineCap::Round);
        c.begin_path();
        c.move_to(10.0, 10.0);
        c.line_to(30.0, 10.0);
        c.stroke();
        assert_eq!(c.pixel(8, 10).a, 255);
        assert_eq!(c.pixel(31, 10).a, 255);
        Ok(())
    }

    #[test]
    fn rotation_turns_paths_about_the_origin() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(40, 40)?;
        c.translate(20.0, 20.0);
        c.rotate(std::f32::consts::FRAC_PI_2);
        c.set_fill(RED);
        c.begin_path();
        // a bar along +x becomes a bar along +y
        c.move_to(2.0, -1.0);
        c.line_to(15.0, -1.0);
        c.line_to(15.0, 1.0);
        c.line_to(2.0, 1.0);
        c.fill();
        assert_eq!(c.pixel(20, 30).a, 255);
        assert_eq!(c.pixel(30, 20).a, 0);
        Ok(())
    }

    #[test]
    fn paths_off_canvas_are_ignored() -> anyhow::Result<()> {
        let mut c = PixelCanvas::new(10, 10)?;
        c.set_fill(RED);
        c.begin_path();
        c.arc(-100.0, -100.0, 5.0, 0.0, TAU);
        c.fill();
        c.begin_path();
        c.fill();
        assert_eq!(opaque_count(&c), 0);
        Ok(())
    }
}
