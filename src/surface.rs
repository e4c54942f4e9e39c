/// Straight-alpha paint color. Channels are 0..=255, `a` is 0.0..=1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Rgba {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: f32,
}

impl Rgba {
    /// Opaque color from `0xRRGGBB`.
    pub(crate) const fn hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xff) as u8,
            g: ((rgb >> 8) & 0xff) as u8,
            b: (rgb & 0xff) as u8,
            a: 1.0,
        }
    }

    pub(crate) const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum LineCap {
    #[default]
    Butt,
    Round,
}

/// A 2D raster drawing surface with a canvas-style immediate-mode API.
///
/// Paths are built in the current transform and consumed by `fill`,
/// `stroke` or `clip`. `save`/`restore` push and pop transform, paint,
/// line settings, global alpha and clip together.
pub(crate) trait Surface {
    fn save(&mut self);
    fn restore(&mut self);

    fn translate(&mut self, x: f32, y: f32);
    fn scale(&mut self, sx: f32, sy: f32);
    fn rotate(&mut self, radians: f32);

    fn set_global_alpha(&mut self, alpha: f32);
    fn set_fill(&mut self, color: Rgba);
    fn set_stroke(&mut self, color: Rgba);
    fn set_line_width(&mut self, width: f32);
    fn set_line_cap(&mut self, cap: LineCap);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quadratic_curve_to(&mut self, cpx: f32, cpy: f32, x: f32, y: f32);
    /// Clockwise arc from `start` to `end` radians.
    fn arc(&mut self, cx: f32, cy: f32, r: f32, start: f32, end: f32);
    #[allow(clippy::too_many_arguments)]
    fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, rotation: f32, start: f32, end: f32);
    fn close_path(&mut self);

    fn fill(&mut self);
    fn stroke(&mut self);
    /// Intersect the clip region with the current path.
    fn clip(&mut self);
}
