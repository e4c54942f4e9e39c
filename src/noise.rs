/// Fixed pseudo-random value in `[0, 1)` for a grid point.
///
/// Pure and stateless: the same `(x, y)` always yields the same value, so
/// texture drawn from it does not shimmer between frames.
pub(crate) fn hash01(x: f32, y: f32) -> f32 {
    // f64 keeps the large multiply stable; f32 loses most fractional bits.
    let s = ((x as f64) * 127.1 + (y as f64) * 311.7).sin() * 43758.5453;
    let f = (s - s.floor()) as f32;
    // rounding can land exactly on 1.0 after the narrowing cast
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}
