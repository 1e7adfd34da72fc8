//! Random point sets.

use lloyd::Point;
use rand::Rng;
use std::f64::consts::PI;

/// Draws `count` points within the disc of radius `max_radius` centered on the
/// origin.
///
/// Radius and angle are both uniform, which makes the set denser near the
/// center.
pub fn disc<R>(rng: &mut R, count: usize, max_radius: f64) -> Vec<Point>
where
    R: Rng,
{
    (0..count)
        .map(|_| {
            let radius = max_radius * rng.gen::<f64>();
            let angle = 2.0 * PI * rng.gen::<f64>();
            Point::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Rejects radii that would not yield a usable point set.
pub fn check_radius(radius: f64) -> anyhow::Result<f64> {
    if !(radius.is_finite() && 0.0 < radius) {
        anyhow::bail!("expected a positive radius, got {radius}");
    }
    Ok(radius)
}

/// Returns a seed from the system clock, to be used once per process.
pub fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
