//! Plain-text point files.
//!
//! Each line holds the whitespace-separated coordinates of one point, `x y`.
//! Empty lines and lines starting with `#` are ignored.  Clustered point sets
//! carry a third column: the group of the point.

use anyhow::Context as _;
use anyhow::Result;
use itertools::Itertools as _;
use lloyd::Point;
use std::io;

fn parse_coord(s: &str) -> Result<f64> {
    let f = s
        .parse::<f64>()
        .with_context(|| format!("{s:?} is not a valid float"))?;
    if !f.is_finite() {
        anyhow::bail!("{s:?} is not finite");
    }
    Ok(f)
}

/// Wrapping `r` in a [`std::io::BufReader`] is recommended.
pub fn read<R>(r: R) -> Result<Vec<Point>>
where
    R: io::BufRead,
{
    let mut points = Vec::new();
    for (line_idx, line) in r.lines().enumerate() {
        let line = line.context("failed to read point file")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (x, y) = line
            .split_whitespace()
            .collect_tuple()
            .with_context(|| format!("line {}: expected two coordinates", line_idx + 1))?;
        let x = parse_coord(x).with_context(|| format!("line {}", line_idx + 1))?;
        let y = parse_coord(y).with_context(|| format!("line {}", line_idx + 1))?;
        points.push(Point::new(x, y));
    }
    Ok(points)
}

/// Writes one point per line, followed by its group when `with_groups` is set.
pub fn write<W>(mut w: W, points: &[Point], with_groups: bool) -> Result<()>
where
    W: io::Write,
{
    for p in points {
        if with_groups {
            writeln!(w, "{} {} {}", p.position.x, p.position.y, p.group)?;
        } else {
            writeln!(w, "{} {}", p.position.x, p.position.y)?;
        }
    }
    w.flush()?;
    Ok(())
}
