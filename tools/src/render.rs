//! Vector images of a clustered point set.
//!
//! Both formats draw on a fixed 400x400 canvas: the point set is centered and
//! scaled uniformly to fit, each point is drawn as a dot colored after its
//! group, and each centroid as a white square outlined in black.

use itertools::Itertools as _;
use lloyd::BoundingBox;
use lloyd::Centroid;
use lloyd::Point;
use lloyd::Point2D;
use rayon::iter::IntoParallelRefIterator as _;
use rayon::iter::ParallelIterator as _;
use std::collections::HashMap;
use std::io;

const WIDTH: f64 = 400.0;
const HEIGHT: f64 = 400.0;

/// Maps data coordinates onto the canvas.
#[derive(Debug, Clone, Copy)]
struct Frame {
    center: Point2D,
    scale: f64,
}

impl Frame {
    fn new(points: &[Point]) -> Frame {
        let bb = match BoundingBox::from_points(points.par_iter().map(|p| p.position)) {
            Some(v) => v,
            None => {
                return Frame {
                    center: Point2D::zeros(),
                    scale: 1.0,
                }
            }
        };
        let mut scale = f64::min(WIDTH / bb.width(), HEIGHT / bb.height());
        if !scale.is_finite() {
            // All points are at the same position.
            scale = 1.0;
        }
        Frame {
            center: bb.center(),
            scale,
        }
    }

    fn apply(&self, p: &Point2D) -> Point2D {
        (p - self.center) * self.scale + Point2D::new(WIDTH / 2.0, HEIGHT / 2.0)
    }
}

/// RGB color of the given group, each channel in `[0, 1]`.
fn color(group: usize, group_count: usize) -> [f64; 3] {
    let k = group_count as f64;
    [
        (3 * (group + 1) % group_count) as f64 / k,
        (7 * group % group_count) as f64 / k,
        (9 * group % group_count) as f64 / k,
    ]
}

fn members(points: &[Point]) -> HashMap<usize, Vec<&Point>> {
    points.iter().map(|p| (p.group, p)).into_group_map()
}

/// Writes an Encapsulated PostScript document.
pub fn write_eps<W>(mut w: W, points: &[Point], centroids: &[Centroid]) -> io::Result<()>
where
    W: io::Write,
{
    let frame = Frame::new(points);
    let members = members(points);

    writeln!(w, "%!PS-Adobe-3.0 EPSF-3.0")?;
    writeln!(w, "%%BoundingBox: -5 -5 {} {}", WIDTH + 10.0, HEIGHT + 10.0)?;
    writeln!(w, "/l {{rlineto}} def /m {{rmoveto}} def")?;
    writeln!(w, "/c {{ .25 sub exch .25 sub exch .5 0 360 arc fill }} def")?;
    writeln!(
        w,
        "/s {{ moveto -2 0 m 2 2 l 2 -2 l -2 -2 l closepath \
         gsave 1 setgray fill grestore gsave 3 setlinewidth \
         1 setgray stroke grestore 0 setgray stroke }}def"
    )?;

    for (group, centroid) in centroids.iter().enumerate() {
        let [r, g, b] = color(group, centroids.len());
        writeln!(w, "{r} {g} {b} setrgbcolor")?;
        for p in members.get(&group).into_iter().flatten() {
            let p = frame.apply(&p.position);
            writeln!(w, "{:.3} {:.3} c", p.x, p.y)?;
        }
        if centroid.position.iter().all(|c| c.is_finite()) {
            let c = frame.apply(&centroid.position);
            writeln!(w, "\n0 setgray {} {} s", c.x, c.y)?;
        }
    }

    writeln!(w, "\n%%EOF")?;
    w.flush()
}

/// Writes a Scalable Vector Graphics document.
pub fn write_svg<W>(mut w: W, points: &[Point], centroids: &[Centroid]) -> io::Result<()>
where
    W: io::Write,
{
    let frame = Frame::new(points);
    let members = members(points);
    // SVG's y axis points downward.
    let to_svg = |p: &Point2D| {
        let p = frame.apply(p);
        (p.x, HEIGHT - p.y)
    };

    writeln!(
        w,
        r#"<svg viewBox="-5 -5 {} {}" xmlns="http://www.w3.org/2000/svg">"#,
        WIDTH + 10.0,
        HEIGHT + 10.0,
    )?;

    for (group, centroid) in centroids.iter().enumerate() {
        let [r, g, b] = color(group, centroids.len());
        let rgb = |c: f64| (c * 255.0) as u8;
        writeln!(w, r##"<g fill="#{:02x}{:02x}{:02x}">"##, rgb(r), rgb(g), rgb(b))?;
        for p in members.get(&group).into_iter().flatten() {
            let (x, y) = to_svg(&p.position);
            writeln!(w, r#"<circle cx="{x:.3}" cy="{y:.3}" r="0.5"/>"#)?;
        }
        writeln!(w, "</g>")?;
        if centroid.position.iter().all(|c| c.is_finite()) {
            let (x, y) = to_svg(&centroid.position);
            writeln!(
                w,
                r#"<rect x="{}" y="{}" width="4" height="4" fill="white" stroke="black"/>"#,
                x - 2.0,
                y - 2.0,
            )?;
        }
    }

    writeln!(w, "</svg>")?;
    w.flush()
}
