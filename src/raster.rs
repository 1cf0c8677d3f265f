//! CPU rasterizer for stage layers.
//!
//! Everything is drawn straight-alpha into `RgbaImage` buffers sized to the
//! stage. Strokes are evaluated as capsules (distance to each segment) with a
//! one-pixel anti-aliased edge; rectangles are hard-edged.

use image::RgbaImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::stage::{CircleShape, CompositeOp, Group, ImageShape, LineShape, Node, RectShape, StageLayer};

/// Looks up the pixels behind an image object's `image_name`.
pub trait ImageResolver: Sync {
    fn resolve(&self, image_name: &str) -> Option<RgbaImage>;
}

/// Resolver that knows no images; image objects draw nothing.
pub struct NoImages;

impl ImageResolver for NoImages {
    fn resolve(&self, _image_name: &str) -> Option<RgbaImage> {
        None
    }
}

/// Resolves image names as plain file names inside a directory.
pub struct DirImageResolver {
    root: PathBuf,
}

impl DirImageResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageResolver for DirImageResolver {
    fn resolve(&self, image_name: &str) -> Option<RgbaImage> {
        let name = Path::new(image_name);
        // Only bare file names: no separators, no parent hops.
        if name.file_name().map(|f| f != name.as_os_str()).unwrap_or(true) {
            log::warn!("rejected image name '{}'", image_name);
            return None;
        }
        match image::open(self.root.join(name)) {
            Ok(img) => Some(img.into_rgba8()),
            Err(e) => {
                log::warn!("could not load image '{}': {}", image_name, e);
                None
            }
        }
    }
}

/// Rasterize one stage layer onto a transparent buffer of `width` x `height`.
pub fn rasterize_layer(
    layer: &StageLayer,
    width: u32,
    height: u32,
    images: &dyn ImageResolver,
) -> RgbaImage {
    let mut target = RgbaImage::new(width, height);
    draw_nodes(&mut target, &layer.children, images);
    target
}

fn draw_nodes(target: &mut RgbaImage, nodes: &[Node], images: &dyn ImageResolver) {
    for node in nodes {
        match node {
            Node::Group(group) => draw_group(target, group, images),
            Node::Line(line) => stroke_line(target, line),
            Node::Rect(rect) => draw_rect(target, rect),
            Node::Image(shape) => draw_image(target, shape, images),
            Node::Circle(circle) => draw_circle(target, circle),
        }
    }
}

/// Cached (or translucent) groups render into their own buffer first, so
/// eraser strokes only cut into their siblings and opacity applies once.
fn draw_group(target: &mut RgbaImage, group: &Group, images: &dyn ImageResolver) {
    if group.opacity <= 0.0 {
        return;
    }
    if !group.cached && group.opacity >= 1.0 {
        draw_nodes(target, &group.children, images);
        return;
    }
    let mut buffer = RgbaImage::new(target.width(), target.height());
    draw_nodes(&mut buffer, &group.children, images);
    composite_over(target, &buffer, group.opacity.min(1.0));
}

/// Source-over `src` onto `dst` (same size), scaled by `opacity`.
pub fn composite_over(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32) {
    debug_assert_eq!(dst.dimensions(), src.dimensions());
    let dst_raw: &mut [u8] = &mut **dst;
    let src_raw: &[u8] = src;
    dst_raw
        .par_chunks_mut(4)
        .zip(src_raw.par_chunks(4))
        .for_each(|(d, s)| {
            if s[3] != 0 {
                blend_over(d, [s[0], s[1], s[2], s[3]], opacity);
            }
        });
}

// ============================================================================
// PIXEL OPS (straight alpha, one RGBA pixel per slice)
// ============================================================================

#[inline]
fn blend_over(dst: &mut [u8], src: [u8; 4], coverage: f32) {
    let sa = src[3] as f32 / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[inline]
fn erase(dst: &mut [u8], strength: f32) {
    let a = dst[3] as f32 * (1.0 - strength.clamp(0.0, 1.0));
    dst[3] = a.round() as u8;
}

#[inline]
fn apply(dst: &mut [u8], color: [u8; 4], coverage: f32, op: CompositeOp) {
    match op {
        CompositeOp::SourceOver => blend_over(dst, color, coverage),
        CompositeOp::DestinationOut => erase(dst, color[3] as f32 / 255.0 * coverage),
    }
}

/// Anti-aliased coverage for a pixel centre at distance `d` from an edge
/// that sits at `radius`.
#[inline]
fn edge_coverage(radius: f32, d: f32) -> f32 {
    (radius - d + 0.5).clamp(0.0, 1.0)
}

/// Clamp a float span to a pixel range `[lo, hi)` inside `0..limit`.
fn pixel_span(min: f32, max: f32, limit: u32) -> (u32, u32) {
    let lo = min.floor().max(0.0).min(limit as f32) as u32;
    let hi = max.ceil().max(0.0).min(limit as f32) as u32;
    (lo, hi)
}

// ============================================================================
// LINES
// ============================================================================

struct Segment {
    ax: f32,
    ay: f32,
    bx: f32,
    by: f32,
}

impl Segment {
    fn distance(&self, px: f32, py: f32) -> f32 {
        let dx = self.bx - self.ax;
        let dy = self.by - self.ay;
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq < 1e-6 {
            0.0
        } else {
            (((px - self.ax) * dx + (py - self.ay) * dy) / len_sq).clamp(0.0, 1.0)
        };
        let qx = self.ax + dx * t - px;
        let qy = self.ay + dy * t - py;
        (qx * qx + qy * qy).sqrt()
    }

    fn y_range(&self) -> (f32, f32) {
        (self.ay.min(self.by), self.ay.max(self.by))
    }
}

/// Stroke a polyline with round caps and joins.
fn stroke_line(target: &mut RgbaImage, line: &LineShape) {
    let radius = line.stroke_width / 2.0;
    if radius <= 0.0 {
        return;
    }
    let points: Vec<(f32, f32)> = line.points.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    let segments: Vec<Segment> = match points.len() {
        0 => return,
        1 => vec![Segment {
            ax: points[0].0,
            ay: points[0].1,
            bx: points[0].0,
            by: points[0].1,
        }],
        _ => points
            .windows(2)
            .map(|w| Segment {
                ax: w[0].0,
                ay: w[0].1,
                bx: w[1].0,
                by: w[1].1,
            })
            .collect(),
    };

    let (min_x, min_y, max_x, max_y) = points.iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(a, b, c, d), &(x, y)| (a.min(x), b.min(y), c.max(x), d.max(y)),
    );
    let (w, h) = target.dimensions();
    let (x0, x1) = pixel_span(min_x - radius - 1.0, max_x + radius + 1.0, w);
    let (y0, y1) = pixel_span(min_y - radius - 1.0, max_y + radius + 1.0, h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = w as usize * 4;
    let raw: &mut [u8] = &mut **target;
    raw[y0 as usize * stride..y1 as usize * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row, row_px)| {
            let cy = (y0 + row as u32) as f32 + 0.5;
            let near: Vec<&Segment> = segments
                .iter()
                .filter(|s| {
                    let (lo, hi) = s.y_range();
                    cy >= lo - radius - 1.0 && cy <= hi + radius + 1.0
                })
                .collect();
            if near.is_empty() {
                return;
            }
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                let d = near
                    .iter()
                    .map(|s| s.distance(cx, cy))
                    .fold(f32::MAX, f32::min);
                let coverage = edge_coverage(radius, d);
                if coverage > 0.0 {
                    let i = px as usize * 4;
                    apply(&mut row_px[i..i + 4], line.stroke, coverage, line.composite);
                }
            }
        });
}

// ============================================================================
// RECTANGLES, CIRCLES, IMAGES
// ============================================================================

fn draw_rect(target: &mut RgbaImage, rect: &RectShape) {
    let (left, right) = (rect.x.min(rect.x + rect.width), rect.x.max(rect.x + rect.width));
    let (top, bottom) = (rect.y.min(rect.y + rect.height), rect.y.max(rect.y + rect.height));
    let (w, h) = target.dimensions();

    if let Some(fill) = rect.fill {
        let (x0, x1) = pixel_span(left, right, w);
        let (y0, y1) = pixel_span(top, bottom, h);
        for py in y0..y1 {
            let cy = py as f32 + 0.5;
            if cy < top || cy >= bottom {
                continue;
            }
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                if cx >= left && cx < right {
                    blend_over(&mut target.get_pixel_mut(px, py).0, fill, 1.0);
                }
            }
        }
    }

    if let Some((color, stroke_width)) = rect.stroke {
        let half = stroke_width / 2.0;
        let (x0, x1) = pixel_span(left - half, right + half, w);
        let (y0, y1) = pixel_span(top - half, bottom + half, h);
        for py in y0..y1 {
            let cy = py as f32 + 0.5;
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                let in_outer = cx >= left - half && cx < right + half && cy >= top - half && cy < bottom + half;
                let in_inner = cx > left + half && cx < right - half && cy > top + half && cy < bottom - half;
                if in_outer && !in_inner {
                    blend_over(&mut target.get_pixel_mut(px, py).0, color, 1.0);
                }
            }
        }
    }
}

fn draw_circle(target: &mut RgbaImage, circle: &CircleShape) {
    let reach = circle.radius + circle.stroke.map(|(_, sw)| sw).unwrap_or(0.0) + 1.0;
    let (w, h) = target.dimensions();
    let (x0, x1) = pixel_span(circle.x - reach, circle.x + reach, w);
    let (y0, y1) = pixel_span(circle.y - reach, circle.y + reach, h);

    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - circle.x;
            let dy = py as f32 + 0.5 - circle.y;
            let d = (dx * dx + dy * dy).sqrt();
            let pixel = &mut target.get_pixel_mut(px, py).0;
            if let Some(fill) = circle.fill {
                let coverage = edge_coverage(circle.radius, d);
                if coverage > 0.0 {
                    blend_over(&mut pixel[..], fill, coverage);
                }
            }
            if let Some((color, stroke_width)) = circle.stroke {
                let coverage = edge_coverage(stroke_width / 2.0, (d - circle.radius).abs());
                if coverage > 0.0 {
                    blend_over(&mut pixel[..], color, coverage);
                }
            }
        }
    }
}

/// Place an image scaled into its bounds. Only the part that lands on the
/// target is sampled, so the bounds may be arbitrarily large.
fn draw_image(target: &mut RgbaImage, shape: &ImageShape, images: &dyn ImageResolver) {
    let tw = shape.width.round() as f64;
    let th = shape.height.round() as f64;
    if !(tw >= 1.0 && th >= 1.0) {
        return;
    }
    let ox = shape.x.round() as f64;
    let oy = shape.y.round() as f64;
    let (w, h) = target.dimensions();
    let x0 = ox.max(0.0);
    let y0 = oy.max(0.0);
    let x1 = (ox + tw).min(w as f64);
    let y1 = (oy + th).min(h as f64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let (x0, x1, y0, y1) = (x0 as u32, x1 as u32, y0 as u32, y1 as u32);

    let Some(source) = images.resolve(&shape.image_name) else {
        log::warn!("image '{}' for object {} not found, skipped", shape.image_name, shape.id);
        return;
    };
    let (sw, sh) = source.dimensions();
    if sw == 0 || sh == 0 {
        return;
    }
    let sx = sw as f64 / tw;
    let sy = sh as f64 / th;

    let stride = w as usize * 4;
    let raw: &mut [u8] = &mut **target;
    raw[y0 as usize * stride..y1 as usize * stride]
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(row, row_px)| {
            let v = ((y0 + row as u32) as f64 - oy + 0.5) * sy - 0.5;
            for px in x0..x1 {
                let u = (px as f64 - ox + 0.5) * sx - 0.5;
                let i = px as usize * 4;
                blend_over(&mut row_px[i..i + 4], sample_bilinear(&source, u, v), 1.0);
            }
        });
}

/// Bilinear sample at source coordinates `(u, v)`, clamped to the edges.
fn sample_bilinear(img: &RgbaImage, u: f64, v: f64) -> [u8; 4] {
    let (w, h) = img.dimensions();
    let u = u.clamp(0.0, (w - 1) as f64);
    let v = v.clamp(0.0, (h - 1) as f64);
    let (ux, vy) = (u.floor() as u32, v.floor() as u32);
    let (ux1, vy1) = ((ux + 1).min(w - 1), (vy + 1).min(h - 1));
    let (fx, fy) = (u - ux as f64, v - vy as f64);

    let p00 = img.get_pixel(ux, vy).0;
    let p10 = img.get_pixel(ux1, vy).0;
    let p01 = img.get_pixel(ux, vy1).0;
    let p11 = img.get_pixel(ux1, vy1).0;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}
