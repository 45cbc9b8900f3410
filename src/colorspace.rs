//! The color-space conversion graph (§4.3): `{sRGB, LinearSRGB, DisplayP3,
//! LinearDisplayP3, Oklab}` with edges for the transfer-function pairs and
//! the two linear-to-linear matrix conversions, plus Oklab's matrix pair.
//! `shortest_path` threads the unique minimal conversion sequence between any
//! two nodes; `convert_color` applies one edge numerically.

use nalgebra::{Matrix3, Vector3};

use crate::color::Color4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    LinearSrgb,
    DisplayP3,
    LinearDisplayP3,
    Oklab,
}

impl ColorSpace {
    fn index(self) -> usize {
        match self {
            ColorSpace::Srgb => 0,
            ColorSpace::LinearSrgb => 1,
            ColorSpace::DisplayP3 => 2,
            ColorSpace::LinearDisplayP3 => 3,
            ColorSpace::Oklab => 4,
        }
    }

    fn from_index(i: usize) -> ColorSpace {
        match i {
            0 => ColorSpace::Srgb,
            1 => ColorSpace::LinearSrgb,
            2 => ColorSpace::DisplayP3,
            3 => ColorSpace::LinearDisplayP3,
            4 => ColorSpace::Oklab,
            _ => unreachable!(),
        }
    }
}

/// One directed edge of the color-space graph: converting `from -> to`
/// numerically transforms a straight (non-premultiplied) `Color4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSpaceEdge {
    pub from: ColorSpace,
    pub to: ColorSpace,
}

const ADJACENCY: [(ColorSpace, ColorSpace); 8] = [
    (ColorSpace::Srgb, ColorSpace::LinearSrgb),
    (ColorSpace::LinearSrgb, ColorSpace::Srgb),
    (ColorSpace::LinearSrgb, ColorSpace::Oklab),
    (ColorSpace::Oklab, ColorSpace::LinearSrgb),
    (ColorSpace::LinearSrgb, ColorSpace::LinearDisplayP3),
    (ColorSpace::LinearDisplayP3, ColorSpace::LinearSrgb),
    (ColorSpace::DisplayP3, ColorSpace::LinearDisplayP3),
    (ColorSpace::LinearDisplayP3, ColorSpace::DisplayP3),
];

/// BFS over the small fixed adjacency list for the unique minimal path
/// `from -> to`. Returns an empty vec if `from == to`.
pub fn shortest_path(from: ColorSpace, to: ColorSpace) -> Vec<ColorSpaceEdge> {
    if from == to {
        return Vec::new();
    }
    let mut prev: [Option<ColorSpace>; 5] = [None; 5];
    let mut visited = [false; 5];
    visited[from.index()] = true;
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(from);
    'bfs: while let Some(cur) = queue.pop_front() {
        for &(a, b) in &ADJACENCY {
            if a == cur && !visited[b.index()] {
                visited[b.index()] = true;
                prev[b.index()] = Some(a);
                if b == to {
                    break 'bfs;
                }
                queue.push_back(b);
            }
        }
    }
    let mut path = Vec::new();
    let mut cur = to;
    while let Some(p) = prev[cur.index()] {
        path.push(ColorSpaceEdge { from: p, to: cur });
        cur = p;
    }
    path.reverse();
    path
}

// sRGB IEC 61966-2-1 transfer function.
fn srgb_to_linear_channel(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb_channel(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

// Published Display P3 <-> linear sRGB 3x3 (via CIE XYZ, D65).
fn linear_display_p3_to_linear_srgb_matrix() -> Matrix3<f32> {
    Matrix3::new(
        1.2249, -0.2247, 0.0,
        -0.0420, 1.0419, 0.0,
        -0.0197, -0.0786, 1.0979,
    )
}

fn linear_srgb_to_linear_display_p3_matrix() -> Matrix3<f32> {
    linear_display_p3_to_linear_srgb_matrix()
        .try_inverse()
        .expect("Display P3 <-> sRGB matrix is invertible")
}

// Oklab, per Björn Ottosson's published matrices.
fn linear_srgb_to_lms() -> Matrix3<f32> {
    Matrix3::new(
        0.4122214708, 0.5363325363, 0.0514459929,
        0.2119034982, 0.6806995451, 0.1073969566,
        0.0883024619, 0.2817188376, 0.6299787005,
    )
}

fn lms_prime_to_oklab() -> Matrix3<f32> {
    Matrix3::new(
        0.2104542553, 0.7936177850, -0.0040720468,
        1.9779984951, -2.4285922050, 0.4505937099,
        0.0259040371, 0.7827717662, -0.8086757660,
    )
}

fn oklab_to_lms_prime() -> Matrix3<f32> {
    lms_prime_to_oklab()
        .try_inverse()
        .expect("Oklab matrix is invertible")
}

fn lms_to_linear_srgb() -> Matrix3<f32> {
    linear_srgb_to_lms()
        .try_inverse()
        .expect("LMS matrix is invertible")
}

fn linear_srgb_to_oklab(c: Color4) -> Color4 {
    let rgb = Vector3::new(c.r(), c.g(), c.b());
    let lms = linear_srgb_to_lms() * rgb;
    let lms_prime = lms.map(|v| v.max(0.0).cbrt());
    let lab = lms_prime_to_oklab() * lms_prime;
    Color4::new(lab.x, lab.y, lab.z, c.a())
}

fn oklab_to_linear_srgb(c: Color4) -> Color4 {
    let lab = Vector3::new(c.r(), c.g(), c.b());
    let lms_prime = oklab_to_lms_prime() * lab;
    let lms = lms_prime.map(|v| v * v * v);
    let rgb = lms_to_linear_srgb() * lms;
    Color4::new(rgb.x, rgb.y, rgb.z, c.a())
}

/// Apply one color-space edge numerically to a straight (non-premultiplied)
/// color.
pub fn convert_color(edge: ColorSpaceEdge, c: Color4) -> Color4 {
    use ColorSpace::*;
    match (edge.from, edge.to) {
        (Srgb, LinearSrgb) => Color4::new(
            srgb_to_linear_channel(c.r()),
            srgb_to_linear_channel(c.g()),
            srgb_to_linear_channel(c.b()),
            c.a(),
        ),
        (LinearSrgb, Srgb) => Color4::new(
            linear_to_srgb_channel(c.r()),
            linear_to_srgb_channel(c.g()),
            linear_to_srgb_channel(c.b()),
            c.a(),
        ),
        (LinearSrgb, Oklab) => linear_srgb_to_oklab(c),
        (Oklab, LinearSrgb) => oklab_to_linear_srgb(c),
        (LinearSrgb, LinearDisplayP3) => {
            let v = linear_srgb_to_linear_display_p3_matrix() * Vector3::new(c.r(), c.g(), c.b());
            Color4::new(v.x, v.y, v.z, c.a())
        }
        (LinearDisplayP3, LinearSrgb) => {
            let v = linear_display_p3_to_linear_srgb_matrix() * Vector3::new(c.r(), c.g(), c.b());
            Color4::new(v.x, v.y, v.z, c.a())
        }
        (DisplayP3, LinearDisplayP3) => Color4::new(
            srgb_to_linear_channel(c.r()),
            srgb_to_linear_channel(c.g()),
            srgb_to_linear_channel(c.b()),
            c.a(),
        ),
        (LinearDisplayP3, DisplayP3) => Color4::new(
            linear_to_srgb_channel(c.r()),
            linear_to_srgb_channel(c.g()),
            linear_to_srgb_channel(c.b()),
            c.a(),
        ),
        _ => panic!("{edge:?} is not a direct edge of the color-space graph"),
    }
}

pub fn convert(from: ColorSpace, to: ColorSpace, c: Color4) -> Color4 {
    let mut cur = c;
    for edge in shortest_path(from, to) {
        cur = convert_color(edge, cur);
    }
    cur
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_roundtrip_recovers_input() {
        let c = Color4::new(0.2, 0.5, 0.8, 1.0);
        let linear = convert(ColorSpace::Srgb, ColorSpace::LinearSrgb, c);
        let back = convert(ColorSpace::LinearSrgb, ColorSpace::Srgb, linear);
        assert!((back.r() - c.r()).abs() < 1e-5);
        assert!((back.g() - c.g()).abs() < 1e-5);
        assert!((back.b() - c.b()).abs() < 1e-5);
    }

    #[test]
    fn oklab_roundtrip_recovers_input() {
        let c = Color4::new(0.3, 0.6, 0.1, 1.0);
        let lab = convert(ColorSpace::LinearSrgb, ColorSpace::Oklab, c);
        let back = convert(ColorSpace::Oklab, ColorSpace::LinearSrgb, lab);
        assert!((back.r() - c.r()).abs() < 1e-4);
        assert!((back.g() - c.g()).abs() < 1e-4);
        assert!((back.b() - c.b()).abs() < 1e-4);
    }

    #[test]
    fn display_p3_roundtrip_recovers_input() {
        let c = Color4::new(0.4, 0.2, 0.9, 1.0);
        let p3 = convert(ColorSpace::Srgb, ColorSpace::DisplayP3, c);
        let back = convert(ColorSpace::DisplayP3, ColorSpace::Srgb, p3);
        assert!((back.r() - c.r()).abs() < 1e-4);
        assert!((back.g() - c.g()).abs() < 1e-4);
        assert!((back.b() - c.b()).abs() < 1e-4);
    }

    #[test]
    fn shortest_path_between_same_space_is_empty() {
        assert!(shortest_path(ColorSpace::Srgb, ColorSpace::Srgb).is_empty());
    }
}
