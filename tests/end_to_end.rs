//! Crate-level scenarios exercising full pipelines: CAG set operations,
//! gradient rasterization, filtered accumulation, the instruction VM's
//! binary round-trip, and depth-sorted fragment splitting.

use vecraster::color::Color4;
use vecraster::colorspace::ColorSpace;
use vecraster::face::ClippableFace;
use vecraster::geometry::{Bounds2, Pt2, Pt3};
use vecraster::program::depthsort;
use vecraster::program::instr;
use vecraster::program::{evaluate, EvalContext, GradientAccuracy, RenderPlanar, RenderProgram};
use vecraster::raster::FilterKernel;
use vecraster::{rasterize, FillRule, PolygonalBoolean, RasterizationOptions, RenderPath, Subpath};

fn rect(min: Pt2, max: Pt2) -> RenderPath {
    RenderPath::new(
        FillRule::NonZero,
        vec![Subpath::new(vec![
            Pt2::new(min.x, min.y),
            Pt2::new(max.x, min.y),
            Pt2::new(max.x, max.y),
            Pt2::new(min.x, max.y),
        ])],
    )
}

/// Two unit-ish squares overlapping in a 0.5x0.5 lens: union/intersection/
/// difference areas match the closed-form overlap arithmetic directly.
#[test]
fn overlapping_squares_boolean_areas() {
    let a = rect(Pt2::new(0.0, 0.0), Pt2::new(1.0, 1.0));
    let b = rect(Pt2::new(0.5, 0.5), Pt2::new(1.5, 1.5));

    let union = PolygonalBoolean::union(&a, &b).unwrap();
    let intersection = PolygonalBoolean::intersection(&a, &b).unwrap();
    let difference = PolygonalBoolean::difference(&a, &b).unwrap();

    assert!((union.get_area() - 1.75).abs() < 1e-6);
    assert!((intersection.get_area() - 0.25).abs() < 1e-6);
    assert!((difference.get_area() - 0.75).abs() < 1e-6);
}

/// The same pair of overlapping squares, viewed as a planar graph: 10
/// vertices (4 + 4 original corners, 2 crossings), 12 edges (each square's
/// boundary gains 2 extra vertices splitting one edge each into two), so
/// Euler's formula predicts 4 faces including the unbounded one, i.e. 3
/// bounded faces. CAG's own face count must agree.
#[test]
fn overlap_face_count_matches_euler_formula() {
    let a = rect(Pt2::new(0.0, 0.0), Pt2::new(1.0, 1.0));
    let b = rect(Pt2::new(0.5, 0.5), Pt2::new(1.5, 1.5));
    let paths = [a, b];

    let sentinel_a = RenderProgram::color(Color4::new(1.0, 0.0, 0.0, 1.0));
    let sentinel_b = RenderProgram::color(Color4::new(0.0, 1.0, 0.0, 1.0));
    let both = RenderProgram::color(Color4::new(0.0, 0.0, 1.0, 1.0));
    let neither = RenderProgram::color(Color4::TRANSPARENT);
    let program = RenderProgram::path_boolean(
        0,
        FillRule::NonZero,
        RenderProgram::path_boolean(1, FillRule::NonZero, both, sentinel_a),
        RenderProgram::path_boolean(1, FillRule::NonZero, sentinel_b, neither),
    );

    let v = 10;
    let e = 12;
    let predicted_faces_including_outer = 2 - v + e;
    let predicted_bounded_faces = predicted_faces_including_outer - 1;

    let faces = vecraster::cag::run(&paths, &program, vecraster::cag::FaceStrategy::Simple).unwrap();
    assert_eq!(faces.len(), predicted_bounded_faces as usize);
}

/// A linear gradient from red to blue, sampled at the exact midpoint of its
/// axis: the resulting color is the plain component-wise average of the two
/// endpoints.
#[test]
fn linear_gradient_midpoint_is_color_average() {
    let path = rect(Pt2::new(0.0, 0.0), Pt2::new(10.0, 10.0));
    let red = Color4::new(1.0, 0.0, 0.0, 1.0);
    let blue = Color4::new(0.0, 0.0, 1.0, 1.0);
    let program = RenderProgram::linear_gradient(
        vec![(0.0, red), (1.0, blue)],
        Pt2::new(0.5, 0.0),
        Pt2::new(10.5, 0.0),
        GradientAccuracy::Accurate,
    );

    let options = RasterizationOptions::default()
        .with_filter(FilterKernel::Box)
        .with_color_space(ColorSpace::LinearSrgb);
    let bounds = Bounds2::new(0.0, 0.0, 10.0, 10.0);
    let raster = rasterize(&program, &[path], bounds, &options).unwrap();

    // Pixel (5, 5) is centered at (5.5, 5.5), the exact midpoint of the
    // (0.5, 0)-(10.5, 0) gradient axis.
    let pixel = raster.pixel(5, 5);
    assert_eq!(pixel, [128, 0, 128, 255]);
}

/// A 50%-alpha red fragment stacked over an opaque green background,
/// rasterized into a single pixel with the Mitchell-Netravali filter: with
/// the source face covering the filter's entire support, the analytic
/// filter weight is 1 and the result is exactly the flattened Porter-Duff
/// composite.
#[test]
fn mitchell_filtered_single_pixel_matches_flattened_composite() {
    let huge_square = rect(Pt2::new(-10.0, -10.0), Pt2::new(10.0, 10.0));
    let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
    let green = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 1.0, 0.0, 1.0)));
    let program = RenderProgram::stack(vec![RenderProgram::alpha(red, 0.5), green]);

    let options = RasterizationOptions::default()
        .with_filter(FilterKernel::MitchellNetravali)
        .with_color_space(ColorSpace::LinearSrgb);
    let bounds = Bounds2::new(0.0, 0.0, 1.0, 1.0);
    let raster = rasterize(&program, &[huge_square], bounds, &options).unwrap();

    let pixel = raster.pixel(0, 0);
    // red@0.5 over opaque green, premultiplied: (0.5, 0.5, 0, 1.0).
    assert!((pixel[0] as i32 - 128).abs() <= 1);
    assert!((pixel[1] as i32 - 128).abs() <= 1);
    assert_eq!(pixel[2], 0);
    assert_eq!(pixel[3], 255);
}

/// Compiling `Stack(red, Alpha(blue, 0.5))` to instructions, round-tripping
/// through the binary encoding, and running the decoded program must agree
/// with evaluating the tree directly.
#[test]
fn compiled_instruction_roundtrip_matches_tree_evaluation() {
    let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
    let blue = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0)));
    let program = RenderProgram::stack(vec![red, RenderProgram::alpha(blue, 0.5)]);

    let ctx = EvalContext::new(Bounds2::EMPTY);
    let direct = evaluate(&program, &ctx);

    let compiled = instr::compile(&program);
    let words = instr::encode(&compiled.instrs);
    let decoded_instrs = instr::decode(&words).unwrap();
    let decoded = instr::CompiledProgram {
        instrs: decoded_instrs,
        image_table: compiled.image_table.clone(),
    };
    let from_binary = instr::run(&decoded, &ctx);

    assert!((direct.r() - from_binary.r()).abs() < 1e-6);
    assert!((direct.g() - from_binary.g()).abs() < 1e-6);
    assert!((direct.b() - from_binary.b()).abs() < 1e-6);
    assert!((direct.a() - from_binary.a()).abs() < 1e-6);
}

/// The same round-trip, but for a `LinearGradient` node: before the
/// instruction set grew a dedicated opcode for every `ProgramKind` variant,
/// gradients fell through to an escape-hatch opcode whose binary encoder had
/// no way to serialize the gradient it referenced, so this case alone is
/// what the prior test above could never have caught.
#[test]
fn compiled_gradient_roundtrips_through_binary_encoding() {
    let red = Color4::new(1.0, 0.0, 0.0, 1.0);
    let blue = Color4::new(0.0, 0.0, 1.0, 1.0);
    let program = RenderProgram::linear_gradient(
        vec![(0.0, red), (1.0, blue)],
        Pt2::new(0.0, 0.0),
        Pt2::new(10.0, 0.0),
        GradientAccuracy::Accurate,
    );

    let mut ctx = EvalContext::new(Bounds2::new(0.0, 0.0, 10.0, 10.0));
    ctx.centroid = Some(Pt2::new(5.0, 0.0));
    let direct = evaluate(&program, &ctx);

    let compiled = instr::compile(&program);
    let words = instr::encode(&compiled.instrs);
    let decoded_instrs = instr::decode(&words).unwrap();
    assert_eq!(decoded_instrs, compiled.instrs);
    let decoded = instr::CompiledProgram {
        instrs: decoded_instrs,
        image_table: compiled.image_table.clone(),
    };
    let from_binary = instr::run(&decoded, &ctx);

    assert!((direct.r() - from_binary.r()).abs() < 1e-6);
    assert!((direct.g() - from_binary.g()).abs() < 1e-6);
    assert!((direct.b() - from_binary.b()).abs() < 1e-6);
}

/// Two triangles covering a square with 3-D depths that cross along x = 0:
/// splitting by `DepthSort` produces two half-square cells whose areas match
/// the analytical half-split, with the correct triangle in front on each
/// side.
#[test]
fn depth_sort_split_matches_analytical_crossing() {
    let square = ClippableFace::Polygonal(vec![vec![
        Pt2::new(-1.0, -1.0),
        Pt2::new(1.0, -1.0),
        Pt2::new(1.0, 1.0),
        Pt2::new(-1.0, 1.0),
    ]]);

    let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
    let blue = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0)));

    // z = -x on the left-leaning triangle, z = x on the right-leaning one;
    // they cross along x = 0.
    let left = RenderPlanar {
        program: red.clone(),
        triangle: [
            Pt3::new(-1.0, -1.0, 1.0),
            Pt3::new(1.0, -1.0, -1.0),
            Pt3::new(0.0, 1.0, 0.0),
        ],
    };
    let right = RenderPlanar {
        program: blue.clone(),
        triangle: [
            Pt3::new(-1.0, -1.0, -1.0),
            Pt3::new(1.0, -1.0, 1.0),
            Pt3::new(0.0, 1.0, 0.0),
        ],
    };

    let cells = depthsort::split(&square, &[left, right]);
    assert_eq!(cells.len(), 2);

    let total_area: f64 = cells.iter().map(|(f, _)| f.get_area()).sum();
    assert!((total_area - square.get_area()).abs() < 1e-6);

    for (face, program) in &cells {
        let area = face.get_area();
        assert!((area - 2.0).abs() < 1e-6);
        let (cx, _) = face.get_centroid(area);
        let mut ctx = EvalContext::new(face.get_bounds());
        ctx.face = Some(face);
        ctx.area = Some(area);
        let color = evaluate(program, &ctx);
        if cx < 0.0 {
            // depth_left = -x > 0 = depth_right for x < 0: red is in front.
            assert_eq!(color, Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        } else {
            assert_eq!(color, Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0)));
        }
    }
}
