use compute_raytracer::camera::{Camera, CameraSettings, CANONICAL_FORWARD, CANONICAL_UP};
use compute_raytracer::input::{InputSample, MovementState};
use glam::{Vec2, Vec3};

const EPS: f32 = 1e-5;

fn angles() -> Vec<(f32, f32)> {
    let mut out = Vec::new();
    for h in -8..=8 {
        for p in -6..=6 {
            out.push((h as f32 * 0.45, p as f32 * 0.5));
        }
    }
    out
}

fn free_camera() -> Camera {
    Camera::new(
        Vec3::ZERO,
        CameraSettings {
            pitch_limit: None,
            ..Default::default()
        },
    )
}

// ============================================================================
// Basis Properties
// ============================================================================

#[test]
fn test_identity_orientation_is_canonical() {
    let camera = Camera::default();
    assert_eq!(camera.forward(), CANONICAL_FORWARD);
    assert_eq!(camera.up(), CANONICAL_UP);
}

#[test]
fn test_directions_unit_and_orthogonal() {
    let mut camera = free_camera();
    for (heading, pitch) in angles() {
        camera.set_orientation(heading, pitch);
        let forward = camera.forward();
        let up = camera.up();
        assert!((forward.length() - 1.0).abs() < EPS, "forward at {heading},{pitch}");
        assert!((up.length() - 1.0).abs() < EPS, "up at {heading},{pitch}");
        assert!(forward.dot(up).abs() < EPS, "orthogonal at {heading},{pitch}");
    }
}

#[test]
fn test_orientation_is_rotation() {
    let mut camera = free_camera();
    for (heading, pitch) in angles() {
        camera.set_orientation(heading, pitch);
        let basis = camera.orientation();
        assert!((basis.determinant() - 1.0).abs() < EPS);
        assert!((basis * CANONICAL_FORWARD - camera.forward()).length() < EPS);
    }
}

#[test]
fn test_heading_turns_about_world_up() {
    let mut camera = Camera::default();
    camera.set_orientation(std::f32::consts::FRAC_PI_2, 0.0);
    // Quarter turn to the left looks down -X
    assert!((camera.forward() - Vec3::NEG_X).length() < EPS);
    assert!((camera.up() - Vec3::Y).length() < EPS);
}

// ============================================================================
// Input Handling
// ============================================================================

#[test]
fn test_first_sample_never_turns() {
    for (x, y) in [(0.0, 0.0), (512.0, 384.0), (-4000.0, 9000.0)] {
        let mut camera = Camera::default();
        camera.apply_input(&InputSample::at_cursor(x, y));
        assert_eq!(camera.heading(), 0.0);
        assert_eq!(camera.pitch(), 0.0);
    }
}

#[test]
fn test_still_cursor_keeps_angles() {
    let mut camera = Camera::default();
    camera.set_orientation(0.4, -0.2);
    let movement = MovementState {
        forward: true,
        left: true,
        ..Default::default()
    };
    for _ in 0..50 {
        camera.apply_input(&InputSample::new(movement, Some(Vec2::new(300.0, 200.0))));
    }
    assert_eq!(camera.heading(), 0.4);
    assert_eq!(camera.pitch(), -0.2);
}

#[test]
fn test_moves_along_view_direction() {
    let mut camera = Camera::default();
    camera.set_orientation(0.9, 0.3);
    let forward = camera.forward();
    camera.apply_input(&InputSample::new(
        MovementState {
            forward: true,
            ..Default::default()
        },
        None,
    ));
    assert!((camera.position - forward * camera.settings().speed).length() < EPS);
}

#[test]
fn test_strafe_is_horizontal_and_perpendicular() {
    let mut camera = Camera::default();
    camera.set_orientation(-1.1, 0.8);
    let forward = camera.forward();
    camera.apply_input(&InputSample::new(
        MovementState {
            right: true,
            ..Default::default()
        },
        None,
    ));
    let step = camera.position;
    assert!(step.y.abs() < EPS);
    assert!(step.dot(forward).abs() < EPS);
    assert!((step.length() - camera.settings().speed).abs() < EPS);
}

#[test]
fn test_sensitivity_scales_turn() {
    let settings = CameraSettings {
        sensitivity: 0.01,
        ..Default::default()
    };
    let mut camera = Camera::new(Vec3::ZERO, settings);
    camera.apply_input(&InputSample::at_cursor(0.0, 0.0));
    camera.apply_input(&InputSample::at_cursor(-20.0, 10.0));
    assert!((camera.heading() - 0.2).abs() < EPS);
    assert!((camera.pitch() + 0.1).abs() < EPS);
}
