use glam::{EulerRot, Mat3, Quat, Vec2, Vec3};
use serde::Deserialize;

use crate::input::InputSample;

/// Axis pointing into the screen when heading = pitch = 0
pub const CANONICAL_FORWARD: Vec3 = Vec3::NEG_Z;
pub const CANONICAL_UP: Vec3 = Vec3::Y;
pub const WORLD_UP: Vec3 = Vec3::Y;

pub const DEFAULT_SPEED: f32 = 0.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.005;
pub const DEFAULT_PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// World units moved per frame while a movement key is held
    pub speed: f32,
    /// Radians per pixel of cursor travel
    pub sensitivity: f32,
    /// Symmetric pitch clamp in radians; `None` allows the view to flip over
    pub pitch_limit: Option<f32>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
            pitch_limit: Some(DEFAULT_PITCH_LIMIT),
        }
    }
}

/// Free-flying look-around camera.
///
/// Orientation lives only in `heading` and `pitch`; every direction and the
/// basis matrix are rebuilt from them on each query.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    heading: f32,
    pitch: f32,
    settings: CameraSettings,
    last_cursor: Option<Vec2>,
}

impl Camera {
    pub fn new(position: Vec3, settings: CameraSettings) -> Self {
        Self {
            position,
            heading: 0.0,
            pitch: 0.0,
            settings,
            last_cursor: None,
        }
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    /// Set both angles directly, subject to the pitch limit
    pub fn set_orientation(&mut self, heading: f32, pitch: f32) {
        self.heading = heading;
        self.pitch = self.limit_pitch(pitch);
    }

    /// Forget the previous cursor reading; the next sample seeds a new reference
    pub fn reseed_cursor(&mut self) {
        self.last_cursor = None;
    }

    /// Move along the current view and turn by the cursor travel since the last sample
    pub fn apply_input(&mut self, input: &InputSample) {
        let forward = self.forward();
        let (fwd, strafe_left) = input.movement.axes();
        let speed = self.settings.speed;

        self.position += forward * fwd * speed;
        self.position += WORLD_UP.cross(forward).normalize_or_zero() * strafe_left * speed;

        let Some(cursor) = input.cursor else {
            self.last_cursor = None;
            return;
        };
        let previous = *self.last_cursor.get_or_insert(cursor);
        let offset = cursor - previous;
        self.last_cursor = Some(cursor);

        self.heading -= offset.x * self.settings.sensitivity;
        self.pitch = self.limit_pitch(self.pitch - offset.y * self.settings.sensitivity);
    }

    /// Heading about Y applied after pitch about X, no roll
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.heading, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * CANONICAL_FORWARD
    }

    pub fn up(&self) -> Vec3 {
        self.rotation() * CANONICAL_UP
    }

    /// Camera-to-world rotation uploaded as `cameraOrientation`
    pub fn orientation(&self) -> Mat3 {
        Mat3::from_quat(self.rotation())
    }

    /// A negative limit acts as its magnitude; NaN means no limit
    fn limit_pitch(&self, pitch: f32) -> f32 {
        match self.settings.pitch_limit {
            Some(limit) if !limit.is_nan() => pitch.clamp(-limit.abs(), limit.abs()),
            _ => pitch,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, CameraSettings::default())
    }
}
