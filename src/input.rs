use glam::Vec2;

/// Directional key states for one frame
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MovementState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementState {
    const fn to_direction(positive: bool, negative: bool) -> f32 {
        match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    /// (forward, strafe-left) axes in {-1, 0, 1}
    pub const fn axes(&self) -> (f32, f32) {
        (
            Self::to_direction(self.forward, self.backward),
            Self::to_direction(self.left, self.right),
        )
    }
}

/// Per-frame input handed to the camera.
///
/// `cursor` is the absolute cursor reading for this frame, not a delta. The
/// camera differences consecutive readings itself so the first reading after
/// (re)initialization can seed the reference point. `None` means the cursor is
/// not over the window.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct InputSample {
    pub movement: MovementState,
    pub cursor: Option<Vec2>,
}

impl InputSample {
    pub fn new(movement: MovementState, cursor: Option<Vec2>) -> Self {
        Self { movement, cursor }
    }

    /// Sample with no keys held at the given cursor reading
    pub fn at_cursor(x: f32, y: f32) -> Self {
        Self {
            movement: MovementState::default(),
            cursor: Some(Vec2::new(x, y)),
        }
    }
}

/// Result of polling the input collaborator at the top of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Input(InputSample),
    Quit,
}

/// Source of per-frame input, polled once per iteration by the frame loop
pub trait InputSource {
    fn sample(&mut self) -> Sample;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axes_idle() {
        assert_eq!(MovementState::default().axes(), (0.0, 0.0));
    }

    #[test]
    fn test_axes_opposing_keys_cancel() {
        let state = MovementState {
            forward: true,
            backward: true,
            left: true,
            right: true,
        };
        assert_eq!(state.axes(), (0.0, 0.0));
    }

    #[test]
    fn test_axes_forward_left() {
        let state = MovementState {
            forward: true,
            left: true,
            ..Default::default()
        };
        assert_eq!(state.axes(), (1.0, 1.0));
    }

    #[test]
    fn test_axes_backward_right() {
        let state = MovementState {
            backward: true,
            right: true,
            ..Default::default()
        };
        assert_eq!(state.axes(), (-1.0, -1.0));
    }
}
