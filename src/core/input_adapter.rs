use glam::Vec2;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::input::{InputSample, InputSource, MovementState, Sample};

/// Adapter that accumulates winit window events into per-frame input samples
#[derive(Debug, Clone, Default)]
pub struct WinitInput {
    movement: MovementState,
    cursor: Option<Vec2>,
    quit: bool,
}

impl WinitInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a winit WindowEvent and update internal state
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.request_quit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(keycode),
                        state,
                        ..
                    },
                ..
            } => self.set_key(*keycode, *state == ElementState::Pressed),
            WindowEvent::CursorMoved { position, .. } => {
                self.set_cursor(Some(Vec2::new(position.x as f32, position.y as f32)))
            }
            WindowEvent::CursorLeft { .. } | WindowEvent::Focused(false) => {
                self.set_cursor(None);
                self.movement = MovementState::default();
            }
            _ => {}
        }
    }

    /// Apply a key transition; Escape requests quit, unmapped keys are ignored
    pub fn set_key(&mut self, keycode: KeyCode, pressed: bool) {
        let slot = match keycode {
            KeyCode::Escape => {
                if pressed {
                    self.request_quit();
                }
                return;
            }
            KeyCode::KeyW | KeyCode::ArrowUp => &mut self.movement.forward,
            KeyCode::KeyS | KeyCode::ArrowDown => &mut self.movement.backward,
            KeyCode::KeyA | KeyCode::ArrowLeft => &mut self.movement.left,
            KeyCode::KeyD | KeyCode::ArrowRight => &mut self.movement.right,
            _ => return,
        };
        *slot = pressed;
    }

    pub fn set_cursor(&mut self, cursor: Option<Vec2>) {
        self.cursor = cursor;
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn movement(&self) -> MovementState {
        self.movement
    }
}

impl InputSource for WinitInput {
    fn sample(&mut self) -> Sample {
        if self.quit {
            return Sample::Quit;
        }
        Sample::Input(InputSample::new(self.movement, self.cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // KeyEvent carries platform-specific private fields, so key handling is
    // exercised through set_key rather than synthesized winit events.

    #[test]
    fn test_new_input_is_idle() {
        let mut input = WinitInput::new();
        assert_eq!(input.sample(), Sample::Input(InputSample::default()));
    }

    #[test]
    fn test_wasd_and_arrows_map_to_movement() {
        let mut input = WinitInput::new();
        input.set_key(KeyCode::KeyW, true);
        input.set_key(KeyCode::ArrowLeft, true);
        assert_eq!(
            input.movement(),
            MovementState {
                forward: true,
                left: true,
                ..Default::default()
            }
        );

        input.set_key(KeyCode::KeyW, false);
        input.set_key(KeyCode::KeyD, true);
        assert!(!input.movement().forward);
        assert!(input.movement().right);
    }

    #[test]
    fn test_unmapped_key_ignored() {
        let mut input = WinitInput::new();
        input.set_key(KeyCode::KeyQ, true);
        assert_eq!(input.movement(), MovementState::default());
    }

    #[test]
    fn test_escape_requests_quit() {
        let mut input = WinitInput::new();
        input.set_key(KeyCode::Escape, false);
        assert_ne!(input.sample(), Sample::Quit);
        input.set_key(KeyCode::Escape, true);
        assert_eq!(input.sample(), Sample::Quit);
    }

    #[test]
    fn test_close_requested_quits() {
        let mut input = WinitInput::new();
        input.process_event(&WindowEvent::CloseRequested);
        assert_eq!(input.sample(), Sample::Quit);
    }

    #[test]
    fn test_focus_loss_releases_keys_and_cursor() {
        let mut input = WinitInput::new();
        input.set_key(KeyCode::KeyS, true);
        input.set_cursor(Some(Vec2::new(5.0, 5.0)));
        input.process_event(&WindowEvent::Focused(false));
        assert_eq!(input.sample(), Sample::Input(InputSample::default()));
    }
}
