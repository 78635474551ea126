//! Keyboard and mouse state between frames.

use std::collections::HashSet;

use winit::event::{ElementState, WindowEvent};
use winit::keyboard::PhysicalKey;

pub use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Input accumulated from window events.
///
/// "Just pressed" keys and the cursor delta cover the events since the last
/// [`InputState::begin_frame`].
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    pressed_buttons: HashSet<MouseButton>,
    cursor_position: Option<(f32, f32)>,
    cursor_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame state.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.cursor_delta = (0.0, 0.0);
    }

    /// Updates the state from a keyboard, mouse button or cursor event.
    ///
    /// Returns whether the event was an input event.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.on_key_pressed(key);
                    } else {
                        self.on_key_released(key);
                    }
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = MouseButton::from(*button);
                match state {
                    ElementState::Pressed => self.pressed_buttons.insert(button),
                    ElementState::Released => self.pressed_buttons.remove(&button),
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.on_cursor_moved(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor_position = None;
                true
            }
            _ => false,
        }
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        // Repeats arrive as further presses and do not count as new.
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    /// Moves the cursor. The first position after entering the window
    /// produces no delta.
    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.cursor_position {
            self.cursor_delta.0 += x - old_x;
            self.cursor_delta.1 += y - old_y;
        }
        self.cursor_position = Some((x, y));
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn just_pressed_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.just_pressed_keys.iter().copied()
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn cursor_position(&self) -> Option<(f32, f32)> {
        self.cursor_position
    }

    /// Cursor motion since the last [`InputState::begin_frame`].
    pub fn cursor_delta(&self) -> (f32, f32) {
        self.cursor_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_repeat_is_not_just_pressed_again() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));

        input.on_key_released(KeyCode::KeyW);
        assert!(!input.is_key_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_cursor_delta_accumulates_until_next_frame() {
        let mut input = InputState::new();
        input.on_cursor_moved(10.0, 10.0);
        assert_eq!(input.cursor_delta(), (0.0, 0.0));

        input.on_cursor_moved(13.0, 8.0);
        input.on_cursor_moved(15.0, 9.0);
        assert_eq!(input.cursor_delta(), (5.0, -1.0));
        assert_eq!(input.cursor_position(), Some((15.0, 9.0)));

        input.begin_frame();
        assert_eq!(input.cursor_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_unknown_buttons_map_to_other() {
        assert_eq!(
            MouseButton::from(winit::event::MouseButton::Back),
            MouseButton::Other
        );
    }
}
