//! Per-tick input state fed from winit window events.

use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard and mouse state.
///
/// "Pressed" and "released" are edge queries relative to the previous tick;
/// "held" is level state. Call [`Input::finish_tick`] once per tick after
/// the scene has updated.
#[derive(Debug, Default)]
pub struct Input {
    keys: HashSet<KeyCode>,
    previous_keys: HashSet<KeyCode>,
    buttons: HashSet<MouseButton>,
    previous_buttons: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    mouse_delta: Vec2,
    wheel_delta: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a window event. Returns `true` if the event was input related.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => self.press_key(code),
                        ElementState::Released => self.release_key(code),
                    }
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                match state {
                    ElementState::Pressed => self.press_button(*button),
                    ElementState::Released => self.release_button(*button),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll(scroll);
                true
            }
            WindowEvent::Focused(false) => {
                self.keys.clear();
                self.buttons.clear();
                true
            }
            _ => false,
        }
    }

    pub fn press_key(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn press_button(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn release_button(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    /// Move the cursor; the movement accumulates into the mouse delta
    pub fn move_cursor(&mut self, position: Vec2) {
        if let Some(last) = self.cursor {
            self.mouse_delta += position - last;
        }
        self.cursor = Some(position);
    }

    pub fn scroll(&mut self, amount: f32) {
        self.wheel_delta += amount;
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key) && !self.previous_keys.contains(&key)
    }

    pub fn is_key_released(&self, key: KeyCode) -> bool {
        !self.keys.contains(&key) && self.previous_keys.contains(&key)
    }

    pub fn is_button_held(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button) && !self.previous_buttons.contains(&button)
    }

    pub fn is_button_released(&self, button: MouseButton) -> bool {
        !self.buttons.contains(&button) && self.previous_buttons.contains(&button)
    }

    pub fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Cursor movement since the last tick, in pixels
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Wheel movement since the last tick, in lines (positive = away from the user)
    pub fn wheel_delta(&self) -> f32 {
        self.wheel_delta
    }

    /// Roll current state into previous and clear per-tick deltas
    pub fn finish_tick(&mut self) {
        self.previous_keys.clone_from(&self.keys);
        self.previous_buttons.clone_from(&self.buttons);
        self.mouse_delta = Vec2::ZERO;
        self.wheel_delta = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_edges_last_one_tick() {
        let mut input = Input::new();
        input.press_key(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_held(KeyCode::KeyW));

        input.finish_tick();
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_held(KeyCode::KeyW));

        input.release_key(KeyCode::KeyW);
        assert!(input.is_key_released(KeyCode::KeyW));
        input.finish_tick();
        assert!(!input.is_key_released(KeyCode::KeyW));
    }

    #[test]
    fn mouse_delta_accumulates_and_resets() {
        let mut input = Input::new();
        input.move_cursor(Vec2::new(10.0, 10.0));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);

        input.move_cursor(Vec2::new(13.0, 8.0));
        input.move_cursor(Vec2::new(15.0, 8.0));
        input.scroll(1.0);
        input.scroll(0.5);
        assert_eq!(input.mouse_delta(), Vec2::new(5.0, -2.0));
        assert_eq!(input.wheel_delta(), 1.5);

        input.finish_tick();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert_eq!(input.wheel_delta(), 0.0);
        assert_eq!(input.cursor_position(), Some(Vec2::new(15.0, 8.0)));
    }

    #[test]
    fn button_edges() {
        let mut input = Input::new();
        input.press_button(MouseButton::Right);
        assert!(input.is_button_pressed(MouseButton::Right));
        input.finish_tick();
        input.release_button(MouseButton::Right);
        assert!(input.is_button_released(MouseButton::Right));
        assert!(!input.is_button_held(MouseButton::Right));
    }
}
