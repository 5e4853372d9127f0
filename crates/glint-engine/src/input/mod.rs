//! Polled input state.
//!
//! The runtime feeds winit events into an [`Input`] table; applications poll
//! it once per frame (`held`, `pressed`, `released`, mouse position/delta)
//! instead of handling events directly. `pressed`/`released` are edges that
//! last exactly one frame; the runtime clears them after each frame callback.

use std::collections::HashSet;

use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keys the engine exposes. Anything else maps to `Unknown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,
    ArrowUp, ArrowDown, ArrowLeft, ArrowRight,
    Space, Escape, Enter, Tab, Shift, Control, Alt,
    Unknown(u32),
}

/// Mouse buttons.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// Polled keyboard + mouse state for one window.
#[derive(Debug, Default)]
pub struct Input {
    held: HashSet<Key>,
    pressed: HashSet<Key>,
    released: HashSet<Key>,

    buttons_held: HashSet<MouseButton>,
    buttons_pressed: HashSet<MouseButton>,

    mouse_pos: (f32, f32),
    mouse_delta: (f32, f32),
    wheel_delta: f32,
}

impl Input {
    /// Key is currently down.
    pub fn held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Key went down this frame.
    pub fn pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    /// Key went up this frame.
    pub fn released(&self, key: Key) -> bool {
        self.released.contains(&key)
    }

    pub fn button_held(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button)
    }

    pub fn button_pressed(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    /// Cursor position in physical pixels.
    pub fn mouse_pos(&self) -> (f32, f32) {
        self.mouse_pos
    }

    /// Cursor movement since the previous frame.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    /// Scroll amount since the previous frame, in lines.
    pub fn wheel_delta(&self) -> f32 {
        self.wheel_delta
    }

    /// Folds one window event into the table.
    pub fn apply(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let key = map_key(event.physical_key);
                match event.state {
                    ElementState::Pressed => {
                        // Key repeat must not retrigger the edge.
                        if self.held.insert(key) {
                            self.pressed.insert(key);
                        }
                    }
                    ElementState::Released => {
                        self.held.remove(&key);
                        self.released.insert(key);
                    }
                }
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_button(*button);
                match state {
                    ElementState::Pressed => {
                        if self.buttons_held.insert(button) {
                            self.buttons_pressed.insert(button);
                        }
                    }
                    ElementState::Released => {
                        self.buttons_held.remove(&button);
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let pos = (position.x as f32, position.y as f32);
                self.mouse_delta.0 += pos.0 - self.mouse_pos.0;
                self.mouse_delta.1 += pos.1 - self.mouse_pos.1;
                self.mouse_pos = pos;
            }

            WindowEvent::MouseWheel { delta, .. } => {
                self.wheel_delta += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 16.0,
                };
            }

            WindowEvent::Focused(false) => {
                // Keys released while unfocused never produce events.
                self.held.clear();
                self.buttons_held.clear();
            }

            _ => {}
        }
    }

    /// Clears per-frame edges and deltas. The runtime calls this after each
    /// frame callback.
    pub fn end_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
        self.buttons_pressed.clear();
        self.mouse_delta = (0.0, 0.0);
        self.wheel_delta = 0.0;
    }
}

fn map_key(pk: PhysicalKey) -> Key {
    let PhysicalKey::Code(code) = pk else {
        return Key::Unknown(0);
    };
    match code {
        KeyCode::KeyA => Key::A,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyC => Key::C,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyF => Key::F,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyO => Key::O,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyT => Key::T,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyY => Key::Y,
        KeyCode::KeyZ => Key::Z,
        KeyCode::Digit0 => Key::Digit0,
        KeyCode::Digit1 => Key::Digit1,
        KeyCode::Digit2 => Key::Digit2,
        KeyCode::Digit3 => Key::Digit3,
        KeyCode::Digit4 => Key::Digit4,
        KeyCode::Digit5 => Key::Digit5,
        KeyCode::Digit6 => Key::Digit6,
        KeyCode::Digit7 => Key::Digit7,
        KeyCode::Digit8 => Key::Digit8,
        KeyCode::Digit9 => Key::Digit9,
        KeyCode::ArrowUp => Key::ArrowUp,
        KeyCode::ArrowDown => Key::ArrowDown,
        KeyCode::ArrowLeft => Key::ArrowLeft,
        KeyCode::ArrowRight => Key::ArrowRight,
        KeyCode::Space => Key::Space,
        KeyCode::Escape => Key::Escape,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,
        other => Key::Unknown(other as u32),
    }
}

fn map_button(b: winit::event::MouseButton) -> MouseButton {
    match b {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        winit::event::MouseButton::Back => MouseButton::Other(3),
        winit::event::MouseButton::Forward => MouseButton::Other(4),
        winit::event::MouseButton::Other(v) => MouseButton::Other(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    fn key_event(code: KeyCode, state: ElementState, repeat: bool) -> WindowEvent {
        WindowEvent::KeyboardInput {
            device_id: winit::event::DeviceId::dummy(),
            event: winit::event::KeyEvent {
                physical_key: PhysicalKey::Code(code),
                logical_key: winit::keyboard::Key::Unidentified(
                    winit::keyboard::NativeKey::Unidentified,
                ),
                text: None,
                location: winit::keyboard::KeyLocation::Standard,
                state,
                repeat,
            },
            is_synthetic: false,
        }
    }

    #[test]
    fn press_sets_edge_and_held() {
        let mut input = Input::default();
        input.apply(&key_event(KeyCode::KeyW, ElementState::Pressed, false));
        assert!(input.pressed(Key::W));
        assert!(input.held(Key::W));

        input.end_frame();
        assert!(!input.pressed(Key::W), "edge lasts one frame");
        assert!(input.held(Key::W), "held persists");
    }

    #[test]
    fn repeat_does_not_retrigger_the_edge() {
        let mut input = Input::default();
        input.apply(&key_event(KeyCode::Space, ElementState::Pressed, false));
        input.end_frame();
        input.apply(&key_event(KeyCode::Space, ElementState::Pressed, true));
        assert!(!input.pressed(Key::Space));
        assert!(input.held(Key::Space));
    }

    #[test]
    fn release_clears_held_and_sets_released() {
        let mut input = Input::default();
        input.apply(&key_event(KeyCode::KeyA, ElementState::Pressed, false));
        input.end_frame();
        input.apply(&key_event(KeyCode::KeyA, ElementState::Released, false));
        assert!(!input.held(Key::A));
        assert!(input.released(Key::A));
    }

    #[test]
    fn mouse_delta_accumulates_within_a_frame() {
        let mut input = Input::default();
        let moved = |x, y| WindowEvent::CursorMoved {
            device_id: winit::event::DeviceId::dummy(),
            position: PhysicalPosition::new(x, y),
        };
        input.apply(&moved(10.0, 0.0));
        input.apply(&moved(15.0, 5.0));
        assert_eq!(input.mouse_delta(), (15.0, 5.0));
        assert_eq!(input.mouse_pos(), (15.0, 5.0));

        input.end_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
        assert_eq!(input.mouse_pos(), (15.0, 5.0));
    }

    #[test]
    fn focus_loss_drops_held_keys() {
        let mut input = Input::default();
        input.apply(&key_event(KeyCode::KeyW, ElementState::Pressed, false));
        input.apply(&WindowEvent::Focused(false));
        assert!(!input.held(Key::W));
    }
}
