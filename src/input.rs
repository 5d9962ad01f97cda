use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::camera::MoveKeys;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-character keys that can be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
}

/// Keys driving the four movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub forward: KeyCode,
    pub backward: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::Character('W'),
            backward: KeyCode::Character('S'),
            left: KeyCode::Character('A'),
            right: KeyCode::Character('D'),
        }
    }
}

/// Per-frame view of the input relevant to the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSnapshot {
    pub keys: MoveKeys,
    pub cursor: Vec2,
    pub previous_cursor: Vec2,
}

impl InputSnapshot {
    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor - self.previous_cursor
    }
}

/// Input accumulated from window events between frames.
///
/// The previous cursor position is unset until the first cursor sample, so the
/// initial jump from wherever the pointer entered the window is ignored.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    cursor: Option<Vec2>,
    previous_cursor: Option<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        self.keys.insert(key);
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn release_all(&mut self) {
        self.keys.clear();
    }

    pub fn set_cursor_position(&mut self, position: Vec2) {
        self.cursor = Some(position);
    }

    /// Forgets the last cursor sample, e.g. after the pointer left the window.
    pub fn reset_cursor(&mut self) {
        self.cursor = None;
        self.previous_cursor = None;
    }

    pub fn snapshot(&self, bindings: &KeyBindings) -> InputSnapshot {
        let cursor = self.cursor.unwrap_or(Vec2::ZERO);
        InputSnapshot {
            keys: MoveKeys {
                forward: self.is_key_down(bindings.forward),
                backward: self.is_key_down(bindings.backward),
                left: self.is_key_down(bindings.left),
                right: self.is_key_down(bindings.right),
            },
            cursor,
            previous_cursor: self.previous_cursor.unwrap_or(cursor),
        }
    }

    /// Carries the current cursor over as the previous one for the next frame.
    pub fn end_frame(&mut self) {
        self.previous_cursor = self.cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Space"),
            Some(KeyCode::Named(NamedKey::Space))
        );
        assert_eq!(KeyCode::from_name("w"), Some(KeyCode::Character('W')));
        assert_eq!(KeyCode::from_name("7"), Some(KeyCode::Digit(7)));
        assert_eq!(KeyCode::from_name("F12"), Some(KeyCode::Function(12)));
        assert_eq!(KeyCode::from_name("F40"), None);
        assert_eq!(KeyCode::from_name("Hyper"), None);
    }

    #[test]
    fn snapshot_reflects_bound_keys() {
        let bindings = KeyBindings::default();
        let mut state = InputState::new();
        state.set_key_down(KeyCode::Character('W'));
        state.set_key_down(KeyCode::Character('D'));
        state.set_key_down(KeyCode::Character('Q'));
        let keys = state.snapshot(&bindings).keys;
        assert!(keys.forward && keys.right);
        assert!(!keys.backward && !keys.left);

        state.set_key_up(KeyCode::Character('W'));
        assert!(!state.snapshot(&bindings).keys.forward);
    }

    #[test]
    fn first_cursor_sample_has_no_delta() {
        let mut state = InputState::new();
        state.set_cursor_position(Vec2::new(400.0, 300.0));
        let snapshot = state.snapshot(&KeyBindings::default());
        assert_eq!(snapshot.cursor_delta(), Vec2::ZERO);
    }

    #[test]
    fn delta_is_measured_from_previous_frame() {
        let bindings = KeyBindings::default();
        let mut state = InputState::new();
        state.set_cursor_position(Vec2::new(100.0, 100.0));
        state.end_frame();
        state.set_cursor_position(Vec2::new(110.0, 95.0));
        assert_eq!(
            state.snapshot(&bindings).cursor_delta(),
            Vec2::new(10.0, -5.0)
        );
        state.end_frame();
        assert_eq!(state.snapshot(&bindings).cursor_delta(), Vec2::ZERO);
    }

    #[test]
    fn reset_cursor_drops_history() {
        let bindings = KeyBindings::default();
        let mut state = InputState::new();
        state.set_cursor_position(Vec2::new(10.0, 10.0));
        state.end_frame();
        state.reset_cursor();
        state.set_cursor_position(Vec2::new(500.0, 500.0));
        assert_eq!(state.snapshot(&bindings).cursor_delta(), Vec2::ZERO);
    }
}
