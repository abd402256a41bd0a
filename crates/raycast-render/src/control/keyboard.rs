use std::collections::{
    HashMap,
    HashSet,
};
use winit::{
    event::{
        ElementState,
        KeyEvent,
    },
    keyboard::{
        KeyCode,
        PhysicalKey,
    },
};

#[derive(Debug, Default)]
pub struct Keyboard {
    is_pressing: HashMap<KeyCode, bool>,
    just_pressed: HashSet<KeyCode>,
}

impl Keyboard {
    pub fn input_event(&mut self, key: &KeyEvent) {
        if let PhysicalKey::Code(code) = key.physical_key {
            self.input(code, key.state, key.repeat);
        }
    }

    fn input(&mut self, code: KeyCode, state: ElementState, repeat: bool) {
        match state {
            ElementState::Pressed => {
                if !repeat && !self.is_pressed(&code) {
                    self.just_pressed.insert(code);
                }
                self.is_pressing.insert(code, true);
            }
            ElementState::Released => {
                self.is_pressing.insert(code, false);
            }
        }
    }

    pub fn is_pressed(&self, key: &KeyCode) -> bool {
        self.is_pressing.get(key).copied().unwrap_or(false)
    }

    /// True once per physical key press.
    pub fn take_just_pressed(&mut self, key: &KeyCode) -> bool {
        self.just_pressed.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_just_pressed_fires_once() {
        let mut keyboard = Keyboard::default();
        keyboard.input(KeyCode::Space, ElementState::Pressed, false);
        keyboard.input(KeyCode::Space, ElementState::Pressed, true);
        assert!(keyboard.is_pressed(&KeyCode::Space));
        assert!(keyboard.take_just_pressed(&KeyCode::Space));
        assert!(!keyboard.take_just_pressed(&KeyCode::Space));

        keyboard.input(KeyCode::Space, ElementState::Released, false);
        assert!(!keyboard.is_pressed(&KeyCode::Space));
        assert!(!keyboard.take_just_pressed(&KeyCode::Space));
    }
}
