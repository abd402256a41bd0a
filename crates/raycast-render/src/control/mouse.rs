use std::collections::HashMap;
use winit::{
    dpi::PhysicalPosition,
    event::{
        ElementState,
        MouseButton,
    },
};

#[derive(Debug, Default)]
pub struct Mouse {
    position: PhysicalPosition<f32>,
    is_toggled: HashMap<MouseButton, bool>,
}

impl Mouse {
    pub fn set_position(&mut self, position: PhysicalPosition<f32>) {
        self.position = position;
    }

    pub fn position(&self) -> PhysicalPosition<f32> {
        self.position
    }

    pub fn position_from_center(&self, center: PhysicalPosition<f32>) -> PhysicalPosition<f32> {
        PhysicalPosition::<f32>::new(self.position.x - center.x, self.position.y - center.y)
    }

    pub fn set_input(&mut self, state: ElementState, button: MouseButton) {
        if state == ElementState::Released {
            let toggled = self.is_toggled.entry(button).or_insert(false);
            *toggled = !*toggled;
        }
    }

    pub fn is_toggled(&self, button: &MouseButton) -> bool {
        self.is_toggled.get(button).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_on_release() {
        let mut mouse = Mouse::default();
        mouse.set_input(ElementState::Pressed, MouseButton::Right);
        assert!(!mouse.is_toggled(&MouseButton::Right));
        mouse.set_input(ElementState::Released, MouseButton::Right);
        assert!(mouse.is_toggled(&MouseButton::Right));
        mouse.set_input(ElementState::Released, MouseButton::Right);
        assert!(!mouse.is_toggled(&MouseButton::Right));
    }

    #[test]
    fn test_position_from_center() {
        let mut mouse = Mouse::default();
        mouse.set_position(PhysicalPosition::new(110.0, 40.0));
        let offset = mouse.position_from_center(PhysicalPosition::new(100.0, 50.0));
        assert_eq!((offset.x, offset.y), (10.0, -10.0));
    }
}
