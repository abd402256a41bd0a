pub mod keyboard;
pub mod mouse;

use keyboard::Keyboard;
use mouse::Mouse;

/// Input state collected from window events between two frames.
#[derive(Debug, Default)]
pub struct Control {
    keyboard: Keyboard,
    mouse: Mouse,
}

impl Control {
    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut Keyboard {
        &mut self.keyboard
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn mouse_mut(&mut self) -> &mut Mouse {
        &mut self.mouse
    }

    /// Whether the camera follows the mouse. Toggled with the right button.
    pub fn is_looking(&self) -> bool {
        self.mouse.is_toggled(&winit::event::MouseButton::Right)
    }
}
