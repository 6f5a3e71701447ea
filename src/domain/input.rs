// Local control input for the client, independent of any rendering surface.

use super::math::Vector2;

/// Keys a surface can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Up,
    Down,
    Left,
    Right,
    /// Fires toward the last known cursor position.
    Fire,
}

/// Raw input from a surface. Positions are canvas coordinates, which match arena units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Key { control: Control, pressed: bool },
    MouseMove(Vector2),
    MouseClick(Vector2),
}

/// Currently held directional controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldControls {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl HeldControls {
    /// Applies a press or release; returns true when the movement direction may have changed.
    pub fn apply(&mut self, control: Control, pressed: bool) -> bool {
        let slot = match control {
            Control::Up => &mut self.up,
            Control::Down => &mut self.down,
            Control::Left => &mut self.left,
            Control::Right => &mut self.right,
            Control::Fire => return false,
        };
        let changed = *slot != pressed;
        *slot = pressed;
        changed
    }

    /// Unnormalized movement direction; y grows downwards. Opposite keys cancel out.
    pub fn direction(&self) -> Vector2 {
        let axis = |neg: bool, pos: bool| f32::from(u8::from(pos)) - f32::from(u8::from(neg));
        Vector2::new(axis(self.left, self.right), axis(self.up, self.down))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_combine_into_a_direction() {
        let mut held = HeldControls::default();
        assert!(held.apply(Control::Up, true));
        assert!(held.apply(Control::Right, true));
        assert_eq!(held.direction(), Vector2::new(1.0, -1.0));

        assert!(!held.apply(Control::Right, true));
        assert!(held.apply(Control::Left, true));
        assert_eq!(held.direction(), Vector2::new(0.0, -1.0));

        held.apply(Control::Up, false);
        held.apply(Control::Left, false);
        held.apply(Control::Right, false);
        assert!(held.direction().is_zero());
    }

    #[test]
    fn fire_key_does_not_move() {
        let mut held = HeldControls::default();
        assert!(!held.apply(Control::Fire, true));
        assert!(held.direction().is_zero());
    }
}
