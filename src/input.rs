use std::collections::HashSet;

use winit::keyboard::KeyCode;

use crate::scene::{Camera, Direction};

/// Converts absolute cursor positions into look offsets.
#[derive(Clone, Debug)]
pub struct MouseTracker {
    last: Option<(f64, f64)>,
    enabled: bool,
}

impl Default for MouseTracker {
    fn default() -> Self {
        Self {
            last: None,
            enabled: true,
        }
    }
}

impl MouseTracker {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Re-enabling forgets the last position so the next sample does not jump.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.last = None;
    }

    /// Offset since the previous sample, y inverted so moving up looks up. The first
    /// sample only records the position.
    pub fn on_cursor(&mut self, x: f64, y: f64) -> Option<(f32, f32)> {
        if !self.enabled {
            return None;
        }
        let offset = self
            .last
            .map(|(last_x, last_y)| ((x - last_x) as f32, (last_y - y) as f32));
        self.last = Some((x, y));
        offset
    }
}

/// Keys held down plus mouse-look state.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    pub mouse: MouseTracker,
}

impl InputState {
    pub fn key(&mut self, code: KeyCode, pressed: bool) {
        if pressed {
            self.pressed.insert(code);
        } else {
            self.pressed.remove(&code);
        }
    }

    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    pub fn movement(&self) -> impl Iterator<Item = Direction> + '_ {
        [
            (KeyCode::KeyW, Direction::Forward),
            (KeyCode::KeyS, Direction::Backward),
            (KeyCode::KeyA, Direction::Left),
            (KeyCode::KeyD, Direction::Right),
        ]
        .into_iter()
        .filter(|(code, _)| self.is_pressed(*code))
        .map(|(_, direction)| direction)
    }

    pub fn apply_movement(&self, camera: &mut Camera, delta_time: f32) {
        for direction in self.movement() {
            camera.process_movement(delta_time, direction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn first_cursor_sample_is_swallowed() {
        let mut mouse = MouseTracker::default();
        assert_eq!(mouse.on_cursor(100.0, 100.0), None);
        assert_eq!(mouse.on_cursor(110.0, 90.0), Some((10.0, 10.0)));
    }

    #[test]
    fn disabled_tracker_ignores_motion_and_resets() {
        let mut mouse = MouseTracker::default();
        mouse.on_cursor(0.0, 0.0);
        mouse.set_enabled(false);
        assert_eq!(mouse.on_cursor(50.0, 50.0), None);
        mouse.set_enabled(true);
        assert_eq!(mouse.on_cursor(500.0, 500.0), None);
        assert_eq!(mouse.on_cursor(501.0, 500.0), Some((1.0, 0.0)));
    }

    #[test]
    fn held_keys_move_the_camera() {
        let mut input = InputState::default();
        input.key(KeyCode::KeyW, true);
        input.key(KeyCode::KeyD, true);
        input.key(KeyCode::KeyD, false);

        let mut camera = Camera::default();
        input.apply_movement(&mut camera, 1.0);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, -7.5), 1e-4));
    }
}
