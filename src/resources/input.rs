//! Per-frame input snapshot
//!
//! The renderer never talks to a window library. A platform adapter (or a
//! scripted driver) feeds key transitions and raw cursor motion into
//! [`Input`]; the frame orchestrator reads it once per frame.
//!
//! Key state is three bit sets: held, pressed this frame, released this
//! frame. [`Input::start_frame`] clears the two edge sets and the motion
//! accumulator.

use bitflags::bitflags;
use glam::Vec2;

/// Keys the renderer reacts to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Fly forward.
    W,
    /// Strafe left.
    A,
    /// Fly backward.
    S,
    /// Strafe right.
    D,
    /// Toggles cursor capture.
    E,
    /// Toggles vsync.
    V,
    /// Fly up.
    Space,
    /// Quit.
    Escape,
    /// Fly down.
    ShiftLeft,
    /// Sprint.
    ControlLeft,
    /// Toggles fullscreen.
    F11,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct KeySet: u16 {
        const W            = 1 << 0;
        const A            = 1 << 1;
        const S            = 1 << 2;
        const D            = 1 << 3;
        const E            = 1 << 4;
        const V            = 1 << 5;
        const SPACE        = 1 << 6;
        const ESCAPE       = 1 << 7;
        const SHIFT_LEFT   = 1 << 8;
        const CONTROL_LEFT = 1 << 9;
        const F11          = 1 << 10;
    }
}

impl From<Key> for KeySet {
    fn from(key: Key) -> Self {
        match key {
            Key::W => Self::W,
            Key::A => Self::A,
            Key::S => Self::S,
            Key::D => Self::D,
            Key::E => Self::E,
            Key::V => Self::V,
            Key::Space => Self::SPACE,
            Key::Escape => Self::ESCAPE,
            Key::ShiftLeft => Self::SHIFT_LEFT,
            Key::ControlLeft => Self::CONTROL_LEFT,
            Key::F11 => Self::F11,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Default)]
pub struct Input {
    held: KeySet,
    pressed: KeySet,
    released: KeySet,
    /// Accumulated relative cursor motion, in pixels.
    motion: Vec2,
}

impl Input {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the edges and motion recorded for the previous frame.
    pub fn start_frame(&mut self) {
        self.pressed = KeySet::empty();
        self.released = KeySet::empty();
        self.motion = Vec2::ZERO;
    }

    /// Records a key transition. Repeated presses of a held key are not edges.
    pub fn inject_key(&mut self, key: Key, state: ButtonState) {
        let bit = KeySet::from(key);
        match state {
            ButtonState::Pressed if !self.held.contains(bit) => {
                self.held.insert(bit);
                self.pressed.insert(bit);
            }
            ButtonState::Released if self.held.contains(bit) => {
                self.held.remove(bit);
                self.released.insert(bit);
            }
            _ => {}
        }
    }

    /// Adds raw cursor motion (cursor captured).
    pub fn inject_mouse_motion(&mut self, dx: f32, dy: f32) {
        self.motion += Vec2::new(dx, dy);
    }

    #[must_use]
    pub fn get_key(&self, key: Key) -> bool {
        self.held.contains(key.into())
    }

    /// Pressed during this frame.
    #[must_use]
    pub fn get_key_down(&self, key: Key) -> bool {
        self.pressed.contains(key.into())
    }

    /// Released during this frame.
    #[must_use]
    pub fn get_key_up(&self, key: Key) -> bool {
        self.released.contains(key.into())
    }

    #[must_use]
    pub fn mouse_delta(&self) -> Vec2 {
        self.motion
    }
}
