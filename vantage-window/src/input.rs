//! Window input reduced to what draw layer handlers consume.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Two presses closer than this, in seconds, form a double click.
const DOUBLE_CLICK_SECONDS: f64 = 0.35;
/// ...and no further apart than this, in window pixels.
const DOUBLE_CLICK_DISTANCE: f64 = 4.0;
/// Trackpad pixel deltas are scaled down to roughly match wheel lines.
const PIXEL_SCROLL_SCALE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

impl PointerButton {
    pub fn from_winit(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(PointerButton::Primary),
            MouseButton::Right => Some(PointerButton::Secondary),
            MouseButton::Middle => Some(PointerButton::Middle),
            _ => None,
        }
    }
}

/// Keys handlers react to. Everything else is reported as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Home,
    R,
    Escape,
    Other,
}

impl Key {
    pub fn from_winit(code: KeyCode) -> Self {
        match code {
            KeyCode::Home => Key::Home,
            KeyCode::KeyR => Key::R,
            KeyCode::Escape => Key::Escape,
            _ => Key::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    PointerDown { button: PointerButton },
    PointerUp { button: PointerButton },
    PointerMove,
    DoubleClick { button: PointerButton },
    /// Positive `y` scrolls towards the scene.
    Scroll { delta: DVec2 },
    Key { key: Key, pressed: bool },
}

/// One input event at a window-space position (pixels, y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub position: DVec2,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl Event {
    pub fn new(position: DVec2, kind: EventKind) -> Self {
        Self {
            position,
            kind,
            modifiers: Modifiers::default(),
        }
    }
}

/// Window state an event is interpreted against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Context {
    pub window_size: DVec2,
    pub modifiers: Modifiers,
}

impl Context {
    pub fn new(window_size: DVec2) -> Self {
        Self {
            window_size,
            modifiers: Modifiers::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Click {
    button: PointerButton,
    position: DVec2,
    time: f64,
}

/// Turns winit window events into [`Event`]s, tracking the cursor and
/// modifiers and synthesising double clicks.
#[derive(Debug, Default)]
pub struct EventTranslator {
    cursor: DVec2,
    modifiers: Modifiers,
    last_click: Option<Click>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> DVec2 {
        self.cursor
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Translate one window event observed at `now` seconds. A press that
    /// completes a double click yields the press followed by the double
    /// click.
    pub fn translate(&mut self, event: &WindowEvent, now: f64) -> Vec<Event> {
        let kind = match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = DVec2::new(position.x, position.y);
                EventKind::PointerMove
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                let state = modifiers.state();
                self.modifiers = Modifiers {
                    shift: state.shift_key(),
                    ctrl: state.control_key(),
                    alt: state.alt_key(),
                };
                return Vec::new();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(x, y) => {
                        DVec2::new(f64::from(*x), f64::from(*y))
                    }
                    MouseScrollDelta::PixelDelta(pos) => {
                        DVec2::new(pos.x, pos.y) * PIXEL_SCROLL_SCALE
                    }
                };
                EventKind::Scroll { delta }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let Some(button) = PointerButton::from_winit(*button) else {
                    return Vec::new();
                };
                match state {
                    ElementState::Pressed => {
                        let press = self.event(EventKind::PointerDown { button });
                        if self.register_click(button, self.cursor, now) {
                            return vec![press, self.event(EventKind::DoubleClick { button })];
                        }
                        return vec![press];
                    }
                    ElementState::Released => EventKind::PointerUp { button },
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return Vec::new();
                };
                EventKind::Key {
                    key: Key::from_winit(code),
                    pressed: event.state == ElementState::Pressed,
                }
            }
            _ => return Vec::new(),
        };
        vec![self.event(kind)]
    }

    /// Record a press and report whether it completes a double click. The
    /// click that completes a pair does not start a new one.
    pub fn register_click(&mut self, button: PointerButton, position: DVec2, time: f64) -> bool {
        let is_double = self.last_click.is_some_and(|last| {
            last.button == button
                && time - last.time <= DOUBLE_CLICK_SECONDS
                && time >= last.time
                && last.position.distance(position) <= DOUBLE_CLICK_DISTANCE
        });
        self.last_click = if is_double {
            None
        } else {
            Some(Click {
                button,
                position,
                time,
            })
        };
        is_double
    }

    fn event(&self, kind: EventKind) -> Event {
        Event {
            position: self.cursor,
            kind,
            modifiers: self.modifiers,
        }
    }
}
