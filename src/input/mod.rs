/*!
 * Input Logging
 *
 * Optional keyboard and mouse annotations for traces. A hook delivers raw
 * events; the logger session labels them (anonymized unless full detail
 * is requested) and forwards them to the event sink.
 */

pub mod keys;
pub mod logger;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use keys::{key_label, KeyLabel, Modifiers};
pub use logger::{ChannelHook, InputHook, InputLogger};

/// How much input detail is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputLogState {
    #[default]
    Off,
    Anonymized,
    Full,
}

impl InputLogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputLogState::Off => "off",
            InputLogState::Anonymized => "anonymized",
            InputLogState::Full => "full",
        }
    }
}

impl fmt::Display for InputLogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputLogState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(InputLogState::Off),
            "anonymized" => Ok(InputLogState::Anonymized),
            "full" => Ok(InputLogState::Full),
            other => Err(format!("unknown input logging state: {}", other)),
        }
    }
}

/// Mouse button index
pub type Button = u8;

/// Raw event as delivered by a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown { code: u32, modifiers: Modifiers },
    MouseDown { button: Button, x: i32, y: i32 },
    MouseUp { button: Button, x: i32, y: i32 },
    MouseWheel { delta: i32, x: i32, y: i32 },
    MouseMove { x: i32, y: i32 },
}

/// Record kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    KeyDown,
    MouseDown,
    MouseUp,
    MouseWheel,
    MouseMove,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::KeyDown => "key_down",
            InputKind::MouseDown => "mouse_down",
            InputKind::MouseUp => "mouse_up",
            InputKind::MouseWheel => "mouse_wheel",
            InputKind::MouseMove => "mouse_move",
        }
    }
}

/// Labelled input event, as handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub event: InputKind,
    /// Key code, button index or wheel delta
    pub code: i64,
    pub label: String,
    pub x: i32,
    pub y: i32,
}

impl InputRecord {
    pub fn kind(&self) -> &'static str {
        self.event.as_str()
    }

    /// Label a raw event
    pub fn from_event(event: InputEvent, detailed: bool) -> Self {
        match event {
            InputEvent::KeyDown { code, modifiers } => {
                let key = key_label(code, modifiers, detailed);
                Self {
                    event: InputKind::KeyDown,
                    code: key.code as i64,
                    label: key.label,
                    x: 0,
                    y: 0,
                }
            }
            InputEvent::MouseDown { button, x, y } => Self {
                event: InputKind::MouseDown,
                code: button as i64,
                label: button_name(button).to_string(),
                x,
                y,
            },
            InputEvent::MouseUp { button, x, y } => Self {
                event: InputKind::MouseUp,
                code: button as i64,
                label: button_name(button).to_string(),
                x,
                y,
            },
            InputEvent::MouseWheel { delta, x, y } => Self {
                event: InputKind::MouseWheel,
                code: delta as i64,
                label: String::new(),
                x,
                y,
            },
            InputEvent::MouseMove { x, y } => Self {
                event: InputKind::MouseMove,
                code: 0,
                label: String::new(),
                x,
                y,
            },
        }
    }
}

fn button_name(button: Button) -> &'static str {
    match button {
        0 => "left",
        1 => "middle",
        2 => "right",
        _ => "other",
    }
}
