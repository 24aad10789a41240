/*!
 * Key Labels
 *
 * Translates virtual-key codes into short readable labels for trace
 * annotations. Codes follow the Windows virtual-key numbering, which is
 * also what `ChannelHook` producers are expected to send.
 */

use serde::{Deserialize, Serialize};

/// Virtual-key codes with a dedicated label
pub mod vk {
    pub const BACK: u32 = 0x08;
    pub const TAB: u32 = 0x09;
    pub const RETURN: u32 = 0x0D;
    pub const SHIFT: u32 = 0x10;
    pub const CONTROL: u32 = 0x11;
    pub const MENU: u32 = 0x12;
    pub const ESCAPE: u32 = 0x1B;
    pub const SPACE: u32 = 0x20;
    pub const PRIOR: u32 = 0x21;
    pub const NEXT: u32 = 0x22;
    pub const END: u32 = 0x23;
    pub const HOME: u32 = 0x24;
    pub const LEFT: u32 = 0x25;
    pub const UP: u32 = 0x26;
    pub const RIGHT: u32 = 0x27;
    pub const DOWN: u32 = 0x28;
    pub const INSERT: u32 = 0x2D;
    pub const DELETE: u32 = 0x2E;
    pub const LWIN: u32 = 0x5B;
    pub const RWIN: u32 = 0x5C;
    pub const NUMPAD0: u32 = 0x60;
    pub const NUMPAD9: u32 = 0x69;
    pub const F1: u32 = 0x70;
    pub const F12: u32 = 0x7B;
    pub const LSHIFT: u32 = 0xA0;
    pub const RSHIFT: u32 = 0xA1;
    pub const LCONTROL: u32 = 0xA2;
    pub const RCONTROL: u32 = 0xA3;
    pub const LMENU: u32 = 0xA4;
    pub const RMENU: u32 = 0xA5;
    pub const OEM_PERIOD: u32 = 0xBE;
}

/// Modifier keys held when a key went down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub win: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        win: false,
    };

    /// `Ctrl+Shift+Alt+Win+` prefix for the held modifiers
    pub fn prefix(&self) -> String {
        let mut prefix = String::new();
        if self.ctrl {
            prefix.push_str("Ctrl+");
        }
        if self.shift {
            prefix.push_str("Shift+");
        }
        if self.alt {
            prefix.push_str("Alt+");
        }
        if self.win {
            prefix.push_str("Win+");
        }
        prefix
    }
}

/// A labelled key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLabel {
    /// Code as recorded; letters and digits collapse to `A`/`0` when anonymized
    pub code: u32,
    pub label: String,
}

fn ascii(code: u32) -> String {
    char::from_u32(code).map(String::from).unwrap_or_default()
}

/// Label a key press
///
/// Without `detailed`, letters become `A` and digits (top row or numpad)
/// become `0`. Modifier keys are labelled on their own; every other key
/// gets the held-modifier prefix.
pub fn key_label(code: u32, modifiers: Modifiers, detailed: bool) -> KeyLabel {
    let mut code = code;
    let mut is_meta = false;

    let label = match code {
        0x41..=0x5A | 0x30..=0x39 | vk::SPACE => {
            if !detailed {
                if (0x41..=0x5A).contains(&code) {
                    code = 0x41;
                } else if (0x30..=0x39).contains(&code) {
                    code = 0x30;
                }
            }
            ascii(code)
        }
        vk::NUMPAD0..=vk::NUMPAD9 => {
            let digit = code - vk::NUMPAD0;
            if !detailed {
                code = 0x30;
                "0".to_string()
            } else {
                digit.to_string()
            }
        }
        vk::F1..=vk::F12 => format!("F{}", code + 1 - vk::F1),
        _ => {
            let named = match code {
                vk::BACK => "backspace",
                vk::TAB => "tab",
                vk::RETURN => "enter",
                vk::PRIOR => "page up",
                vk::NEXT => "page down",
                vk::END => "end",
                vk::HOME => "home",
                vk::LEFT => "left",
                vk::UP => "up",
                vk::RIGHT => "right",
                vk::DOWN => "down",
                vk::DELETE => "delete",
                vk::INSERT => "insert",
                vk::ESCAPE => "esc",
                vk::OEM_PERIOD => ".",
                vk::SHIFT | vk::LSHIFT | vk::RSHIFT => {
                    is_meta = true;
                    "shift"
                }
                vk::CONTROL | vk::LCONTROL | vk::RCONTROL => {
                    is_meta = true;
                    "control"
                }
                vk::MENU | vk::LMENU | vk::RMENU => {
                    is_meta = true;
                    "alt"
                }
                vk::LWIN | vk::RWIN => {
                    is_meta = true;
                    "Win"
                }
                _ => "<unknown key>",
            };
            named.to_string()
        }
    };

    let label = if is_meta {
        label
    } else {
        modifiers.prefix() + &label
    };
    KeyLabel { code, label }
}
