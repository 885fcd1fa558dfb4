//! Device input decoding
//!
//! The input-mapping layer hands the controller one [`ControlPadMap`] per
//! button transition. A map either drives joystick pins, a key-matrix cell
//! (packed into the `mid` code) or one of the controller's own commands.

use crate::core::JoyPins;

/// Commands bound to device buttons rather than to the emulated machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialCommand {
    ShowMenu,
    ToggleKeyboard,
    Pause,
    SwapJoysticks,
    ToggleWarp,
}

impl TryFrom<u8> for SpecialCommand {
    type Error = u8;

    fn try_from(mid: u8) -> Result<Self, Self::Error> {
        match mid {
            126 => Ok(SpecialCommand::ShowMenu),
            127 => Ok(SpecialCommand::ToggleKeyboard),
            128 => Ok(SpecialCommand::Pause),
            129 => Ok(SpecialCommand::SwapJoysticks),
            130 => Ok(SpecialCommand::ToggleWarp),
            other => Err(other),
        }
    }
}

/// Key-matrix cell addressed by a key map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPosition {
    pub row: i8,
    pub column: u8,
}

impl KeyPosition {
    /// Bits 4-7 hold the row, bits 0-2 the column. Bit 3 negates the row,
    /// which selects keys wired outside the matrix (RESTORE, shift lock).
    pub fn from_mid(mid: u8) -> Self {
        let row = (mid >> 4) as i8;
        Self {
            row: if mid & 0x08 != 0 { -row } else { row },
            column: mid & 0x07,
        }
    }
}

/// What a device button is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Joystick(JoyPins),
    Key,
    Special,
}

/// One button transition reported by the input-mapping layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPadMap {
    pub mid: u8,
    pub pressed: bool,
    pub binding: Binding,
}

impl ControlPadMap {
    pub fn joystick(pins: JoyPins, pressed: bool) -> Self {
        Self {
            mid: 0,
            pressed,
            binding: Binding::Joystick(pins),
        }
    }

    pub fn key(mid: u8, pressed: bool) -> Self {
        Self {
            mid,
            pressed,
            binding: Binding::Key,
        }
    }

    pub fn special(mid: u8, pressed: bool) -> Self {
        Self {
            mid,
            pressed,
            binding: Binding::Special,
        }
    }

    /// Decode into an event. Releases of special buttons and unknown
    /// command codes decode to `None`.
    pub fn decode(&self) -> Option<InputEvent> {
        match self.binding {
            Binding::Joystick(pins) => Some(InputEvent::Joystick {
                pins,
                pressed: self.pressed,
            }),
            Binding::Key => Some(InputEvent::Key {
                position: KeyPosition::from_mid(self.mid),
                pressed: self.pressed,
            }),
            Binding::Special if self.pressed => {
                SpecialCommand::try_from(self.mid).ok().map(InputEvent::Command)
            }
            Binding::Special => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Joystick { pins: JoyPins, pressed: bool },
    Key { position: KeyPosition, pressed: bool },
    Command(SpecialCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_mid_decodes_row_and_column() {
        // Row 6, column 4
        assert_eq!(KeyPosition::from_mid(0x64), KeyPosition { row: 6, column: 4 });
        // Bit 3 negates the row
        assert_eq!(KeyPosition::from_mid(0x39), KeyPosition { row: -3, column: 1 });
        assert_eq!(KeyPosition::from_mid(0x00), KeyPosition { row: 0, column: 0 });
    }

    #[test]
    fn special_codes() {
        assert_eq!(SpecialCommand::try_from(126), Ok(SpecialCommand::ShowMenu));
        assert_eq!(SpecialCommand::try_from(130), Ok(SpecialCommand::ToggleWarp));
        assert_eq!(SpecialCommand::try_from(125), Err(125));
        assert_eq!(SpecialCommand::try_from(131), Err(131));
    }

    #[test]
    fn special_release_is_ignored() {
        assert_eq!(ControlPadMap::special(128, false).decode(), None);
        assert_eq!(
            ControlPadMap::special(128, true).decode(),
            Some(InputEvent::Command(SpecialCommand::Pause))
        );
        assert_eq!(ControlPadMap::special(200, true).decode(), None);
    }

    #[test]
    fn joystick_and_key_releases_pass_through() {
        assert_eq!(
            ControlPadMap::joystick(JoyPins::FIRE, false).decode(),
            Some(InputEvent::Joystick {
                pins: JoyPins::FIRE,
                pressed: false
            })
        );
        assert_eq!(
            ControlPadMap::key(0x11, false).decode(),
            Some(InputEvent::Key {
                position: KeyPosition { row: 1, column: 1 },
                pressed: false
            })
        );
    }
}
