//! Controller port and console-switch input.
//!
//! The core never sees host keyboards. Frontends translate their key
//! events into logical [`ControlEvent`]s using the key-bind configuration
//! and feed them to the controller between frames.

/// Logical console inputs. The names in the key-bind configuration map
/// onto these one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleInput {
    JoystickUp,
    JoystickDown,
    JoystickLeft,
    JoystickRight,
    Fire,
    Select,
    Reset,
    /// Left (player 0) difficulty toggle.
    LeftDifficulty,
    /// Right (player 1) difficulty toggle.
    RightDifficulty,
    /// Color / black-and-white toggle.
    ColorBw,
}

impl ConsoleInput {
    pub const ALL: [ConsoleInput; 10] = [
        ConsoleInput::JoystickUp,
        ConsoleInput::JoystickDown,
        ConsoleInput::JoystickLeft,
        ConsoleInput::JoystickRight,
        ConsoleInput::Fire,
        ConsoleInput::Select,
        ConsoleInput::Reset,
        ConsoleInput::LeftDifficulty,
        ConsoleInput::RightDifficulty,
        ConsoleInput::ColorBw,
    ];

    /// The input's name in the `key-binds` configuration table.
    pub fn config_name(self) -> &'static str {
        match self {
            ConsoleInput::JoystickUp => "joystick up",
            ConsoleInput::JoystickDown => "joystick down",
            ConsoleInput::JoystickLeft => "joystick left",
            ConsoleInput::JoystickRight => "joystick right",
            ConsoleInput::Fire => "controller fire",
            ConsoleInput::Select => "select",
            ConsoleInput::Reset => "reset",
            ConsoleInput::LeftDifficulty => "difficulty 1 toggle",
            ConsoleInput::RightDifficulty => "difficulty 2 toggle",
            ConsoleInput::ColorBw => "black and white toggle",
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.config_name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Press(ConsoleInput),
    Release(ConsoleInput),
}

/// A device on the controller port plus the console switches.
///
/// The digital joystick is the only implementation here; paddle pots and
/// the keypad matrix slot in behind the same trait.
pub trait Controller {
    /// RIOT port A: joystick directions, active low.
    fn port_a(&self) -> u8;

    /// RIOT port B: console switches. Bits 0/1 are the momentary reset
    /// and select buttons (active low); bit 3 color/B&W, bits 6/7 the
    /// difficulty switches.
    fn port_b(&self) -> u8;

    /// TIA input ports INPT0..=INPT5.
    fn tia_input(&self, index: usize) -> u8;

    /// Apply a logical input event.
    fn handle(&mut self, event: ControlEvent);
}

/// The standard digital joystick with fire button.
#[derive(Debug, Clone)]
pub struct Joystick {
    input_a: u8,
    input_b: u8,
    /// INPT0..=INPT5. The fire button is INPT4 bit 7, active low.
    inputs: [u8; 6],
}

impl Default for Joystick {
    fn default() -> Self {
        Self::new()
    }
}

impl Joystick {
    pub fn new() -> Self {
        Self {
            input_a: 0xFF,
            // difficulty switches start on B (beginner)
            input_b: 0x3F,
            inputs: [0, 0, 0, 0, 0x80, 0x80],
        }
    }

    fn direction_bit(input: ConsoleInput) -> Option<u8> {
        match input {
            ConsoleInput::JoystickUp => Some(0x10),
            ConsoleInput::JoystickDown => Some(0x20),
            ConsoleInput::JoystickLeft => Some(0x40),
            ConsoleInput::JoystickRight => Some(0x80),
            _ => None,
        }
    }
}

impl Controller for Joystick {
    fn port_a(&self) -> u8 {
        self.input_a
    }

    fn port_b(&self) -> u8 {
        self.input_b
    }

    fn tia_input(&self, index: usize) -> u8 {
        self.inputs.get(index).copied().unwrap_or(0)
    }

    fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Press(input) => {
                if let Some(bit) = Self::direction_bit(input) {
                    self.input_a &= !bit;
                    return;
                }
                match input {
                    ConsoleInput::Fire => self.inputs[4] &= !0x80,
                    ConsoleInput::Reset => self.input_b &= !0x01,
                    ConsoleInput::Select => self.input_b &= !0x02,
                    ConsoleInput::ColorBw => {
                        self.input_b ^= 0x08;
                        log::info!(
                            "{}",
                            if self.input_b & 0x08 != 0 {
                                "color mode"
                            } else {
                                "black and white mode"
                            }
                        );
                    }
                    ConsoleInput::LeftDifficulty => {
                        self.input_b ^= 0x40;
                        log::info!(
                            "left difficulty switch: {}",
                            if self.input_b & 0x40 != 0 { "A" } else { "B" }
                        );
                    }
                    ConsoleInput::RightDifficulty => {
                        self.input_b ^= 0x80;
                        log::info!(
                            "right difficulty switch: {}",
                            if self.input_b & 0x80 != 0 { "A" } else { "B" }
                        );
                    }
                    _ => {}
                }
            }
            ControlEvent::Release(input) => {
                if let Some(bit) = Self::direction_bit(input) {
                    self.input_a |= bit;
                    return;
                }
                match input {
                    ConsoleInput::Fire => self.inputs[4] |= 0x80,
                    ConsoleInput::Reset => self.input_b |= 0x01,
                    ConsoleInput::Select => self.input_b |= 0x02,
                    // the toggles only act on press
                    _ => {}
                }
            }
        }
    }
}
