use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use crate::hal::gpio::Direction;
use crate::header::{PinCategory, PinDescriptor, HEADER_PINS};

pub mod gpio;

/// Pins are addressed by physical header position
pub const GPIO_MODE: &str = "BOARD";

/// Status of one header position as reported by `/api/pins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinInfo {
    #[serde(rename = "type")]
    pub category: PinCategory,
    pub description: String,
    pub gpio_num: Option<u32>,
    pub controllable: bool,
    pub dts_configured: bool,
    pub has_gpio_num: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

impl PinInfo {
    /// `runtime` is the current direction and cached level of a controllable pin.
    pub fn new(pin: &PinDescriptor, runtime: Option<(Direction, bool)>) -> Self {
        Self {
            category: pin.category,
            description: pin.description.to_string(),
            gpio_num: pin.line,
            controllable: pin.is_controllable(),
            dts_configured: pin.in_enabled_set,
            has_gpio_num: pin.category == PinCategory::Gpio && pin.line.is_some(),
            direction: runtime.map(|(direction, _)| direction),
            state: runtime.map(|(_, level)| level),
        }
    }
}

pub type PinTable = BTreeMap<u8, PinInfo>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMapping {
    pub physical_pin: u8,
    pub gpio_number: u32,
    pub description: String,
}

/// Debug view of the header configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioInfo {
    pub gpio_mode: String,
    /// Numbering scheme of the GPIO library, always [`GPIO_MODE`]
    pub jetson_gpio_mode: String,
    pub total_pins: u8,
    pub controllable_pins: usize,
    pub pin_mapping: BTreeMap<u8, PinMapping>,
}

impl GpioInfo {
    pub fn new<'a, I>(controllable: I) -> Self
    where
        I: IntoIterator<Item = &'a PinDescriptor>,
    {
        let pin_mapping: BTreeMap<_, _> = controllable.into_iter().filter_map(|pin| {
            let mapping = PinMapping {
                physical_pin: pin.position,
                gpio_number: pin.line?,
                description: pin.description.to_string(),
            };
            Some((pin.position, mapping))
        }).collect();

        Self {
            gpio_mode: format!("{} (Physical Pin Numbers)", GPIO_MODE),
            jetson_gpio_mode: GPIO_MODE.to_string(),
            total_pins: HEADER_PINS,
            controllable_pins: pin_mapping.len(),
            pin_mapping,
        }
    }
}
