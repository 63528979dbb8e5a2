//! Static description of the 40-pin expansion header.
//!
//! The registry is built once at startup from a layout table and the set of
//! positions enabled for control out of band (device-tree overlay). Nothing
//! in it changes afterwards.

use serde::{Serialize, Deserialize};
use std::collections::BTreeSet;
use log::warn;

mod orin_nano;

pub use orin_nano::{JETSON_ORIN_NANO, JETSON_ORIN_NANO_ENABLED};

pub const HEADER_PINS: u8 = 40;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinCategory {
    Power,
    Ground,
    Gpio,
}

/// One row of a layout table, indexed by `position - 1`.
#[derive(Debug, Clone, Copy)]
pub struct PinDefinition {
    pub category: PinCategory,
    pub description: &'static str,
    pub line: Option<u32>,
}

pub type HeaderLayout = [PinDefinition; HEADER_PINS as usize];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinDescriptor {
    pub position: u8,
    pub category: PinCategory,
    pub description: &'static str,
    pub line: Option<u32>,
    /// Listed in the enabled set, whether or not the pin can honour it
    pub in_enabled_set: bool,
    pub enabled: bool,
}

impl PinDescriptor {
    pub fn is_controllable(&self) -> bool {
        self.category == PinCategory::Gpio && self.line.is_some() && self.enabled
    }
}

#[derive(Debug, Clone)]
pub struct PinRegistry {
    pins: Vec<PinDescriptor>,
}

impl PinRegistry {
    pub fn new<I>(layout: &HeaderLayout, enabled: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let enabled: BTreeSet<u8> = enabled.into_iter().collect();

        let pins: Vec<_> = layout.iter().zip(1..=HEADER_PINS).map(|(def, position)| {
            let in_enabled_set = enabled.contains(&position);
            let gpio_line = def.category == PinCategory::Gpio && def.line.is_some();
            if in_enabled_set && !gpio_line {
                warn!("pin {} ({}) is enabled but has no GPIO line, ignoring", position, def.description);
            }
            PinDescriptor {
                position,
                category: def.category,
                description: def.description,
                line: if def.category == PinCategory::Gpio { def.line } else { None },
                in_enabled_set,
                enabled: in_enabled_set && gpio_line,
            }
        }).collect();

        for position in enabled.iter().filter(|p| !(1..=HEADER_PINS).contains(*p)) {
            warn!("enabled position {} is not on the header, ignoring", position);
        }

        Self {
            pins,
        }
    }

    /// Registry for the compiled-in Jetson Orin Nano header and overlay.
    pub fn jetson_orin_nano() -> Self {
        Self::new(&JETSON_ORIN_NANO, JETSON_ORIN_NANO_ENABLED.iter().copied())
    }

    /// Descriptor of a header position.
    ///
    /// # Panics
    ///
    /// Panics if `position` is outside `1..=40`; use [`PinRegistry::get`] for
    /// untrusted input.
    pub fn describe(&self, position: u8) -> &PinDescriptor {
        match self.get(position) {
            Some(pin) => pin,
            None => panic!("header position {} out of range", position),
        }
    }

    pub fn get(&self, position: u8) -> Option<&PinDescriptor> {
        if position == 0 {
            return None;
        }
        self.pins.get(position as usize - 1)
    }

    pub fn is_controllable(&self, position: u8) -> bool {
        self.get(position).map_or(false, PinDescriptor::is_controllable)
    }

    /// Hardware line of a controllable position
    pub fn line(&self, position: u8) -> Option<u32> {
        self.get(position).filter(|pin| pin.is_controllable()).and_then(|pin| pin.line)
    }

    pub fn controllable_positions(&self) -> BTreeSet<u8> {
        self.pins.iter().filter(|pin| pin.is_controllable()).map(|pin| pin.position).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PinDescriptor> {
        self.pins.iter()
    }
}

impl<'a> IntoIterator for &'a PinRegistry {
    type Item = &'a PinDescriptor;
    type IntoIter = std::slice::Iter<'a, PinDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.pins.iter()
    }
}
