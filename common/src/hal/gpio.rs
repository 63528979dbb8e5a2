use crate::hal::HalResult;
use core::fmt;
use core::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "INPUT",
            Direction::Output => "OUTPUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized direction '{0}', use INPUT or OUTPUT")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if token.eq_ignore_ascii_case("INPUT") {
            Ok(Direction::Input)
        } else if token.eq_ignore_ascii_case("OUTPUT") {
            Ok(Direction::Output)
        } else {
            Err(ParseDirectionError(s.to_string()))
        }
    }
}

/// Electrical access to GPIO lines, addressed by driver line number.
///
/// Every call is synchronous and may block for as long as the underlying
/// driver does.
pub trait GpioDriver: Send {
    fn configure_output(&mut self, line: u32) -> HalResult<()>;

    fn configure_input(&mut self, line: u32) -> HalResult<()>;

    fn read_level(&mut self, line: u32) -> HalResult<bool>;

    fn write_level(&mut self, line: u32, value: bool) -> HalResult<()>;

    /// Release every line this driver touched. Safe to call more than once.
    fn release_all(&mut self) -> HalResult<()>;
}
