use super::{HeaderLayout, PinDefinition, PinCategory};

const fn power(description: &'static str) -> PinDefinition {
    PinDefinition { category: PinCategory::Power, description, line: None }
}

const fn ground() -> PinDefinition {
    PinDefinition { category: PinCategory::Ground, description: "GND", line: None }
}

const fn gpio(description: &'static str, line: u32) -> PinDefinition {
    PinDefinition { category: PinCategory::Gpio, description, line: Some(line) }
}

/// GPIO-capable position that is wired to an I2C or UART bus on this board
const fn reserved(description: &'static str) -> PinDefinition {
    PinDefinition { category: PinCategory::Gpio, description, line: None }
}

/// Jetson Orin Nano 40-pin expansion header, lines are sysfs GPIO numbers.
pub const JETSON_ORIN_NANO: HeaderLayout = [
    power("3.3 VDC Power"),               // 1
    power("5.0 VDC Power"),               // 2
    reserved("I2C1_SDA (I2C Bus 7)"),     // 3
    power("5.0 VDC Power"),               // 4
    reserved("I2C1_SCL (I2C Bus 7)"),     // 5
    ground(),                             // 6
    gpio("GPIO09 (AUDIO_MCLK)", 492),     // 7
    reserved("UART1_TX (/dev/ttyTHS0)"),  // 8
    ground(),                             // 9
    reserved("UART1_RX (/dev/ttyTHS0)"),  // 10
    gpio("UART1_RTS", 460),               // 11
    gpio("I2S0_SCLK", 398),               // 12
    gpio("SPI1_SCK", 470),                // 13
    ground(),                             // 14
    gpio("GPIO12 (Alt: PWM)", 433),       // 15
    gpio("SPI1_CS1", 474),                // 16
    power("3.3 VDC Power"),               // 17
    gpio("SPI1_CS0", 473),                // 18
    gpio("SPI0_MOSI", 483),               // 19
    ground(),                             // 20
    gpio("SPI0_MISO", 482),               // 21
    gpio("SPI1_MISO", 471),               // 22
    gpio("SPI0_SCK", 481),                // 23
    gpio("SPI0_CS0", 484),                // 24
    ground(),                             // 25
    gpio("SPI0_CS1", 485),                // 26
    reserved("I2C0_SDA (I2C Bus 1)"),     // 27
    reserved("I2C0_SCL (I2C Bus 1)"),     // 28
    gpio("GPIO01", 453),                  // 29
    ground(),                             // 30
    gpio("GPIO11", 454),                  // 31
    gpio("GPIO07 (Alt: PWM)", 389),       // 32
    gpio("GPIO13 (Alt: PWM)", 391),       // 33
    ground(),                             // 34
    gpio("I2S0_FS", 401),                 // 35
    gpio("UART1_CTS", 461),               // 36
    gpio("SPI1_MOSI", 472),               // 37
    gpio("I2S0_SDIN", 400),               // 38
    ground(),                             // 39
    gpio("I2S0_SDOUT", 399),              // 40
];

/// Positions muxed to GPIO by the device-tree overlay shipped with the board image.
pub const JETSON_ORIN_NANO_ENABLED: [u8; 6] = [7, 15, 29, 31, 32, 33];
