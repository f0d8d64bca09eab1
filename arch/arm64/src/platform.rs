// =============================================================================
// A53 Boot - Platform Memory Map
// =============================================================================
// Fixed physical addresses of the devices this image talks to. Selected with
// the `platform-*` Cargo features; `platform-fvp` wins if both are enabled.
// =============================================================================

#[cfg(not(feature = "platform-fvp"))]
mod map {
    /// PL011 UART0 on the QEMU virt machine
    pub const UART0_BASE: usize = 0x0900_0000;
    /// GICv2 distributor
    pub const GICD_BASE: usize = 0x0800_0000;
    /// GICv2 CPU interface
    pub const GICC_BASE: usize = 0x0801_0000;
    /// UART0 is SPI 1
    pub const UART0_IRQ: u32 = 33;
}

#[cfg(feature = "platform-fvp")]
mod map {
    /// PL011 UART0 on the Arm FVP Base platform
    pub const UART0_BASE: usize = 0x1c09_0000;
    pub const GICD_BASE: usize = 0x2f00_0000;
    pub const GICC_BASE: usize = 0x2c00_0000;
    /// UART0 is SPI 5
    pub const UART0_IRQ: u32 = 37;
}

pub use map::*;

/// UARTCLK feeding the baud rate generator.
pub const UART_CLOCK_HZ: u32 = 24_000_000;

/// Console line speed.
pub const CONSOLE_BAUD: u32 = 115_200;
