// =============================================================================
// A53 Boot - PL011 UART Driver
// =============================================================================
// Driver for the ARM PL011 UART, the serial console of this image.
//
// The driver is byte oriented: it owns no framing beyond the hardware
// ready/busy flags. Both transmit and receive busy-wait without a timeout,
// which is only acceptable because nothing here runs under a scheduler.
//
// Reference: ARM PrimeCell UART (PL011) Technical Reference Manual
// =============================================================================

use core::fmt::{self, Write};

use bitflags::bitflags;
use spin::Mutex;

use crate::irq::{self, RxQueue};
use crate::mmio::{Mmio, MmioRegion};
use crate::platform;

// =============================================================================
// PL011 Register Definitions
// =============================================================================

/// UART Register Offsets from base address
pub(crate) mod regs {
    /// Data Register - read/write data here
    pub const DR: usize = 0x00;

    /// Flag Register - contains UART status flags
    pub const FR: usize = 0x18;

    /// Integer Baud Rate Register
    pub const IBRD: usize = 0x24;

    /// Fractional Baud Rate Register
    pub const FBRD: usize = 0x28;

    /// Line Control Register
    pub const LCR_H: usize = 0x2C;

    /// Control Register
    pub const CR: usize = 0x30;

    /// Interrupt Mask Set/Clear Register
    pub const IMSC: usize = 0x38;

    /// Raw Interrupt Status Register
    pub const RIS: usize = 0x3C;

    /// Masked Interrupt Status Register
    pub const MIS: usize = 0x40;

    /// Interrupt Clear Register
    pub const ICR: usize = 0x44;
}

/// Flag Register bits
pub(crate) mod flags {
    /// Transmit FIFO full
    pub const TXFF: u32 = 1 << 5;

    /// Receive FIFO empty
    pub const RXFE: u32 = 1 << 4;
}

bitflags! {
    /// Control Register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const UARTEN = 1 << 0;
        const TXE    = 1 << 8;
        const RXE    = 1 << 9;
    }
}

bitflags! {
    /// Line Control Register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineControl: u32 {
        /// Enable FIFOs
        const FEN    = 1 << 4;
        /// Word length: 8 bits (bits 5-6 = 0b11)
        const WLEN_8 = 0b11 << 5;
    }
}

bitflags! {
    /// Interrupt bits shared by IMSC, RIS, MIS and ICR
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        /// Receive
        const RX  = 1 << 4;
        /// Transmit
        const TX  = 1 << 5;
        /// Receive timeout
        const RT  = 1 << 6;
        /// Every source the PL011 implements
        const ALL = 0x7FF;
    }
}

/// Integer and fractional baud rate divisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudDivisors {
    pub integer: u32,
    pub fraction: u32,
}

impl BaudDivisors {
    /// Compute divisors for `baud` from a UART reference clock.
    ///
    /// The baud rate divisor is `clock / (16 * baud)`; the fractional part is
    /// kept in sixty-fourths and rounded to nearest.
    pub const fn new(clock_hz: u32, baud: u32) -> Self {
        let scaled = ((clock_hz as u64 * 8) / baud as u64 + 1) / 2;
        Self {
            integer: (scaled >> 6) as u32,
            fraction: (scaled & 0x3F) as u32,
        }
    }
}

// =============================================================================
// UART Driver Implementation
// =============================================================================

/// PL011 UART driver over a register window.
pub struct Pl011<M: Mmio> {
    pub(crate) regs: M,
}

impl<M: Mmio> Pl011<M> {
    /// Create a driver for the given register window.
    pub const fn new(regs: M) -> Self {
        Self { regs }
    }

    /// Initialize the UART for 8-N-1 operation with FIFOs enabled.
    ///
    /// Must run before any transmit or receive call.
    pub fn init(&self, divisors: BaudDivisors) {
        // Disable UART while configuring
        self.regs.write32(regs::CR, 0);

        // Mask and clear every pending interrupt cause
        self.regs.write32(regs::IMSC, 0);
        self.regs.write32(regs::ICR, Interrupts::ALL.bits());

        // The divisors only latch on the LCR_H write that follows
        self.regs.write32(regs::IBRD, divisors.integer);
        self.regs.write32(regs::FBRD, divisors.fraction);
        self.regs
            .write32(regs::LCR_H, (LineControl::WLEN_8 | LineControl::FEN).bits());

        // Enable UART, TX and RX in one write
        self.regs
            .write32(regs::CR, (Control::UARTEN | Control::TXE | Control::RXE).bits());
    }

    /// Transmit a single byte.
    ///
    /// Blocks until the transmit FIFO has space.
    pub fn write_byte(&self, byte: u8) {
        while self.regs.read32(regs::FR) & flags::TXFF != 0 {
            core::hint::spin_loop();
        }
        self.regs.write32(regs::DR, byte as u32);
    }

    /// Transmit every byte of `s` up to the first NUL, exactly as given.
    pub fn write_string(&self, s: &str) {
        for byte in s.bytes().take_while(|&b| b != 0) {
            self.write_byte(byte);
        }
    }

    /// Transmit text for a terminal, expanding `\n` to `\r\n`.
    pub fn write_text(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    /// Receive a single byte, blocking until one is available.
    pub fn read_byte(&self) -> u8 {
        while self.regs.read32(regs::FR) & flags::RXFE != 0 {
            core::hint::spin_loop();
        }
        (self.regs.read32(regs::DR) & 0xFF) as u8
    }

    /// Read one line into `buf`. See [`read_line_with`].
    pub fn read_line(&self, buf: &mut [u8]) -> usize {
        read_line_with(buf, || self.read_byte())
    }

    /// Echo a received byte for an interactive terminal.
    pub fn echo(&self, byte: u8) {
        match byte {
            b'\r' | b'\n' => {
                self.write_byte(b'\r');
                self.write_byte(b'\n');
            }
            // Backspace / DEL
            8 | 127 => {
                self.write_byte(8);
                self.write_byte(b' ');
                self.write_byte(8);
            }
            _ => self.write_byte(byte),
        }
    }

    /// Unmask the receive interrupt at the peripheral.
    pub fn enable_rx_interrupt(&self) {
        self.regs.set_bits32(regs::IMSC, Interrupts::RX.bits());
    }

    /// Service a UART interrupt.
    ///
    /// If the masked status shows a receive interrupt, one byte is drained
    /// from the data register and the cause is cleared before returning.
    /// The line is level triggered, so leaving either step out re-raises it
    /// immediately.
    pub fn handle_interrupt(&self) -> Option<u8> {
        if self.regs.read32(regs::MIS) & Interrupts::RX.bits() == 0 {
            return None;
        }
        let byte = (self.regs.read32(regs::DR) & 0xFF) as u8;
        self.regs.write32(regs::ICR, Interrupts::RX.bits());
        Some(byte)
    }
}

impl<M: Mmio> Write for Pl011<M> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s);
        Ok(())
    }
}

/// Collect a line from `next_byte` into `buf`.
///
/// Stops on `\r` or `\n` (not stored) or once `buf.len() - 1` data bytes have
/// been stored, then writes a NUL terminator. Returns the number of data
/// bytes. An empty `buf` reads nothing and returns 0.
pub fn read_line_with(buf: &mut [u8], mut next_byte: impl FnMut() -> u8) -> usize {
    let Some(capacity) = buf.len().checked_sub(1) else {
        return 0;
    };

    let mut len = 0;
    while len < capacity {
        match next_byte() {
            b'\r' | b'\n' => break,
            byte => {
                buf[len] = byte;
                len += 1;
            }
        }
    }
    buf[len] = 0;
    len
}

// =============================================================================
// Global Console
// =============================================================================

/// Register window of the console UART.
pub(crate) const fn console_regs() -> MmioRegion {
    // SAFETY: the platform map names the console UART's register block
    unsafe { MmioRegion::new(platform::UART0_BASE) }
}

/// Global console UART, serialising output from the synchronous context.
///
/// The interrupt handler never takes this lock; it uses its own handle.
static UART: Mutex<Pl011<MmioRegion>> = Mutex::new(Pl011::new(console_regs()));

/// Initialize the global console at the platform baud rate.
pub fn init() {
    UART.lock()
        .init(BaudDivisors::new(platform::UART_CLOCK_HZ, platform::CONSOLE_BAUD));
}

/// Transmit one byte on the console.
pub fn write_byte(byte: u8) {
    UART.lock().write_byte(byte);
}

/// Transmit a string on the console with no newline translation.
pub fn write_string(s: &str) {
    UART.lock().write_string(s);
}

/// Receive one byte for the synchronous context.
///
/// While `routed`, the interrupt handler owns the data register: the byte is
/// taken from `queue` and echoed here, so the synchronous context stays the
/// only writer of the data register.
pub(crate) fn receive<M: Mmio, const N: usize>(
    uart: &Pl011<M>,
    queue: &RxQueue<N>,
    routed: bool,
) -> u8 {
    if !routed {
        return uart.read_byte();
    }
    let byte = loop {
        if let Some(byte) = queue.pop() {
            break byte;
        }
        core::hint::spin_loop();
    };
    uart.echo(byte);
    byte
}

/// Receive one byte from the console.
///
/// Once receive interrupts are routed this drains the queue the interrupt
/// handler fills instead of the data register.
pub fn read_byte() -> u8 {
    receive(&*UART.lock(), &irq::RX_QUEUE, irq::rx_interrupts_routed())
}

/// Read one line from the console into `buf`. See [`read_line_with`].
pub fn read_line(buf: &mut [u8]) -> usize {
    read_line_with(buf, read_byte)
}

/// Unmask the console's receive interrupt.
pub fn enable_rx_interrupt() {
    UART.lock().enable_rx_interrupt();
}

/// Print a formatted string to the console.
pub fn _print(args: fmt::Arguments) {
    // Pl011's fmt::Write never fails
    let _ = UART.lock().write_fmt(args);
}

// =============================================================================
// Print Macros
// =============================================================================

/// Print to the console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::uart::_print(format_args!($($arg)*))
    };
}

/// Print to the console with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPl011;

    fn ready_uart() -> Pl011<SimPl011> {
        let uart = Pl011::new(SimPl011::new());
        uart.init(BaudDivisors::new(24_000_000, 115_200));
        uart
    }

    #[test]
    fn divisors_for_common_clocks() {
        assert_eq!(
            BaudDivisors::new(24_000_000, 115_200),
            BaudDivisors { integer: 13, fraction: 1 }
        );
        assert_eq!(
            BaudDivisors::new(48_000_000, 115_200),
            BaudDivisors { integer: 26, fraction: 3 }
        );
    }

    #[test]
    fn init_disables_first_and_enables_in_one_write() {
        let uart = ready_uart();
        let writes = uart.regs.writes();

        assert_eq!(writes.first(), Some(&(regs::CR, 0)));
        assert!(writes.contains(&(regs::ICR, 0x7FF)));
        assert_eq!(
            writes.last(),
            Some(&(regs::CR, (Control::UARTEN | Control::TXE | Control::RXE).bits()))
        );
        // Only the first and last writes touch the control register
        assert_eq!(writes.iter().filter(|(off, _)| *off == regs::CR).count(), 2);

        assert_eq!(uart.regs.register(regs::IBRD), 13);
        assert_eq!(uart.regs.register(regs::FBRD), 1);
        assert_eq!(uart.regs.register(regs::LCR_H), 0b111 << 4);
    }

    #[test]
    fn write_string_sends_exact_bytes() {
        let uart = ready_uart();
        let before = uart.regs.writes().len();

        uart.write_string("OK\n");

        assert_eq!(uart.regs.transmitted(), b"OK\n");
        let after: Vec<_> = uart.regs.writes()[before..].to_vec();
        assert_eq!(
            after,
            [(regs::DR, b'O' as u32), (regs::DR, b'K' as u32), (regs::DR, b'\n' as u32)]
        );
    }

    #[test]
    fn write_string_stops_at_nul() {
        let uart = ready_uart();
        uart.write_string("boot\0garbage");
        assert_eq!(uart.regs.transmitted(), b"boot");
    }

    #[test]
    fn write_byte_waits_for_fifo_space() {
        let uart = ready_uart();
        uart.regs.stall_tx(3);
        uart.write_byte(b'x');
        assert_eq!(uart.regs.transmitted(), b"x");
    }

    #[test]
    fn write_text_expands_newlines() {
        let uart = ready_uart();
        uart.write_text("a\nb");
        assert_eq!(uart.regs.transmitted(), b"a\r\nb");
    }

    #[test]
    fn read_byte_returns_received_bytes_in_order() {
        let uart = ready_uart();
        uart.regs.inject_all(b"hi");
        assert_eq!(uart.read_byte(), b'h');
        assert_eq!(uart.read_byte(), b'i');
        assert_eq!(uart.regs.pending_rx(), 0);
    }

    #[test]
    fn read_line_stops_at_terminator_and_excludes_it() {
        let uart = ready_uart();
        uart.regs.inject_all(b"peek 0x10\rnext\n");
        let mut buf = [0xAAu8; 32];

        let n = uart.read_line(&mut buf);
        assert_eq!(&buf[..n], b"peek 0x10");
        assert_eq!(buf[n], 0);

        let n = uart.read_line(&mut buf);
        assert_eq!(&buf[..n], b"next");
        assert_eq!(uart.regs.pending_rx(), 0);
    }

    #[test]
    fn read_line_never_writes_past_the_buffer() {
        for max_len in 1..=8usize {
            let uart = ready_uart();
            uart.regs.inject_all(b"0123456789abcdef\n");
            let mut backing = [0xAAu8; 16];

            let n = uart.read_line(&mut backing[..max_len]);

            assert_eq!(n, max_len - 1);
            assert_eq!(backing[n], 0);
            assert!(backing[max_len..].iter().all(|&b| b == 0xAA));
            // Only the bytes that fit were consumed
            assert_eq!(uart.regs.pending_rx(), 17 - (max_len - 1));
        }
    }

    #[test]
    fn read_line_with_empty_buffer_reads_nothing() {
        let mut buf: [u8; 0] = [];
        let n = read_line_with(&mut buf, || panic!("no byte should be read"));
        assert_eq!(n, 0);
    }

    #[test]
    fn polled_receive_reads_the_data_register() {
        let uart = ready_uart();
        let queue: RxQueue<8> = RxQueue::new();
        uart.regs.inject(b'p');
        queue.push(b'q');

        assert_eq!(receive(&uart, &queue, false), b'p');
        assert_eq!(queue.pop(), Some(b'q'));
        assert!(uart.regs.transmitted().is_empty());
    }

    #[test]
    fn routed_receive_takes_queued_bytes_and_leaves_the_data_register() {
        let uart = ready_uart();
        let queue: RxQueue<8> = RxQueue::new();
        uart.regs.inject(b'd');
        queue.push(b'q');

        assert_eq!(receive(&uart, &queue, true), b'q');

        assert_eq!(uart.regs.pending_rx(), 1);
        assert_eq!(uart.regs.transmitted(), b"q");
    }

    #[test]
    fn routed_read_line_echoes_as_it_consumes() {
        let uart = ready_uart();
        let queue: RxQueue<8> = RxQueue::new();
        for &b in b"ls\r" {
            queue.push(b);
        }
        let mut buf = [0u8; 8];

        let n = read_line_with(&mut buf, || receive(&uart, &queue, true));

        assert_eq!(&buf[..n], b"ls");
        assert_eq!(uart.regs.transmitted(), b"ls\r\n");
    }

    #[test]
    fn echo_erases_on_backspace() {
        let uart = ready_uart();
        uart.echo(b'a');
        uart.echo(127);
        assert_eq!(uart.regs.transmitted(), b"a\x08 \x08");
    }

    #[test]
    fn rx_interrupt_mask_is_or_ed_in() {
        let uart = ready_uart();
        uart.regs.write32(regs::IMSC, Interrupts::RT.bits());
        uart.enable_rx_interrupt();
        assert_eq!(uart.regs.register(regs::IMSC), (Interrupts::RX | Interrupts::RT).bits());
    }

    #[test]
    fn handle_interrupt_drains_and_clears() {
        let uart = ready_uart();
        uart.enable_rx_interrupt();
        uart.regs.inject(b'z');
        assert_eq!(uart.regs.read32(regs::MIS) & Interrupts::RX.bits(), Interrupts::RX.bits());

        assert_eq!(uart.handle_interrupt(), Some(b'z'));

        assert!(uart.regs.writes().ends_with(&[(regs::ICR, Interrupts::RX.bits())]));
        assert_eq!(uart.regs.raw_status() & Interrupts::RX.bits(), 0);
        assert_eq!(uart.regs.read32(regs::MIS), 0);
        assert_eq!(uart.regs.pending_rx(), 0);
    }

    #[test]
    fn handle_interrupt_ignores_masked_sources() {
        let uart = ready_uart();
        uart.regs.inject(b'q');
        assert_eq!(uart.handle_interrupt(), None);
        assert_eq!(uart.regs.pending_rx(), 1);
    }
}
