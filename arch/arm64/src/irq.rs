// =============================================================================
// A53 Boot - Console Interrupt Routing
// =============================================================================
// Routes the console UART's receive interrupt to this core and services it.
//
// Ownership of the UART data register:
// - before `route_console_rx()`, the polled reader owns it;
// - afterwards only the interrupt handler reads it, and pushes every byte
//   into RX_QUEUE, which the polled reader drains (and echoes) instead.
//
// The handler never transmits, so the synchronous context is the only
// writer of the data register in either mode.
// =============================================================================

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::cpu;
use crate::error::Result;
use crate::gic::{self, CpuInterface, IrqNumber, SPURIOUS_IRQ};
use crate::mmio::Mmio;
use crate::platform;
use crate::uart::{self, Pl011};

// =============================================================================
// Receive Queue
// =============================================================================

/// Capacity of the console receive queue (one slot is kept free).
pub const RX_QUEUE_SIZE: usize = 128;

/// Lock-free single-producer/single-consumer byte queue.
///
/// The interrupt handler is the only producer and the polled reader the only
/// consumer, so neither side ever waits on the other.
pub struct RxQueue<const N: usize> {
    data: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: `push` writes only the slot at `head` before publishing it and
// `pop` reads only slots published by `push`, per the single-producer and
// single-consumer contract.
unsafe impl<const N: usize> Sync for RxQueue<N> {}

impl<const N: usize> RxQueue<N> {
    pub const fn new() -> Self {
        Self {
            data: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Append a byte. Returns false (dropping the byte) when full.
    ///
    /// Must only be called from the single producer.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: slot `head` is not visible to the consumer until the store below
        unsafe { (*self.data.get())[head] = byte };
        self.head.store(next, Ordering::Release);
        true
    }

    /// Take the oldest byte. Must only be called from the single consumer.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: slot `tail` was published by the producer's Release store
        let byte = unsafe { (*self.data.get())[tail] };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(byte)
    }
}

/// Bytes received by the console interrupt handler.
pub static RX_QUEUE: RxQueue<RX_QUEUE_SIZE> = RxQueue::new();

static RX_ROUTED: AtomicBool = AtomicBool::new(false);

/// Whether console receive is interrupt driven.
pub fn rx_interrupts_routed() -> bool {
    RX_ROUTED.load(Ordering::Acquire)
}

// =============================================================================
// Routing
// =============================================================================

/// Unmask the core's IRQ line (DAIF.I).
///
/// # Safety
/// Whatever is installed at the IRQ vector must be able to handle an
/// interrupt from this point on.
pub unsafe fn enable_core_interrupts() {
    cpu::enable_interrupts();
}

/// Unmask the console UART's receive interrupt at the peripheral.
pub fn enable_uart_interrupt() {
    uart::enable_rx_interrupt();
}

/// Unmask one line at the platform distributor.
pub fn enable_distributor_line(irq: IrqNumber) {
    gic::distributor().enable_line(irq);
}

/// Hand the data register to the interrupt handler, then run `unmask`.
pub(crate) fn hand_over_then(routed: &AtomicBool, unmask: impl FnOnce()) {
    routed.store(true, Ordering::Release);
    unmask();
}

/// Make console receive interrupt driven, end to end.
///
/// The ownership switch happens before anything is unmasked, so no byte can
/// be consumed by both the poller and the handler.
///
/// # Safety
/// An IRQ vector that ends up calling [`handle_irq`] must be installed.
pub unsafe fn route_console_rx() -> Result<()> {
    let line = IrqNumber::new(platform::UART0_IRQ)?;

    hand_over_then(&RX_ROUTED, || {
        enable_uart_interrupt();
        enable_distributor_line(line);

        gic::distributor().enable();
        gic::cpu_interface().enable();

        // SAFETY: the caller guarantees an IRQ vector is installed
        unsafe { enable_core_interrupts() };
    });

    log::info!("irq: console receive routed through line {}", line.get());
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Service the console UART interrupt.
///
/// Drains and clears the receive cause and queues the byte for the polled
/// reader, which echoes it. Returns the byte, if the UART had one.
pub fn handle_interrupt() -> Option<u8> {
    // Own handle: the synchronous context may hold the console lock
    let uart = Pl011::new(uart::console_regs());
    service_uart(&uart, &RX_QUEUE)
}

pub(crate) fn service_uart<M: Mmio, const N: usize>(
    uart: &Pl011<M>,
    queue: &RxQueue<N>,
) -> Option<u8> {
    let byte = uart.handle_interrupt()?;
    // Dropped when the queue is full
    queue.push(byte);
    Some(byte)
}

/// IRQ entry point: acknowledge, dispatch and complete one interrupt.
pub fn handle_irq() {
    dispatch(&gic::cpu_interface(), handle_interrupt);
}

pub(crate) fn dispatch<M: Mmio>(gicc: &CpuInterface<M>, on_console: impl FnOnce() -> Option<u8>) {
    let iar = gicc.acknowledge();
    let id = iar & 0x3FF; // Lower 10 bits are the ID

    if id == SPURIOUS_IRQ {
        // Don't EOI spurious
        return;
    }
    if id == platform::UART0_IRQ {
        on_console();
    }
    gicc.end_interrupt(iar);
}
