// =============================================================================
// A53 Boot - Diagnostics
// =============================================================================
// Hex rendering of addresses and descriptors for the console.
// =============================================================================

use core::fmt;

use crate::mmu::Descriptor;
use crate::println;

/// Displays a value as `0x` followed by 16 upper-case hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex(pub u64);

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

/// Print an address on its own line.
pub fn print_address(addr: u64) {
    println!("{}", Hex(addr));
}

/// Print the first `count` entries of a translation table.
pub fn dump_table(name: &str, entries: &[Descriptor], count: usize) {
    println!("{} @ {}", name, Hex(entries.as_ptr() as u64));
    for (index, entry) in entries.iter().take(count).enumerate() {
        println!("  [{:3}] {}", index, Hex(entry.bits()));
    }
}
