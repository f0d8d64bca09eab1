// =============================================================================
// A53 Boot - Entry Assembly
// =============================================================================
// `_start` hands over to the image's `kernel_main`, which never returns.
// =============================================================================

core::arch::global_asm!(include_str!("boot.s"));
