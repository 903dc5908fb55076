//! Architecture abstraction layer for interrupt masking, context setup and
//! the interrupt controller.
//!
//! The kernel core never touches hardware directly. Everything it needs from
//! the platform (masking interrupts, pending a context switch, binding an
//! interrupt line, starting the tick) goes through [`Arch`].

use core::ops::RangeInclusive;

/// Architecture abstraction trait.
///
/// One implementation exists per supported platform. Saving and restoring a
/// full register file is the platform's business; the kernel only prepares
/// a thread's initial context and hands context pointers to the switch
/// routine.
///
/// # Safety
///
/// Implementations involve direct hardware manipulation. Methods marked as
/// unsafe have preconditions that must be upheld by the caller.
pub trait Arch: Sync {
    /// Saved thread context (register file and stack pointer).
    type SavedContext: Copy + Send;

    /// Interrupt state captured when a critical section is entered.
    type IrqState: Copy;

    /// Context of a TCB slot that has never been started.
    const EMPTY_CONTEXT: Self::SavedContext;

    /// Interrupt lines applications may bind handlers to.
    const IRQ_LINES: RangeInclusive<u32>;

    /// Priority the kernel's own tick and switch interrupts run at. Application
    /// interrupts must use a numerically lower (more urgent) priority.
    const KERNEL_PRIORITY: u8;

    /// Bring up the interrupt controller and anything else the kernel needs
    /// from the platform.
    fn init(&self);

    /// Prepare `ctx` so that resuming it starts executing `entry` with the
    /// stack pointer at `stack_top`.
    fn init_context(ctx: &mut Self::SavedContext, stack_top: *mut u8, entry: fn());

    /// Mask interrupts and return the state they were in.
    fn save_and_disable_interrupts(&self) -> Self::IrqState;

    /// Restore an interrupt state returned by `save_and_disable_interrupts`.
    fn restore_interrupts(&self, state: Self::IrqState);

    /// Pend the context-switch interrupt. It is taken as soon as interrupts
    /// are unmasked.
    fn request_context_switch(&self);

    /// Route interrupt `line` to the CPU at `priority` and enable it.
    fn bind_interrupt(&self, line: u32, priority: u8);

    /// Start the periodic tick at `frequency_hz`.
    fn start_tick(&self, frequency_hz: u32);

    /// Enter the first thread.
    ///
    /// # Safety
    ///
    /// `ctx` must point to a context prepared by `init_context` whose stack
    /// stays valid for the lifetime of the thread. On hardware this does not
    /// return.
    unsafe fn start_first_thread(&self, ctx: *const Self::SavedContext);

    /// Park the CPU until the next interrupt.
    fn wait_for_interrupt();
}

pub mod host;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub mod aarch64_gic;
#[cfg(target_arch = "aarch64")]
pub mod uart_pl011;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

#[cfg(not(target_arch = "aarch64"))]
pub use host::HostArch as DefaultArch;
