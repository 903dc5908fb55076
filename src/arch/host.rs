//! Hosted backend for running the kernel core off-target.
//!
//! There are no maskable interrupts on a development host, so the critical
//! section is emulated by a single "interrupts enabled" flag. Context switch
//! requests, tick installation and interrupt bindings are recorded instead of
//! acted on, which lets a test play the part of the running thread and
//! service the switch interrupt explicitly.

use super::Arch;
use crate::config::TICK_FREQUENCY_HZ;
use core::ops::RangeInclusive;
use portable_atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Interrupt lines the hosted controller exposes.
pub const HOST_IRQ_LINES: u32 = 64;

/// Saved context on the host: only where the thread would start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostContext {
    /// Address of the entry function.
    pub entry: usize,
    /// Initial stack pointer.
    pub sp: usize,
}

/// Hosted architecture implementation.
pub struct HostArch {
    interrupts_enabled: AtomicBool,
    switch_pending: AtomicBool,
    switch_requests: AtomicUsize,
    tick_frequency: AtomicU32,
    bindings: spin::Mutex<[Option<u8>; HOST_IRQ_LINES as usize]>,
    started: spin::Mutex<Option<HostContext>>,
}

impl HostArch {
    pub const fn new() -> Self {
        Self {
            interrupts_enabled: AtomicBool::new(true),
            switch_pending: AtomicBool::new(false),
            switch_requests: AtomicUsize::new(0),
            tick_frequency: AtomicU32::new(0),
            bindings: spin::Mutex::new([None; HOST_IRQ_LINES as usize]),
            started: spin::Mutex::new(None),
        }
    }

    /// Whether the emulated interrupt flag is set.
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled.load(Ordering::Acquire)
    }

    /// Whether a context switch is pending.
    pub fn switch_pending(&self) -> bool {
        self.switch_pending.load(Ordering::Acquire)
    }

    /// Clear the pending switch, returning whether one was pending.
    ///
    /// A pending switch is only taken once interrupts are enabled again.
    pub fn take_switch_request(&self) -> bool {
        self.interrupts_enabled() && self.switch_pending.swap(false, Ordering::AcqRel)
    }

    /// Total number of switch requests seen.
    pub fn switch_requests(&self) -> usize {
        self.switch_requests.load(Ordering::Acquire)
    }

    /// Tick frequency installed by `start_tick`, 0 if never started.
    pub fn tick_frequency(&self) -> u32 {
        self.tick_frequency.load(Ordering::Acquire)
    }

    /// Priority `line` was bound at, if any.
    pub fn binding(&self, line: u32) -> Option<u8> {
        self.bindings.lock().get(line as usize).copied().flatten()
    }

    /// Context handed to `start_first_thread`, if the kernel was launched.
    pub fn started_context(&self) -> Option<HostContext> {
        *self.started.lock()
    }
}

impl Default for HostArch {
    fn default() -> Self {
        Self::new()
    }
}

impl Arch for HostArch {
    type SavedContext = HostContext;
    type IrqState = bool;

    const EMPTY_CONTEXT: HostContext = HostContext { entry: 0, sp: 0 };
    const IRQ_LINES: RangeInclusive<u32> = 0..=HOST_IRQ_LINES - 1;
    const KERNEL_PRIORITY: u8 = 7;

    fn init(&self) {
        self.interrupts_enabled.store(true, Ordering::Release);
        self.switch_pending.store(false, Ordering::Release);
    }

    fn init_context(ctx: &mut HostContext, stack_top: *mut u8, entry: fn()) {
        ctx.entry = entry as usize;
        ctx.sp = stack_top as usize;
    }

    fn save_and_disable_interrupts(&self) -> bool {
        self.interrupts_enabled.swap(false, Ordering::AcqRel)
    }

    fn restore_interrupts(&self, state: bool) {
        self.interrupts_enabled.store(state, Ordering::Release);
    }

    fn request_context_switch(&self) {
        self.switch_pending.store(true, Ordering::Release);
        self.switch_requests.fetch_add(1, Ordering::AcqRel);
    }

    fn bind_interrupt(&self, line: u32, priority: u8) {
        if let Some(slot) = self.bindings.lock().get_mut(line as usize) {
            *slot = Some(priority);
        }
    }

    fn start_tick(&self, frequency_hz: u32) {
        let frequency = if frequency_hz == 0 { TICK_FREQUENCY_HZ } else { frequency_hz };
        self.tick_frequency.store(frequency, Ordering::Release);
    }

    unsafe fn start_first_thread(&self, ctx: *const HostContext) {
        // SAFETY: the caller hands us a pointer into a live TCB slot.
        let ctx = unsafe { ctx.as_ref() }.copied();
        *self.started.lock() = ctx;
    }

    fn wait_for_interrupt() {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() {}

    #[test]
    fn test_switch_request_waits_for_interrupts() {
        let arch = HostArch::new();
        let state = arch.save_and_disable_interrupts();
        arch.request_context_switch();
        assert!(arch.switch_pending());
        assert!(!arch.take_switch_request());
        arch.restore_interrupts(state);
        assert!(arch.take_switch_request());
        assert!(!arch.switch_pending());
        assert_eq!(arch.switch_requests(), 1);
    }

    #[test]
    fn test_init_context_records_entry() {
        let mut ctx = HostArch::EMPTY_CONTEXT;
        let mut stack = [0u8; 64];
        let top = stack.as_mut_ptr().wrapping_add(64);
        HostArch::init_context(&mut ctx, top, entry);
        assert_eq!(ctx.entry, entry as usize);
        assert_eq!(ctx.sp, top as usize);
    }

    #[test]
    fn test_bindings() {
        let arch = HostArch::new();
        arch.bind_interrupt(5, 3);
        assert_eq!(arch.binding(5), Some(3));
        assert_eq!(arch.binding(6), None);
        arch.bind_interrupt(HOST_IRQ_LINES + 1, 3);
        assert_eq!(arch.binding(HOST_IRQ_LINES + 1), None);
    }
}
