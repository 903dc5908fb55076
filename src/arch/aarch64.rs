//! AArch64 (ARM64) port: DAIF interrupt masking, generic-timer tick,
//! GIC-400 SGI context-switch requests and the IRQ entry.
//!
//! The platform's exception vector table branches to `tick_rtos_irq_entry`
//! for IRQs taken at EL1h. The entry saves the interrupted thread into the
//! context `IRQ_SAVE_CTX` points at, runs the dispatcher on a dedicated IRQ
//! stack, and resumes whatever context `IRQ_LOAD_CTX` points at afterwards.
//! A context switch is nothing more than the dispatcher moving both pointers.
//!
//! Context layout (`Aarch64Context`):
//! - x[0-30]: offsets 0-240
//! - sp: offset 248
//! - pc: offset 256
//! - pstate: offset 264

use super::aarch64_gic::{Gic400, SPURIOUS_IRQ, SWITCH_PRIORITY, SWITCH_SGI, TIMER_IRQ};
use super::Arch;
use crate::kernel::get_global_kernel;
use core::arch::{asm, global_asm};
use core::ops::RangeInclusive;
use core::ptr::null_mut;
use portable_atomic::{AtomicPtr, AtomicU64, Ordering};

/// Context the IRQ entry saves the interrupted thread into.
pub static IRQ_SAVE_CTX: AtomicPtr<Aarch64Context> = AtomicPtr::new(null_mut());

/// Context the IRQ entry resumes.
pub static IRQ_LOAD_CTX: AtomicPtr<Aarch64Context> = AtomicPtr::new(null_mut());

const IRQ_STACK_SIZE: usize = 4096;

#[repr(C, align(16))]
pub struct IrqStack {
    data: [u8; IRQ_STACK_SIZE],
}

pub static mut IRQ_STACK: IrqStack = IrqStack { data: [0; IRQ_STACK_SIZE] };

/// Generic-timer counts per tick, set by `start_tick`.
static TICK_INTERVAL: AtomicU64 = AtomicU64::new(0);

/// EL1h with D, A, I and F unmasked.
const THREAD_PSTATE: u64 = 0x5;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Aarch64Context {
    pub x: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub pstate: u64,
}

pub struct Aarch64Arch;

impl Aarch64Arch {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for Aarch64Arch {
    fn default() -> Self {
        Self::new()
    }
}

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;
    type IrqState = u64;

    const EMPTY_CONTEXT: Aarch64Context = Aarch64Context {
        x: [0; 31],
        sp: 0,
        pc: 0,
        pstate: THREAD_PSTATE,
    };

    #[cfg(feature = "qemu-virt")]
    const IRQ_LINES: RangeInclusive<u32> = 32..=287;
    #[cfg(not(feature = "qemu-virt"))]
    const IRQ_LINES: RangeInclusive<u32> = 32..=159;

    const KERNEL_PRIORITY: u8 = 0xA0;

    fn init(&self) {
        // SAFETY: called once from `Kernel::init` before interrupts are unmasked.
        unsafe {
            super::uart_pl011::init();
            if !Gic400::init() {
                klog!("arch", "GIC not responding, interrupts unavailable");
                return;
            }
            Gic400::set_priority(SWITCH_SGI, SWITCH_PRIORITY);
            Gic400::enable_irq(SWITCH_SGI);
            Gic400::set_priority(TIMER_IRQ, Self::KERNEL_PRIORITY);
        }
    }

    fn init_context(ctx: &mut Aarch64Context, stack_top: *mut u8, entry: fn()) {
        *ctx = Self::EMPTY_CONTEXT;
        ctx.sp = stack_top as u64;
        ctx.pc = entry as usize as u64;
        // A thread body that returns lands in `thread_exit`.
        ctx.x[30] = thread_exit as usize as u64;
    }

    fn save_and_disable_interrupts(&self) -> u64 {
        let daif: u64;
        // SAFETY: reading DAIF and masking IRQs has no memory effects.
        unsafe {
            asm!(
                "mrs {daif}, daif",
                "msr daifset, #2",
                daif = out(reg) daif,
                options(nomem, nostack)
            );
        }
        daif
    }

    fn restore_interrupts(&self, daif: u64) {
        // SAFETY: `daif` was read by `save_and_disable_interrupts`.
        unsafe {
            asm!("msr daif, {daif}", daif = in(reg) daif, options(nomem, nostack));
        }
    }

    fn request_context_switch(&self) {
        Gic400::send_sgi_to_self(SWITCH_SGI);
    }

    fn bind_interrupt(&self, line: u32, priority: u8) {
        // SAFETY: `line` was checked against `IRQ_LINES` by the kernel.
        unsafe {
            Gic400::set_priority(line, priority);
            Gic400::enable_irq(line);
        }
    }

    fn start_tick(&self, frequency_hz: u32) {
        let freq: u64;
        // SAFETY: CNTFRQ_EL0 is readable at EL1.
        unsafe {
            asm!("mrs {freq}, cntfrq_el0", freq = out(reg) freq, options(nomem, nostack));
        }
        TICK_INTERVAL.store(freq / u64::from(frequency_hz.max(1)), Ordering::Relaxed);
        rearm_timer();
        // SAFETY: the GIC was brought up in `init`.
        unsafe { Gic400::enable_irq(TIMER_IRQ) };
    }

    unsafe fn start_first_thread(&self, ctx: *const Aarch64Context) {
        IRQ_SAVE_CTX.store(ctx as *mut _, Ordering::Release);
        IRQ_LOAD_CTX.store(ctx as *mut _, Ordering::Release);
        // SAFETY: the caller guarantees `ctx` was prepared by `init_context`.
        unsafe {
            asm!(
                "ldr x1, [x0, #256]",
                "msr elr_el1, x1",
                "ldr x1, [x0, #264]",
                "msr spsr_el1, x1",
                "ldr x1, [x0, #248]",
                "mov sp, x1",
                "ldr x30, [x0, #240]",
                "eret",
                in("x0") ctx,
                options(noreturn)
            );
        }
    }

    fn wait_for_interrupt() {
        // SAFETY: wfi only parks the core.
        unsafe { asm!("wfi", options(nomem, nostack)) };
    }
}

fn rearm_timer() {
    let interval = TICK_INTERVAL.load(Ordering::Relaxed);
    // SAFETY: the EL1 physical timer registers are accessible at EL1.
    unsafe {
        asm!(
            "msr cntp_tval_el0, {interval}",
            "msr cntp_ctl_el0, {enable}",
            interval = in(reg) interval,
            enable = in(reg) 1u64,
            options(nomem, nostack)
        );
    }
}

extern "C" fn thread_exit() -> ! {
    // SAFETY: the only kernel this port registers is a `Kernel<Aarch64Arch>`.
    if let Some(kernel) = unsafe { get_global_kernel::<Aarch64Arch>() } {
        if let Err(error) = kernel.kill_self() {
            klog!("sched", "thread {} returned and stays parked: {}", kernel.thread_id(), error);
        }
    }
    loop {
        Aarch64Arch::wait_for_interrupt();
    }
}

/// Dispatcher run by the IRQ entry on the IRQ stack.
extern "C" fn irq_dispatch() {
    // SAFETY: we are in IRQ context with the GIC initialized.
    let irq = unsafe { Gic400::acknowledge_interrupt() };
    if irq == SPURIOUS_IRQ {
        return;
    }

    // SAFETY: the only kernel this port registers is a `Kernel<Aarch64Arch>`.
    if let Some(kernel) = unsafe { get_global_kernel::<Aarch64Arch>() } {
        match irq {
            TIMER_IRQ => {
                rearm_timer();
                kernel.tick();
            }
            SWITCH_SGI => {
                let switch = kernel.context_switch();
                IRQ_SAVE_CTX.store(switch.load as *mut _, Ordering::Release);
                IRQ_LOAD_CTX.store(switch.load as *mut _, Ordering::Release);
            }
            line => {
                if !kernel.dispatch_interrupt(line) {
                    klog!("arch", "unbound interrupt {}", line);
                }
            }
        }
    }

    // SAFETY: `irq` came from `acknowledge_interrupt`.
    unsafe { Gic400::end_interrupt(irq) };
}

global_asm!(
    ".global tick_rtos_irq_entry",
    ".balign 4",
    "tick_rtos_irq_entry:",
    // Park x0-x3, x29, x30, ELR and SPSR on the thread stack.
    "sub sp, sp, #64",
    "stp x0, x1, [sp, #0]",
    "stp x2, x3, [sp, #16]",
    "stp x29, x30, [sp, #32]",
    "mrs x0, elr_el1",
    "mrs x1, spsr_el1",
    "stp x0, x1, [sp, #48]",
    "add x0, sp, #64",
    "mov x2, sp",
    // Switch to the IRQ stack.
    "adrp x29, {irq_stack}",
    "add x29, x29, :lo12:{irq_stack}",
    "add x29, x29, #{stack_size}",
    "mov sp, x29",
    // Save the interrupted thread, unless nothing runs yet.
    "adrp x29, {save_ctx}",
    "add x29, x29, :lo12:{save_ctx}",
    "ldr x29, [x29]",
    "cbz x29, 2f",
    "ldp x3, x1, [x2, #0]",
    "stp x3, x1, [x29, #0]",
    "ldp x3, x1, [x2, #16]",
    "stp x3, x1, [x29, #16]",
    "stp x4, x5, [x29, #32]",
    "stp x6, x7, [x29, #48]",
    "stp x8, x9, [x29, #64]",
    "stp x10, x11, [x29, #80]",
    "stp x12, x13, [x29, #96]",
    "stp x14, x15, [x29, #112]",
    "stp x16, x17, [x29, #128]",
    "stp x18, x19, [x29, #144]",
    "stp x20, x21, [x29, #160]",
    "stp x22, x23, [x29, #176]",
    "stp x24, x25, [x29, #192]",
    "stp x26, x27, [x29, #208]",
    "str x28, [x29, #224]",
    "ldp x3, x1, [x2, #32]",
    "stp x3, x1, [x29, #232]",
    "str x0, [x29, #248]",
    "ldp x3, x1, [x2, #48]",
    "stp x3, x1, [x29, #256]",
    "2:",
    "bl {dispatch}",
    // Resume the selected context.
    "adrp x29, {load_ctx}",
    "add x29, x29, :lo12:{load_ctx}",
    "ldr x29, [x29]",
    "cbz x29, 3f",
    "ldp x0, x1, [x29, #256]",
    "msr elr_el1, x0",
    "msr spsr_el1, x1",
    "ldr x0, [x29, #248]",
    "mov sp, x0",
    "ldp x0, x1, [x29, #0]",
    "ldp x2, x3, [x29, #16]",
    "ldp x4, x5, [x29, #32]",
    "ldp x6, x7, [x29, #48]",
    "ldp x8, x9, [x29, #64]",
    "ldp x10, x11, [x29, #80]",
    "ldp x12, x13, [x29, #96]",
    "ldp x14, x15, [x29, #112]",
    "ldp x16, x17, [x29, #128]",
    "ldp x18, x19, [x29, #144]",
    "ldp x20, x21, [x29, #160]",
    "ldp x22, x23, [x29, #176]",
    "ldp x24, x25, [x29, #192]",
    "ldp x26, x27, [x29, #208]",
    "ldr x28, [x29, #224]",
    "ldr x30, [x29, #240]",
    "ldr x29, [x29, #232]",
    "eret",
    "3:",
    "b 3b",
    irq_stack = sym IRQ_STACK,
    stack_size = const IRQ_STACK_SIZE,
    save_ctx = sym IRQ_SAVE_CTX,
    load_ctx = sym IRQ_LOAD_CTX,
    dispatch = sym irq_dispatch,
);
