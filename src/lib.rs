#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(unreachable_pub)]

//! Concurrency core of a small preemptive real-time kernel.
//!
//! A fixed pool of threads is scheduled by priority (lower value is more
//! urgent) with round-robin among equals, on top of a single critical
//! section primitive that masks interrupts. Threads synchronize through
//! counting semaphores and sleep in tick units. Periodic events run from the
//! tick interrupt; aperiodic events are handlers bound to interrupt lines.
//!
//! # Target Platform
//!
//! - **aarch64**: bare-metal port with a GIC-400 and the generic timer
//!   (BCM2837, or QEMU `virt` with the `qemu-virt` feature)
//! - **any other target**: a hosted backend that emulates the interrupt
//!   flag, so the scheduler can be exercised in tests
//!
//! # Quick Start
//!
//! ```ignore
//! use tick_rtos::{DefaultArch, Kernel};
//!
//! static KERNEL: Kernel<DefaultArch> = Kernel::new(DefaultArch::new());
//!
//! fn producer() { /* ... */ }
//! fn consumer() { /* ... */ }
//!
//! fn kernel_main() -> ! {
//!     KERNEL.init();
//!     unsafe { KERNEL.register_global() };
//!     KERNEL.add_thread(producer, 1, "producer").expect("pool has room");
//!     KERNEL.add_thread(consumer, 1, "consumer").expect("pool has room");
//!     let error = KERNEL.launch();
//!     panic!("launch failed: {:?}", error);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`Kernel`] owns all shared state behind a critical section
//! - [`arch::Arch`] is the seam to the interrupt controller and timer
//! - [`sync::Semaphore`] handles name counters in the kernel's registry
//! - [`event`] holds periodic and interrupt-bound handlers

#[macro_use]
mod log;

// Core modules
pub mod arch;
pub mod config;
pub mod critical;
pub mod errors;
pub mod event;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal
#[cfg(all(not(test), target_os = "none"))]
use core::panic::PanicInfo;

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }
    klog!("panic", "{}", info);
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
        #[cfg(not(target_arch = "aarch64"))]
        core::hint::spin_loop();
    }
}

// ============================================================================
// Public API
// ============================================================================

pub use arch::{Arch, DefaultArch};
pub use critical::CriticalSection;
pub use errors::{error_code, KernelError, KernelResult, NO_ERROR};
pub use event::EventHandler;
pub use kernel::{get_global_kernel, Kernel};
pub use sched::Switch;
pub use sync::Semaphore;
pub use thread::{ThreadId, ThreadInfo, ThreadName, ThreadState};
