//! GIC-400 (GICv2) distributor and CPU interface.
//!
//! The kernel uses three kinds of interrupt here: the EL1 physical timer
//! (PPI 30) for the tick, software-generated interrupt 0 as the
//! context-switch request, and shared peripheral interrupts for aperiodic
//! events.
//!
//! The GIC addresses differ between platforms:
//!
//! - **BCM2837**: `0xFF84_1000` / `0xFF84_2000`
//! - **QEMU virt machine** (`qemu-virt` feature): `0x0800_0000` / `0x0801_0000`

use core::ptr::{read_volatile, write_volatile};

#[cfg(feature = "qemu-virt")]
const GICD_BASE: usize = 0x0800_0000;
#[cfg(feature = "qemu-virt")]
const GICC_BASE: usize = 0x0801_0000;

#[cfg(not(feature = "qemu-virt"))]
const GICD_BASE: usize = 0xFF84_1000;
#[cfg(not(feature = "qemu-virt"))]
const GICC_BASE: usize = 0xFF84_2000;

// Distributor registers
const GICD_CTLR: usize = 0x000;
const GICD_TYPER: usize = 0x004;
const GICD_ISENABLER: usize = 0x100;
const GICD_ICENABLER: usize = 0x180;
const GICD_ICPENDR: usize = 0x280;
const GICD_IPRIORITYR: usize = 0x400;
const GICD_ITARGETSR: usize = 0x800;
const GICD_SGIR: usize = 0xF00;

// CPU interface registers
const GICC_CTLR: usize = 0x000;
const GICC_PMR: usize = 0x004;
const GICC_BPR: usize = 0x008;
const GICC_IAR: usize = 0x00C;
const GICC_EOIR: usize = 0x010;

/// EL1 physical timer interrupt.
pub const TIMER_IRQ: u32 = 30;
/// Software-generated interrupt used to request a context switch.
pub const SWITCH_SGI: u32 = 0;
/// Interrupt ID returned by IAR when nothing is pending.
pub const SPURIOUS_IRQ: u32 = 1023;

/// Priority of the context-switch SGI: the least urgent level, so it runs
/// after every other pending interrupt.
pub const SWITCH_PRIORITY: u8 = 0xF0;

pub struct Gic400;

impl Gic400 {
    /// Reset the distributor and bring up the CPU interface for CPU 0.
    ///
    /// Returns false if the distributor does not respond.
    ///
    /// # Safety
    ///
    /// Must be called once with interrupts masked and the GIC region mapped.
    pub unsafe fn init() -> bool {
        let typer = unsafe { read_volatile((GICD_BASE + GICD_TYPER) as *const u32) };
        if typer == 0xFFFF_FFFF || typer == 0 {
            return false;
        }
        let num_irqs = ((typer & 0x1F) + 1) * 32;

        unsafe {
            write_volatile((GICD_BASE + GICD_CTLR) as *mut u32, 0);

            for word in 0..(num_irqs / 32) as usize {
                write_volatile((GICD_BASE + GICD_ICENABLER + word * 4) as *mut u32, 0xFFFF_FFFF);
                write_volatile((GICD_BASE + GICD_ICPENDR + word * 4) as *mut u32, 0xFFFF_FFFF);
            }
            // Everything starts at the lowest priority.
            for irq in (0..num_irqs as usize).step_by(4) {
                write_volatile((GICD_BASE + GICD_IPRIORITYR + irq) as *mut u32, 0xFFFF_FFFF);
            }
            // SPIs go to CPU 0; SGIs and PPIs are banked per CPU.
            for irq in (32..num_irqs as usize).step_by(4) {
                write_volatile((GICD_BASE + GICD_ITARGETSR + irq) as *mut u32, 0x0101_0101);
            }

            write_volatile((GICD_BASE + GICD_CTLR) as *mut u32, 1);

            write_volatile((GICC_BASE + GICC_PMR) as *mut u32, 0xFF);
            write_volatile((GICC_BASE + GICC_BPR) as *mut u32, 0);
            write_volatile((GICC_BASE + GICC_CTLR) as *mut u32, 1);
        }
        true
    }

    /// Enable interrupt `irq`.
    ///
    /// # Safety
    ///
    /// Must be called after `init`. `irq` must be below the GIC's line count.
    pub unsafe fn enable_irq(irq: u32) {
        let reg = GICD_BASE + GICD_ISENABLER + (irq / 32) as usize * 4;
        unsafe { write_volatile(reg as *mut u32, 1 << (irq % 32)) };
    }

    /// Set the priority of `irq` (0 = most urgent).
    ///
    /// # Safety
    ///
    /// Must be called after `init`. `irq` must be below the GIC's line count.
    pub unsafe fn set_priority(irq: u32, priority: u8) {
        let offset = irq as usize;
        let shift = (offset & 3) * 8;
        let reg = (GICD_BASE + GICD_IPRIORITYR + (offset & !3)) as *mut u32;
        unsafe {
            let mut val = read_volatile(reg);
            val &= !(0xFF << shift);
            val |= (priority as u32) << shift;
            write_volatile(reg, val);
        }
    }

    /// Pend software-generated interrupt `sgi` on the calling CPU.
    pub fn send_sgi_to_self(sgi: u32) {
        // TargetListFilter = 0b10: forward only to the requesting CPU.
        let value = (0b10 << 24) | (sgi & 0xF);
        // SAFETY: GICD_SGIR is write-only and has no side effects beyond
        // pending the SGI.
        unsafe { write_volatile((GICD_BASE + GICD_SGIR) as *mut u32, value) };
    }

    /// Acknowledge the highest-priority pending interrupt and return its ID.
    ///
    /// # Safety
    ///
    /// Must be called from interrupt context; every acknowledged ID other
    /// than `SPURIOUS_IRQ` must be passed to `end_interrupt`.
    #[inline]
    pub unsafe fn acknowledge_interrupt() -> u32 {
        unsafe { read_volatile((GICC_BASE + GICC_IAR) as *const u32) & 0x3FF }
    }

    /// Signal end of interrupt for `irq`.
    ///
    /// # Safety
    ///
    /// `irq` must have been returned by `acknowledge_interrupt`.
    #[inline]
    pub unsafe fn end_interrupt(irq: u32) {
        unsafe { write_volatile((GICC_BASE + GICC_EOIR) as *mut u32, irq) };
    }
}
