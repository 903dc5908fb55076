//! PL011 UART console used by kernel logging.
//!
//! The base address follows the interrupt controller selection: the QEMU
//! `virt` machine maps its PL011 at `0x0900_0000`, the BCM2837 at
//! `0x3F20_1000`.

use core::fmt::{self, Write};
use core::ptr::{read_volatile, write_volatile};

#[cfg(feature = "qemu-virt")]
const UART0_BASE: usize = 0x0900_0000;
#[cfg(not(feature = "qemu-virt"))]
const UART0_BASE: usize = 0x3F20_1000;

const UART0_DR: usize = UART0_BASE;
const UART0_FR: usize = UART0_BASE + 0x18;
const UART0_IBRD: usize = UART0_BASE + 0x24;
const UART0_FBRD: usize = UART0_BASE + 0x28;
const UART0_LCRH: usize = UART0_BASE + 0x2C;
const UART0_CR: usize = UART0_BASE + 0x30;
const UART0_ICR: usize = UART0_BASE + 0x44;

// Transmit FIFO full
const FR_TXFF: u32 = 1 << 5;

/// Configure the UART for 8N1 output with FIFOs enabled.
///
/// # Safety
///
/// Must be called once, before any output, with the UART region mapped.
pub unsafe fn init() {
    unsafe {
        write_volatile(UART0_CR as *mut u32, 0);
        write_volatile(UART0_ICR as *mut u32, 0x7FF);
        // QEMU ignores the divisor; these values suit its 3 MHz reference.
        write_volatile(UART0_IBRD as *mut u32, 1);
        write_volatile(UART0_FBRD as *mut u32, 40);
        // WLEN=8, FEN=1
        write_volatile(UART0_LCRH as *mut u32, (1 << 4) | (1 << 5) | (1 << 6));
        // UARTEN, TXE
        write_volatile(UART0_CR as *mut u32, (1 << 0) | (1 << 8));
    }
}

fn send_byte(byte: u8) {
    // SAFETY: FR and DR are plain MMIO registers of the console UART.
    unsafe {
        while read_volatile(UART0_FR as *const u32) & FR_TXFF != 0 {
            core::hint::spin_loop();
        }
        write_volatile(UART0_DR as *mut u32, byte as u32);
    }
}

/// Console writer for `write!`.
pub struct UartWriter;

impl Write for UartWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                send_byte(b'\r');
            }
            send_byte(byte);
        }
        Ok(())
    }
}

/// Print a formatted string to PL011 UART.
#[macro_export]
macro_rules! pl011_print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::arch::uart_pl011::UartWriter, $($arg)*);
    }};
}

/// Print a formatted string to PL011 UART with a newline.
#[macro_export]
macro_rules! pl011_println {
    () => {
        $crate::pl011_print!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::pl011_print!($($arg)*);
        $crate::pl011_print!("\n");
    }};
}
