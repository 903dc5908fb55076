//! Kernel diagnostics.
//!
//! `klog!` writes a tagged line to the PL011 console on aarch64 targets. On
//! other targets the arguments are still type-checked but nothing is printed.

/// Log a tagged kernel message.
///
/// ```ignore
/// klog!("sched", "added thread {} at priority {}", id, priority);
/// ```
#[macro_export]
macro_rules! klog {
    ($tag:literal, $($arg:tt)*) => {{
        #[cfg(target_arch = "aarch64")]
        $crate::pl011_println!(concat!("[", $tag, "] {}"), format_args!($($arg)*));
        #[cfg(not(target_arch = "aarch64"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
