//! Compile-time kernel configuration.

/// Maximum number of live application threads.
pub const MAX_THREADS: usize = 25;

/// TCB slots in the pool: every application thread plus the background thread.
pub const THREAD_SLOTS: usize = MAX_THREADS + 1;

/// Maximum number of periodic events.
pub const MAX_PERIODIC_EVENTS: usize = 6;

/// Maximum number of aperiodic (interrupt-bound) events.
pub const MAX_APERIODIC_EVENTS: usize = 16;

/// Maximum number of semaphores the registry can hand out.
pub const MAX_SEMAPHORES: usize = 32;

/// Stack size of every thread, in machine words.
pub const STACK_WORDS: usize = 512;

/// Longest thread name kept, in bytes.
pub const MAX_NAME_LEN: usize = 16;

/// Frequency of the system tick in Hz (1 kHz = 1 ms per tick).
pub const TICK_FREQUENCY_HZ: u32 = 1000;

/// Priority of the background thread. Lower values are more urgent.
pub const BACKGROUND_PRIORITY: u8 = u8::MAX;

/// Value written to the lowest word of every stack to detect overflow.
pub const STACK_CANARY: usize = 0xDEAD_BEEF;
