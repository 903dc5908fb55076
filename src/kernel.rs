//! Kernel abstraction: the public face of the scheduler, the semaphores and
//! the event managers.
//!
//! This module provides the main `Kernel` struct. Every operation that
//! touches shared state masks interrupts for its duration, so application
//! threads, the tick interrupt and the context-switch interrupt always see
//! that state whole.

use crate::arch::Arch;
use crate::config::TICK_FREQUENCY_HZ;
use crate::critical;
use crate::errors::{KernelError, KernelResult};
use crate::event::{AperiodicEvent, EventHandler};
use crate::sched::{KernelState, Switch};
use crate::sync::Semaphore;
use crate::thread::{ThreadId, ThreadInfo};
use crate::time::TickCounter;
use portable_atomic::{AtomicBool, AtomicPtr, Ordering};

/// Global kernel reference for interrupt handlers.
static GLOBAL_KERNEL: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

/// Main kernel handle.
///
/// Holds the TCB pool, the stacks, the semaphore registry and the event
/// tables. On hardware it lives in a `static` so the contexts it hands out
/// stay valid:
///
/// ```ignore
/// use tick_rtos::{DefaultArch, Kernel};
///
/// static KERNEL: Kernel<DefaultArch> = Kernel::new(DefaultArch::new());
///
/// fn blink() { loop { /* ... */ KERNEL.sleep(500); } }
///
/// fn kernel_main() -> ! {
///     KERNEL.init();
///     unsafe { KERNEL.register_global() };
///     KERNEL.add_thread(blink, 2, "blink").expect("thread pool has room");
///     let error = KERNEL.launch();
///     panic!("launch failed: {:?}", error);
/// }
/// ```
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
pub struct Kernel<A: Arch> {
    arch: A,
    state: spin::Mutex<KernelState<A>>,
    ticks: TickCounter,
    initialized: AtomicBool,
    launched: AtomicBool,
}

impl<A: Arch> Kernel<A> {
    /// Create a new kernel instance on top of `arch`.
    pub const fn new(arch: A) -> Self {
        Self {
            arch,
            state: spin::Mutex::new(KernelState::new()),
            ticks: TickCounter::new(TICK_FREQUENCY_HZ),
            initialized: AtomicBool::new(false),
            launched: AtomicBool::new(false),
        }
    }

    /// The architecture backend.
    pub fn arch(&self) -> &A {
        &self.arch
    }

    /// Run `f` on the shared state with interrupts masked.
    fn critical<R>(&self, f: impl FnOnce(&mut KernelState<A>) -> R) -> R {
        critical::with(&self.arch, || f(&mut *self.state.lock()))
    }

    /// Initialize the kernel: bring up the interrupt controller and install
    /// the background thread. Calling it again does nothing.
    pub fn init(&self) {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.arch.init();
        self.critical(|state| state.ensure_background());
        klog!("kernel", "initialized, tick {} Hz", self.ticks.frequency());
    }

    /// Check if the kernel has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Start scheduling.
    ///
    /// Installs the tick and enters the highest-priority ready thread. On
    /// hardware a successful launch never returns; the hosted backend records
    /// the first context and returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// `NoThreadsScheduled` if no application thread was added.
    pub fn launch(&self) -> KernelResult<()> {
        self.init();
        if self.launched.load(Ordering::Acquire) {
            return Ok(());
        }

        let first = self.critical(|state| {
            if state.app_threads == 0 {
                return Err(KernelError::NoThreadsScheduled);
            }
            Ok(state.switch())
        })?;

        self.launched.store(true, Ordering::Release);
        klog!("kernel", "launching thread {}", first.thread);
        self.arch.start_tick(self.ticks.frequency());
        // SAFETY: `first.load` points into this kernel's TCB pool, which lives
        // as long as the kernel.
        unsafe { self.arch.start_first_thread(first.load) };
        Ok(())
    }

    /// Whether `launch` has succeeded.
    pub fn is_launched(&self) -> bool {
        self.launched.load(Ordering::Acquire)
    }

    /// Add a thread that starts executing `entry`.
    ///
    /// # Arguments
    ///
    /// * `entry` - Thread body
    /// * `priority` - Lower values are more urgent
    /// * `name` - Debug name, truncated to `MAX_NAME_LEN` bytes
    ///
    /// # Errors
    ///
    /// `ThreadLimitReached` when `MAX_THREADS` threads are alive.
    pub fn add_thread(&self, entry: fn(), priority: u8, name: &str) -> KernelResult<ThreadId> {
        let id = self.critical(|state| state.add_thread(entry, priority, name))?;
        klog!("sched", "added thread {} '{}' priority {}", id, name, priority);
        Ok(id)
    }

    /// Kill the thread with `id`. Killing the running thread switches away
    /// from it; on hardware the call does not return to it.
    ///
    /// # Errors
    ///
    /// `ThreadDoesNotExist` for an unknown id (the background thread
    /// included), `CannotKillLastThread` if it is the only thread left.
    pub fn kill_thread(&self, id: ThreadId) -> KernelResult<()> {
        self.critical(|state| {
            let running = state.kill_thread(id)?;
            if running {
                self.arch.request_context_switch();
            }
            Ok(())
        })?;
        klog!("sched", "killed thread {}", id);
        Ok(())
    }

    /// Kill the running thread.
    pub fn kill_self(&self) -> KernelResult<()> {
        self.kill_thread(self.thread_id())
    }

    /// Kill every thread except the running one.
    ///
    /// # Errors
    ///
    /// `ThreadsIncorrectlyAlive` if the survivors disagree with the ring.
    pub fn kill_all(&self) -> KernelResult<()> {
        self.critical(|state| state.kill_all())?;
        klog!("sched", "killed all threads but {}", self.thread_id());
        Ok(())
    }

    /// Id of the running thread. Before launch, and whenever nothing else is
    /// ready, this is the background thread.
    pub fn thread_id(&self) -> ThreadId {
        self.critical(|state| state.running_id())
    }

    /// Put the running thread to sleep for at least `duration_ms`
    /// milliseconds. The background thread cannot sleep; calls from it are
    /// ignored.
    pub fn sleep(&self, duration_ms: u32) {
        self.critical(|state| {
            let ticks = self.ticks.millis_to_ticks(duration_ms);
            if state.sleep_for(self.ticks.ticks(), ticks) {
                self.arch.request_context_switch();
            }
        });
    }

    /// Allocate a semaphore with counter `initial`.
    ///
    /// # Errors
    ///
    /// `SemaphoreLimitReached` when the registry is full.
    pub fn create_semaphore(&self, initial: i32) -> KernelResult<Semaphore> {
        self.critical(|state| state.semaphores.create(initial))
    }

    /// Reset the counter of `sem` to `value`.
    ///
    /// # Panics
    ///
    /// If `sem` was not issued by this kernel's registry. Handles are plain
    /// indices, so a handle from another kernel that happens to be in range
    /// is not detected.
    pub fn init_semaphore(&self, sem: Semaphore, value: i32) {
        self.critical(|state| state.semaphores.set(sem, value));
    }

    /// Current counter of `sem`, `None` for a handle this kernel never issued.
    pub fn semaphore_value(&self, sem: Semaphore) -> Option<i32> {
        self.critical(|state| state.semaphores.value(sem))
    }

    /// Take one unit of `sem`, blocking the running thread if none is left.
    ///
    /// Blocking marks the thread and pends a context switch; the switch is
    /// taken when the critical section ends. There is no timeout.
    ///
    /// # Panics
    ///
    /// If `sem` was not issued by this kernel's registry. Handles are plain
    /// indices, so a handle from another kernel that happens to be in range
    /// is not detected.
    /// Also if the wait would block the background thread.
    pub fn wait(&self, sem: Semaphore) {
        self.critical(|state| {
            if state.semaphore_wait(sem) {
                self.arch.request_context_switch();
            }
        });
    }

    /// Return one unit of `sem`, unblocking at most one waiter. Returns the
    /// thread that was unblocked.
    ///
    /// # Panics
    ///
    /// If `sem` was not issued by this kernel's registry. Handles are plain
    /// indices, so a handle from another kernel that happens to be in range
    /// is not detected.
    pub fn signal(&self, sem: Semaphore) -> Option<ThreadId> {
        self.critical(|state| state.semaphore_signal(sem))
    }

    /// Run `handler` from the tick interrupt every `period` ticks.
    ///
    /// # Errors
    ///
    /// `EventLimitReached` when `MAX_PERIODIC_EVENTS` are registered.
    pub fn add_periodic_event(&self, handler: EventHandler, period: u32) -> KernelResult<()> {
        self.critical(|state| state.periodic.add(handler, period, self.ticks.ticks()))?;
        klog!("event", "periodic event every {} ticks", period);
        Ok(())
    }

    /// Bind `handler` to interrupt `line` at hardware `priority`.
    ///
    /// # Errors
    ///
    /// `IrqInvalid` for a line outside `A::IRQ_LINES`, `HwiPriorityInvalid`
    /// for a priority not more urgent than `A::KERNEL_PRIORITY`,
    /// `EventLimitReached` when the binding table is full.
    pub fn add_aperiodic_event(&self, handler: EventHandler, priority: u8, line: u32) -> KernelResult<()> {
        if !A::IRQ_LINES.contains(&line) {
            return Err(KernelError::IrqInvalid);
        }
        if priority >= A::KERNEL_PRIORITY {
            return Err(KernelError::HwiPriorityInvalid);
        }
        self.critical(|state| {
            state.aperiodic.bind(AperiodicEvent { line, priority, handler })?;
            self.arch.bind_interrupt(line, priority);
            Ok(())
        })?;
        klog!("event", "interrupt {} bound at priority {}", line, priority);
        Ok(())
    }

    /// Run the handler bound to `line`. Called from the interrupt entry.
    /// Returns whether a handler was bound.
    pub fn dispatch_interrupt(&self, line: u32) -> bool {
        let event = self.critical(|state| state.aperiodic.lookup(line));
        match event {
            Some(event) => {
                (event.handler)();
                true
            }
            None => false,
        }
    }

    /// Tick interrupt body: advance time, wake sleepers, run due periodic
    /// events in registration order, then pend a context switch.
    pub fn tick(&self) {
        let due = self.critical(|state| {
            let now = self.ticks.advance();
            state.wake_sleepers(now);
            state.periodic.collect_due(now)
        });
        due.run();
        self.arch.request_context_switch();
    }

    /// Context-switch interrupt body: select the next thread and make it the
    /// running one. The caller saves into `save` (unless null) and resumes
    /// from `load`.
    pub fn context_switch(&self) -> Switch<A::SavedContext> {
        self.critical(|state| state.switch())
    }

    /// Ticks since launch.
    pub fn system_time(&self) -> u32 {
        self.ticks.ticks()
    }

    /// Live application threads.
    pub fn thread_count(&self) -> usize {
        self.critical(|state| state.app_threads)
    }

    pub fn thread_info(&self, id: ThreadId) -> Option<ThreadInfo> {
        self.critical(|state| state.thread_info(id))
    }

    /// Whether the stack canary of thread `id` is intact.
    pub fn stack_intact(&self, id: ThreadId) -> Option<bool> {
        self.critical(|state| state.stack_intact(id))
    }

    /// Check the ring for breaks and count mismatches.
    pub fn ring_is_consistent(&self) -> bool {
        self.critical(|state| state.ring_is_consistent())
    }

    /// Ids in ring order, starting with the background thread. Returns how
    /// many entries of `out` were filled.
    pub fn ring_order(&self, out: &mut [ThreadId]) -> usize {
        self.critical(|state| state.ring_order(out))
    }

    /// Register this kernel as the global kernel for interrupt handlers.
    ///
    /// # Safety
    ///
    /// The kernel must outlive all interrupt handling (i.e., for the lifetime
    /// of the system), and interrupt entry points must look it up with the
    /// same `A`.
    pub unsafe fn register_global(&'static self) {
        GLOBAL_KERNEL.store(self as *const _ as *mut (), Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn set_system_time(&self, ticks: u32) {
        self.ticks.set(ticks);
    }

    #[cfg(test)]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut KernelState<A>) -> R) -> R {
        self.critical(f)
    }
}

/// Get the global kernel reference (for interrupt handlers).
///
/// Returns None if no kernel has been registered.
///
/// # Safety
///
/// `A` must be the architecture the registered kernel was built with.
pub unsafe fn get_global_kernel<A: Arch>() -> Option<&'static Kernel<A>> {
    let ptr = GLOBAL_KERNEL.load(Ordering::Acquire);
    // SAFETY: only `register_global` stores here, from a `&'static Kernel<A>`.
    unsafe { (ptr as *const Kernel<A>).as_ref() }
}
