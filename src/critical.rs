//! Critical section guard.
//!
//! The only mutual-exclusion primitive in the kernel: while a
//! [`CriticalSection`] is alive, interrupts are masked on the (single) CPU,
//! so neither the tick nor the context-switch interrupt can observe kernel
//! state halfway through an update.

use crate::arch::Arch;

/// RAII guard that masks interrupts on creation and restores the prior
/// interrupt state when dropped.
///
/// Guards nest by strict pairing: an inner guard restores the state the outer
/// guard left (masked), so interrupts only come back when the outermost guard
/// is dropped.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct CriticalSection<'a, A: Arch> {
    arch: &'a A,
    prior: A::IrqState,
}

impl<'a, A: Arch> CriticalSection<'a, A> {
    /// Mask interrupts, remembering whether they were enabled.
    #[inline]
    pub fn enter(arch: &'a A) -> Self {
        let prior = arch.save_and_disable_interrupts();
        Self { arch, prior }
    }
}

impl<A: Arch> Drop for CriticalSection<'_, A> {
    #[inline]
    fn drop(&mut self) {
        self.arch.restore_interrupts(self.prior);
    }
}

/// Run `f` with interrupts masked.
#[inline]
pub fn with<A: Arch, R>(arch: &A, f: impl FnOnce() -> R) -> R {
    let _cs = CriticalSection::enter(arch);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::host::HostArch;

    #[test]
    fn test_guard_masks_and_restores() {
        let arch = HostArch::new();
        assert!(arch.interrupts_enabled());
        {
            let _cs = CriticalSection::enter(&arch);
            assert!(!arch.interrupts_enabled());
        }
        assert!(arch.interrupts_enabled());
    }

    #[test]
    fn test_nested_guard_does_not_reenable_early() {
        let arch = HostArch::new();
        let outer = CriticalSection::enter(&arch);
        {
            let _inner = CriticalSection::enter(&arch);
            assert!(!arch.interrupts_enabled());
        }
        assert!(!arch.interrupts_enabled());
        drop(outer);
        assert!(arch.interrupts_enabled());
    }

    #[test]
    fn test_with_returns_closure_value() {
        let arch = HostArch::new();
        let value = with(&arch, || {
            assert!(!arch.interrupts_enabled());
            7
        });
        assert_eq!(value, 7);
        assert!(arch.interrupts_enabled());
    }
}
