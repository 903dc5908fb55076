//! Fixed-size thread stacks with an overflow canary.

use crate::config::{STACK_CANARY, STACK_WORDS};

/// A thread stack.
///
/// One stack belongs to each TCB slot for the lifetime of the kernel; a
/// thread owns it exclusively while it is alive. Stacks grow downwards, so
/// the canary sits in the lowest word.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct Stack {
    words: [usize; STACK_WORDS],
}

impl Stack {
    /// A zeroed stack.
    pub const ZEROED: Stack = Stack { words: [0; STACK_WORDS] };

    /// Get the stack size in bytes.
    pub const fn size(&self) -> usize {
        STACK_WORDS * core::mem::size_of::<usize>()
    }

    /// Get a pointer to the initial stack pointer (highest address), 16-byte
    /// aligned.
    pub fn stack_top(&mut self) -> *mut u8 {
        let base = self.words.as_mut_ptr() as usize;
        let top = (base + self.size()) & !0xF;
        top as *mut u8
    }

    /// Get a pointer to the lowest address of the stack.
    pub fn stack_bottom(&self) -> *const u8 {
        self.words.as_ptr() as *const u8
    }

    /// Clear the stack and install the overflow canary.
    pub fn reset(&mut self) {
        self.words.fill(0);
        self.words[0] = STACK_CANARY;
    }

    /// Check if the stack canary is still intact.
    ///
    /// # Returns
    ///
    /// `true` if the canary is intact, `false` if it has been corrupted.
    pub fn canary_intact(&self) -> bool {
        self.words[0] == STACK_CANARY
    }

    #[cfg(test)]
    pub(crate) fn clobber_canary(&mut self) {
        self.words[0] = 0;
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::ZEROED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_top_is_aligned_and_in_bounds() {
        let mut stack = Stack::ZEROED;
        let bottom = stack.stack_bottom() as usize;
        let top = stack.stack_top() as usize;
        assert_eq!(top & 0xF, 0);
        assert!(top > bottom);
        assert!(top <= bottom + stack.size());
    }

    #[test]
    fn test_stack_canary() {
        let mut stack = Stack::ZEROED;
        assert!(!stack.canary_intact());
        stack.reset();
        assert!(stack.canary_intact());
        stack.clobber_canary();
        assert!(!stack.canary_intact());
    }
}
