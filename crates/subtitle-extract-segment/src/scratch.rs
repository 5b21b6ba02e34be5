use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

use subtitle_extract_types::Coordinate;

/// Per-call working memory for the connected-component pass.
#[derive(Default)]
pub(crate) struct Scratch {
    pub visited: Vec<bool>,
    pub border_marks: Vec<u32>,
    pub stack: Vec<Coordinate>,
    pub members: Vec<Coordinate>,
}

impl Scratch {
    fn reset(&mut self, pixels: usize) {
        self.visited.clear();
        self.visited.resize(pixels, false);
        self.border_marks.clear();
        self.border_marks.resize(pixels, 0);
        self.stack.clear();
        self.members.clear();
    }
}

/// Pool of scratch buffers shared by concurrent `optimize` calls.
#[derive(Default)]
pub(crate) struct ScratchPool {
    idle: Mutex<Vec<Scratch>>,
}

impl ScratchPool {
    /// Hands out a scratch buffer sized for `pixels` with every mark cleared.
    pub fn acquire(&self, pixels: usize) -> ScratchGuard<'_> {
        let mut scratch = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        scratch.reset(pixels);
        ScratchGuard {
            pool: self,
            scratch,
        }
    }

    #[cfg(test)]
    pub fn idle_len(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub(crate) struct ScratchGuard<'a> {
    pool: &'a ScratchPool,
    scratch: Scratch,
}

impl Deref for ScratchGuard<'_> {
    type Target = Scratch;

    fn deref(&self) -> &Scratch {
        &self.scratch
    }
}

impl DerefMut for ScratchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scratch {
        &mut self.scratch
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        let scratch = std::mem::take(&mut self.scratch);
        self.pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(scratch);
    }
}
