//! Scratch state disciplines of a codec.
//!
//! [`Reentrant`] builds a small workspace for every call and is `Sync`, so one codec can be
//! driven from several threads at once. [`SingleOwner`] keeps a large workspace (buffer,
//! chunk list, compressor objects) alive between calls; it is deliberately `!Sync`, so the
//! compiler rejects sharing it between threads.
use std::{cell::RefCell, fmt::Debug};

use super::deflate::{REENTRANT_BUFFER_SIZE, SINGLE_OWNER_BUFFER_SIZE, Workspace};

pub trait Concurrency: Default + Debug + Send {
    /// Runs `f` with the workspace for one encode or decode call.
    fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Reentrant;

impl Concurrency for Reentrant {
    fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        let mut workspace = Workspace::new(REENTRANT_BUFFER_SIZE);
        f(&mut workspace)
    }
}

#[derive(Debug)]
pub struct SingleOwner {
    workspace: RefCell<Workspace>,
}

impl Default for SingleOwner {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(Workspace::new(SINGLE_OWNER_BUFFER_SIZE)),
        }
    }
}

impl SingleOwner {
    pub fn pending_chunks(&self) -> usize {
        self.workspace.borrow().pending_chunks()
    }
}

impl Concurrency for SingleOwner {
    fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        let mut workspace = self.workspace.borrow_mut();
        let result = f(&mut workspace);
        // chunks must never leak into the next call, whatever the outcome
        workspace.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sync<T: Sync>() {}

    #[test]
    fn reentrant_is_sync() {
        assert_sync::<Reentrant>();
        assert_sync::<crate::codec::Codec<Reentrant>>();
    }

    #[test]
    fn single_owner_keeps_large_buffer() {
        let owner = SingleOwner::default();
        let size = owner.with_workspace(|ws| ws.buffer_size());
        assert_eq!(size, SINGLE_OWNER_BUFFER_SIZE);
        assert_eq!(owner.pending_chunks(), 0);
    }

    #[test]
    fn reentrant_uses_fresh_small_buffer() {
        let size = Reentrant.with_workspace(|ws| ws.buffer_size());
        assert_eq!(size, REENTRANT_BUFFER_SIZE);
    }
}
