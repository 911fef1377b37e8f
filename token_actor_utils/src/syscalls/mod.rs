use cid::Cid;
use thiserror::Error;

use crate::account::AccountId;

pub mod memory_syscalls;

pub use memory_syscalls::MemorySyscalls;

#[derive(Copy, Clone, Debug, Error)]
#[error("ledger has no state root recorded")]
pub struct NoStateError;

/// The Syscalls trait defines the services the ledger needs from its hosting environment
pub trait Syscalls {
    /// Get the state root. Fails if no root has been recorded yet (before the first call to
    /// `set_root`).
    fn root(&self) -> Result<Cid, NoStateError>;

    /// Record a new state root
    fn set_root(&self, cid: &Cid) -> Result<(), NoStateError>;

    /// Returns the identity the ledger itself runs under
    fn receiver(&self) -> AccountId;
}
