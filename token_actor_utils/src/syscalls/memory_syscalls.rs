use std::cell::RefCell;

use cid::Cid;

use super::{NoStateError, Syscalls};
use crate::account::AccountId;

/// Syscalls for a ledger hosted inside the current process
#[derive(Clone, Default, Debug)]
pub struct MemorySyscalls {
    /// The recorded state root, if any
    pub root: RefCell<Option<Cid>>,
    /// The identity of the ledger itself
    pub actor_id: AccountId,
}

impl MemorySyscalls {
    pub fn new(actor_id: AccountId) -> Self {
        MemorySyscalls { root: RefCell::new(None), actor_id }
    }
}

impl Syscalls for MemorySyscalls {
    fn root(&self) -> Result<Cid, NoStateError> {
        self.root.borrow().ok_or(NoStateError)
    }

    fn set_root(&self, cid: &Cid) -> Result<(), NoStateError> {
        self.root.replace(Some(*cid));
        Ok(())
    }

    fn receiver(&self) -> AccountId {
        self.actor_id
    }
}
