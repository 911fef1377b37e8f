use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_blockstore::MemoryBlockstore;

use crate::account::AccountId;
use crate::syscalls::{MemorySyscalls, NoStateError, Syscalls};

/// ActorRuntime bundles the services of the hosting environment (syscalls and blockstore)
#[derive(Clone, Debug)]
pub struct ActorRuntime<S: Syscalls, BS: Blockstore> {
    pub syscalls: S,
    pub blockstore: BS,
}

impl<S: Syscalls, BS: Blockstore> ActorRuntime<S, BS> {
    pub fn new(syscalls: S, blockstore: BS) -> ActorRuntime<S, BS> {
        ActorRuntime { syscalls, blockstore }
    }

    /// Returns the identity of the ledger itself
    pub fn actor_id(&self) -> AccountId {
        self.syscalls.receiver()
    }

    /// Get the root cid of the ledger's state
    pub fn root_cid(&self) -> Result<Cid, NoStateError> {
        self.syscalls.root()
    }

    /// Record the root cid of the ledger's state
    pub fn set_root(&self, cid: &Cid) -> Result<(), NoStateError> {
        self.syscalls.set_root(cid)
    }

    pub fn bs(&self) -> &BS {
        &self.blockstore
    }
}

impl ActorRuntime<MemorySyscalls, MemoryBlockstore> {
    /// Creates an in-process runtime backed by a fresh memory blockstore
    pub fn new_memory_runtime(actor_id: AccountId) -> Self {
        ActorRuntime { syscalls: MemorySyscalls::new(actor_id), blockstore: MemoryBlockstore::default() }
    }
}

/// Convenience impl encapsulating the blockstore functionality
impl<S: Syscalls, BS: Blockstore> Blockstore for ActorRuntime<S, BS> {
    fn get(&self, k: &Cid) -> anyhow::Result<Option<Vec<u8>>> {
        self.blockstore.get(k)
    }

    fn put_keyed(&self, k: &Cid, block: &[u8]) -> anyhow::Result<()> {
        self.blockstore.put_keyed(k, block)
    }
}
