use std::sync::Arc;

use fvm_ipld_blockstore::Blockstore;
use parking_lot::Mutex;
use token_actor_utils::syscalls::Syscalls;
use token_actor_utils::AccountId;

use crate::events::TokenEvent;
use crate::ledger::LocalToken;
use crate::token::types::*;
use crate::token::TokenError;

type Result<T> = std::result::Result<T, TokenError>;

/// A ledger shared between threads
///
/// Each operation holds the lock for its whole duration, including the receiver callback of
/// approveAndCall. Receivers re-enter through the `&mut LocalToken` they are handed, never through
/// this handle, so a callback cannot deadlock on the lock its caller holds.
pub struct SharedLocalToken<S: Syscalls, BS: Blockstore> {
    inner: Arc<Mutex<LocalToken<S, BS>>>,
}

impl<S: Syscalls, BS: Blockstore> Clone for SharedLocalToken<S, BS> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: Syscalls, BS: Blockstore> From<LocalToken<S, BS>> for SharedLocalToken<S, BS> {
    fn from(ledger: LocalToken<S, BS>) -> Self {
        Self::new(ledger)
    }
}

impl<S: Syscalls, BS: Blockstore> SharedLocalToken<S, BS> {
    pub fn new(ledger: LocalToken<S, BS>) -> Self {
        Self { inner: Arc::new(Mutex::new(ledger)) }
    }

    /// Runs `f` with exclusive access to the ledger
    pub fn with<R>(&self, f: impl FnOnce(&mut LocalToken<S, BS>) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    pub fn total_supply(&self) -> TotalSupplyReturn {
        self.with(|l| l.total_supply())
    }

    pub fn balance_of(&self, account: &AccountId) -> Result<BalanceReturn> {
        self.with(|l| l.balance_of(account))
    }

    pub fn allowance(&self, params: GetAllowanceParams) -> Result<AllowanceReturn> {
        self.with(|l| l.allowance(params))
    }

    pub fn is_frozen(&self, account: &AccountId) -> Result<bool> {
        self.with(|l| l.is_frozen(account))
    }

    pub fn transfer(&self, caller: &AccountId, params: TransferParams) -> Result<TransferReturn> {
        self.with(|l| l.transfer(caller, params))
    }

    pub fn approve(&self, caller: &AccountId, params: ApproveParams) -> Result<ApproveReturn> {
        self.with(|l| l.approve(caller, params))
    }

    pub fn transfer_from(
        &self,
        caller: &AccountId,
        params: TransferFromParams,
    ) -> Result<TransferFromReturn> {
        self.with(|l| l.transfer_from(caller, params))
    }

    pub fn mint(&self, caller: &AccountId, params: MintParams) -> Result<MintReturn> {
        self.with(|l| l.mint(caller, params))
    }

    pub fn burn(&self, caller: &AccountId, params: BurnParams) -> Result<BurnReturn> {
        self.with(|l| l.burn(caller, params))
    }

    pub fn burn_from(&self, caller: &AccountId, params: BurnFromParams) -> Result<BurnFromReturn> {
        self.with(|l| l.burn_from(caller, params))
    }

    pub fn freeze(&self, caller: &AccountId, params: FreezeParams) -> Result<FreezeReturn> {
        self.with(|l| l.freeze(caller, params))
    }

    pub fn unfreeze(&self, caller: &AccountId, params: FreezeParams) -> Result<FreezeReturn> {
        self.with(|l| l.unfreeze(caller, params))
    }

    pub fn approve_and_call(
        &self,
        caller: &AccountId,
        params: ApproveAndCallParams,
    ) -> Result<ApproveAndCallReturn> {
        self.with(|l| l.approve_and_call(caller, params))
    }

    pub fn take_events(&self) -> Vec<TokenEvent> {
        self.with(|l| l.take_events())
    }
}
