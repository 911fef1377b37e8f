use std::ops::Neg;

use cid::Cid;
pub use error::{ErrorKind, TokenError};
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::econ::TokenAmount;
use token_actor_utils::receiver::{ReceiverHook, ReceiverHookError};
use token_actor_utils::syscalls::Syscalls;
use token_actor_utils::util::ActorRuntime;
use token_actor_utils::AccountId;

use self::state::{StateError as TokenStateError, StateSummary, TokenState};
use self::types::{
    ApproveAndCallIntermediate, ApproveAndCallReturn, ApproveReturn, BurnFromReturn, BurnReturn,
    MintReturn, TransferFromReturn, TransferReturn,
};
use crate::receiver::{ApprovalReceived, ApprovalReceiverHook};

mod error;
pub mod state;
pub mod types;

/// Largest number of bits any amount, balance or supply may occupy
pub const MAX_AMOUNT_BITS: u64 = 256;

type Result<T> = std::result::Result<T, TokenError>;

/// Library functions that implement the ledger's balance, allowance and freeze mechanics
///
/// Holds injectable services to access/interface with the IPLD layer. Ownership rules are left to
/// the caller; everything else (argument validation, frozen participants, balances and allowances)
/// is enforced here.
pub struct Token<'st, S, BS>
where
    S: Syscalls,
    BS: Blockstore,
{
    /// Runtime services to interact with the execution environment
    runtime: &'st ActorRuntime<S, BS>,
    /// Reference to token state that will be inspected/mutated
    state: &'st mut TokenState,
}

impl<'st, S, BS> Token<'st, S, BS>
where
    S: Syscalls,
    BS: Blockstore,
{
    /// Creates a new clean token state instance, specifying the underlying Hamt bit widths
    pub fn create_state_with_bit_width(bs: &BS, hamt_bit_width: u32) -> Result<TokenState> {
        Ok(TokenState::new_with_bit_width(bs, hamt_bit_width)?)
    }

    /// Wrap an existing token state
    pub fn wrap(runtime: &'st ActorRuntime<S, BS>, state: &'st mut TokenState) -> Self {
        Self { runtime, state }
    }

    /// Flush state and return Cid for root
    pub fn flush(&mut self) -> Result<Cid> {
        Ok(self.state.save(self.runtime)?)
    }

    /// Get a reference to the wrapped state tree
    pub fn state(&self) -> &TokenState {
        self.state
    }

    /// Get a reference to the underlying runtime
    pub fn runtime(&self) -> &ActorRuntime<S, BS> {
        self.runtime
    }

    /// Opens an atomic transaction on TokenState which allows a closure to make multiple
    /// modifications to the state tree.
    ///
    /// If the closure returns an error, the transaction is dropped atomically and no change is
    /// observed on token state.
    fn transaction<F, Res>(&mut self, f: F) -> Result<Res>
    where
        F: FnOnce(&mut TokenState, &ActorRuntime<S, BS>) -> Result<Res>,
    {
        let mut mutable_state = self.state.clone();
        let res = f(&mut mutable_state, self.runtime)?;
        // if closure didn't error, save state
        *self.state = mutable_state;
        Ok(res)
    }

    /// The zero sentinel stands for "no account" and never receives tokens
    fn ensure_recipient(to: AccountId) -> Result<()> {
        if to.is_zero() {
            return Err(TokenError::InvalidRecipient(to));
        }
        Ok(())
    }

    /// Fails with AccountFrozen on the first frozen account among the participants
    fn ensure_not_frozen(&self, participants: &[AccountId]) -> Result<()> {
        for account in participants {
            if self.state.is_frozen(self.runtime, *account)? {
                return Err(TokenError::AccountFrozen(*account));
            }
        }
        Ok(())
    }
}

impl<'st, S, BS> Token<'st, S, BS>
where
    S: Syscalls,
    BS: Blockstore,
{
    /// Mints the specified value of tokens into an account
    ///
    /// The mint amount must be non-negative and the recipient must be neither frozen nor the zero
    /// sentinel. Fails with
    /// AmountOverflow if the total supply would no longer fit in 256 bits.
    pub fn mint(&mut self, to: AccountId, amount: &TokenAmount) -> Result<MintReturn> {
        let amount = validate_amount(amount, "mint")?;
        Self::ensure_recipient(to)?;
        self.ensure_not_frozen(&[to])?;

        // Increase the balance of the recipient and increase total supply
        self.transaction(|state, bs| {
            let balance = state.change_balance_by(bs, to, amount)?;
            let supply = state.change_supply_by(amount)?;
            if supply.atto().bits() > MAX_AMOUNT_BITS {
                return Err(TokenError::AmountOverflow {
                    name: "total supply",
                    amount: supply.clone(),
                });
            }
            Ok(MintReturn { balance, supply: supply.clone() })
        })
    }

    /// Gets the total number of tokens in existence
    ///
    /// This equals the sum of `balance_of` called on all accounts. This equals sum of all
    /// successful `mint` calls minus the sum of all successful `burn`/`burn_from` calls
    pub fn total_supply(&self) -> TokenAmount {
        self.state.supply.clone()
    }

    /// Returns the balance associated with a particular account
    ///
    /// Accounts that have never received transfers implicitly have a zero-balance
    pub fn balance_of(&self, owner: AccountId) -> Result<TokenAmount> {
        Ok(self.state.get_balance(self.runtime, owner)?)
    }

    /// Gets the allowance between owner and spender
    ///
    /// An allowance is the amount that the spender can transfer or burn out of the owner's account
    /// via the `transfer_from` and `burn_from` methods.
    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> Result<TokenAmount> {
        Ok(self.state.get_allowance_between(self.runtime, owner, spender)?)
    }

    pub fn is_frozen(&self, account: AccountId) -> Result<bool> {
        Ok(self.state.is_frozen(self.runtime, account)?)
    }

    /// Sets the allowance between owner and spender to a specified amount
    ///
    /// - Neither owner nor spender may be frozen
    /// - The allowance MUST NOT exceed the owner's current balance
    ///
    /// Approving zero removes the allowance entry entirely.
    pub fn approve(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        amount: &TokenAmount,
    ) -> Result<ApproveReturn> {
        let amount = validate_amount(amount, "approve amount")?;
        self.ensure_not_frozen(&[owner, spender])?;

        self.transaction(|state, bs| {
            let balance = state.get_balance(bs, owner)?;
            if balance.lt(amount) {
                return Err(TokenStateError::InsufficientBalance {
                    owner,
                    balance,
                    required: amount.clone(),
                }
                .into());
            }
            let previous = state.set_allowance(bs, owner, spender, amount)?;
            Ok(ApproveReturn { previous, allowance: amount.clone() })
        })
    }

    /// Burns an amount of token from the specified account, decreasing total token supply
    ///
    /// - The requested value MUST be non-negative
    /// - The requested value MUST NOT exceed the target's balance
    /// - The owner MUST NOT be frozen
    ///
    /// Upon successful burn
    /// - The target's balance decreases by the requested value
    /// - The total_supply decreases by the requested value
    pub fn burn(&mut self, owner: AccountId, amount: &TokenAmount) -> Result<BurnReturn> {
        let amount = validate_amount(amount, "burn")?;
        self.ensure_not_frozen(&[owner])?;

        self.transaction(|state, bs| {
            // attempt to burn the requested amount
            let new_amount = state.change_balance_by(bs, owner, &amount.clone().neg())?;
            // decrease total_supply
            state.change_supply_by(&amount.neg())?;
            Ok(BurnReturn { balance: new_amount })
        })
    }

    /// Burns an amount of token from the specified account on behalf of a spender
    ///
    /// - The requested value MUST be non-negative
    /// - Neither spender nor owner may be frozen
    /// - The spender MUST have an allowance not less than the requested value
    /// - The requested value MUST NOT exceed the target's balance
    ///
    /// Upon successful burn
    /// - The target's balance decreases by the requested value
    /// - The total_supply decreases by the requested value
    /// - The spender's allowance is decreased by the requested value
    pub fn burn_from(
        &mut self,
        spender: AccountId,
        owner: AccountId,
        amount: &TokenAmount,
    ) -> Result<BurnFromReturn> {
        let amount = validate_amount(amount, "burn")?;
        self.ensure_not_frozen(&[spender, owner])?;

        self.transaction(|state, bs| {
            let new_allowance = state.attempt_use_allowance(bs, spender, owner, amount)?;
            // attempt to burn the requested amount
            let new_balance = state.change_balance_by(bs, owner, &amount.clone().neg())?;
            // decrease total_supply
            state.change_supply_by(&amount.neg())?;
            Ok(BurnFromReturn { balance: new_balance, allowance: new_allowance })
        })
    }

    /// Transfers an amount from one account to another
    ///
    /// - The requested value MUST be non-negative
    /// - The recipient MUST NOT be the zero sentinel
    /// - Neither sender nor recipient may be frozen
    /// - The requested value MUST NOT exceed the sender's balance
    ///
    /// Upon successful transfer:
    /// - The from balance decreases by the requested value
    /// - The to balance increases by the requested value
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: &TokenAmount,
    ) -> Result<TransferReturn> {
        let amount = validate_amount(amount, "transfer")?;
        Self::ensure_recipient(to)?;
        self.ensure_not_frozen(&[from, to])?;

        self.transaction(|state, bs| {
            move_balance(state, bs, from, to, amount)?;
            Ok(TransferReturn {
                from_balance: state.get_balance(bs, from)?,
                to_balance: state.get_balance(bs, to)?,
            })
        })
    }

    /// Transfers an amount from one account to another, spending the spender's allowance
    ///
    /// - The requested value MUST be non-negative
    /// - The recipient MUST NOT be the zero sentinel
    /// - None of spender, sender or recipient may be frozen
    /// - The spender MUST have an allowance not less than the requested value
    /// - The requested value MUST NOT exceed the sender's balance
    ///
    /// Upon successful transfer:
    /// - The from balance decreases by the requested value
    /// - The to balance increases by the requested value
    /// - The from-spender allowance decreases by the requested value
    pub fn transfer_from(
        &mut self,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: &TokenAmount,
    ) -> Result<TransferFromReturn> {
        let amount = validate_amount(amount, "transfer")?;
        Self::ensure_recipient(to)?;
        self.ensure_not_frozen(&[spender, from, to])?;

        self.transaction(|state, bs| {
            let allowance = state.attempt_use_allowance(bs, spender, from, amount)?;
            move_balance(state, bs, from, to, amount)?;
            Ok(TransferFromReturn {
                from_balance: state.get_balance(bs, from)?,
                to_balance: state.get_balance(bs, to)?,
                allowance,
            })
        })
    }

    /// Adds an account to the frozen set, returning whether it was newly frozen
    ///
    /// Authorisation is left to the caller.
    pub fn freeze(&mut self, target: AccountId) -> Result<bool> {
        self.transaction(|state, bs| Ok(state.freeze_account(bs, target)?))
    }

    /// Removes an account from the frozen set, returning whether it had been frozen
    ///
    /// Authorisation is left to the caller.
    pub fn unfreeze(&mut self, target: AccountId) -> Result<bool> {
        self.transaction(|state, bs| Ok(state.unfreeze_account(bs, target)?))
    }

    /// Sets an allowance as `approve` does and prepares a notification for the spender
    ///
    /// Returns a ReceiverHook to call the spender's receiver. ReceiverHook must be called or it will
    /// panic and abort the transaction. The hook call returns an ApproveAndCallIntermediate which
    /// must be passed to approve_and_call_return to get the final return data.
    pub fn approve_and_call(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        amount: &TokenAmount,
        data: RawBytes,
    ) -> Result<ReceiverHook<ApproveAndCallIntermediate>> {
        let ret = self.approve(owner, spender, amount)?;

        let params = ApprovalReceived {
            approver: owner,
            spender,
            token: self.runtime.actor_id(),
            amount: ret.allowance,
            data,
        };
        let intermediate =
            ApproveAndCallIntermediate { owner, spender, recipient_data: RawBytes::default() };

        ReceiverHook::new_approval(spender, params, intermediate).map_err(|source| match source {
            ReceiverHookError::IpldEncoding(e) => TokenError::Serialization(e),
            source => TokenError::CallbackRejected { spender, source },
        })
    }

    /// Generate ApproveAndCallReturn from the intermediate data returned by a receiver hook call
    ///
    /// The allowance is read after the hook so that anything the spender drew on during the
    /// callback is reflected.
    pub fn approve_and_call_return(
        &self,
        intermediate: ApproveAndCallIntermediate,
    ) -> Result<ApproveAndCallReturn> {
        Ok(ApproveAndCallReturn {
            allowance: self.allowance(intermediate.owner, intermediate.spender)?,
            recipient_data: intermediate.recipient_data,
        })
    }

    /// Checks the state invariants, returning a summary of the state or the first violation found
    pub fn check_invariants(&self) -> Result<StateSummary> {
        Ok(self.state.check_invariants(self.runtime)?)
    }
}

/// Debits `from` and credits `to`
///
/// When `from == to` balances are left untouched, but the transfer must still not exceed the
/// balance.
fn move_balance<BS: Blockstore>(
    state: &mut TokenState,
    bs: &BS,
    from: AccountId,
    to: AccountId,
    amount: &TokenAmount,
) -> Result<()> {
    if from == to {
        let balance = state.get_balance(bs, from)?;
        if balance.lt(amount) {
            return Err(TokenStateError::InsufficientBalance {
                owner: from,
                balance,
                required: amount.clone(),
            }
            .into());
        }
        return Ok(());
    }
    state.change_balance_by(bs, from, &amount.clone().neg())?;
    state.change_balance_by(bs, to, amount)?;
    Ok(())
}

/// Validates that a token amount is non-negative and fits in 256 bits
///
/// Returns the argument, or an error.
pub fn validate_amount<'a>(a: &'a TokenAmount, name: &'static str) -> Result<&'a TokenAmount> {
    if a.is_negative() {
        return Err(TokenError::InvalidNegative { name, amount: a.clone() });
    }
    if a.atto().bits() > MAX_AMOUNT_BITS {
        return Err(TokenError::AmountOverflow { name, amount: a.clone() });
    }
    Ok(a)
}

/// Returns the amount of base units corresponding to `whole` tokens at the given decimals
///
/// Fails with AmountOverflow if the result does not fit in 256 bits.
pub fn scale_whole_units(whole: u64, decimals: u8) -> Result<TokenAmount> {
    let factor = fvm_shared::bigint::BigInt::from(10u8).pow(u32::from(decimals));
    let amount = TokenAmount::from_atto(factor * whole);
    validate_amount(&amount, "initial supply")?;
    Ok(amount)
}

impl<'st, S, BS> std::fmt::Debug for Token<'st, S, BS>
where
    S: Syscalls,
    BS: Blockstore,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token").field("state", &self.state).finish_non_exhaustive()
    }
}
