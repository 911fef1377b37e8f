use std::collections::{BTreeMap, BTreeSet};

use anyhow::bail;
use cid::multihash::Code;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::CborStore;
use fvm_ipld_hamt::Hamt;
use fvm_ipld_hamt::{BytesKey, Error as HamtError};
use fvm_shared::bigint::Zero;
use fvm_shared::econ::TokenAmount;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use token_actor_utils::AccountId;

/// Keeps HAMT nodes small for the modest number of accounts a single ledger holds
pub const DEFAULT_HAMT_BIT_WIDTH: u32 = 3;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("ipld hamt error: {0}")]
    IpldHamt(#[from] HamtError),
    #[error("missing state at cid: {0}")]
    MissingState(Cid),
    #[error("underlying serialization error: {0}")]
    Serialization(String),
    #[error("Insufficient balance: {owner} holds {} but {} is required", .balance.atto(), .required.atto())]
    InsufficientBalance { owner: AccountId, balance: TokenAmount, required: TokenAmount },
    #[error("Allowance exceeded: {operator} attempted to use {} of the {} allowance set by {owner}", .required.atto(), .allowance.atto())]
    InsufficientAllowance {
        owner: AccountId,
        operator: AccountId,
        allowance: TokenAmount,
        required: TokenAmount,
    },
    #[error("total supply cannot be negative, cannot apply delta of {delta:?} to {supply:?}")]
    NegativeTotalSupply { supply: TokenAmount, delta: TokenAmount },
    #[error("allowance cannot be negative, cannot set allowance between {owner} and {operator} to {amount:?}")]
    NegativeAllowance { amount: TokenAmount, owner: AccountId, operator: AccountId },
}

#[derive(Error, Debug)]
pub enum StateInvariantError {
    #[error("total supply was negative: {0:?}")]
    SupplyNegative(TokenAmount),
    #[error("the account for {account} had a negative balance of {balance:?}")]
    BalanceNegative { account: AccountId, balance: TokenAmount },
    #[error("the total supply {supply:?} does not match the sum of all balances {balance_sum:?}")]
    BalanceSupplyMismatch { supply: TokenAmount, balance_sum: TokenAmount },
    #[error("a negative allowance of {allowance:?} was specified between {owner} and {operator}")]
    NegativeAllowance { owner: AccountId, operator: AccountId, allowance: TokenAmount },
    #[error("stored a zero balance which should have been removed for {0}")]
    ExplicitZeroBalance(AccountId),
    #[error("stored a zero allowance which should have been removed between {owner} and {operator}")]
    ExplicitZeroAllowance { owner: AccountId, operator: AccountId },
    #[error("stored an allowance map for {0} though they have specified no allowances")]
    ExplicitEmptyAllowance(AccountId),
    #[error("invalid serialized account key {0:?}")]
    InvalidAccountKey(BytesKey),
    #[error("underlying state error {0}")]
    State(#[from] StateError),
}

type Result<T> = std::result::Result<T, StateError>;

type Map<'bs, BS, V> = Hamt<&'bs BS, V, BytesKey>;
type BalanceMap<'bs, BS> = Map<'bs, BS, TokenAmount>;
type AllowanceMap<'bs, BS> = Map<'bs, BS, Cid>;
type OwnerAllowanceMap<'bs, BS> = Map<'bs, BS, TokenAmount>;
type FrozenMap<'bs, BS> = Map<'bs, BS, ()>;

/// Ledger tables as an IPLD structure
///
/// All three tables are keyed by the raw bytes of an [`AccountId`]. Zero balances, zero
/// allowances and empty per-owner allowance maps are never stored.
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct TokenState {
    /// Total supply of token
    pub supply: TokenAmount,
    /// Map<AccountId, TokenAmount> of balances
    pub balances: Cid,
    /// Map<AccountId, Map<AccountId, TokenAmount>>, stored as allowances[owner][operator]
    pub allowances: Cid,
    /// Set of frozen accounts, a Map<AccountId, ()>
    pub frozen: Cid,
    hamt_bit_width: u32,
}

/// Table access for the ledger
///
/// Nothing here knows about owners or frozen participants; those rules belong to the caller.
/// Balances, allowances and supply are kept non-negative.
impl TokenState {
    pub fn new<BS: Blockstore>(store: &BS) -> Result<Self> {
        Self::new_with_bit_width(store, DEFAULT_HAMT_BIT_WIDTH)
    }

    /// Creates empty tables with the given HAMT bit width, which the caller keeps within 1..=8
    ///
    /// The empty roots are flushed to `store`, but the state itself is not saved.
    pub fn new_with_bit_width<BS: Blockstore>(store: &BS, hamt_bit_width: u32) -> Result<Self> {
        Ok(Self {
            supply: TokenAmount::zero(),
            balances: BalanceMap::new_with_bit_width(store, hamt_bit_width).flush()?,
            allowances: AllowanceMap::new_with_bit_width(store, hamt_bit_width).flush()?,
            frozen: FrozenMap::new_with_bit_width(store, hamt_bit_width).flush()?,
            hamt_bit_width,
        })
    }

    pub fn load<BS: Blockstore>(bs: &BS, cid: &Cid) -> Result<Self> {
        bs.get_cbor::<Self>(cid)
            .map_err(|err| StateError::Serialization(err.to_string()))?
            .ok_or(StateError::MissingState(*cid))
    }

    pub fn save<BS: Blockstore>(&self, bs: &BS) -> Result<Cid> {
        bs.put_cbor(self, Code::Blake2b256).map_err(|err| StateError::Serialization(err.to_string()))
    }

    pub fn hamt_bit_width(&self) -> u32 {
        self.hamt_bit_width
    }

    /// Balance of `owner`, zero if it holds nothing
    pub fn get_balance<BS: Blockstore>(&self, bs: &BS, owner: AccountId) -> Result<TokenAmount> {
        let balances = self.get_balance_map(bs)?;
        Ok(balances.get(&account_key(owner))?.cloned().unwrap_or_default())
    }

    /// Adds a signed delta to the balance of `owner` and returns the new balance
    ///
    /// Fails without changing anything if the balance would go negative.
    pub fn change_balance_by<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: AccountId,
        delta: &TokenAmount,
    ) -> Result<TokenAmount> {
        let mut balances = self.get_balance_map(bs)?;
        let key = account_key(owner);
        let balance = balances.get(&key)?.cloned().unwrap_or_default();
        if delta.is_zero() {
            return Ok(balance);
        }

        let updated = &balance + delta;
        if updated.is_negative() {
            return Err(StateError::InsufficientBalance {
                owner,
                balance,
                required: -delta.clone(),
            });
        }

        store_amount(&mut balances, key, &updated)?;
        self.balances = balances.flush()?;
        Ok(updated)
    }

    pub fn get_balance_map<'bs, BS: Blockstore>(&self, bs: &'bs BS) -> Result<BalanceMap<'bs, BS>> {
        Ok(BalanceMap::load_with_bit_width(&self.balances, bs, self.hamt_bit_width)?)
    }

    /// Number of accounts holding a non-zero balance, found by walking the whole table
    pub fn count_balances<BS: Blockstore>(&self, bs: &BS) -> Result<usize> {
        let mut holders = 0;
        self.get_balance_map(bs)?.for_each(|_, _| {
            holders += 1;
            Ok(())
        })?;
        Ok(holders)
    }

    /// Adds a signed delta to the total supply and returns the new supply
    pub fn change_supply_by(&mut self, delta: &TokenAmount) -> Result<&TokenAmount> {
        let updated = &self.supply + delta;
        if updated.is_negative() {
            return Err(StateError::NegativeTotalSupply {
                supply: self.supply.clone(),
                delta: delta.clone(),
            });
        }
        self.supply = updated;
        Ok(&self.supply)
    }

    /// Allowance `owner` has granted `operator`, zero if none was granted
    pub fn get_allowance_between<BS: Blockstore>(
        &self,
        bs: &BS,
        owner: AccountId,
        operator: AccountId,
    ) -> Result<TokenAmount> {
        let Some(owner_map) = self.get_owner_allowance_map(bs, owner)? else {
            return Ok(TokenAmount::zero());
        };
        Ok(owner_map.get(&account_key(operator))?.cloned().unwrap_or_default())
    }

    /// Replaces the allowance between owner and operator, returning the previous one
    ///
    /// A zero amount removes the entry, and the owner's map with it once that map is empty.
    pub fn set_allowance<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: AccountId,
        operator: AccountId,
        amount: &TokenAmount,
    ) -> Result<TokenAmount> {
        if amount.is_negative() {
            return Err(StateError::NegativeAllowance { owner, operator, amount: amount.clone() });
        }

        let mut root = self.get_allowances_map(bs)?;
        let owner_key = account_key(owner);
        let mut owner_map = match root.get(&owner_key)? {
            Some(cid) => OwnerAllowanceMap::load_with_bit_width(cid, bs, self.hamt_bit_width)?,
            // nothing to remove from an owner without allowances
            None if amount.is_zero() => return Ok(TokenAmount::zero()),
            None => OwnerAllowanceMap::new_with_bit_width(bs, self.hamt_bit_width),
        };

        let operator_key = account_key(operator);
        let previous = owner_map.get(&operator_key)?.cloned().unwrap_or_default();
        store_amount(&mut owner_map, operator_key, amount)?;

        if owner_map.is_empty() {
            root.delete(&owner_key)?;
        } else {
            root.set(owner_key, owner_map.flush()?)?;
        }
        self.allowances = root.flush()?;
        Ok(previous)
    }

    /// Removes the allowance between owner and operator, returning what it was
    pub fn revoke_allowance<BS: Blockstore>(
        &mut self,
        bs: &BS,
        owner: AccountId,
        operator: AccountId,
    ) -> Result<TokenAmount> {
        self.set_allowance(bs, owner, operator, &TokenAmount::zero())
    }

    /// Spends `amount` of the allowance `owner` granted `operator`
    ///
    /// Returns the remaining allowance, or fails and leaves the allowance unchanged if it does
    /// not cover `amount`. Spending zero always succeeds.
    pub fn attempt_use_allowance<BS: Blockstore>(
        &mut self,
        bs: &BS,
        operator: AccountId,
        owner: AccountId,
        amount: &TokenAmount,
    ) -> Result<TokenAmount> {
        let allowance = self.get_allowance_between(bs, owner, operator)?;
        if &allowance < amount {
            return Err(StateError::InsufficientAllowance {
                owner,
                operator,
                allowance,
                required: amount.clone(),
            });
        }
        if amount.is_zero() {
            return Ok(allowance);
        }

        let remaining = &allowance - amount;
        self.set_allowance(bs, owner, operator, &remaining)?;
        Ok(remaining)
    }

    /// The allowances `owner` has granted, or None if it has granted none
    pub fn get_owner_allowance_map<'bs, BS: Blockstore>(
        &self,
        bs: &'bs BS,
        owner: AccountId,
    ) -> Result<Option<OwnerAllowanceMap<'bs, BS>>> {
        match self.get_allowances_map(bs)?.get(&account_key(owner))? {
            Some(cid) => {
                Ok(Some(OwnerAllowanceMap::load_with_bit_width(cid, bs, self.hamt_bit_width)?))
            }
            None => Ok(None),
        }
    }

    /// The root allowance table, linking each owner to its own map
    pub fn get_allowances_map<'bs, BS: Blockstore>(
        &self,
        bs: &'bs BS,
    ) -> Result<AllowanceMap<'bs, BS>> {
        Ok(AllowanceMap::load_with_bit_width(&self.allowances, bs, self.hamt_bit_width)?)
    }

    pub fn get_frozen_map<'bs, BS: Blockstore>(&self, bs: &'bs BS) -> Result<FrozenMap<'bs, BS>> {
        Ok(FrozenMap::load_with_bit_width(&self.frozen, bs, self.hamt_bit_width)?)
    }

    pub fn is_frozen<BS: Blockstore>(&self, bs: &BS, account: AccountId) -> Result<bool> {
        Ok(self.get_frozen_map(bs)?.contains_key(&account_key(account))?)
    }

    /// Adds an account to the frozen set
    ///
    /// Returns false if the account was already frozen, in which case the set is unchanged
    pub fn freeze_account<BS: Blockstore>(&mut self, bs: &BS, account: AccountId) -> Result<bool> {
        let mut frozen = self.get_frozen_map(bs)?;
        let previous = frozen.set(account_key(account), ())?;
        self.frozen = frozen.flush()?;
        Ok(previous.is_none())
    }

    /// Removes an account from the frozen set
    ///
    /// Returns false if the account was not frozen
    pub fn unfreeze_account<BS: Blockstore>(
        &mut self,
        bs: &BS,
        account: AccountId,
    ) -> Result<bool> {
        let mut frozen = self.get_frozen_map(bs)?;
        let removed = frozen.delete(&account_key(account))?;
        self.frozen = frozen.flush()?;
        Ok(removed.is_some())
    }

    /// Walks every table and checks the ledger invariants
    ///
    /// - supply, balances and allowances are never negative
    /// - no zero balance, zero allowance or empty owner map is stored
    /// - the balances add up to the supply
    /// - every key decodes to an account id
    ///
    /// Returns a summary of the whole state for further checks by the caller.
    pub fn check_invariants<BS: Blockstore>(
        &self,
        bs: &BS,
    ) -> std::result::Result<StateSummary, StateInvariantError> {
        if self.supply.is_negative() {
            return Err(StateInvariantError::SupplyNegative(self.supply.clone()));
        }

        let mut balances = BTreeMap::new();
        scan(&self.get_balance_map(bs)?, |account, balance: &TokenAmount| {
            if balance.is_negative() {
                return Err(StateInvariantError::BalanceNegative {
                    account,
                    balance: balance.clone(),
                });
            }
            if balance.is_zero() {
                return Err(StateInvariantError::ExplicitZeroBalance(account));
            }
            balances.insert(account, balance.clone());
            Ok(())
        })?;

        let balance_sum = balances.values().fold(TokenAmount::zero(), |sum, b| &sum + b);
        if balance_sum != self.supply {
            return Err(StateInvariantError::BalanceSupplyMismatch {
                supply: self.supply.clone(),
                balance_sum,
            });
        }

        let mut allowances = BTreeMap::new();
        scan(&self.get_allowances_map(bs)?, |owner, cid: &Cid| {
            let owner_map = OwnerAllowanceMap::load_with_bit_width(cid, bs, self.hamt_bit_width)
                .map_err(StateError::from)?;
            if owner_map.is_empty() {
                return Err(StateInvariantError::ExplicitEmptyAllowance(owner));
            }
            scan(&owner_map, |operator, allowance: &TokenAmount| {
                if allowance.is_negative() {
                    return Err(StateInvariantError::NegativeAllowance {
                        owner,
                        operator,
                        allowance: allowance.clone(),
                    });
                }
                if allowance.is_zero() {
                    return Err(StateInvariantError::ExplicitZeroAllowance { owner, operator });
                }
                allowances.insert((owner, operator), allowance.clone());
                Ok(())
            })
        })?;

        let mut frozen = BTreeSet::new();
        scan(&self.get_frozen_map(bs)?, |account, _: &()| {
            frozen.insert(account);
            Ok(())
        })?;

        Ok(StateSummary { total_supply: self.supply.clone(), balances, allowances, frozen })
    }
}

/// Writes a non-negative amount under `key`, deleting the entry instead when the amount is zero
fn store_amount<BS: Blockstore>(
    map: &mut Map<'_, BS, TokenAmount>,
    key: BytesKey,
    amount: &TokenAmount,
) -> Result<()> {
    if amount.is_zero() {
        map.delete(&key)?;
    } else {
        map.set(key, amount.clone())?;
    }
    Ok(())
}

/// Visits every entry of an account-keyed table
///
/// The first key that is not an account id, or the first error from `visit`, stops the walk and
/// is returned as is.
fn scan<BS, V, F>(map: &Hamt<BS, V, BytesKey>, mut visit: F) -> std::result::Result<(), StateInvariantError>
where
    BS: Blockstore,
    V: Serialize + DeserializeOwned,
    F: FnMut(AccountId, &V) -> std::result::Result<(), StateInvariantError>,
{
    let mut failure: Option<StateInvariantError> = None;
    let res = map.for_each(|key, value| {
        let outcome = match decode_account(key) {
            Some(account) => visit(account, value),
            None => Err(StateInvariantError::InvalidAccountKey(key.clone())),
        };
        if let Err(e) = outcome {
            failure = Some(e);
            bail!("invariant failed")
        }
        Ok(())
    });
    match (res, failure) {
        (Ok(()), _) => Ok(()),
        (Err(_), Some(e)) => Err(e),
        (Err(e), None) => Err(StateError::from(e).into()),
    }
}

pub fn account_key(a: AccountId) -> BytesKey {
    BytesKey(a.as_bytes().to_vec())
}

pub fn decode_account(key: &BytesKey) -> Option<AccountId> {
    AccountId::try_from(key.0.as_slice()).ok()
}

/// Everything a state holds, in ordered collections for comparison in checks and tests
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSummary {
    pub total_supply: TokenAmount,
    /// Every non-zero balance
    pub balances: BTreeMap<AccountId, TokenAmount>,
    /// Every non-zero allowance, keyed by (owner, operator)
    pub allowances: BTreeMap<(AccountId, AccountId), TokenAmount>,
    pub frozen: BTreeSet<AccountId>,
}
