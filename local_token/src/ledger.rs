use std::collections::HashMap;
use std::sync::Arc;

use cid::multihash::Code;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::CborStore;
use fvm_shared::econ::TokenAmount;
use token_actor_utils::receiver::UniversalReceiver;
use token_actor_utils::syscalls::Syscalls;
use token_actor_utils::util::ActorRuntime;
use token_actor_utils::AccountId;
use tracing::{debug, info, warn};

use crate::access::AccessControl;
use crate::config::TokenConfig;
use crate::events::{EventLog, TokenEvent};
use crate::token::state::{StateError, StateSummary, TokenState, DEFAULT_HAMT_BIT_WIDTH};
use crate::token::types::{
    AllowanceReturn, ApproveAndCallParams, ApproveAndCallReturn, ApproveParams, ApproveReturn,
    BalanceReturn, BurnFromParams, BurnFromReturn, BurnParams, BurnReturn, ConstructorParams,
    FreezeParams, FreezeReturn, GetAllowanceParams, LocalTokenApi, MintParams, MintReturn,
    TotalSupplyReturn, TransferFromParams, TransferFromReturn, TransferParams, TransferReturn,
};
use crate::token::{scale_whole_units, validate_amount, Token, TokenError};

type Result<T> = std::result::Result<T, TokenError>;

/// A receiver registered for an account, able to re-enter the ledger that notifies it
pub type LedgerReceiver<S, BS> = Arc<dyn UniversalReceiver<LocalToken<S, BS>> + Send + Sync>;

#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct LocalTokenState {
    /// Balances, allowances, frozen set and supply
    pub token: TokenState,
    pub access: AccessControl,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl LocalTokenState {
    fn load<BS: Blockstore>(bs: &BS, cid: &Cid) -> Result<Self> {
        match bs.get_cbor::<Self>(cid) {
            Ok(Some(s)) => Ok(s),
            Ok(None) => Err(StateError::MissingState(*cid).into()),
            Err(e) => Err(StateError::Serialization(e.to_string()).into()),
        }
    }
}

/// A freezable, owner-administered token ledger hosted in-process
///
/// Every operation is all-or-nothing: it either commits its state change and appends its events,
/// or returns an error and leaves both untouched.
pub struct LocalToken<S: Syscalls, BS: Blockstore> {
    runtime: ActorRuntime<S, BS>,
    state: LocalTokenState,
    events: EventLog,
    receivers: HashMap<AccountId, LedgerReceiver<S, BS>>,
}

impl<S: Syscalls, BS: Blockstore> LocalToken<S, BS> {
    /// Creates a ledger owned by `deployer` and mints the whole initial supply to it
    ///
    /// The initial supply is given in whole tokens and scaled by `10^decimals`. The new state is
    /// saved and recorded as the runtime's root.
    pub fn construct(
        runtime: ActorRuntime<S, BS>,
        deployer: AccountId,
        params: ConstructorParams,
    ) -> Result<Self> {
        Self::construct_with_bit_width(runtime, deployer, params, DEFAULT_HAMT_BIT_WIDTH)
    }

    /// Creates a ledger from a validated deployment config
    pub fn from_config(
        runtime: ActorRuntime<S, BS>,
        deployer: AccountId,
        config: &TokenConfig,
    ) -> Result<Self> {
        Self::construct_with_bit_width(
            runtime,
            deployer,
            config.constructor_params(),
            config.hamt_bit_width,
        )
    }

    fn construct_with_bit_width(
        runtime: ActorRuntime<S, BS>,
        deployer: AccountId,
        params: ConstructorParams,
        hamt_bit_width: u32,
    ) -> Result<Self> {
        let supply = scale_whole_units(params.initial_supply, params.decimals)?;
        let token_state = Token::<S, BS>::create_state_with_bit_width(runtime.bs(), hamt_bit_width)?;

        let mut ledger = LocalToken {
            runtime,
            state: LocalTokenState {
                token: token_state,
                access: AccessControl::new(deployer),
                name: params.name,
                symbol: params.symbol,
                decimals: params.decimals,
            },
            events: EventLog::new(),
            receivers: HashMap::new(),
        };

        ledger.token().mint(deployer, &supply)?;
        ledger.events.push(TokenEvent::Transfer {
            from: AccountId::ZERO,
            to: deployer,
            value: supply.clone(),
        });
        ledger.save()?;

        info!(
            name = %ledger.state.name,
            symbol = %ledger.state.symbol,
            decimals = ledger.state.decimals,
            owner = %deployer,
            supply = %supply.atto(),
            "constructed ledger"
        );
        Ok(ledger)
    }

    /// Restores a ledger from the state root recorded in the runtime
    ///
    /// Receivers are not part of the persisted state and must be registered again.
    pub fn load(runtime: ActorRuntime<S, BS>) -> Result<Self> {
        let cid = runtime.root_cid()?;
        let state = LocalTokenState::load(&runtime, &cid)?;
        Ok(LocalToken { runtime, state, events: EventLog::new(), receivers: HashMap::new() })
    }

    /// Writes the ledger state to the blockstore and records it as the runtime's root
    pub fn save(&self) -> Result<Cid> {
        let cid = self
            .runtime
            .put_cbor(&self.state, Code::Blake2b256)
            .map_err(|err| StateError::Serialization(err.to_string()))?;
        self.runtime.set_root(&cid)?;
        Ok(cid)
    }

    /// The library handle performs no ownership checks, so it never leaves the crate
    fn token(&mut self) -> Token<'_, S, BS> {
        Token::wrap(&self.runtime, &mut self.state.token)
    }

    pub fn runtime(&self) -> &ActorRuntime<S, BS> {
        &self.runtime
    }

    pub fn into_runtime(self) -> ActorRuntime<S, BS> {
        self.runtime
    }

    pub fn state(&self) -> &LocalTokenState {
        &self.state
    }

    /// Events appended since construction or the last `take_events`
    pub fn events(&self) -> &[TokenEvent] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<TokenEvent> {
        self.events.take()
    }

    /// Registers the receiver that approveAndCall notifies for `account`, replacing any previous one
    pub fn register_receiver(&mut self, account: AccountId, receiver: LedgerReceiver<S, BS>) {
        self.receivers.insert(account, receiver);
    }

    pub fn unregister_receiver(&mut self, account: &AccountId) -> Option<LedgerReceiver<S, BS>> {
        self.receivers.remove(account)
    }

    /// Checks the state invariants, returning a summary of the state
    pub fn check_invariants(&self) -> Result<StateSummary> {
        Ok(self.state.token.check_invariants(&self.runtime)?)
    }

    /// Captures everything a receiver could change while re-entering the ledger
    fn checkpoint(&self) -> Checkpoint<S, BS> {
        Checkpoint {
            state: self.state.clone(),
            events: self.events.clone(),
            receivers: self.receivers.clone(),
            root: self.runtime.root_cid().ok(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<S, BS>) -> Result<()> {
        let Checkpoint { state, events, receivers, root } = checkpoint;
        self.state = state;
        self.events = events;
        self.receivers = receivers;
        if let Some(root) = root {
            self.runtime.set_root(&root)?;
        }
        Ok(())
    }

    /// Commits the approval, records it and notifies the spender's receiver
    fn notify_approval(
        &mut self,
        caller: &AccountId,
        params: ApproveAndCallParams,
    ) -> Result<ApproveAndCallReturn> {
        let spender = params.spender;
        let amount: TokenAmount = params.amount;

        let mut hook = self.token().approve_and_call(*caller, spender, &amount, params.data)?;
        debug!(owner = %caller, spender = %spender, amount = %amount.atto(), "approve_and_call");
        self.events.push(TokenEvent::Approval { owner: *caller, spender, value: amount });

        let registered = self.receivers.get(&spender).cloned();
        let receiver = match &registered {
            Some(r) => Some(r.as_ref() as &dyn UniversalReceiver<Self>),
            None => None,
        };

        let intermediate = hook
            .call(receiver, self)
            .map_err(|source| TokenError::CallbackRejected { spender, source })?;
        self.token().approve_and_call_return(intermediate)
    }
}

/// Ledger contents as they stood before an approveAndCall began
struct Checkpoint<S: Syscalls, BS: Blockstore> {
    state: LocalTokenState,
    events: EventLog,
    receivers: HashMap<AccountId, LedgerReceiver<S, BS>>,
    root: Option<Cid>,
}

/// Implementation of the ledger API
///
/// Here the parameter structs are unpacked, ownership is checked and the underlying library
/// functions are called. Events are only appended once the library call has committed.
impl<S: Syscalls, BS: Blockstore> LocalTokenApi for LocalToken<S, BS> {
    type TokenError = TokenError;

    fn name(&self) -> String {
        self.state.name.clone()
    }

    fn symbol(&self) -> String {
        self.state.symbol.clone()
    }

    fn decimals(&self) -> u8 {
        self.state.decimals
    }

    fn owner(&self) -> AccountId {
        self.state.access.owner()
    }

    fn total_supply(&self) -> TotalSupplyReturn {
        self.state.token.supply.clone()
    }

    fn balance_of(&self, account: &AccountId) -> Result<BalanceReturn> {
        Ok(self.state.token.get_balance(&self.runtime, *account)?)
    }

    fn allowance(&self, params: GetAllowanceParams) -> Result<AllowanceReturn> {
        Ok(self.state.token.get_allowance_between(&self.runtime, params.owner, params.spender)?)
    }

    fn is_frozen(&self, account: &AccountId) -> Result<bool> {
        Ok(self.state.token.is_frozen(&self.runtime, *account)?)
    }

    fn transfer(&mut self, caller: &AccountId, params: TransferParams) -> Result<TransferReturn> {
        let ret = self.token().transfer(*caller, params.to, &params.amount)?;
        debug!(from = %caller, to = %params.to, amount = %params.amount.atto(), "transfer");
        self.events.push(TokenEvent::Transfer {
            from: *caller,
            to: params.to,
            value: params.amount,
        });
        Ok(ret)
    }

    fn approve(&mut self, caller: &AccountId, params: ApproveParams) -> Result<ApproveReturn> {
        let ret = self.token().approve(*caller, params.spender, &params.amount)?;
        debug!(owner = %caller, spender = %params.spender, amount = %params.amount.atto(), "approve");
        self.events.push(TokenEvent::Approval {
            owner: *caller,
            spender: params.spender,
            value: params.amount,
        });
        Ok(ret)
    }

    fn transfer_from(
        &mut self,
        caller: &AccountId,
        params: TransferFromParams,
    ) -> Result<TransferFromReturn> {
        let ret = self.token().transfer_from(*caller, params.from, params.to, &params.amount)?;
        debug!(
            spender = %caller,
            from = %params.from,
            to = %params.to,
            amount = %params.amount.atto(),
            "transfer_from"
        );
        self.events.push(TokenEvent::Transfer {
            from: params.from,
            to: params.to,
            value: params.amount,
        });
        Ok(ret)
    }

    fn mint(&mut self, caller: &AccountId, params: MintParams) -> Result<MintReturn> {
        validate_amount(&params.amount, "mint")?;
        self.state.access.require_owner(caller)?;

        let ret = self.token().mint(params.to, &params.amount)?;
        debug!(to = %params.to, amount = %params.amount.atto(), supply = %ret.supply.atto(), "mint");
        self.events.push(TokenEvent::Transfer {
            from: AccountId::ZERO,
            to: params.to,
            value: params.amount,
        });
        Ok(ret)
    }

    fn burn(&mut self, caller: &AccountId, params: BurnParams) -> Result<BurnReturn> {
        let ret = self.token().burn(*caller, &params.amount)?;
        debug!(owner = %caller, amount = %params.amount.atto(), "burn");
        self.events.push(TokenEvent::Transfer {
            from: *caller,
            to: AccountId::ZERO,
            value: params.amount,
        });
        Ok(ret)
    }

    fn burn_from(&mut self, caller: &AccountId, params: BurnFromParams) -> Result<BurnFromReturn> {
        let ret = self.token().burn_from(*caller, params.from, &params.amount)?;
        debug!(spender = %caller, from = %params.from, amount = %params.amount.atto(), "burn_from");
        self.events.push(TokenEvent::Transfer {
            from: params.from,
            to: AccountId::ZERO,
            value: params.amount,
        });
        Ok(ret)
    }

    fn freeze(&mut self, caller: &AccountId, params: FreezeParams) -> Result<FreezeReturn> {
        self.state.access.require_owner(caller)?;

        let newly_frozen = self.token().freeze(params.target)?;
        debug!(account = %params.target, newly_frozen, "freeze");
        self.events.push(TokenEvent::Freeze { target: params.target });
        Ok(())
    }

    fn unfreeze(&mut self, caller: &AccountId, params: FreezeParams) -> Result<FreezeReturn> {
        self.state.access.require_owner(caller)?;

        let was_frozen = self.token().unfreeze(params.target)?;
        debug!(account = %params.target, was_frozen, "unfreeze");
        self.events.push(TokenEvent::Unfreeze { target: params.target });
        Ok(())
    }

    fn approve_and_call(
        &mut self,
        caller: &AccountId,
        params: ApproveAndCallParams,
    ) -> Result<ApproveAndCallReturn> {
        // everything from here on is undone unless the receiver accepts
        let checkpoint = self.checkpoint();
        match self.notify_approval(caller, params) {
            Ok(ret) => Ok(ret),
            Err(err) => {
                if let TokenError::CallbackRejected { spender, source } = &err {
                    warn!(
                        owner = %caller,
                        spender = %spender,
                        error = %source,
                        "approveAndCall callback failed, rolling back"
                    );
                }
                self.restore(checkpoint)?;
                Err(err)
            }
        }
    }
}
