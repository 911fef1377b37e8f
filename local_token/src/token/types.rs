use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::RawBytes;
use fvm_shared::econ::TokenAmount;
use token_actor_utils::receiver::RecipientData;
use token_actor_utils::AccountId;

/// The operation surface of a freezable, owner-administered token ledger
///
/// Every mutating method takes the identity of the caller explicitly. Implementations must be
/// all-or-nothing: a method that returns an error leaves balances, allowances, the frozen set,
/// the total supply and the event log exactly as they were.
pub trait LocalTokenApi {
    type TokenError;

    /// Returns the name of the token
    fn name(&self) -> String;

    /// Returns the ticker symbol of the token
    fn symbol(&self) -> String;

    /// Returns the number of decimal places a whole token is divided into
    ///
    /// Amounts are always expressed in base units. Never changes after construction.
    fn decimals(&self) -> u8;

    /// Returns the account that may mint and freeze
    fn owner(&self) -> AccountId;

    /// Returns the total amount of the token in existence
    ///
    /// The total supply always equals the sum of every balance.
    fn total_supply(&self) -> TotalSupplyReturn;

    /// Returns the balance of an account
    ///
    /// Accounts that never held tokens have an implicit zero balance.
    fn balance_of(&self, account: &AccountId) -> Result<BalanceReturn, Self::TokenError>;

    /// Returns the allowance an owner has approved for a spender
    fn allowance(&self, params: GetAllowanceParams) -> Result<AllowanceReturn, Self::TokenError>;

    /// Returns whether the account is currently frozen
    fn is_frozen(&self, account: &AccountId) -> Result<bool, Self::TokenError>;

    /// Moves tokens from the caller to another account
    ///
    /// Fails if either party is frozen or the caller's balance is short. Transferring to oneself
    /// is permitted and leaves the balance unchanged.
    fn transfer(
        &mut self,
        caller: &AccountId,
        params: TransferParams,
    ) -> Result<TransferReturn, Self::TokenError>;

    /// Overwrites the allowance the caller grants to a spender
    ///
    /// The allowance may not exceed the caller's current balance. Approving zero removes it.
    fn approve(
        &mut self,
        caller: &AccountId,
        params: ApproveParams,
    ) -> Result<ApproveReturn, Self::TokenError>;

    /// Moves tokens between two accounts, spending the caller's allowance on the `from` account
    fn transfer_from(
        &mut self,
        caller: &AccountId,
        params: TransferFromParams,
    ) -> Result<TransferFromReturn, Self::TokenError>;

    /// Creates new tokens for an account. Owner only.
    fn mint(&mut self, caller: &AccountId, params: MintParams)
        -> Result<MintReturn, Self::TokenError>;

    /// Destroys tokens from the caller's own balance
    fn burn(&mut self, caller: &AccountId, params: BurnParams)
        -> Result<BurnReturn, Self::TokenError>;

    /// Destroys tokens from another account, spending the caller's allowance on it
    fn burn_from(
        &mut self,
        caller: &AccountId,
        params: BurnFromParams,
    ) -> Result<BurnFromReturn, Self::TokenError>;

    /// Adds an account to the frozen set. Owner only, idempotent.
    fn freeze(
        &mut self,
        caller: &AccountId,
        params: FreezeParams,
    ) -> Result<FreezeReturn, Self::TokenError>;

    /// Removes an account from the frozen set. Owner only, idempotent.
    fn unfreeze(
        &mut self,
        caller: &AccountId,
        params: FreezeParams,
    ) -> Result<FreezeReturn, Self::TokenError>;

    /// Approves a spender and then notifies it through its receiver
    ///
    /// If the receiver is missing or rejects the notification the approval, and anything the
    /// receiver did to the ledger in the meantime, is rolled back.
    fn approve_and_call(
        &mut self,
        caller: &AccountId,
        params: ApproveAndCallParams,
    ) -> Result<ApproveAndCallReturn, Self::TokenError>;
}

pub type TotalSupplyReturn = TokenAmount;
pub type BalanceReturn = TokenAmount;
pub type AllowanceReturn = TokenAmount;
pub type FreezeReturn = ();

/// Parameters used to construct a new ledger
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct ConstructorParams {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Initial supply in whole tokens, scaled by `10^decimals` at construction
    pub initial_supply: u64,
}

/// Instruction to mint new tokens to an account
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct MintParams {
    pub to: AccountId,
    /// A non-negative amount of base units to mint
    pub amount: TokenAmount,
}

/// Return value after a successful mint
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct MintReturn {
    /// The new balance of the recipient
    pub balance: TokenAmount,
    /// The new total supply
    pub supply: TokenAmount,
}

/// Instruction to transfer tokens to another account
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct TransferParams {
    pub to: AccountId,
    /// A non-negative amount to transfer
    pub amount: TokenAmount,
}

/// Return value after a successful transfer
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct TransferReturn {
    /// The new balance of the `from` account
    pub from_balance: TokenAmount,
    /// The new balance of the `to` account
    pub to_balance: TokenAmount,
}

/// Instruction to transfer tokens between two accounts as a spender
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct TransferFromParams {
    pub from: AccountId,
    pub to: AccountId,
    /// A non-negative amount to transfer
    pub amount: TokenAmount,
}

/// Return value after a successful delegated transfer
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct TransferFromReturn {
    /// The new balance of the `from` account
    pub from_balance: TokenAmount,
    /// The new balance of the `to` account
    pub to_balance: TokenAmount,
    /// The new remaining allowance between `from` and the spender (caller)
    pub allowance: TokenAmount,
}

/// Instruction to set the allowance of a spender over the caller's balance
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct ApproveParams {
    pub spender: AccountId,
    /// The new allowance; replaces any previous value
    pub amount: TokenAmount,
}

/// Return value after a successful approval
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct ApproveReturn {
    /// The allowance that was replaced
    pub previous: TokenAmount,
    /// The allowance now in force
    pub allowance: TokenAmount,
}

/// Params to get allowance between to accounts
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct GetAllowanceParams {
    pub owner: AccountId,
    pub spender: AccountId,
}

/// Instruction to burn an amount of tokens
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct BurnParams {
    /// A non-negative amount to burn
    pub amount: TokenAmount,
}

/// The updated value after burning
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct BurnReturn {
    /// New balance in the account after the successful burn
    pub balance: TokenAmount,
}

/// Instruction to burn an amount of tokens from another account
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct BurnFromParams {
    pub from: AccountId,
    /// A non-negative amount to burn
    pub amount: TokenAmount,
}

/// The updated value after a delegated burn
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct BurnFromReturn {
    /// New balance in the account after the successful burn
    pub balance: TokenAmount,
    /// New remaining allowance between the owner and spender (caller)
    pub allowance: TokenAmount,
}

/// Names the account to freeze or unfreeze
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct FreezeParams {
    pub target: AccountId,
}

/// Instruction to approve a spender and notify it
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug)]
pub struct ApproveAndCallParams {
    pub spender: AccountId,
    /// The new allowance; replaces any previous value
    pub amount: TokenAmount,
    /// Arbitrary data passed on to the spender's receiver
    pub data: RawBytes,
}

/// Return value after a successful approveAndCall
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct ApproveAndCallReturn {
    /// The allowance remaining after the receiver returned
    pub allowance: TokenAmount,
    /// (Optional) data returned from the receiver
    pub recipient_data: RawBytes,
}

/// Intermediate data used to construct the approveAndCall return data
#[derive(Clone, Debug)]
pub struct ApproveAndCallIntermediate {
    pub owner: AccountId,
    pub spender: AccountId,
    /// (Optional) data returned from the receiver
    pub recipient_data: RawBytes,
}

impl RecipientData for ApproveAndCallIntermediate {
    fn set_recipient_data(&mut self, data: RawBytes) {
        self.recipient_data = data;
    }
}
