use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::RawBytes;
use fvm_shared::econ::TokenAmount;
use token_actor_utils::receiver::{ReceiverHook, ReceiverHookError, ReceiverType, RecipientData};
use token_actor_utils::AccountId;

/// Receiver type for approval notifications, the FRC-42 method hash of "ReceiveApproval"
pub const APPROVAL_RECEIVER_TYPE: ReceiverType = 0x0860_e80f;

pub trait ApprovalReceiverHook<T: RecipientData> {
    fn new_approval(
        address: AccountId,
        params: ApprovalReceived,
        result_data: T,
    ) -> std::result::Result<ReceiverHook<T>, ReceiverHookError>;
}

impl<T: RecipientData> ApprovalReceiverHook<T> for ReceiverHook<T> {
    /// Construct a new approval ReceiverHook call
    fn new_approval(
        address: AccountId,
        params: ApprovalReceived,
        result_data: T,
    ) -> std::result::Result<ReceiverHook<T>, ReceiverHookError> {
        Ok(ReceiverHook::new(
            address,
            RawBytes::serialize(params)?,
            APPROVAL_RECEIVER_TYPE,
            result_data,
        ))
    }
}

/// Notification payload delivered to a spender by approveAndCall
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct ApprovalReceived {
    /// The account whose balance the spender may now draw on
    pub approver: AccountId,
    /// The account being notified
    pub spender: AccountId,
    /// Identity of the ledger that recorded the approval
    pub token: AccountId,
    /// The allowance now in force
    pub amount: TokenAmount,
    /// Data specified by the approver
    pub data: RawBytes,
}
