use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::RawBytes;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use local_token::receiver::{ApprovalReceived, APPROVAL_RECEIVER_TYPE};
use local_token::token::types::{
    ApproveAndCallParams, BurnFromParams, FreezeParams, MintParams, TransferFromParams,
    TransferParams,
};
use local_token::{LocalToken, LocalTokenApi, TokenError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use token_actor_utils::receiver::{UniversalReceiver, UniversalReceiverParams};
use token_actor_utils::syscalls::Syscalls;
use token_actor_utils::AccountId;
use tracing::debug;

/// Action to take in the approval receiver
///
/// This gets serialized and sent along as [`ApproveAndCallParams::data`]. Empty data means
/// [`TestAction::Accept`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum TestAction {
    /// Accept the approval
    Accept,
    /// Reject the approval (receiver returns an error)
    Reject,
    /// Pull the whole approved amount to ourselves with transferFrom
    PullAllowance,
    /// Burn the whole approved amount with burnFrom
    BurnAllowance,
    /// Transfer part of our own balance to another account
    Transfer(AccountId, TokenAmount),
    /// Attempt to mint to an account; only the ledger owner may
    Mint(AccountId, TokenAmount),
    /// Attempt to freeze an account; only the ledger owner may
    Freeze(AccountId),
    /// Drain the ledger's event log
    TakeEvents,
    /// Persist the ledger state and record it as the root
    Save,
    /// Remove the receiver registered for an account
    Unregister(AccountId),
    /// Approve another account and notify it, with data that can provide further instructions
    ApproveAndCall { spender: AccountId, amount: TokenAmount, data: RawBytes },
    /// Take action, then abort afterwards
    ActionThenAbort(RawBytes),
}

/// Helper for nesting calls to create action sequences.
///
/// E.g., pull the allowance and then reject:
///
/// ```ignore
/// action(TestAction::ActionThenAbort(action(TestAction::PullAllowance)))
/// ```
pub fn action(action: TestAction) -> RawBytes {
    RawBytes::serialize(action).unwrap()
}

/// An approval receiver that follows the [`TestAction`] script carried in the notification data
///
/// Every notification is recorded, including ones whose effects are later rolled back.
#[derive(Debug, Default)]
pub struct ScriptedReceiver {
    received: Mutex<Vec<ApprovalReceived>>,
}

impl ScriptedReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications seen so far, oldest first
    pub fn received(&self) -> Vec<ApprovalReceived> {
        self.received.lock().clone()
    }
}

impl<S: Syscalls, BS: Blockstore> UniversalReceiver<LocalToken<S, BS>> for ScriptedReceiver {
    fn receive(
        &self,
        ledger: &mut LocalToken<S, BS>,
        params: UniversalReceiverParams,
    ) -> Result<RawBytes, ExitCode> {
        if params.type_ != APPROVAL_RECEIVER_TYPE {
            return Err(ExitCode::USR_UNHANDLED_MESSAGE);
        }
        let received: ApprovalReceived =
            params.payload.deserialize().map_err(|_| ExitCode::USR_SERIALIZATION)?;
        self.received.lock().push(received.clone());

        let action = if received.data.bytes().is_empty() {
            TestAction::Accept
        } else {
            received.data.deserialize().map_err(|_| ExitCode::USR_ILLEGAL_ARGUMENT)?
        };
        handle_action(ledger, &received, action)
    }
}

fn exit_code(err: TokenError) -> ExitCode {
    ExitCode::from(&err)
}

// handle a TestAction, which could possibly recurse in the action-then-abort case
fn handle_action<S: Syscalls, BS: Blockstore>(
    ledger: &mut LocalToken<S, BS>,
    received: &ApprovalReceived,
    action: TestAction,
) -> Result<RawBytes, ExitCode> {
    debug!(spender = %received.spender, ?action, "approval receiver");
    let me = received.spender;
    match action {
        TestAction::Accept => Ok(RawBytes::default()),
        TestAction::Reject => Err(ExitCode::USR_FORBIDDEN),
        TestAction::PullAllowance => {
            let ret = ledger
                .transfer_from(
                    &me,
                    TransferFromParams {
                        from: received.approver,
                        to: me,
                        amount: received.amount.clone(),
                    },
                )
                .map_err(exit_code)?;
            RawBytes::serialize(ret).map_err(|_| ExitCode::USR_SERIALIZATION)
        }
        TestAction::BurnAllowance => {
            let ret = ledger
                .burn_from(
                    &me,
                    BurnFromParams { from: received.approver, amount: received.amount.clone() },
                )
                .map_err(exit_code)?;
            RawBytes::serialize(ret).map_err(|_| ExitCode::USR_SERIALIZATION)
        }
        TestAction::Transfer(to, amount) => {
            let ret = ledger.transfer(&me, TransferParams { to, amount }).map_err(exit_code)?;
            RawBytes::serialize(ret).map_err(|_| ExitCode::USR_SERIALIZATION)
        }
        TestAction::Mint(to, amount) => {
            let ret = ledger.mint(&me, MintParams { to, amount }).map_err(exit_code)?;
            RawBytes::serialize(ret).map_err(|_| ExitCode::USR_SERIALIZATION)
        }
        TestAction::Freeze(target) => {
            ledger.freeze(&me, FreezeParams { target }).map_err(exit_code)?;
            Ok(RawBytes::default())
        }
        TestAction::TakeEvents => {
            ledger.take_events();
            Ok(RawBytes::default())
        }
        TestAction::Save => {
            ledger.save().map_err(exit_code)?;
            Ok(RawBytes::default())
        }
        TestAction::Unregister(account) => {
            ledger.unregister_receiver(&account);
            Ok(RawBytes::default())
        }
        TestAction::ApproveAndCall { spender, amount, data } => {
            let ret = ledger
                .approve_and_call(&me, ApproveAndCallParams { spender, amount, data })
                .map_err(exit_code)?;
            RawBytes::serialize(ret).map_err(|_| ExitCode::USR_SERIALIZATION)
        }
        TestAction::ActionThenAbort(inner) => {
            let inner: TestAction = inner.deserialize().map_err(|_| ExitCode::USR_ILLEGAL_ARGUMENT)?;
            handle_action(ledger, received, inner)?;
            Err(ExitCode::USR_UNSPECIFIED)
        }
    }
}
