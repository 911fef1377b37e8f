use std::mem;

use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::RawBytes;
use fvm_shared::error::ExitCode;
use thiserror::Error;

use crate::account::AccountId;

/// Type of notification received - e.g. an approval granted by a token ledger
pub type ReceiverType = u32;

/// Parameters for universal receiver
///
/// Actual payload varies with the notification type
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct UniversalReceiverParams {
    /// Notification type
    pub type_: ReceiverType,
    /// Payload corresponding to the notification type
    pub payload: RawBytes,
}

/// Capability exposed by an account that wishes to be notified by the ledger
///
/// `ctx` is a handle to the ledger that invoked the receiver. The ledger commits its own writes
/// before calling in, so the receiver may use `ctx` to re-enter the ledger and observe them. If the
/// receiver wishes to reject the notification it returns an error exit code, which causes the
/// ledger to roll back the whole operation, including anything done through `ctx`.
pub trait UniversalReceiver<Ctx: ?Sized> {
    fn receive(&self, ctx: &mut Ctx, params: UniversalReceiverParams)
        -> Result<RawBytes, ExitCode>;
}

#[derive(Error, Debug)]
pub enum ReceiverHookError {
    #[error("receiver hook was already called")]
    AlreadyCalled,
    #[error("{0} does not implement the receive function")]
    NotReceiver(AccountId),
    #[error("error encoding to ipld: {0}")]
    IpldEncoding(#[from] fvm_ipld_encoding::Error),
    #[error("receiver hook error from {address}: exit_code={exit_code:?}, return_data={return_data:?}")]
    Receiver { address: AccountId, exit_code: ExitCode, return_data: RawBytes },
}

impl ReceiverHookError {
    pub fn new_receiver_error(address: AccountId, exit_code: ExitCode, return_data: RawBytes) -> Self {
        Self::Receiver { address, exit_code, return_data }
    }
}

impl From<&ReceiverHookError> for ExitCode {
    fn from(error: &ReceiverHookError) -> Self {
        match error {
            ReceiverHookError::AlreadyCalled => ExitCode::USR_ASSERTION_FAILED,
            ReceiverHookError::NotReceiver(_) => ExitCode::USR_UNHANDLED_MESSAGE,
            ReceiverHookError::IpldEncoding(_) => ExitCode::USR_SERIALIZATION,
            ReceiverHookError::Receiver { exit_code, .. } => *exit_code,
        }
    }
}

pub trait RecipientData {
    fn set_recipient_data(&mut self, data: RawBytes);
}

/// Implements a guarded call to a receiver hook
///
/// Ledger operations that notify another account return this so that state can be committed
/// before making the call into the receiver.
///
/// This also tracks whether the call has been made or not, and
/// will panic if dropped without calling the hook.
#[derive(Debug)]
pub struct ReceiverHook<T: RecipientData> {
    address: AccountId,
    token_type: ReceiverType,
    token_params: RawBytes,
    called: bool,
    result_data: Option<T>,
}

impl<T: RecipientData> ReceiverHook<T> {
    /// Construct a new ReceiverHook call
    pub fn new(
        address: AccountId,
        token_params: RawBytes,
        token_type: ReceiverType,
        result_data: T,
    ) -> Self {
        ReceiverHook {
            address,
            token_params,
            token_type,
            called: false,
            result_data: Some(result_data),
        }
    }

    /// The account whose receiver this hook will call
    pub fn address(&self) -> AccountId {
        self.address
    }

    /// Call the receiver hook and return the result
    ///
    /// `receiver` is the capability registered for the hook's address, or `None` if that account
    /// exposes no receiver. `ctx` is passed through to the receiver.
    ///
    /// Returns
    /// - an error if already called
    /// - an error if there is no receiver or the receiver rejected the call
    /// - any return data provided by the receiver upon success
    pub fn call<Ctx: ?Sized>(
        &mut self,
        receiver: Option<&dyn UniversalReceiver<Ctx>>,
        ctx: &mut Ctx,
    ) -> std::result::Result<T, ReceiverHookError> {
        if self.called {
            return Err(ReceiverHookError::AlreadyCalled);
        }

        self.called = true;

        let receiver = receiver.ok_or(ReceiverHookError::NotReceiver(self.address))?;

        let params = UniversalReceiverParams {
            type_: self.token_type,
            payload: mem::take(&mut self.token_params), // once sent, we don't need this anymore
        };

        match receiver.receive(ctx, params) {
            Ok(return_data) => {
                let mut result = self.result_data.take().ok_or(ReceiverHookError::AlreadyCalled)?;
                result.set_recipient_data(return_data);
                Ok(result)
            }
            Err(exit_code) => Err(ReceiverHookError::new_receiver_error(
                self.address,
                exit_code,
                RawBytes::default(),
            )),
        }
    }
}

/// Drop implements the panic if not called behaviour
impl<T: RecipientData> std::ops::Drop for ReceiverHook<T> {
    fn drop(&mut self) {
        if !self.called {
            panic!(
                "dropped before receiver hook was called on {:?} with {:?}",
                self.address, self.token_params
            );
        }
    }
}
