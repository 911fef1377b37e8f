use fvm_ipld_encoding::Error as SerializationError;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use thiserror::Error;
use token_actor_utils::receiver::ReceiverHookError;
use token_actor_utils::syscalls::NoStateError;
use token_actor_utils::AccountId;

use crate::token::state::StateError as TokenStateError;
use crate::token::state::StateInvariantError;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Only contract owner can perform this action: {caller} is not the owner")]
    Unauthorized { caller: AccountId },
    #[error("Account is frozen: {0}")]
    AccountFrozen(AccountId),
    #[error(transparent)]
    TokenState(#[from] TokenStateError),
    #[error("Invalid recipient: {0} is the zero sentinel")]
    InvalidRecipient(AccountId),
    #[error("approveAndCall rejected by {spender}: {source}")]
    CallbackRejected {
        spender: AccountId,
        #[source]
        source: ReceiverHookError,
    },
    #[error("value {amount:?} for {name:?} must be non-negative")]
    InvalidNegative { name: &'static str, amount: TokenAmount },
    #[error("value {amount:?} for {name:?} does not fit in 256 bits")]
    AmountOverflow { name: &'static str, amount: TokenAmount },
    #[error("error during serialization {0}")]
    Serialization(#[from] SerializationError),
    #[error("error in state invariants {0}")]
    StateInvariant(#[from] StateInvariantError),
    #[error("runtime error {0}")]
    NoState(#[from] NoStateError),
}

/// Coarse classification of a failure, as reported to callers of the ledger
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    AccountFrozen,
    InsufficientBalance,
    AllowanceExceeded,
    CallbackRejected,
    InvalidArgument,
    Internal,
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Unauthorized { .. } => ErrorKind::Unauthorized,
            TokenError::AccountFrozen(_) => ErrorKind::AccountFrozen,
            TokenError::TokenState(TokenStateError::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientBalance
            }
            TokenError::TokenState(TokenStateError::InsufficientAllowance { .. }) => {
                ErrorKind::AllowanceExceeded
            }
            TokenError::CallbackRejected { .. } => ErrorKind::CallbackRejected,
            TokenError::InvalidNegative { .. }
            | TokenError::AmountOverflow { .. }
            | TokenError::InvalidRecipient(_) => ErrorKind::InvalidArgument,
            TokenError::TokenState(_)
            | TokenError::Serialization(_)
            | TokenError::StateInvariant(_)
            | TokenError::NoState(_) => ErrorKind::Internal,
        }
    }
}

impl From<&TokenError> for ExitCode {
    fn from(error: &TokenError) -> Self {
        match error {
            TokenError::Unauthorized { .. } | TokenError::AccountFrozen(_) => {
                ExitCode::USR_FORBIDDEN
            }
            TokenError::CallbackRejected { source, .. } => {
                // pass through the receiver's exit code (or the hook failure's code)
                ExitCode::from(source)
            }
            TokenError::InvalidNegative { .. }
            | TokenError::AmountOverflow { .. }
            | TokenError::InvalidRecipient(_) => ExitCode::USR_ILLEGAL_ARGUMENT,
            TokenError::Serialization(_) => ExitCode::USR_SERIALIZATION,
            TokenError::StateInvariant(_) | TokenError::NoState(_) => ExitCode::USR_ILLEGAL_STATE,
            TokenError::TokenState(state_error) => match state_error {
                TokenStateError::IpldHamt(_) | TokenStateError::Serialization(_) => {
                    ExitCode::USR_SERIALIZATION
                }
                TokenStateError::NegativeAllowance { .. }
                | TokenStateError::NegativeTotalSupply { .. }
                | TokenStateError::MissingState(_) => ExitCode::USR_ILLEGAL_STATE,
                TokenStateError::InsufficientBalance { .. }
                | TokenStateError::InsufficientAllowance { .. } => ExitCode::USR_INSUFFICIENT_FUNDS,
            },
        }
    }
}
