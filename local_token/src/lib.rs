pub mod access;
pub mod config;
pub mod events;
pub mod ledger;
pub mod receiver;
pub mod shared;
pub mod token;

pub use ledger::LocalToken;
pub use shared::SharedLocalToken;
pub use token::types::LocalTokenApi;
pub use token::{ErrorKind, TokenError};
