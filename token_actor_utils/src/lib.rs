pub mod account;
pub mod receiver;
pub mod syscalls;
pub mod util;

pub use account::AccountId;
