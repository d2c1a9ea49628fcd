pub mod config;
pub mod domain;
pub mod errors;
pub mod parse;
pub mod pricing;
pub mod settlement;

pub use domain::decision::{Complexity, Decision, GuardedOutcome};
pub use domain::wallet::{Token, TokenBalance, TransferReceipt, TransferRequest};
pub use errors::{ApplicationError, Collaborator, InterfaceError, TransportError};
pub use pricing::PriceTable;
pub use settlement::{settle_usdc, Settlement, WalletProvider};
