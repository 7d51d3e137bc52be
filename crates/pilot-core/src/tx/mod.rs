//! Routes, transaction payloads, and the module-aware wrapper.

pub mod abi;
pub mod types;
pub mod wrap;

pub use types::{
    Address, Connection, ExecutionRoute, HexData, MetaTransactionRequest, ModuleType, Operation,
    TransactionData,
};
pub use wrap::{wrap, wrap_default, ZERO_ROLE_KEY};
