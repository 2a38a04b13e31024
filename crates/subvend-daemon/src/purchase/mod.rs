//! Purchase finalization: the coordinator driving allocation, debit,
//! and the atomic ledger write, with compensation on failure.

mod coordinator;

pub use coordinator::{PurchaseEngine, PurchaseReceipt};
