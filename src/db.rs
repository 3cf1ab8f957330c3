pub mod charge_repo;
pub use charge_repo::{ChargeRepository, ChargeStore};
pub mod ledger_repo;
pub use ledger_repo::{LedgerRepository, LedgerSink, NewLedgerEntry};
pub mod crm_repo;
pub use crm_repo::{CustomerRepository, CustomerStore};
pub mod memory;
pub use memory::InMemoryStore;
