pub mod billing_service;
pub mod crm_service;
pub mod reconciliation;

pub use billing_service::{BillingConfig, ChargeService, NewCharge};
pub use crm_service::CrmService;
pub use reconciliation::ReconciliationService;
