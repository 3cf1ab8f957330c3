pub mod billing;
pub mod crm;
pub mod webhooks;
