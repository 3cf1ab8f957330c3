// src/services/crm_service.rs

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{common::error::AppError, db::CustomerStore, models::crm::Customer};

/// Gestão dos clientes (pagadores) do tenant.
#[derive(Clone)]
pub struct CrmService {
    customers: Arc<dyn CustomerStore>,
}

impl CrmService {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        Self { customers }
    }

    pub async fn create_customer(
        &self,
        tenant_id: Uuid,
        full_name: &str,
        document_number: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Customer, AppError> {
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            tenant_id,
            full_name: full_name.to_string(),
            document_number: document_number.map(str::to_string),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        self.customers.insert(&customer).await?;

        Ok(customer)
    }

    pub async fn list_customers(&self, tenant_id: Uuid) -> Result<Vec<Customer>, AppError> {
        self.customers.list(tenant_id).await
    }
}
