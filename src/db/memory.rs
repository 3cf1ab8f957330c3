// src/db/memory.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ChargeStore, CustomerStore, LedgerSink, NewLedgerEntry},
    models::{
        billing::{Charge, ChargeStatus, GatewayProvider, LedgerEntry},
        crm::Customer,
    },
};

/// Implementação em memória dos três armazéns, com a mesma semântica de
/// compare-and-set do Postgres. Sustenta os testes e experimentos locais
/// sem banco.
#[derive(Default)]
pub struct InMemoryStore {
    charges: Mutex<HashMap<Uuid, Charge>>,
    ledger: Mutex<Vec<LedgerEntry>>,
    customers: Mutex<HashMap<Uuid, Customer>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantidade de lançamentos registrados (útil em asserções).
    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().expect("lock do ledger").len()
    }

    /// Leitura direta de uma cobrança, sem escopo de tenant (asserções).
    pub fn charge_by_id(&self, id: Uuid) -> Option<Charge> {
        self.charges.lock().expect("lock das cobranças").get(&id).cloned()
    }
}

#[async_trait]
impl ChargeStore for InMemoryStore {
    async fn insert(&self, charge: &Charge) -> Result<(), AppError> {
        let mut charges = self.charges.lock().expect("lock das cobranças");
        charges.insert(charge.id, charge.clone());
        Ok(())
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Charge>, AppError> {
        let charges = self.charges.lock().expect("lock das cobranças");
        Ok(charges
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: GatewayProvider,
        external_id: &str,
    ) -> Result<Option<Charge>, AppError> {
        let charges = self.charges.lock().expect("lock das cobranças");
        Ok(charges
            .values()
            .find(|c| c.provider == Some(provider) && c.external_id == external_id)
            .cloned())
    }

    async fn find_by_payment_token(&self, token: &str) -> Result<Option<Charge>, AppError> {
        let as_uuid = Uuid::parse_str(token).ok();
        let charges = self.charges.lock().expect("lock das cobranças");
        Ok(charges
            .values()
            .find(|c| c.correlation_id == token || Some(c.id) == as_uuid)
            .cloned())
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Charge>, AppError> {
        let charges = self.charges.lock().expect("lock das cobranças");
        let mut result: Vec<Charge> = charges
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn apply_transition(
        &self,
        tenant_id: Uuid,
        charge_id: Uuid,
        from: ChargeStatus,
        to: ChargeStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let mut charges = self.charges.lock().expect("lock das cobranças");
        match charges.get_mut(&charge_id) {
            Some(charge) if charge.tenant_id == tenant_id && charge.status == from => {
                charge.status = to;
                charge.paid_at = paid_at;
                charge.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_pending(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut charges = self.charges.lock().expect("lock das cobranças");
        let deletable = charges
            .get(&id)
            .is_some_and(|c| c.tenant_id == tenant_id && c.status == ChargeStatus::Pending);
        if deletable {
            charges.remove(&id);
        }
        Ok(deletable)
    }
}

#[async_trait]
impl LedgerSink for InMemoryStore {
    async fn record_payment(&self, entry: NewLedgerEntry) -> Result<(), AppError> {
        let mut ledger = self.ledger.lock().expect("lock do ledger");
        if ledger.iter().any(|e| e.charge_id == entry.charge_id) {
            return Ok(());
        }
        ledger.push(LedgerEntry {
            id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            charge_id: entry.charge_id,
            customer_id: entry.customer_id,
            amount: entry.amount,
            paid_at: entry.paid_at,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn find_by_charge(&self, charge_id: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        let ledger = self.ledger.lock().expect("lock do ledger");
        Ok(ledger.iter().find(|e| e.charge_id == charge_id).cloned())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn insert(&self, customer: &Customer) -> Result<(), AppError> {
        let mut customers = self.customers.lock().expect("lock dos clientes");
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Customer>, AppError> {
        let customers = self.customers.lock().expect("lock dos clientes");
        Ok(customers
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Customer>, AppError> {
        let customers = self.customers.lock().expect("lock dos clientes");
        let mut result: Vec<Customer> = customers
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(result)
    }
}
