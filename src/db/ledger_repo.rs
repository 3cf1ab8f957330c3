// src/db/ledger_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::billing::LedgerEntry};

/// Lançamento a registrar quando uma cobrança vira PAID.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub tenant_id: Uuid,
    pub charge_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Destino contábil das cobranças quitadas. Precisa ser à prova de
/// reentrega: registrar duas vezes a mesma cobrança não duplica lançamento.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    async fn record_payment(&self, entry: NewLedgerEntry) -> Result<(), AppError>;

    async fn find_by_charge(&self, charge_id: Uuid) -> Result<Option<LedgerEntry>, AppError>;
}

#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerSink for LedgerRepository {
    async fn record_payment(&self, entry: NewLedgerEntry) -> Result<(), AppError> {
        // Re-checagem antes do INSERT; o índice único em charge_id segura
        // qualquer corrida que escape dela.
        if self.find_by_charge(entry.charge_id).await?.is_some() {
            tracing::debug!("Lançamento já existe para a cobrança {}", entry.charge_id);
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, tenant_id, charge_id, customer_id, amount, paid_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            ON CONFLICT (charge_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.tenant_id)
        .bind(entry.charge_id)
        .bind(entry.customer_id)
        .bind(entry.amount)
        .bind(entry.paid_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_charge(&self, charge_id: Uuid) -> Result<Option<LedgerEntry>, AppError> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            "SELECT * FROM ledger_entries WHERE charge_id = $1",
        )
        .bind(charge_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }
}
