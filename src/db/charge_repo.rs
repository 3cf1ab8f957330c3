// src/db/charge_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::billing::{Charge, ChargeStatus, GatewayProvider},
};

/// Acesso às cobranças. Os serviços recebem este trait injetado (nada de
/// cliente global): em produção é o repositório Postgres, nos testes o
/// armazém em memória.
#[async_trait]
pub trait ChargeStore: Send + Sync {
    async fn insert(&self, charge: &Charge) -> Result<(), AppError>;

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Charge>, AppError>;

    /// Busca usada pelo webhook: sem tenant (o gateway não conhece tenants),
    /// escopada pelo par (provedor, id externo).
    async fn find_by_external_id(
        &self,
        provider: GatewayProvider,
        external_id: &str,
    ) -> Result<Option<Charge>, AppError>;

    /// Busca da página pública: token = correlation_id ou o próprio id.
    async fn find_by_payment_token(&self, token: &str) -> Result<Option<Charge>, AppError>;

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Charge>, AppError>;

    /// Compare-and-set de status: só escreve se o status atual ainda for
    /// `from`. Devolve false quando outro escritor chegou antes.
    async fn apply_transition(
        &self,
        tenant_id: Uuid,
        charge_id: Uuid,
        from: ChargeStatus,
        to: ChargeStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError>;

    /// Exclusão física, permitida apenas enquanto PENDING.
    async fn delete_pending(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct ChargeRepository {
    pool: PgPool,
}

impl ChargeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChargeStore for ChargeRepository {
    async fn insert(&self, charge: &Charge) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO charges (
                id, tenant_id, customer_id, description, amount, kind,
                due_date, provider, correlation_id, external_id,
                payment_artifact, payment_link, gateway_active,
                status, paid_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(charge.id)
        .bind(charge.tenant_id)
        .bind(charge.customer_id)
        .bind(&charge.description)
        .bind(charge.amount)
        .bind(charge.kind)
        .bind(charge.due_date)
        .bind(charge.provider)
        .bind(&charge.correlation_id)
        .bind(&charge.external_id)
        .bind(&charge.payment_artifact)
        .bind(&charge.payment_link)
        .bind(charge.gateway_active)
        .bind(charge.status)
        .bind(charge.paid_at)
        .bind(charge.created_at)
        .bind(charge.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Charge>, AppError> {
        let charge = sqlx::query_as::<_, Charge>(
            "SELECT * FROM charges WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(charge)
    }

    async fn find_by_external_id(
        &self,
        provider: GatewayProvider,
        external_id: &str,
    ) -> Result<Option<Charge>, AppError> {
        let charge = sqlx::query_as::<_, Charge>(
            "SELECT * FROM charges WHERE provider = $1 AND external_id = $2",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(charge)
    }

    async fn find_by_payment_token(&self, token: &str) -> Result<Option<Charge>, AppError> {
        // O token tanto pode ser o correlation_id quanto o UUID local.
        let as_uuid = Uuid::parse_str(token).ok();

        let charge = sqlx::query_as::<_, Charge>(
            r#"
            SELECT * FROM charges
            WHERE correlation_id = $1
               OR ($2::uuid IS NOT NULL AND id = $2)
            LIMIT 1
            "#,
        )
        .bind(token)
        .bind(as_uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(charge)
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Charge>, AppError> {
        let charges = sqlx::query_as::<_, Charge>(
            "SELECT * FROM charges WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(charges)
    }

    async fn apply_transition(
        &self,
        tenant_id: Uuid,
        charge_id: Uuid,
        from: ChargeStatus,
        to: ChargeStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE charges
            SET status = $4, paid_at = $5, updated_at = now()
            WHERE id = $1 AND tenant_id = $2 AND status = $3
            "#,
        )
        .bind(charge_id)
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .bind(paid_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_pending(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM charges WHERE id = $1 AND tenant_id = $2 AND status = 'PENDING'",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
