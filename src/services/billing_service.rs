// src/services/billing_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ChargeStore, CustomerStore, LedgerSink, NewLedgerEntry},
    gateway::{CreateChargeRequest, GatewayRegistry, PayerInfo},
    models::billing::{Charge, ChargeKind, ChargeStatus, GatewayProvider},
};

/// Configuração do módulo de cobranças.
#[derive(Clone, Default)]
pub struct BillingConfig {
    /// Gateway usado na criação de novas cobranças. None = modo manual.
    pub provider: Option<GatewayProvider>,
    /// Base pública para montar a notification_url dos webhooks.
    pub public_base_url: Option<String>,
}

/// Dados de entrada de uma nova cobrança, já validados na borda HTTP.
#[derive(Debug, Clone)]
pub struct NewCharge {
    pub customer_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub kind: ChargeKind,
    pub due_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct ChargeService {
    charges: Arc<dyn ChargeStore>,
    customers: Arc<dyn CustomerStore>,
    ledger: Arc<dyn LedgerSink>,
    gateways: GatewayRegistry,
    config: BillingConfig,
}

impl ChargeService {
    pub fn new(
        charges: Arc<dyn ChargeStore>,
        customers: Arc<dyn CustomerStore>,
        ledger: Arc<dyn LedgerSink>,
        gateways: GatewayRegistry,
        config: BillingConfig,
    ) -> Self {
        Self {
            charges,
            customers,
            ledger,
            gateways,
            config,
        }
    }

    // Helper para erro de validação com código estável no campo certo.
    fn validation_error(field: &'static str, code: &'static str) -> AppError {
        let mut errors = validator::ValidationErrors::new();
        let mut err = validator::ValidationError::new(code);
        err.message = Some(code.into());
        errors.add(field, err);
        AppError::ValidationError(errors)
    }

    /// Cria a cobrança local e tenta a criação no gateway. A falha do
    /// gateway nunca sobe: a cobrança é persistida em modo manual/offline
    /// (external_id = correlation_id, sem artefato) e a página de pagamento
    /// continua tendo o que exibir. Exatamente uma linha é gravada nos dois
    /// caminhos.
    pub async fn create_charge(&self, tenant_id: Uuid, input: NewCharge) -> Result<Charge, AppError> {
        if input.amount <= Decimal::ZERO {
            return Err(Self::validation_error("amount", "positive_amount_required"));
        }
        if input.description.trim().is_empty() {
            return Err(Self::validation_error("description", "required"));
        }

        let customer = self
            .customers
            .find_by_id(tenant_id, input.customer_id)
            .await?
            .ok_or(AppError::CustomerNotFound)?;

        // Token local: fallback de external_id e chave de idempotência.
        let correlation_id = Uuid::new_v4().to_string();

        let client = self.config.provider.and_then(|p| self.gateways.resolve(p));

        let request = CreateChargeRequest {
            amount: input.amount,
            description: input.description.clone(),
            payer: PayerInfo {
                full_name: customer.full_name.clone(),
                email: customer.email.clone(),
                document_number: customer.document_number.clone(),
            },
            due_date: input.due_date,
            correlation_id: correlation_id.clone(),
            webhook_url: self.config.public_base_url.as_ref().zip(self.config.provider).map(
                |(base, provider)| {
                    format!("{}/api/webhooks/{}", base.trim_end_matches('/'), provider.as_path_name())
                },
            ),
        };

        let mut provider = None;
        let mut external_id = correlation_id.clone();
        let mut payment_artifact = None;
        let mut payment_link = None;
        let mut gateway_active = false;

        if let Some(client) = client {
            let attempt = match input.kind {
                ChargeKind::Pix => client.create_pix_charge(&request).await,
                ChargeKind::Boleto => client.create_boleto_charge(&request).await,
            };

            match attempt {
                Ok(created) => {
                    provider = Some(client.provider());
                    external_id = created.external_id;
                    payment_artifact = created.artifact;
                    payment_link = created.payment_link;
                    gateway_active = true;
                }
                Err(e) => {
                    // Modo manual/offline: a cobrança existe mesmo assim.
                    tracing::warn!(
                        "Gateway indisponível na criação da cobrança ({}): {}",
                        correlation_id,
                        e
                    );
                }
            }
        } else {
            tracing::debug!("Nenhum gateway configurado; cobrança {} em modo manual", correlation_id);
        }

        let now = Utc::now();
        let charge = Charge {
            id: Uuid::new_v4(),
            tenant_id,
            customer_id: customer.id,
            description: input.description,
            amount: input.amount,
            kind: input.kind,
            due_date: input.due_date,
            provider,
            correlation_id,
            external_id,
            payment_artifact,
            payment_link,
            gateway_active,
            status: ChargeStatus::Pending,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        self.charges.insert(&charge).await?;

        Ok(charge)
    }

    pub async fn get_charge(&self, tenant_id: Uuid, id: Uuid) -> Result<Charge, AppError> {
        self.charges
            .find_by_id(tenant_id, id)
            .await?
            .ok_or(AppError::ChargeNotFound)
    }

    pub async fn list_charges(&self, tenant_id: Uuid) -> Result<Vec<Charge>, AppError> {
        self.charges.list(tenant_id).await
    }

    /// Busca da página pública de pagamento (token = correlation_id ou id).
    pub async fn find_by_payment_token(&self, token: &str) -> Result<Charge, AppError> {
        self.charges
            .find_by_payment_token(token)
            .await?
            .ok_or(AppError::ChargeNotFound)
    }

    /// Baixa manual pelo operador. Diferente da reconciliação, que absorve
    /// conflitos em silêncio, uma ação explícita sobre cobrança já
    /// finalizada falha com 409.
    pub async fn settle_manually(&self, tenant_id: Uuid, id: Uuid) -> Result<Charge, AppError> {
        let charge = self.get_charge(tenant_id, id).await?;

        if charge.status.is_terminal() {
            return Err(AppError::ChargeAlreadyFinalized);
        }

        let paid_at = Utc::now();
        let updated = self
            .charges
            .apply_transition(tenant_id, charge.id, charge.status, ChargeStatus::Paid, Some(paid_at))
            .await?;

        if !updated {
            // Alguém mudou o status no meio do caminho; recarrega e decide.
            let current = self.get_charge(tenant_id, id).await?;
            if current.status == ChargeStatus::Paid {
                return Ok(current);
            }
            return Err(AppError::ChargeAlreadyFinalized);
        }

        self.ledger
            .record_payment(NewLedgerEntry {
                tenant_id,
                charge_id: charge.id,
                customer_id: charge.customer_id,
                amount: charge.amount,
                paid_at,
            })
            .await?;

        self.get_charge(tenant_id, id).await
    }

    /// Exclusão física, só enquanto PENDING (cobrança quitada referencia
    /// lançamento contábil e nunca sai do histórico).
    pub async fn delete_charge(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let charge = self.get_charge(tenant_id, id).await?;

        if charge.status != ChargeStatus::Pending {
            return Err(AppError::ChargeNotDeletable);
        }

        if self.charges.delete_pending(tenant_id, id).await? {
            Ok(())
        } else {
            // O status mudou entre a leitura e o DELETE.
            Err(AppError::ChargeNotDeletable)
        }
    }
}
