// src/models/billing.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "charge_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeKind {
    Pix,
    Boleto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "charge_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeStatus {
    Pending,   // Aguardando pagamento
    Paid,      // Quitada (terminal)
    Overdue,   // Vencida (ainda pode virar Paid ou Cancelled)
    Cancelled, // Cancelada (terminal)
}

impl ChargeStatus {
    /// PAID e CANCELLED são estados finais: nenhuma transição sai deles.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChargeStatus::Paid | ChargeStatus::Cancelled)
    }

    /// Arestas permitidas da máquina de estados da cobrança.
    pub fn can_transition_to(self, next: ChargeStatus) -> bool {
        use ChargeStatus::*;
        matches!(
            (self, next),
            (Pending, Paid) | (Pending, Overdue) | (Pending, Cancelled) | (Overdue, Paid) | (Overdue, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "gateway_provider", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayProvider {
    MercadoPago,
    Asaas,
    Sandbox,
}

impl GatewayProvider {
    /// Nome usado no path do webhook: /api/webhooks/{nome}
    pub fn as_path_name(self) -> &'static str {
        match self {
            GatewayProvider::MercadoPago => "mercadopago",
            GatewayProvider::Asaas => "asaas",
            GatewayProvider::Sandbox => "sandbox",
        }
    }

    pub fn from_path_name(name: &str) -> Option<Self> {
        match name {
            "mercadopago" => Some(GatewayProvider::MercadoPago),
            "asaas" => Some(GatewayProvider::Asaas),
            "sandbox" => Some(GatewayProvider::Sandbox),
            _ => None,
        }
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    pub customer_id: Uuid,

    #[schema(example = "Mensalidade dedetização - Julho")]
    pub description: String,

    #[schema(example = "250.00")]
    pub amount: Decimal,

    pub kind: ChargeKind,

    #[schema(value_type = Option<String>, format = Date, example = "2025-08-10")]
    pub due_date: Option<NaiveDate>,

    /// Gateway responsável pela cobrança. None = modo manual/offline.
    pub provider: Option<GatewayProvider>,

    /// Token local único: fallback de externalId, chave de idempotência no
    /// gateway e identificador da página pública de pagamento.
    #[schema(example = "b5a9361e-9f3c-4e7d-8f21-0a4a6f1c2d33")]
    pub correlation_id: String,

    /// Id do pagamento emitido pelo gateway. Se a criação remota falhou,
    /// permanece igual ao correlation_id.
    #[schema(example = "999")]
    pub external_id: String,

    /// Copia-e-cola PIX ou linha digitável do boleto.
    pub payment_artifact: Option<String>,

    pub payment_link: Option<String>,

    /// false = o gateway não conhece esta cobrança; a reconciliação pula.
    pub gateway_active: bool,

    pub status: ChargeStatus,

    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Charge {
    /// Visão pública (página de pagamento): sem ids internos do tenant.
    pub fn to_public(&self) -> PublicCharge {
        PublicCharge {
            description: self.description.clone(),
            amount: self.amount,
            kind: self.kind,
            status: self.status,
            due_date: self.due_date,
            payment_artifact: self.payment_artifact.clone(),
            payment_link: self.payment_link.clone(),
        }
    }
}

/// O que a página pública de pagamento pode ver de uma cobrança.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicCharge {
    #[schema(example = "Mensalidade dedetização - Julho")]
    pub description: String,

    #[schema(example = "250.00")]
    pub amount: Decimal,

    pub kind: ChargeKind,
    pub status: ChargeStatus,

    #[schema(value_type = Option<String>, format = Date, example = "2025-08-10")]
    pub due_date: Option<NaiveDate>,

    pub payment_artifact: Option<String>,
    pub payment_link: Option<String>,
}

/// Lançamento contábil gerado na transição para PAID (um por cobrança).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,

    #[schema(ignore)]
    pub tenant_id: Uuid,

    pub charge_id: Uuid,
    pub customer_id: Uuid,

    #[schema(example = "250.00")]
    pub amount: Decimal,

    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
