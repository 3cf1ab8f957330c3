// src/gateway/mod.rs

pub mod asaas;
pub mod mercado_pago;
pub mod sandbox;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::billing::{ChargeStatus, GatewayProvider};

pub use asaas::AsaasClient;
pub use mercado_pago::MercadoPagoClient;
pub use sandbox::SandboxGateway;

// --- Tipos compartilhados entre os adaptadores ---

/// Dados do pagador repassados ao gateway.
#[derive(Debug, Clone)]
pub struct PayerInfo {
    pub full_name: String,
    pub email: Option<String>,
    pub document_number: Option<String>,
}

/// Pedido de criação de cobrança remota. O `correlation_id` é enviado como
/// chave de idempotência: repetir a mesma requisição não cria duas cobranças
/// no gateway.
#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub amount: Decimal,
    pub description: String,
    pub payer: PayerInfo,
    pub due_date: Option<NaiveDate>,
    pub correlation_id: String,
    pub webhook_url: Option<String>,
}

/// Resultado de uma criação remota bem-sucedida.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub external_id: String,
    /// Copia-e-cola PIX ou linha digitável do boleto.
    pub artifact: Option<String>,
    pub payment_link: Option<String>,
}

/// Estado autoritativo de um pagamento, lido do gateway.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub remote_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub amount_paid: Option<Decimal>,
}

/// Evento de webhook já decodificado do envelope do provedor. Os campos
/// opcionais só são usados como fallback quando a re-consulta falha.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub external_id: String,
    pub remote_status: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub amount_paid: Option<Decimal>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("falha na requisição HTTP: {0}")]
    Request(#[from] reqwest::Error),

    #[error("gateway recusou a operação ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("resposta inesperada do gateway: {0}")]
    InvalidResponse(String),
}

// --- O contrato que todo provedor implementa ---

#[async_trait]
pub trait GatewayClient: Send + Sync {
    fn provider(&self) -> GatewayProvider;

    async fn create_pix_charge(&self, request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError>;

    async fn create_boleto_charge(&self, request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError>;

    /// Consulta o estado autoritativo. `None` cobre tanto "não encontrado"
    /// quanto falha transitória: o chamador trata como "sem novidade" e
    /// nunca repassa erro ao usuário final.
    async fn query_status(&self, external_id: &str) -> Option<StatusSnapshot>;

    /// Decodifica o envelope de webhook do provedor. `None` = envelope de
    /// outra integração ou formato desconhecido.
    fn parse_webhook(&self, payload: &Value) -> Option<WebhookEvent>;
}

// --- Registro de provedores configurados ---

#[derive(Clone, Default)]
pub struct GatewayRegistry {
    clients: HashMap<GatewayProvider, Arc<dyn GatewayClient>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client: Arc<dyn GatewayClient>) {
        self.clients.insert(client.provider(), client);
    }

    pub fn resolve(&self, provider: GatewayProvider) -> Option<Arc<dyn GatewayClient>> {
        self.clients.get(&provider).cloned()
    }

    /// Resolve pelo nome usado no path do webhook (ex: "mercadopago").
    pub fn resolve_by_path_name(&self, name: &str) -> Option<Arc<dyn GatewayClient>> {
        GatewayProvider::from_path_name(name).and_then(|p| self.resolve(p))
    }
}

// --- Tabela fixa: vocabulário do gateway -> status interno ---

/// Mapeia o status do provedor para o vocabulário interno. Cobre os dois
/// gateways; status desconhecido devolve `None` (o chamador loga e ignora).
pub fn map_remote_status(raw: &str) -> Option<ChargeStatus> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        // Pagamento confirmado
        "approved" | "confirmed" | "received" | "received_in_cash" => Some(ChargeStatus::Paid),

        // Ainda aguardando
        "pending" | "authorized" | "in_process" | "in_mediation" | "awaiting_risk_analysis" => {
            Some(ChargeStatus::Pending)
        }

        // Vencida, mas ainda viva
        "overdue" => Some(ChargeStatus::Overdue),

        // Encerrada sem pagamento
        "rejected" | "cancelled" | "canceled" | "refunded" | "partially_refunded" | "charged_back"
        | "refund_requested" | "expired" => Some(ChargeStatus::Cancelled),

        _ => None,
    }
}
