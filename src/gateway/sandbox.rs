// src/gateway/sandbox.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::gateway::{
    CreateChargeRequest, GatewayCharge, GatewayClient, GatewayError, StatusSnapshot, WebhookEvent,
};
use crate::models::billing::GatewayProvider;

/// Gateway simulado, sem rede. Usado nos testes e em desenvolvimento local
/// (PAYMENT_PROVIDER=sandbox): emite ids próprios e responde consultas a
/// partir de um roteiro controlado por `set_status`.
#[derive(Default)]
pub struct SandboxGateway {
    sequence: AtomicU64,
    fail_creations: AtomicBool,
    statuses: Mutex<HashMap<String, StatusSnapshot>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define o estado que as próximas consultas deste pagamento enxergam.
    pub fn set_status(
        &self,
        external_id: &str,
        remote_status: &str,
        paid_at: Option<DateTime<Utc>>,
        amount_paid: Option<Decimal>,
    ) {
        let mut statuses = self.statuses.lock().expect("lock do roteiro");
        statuses.insert(
            external_id.to_string(),
            StatusSnapshot {
                remote_status: remote_status.to_string(),
                paid_at,
                amount_paid,
            },
        );
    }

    /// Esquece um pagamento: consultas passam a devolver `None`.
    pub fn forget(&self, external_id: &str) {
        self.statuses.lock().expect("lock do roteiro").remove(external_id);
    }

    /// Liga/desliga a simulação de indisponibilidade na criação.
    pub fn fail_creations(&self, fail: bool) {
        self.fail_creations.store(fail, Ordering::SeqCst);
    }

    fn create(&self, prefix: &str) -> Result<GatewayCharge, GatewayError> {
        if self.fail_creations.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "sandbox indisponível".to_string(),
            });
        }

        let external_id = format!("sb-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        self.set_status(&external_id, "pending", None, None);

        Ok(GatewayCharge {
            artifact: Some(format!("{}-{}", prefix, external_id)),
            payment_link: Some(format!("https://sandbox.invalid/pay/{}", external_id)),
            external_id,
        })
    }
}

#[async_trait]
impl GatewayClient for SandboxGateway {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Sandbox
    }

    async fn create_pix_charge(&self, _request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError> {
        self.create("00020126-sandbox-pix")
    }

    async fn create_boleto_charge(&self, _request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError> {
        self.create("23790-sandbox-boleto")
    }

    async fn query_status(&self, external_id: &str) -> Option<StatusSnapshot> {
        self.statuses
            .lock()
            .expect("lock do roteiro")
            .get(external_id)
            .cloned()
    }

    /// Envelope próprio do sandbox: {"externalId": "...", "status": "..."}.
    fn parse_webhook(&self, payload: &Value) -> Option<WebhookEvent> {
        let external_id = payload.get("externalId").and_then(Value::as_str)?.to_string();

        Some(WebhookEvent {
            external_id,
            remote_status: payload.get("status").and_then(Value::as_str).map(str::to_string),
            paid_at: payload
                .get("paidAt")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
            amount_paid: payload
                .get("amountPaid")
                .and_then(Value::as_f64)
                .and_then(Decimal::from_f64_retain),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PayerInfo;

    fn request() -> CreateChargeRequest {
        CreateChargeRequest {
            amount: "10.00".parse().unwrap(),
            description: "teste".to_string(),
            payer: PayerInfo {
                full_name: "Cliente".to_string(),
                email: None,
                document_number: None,
            },
            due_date: None,
            correlation_id: "corr-sb".to_string(),
            webhook_url: None,
        }
    }

    #[tokio::test]
    async fn criacao_gera_ids_sequenciais_e_roteiro_pendente() {
        let gateway = SandboxGateway::new();

        let first = gateway.create_pix_charge(&request()).await.unwrap();
        let second = gateway.create_pix_charge(&request()).await.unwrap();

        assert_eq!(first.external_id, "sb-1");
        assert_eq!(second.external_id, "sb-2");
        assert_eq!(gateway.query_status("sb-1").await.unwrap().remote_status, "pending");
    }

    #[tokio::test]
    async fn falha_simulada_nao_cria_pagamento() {
        let gateway = SandboxGateway::new();
        gateway.fail_creations(true);

        assert!(gateway.create_pix_charge(&request()).await.is_err());
        assert!(gateway.query_status("sb-1").await.is_none());
    }
}
