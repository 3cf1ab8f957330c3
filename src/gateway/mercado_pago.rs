// src/gateway/mercado_pago.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::gateway::{
    CreateChargeRequest, GatewayCharge, GatewayClient, GatewayError, StatusSnapshot, WebhookEvent,
};
use crate::models::billing::GatewayProvider;

const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cliente da API de pagamentos do Mercado Pago (/v1/payments).
///
/// A idempotência de criação é garantida pelo cabeçalho X-Idempotency-Key,
/// preenchido com o correlation_id da cobrança.
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: Client,
    base_url: String,
    access_token: String,
}

// --- Formas de resposta da API ---

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: i64,
    status: String,
    date_approved: Option<DateTime<Utc>>,
    transaction_amount: Option<Decimal>,
    point_of_interaction: Option<PointOfInteraction>,
    transaction_details: Option<TransactionDetails>,
    barcode: Option<Barcode>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    ticket_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionDetails {
    external_resource_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Barcode {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL.to_string())
    }

    /// Permite apontar para um servidor de testes.
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    async fn create_payment(
        &self,
        request: &CreateChargeRequest,
        body: Value,
    ) -> Result<PaymentResponse, GatewayError> {
        let url = format!("{}/v1/payments", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            // Mesma chave, mesma cobrança: o gateway descarta repetições.
            .header("X-Idempotency-Key", &request.correlation_id)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "sem detalhe".to_string());
            return Err(GatewayError::Rejected { status, message });
        }

        Ok(response.json::<PaymentResponse>().await?)
    }

    fn payer_body(&self, request: &CreateChargeRequest) -> Value {
        let mut payer = json!({});
        if let Some(email) = &request.payer.email {
            payer["email"] = json!(email);
        }
        let mut names = request.payer.full_name.splitn(2, ' ');
        if let Some(first) = names.next() {
            payer["first_name"] = json!(first);
        }
        if let Some(last) = names.next() {
            payer["last_name"] = json!(last);
        }
        if let Some(document) = &request.payer.document_number {
            payer["identification"] = json!({ "type": "CPF", "number": document });
        }
        payer
    }
}

#[async_trait]
impl GatewayClient for MercadoPagoClient {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::MercadoPago
    }

    async fn create_pix_charge(&self, request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let body = json!({
            "transaction_amount": request.amount,
            "description": request.description,
            "payment_method_id": "pix",
            "external_reference": request.correlation_id,
            "notification_url": request.webhook_url,
            "payer": self.payer_body(request),
        });

        let payment = self.create_payment(request, body).await?;

        let transaction_data = payment
            .point_of_interaction
            .and_then(|poi| poi.transaction_data);

        let (qr_code, ticket_url) = match transaction_data {
            Some(data) => (data.qr_code, data.ticket_url),
            None => (None, None),
        };

        Ok(GatewayCharge {
            external_id: payment.id.to_string(),
            artifact: qr_code,
            payment_link: ticket_url,
        })
    }

    async fn create_boleto_charge(&self, request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let expiration = request
            .due_date
            .map(|d| format!("{}T23:59:59.000-03:00", d.format("%Y-%m-%d")));

        let body = json!({
            "transaction_amount": request.amount,
            "description": request.description,
            "payment_method_id": "bolbradesco",
            "external_reference": request.correlation_id,
            "notification_url": request.webhook_url,
            "date_of_expiration": expiration,
            "payer": self.payer_body(request),
        });

        let payment = self.create_payment(request, body).await?;

        Ok(GatewayCharge {
            external_id: payment.id.to_string(),
            artifact: payment.barcode.and_then(|b| b.content),
            payment_link: payment
                .transaction_details
                .and_then(|d| d.external_resource_url),
        })
    }

    async fn query_status(&self, external_id: &str) -> Option<StatusSnapshot> {
        let url = format!("{}/v1/payments/{}", self.base_url, external_id);

        let response = match self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Mercado Pago: consulta de {} falhou: {}", external_id, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "Mercado Pago: consulta de {} devolveu {}",
                external_id,
                response.status()
            );
            return None;
        }

        match response.json::<PaymentResponse>().await {
            Ok(payment) => Some(StatusSnapshot {
                remote_status: payment.status,
                paid_at: payment.date_approved,
                amount_paid: payment.transaction_amount,
            }),
            Err(e) => {
                tracing::warn!("Mercado Pago: resposta ilegível para {}: {}", external_id, e);
                None
            }
        }
    }

    /// O envelope do Mercado Pago ({type: "payment", data: {id}}) não traz
    /// status nenhum; quem recebe é obrigado a re-consultar a API.
    fn parse_webhook(&self, payload: &Value) -> Option<WebhookEvent> {
        let kind = payload
            .get("type")
            .or_else(|| payload.get("topic"))
            .and_then(Value::as_str)?;
        if kind != "payment" {
            return None;
        }

        let id = payload.get("data").and_then(|d| d.get("id"))?;
        let external_id = match id {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        Some(WebhookEvent {
            external_id,
            remote_status: None,
            paid_at: None,
            amount_paid: None,
        })
    }
}
