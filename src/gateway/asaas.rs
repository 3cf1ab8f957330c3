// src/gateway/asaas.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::gateway::{
    CreateChargeRequest, GatewayCharge, GatewayClient, GatewayError, StatusSnapshot, WebhookEvent,
};
use crate::models::billing::GatewayProvider;

const DEFAULT_BASE_URL: &str = "https://api.asaas.com/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cliente da API do Asaas (/v3).
///
/// O Asaas exige um cadastro de cliente próprio antes da cobrança; o
/// adaptador procura pelo CPF/CNPJ e cria quando não existe. O webhook é
/// configurado por conta no painel do Asaas, não por cobrança.
#[derive(Clone)]
pub struct AsaasClient {
    client: Client,
    base_url: String,
    api_key: String,
}

// --- Formas de resposta da API ---

#[derive(Debug, Deserialize)]
struct CustomerPage {
    data: Vec<CustomerResponse>,
}

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    id: String,
    status: String,
    value: Option<Decimal>,
    payment_date: Option<NaiveDate>,
    confirmed_date: Option<NaiveDate>,
    bank_slip_url: Option<String>,
    invoice_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PixQrCodeResponse {
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentificationFieldResponse {
    identification_field: Option<String>,
}

impl AsaasClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Permite apontar para um servidor de testes.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_rejection(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_else(|_| "sem detalhe".to_string());
        Err(GatewayError::Rejected { status, message })
    }

    /// Procura o cliente pelo CPF/CNPJ; cria quando não encontrado.
    async fn ensure_customer(&self, request: &CreateChargeRequest) -> Result<String, GatewayError> {
        if let Some(document) = &request.payer.document_number {
            let response = self
                .client
                .get(self.url("/customers"))
                .header("access_token", &self.api_key)
                .query(&[("cpfCnpj", document.as_str())])
                .send()
                .await?;

            let page = Self::check_rejection(response)
                .await?
                .json::<CustomerPage>()
                .await?;

            if let Some(existing) = page.data.into_iter().next() {
                return Ok(existing.id);
            }
        }

        let response = self
            .client
            .post(self.url("/customers"))
            .header("access_token", &self.api_key)
            .json(&json!({
                "name": request.payer.full_name,
                "email": request.payer.email,
                "cpfCnpj": request.payer.document_number,
            }))
            .send()
            .await?;

        let created = Self::check_rejection(response)
            .await?
            .json::<CustomerResponse>()
            .await?;

        Ok(created.id)
    }

    async fn create_payment(
        &self,
        request: &CreateChargeRequest,
        billing_type: &str,
    ) -> Result<PaymentResponse, GatewayError> {
        let customer_id = self.ensure_customer(request).await?;

        // O Asaas não aceita cobrança sem vencimento.
        let due_date = request.due_date.unwrap_or_else(|| Utc::now().date_naive());

        let response = self
            .client
            .post(self.url("/payments"))
            .header("access_token", &self.api_key)
            .json(&json!({
                "customer": customer_id,
                "billingType": billing_type,
                "value": request.amount,
                "description": request.description,
                "dueDate": due_date.format("%Y-%m-%d").to_string(),
                // Chave de correlação local; também deduplica reenvios.
                "externalReference": request.correlation_id,
            }))
            .send()
            .await?;

        Ok(Self::check_rejection(response)
            .await?
            .json::<PaymentResponse>()
            .await?)
    }

    fn date_to_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
        date.and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    }
}

#[async_trait]
impl GatewayClient for AsaasClient {
    fn provider(&self) -> GatewayProvider {
        GatewayProvider::Asaas
    }

    async fn create_pix_charge(&self, request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let payment = self.create_payment(request, "PIX").await?;

        // O copia-e-cola sai de uma segunda chamada.
        let response = self
            .client
            .get(self.url(&format!("/payments/{}/pixQrCode", payment.id)))
            .header("access_token", &self.api_key)
            .send()
            .await?;

        let qr = Self::check_rejection(response)
            .await?
            .json::<PixQrCodeResponse>()
            .await?;

        Ok(GatewayCharge {
            external_id: payment.id,
            artifact: qr.payload,
            payment_link: payment.invoice_url,
        })
    }

    async fn create_boleto_charge(&self, request: &CreateChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let payment = self.create_payment(request, "BOLETO").await?;

        let response = self
            .client
            .get(self.url(&format!("/payments/{}/identificationField", payment.id)))
            .header("access_token", &self.api_key)
            .send()
            .await?;

        let field = Self::check_rejection(response)
            .await?
            .json::<IdentificationFieldResponse>()
            .await?;

        Ok(GatewayCharge {
            external_id: payment.id,
            artifact: field.identification_field,
            payment_link: payment.bank_slip_url.or(payment.invoice_url),
        })
    }

    async fn query_status(&self, external_id: &str) -> Option<StatusSnapshot> {
        let response = match self
            .client
            .get(self.url(&format!("/payments/{}", external_id)))
            .header("access_token", &self.api_key)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Asaas: consulta de {} falhou: {}", external_id, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Asaas: consulta de {} devolveu {}", external_id, response.status());
            return None;
        }

        match response.json::<PaymentResponse>().await {
            Ok(payment) => Some(StatusSnapshot {
                remote_status: payment.status,
                paid_at: payment
                    .payment_date
                    .or(payment.confirmed_date)
                    .and_then(Self::date_to_utc),
                amount_paid: payment.value,
            }),
            Err(e) => {
                tracing::warn!("Asaas: resposta ilegível para {}: {}", external_id, e);
                None
            }
        }
    }

    /// Envelope do Asaas: {event: "PAYMENT_*", payment: {id, status, ...}}.
    /// O status embutido fica disponível como fallback da re-consulta.
    fn parse_webhook(&self, payload: &Value) -> Option<WebhookEvent> {
        let event = payload.get("event").and_then(Value::as_str)?;
        if !event.starts_with("PAYMENT_") {
            return None;
        }

        let payment = payload.get("payment")?;
        let external_id = payment.get("id").and_then(Value::as_str)?.to_string();

        let remote_status = payment
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);

        let paid_at = payment
            .get("paymentDate")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<NaiveDate>().ok())
            .and_then(Self::date_to_utc);

        let amount_paid = payment
            .get("value")
            .and_then(Value::as_f64)
            .and_then(Decimal::from_f64_retain);

        Some(WebhookEvent {
            external_id,
            remote_status,
            paid_at,
            amount_paid,
        })
    }
}
