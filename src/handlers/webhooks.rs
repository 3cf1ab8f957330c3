// src/handlers/webhooks.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::config::AppState;

// POST /api/webhooks/{gateway}
//
// Sempre 200. Os gateways reentregam agressivamente qualquer resposta
// não-2xx, e reentrega não pode virar efeito colateral duplicado — a
// idempotência fica na regra de transição, não aqui.
#[utoipa::path(
    post,
    path = "/api/webhooks/{gateway}",
    tag = "Webhooks",
    request_body = String,
    responses(
        (status = 200, description = "Evento recebido (qualquer desfecho interno)")
    ),
    params(
        ("gateway" = String, Path, description = "mercadopago | asaas | sandbox")
    )
)]
pub async fn receive(
    State(app_state): State<AppState>,
    Path(gateway): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    // Corpo cru de propósito: payload ilegível também merece 200.
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            if let Err(e) = app_state
                .reconciliation_service
                .process_webhook(&gateway, &payload)
                .await
            {
                // Erro interno não volta para o gateway; fica no log.
                tracing::error!("Falha ao processar webhook de {}: {:?}", gateway, e);
            }
        }
        Err(e) => {
            tracing::debug!("Webhook de {} com corpo ilegível: {}", gateway, e);
        }
    }

    (StatusCode::OK, Json(json!({ "received": true })))
}

// GET /api/webhooks/{gateway}
// Sonda de vida usada na configuração do webhook no painel do gateway.
#[utoipa::path(
    get,
    path = "/api/webhooks/{gateway}",
    tag = "Webhooks",
    responses(
        (status = 200, description = "Endpoint no ar")
    ),
    params(
        ("gateway" = String, Path, description = "mercadopago | asaas | sandbox")
    )
)]
pub async fn probe(Path(_gateway): Path<String>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
