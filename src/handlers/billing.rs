// src/handlers/billing.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::TenantContext},
    models::billing::{Charge, ChargeKind, PublicCharge},
    services::NewCharge,
};

// ---
// Validação Customizada
// ---
fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("positive_amount_required".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payload: CreateCharge
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargePayload {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub customer_id: Uuid,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Mensalidade dedetização - Julho")]
    pub description: String,

    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "250.00")]
    pub amount: Decimal,

    #[schema(example = "PIX")]
    pub kind: ChargeKind,

    #[schema(value_type = Option<String>, format = Date, example = "2025-08-10")]
    pub due_date: Option<NaiveDate>,
}

// POST /api/billing/charges
#[utoipa::path(
    post,
    path = "/api/billing/charges",
    tag = "Cobranças",
    request_body = CreateChargePayload,
    responses(
        (status = 201, description = "Cobrança criada (com ou sem gateway)", body = Charge),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Cliente não encontrado")
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn create_charge(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Json(payload): Json<CreateChargePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let charge = app_state
        .charge_service
        .create_charge(
            tenant.0,
            NewCharge {
                customer_id: payload.customer_id,
                description: payload.description,
                amount: payload.amount,
                kind: payload.kind,
                due_date: payload.due_date,
            },
        )
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(charge)))
}

// GET /api/billing/charges
#[utoipa::path(
    get,
    path = "/api/billing/charges",
    tag = "Cobranças",
    responses(
        (status = 200, description = "Lista de cobranças do tenant", body = Vec<Charge>)
    ),
    params(
        ("x-tenant-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn list_charges(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let charges = app_state
        .charge_service
        .list_charges(tenant.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(charges)))
}

// GET /api/billing/charges/{id}
#[utoipa::path(
    get,
    path = "/api/billing/charges/{id}",
    tag = "Cobranças",
    responses(
        (status = 200, description = "Cobrança atual (reconciliada na leitura)", body = Charge),
        (status = 404, description = "Não encontrada ou de outro tenant")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cobrança"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn get_charge(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let charge = app_state
        .charge_service
        .get_charge(tenant.0, id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    // Toda leitura de cobrança pendente sincroniza com o gateway.
    let charge = app_state
        .reconciliation_service
        .reconcile_on_read(charge)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(charge)))
}

// POST /api/billing/charges/{id}/settle
#[utoipa::path(
    post,
    path = "/api/billing/charges/{id}/settle",
    tag = "Cobranças",
    responses(
        (status = 200, description = "Cobrança baixada manualmente", body = Charge),
        (status = 404, description = "Não encontrada"),
        (status = 409, description = "Já quitada ou cancelada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cobrança"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn settle_charge(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let charge = app_state
        .charge_service
        .settle_manually(tenant.0, id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(charge)))
}

// DELETE /api/billing/charges/{id}
#[utoipa::path(
    delete,
    path = "/api/billing/charges/{id}",
    tag = "Cobranças",
    responses(
        (status = 204, description = "Cobrança pendente excluída"),
        (status = 404, description = "Não encontrada"),
        (status = 409, description = "Não está mais pendente")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da cobrança"),
        ("x-tenant-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn delete_charge(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .charge_service
        .delete_charge(tenant.0, id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/pay/{token}
// Página pública: o pagador não tem tenant nem login, só o token do link.
#[utoipa::path(
    get,
    path = "/api/pay/{token}",
    tag = "Cobranças",
    responses(
        (status = 200, description = "Visão pública da cobrança", body = PublicCharge),
        (status = 404, description = "Token desconhecido")
    ),
    params(
        ("token" = String, Path, description = "Correlation id ou id da cobrança")
    )
)]
pub async fn payment_page(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let charge = app_state
        .charge_service
        .find_by_payment_token(&token)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    // O refresh da página do pagador também conta como leitura pendente.
    let charge = app_state
        .reconciliation_service
        .reconcile_on_read(charge)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(charge.to_public())))
}
