// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

use crate::common::error::ApiError;

// O nome do nosso cabeçalho HTTP customizado
const TENANT_ID_HEADER: &str = "x-tenant-id";

// Extrator do tenant dono da requisição. Todo acesso a dados de cobrança
// passa por este UUID; requisição sem ele nem chega ao handler.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    // Usamos ApiError como rejeição, pois ele já implementa IntoResponse
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let reject = |message: &str| ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
            details: None,
        };

        let header_value = parts
            .headers
            .get(TENANT_ID_HEADER)
            .ok_or_else(|| reject("O cabeçalho X-Tenant-ID é obrigatório."))?;

        let value_str = header_value
            .to_str()
            .map_err(|_| reject("Cabeçalho X-Tenant-ID contém caracteres inválidos."))?;

        let tenant_id = Uuid::parse_str(value_str)
            .map_err(|_| reject("Cabeçalho X-Tenant-ID inválido (não é um UUID)."))?;

        Ok(TenantContext(tenant_id))
    }
}
