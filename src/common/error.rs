// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::middleware::i18n::{I18nStore, Locale};

// Nosso tipo de erro interno, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Cliente não encontrado")]
    CustomerNotFound,

    #[error("Cobrança não encontrada")]
    ChargeNotFound,

    // Ação explícita do operador sobre cobrança em estado final.
    #[error("Cobrança já finalizada")]
    ChargeAlreadyFinalized,

    #[error("Cobrança não pode ser excluída")]
    ChargeNotDeletable,

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Código estável do erro. A mensagem exibida sai do catálogo i18n,
    /// nunca daqui.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_failed",
            AppError::CustomerNotFound => "customer_not_found",
            AppError::ChargeNotFound => "charge_not_found",
            AppError::ChargeAlreadyFinalized => "charge_already_finalized",
            AppError::ChargeNotDeletable => "charge_not_deletable",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::CustomerNotFound | AppError::ChargeNotFound => StatusCode::NOT_FOUND,
            AppError::ChargeAlreadyFinalized | AppError::ChargeNotDeletable => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Converte para a resposta HTTP, traduzindo a mensagem pelo catálogo.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        // Erros 5xx carregam detalhe só no log; a resposta fica genérica.
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro interno do servidor: {:?}", self);
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                // Mapa campo -> códigos de erro (códigos, não frases).
                let mut fields: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    fields.insert(field.to_string(), codes);
                }
                Some(json!(fields))
            }
            _ => None,
        };

        ApiError {
            status: self.status(),
            message: store.translate(locale, self.code()),
            details,
        }
    }
}

// A forma final do erro na borda HTTP. Também é usado como Rejection
// pelos extratores (TenantContext), por já implementar IntoResponse.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => Json(json!({ "error": self.message, "details": details })),
            None => Json(json!({ "error": self.message })),
        };
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erros_4xx_tem_status_correto() {
        assert_eq!(AppError::CustomerNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ChargeNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ChargeAlreadyFinalized.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::ChargeNotDeletable.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validacao_vira_400_com_details() {
        let mut errors = validator::ValidationErrors::new();
        let mut err = validator::ValidationError::new("range");
        err.message = Some("positive_amount_required".into());
        errors.add("amount", err);

        let api = AppError::ValidationError(errors).to_api_error(&Locale("pt".into()), &I18nStore::new());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        let details = api.details.expect("validação devolve details");
        assert_eq!(details["amount"][0], "positive_amount_required");
    }
}
