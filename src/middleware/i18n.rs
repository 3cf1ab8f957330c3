// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

// Nosso extrator de idioma
#[derive(Debug, Clone)]
pub struct Locale(pub String);

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let default_lang = "en".to_string();

        let lang = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .and_then(|header_str| {
                accept_language::parse(header_str)
                    .first()
                    // "pt-BR" -> "pt"; "en" -> "en"
                    .map(|tag| tag.split('-').next().unwrap_or(tag).to_string())
            })
            .unwrap_or(default_lang);

        Ok(Locale(lang))
    }
}

/// Catálogo de mensagens por código de erro. Chaveado pelo idioma do
/// Accept-Language; qualquer idioma fora do catálogo cai no inglês.
#[derive(Debug, Clone, Default)]
pub struct I18nStore;

impl I18nStore {
    pub fn new() -> Self {
        Self
    }

    pub fn translate(&self, locale: &Locale, code: &str) -> String {
        let msg = match (locale.0.as_str(), code) {
            ("pt", "validation_failed") => "Um ou mais campos são inválidos.",
            ("pt", "customer_not_found") => "Cliente não encontrado.",
            ("pt", "charge_not_found") => "Cobrança não encontrada.",
            ("pt", "charge_already_finalized") => "A cobrança já foi quitada ou cancelada.",
            ("pt", "charge_not_deletable") => "Apenas cobranças pendentes podem ser excluídas.",
            ("pt", "invalid_tenant_header") => "Cabeçalho X-Tenant-ID ausente ou inválido.",
            ("pt", "internal_error") => "Ocorreu um erro inesperado.",

            (_, "validation_failed") => "One or more fields are invalid.",
            (_, "customer_not_found") => "Customer not found.",
            (_, "charge_not_found") => "Charge not found.",
            (_, "charge_already_finalized") => "Charge has already been settled or cancelled.",
            (_, "charge_not_deletable") => "Only pending charges can be deleted.",
            (_, "invalid_tenant_header") => "Missing or invalid X-Tenant-ID header.",
            (_, "internal_error") => "An unexpected error occurred.",

            (_, other) => other,
        };
        msg.to_string()
    }
}
