// src/lib.rs

use axum::{
    Json,
    Router,
    routing::{get, post},
};
use utoipa::OpenApi;

pub mod common;
pub mod config;
pub mod db;
pub mod docs;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use crate::config::AppState;

/// Monta o router completo. Fica na lib para os testes de integração
/// dirigirem a API em processo, sem subir servidor.
pub fn build_router(app_state: AppState) -> Router {
    let billing_routes = Router::new()
        .route(
            "/charges",
            post(handlers::billing::create_charge).get(handlers::billing::list_charges),
        )
        .route(
            "/charges/{id}",
            get(handlers::billing::get_charge).delete(handlers::billing::delete_charge),
        )
        .route("/charges/{id}/settle", post(handlers::billing::settle_charge));

    let crm_routes = Router::new().route(
        "/customers",
        post(handlers::crm::create_customer).get(handlers::crm::list_customers),
    );

    // Rotas públicas: o gateway e o pagador não têm tenant nem login.
    let webhook_routes = Router::new().route(
        "/{gateway}",
        post(handlers::webhooks::receive).get(handlers::webhooks::probe),
    );

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/docs/openapi.json",
            get(|| async { Json(docs::ApiDoc::openapi()) }),
        )
        .nest("/api/billing", billing_routes)
        .nest("/api/crm", crm_routes)
        .nest("/api/webhooks", webhook_routes)
        .route("/api/pay/{token}", get(handlers::billing::payment_page))
        .with_state(app_state)
}
