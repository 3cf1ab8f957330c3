// src/docs.rs

use crate::handlers;
use crate::models;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Cobranças ---
        handlers::billing::create_charge,
        handlers::billing::list_charges,
        handlers::billing::get_charge,
        handlers::billing::settle_charge,
        handlers::billing::delete_charge,
        handlers::billing::payment_page,

        // --- Webhooks ---
        handlers::webhooks::receive,
        handlers::webhooks::probe,

        // --- CRM ---
        handlers::crm::create_customer,
        handlers::crm::list_customers,
    ),
    components(
        schemas(
            // --- Cobranças ---
            models::billing::ChargeKind,
            models::billing::ChargeStatus,
            models::billing::GatewayProvider,
            models::billing::Charge,
            models::billing::PublicCharge,
            models::billing::LedgerEntry,

            // --- CRM ---
            models::crm::Customer,

            // --- Payloads ---
            handlers::billing::CreateChargePayload,
            handlers::crm::CreateCustomerPayload,
        )
    ),
    tags(
        (name = "Cobranças", description = "Criação, reconciliação e baixa de cobranças"),
        (name = "Webhooks", description = "Notificações dos gateways de pagamento"),
        (name = "CRM", description = "Gestão de clientes (pagadores)")
    )
)]
pub struct ApiDoc;
