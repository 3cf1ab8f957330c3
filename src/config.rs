// src/config.rs

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use std::{env, time::Duration};

use crate::{
    db::{ChargeRepository, CustomerRepository, LedgerRepository},
    gateway::{AsaasClient, GatewayRegistry, MercadoPagoClient, SandboxGateway},
    middleware::i18n::I18nStore,
    models::billing::GatewayProvider,
    services::{BillingConfig, ChargeService, CrmService, ReconciliationService},
};

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub charge_service: ChargeService,
    pub reconciliation_service: ReconciliationService,
    pub crm_service: CrmService,
    pub i18n_store: I18nStore,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let gateways = build_gateway_registry();
        let provider = env::var("PAYMENT_PROVIDER")
            .ok()
            .and_then(|name| GatewayProvider::from_path_name(&name));

        match provider {
            Some(p) => tracing::info!("💳 Gateway de pagamento ativo: {}", p.as_path_name()),
            None => tracing::warn!("💳 Nenhum gateway configurado; cobranças nascem em modo manual"),
        }

        let billing_config = BillingConfig {
            provider,
            public_base_url: env::var("PUBLIC_BASE_URL").ok(),
        };

        // --- Monta o gráfico de dependências ---
        let charge_repo = Arc::new(ChargeRepository::new(db_pool.clone()));
        let ledger_repo = Arc::new(LedgerRepository::new(db_pool.clone()));
        let customer_repo = Arc::new(CustomerRepository::new(db_pool.clone()));

        let charge_service = ChargeService::new(
            charge_repo.clone(),
            customer_repo.clone(),
            ledger_repo.clone(),
            gateways.clone(),
            billing_config,
        );
        let reconciliation_service =
            ReconciliationService::new(charge_repo, ledger_repo, gateways);
        let crm_service = CrmService::new(customer_repo);

        Ok(Self {
            db_pool,
            charge_service,
            reconciliation_service,
            crm_service,
            i18n_store: I18nStore::new(),
        })
    }
}

/// Registra os gateways com credenciais presentes no ambiente. Um provedor
/// sem credencial simplesmente não entra no registro; criação de cobrança
/// sem gateway cai no modo manual.
fn build_gateway_registry() -> GatewayRegistry {
    let mut gateways = GatewayRegistry::new();

    if let Ok(token) = env::var("MERCADO_PAGO_ACCESS_TOKEN") {
        gateways.register(Arc::new(MercadoPagoClient::new(token)));
    }

    if let Ok(api_key) = env::var("ASAAS_API_KEY") {
        gateways.register(Arc::new(AsaasClient::new(api_key)));
    }

    // O sandbox só existe quando pedido explicitamente.
    if env::var("PAYMENT_PROVIDER").as_deref() == Ok("sandbox") {
        gateways.register(Arc::new(SandboxGateway::new()));
    }

    gateways
}
