//! Fluxo completo da API de cobranças, dirigido em processo com os armazéns
//! em memória e o gateway sandbox: nada de Postgres nem de rede.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use cobranca_backend::{
    AppState, build_router,
    db::InMemoryStore,
    gateway::{GatewayRegistry, SandboxGateway},
    middleware::i18n::I18nStore,
    models::billing::GatewayProvider,
    services::{BillingConfig, ChargeService, CrmService, ReconciliationService},
};

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    sandbox: Arc<SandboxGateway>,
    tenant_id: Uuid,
}

fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let sandbox = Arc::new(SandboxGateway::new());

    let mut gateways = GatewayRegistry::new();
    gateways.register(sandbox.clone());

    let charge_service = ChargeService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        gateways.clone(),
        BillingConfig {
            provider: Some(GatewayProvider::Sandbox),
            public_base_url: None,
        },
    );
    let reconciliation_service = ReconciliationService::new(store.clone(), store.clone(), gateways);
    let crm_service = CrmService::new(store.clone());

    // Pool preguiçoso: satisfaz o AppState sem nunca conectar.
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .expect("pool preguiçoso");

    let app_state = AppState {
        db_pool,
        charge_service,
        reconciliation_service,
        crm_service,
        i18n_store: I18nStore::new(),
    };

    TestApp {
        router: build_router(app_state),
        store,
        sandbox,
        tenant_id: Uuid::new_v4(),
    }
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    tenant: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant.to_string());
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

async fn create_customer(app: &TestApp) -> Uuid {
    let (status, body) = send(
        app,
        "POST",
        "/api/crm/customers",
        Some(app.tenant_id),
        Some(json!({
            "fullName": "Maria da Silva",
            "documentNumber": "12345678900",
            "email": "maria@email.com"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn create_pix_charge(app: &TestApp, customer_id: Uuid) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/billing/charges",
        Some(app.tenant_id),
        Some(json!({
            "customerId": customer_id,
            "description": "Mensalidade dedetização - Julho",
            "amount": 250.00,
            "kind": "PIX"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn fluxo_pix_do_nascimento_ao_lancamento() {
    let app = test_app();
    let customer_id = create_customer(&app).await;

    // 1. Criação: pendente, com artefato do gateway.
    let charge = create_pix_charge(&app, customer_id).await;
    assert_eq!(charge["status"], "PENDING");
    assert_eq!(charge["externalId"], "sb-1");
    assert!(charge["paymentArtifact"].as_str().unwrap().contains("sandbox-pix"));
    assert!(charge["paidAt"].is_null());

    let charge_id = charge["id"].as_str().unwrap();

    // 2. O gateway aprova; o webhook chega.
    app.sandbox.set_status(
        "sb-1",
        "approved",
        Some("2025-01-10T10:00:00Z".parse().unwrap()),
        Some("250.00".parse().unwrap()),
    );

    let webhook = json!({ "externalId": "sb-1", "status": "approved" });
    let (status, body) = send(&app, "POST", "/api/webhooks/sandbox", None, Some(webhook.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    // 3. A leitura enxerga a cobrança quitada, com paid_at do gateway.
    let uri = format!("/api/billing/charges/{}", charge_id);
    let (status, paid) = send(&app, "GET", &uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "PAID");
    assert_eq!(paid["paidAt"], "2025-01-10T10:00:00Z");
    assert_eq!(app.store.ledger_len(), 1);

    // 4. Reentrega do mesmo evento: 200, nada muda, nenhum lançamento novo.
    let (status, body) = send(&app, "POST", "/api/webhooks/sandbox", None, Some(webhook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    let (_, after) = send(&app, "GET", &uri, Some(app.tenant_id), None).await;
    assert_eq!(after["status"], "PAID");
    assert_eq!(after["paidAt"], "2025-01-10T10:00:00Z");
    assert_eq!(app.store.ledger_len(), 1);
}

#[tokio::test]
async fn tenant_nao_enxerga_cobranca_alheia() {
    let app = test_app();
    let customer_id = create_customer(&app).await;
    let charge = create_pix_charge(&app, customer_id).await;
    let charge_id = charge["id"].as_str().unwrap();

    let uri = format!("/api/billing/charges/{}", charge_id);
    let intruder = Uuid::new_v4();

    let (status, _) = send(&app, "GET", &uri, Some(intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some(intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // O dono continua enxergando.
    let (status, _) = send(&app, "GET", &uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn gateway_fora_do_ar_ainda_cria_cobranca() {
    let app = test_app();
    let customer_id = create_customer(&app).await;
    app.sandbox.fail_creations(true);

    let charge = create_pix_charge(&app, customer_id).await;

    assert_eq!(charge["status"], "PENDING");
    assert_eq!(charge["gatewayActive"], false);
    assert_eq!(charge["externalId"], charge["correlationId"]);
    assert!(charge["paymentArtifact"].is_null());

    // Leituras seguintes não consultam o gateway: continua pendente.
    let uri = format!("/api/billing/charges/{}", charge["id"].as_str().unwrap());
    let (status, body) = send(&app, "GET", &uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
}

#[tokio::test]
async fn pagina_publica_nao_vaza_identificadores() {
    let app = test_app();
    let customer_id = create_customer(&app).await;
    let charge = create_pix_charge(&app, customer_id).await;

    let token = charge["correlationId"].as_str().unwrap();
    let uri = format!("/api/pay/{}", token);

    // Sem cabeçalho de tenant: a página é do pagador.
    let (status, body) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["description"], "Mensalidade dedetização - Julho");
    assert!(body.get("tenantId").is_none());
    assert!(body.get("customerId").is_none());
    assert!(body.get("id").is_none());
}

#[tokio::test]
async fn webhook_de_gateway_desconhecido_ainda_confirma() {
    let app = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/webhooks/stripe",
        None,
        Some(json!({ "id": "evt_1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn webhook_com_corpo_ilegivel_ainda_confirma() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/sandbox")
        .body(Body::from("isto não é json"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn sonda_de_vida_do_webhook() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/webhooks/mercadopago", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn openapi_publica_as_rotas_de_cobranca() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/billing/charges").is_some());
    assert!(body["paths"].get("/api/webhooks/{gateway}").is_some());
}

#[tokio::test]
async fn validacao_recusa_valor_nao_positivo() {
    let app = test_app();
    let customer_id = create_customer(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/billing/charges",
        Some(app.tenant_id),
        Some(json!({
            "customerId": customer_id,
            "description": "Valor inválido",
            "amount": -5.0,
            "kind": "PIX"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn baixa_manual_e_exclusao_respeitam_o_ciclo_de_vida() {
    let app = test_app();
    let customer_id = create_customer(&app).await;
    let charge = create_pix_charge(&app, customer_id).await;
    let charge_id = charge["id"].as_str().unwrap();

    // Baixa manual: vira PAID com lançamento.
    let settle_uri = format!("/api/billing/charges/{}/settle", charge_id);
    let (status, settled) = send(&app, "POST", &settle_uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled["status"], "PAID");
    assert!(settled["paidAt"].is_string());
    assert_eq!(app.store.ledger_len(), 1);

    // Repetir a baixa: conflito.
    let (status, _) = send(&app, "POST", &settle_uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Quitada não sai do histórico.
    let delete_uri = format!("/api/billing/charges/{}", charge_id);
    let (status, _) = send(&app, "DELETE", &delete_uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Pendente sai.
    let pending = create_pix_charge(&app, customer_id).await;
    let delete_uri = format!("/api/billing/charges/{}", pending["id"].as_str().unwrap());
    let (status, _) = send(&app, "DELETE", &delete_uri, Some(app.tenant_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
