// src/services/reconciliation.rs

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    common::error::AppError,
    db::{ChargeStore, LedgerSink, NewLedgerEntry},
    gateway::{GatewayRegistry, StatusSnapshot, map_remote_status},
    models::billing::{Charge, ChargeStatus},
};

/// Sincroniza o status local com o estado autoritativo do gateway.
///
/// Dois gatilhos convergem na mesma regra de transição: a leitura de uma
/// cobrança pendente (pull) e o webhook do gateway (push). A supressão de
/// duplicatas é a comparação de status: reprocessar o mesmo evento depois
/// da virada não muda nada e não gera segundo lançamento.
#[derive(Clone)]
pub struct ReconciliationService {
    charges: Arc<dyn ChargeStore>,
    ledger: Arc<dyn LedgerSink>,
    gateways: GatewayRegistry,
}

impl ReconciliationService {
    pub fn new(charges: Arc<dyn ChargeStore>, ledger: Arc<dyn LedgerSink>, gateways: GatewayRegistry) -> Self {
        Self {
            charges,
            ledger,
            gateways,
        }
    }

    /// Caminho pull: roda em toda leitura de cobrança pendente com gateway
    /// ativo. Consulta falhou ou sem novidade = devolve a cobrança como está.
    pub async fn reconcile_on_read(&self, charge: Charge) -> Result<Charge, AppError> {
        if charge.status != ChargeStatus::Pending || !charge.gateway_active {
            return Ok(charge);
        }

        let Some(provider) = charge.provider else {
            return Ok(charge);
        };
        let Some(client) = self.gateways.resolve(provider) else {
            return Ok(charge);
        };

        match client.query_status(&charge.external_id).await {
            Some(snapshot) => self.apply_snapshot(charge, snapshot).await,
            None => Ok(charge),
        }
    }

    /// Caminho push: processa um webhook. Todo desfecho interno é absorvido
    /// aqui ou no handler; o remetente sempre recebe 200 para não entrar em
    /// loop de reentrega.
    pub async fn process_webhook(&self, gateway_name: &str, payload: &Value) -> Result<(), AppError> {
        let Some(client) = self.gateways.resolve_by_path_name(gateway_name) else {
            tracing::debug!("Webhook para gateway desconhecido: {}", gateway_name);
            return Ok(());
        };

        let Some(event) = client.parse_webhook(payload) else {
            tracing::debug!("Webhook de {} com envelope não reconhecido", gateway_name);
            return Ok(());
        };

        let Some(charge) = self
            .charges
            .find_by_external_id(client.provider(), &event.external_id)
            .await?
        else {
            // Pode ser de outra integração da mesma conta; só confirma.
            tracing::debug!("Webhook para pagamento desconhecido: {}", event.external_id);
            return Ok(());
        };

        // O payload pode estar atrasado ou forjado: o status que vale é o
        // da re-consulta. O campo embutido só entra quando ela falha.
        let snapshot = match client.query_status(&event.external_id).await {
            Some(snapshot) => snapshot,
            None => match event.remote_status {
                Some(remote_status) => StatusSnapshot {
                    remote_status,
                    paid_at: event.paid_at,
                    amount_paid: event.amount_paid,
                },
                None => {
                    tracing::debug!("Sem status autoritativo para {}; evento ignorado", event.external_id);
                    return Ok(());
                }
            },
        };

        self.apply_snapshot(charge, snapshot).await?;
        Ok(())
    }

    /// A regra de transição compartilhada pelos dois caminhos.
    pub async fn apply_snapshot(&self, charge: Charge, snapshot: StatusSnapshot) -> Result<Charge, AppError> {
        let Some(mapped) = map_remote_status(&snapshot.remote_status) else {
            tracing::warn!(
                "Status desconhecido do gateway para {}: {:?}",
                charge.external_id,
                snapshot.remote_status
            );
            return Ok(charge);
        };

        // Mesmo status = evento repetido ou sem novidade.
        if mapped == charge.status {
            return Ok(charge);
        }

        if charge.status.is_terminal() {
            // Nada sai de PAID/CANCELLED; alerta, nunca erro.
            tracing::warn!(
                "Reconciliação tentou tirar a cobrança {} de {:?} para {:?}; ignorado",
                charge.id,
                charge.status,
                mapped
            );
            return Ok(charge);
        }

        if !charge.status.can_transition_to(mapped) {
            tracing::debug!(
                "Transição {:?} -> {:?} fora da máquina de estados; ignorada",
                charge.status,
                mapped
            );
            return Ok(charge);
        }

        let paid_at = if mapped == ChargeStatus::Paid {
            Some(snapshot.paid_at.unwrap_or_else(Utc::now))
        } else {
            None
        };

        let updated = self
            .charges
            .apply_transition(charge.tenant_id, charge.id, charge.status, mapped, paid_at)
            .await?;

        if !updated {
            // Corrida com outro gatilho: os dois computaram o mesmo
            // mapeamento da mesma fonte, então perder a escrita é inócuo.
            let current = self.charges.find_by_id(charge.tenant_id, charge.id).await?;
            return Ok(current.unwrap_or(charge));
        }

        if mapped == ChargeStatus::Paid {
            if let Some(when) = paid_at {
                self.ledger
                    .record_payment(NewLedgerEntry {
                        tenant_id: charge.tenant_id,
                        charge_id: charge.id,
                        customer_id: charge.customer_id,
                        amount: snapshot.amount_paid.unwrap_or(charge.amount),
                        paid_at: when,
                    })
                    .await?;
            }
        }

        let mut reconciled = charge;
        reconciled.status = mapped;
        reconciled.paid_at = paid_at;
        reconciled.updated_at = Utc::now();
        Ok(reconciled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::gateway::SandboxGateway;
    use crate::models::billing::{ChargeKind, GatewayProvider};
    use chrono::{DateTime, TimeZone};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn amount(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    struct Setup {
        store: Arc<InMemoryStore>,
        sandbox: Arc<SandboxGateway>,
        service: ReconciliationService,
    }

    fn setup() -> Setup {
        let store = Arc::new(InMemoryStore::new());
        let sandbox = Arc::new(SandboxGateway::new());

        let mut gateways = GatewayRegistry::new();
        gateways.register(sandbox.clone());

        let service = ReconciliationService::new(store.clone(), store.clone(), gateways);

        Setup {
            store,
            sandbox,
            service,
        }
    }

    async fn seed_charge(store: &InMemoryStore, status: ChargeStatus, external_id: &str) -> Charge {
        let now = Utc::now();
        let charge = Charge {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            description: "Mensalidade dedetização".to_string(),
            amount: amount("250.00"),
            kind: ChargeKind::Pix,
            due_date: None,
            provider: Some(GatewayProvider::Sandbox),
            correlation_id: Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
            payment_artifact: Some("00020126...".to_string()),
            payment_link: None,
            gateway_active: true,
            status,
            paid_at: (status == ChargeStatus::Paid).then(Utc::now),
            created_at: now,
            updated_at: now,
        };
        ChargeStore::insert(store, &charge).await.unwrap();
        charge
    }

    fn paid_at_fixture() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap()
    }

    fn webhook_paid(external_id: &str) -> Value {
        serde_json::json!({
            "externalId": external_id,
            "status": "approved",
            "paidAt": "2025-01-10T10:00:00Z",
            "amountPaid": 250.0
        })
    }

    #[tokio::test]
    async fn webhook_aprovado_vira_paid_com_um_lancamento() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Pending, "sb-999").await;

        // O gateway já enxerga o pagamento aprovado na re-consulta.
        s.sandbox
            .set_status("sb-999", "approved", Some(paid_at_fixture()), Some(amount("250.00")));

        s.service
            .process_webhook("sandbox", &webhook_paid("sb-999"))
            .await
            .unwrap();

        let updated = s.store.charge_by_id(charge.id).unwrap();
        assert_eq!(updated.status, ChargeStatus::Paid);
        assert_eq!(updated.paid_at, Some(paid_at_fixture()));

        let entry = s.store.find_by_charge(charge.id).await.unwrap().unwrap();
        assert_eq!(entry.amount, amount("250.00"));
        assert_eq!(s.store.ledger_len(), 1);
    }

    #[tokio::test]
    async fn segunda_entrega_do_mesmo_webhook_e_noop() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Pending, "sb-999").await;
        s.sandbox
            .set_status("sb-999", "approved", Some(paid_at_fixture()), Some(amount("250.00")));

        let payload = webhook_paid("sb-999");
        s.service.process_webhook("sandbox", &payload).await.unwrap();
        s.service.process_webhook("sandbox", &payload).await.unwrap();

        let updated = s.store.charge_by_id(charge.id).unwrap();
        assert_eq!(updated.status, ChargeStatus::Paid);
        assert_eq!(updated.paid_at, Some(paid_at_fixture()));
        assert_eq!(s.store.ledger_len(), 1);
    }

    #[tokio::test]
    async fn webhook_de_pagamento_desconhecido_e_noop() {
        let s = setup();
        seed_charge(&s.store, ChargeStatus::Pending, "sb-999").await;

        s.service
            .process_webhook("sandbox", &webhook_paid("sb-outro"))
            .await
            .unwrap();

        assert_eq!(s.store.ledger_len(), 0);
    }

    #[tokio::test]
    async fn fallback_do_payload_quando_consulta_falha() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Pending, "sb-999").await;
        // Sem roteiro: query_status devolve None e o status embutido decide.
        s.sandbox.forget("sb-999");

        s.service
            .process_webhook("sandbox", &webhook_paid("sb-999"))
            .await
            .unwrap();

        let updated = s.store.charge_by_id(charge.id).unwrap();
        assert_eq!(updated.status, ChargeStatus::Paid);
        assert_eq!(s.store.ledger_len(), 1);
    }

    #[tokio::test]
    async fn estados_terminais_nunca_sao_abandonados() {
        let s = setup();

        // Sequência arbitrária de eventos depois do estado final: nada muda.
        for terminal in [ChargeStatus::Paid, ChargeStatus::Cancelled] {
            let external_id = format!("sb-{terminal:?}");
            let charge = seed_charge(&s.store, terminal, &external_id).await;

            for remote in ["pending", "overdue", "rejected", "approved", "refunded"] {
                s.sandbox.set_status(&external_id, remote, None, None);
                let payload = serde_json::json!({ "externalId": external_id, "status": remote });
                s.service.process_webhook("sandbox", &payload).await.unwrap();

                let current = s.store.charge_by_id(charge.id).unwrap();
                assert_eq!(current.status, terminal, "evento {remote} moveu estado terminal");
                // Invariante: PAID <=> paid_at preenchido.
                assert_eq!(current.status == ChargeStatus::Paid, current.paid_at.is_some());
            }
        }
    }

    #[tokio::test]
    async fn overdue_ainda_resolve_para_paid() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Overdue, "sb-7").await;
        s.sandbox
            .set_status("sb-7", "received", Some(paid_at_fixture()), None);

        let payload = serde_json::json!({ "externalId": "sb-7", "status": "received" });
        s.service.process_webhook("sandbox", &payload).await.unwrap();

        let updated = s.store.charge_by_id(charge.id).unwrap();
        assert_eq!(updated.status, ChargeStatus::Paid);
        // Fallback do valor: sem amount_paid do gateway, vale o da cobrança.
        let entry = s.store.find_by_charge(charge.id).await.unwrap().unwrap();
        assert_eq!(entry.amount, amount("250.00"));
    }

    #[tokio::test]
    async fn overdue_nao_regride_para_pending() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Overdue, "sb-8").await;
        s.sandbox.set_status("sb-8", "pending", None, None);

        let payload = serde_json::json!({ "externalId": "sb-8", "status": "pending" });
        s.service.process_webhook("sandbox", &payload).await.unwrap();

        let updated = s.store.charge_by_id(charge.id).unwrap();
        assert_eq!(updated.status, ChargeStatus::Overdue);
    }

    #[tokio::test]
    async fn leitura_reconcilia_cobranca_pendente() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Pending, "sb-5").await;
        s.sandbox
            .set_status("sb-5", "approved", Some(paid_at_fixture()), Some(amount("250.00")));

        let reconciled = s.service.reconcile_on_read(charge.clone()).await.unwrap();

        assert_eq!(reconciled.status, ChargeStatus::Paid);
        assert_eq!(reconciled.paid_at, Some(paid_at_fixture()));
        assert_eq!(s.store.ledger_len(), 1);
    }

    #[tokio::test]
    async fn leitura_sem_resposta_do_gateway_nao_muda_nada() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Pending, "sb-6").await;
        s.sandbox.forget("sb-6");

        let reconciled = s.service.reconcile_on_read(charge.clone()).await.unwrap();

        assert_eq!(reconciled.status, ChargeStatus::Pending);
        assert!(reconciled.paid_at.is_none());
    }

    #[tokio::test]
    async fn cobranca_em_modo_manual_nao_e_consultada() {
        let s = setup();
        let mut charge = seed_charge(&s.store, ChargeStatus::Pending, "manual-1").await;
        charge.gateway_active = false;
        charge.provider = None;
        ChargeStore::insert(s.store.as_ref(), &charge).await.unwrap();

        // Mesmo com roteiro aprovado, o modo manual não dispara consulta.
        s.sandbox.set_status("manual-1", "approved", None, None);
        let reconciled = s.service.reconcile_on_read(charge).await.unwrap();

        assert_eq!(reconciled.status, ChargeStatus::Pending);
        assert_eq!(s.store.ledger_len(), 0);
    }

    #[tokio::test]
    async fn status_desconhecido_do_gateway_e_ignorado() {
        let s = setup();
        let charge = seed_charge(&s.store, ChargeStatus::Pending, "sb-9").await;
        s.sandbox.set_status("sb-9", "alien_status", None, None);

        let reconciled = s.service.reconcile_on_read(charge).await.unwrap();
        assert_eq!(reconciled.status, ChargeStatus::Pending);
    }
}
