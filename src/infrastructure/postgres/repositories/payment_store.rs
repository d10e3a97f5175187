use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    Connection, PgConnection, RunQueryDsl, insert_into, prelude::*, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            approved_payments::ApprovedPaymentEntity,
            partner_transfers::PartnerTransferEntity,
            pending_payments::{PendingPaymentChangeset, PendingPaymentEntity},
        },
        repositories::payment_store::PaymentStore,
        value_objects::{
            enums::{
                payment_session_statuses::PaymentSessionStatus, transfer_statuses::TransferStatus,
            },
            payment_sessions::{PaymentSession, SessionChange, TransitionOutcome},
            settlements::{ApprovedPayment, Settlement, TransferRecord},
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{approved_payments, partner_transfers, pending_payments},
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn load_settlement(conn: &mut PgConnection, transaction_id: &str) -> Result<Option<Settlement>> {
    let approved = approved_payments::table
        .find(transaction_id)
        .select(ApprovedPaymentEntity::as_select())
        .first::<ApprovedPaymentEntity>(conn)
        .optional()?;

    let Some(approved) = approved else {
        return Ok(None);
    };

    let transfer = partner_transfers::table
        .filter(partner_transfers::payment_id.eq(transaction_id))
        .select(PartnerTransferEntity::as_select())
        .first::<PartnerTransferEntity>(conn)
        .optional()?
        .ok_or_else(|| anyhow!("approved payment {} has no transfer row", transaction_id))?;

    Ok(Some(Settlement {
        approved: ApprovedPayment::try_from(approved)?,
        transfer: TransferRecord::try_from(transfer)?,
    }))
}

#[async_trait]
impl PaymentStore for PaymentPostgres {
    async fn insert_session(&self, session: PaymentSession) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let row = PendingPaymentEntity::try_from(&session)?;

        insert_into(pending_payments::table)
            .values(&row)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_session(&self, transaction_id: &str) -> Result<Option<PaymentSession>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = pending_payments::table
            .find(transaction_id)
            .select(PendingPaymentEntity::as_select())
            .first::<PendingPaymentEntity>(&mut conn)
            .optional()?;

        row.map(PaymentSession::try_from).transpose()
    }

    async fn list_sessions(
        &self,
        statuses: Vec<PaymentSessionStatus>,
    ) -> Result<Vec<PaymentSession>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let statuses: Vec<String> = statuses.iter().map(|status| status.to_string()).collect();

        let rows = pending_payments::table
            .filter(pending_payments::status.eq_any(statuses))
            .order(pending_payments::created_at.desc())
            .select(PendingPaymentEntity::as_select())
            .load::<PendingPaymentEntity>(&mut conn)?;

        rows.into_iter().map(PaymentSession::try_from).collect()
    }

    async fn transition(
        &self,
        snapshot: PaymentSession,
        change: SessionChange,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let snapshot_row = PendingPaymentEntity::try_from(&snapshot)?;

        conn.transaction::<TransitionOutcome, anyhow::Error, _>(|tx| {
            // Sessions opened while Postgres was down only exist in the snapshot.
            insert_into(pending_payments::table)
                .values(&snapshot_row)
                .on_conflict(pending_payments::transaction_id)
                .do_nothing()
                .execute(tx)?;

            let row = pending_payments::table
                .find(&snapshot.transaction_id)
                .select(PendingPaymentEntity::as_select())
                .for_update()
                .first::<PendingPaymentEntity>(tx)
                .optional()?;

            let Some(row) = row else {
                return Ok(TransitionOutcome::NotFound);
            };

            let mut session = PaymentSession::try_from(row)?;
            if !session.allows(&change) {
                return Ok(TransitionOutcome::Conflict(session));
            }

            session.mutate(&change, now);
            update(pending_payments::table.find(&session.transaction_id))
                .set(&PendingPaymentChangeset::from(&session))
                .execute(tx)?;

            Ok(TransitionOutcome::Applied(session))
        })
    }

    async fn record_settlement(&self, settlement: Settlement) -> Result<Settlement> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let approved_row = ApprovedPaymentEntity::try_from(&settlement.approved)?;
        let transfer_row = PartnerTransferEntity::try_from(&settlement.transfer)?;
        let transaction_id = settlement.approved.transaction_id.clone();

        conn.transaction::<Settlement, anyhow::Error, _>(|tx| {
            insert_into(approved_payments::table)
                .values(&approved_row)
                .on_conflict(approved_payments::transaction_id)
                .do_nothing()
                .execute(tx)?;

            insert_into(partner_transfers::table)
                .values(&transfer_row)
                .on_conflict(partner_transfers::payment_id)
                .do_nothing()
                .execute(tx)?;

            load_settlement(tx, &transaction_id)?
                .ok_or_else(|| anyhow!("settlement {} missing after insert", transaction_id))
        })
    }

    async fn find_settlement(&self, transaction_id: &str) -> Result<Option<Settlement>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        load_settlement(&mut conn, transaction_id)
    }

    async fn list_transfers(&self, statuses: Vec<TransferStatus>) -> Result<Vec<TransferRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let statuses: Vec<String> = statuses.iter().map(|status| status.to_string()).collect();

        let rows = partner_transfers::table
            .filter(partner_transfers::status.eq_any(statuses))
            .order(partner_transfers::created_at.desc())
            .select(PartnerTransferEntity::as_select())
            .load::<PartnerTransferEntity>(&mut conn)?;

        rows.into_iter().map(TransferRecord::try_from).collect()
    }

    async fn update_transfer(
        &self,
        transfer_id: Uuid,
        expected: TransferStatus,
        next: TransferStatus,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<TransferRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let target = partner_transfers::table
            .filter(partner_transfers::id.eq(transfer_id))
            .filter(partner_transfers::status.eq(expected.to_string()));

        let row = match reference {
            Some(reference) => update(target)
                .set((
                    partner_transfers::status.eq(next.to_string()),
                    partner_transfers::transfer_reference.eq(Some(reference)),
                    partner_transfers::updated_at.eq(now),
                ))
                .returning(PartnerTransferEntity::as_returning())
                .get_result::<PartnerTransferEntity>(&mut conn)
                .optional()?,
            None => update(target)
                .set((
                    partner_transfers::status.eq(next.to_string()),
                    partner_transfers::updated_at.eq(now),
                ))
                .returning(PartnerTransferEntity::as_returning())
                .get_result::<PartnerTransferEntity>(&mut conn)
                .optional()?,
        };

        row.map(TransferRecord::try_from).transpose()
    }

    async fn find_transfer(&self, transfer_id: Uuid) -> Result<Option<TransferRecord>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = partner_transfers::table
            .find(transfer_id)
            .select(PartnerTransferEntity::as_select())
            .first::<PartnerTransferEntity>(&mut conn)
            .optional()?;

        row.map(TransferRecord::try_from).transpose()
    }
}
