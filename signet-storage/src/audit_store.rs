//! Append-only audit log.

use crate::codec::{millis_col, parsed_col, to_millis};
use crate::error::StorageResult;
use crate::{lock, SharedConnection};
use rusqlite::{params, Row};
use signet_types::{AuditEvent, AuditEventType, RequestOrigin, UserId};

const AUDIT_COLUMNS: &str =
    "id, event_type, actor_id, outcome, context_json, origin_ip, user_agent, occurred_at";

#[derive(Clone)]
pub struct AuditStore {
    conn: SharedConnection,
}

impl AuditStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn append(&self, event: &AuditEvent) -> StorageResult<()> {
        let context = serde_json::to_string(&event.context)?;
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO audit_events (id, event_type, actor_id, outcome, context_json,
                                       origin_ip, user_agent, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id.to_string(),
                event.event_type.as_str(),
                event.actor_id.as_ref().map(|a| a.as_str()),
                event.outcome.as_str(),
                context,
                event.origin.ip,
                event.origin.user_agent,
                to_millis(event.occurred_at),
            ],
        )?;
        Ok(())
    }

    /// Most recent events first.
    pub fn recent(&self, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_events ORDER BY occurred_at DESC, id DESC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], read_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Events of one type, oldest first.
    pub fn by_type(&self, event_type: AuditEventType) -> StorageResult<Vec<AuditEvent>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_events
             WHERE event_type = ?1 ORDER BY occurred_at, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![event_type.as_str()], read_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Events recorded for one actor, oldest first.
    pub fn by_actor(&self, actor: &UserId) -> StorageResult<Vec<AuditEvent>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_events
             WHERE actor_id = ?1 ORDER BY occurred_at, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![actor.as_str()], read_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn read_event(row: &Row<'_>) -> rusqlite::Result<AuditEvent> {
    let context_json: String = row.get(4)?;
    let context = serde_json::from_str(&context_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(AuditEvent {
        id: parsed_col(row, 0)?,
        event_type: parsed_col(row, 1)?,
        actor_id: row.get::<_, Option<String>>(2)?.map(UserId::from),
        outcome: parsed_col(row, 3)?,
        context,
        origin: RequestOrigin {
            ip: row.get(5)?,
            user_agent: row.get(6)?,
        },
        occurred_at: millis_col(row, 7)?,
    })
}
