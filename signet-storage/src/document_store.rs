//! The letter view the signing core reads and the one transition it owns.
//!
//! `Approved -> Signed` is only ever written by
//! [`SignatureStore::commit`](crate::SignatureStore::commit), together with
//! the signature row.

use crate::codec::{opt_millis_col, parsed_col, to_millis};
use crate::error::{StorageError, StorageResult};
use crate::{lock, SharedConnection};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use signet_types::{Document, DocumentId, DocumentStatus, UserId};

#[derive(Clone)]
pub struct DocumentStore {
    conn: SharedConnection,
}

impl DocumentStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Inserts or replaces a document. A `Signed` row is final and is never
    /// replaced.
    pub fn upsert(&self, doc: &Document) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        let written = conn.execute(
            "INSERT INTO documents (id, status, signer_id, content, signed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                signer_id = excluded.signer_id,
                content = excluded.content,
                signed_at = excluded.signed_at,
                updated_at = excluded.updated_at
             WHERE documents.status <> ?7",
            params![
                doc.id.as_str(),
                doc.status.as_str(),
                doc.signer_id.as_ref().map(|s| s.as_str()),
                doc.content,
                doc.signed_at.map(to_millis),
                to_millis(Utc::now()),
                DocumentStatus::Signed.as_str(),
            ],
        )?;
        if written == 0 {
            return Err(StorageError::InvalidTransition {
                document_id: doc.id.to_string(),
                from: DocumentStatus::Signed,
                to: doc.status,
            });
        }
        Ok(())
    }

    pub fn get(&self, id: &DocumentId) -> StorageResult<Option<Document>> {
        let conn = lock(&self.conn)?;
        Ok(conn
            .query_row(
                "SELECT id, status, signer_id, content, signed_at FROM documents WHERE id = ?1",
                params![id.as_str()],
                read_document,
            )
            .optional()?)
    }

    /// Moves a document along a workflow edge other than `Approved -> Signed`.
    pub fn transition(&self, id: &DocumentId, to: DocumentStatus) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM documents WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Err(StorageError::DocumentNotFound(id.to_string()));
        };
        let from: DocumentStatus = raw
            .parse()
            .map_err(|e| StorageError::CorruptRow(format!("{e}")))?;

        if to == DocumentStatus::Signed || !from.can_transition_to(to) {
            return Err(StorageError::InvalidTransition {
                document_id: id.to_string(),
                from,
                to,
            });
        }

        conn.execute(
            "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![to.as_str(), to_millis(Utc::now()), id.as_str()],
        )?;
        Ok(())
    }

    /// Assigns the user who is allowed to sign.
    pub fn assign_signer(&self, id: &DocumentId, signer: &UserId) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        let updated = conn.execute(
            "UPDATE documents SET signer_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![signer.as_str(), to_millis(Utc::now()), id.as_str()],
        )?;
        if updated == 0 {
            return Err(StorageError::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn read_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: DocumentId::from(row.get::<_, String>(0)?),
        status: parsed_col(row, 1)?,
        signer_id: row.get::<_, Option<String>>(2)?.map(UserId::from),
        content: row.get(3)?,
        signed_at: opt_millis_col(row, 4)?,
    })
}
