//! Immutable signature records.

use crate::codec::{is_unique_violation, millis_col, parsed_col, stored_precision, to_millis};
use crate::error::{StorageError, StorageResult};
use crate::{lock, SharedConnection};
use rusqlite::{params, OptionalExtension, Row};
use signet_types::{
    DocumentId, DocumentStatus, NewSignatureRecord, SignatureId, SignatureRecord, UserId,
};
use tracing::{debug, info};

const SIGNATURE_COLUMNS: &str = "id, document_id, signer_id, key_record_id, signature, \
                                 content_hash, algorithm, signed_at, origin_ip, user_agent";

#[derive(Clone)]
pub struct SignatureStore {
    conn: SharedConnection,
}

impl SignatureStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Persists a signature and moves its document `Approved -> Signed`.
    ///
    /// Both writes commit together or not at all. A second signature for the
    /// same `(document, signer)` is [`StorageError::DuplicateSignature`]; a
    /// document that is no longer `Approved` is
    /// [`StorageError::InvalidTransition`].
    pub fn commit(&self, new: NewSignatureRecord) -> StorageResult<SignatureRecord> {
        let record = SignatureRecord {
            id: SignatureId::new(),
            document_id: new.document_id,
            signer_id: new.signer_id,
            key_record_id: new.key_record_id,
            signature: new.signature,
            content_hash: new.content_hash,
            algorithm: new.algorithm,
            signed_at: stored_precision(new.signed_at),
            origin_ip: new.origin.ip,
            user_agent: new.origin.user_agent,
        };

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO signatures (id, document_id, signer_id, key_record_id, signature,
                                     content_hash, algorithm, signed_at, origin_ip, user_agent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.document_id.as_str(),
                record.signer_id.as_str(),
                record.key_record_id.to_string(),
                record.signature,
                record.content_hash,
                record.algorithm,
                to_millis(record.signed_at),
                record.origin_ip,
                record.user_agent,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    "rejected duplicate signature on {} by {}",
                    record.document_id, record.signer_id
                );
                return Err(StorageError::DuplicateSignature {
                    document_id: record.document_id.to_string(),
                    signer_id: record.signer_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let updated = tx.execute(
            "UPDATE documents SET status = ?1, signed_at = ?2, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                DocumentStatus::Signed.as_str(),
                to_millis(record.signed_at),
                record.document_id.as_str(),
                DocumentStatus::Approved.as_str(),
            ],
        )?;
        if updated != 1 {
            // Dropping `tx` rolls the signature insert back.
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM documents WHERE id = ?1",
                    params![record.document_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match current {
                None => StorageError::DocumentNotFound(record.document_id.to_string()),
                Some(raw) => StorageError::InvalidTransition {
                    document_id: record.document_id.to_string(),
                    from: raw
                        .parse()
                        .map_err(|e| StorageError::CorruptRow(format!("{e}")))?,
                    to: DocumentStatus::Signed,
                },
            });
        }

        tx.commit()?;
        info!(
            "document {} signed by {} (signature {})",
            record.document_id, record.signer_id, record.id
        );
        Ok(record)
    }

    /// The signature on a document. If the workflow ever allows several
    /// signers, the most recent one is returned.
    pub fn for_document(&self, document_id: &DocumentId) -> StorageResult<Option<SignatureRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {SIGNATURE_COLUMNS} FROM signatures
             WHERE document_id = ?1
             ORDER BY signed_at DESC, id DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![document_id.as_str()], read_signature)
            .optional()?)
    }

    /// The signature a given signer placed on a document, if any.
    pub fn find(
        &self,
        document_id: &DocumentId,
        signer: &UserId,
    ) -> StorageResult<Option<SignatureRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE document_id = ?1 AND signer_id = ?2"
        );
        Ok(conn
            .query_row(&sql, params![document_id.as_str(), signer.as_str()], read_signature)
            .optional()?)
    }

    pub fn get(&self, id: &SignatureId) -> StorageResult<Option<SignatureRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!("SELECT {SIGNATURE_COLUMNS} FROM signatures WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id.to_string()], read_signature)
            .optional()?)
    }

    /// Everything a user has signed, newest first.
    pub fn list_by_signer(&self, signer: &UserId) -> StorageResult<Vec<SignatureRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {SIGNATURE_COLUMNS} FROM signatures
             WHERE signer_id = ?1
             ORDER BY signed_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![signer.as_str()], read_signature)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_for_document(&self, document_id: &DocumentId) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM signatures WHERE document_id = ?1",
            params![document_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn read_signature(row: &Row<'_>) -> rusqlite::Result<SignatureRecord> {
    Ok(SignatureRecord {
        id: parsed_col(row, 0)?,
        document_id: DocumentId::from(row.get::<_, String>(1)?),
        signer_id: UserId::from(row.get::<_, String>(2)?),
        key_record_id: parsed_col(row, 3)?,
        signature: row.get(4)?,
        content_hash: row.get(5)?,
        algorithm: row.get(6)?,
        signed_at: millis_col(row, 7)?,
        origin_ip: row.get(8)?,
        user_agent: row.get(9)?,
    })
}
