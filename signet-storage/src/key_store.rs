//! User signing keys.
//!
//! Key rows are never deleted. Revocation clears `is_active`; the partial
//! unique index on `(owner_id) WHERE is_active = 1` rejects a second active
//! key even if two writers race.

use crate::codec::{millis_col, opt_millis_col, parsed_col, stored_precision, to_millis};
use crate::error::{StorageError, StorageResult};
use crate::{lock, SharedConnection};
use rusqlite::{params, OptionalExtension, Row};
use signet_types::{KeyRecordId, NewKeyRecord, UserId, UserKeyRecord};
use tracing::{debug, info};

const KEY_COLUMNS: &str = "id, owner_id, public_key, encrypted_private_key, fingerprint, \
                           key_bits, generated_at, expires_at, is_active";

#[derive(Clone)]
pub struct KeyStore {
    conn: SharedConnection,
}

impl KeyStore {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Inserts `new` as the owner's active key, deactivating any previous
    /// active key in the same transaction.
    pub fn insert_active(&self, new: NewKeyRecord) -> StorageResult<UserKeyRecord> {
        let record = UserKeyRecord {
            id: KeyRecordId::new(),
            owner_id: new.owner_id,
            public_key: new.public_key,
            encrypted_private_key: new.encrypted_private_key,
            fingerprint: new.fingerprint,
            key_bits: new.key_bits,
            generated_at: stored_precision(new.generated_at),
            expires_at: new.expires_at.map(stored_precision),
            is_active: true,
        };

        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let taken = tx
            .query_row(
                "SELECT 1 FROM user_keys WHERE fingerprint = ?1",
                params![record.fingerprint],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if taken {
            return Err(StorageError::DuplicateFingerprint(record.fingerprint));
        }
        let replaced = tx.execute(
            "UPDATE user_keys SET is_active = 0 WHERE owner_id = ?1 AND is_active = 1",
            params![record.owner_id.as_str()],
        )?;
        tx.execute(
            "INSERT INTO user_keys (id, owner_id, public_key, encrypted_private_key, fingerprint,
                                    key_bits, generated_at, expires_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
            params![
                record.id.to_string(),
                record.owner_id.as_str(),
                record.public_key,
                record.encrypted_private_key,
                record.fingerprint,
                record.key_bits,
                to_millis(record.generated_at),
                record.expires_at.map(to_millis),
            ],
        )?;
        tx.commit()?;

        info!(
            "stored key {} for {} (replaced {replaced} active)",
            record.id, record.owner_id
        );
        Ok(record)
    }

    /// The owner's active key, if any. Expiry is the caller's concern.
    pub fn active_for(&self, owner: &UserId) -> StorageResult<Option<UserKeyRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM user_keys
             WHERE owner_id = ?1 AND is_active = 1
             ORDER BY generated_at DESC, id DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![owner.as_str()], read_key)
            .optional()?)
    }

    pub fn get(&self, id: &KeyRecordId) -> StorageResult<Option<UserKeyRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!("SELECT {KEY_COLUMNS} FROM user_keys WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id.to_string()], read_key)
            .optional()?)
    }

    /// All of the owner's keys, newest first.
    pub fn list_for(&self, owner: &UserId) -> StorageResult<Vec<UserKeyRecord>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM user_keys
             WHERE owner_id = ?1
             ORDER BY generated_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner.as_str()], read_key)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_active(&self, owner: &UserId) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_keys WHERE owner_id = ?1 AND is_active = 1",
            params![owner.as_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Deactivates one of the owner's keys.
    ///
    /// Returns `false` when the key was already inactive. A key that does
    /// not exist or belongs to someone else is [`StorageError::KeyNotFound`].
    pub fn deactivate(&self, owner: &UserId, id: &KeyRecordId) -> StorageResult<bool> {
        let conn = lock(&self.conn)?;
        let owned: Option<bool> = conn
            .query_row(
                "SELECT is_active FROM user_keys WHERE id = ?1 AND owner_id = ?2",
                params![id.to_string(), owner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match owned {
            None => Err(StorageError::KeyNotFound(id.to_string())),
            Some(false) => Ok(false),
            Some(true) => {
                conn.execute(
                    "UPDATE user_keys SET is_active = 0 WHERE id = ?1",
                    params![id.to_string()],
                )?;
                debug!("deactivated key {id} for {owner}");
                Ok(true)
            }
        }
    }

    /// Replaces the stored blob of one key (password change).
    pub fn replace_encrypted_key(&self, id: &KeyRecordId, blob: &str) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        let updated = conn.execute(
            "UPDATE user_keys SET encrypted_private_key = ?1 WHERE id = ?2",
            params![blob, id.to_string()],
        )?;
        if updated == 0 {
            return Err(StorageError::KeyNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Runs `rewrap` over every stored key inside one transaction.
    ///
    /// `rewrap` returns the replacement blob, or `None` to leave a row
    /// alone. Any error rolls back every replacement made so far. Returns
    /// the number of rows replaced.
    pub fn rewrap_all<E, F>(&self, mut rewrap: F) -> Result<usize, E>
    where
        E: From<StorageError>,
        F: FnMut(&UserKeyRecord) -> Result<Option<String>, E>,
    {
        let mut conn = lock(&self.conn).map_err(E::from)?;
        let tx = conn.transaction().map_err(StorageError::from)?;

        let keys = {
            let sql = format!("SELECT {KEY_COLUMNS} FROM user_keys ORDER BY generated_at");
            let mut stmt = tx.prepare(&sql).map_err(StorageError::from)?;
            let rows = stmt.query_map([], read_key).map_err(StorageError::from)?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(StorageError::from)?
        };

        let mut replaced = 0;
        for key in &keys {
            if let Some(blob) = rewrap(key)? {
                tx.execute(
                    "UPDATE user_keys SET encrypted_private_key = ?1 WHERE id = ?2",
                    params![blob, key.id.to_string()],
                )
                .map_err(StorageError::from)?;
                replaced += 1;
            }
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(replaced)
    }
}

fn read_key(row: &Row<'_>) -> rusqlite::Result<UserKeyRecord> {
    Ok(UserKeyRecord {
        id: parsed_col(row, 0)?,
        owner_id: UserId::from(row.get::<_, String>(1)?),
        public_key: row.get(2)?,
        encrypted_private_key: row.get(3)?,
        fingerprint: row.get(4)?,
        key_bits: row.get(5)?,
        generated_at: millis_col(row, 6)?,
        expires_at: opt_millis_col(row, 7)?,
        is_active: row.get(8)?,
    })
}
