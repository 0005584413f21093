use crate::error::StorageResult;
use rusqlite::Connection;

pub(crate) fn initialize(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            signer_id TEXT,
            content BLOB NOT NULL,
            signed_at INTEGER,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_keys (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            public_key TEXT NOT NULL,
            encrypted_private_key TEXT NOT NULL,
            fingerprint TEXT NOT NULL UNIQUE,
            key_bits INTEGER NOT NULL,
            generated_at INTEGER NOT NULL,
            expires_at INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_user_keys_owner ON user_keys(owner_id, is_active);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_user_keys_one_active
            ON user_keys(owner_id) WHERE is_active = 1;

        CREATE TRIGGER IF NOT EXISTS user_keys_material_immutable
        BEFORE UPDATE OF owner_id, public_key, fingerprint, key_bits, generated_at, expires_at
        ON user_keys
        BEGIN
            SELECT RAISE(ABORT, 'user key material is immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS user_keys_no_reactivation
        BEFORE UPDATE OF is_active ON user_keys
        WHEN OLD.is_active = 0 AND NEW.is_active = 1
        BEGIN
            SELECT RAISE(ABORT, 'deactivated keys cannot be reactivated');
        END;

        CREATE TRIGGER IF NOT EXISTS user_keys_no_delete
        BEFORE DELETE ON user_keys
        BEGIN
            SELECT RAISE(ABORT, 'user keys are never deleted');
        END;

        CREATE TABLE IF NOT EXISTS signatures (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            signer_id TEXT NOT NULL,
            key_record_id TEXT NOT NULL REFERENCES user_keys(id),
            signature TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            algorithm TEXT NOT NULL,
            signed_at INTEGER NOT NULL,
            origin_ip TEXT,
            user_agent TEXT,
            UNIQUE (document_id, signer_id)
        );
        CREATE INDEX IF NOT EXISTS idx_signatures_signer ON signatures(signer_id);
        CREATE INDEX IF NOT EXISTS idx_signatures_signed_at ON signatures(signed_at);
        CREATE INDEX IF NOT EXISTS idx_signatures_content_hash ON signatures(content_hash);

        CREATE TRIGGER IF NOT EXISTS signatures_no_update
        BEFORE UPDATE ON signatures
        BEGIN
            SELECT RAISE(ABORT, 'signatures are immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS signatures_no_delete
        BEFORE DELETE ON signatures
        BEGIN
            SELECT RAISE(ABORT, 'signatures are immutable');
        END;

        CREATE TABLE IF NOT EXISTS audit_events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            actor_id TEXT,
            outcome TEXT NOT NULL,
            context_json TEXT NOT NULL,
            origin_ip TEXT,
            user_agent TEXT,
            occurred_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_type_time ON audit_events(event_type, occurred_at);
        CREATE INDEX IF NOT EXISTS idx_audit_actor_time ON audit_events(actor_id, occurred_at);
        "#,
    )?;
    Ok(())
}
