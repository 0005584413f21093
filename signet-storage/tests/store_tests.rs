use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use signet_storage::{Database, StorageError};
use signet_types::{
    AuditEvent, AuditEventType, AuditOutcome, Document, DocumentId, DocumentStatus, KeyRecordId,
    NewKeyRecord, NewSignatureRecord, RequestOrigin, UserId, UserKeyRecord,
};

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

fn new_key(owner: &str, fingerprint: &str, generated_ms: i64) -> NewKeyRecord {
    NewKeyRecord {
        owner_id: UserId::from(owner),
        public_key: format!("-----BEGIN PUBLIC KEY-----\n{fingerprint}\n-----END PUBLIC KEY-----\n"),
        encrypted_private_key: format!("sealed-{fingerprint}"),
        fingerprint: fingerprint.to_string(),
        key_bits: 2048,
        generated_at: at(generated_ms),
        expires_at: None,
    }
}

fn approved_doc(db: &Database, id: &str, signer: &str) -> DocumentId {
    let doc = Document {
        id: DocumentId::from(id),
        status: DocumentStatus::Approved,
        signer_id: Some(UserId::from(signer)),
        content: b"Hello, Letter".to_vec(),
        signed_at: None,
    };
    db.documents().upsert(&doc).unwrap();
    doc.id
}

fn signature_for(doc: &DocumentId, signer: &str, key: &UserKeyRecord) -> NewSignatureRecord {
    NewSignatureRecord {
        document_id: doc.clone(),
        signer_id: UserId::from(signer),
        key_record_id: key.id,
        signature: "c2lnbmF0dXJl".into(),
        content_hash: "ab".repeat(32),
        algorithm: "SHA256withRSA".into(),
        signed_at: at(1_718_000_000_000),
        origin: RequestOrigin::new("10.0.0.7", "tests/1.0"),
    }
}

// ── Keys ─────────────────────────────────────────────────────────

#[test]
fn insert_active_round_trips() {
    let db = Database::open_in_memory().unwrap();
    let stored = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();

    let fetched = db.keys().get(&stored.id).unwrap().unwrap();
    assert_eq!(fetched, stored);
    assert!(fetched.is_active);
    assert_eq!(fetched.generated_at, at(1_000));
}

#[test]
fn new_key_replaces_active_key() {
    let db = Database::open_in_memory().unwrap();
    let keys = db.keys();
    let owner = UserId::from("boss");

    let first = keys.insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let second = keys.insert_active(new_key("boss", "fp-2", 2_000)).unwrap();

    assert_eq!(keys.count_active(&owner).unwrap(), 1);
    assert_eq!(keys.active_for(&owner).unwrap().unwrap().id, second.id);
    assert!(!keys.get(&first.id).unwrap().unwrap().is_active);

    let listed: Vec<_> = keys.list_for(&owner).unwrap().into_iter().map(|k| k.id).collect();
    assert_eq!(listed, vec![second.id, first.id]);
}

#[test]
fn owners_are_independent() {
    let db = Database::open_in_memory().unwrap();
    let keys = db.keys();
    keys.insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    keys.insert_active(new_key("deputy", "fp-2", 1_000)).unwrap();

    assert_eq!(keys.count_active(&UserId::from("boss")).unwrap(), 1);
    assert_eq!(keys.count_active(&UserId::from("deputy")).unwrap(), 1);
}

#[test]
fn duplicate_fingerprint_is_rejected_and_rolled_back() {
    let db = Database::open_in_memory().unwrap();
    let keys = db.keys();
    let owner = UserId::from("boss");
    let original = keys.insert_active(new_key("boss", "fp-1", 1_000)).unwrap();

    let err = keys.insert_active(new_key("boss", "fp-1", 2_000)).unwrap_err();
    assert!(matches!(err, StorageError::DuplicateFingerprint(ref fp) if fp == "fp-1"));

    // The deactivation of the old key was rolled back with the insert.
    assert_eq!(keys.active_for(&owner).unwrap().unwrap().id, original.id);

    let err = keys.insert_active(new_key("deputy", "fp-1", 3_000)).unwrap_err();
    assert!(matches!(err, StorageError::DuplicateFingerprint(_)));
    assert!(keys.list_for(&UserId::from("deputy")).unwrap().is_empty());
}

#[test]
fn returned_key_matches_stored_row() {
    let db = Database::open_in_memory().unwrap();
    let mut new = new_key("boss", "fp-1", 0);
    new.generated_at = DateTime::from_timestamp(1_718_000_000, 123_456_789).unwrap();
    new.expires_at = DateTime::from_timestamp(1_750_000_000, 1);

    let returned = db.keys().insert_active(new).unwrap();
    assert_eq!(returned.generated_at, at(1_718_000_000_123));
    assert_eq!(db.keys().get(&returned.id).unwrap(), Some(returned));
}

#[test]
fn deactivate_checks_ownership() {
    let db = Database::open_in_memory().unwrap();
    let keys = db.keys();
    let key = keys.insert_active(new_key("boss", "fp-1", 1_000)).unwrap();

    let err = keys.deactivate(&UserId::from("intruder"), &key.id).unwrap_err();
    assert!(matches!(err, StorageError::KeyNotFound(_)));
    let err = keys.deactivate(&UserId::from("boss"), &KeyRecordId::new()).unwrap_err();
    assert!(matches!(err, StorageError::KeyNotFound(_)));

    assert!(keys.deactivate(&UserId::from("boss"), &key.id).unwrap());
    assert!(!keys.deactivate(&UserId::from("boss"), &key.id).unwrap());
    assert!(keys.active_for(&UserId::from("boss")).unwrap().is_none());
    // Deactivated keys stay on record.
    assert!(keys.get(&key.id).unwrap().is_some());
}

#[test]
fn rewrap_all_updates_every_row() {
    let db = Database::open_in_memory().unwrap();
    let keys = db.keys();
    keys.insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    keys.insert_active(new_key("boss", "fp-2", 2_000)).unwrap();
    keys.insert_active(new_key("deputy", "fp-3", 3_000)).unwrap();

    let replaced = keys
        .rewrap_all::<StorageError, _>(|k| Ok(Some(format!("re-{}", k.encrypted_private_key))))
        .unwrap();
    assert_eq!(replaced, 3);

    for k in keys.list_for(&UserId::from("boss")).unwrap() {
        assert!(k.encrypted_private_key.starts_with("re-sealed-"));
    }
}

#[test]
fn rewrap_all_is_all_or_nothing() {
    let db = Database::open_in_memory().unwrap();
    let keys = db.keys();
    keys.insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    keys.insert_active(new_key("deputy", "fp-2", 2_000)).unwrap();

    let result = keys.rewrap_all(|k| {
        if k.fingerprint == "fp-2" {
            Err(StorageError::CorruptRow("boom".into()))
        } else {
            Ok(Some("replaced".into()))
        }
    });
    assert!(result.is_err());

    let boss = keys.active_for(&UserId::from("boss")).unwrap().unwrap();
    assert_eq!(boss.encrypted_private_key, "sealed-fp-1");
}

#[test]
fn key_material_cannot_be_rewritten_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signet.db");
    let db = Database::open(&path).unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    drop(db);

    let raw = rusqlite::Connection::open(&path).unwrap();
    let err = raw
        .execute(
            "UPDATE user_keys SET public_key = 'swapped' WHERE id = ?1",
            [key.id.to_string()],
        )
        .unwrap_err();
    assert!(err.to_string().contains("immutable"));
    let err = raw
        .execute("DELETE FROM user_keys WHERE id = ?1", [key.id.to_string()])
        .unwrap_err();
    assert!(err.to_string().contains("never deleted"));
}

// ── Documents ────────────────────────────────────────────────────

#[test]
fn document_transitions_follow_workflow() {
    let db = Database::open_in_memory().unwrap();
    let docs = db.documents();
    let doc = Document {
        id: DocumentId::from("L-1"),
        status: DocumentStatus::Draft,
        signer_id: None,
        content: b"draft".to_vec(),
        signed_at: None,
    };
    docs.upsert(&doc).unwrap();

    docs.transition(&doc.id, DocumentStatus::Submitted).unwrap();
    docs.transition(&doc.id, DocumentStatus::UnderReview).unwrap();
    docs.transition(&doc.id, DocumentStatus::Approved).unwrap();

    let err = docs.transition(&doc.id, DocumentStatus::Signed).unwrap_err();
    assert!(matches!(err, StorageError::InvalidTransition { .. }));
    let err = docs.transition(&doc.id, DocumentStatus::Draft).unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidTransition { from: DocumentStatus::Approved, .. }
    ));

    docs.assign_signer(&doc.id, &UserId::from("boss")).unwrap();
    let stored = docs.get(&doc.id).unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Approved);
    assert_eq!(stored.signer_id, Some(UserId::from("boss")));
}

#[test]
fn signed_document_cannot_be_overwritten() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let doc = approved_doc(&db, "L-1", "boss");
    db.signatures().commit(signature_for(&doc, "boss", &key)).unwrap();
    let signed = db.documents().get(&doc).unwrap().unwrap();

    let reopened = Document {
        status: DocumentStatus::Draft,
        content: b"rewritten".to_vec(),
        signed_at: None,
        ..signed.clone()
    };
    let err = db.documents().upsert(&reopened).unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidTransition {
            from: DocumentStatus::Signed,
            to: DocumentStatus::Draft,
            ..
        }
    ));
    assert_eq!(db.documents().get(&doc).unwrap(), Some(signed));
}

#[test]
fn missing_document() {
    let db = Database::open_in_memory().unwrap();
    let id = DocumentId::from("nope");
    assert!(db.documents().get(&id).unwrap().is_none());
    assert!(matches!(
        db.documents().transition(&id, DocumentStatus::Submitted),
        Err(StorageError::DocumentNotFound(_))
    ));
}

// ── Signatures ───────────────────────────────────────────────────

#[test]
fn commit_stores_signature_and_signs_document() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let doc = approved_doc(&db, "L-1", "boss");

    let record = db.signatures().commit(signature_for(&doc, "boss", &key)).unwrap();
    assert_eq!(record.origin_ip.as_deref(), Some("10.0.0.7"));

    let stored = db.signatures().for_document(&doc).unwrap().unwrap();
    assert_eq!(stored, record);
    assert_eq!(db.signatures().get(&record.id).unwrap(), Some(record.clone()));

    let signed = db.documents().get(&doc).unwrap().unwrap();
    assert_eq!(signed.status, DocumentStatus::Signed);
    assert_eq!(signed.signed_at, Some(record.signed_at));
}

#[test]
fn returned_signature_matches_stored_row() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let doc = approved_doc(&db, "L-1", "boss");
    let mut new = signature_for(&doc, "boss", &key);
    new.signed_at = DateTime::from_timestamp(1_718_000_000, 999_999_999).unwrap();

    let returned = db.signatures().commit(new).unwrap();
    assert_eq!(returned.signed_at, at(1_718_000_000_999));
    assert_eq!(db.signatures().for_document(&doc).unwrap(), Some(returned.clone()));
    assert_eq!(
        db.documents().get(&doc).unwrap().unwrap().signed_at,
        Some(returned.signed_at)
    );
}

#[test]
fn second_signature_by_same_signer_is_duplicate() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let doc = approved_doc(&db, "L-1", "boss");

    db.signatures().commit(signature_for(&doc, "boss", &key)).unwrap();
    let err = db.signatures().commit(signature_for(&doc, "boss", &key)).unwrap_err();
    assert!(matches!(err, StorageError::DuplicateSignature { .. }));
    assert_eq!(db.signatures().count_for_document(&doc).unwrap(), 1);
    assert!(db.signatures().find(&doc, &UserId::from("boss")).unwrap().is_some());
    assert!(db.signatures().find(&doc, &UserId::from("deputy")).unwrap().is_none());
}

#[test]
fn unapproved_document_rolls_back_signature() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let doc = Document {
        id: DocumentId::from("L-2"),
        status: DocumentStatus::UnderReview,
        signer_id: Some(UserId::from("boss")),
        content: b"pending".to_vec(),
        signed_at: None,
    };
    db.documents().upsert(&doc).unwrap();

    let err = db.signatures().commit(signature_for(&doc.id, "boss", &key)).unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidTransition { from: DocumentStatus::UnderReview, .. }
    ));
    assert_eq!(db.signatures().count_for_document(&doc.id).unwrap(), 0);
    assert_eq!(
        db.documents().get(&doc.id).unwrap().unwrap().status,
        DocumentStatus::UnderReview
    );
}

#[test]
fn signature_for_missing_document_is_not_found() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let err = db
        .signatures()
        .commit(signature_for(&DocumentId::from("ghost"), "boss", &key))
        .unwrap_err();
    assert!(matches!(err, StorageError::DocumentNotFound(_)));
    assert_eq!(db.signatures().count_for_document(&DocumentId::from("ghost")).unwrap(), 0);
}

#[test]
fn signatures_are_immutable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signet.db");
    let db = Database::open(&path).unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let doc = approved_doc(&db, "L-1", "boss");
    let record = db.signatures().commit(signature_for(&doc, "boss", &key)).unwrap();
    drop(db);

    let raw = rusqlite::Connection::open(&path).unwrap();
    assert!(raw
        .execute(
            "UPDATE signatures SET content_hash = 'x' WHERE id = ?1",
            [record.id.to_string()],
        )
        .is_err());
    assert!(raw
        .execute("DELETE FROM signatures WHERE id = ?1", [record.id.to_string()])
        .is_err());
}

#[test]
fn list_by_signer_is_newest_first() {
    let db = Database::open_in_memory().unwrap();
    let key = db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap();
    let older = approved_doc(&db, "L-1", "boss");
    let newer = approved_doc(&db, "L-2", "boss");

    db.signatures().commit(signature_for(&older, "boss", &key)).unwrap();
    let mut late = signature_for(&newer, "boss", &key);
    late.signed_at = late.signed_at + Duration::minutes(5);
    db.signatures().commit(late).unwrap();

    let docs: Vec<_> = db
        .signatures()
        .list_by_signer(&UserId::from("boss"))
        .unwrap()
        .into_iter()
        .map(|s| s.document_id)
        .collect();
    assert_eq!(docs, vec![newer, older]);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signet.db");
    let key_id = {
        let db = Database::open(&path).unwrap();
        db.keys().insert_active(new_key("boss", "fp-1", 1_000)).unwrap().id
    };
    let db = Database::open(&path).unwrap();
    assert_eq!(
        db.keys().active_for(&UserId::from("boss")).unwrap().unwrap().id,
        key_id
    );
}

// ── Audit ────────────────────────────────────────────────────────

#[test]
fn audit_events_round_trip() {
    let db = Database::open_in_memory().unwrap();
    let audit = db.audit();
    let boss = UserId::from("boss");

    let mut created = AuditEvent::success(AuditEventType::KeyGenerated)
        .with_actor(&boss)
        .with_context("key_fingerprint", "fp-1")
        .with_context("key_size", 2048);
    created.occurred_at = at(1_000);
    let mut failed = AuditEvent::failure(AuditEventType::SignatureCreated)
        .with_actor(&boss)
        .with_origin(&RequestOrigin::new("10.0.0.7", "tests/1.0"))
        .with_context("error", "invalid password or corrupted key");
    failed.occurred_at = at(2_000);

    audit.append(&created).unwrap();
    audit.append(&failed).unwrap();

    assert_eq!(audit.recent(10).unwrap(), vec![failed.clone(), created.clone()]);
    assert_eq!(audit.recent(1).unwrap().len(), 1);
    assert_eq!(
        audit.by_type(AuditEventType::SignatureCreated).unwrap(),
        vec![failed.clone()]
    );

    let by_boss = audit.by_actor(&boss).unwrap();
    assert_eq!(by_boss.len(), 2);
    assert_eq!(by_boss[1].outcome, AuditOutcome::Failure);
}
