//! Who may sign what.
//!
//! Role taxonomy lives outside the core. The workflow only asks a
//! [`SigningPolicy`] whether a signer may sign a document right now, and
//! asks again immediately before signing.

use signet_types::{Document, DocumentStatus, UserId};

pub trait SigningPolicy: Send + Sync {
    fn can_sign(&self, signer: &UserId, document: &Document) -> bool;
}

/// The document is `Approved` and `signer` is its designated signer.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssignedSignerPolicy;

impl SigningPolicy for AssignedSignerPolicy {
    fn can_sign(&self, signer: &UserId, document: &Document) -> bool {
        document.status == DocumentStatus::Approved && document.signer_id.as_ref() == Some(signer)
    }
}

/// Any predicate closure is a policy, e.g. one that also checks a role.
impl<F> SigningPolicy for F
where
    F: Fn(&UserId, &Document) -> bool + Send + Sync,
{
    fn can_sign(&self, signer: &UserId, document: &Document) -> bool {
        self(signer, document)
    }
}
