//! Role-gated status transitions of a [`Document`].
//!
//! | From    | Event  | To       | Guard                                   |
//! |---------|--------|----------|-----------------------------------------|
//! | pending | sign   | signed   | actor is the assigned signer            |
//! | signed  | verify | verified | actor is the uploader                   |
//! | signed  | reject | rejected | actor is the uploader, reason not empty |
//!
//! Rejection is final for the entity; a rejected document is uploaded again
//! as a new document.

use crate::document::{Document, DocumentStatus, Identity, SignatureRecord};
use crate::store::DocumentStore;
use crate::Error;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Sign {
        signature: SignatureRecord,
        /// Reference to the stored composited pdf, if one was produced.
        signed_source_url: Option<String>,
        at: DateTime<Utc>,
    },
    Verify,
    Reject {
        reason: String,
    },
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StatusEvent::Sign { .. } => "sign",
            StatusEvent::Verify => "verify",
            StatusEvent::Reject { .. } => "reject",
        }
    }
}

/// Event kinds, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Sign,
    Verify,
    Reject,
}

/// Apply `event` on behalf of `actor`. On error the document is unchanged.
pub fn apply(document: &mut Document, event: StatusEvent, actor: &Identity) -> Result<(), Error> {
    let from = document.status;
    match (from, event) {
        (DocumentStatus::Pending, StatusEvent::Sign {
            signature,
            signed_source_url,
            at,
        }) => {
            if !document.assigned_signer.matches(actor) {
                return Err(refused(document, "sign", actor, "is not the assigned signer"));
            }
            document.status = DocumentStatus::Signed;
            document.signed_at = Some(at);
            document.signature = Some(signature);
            document.signed_source_url = signed_source_url;
        }
        (DocumentStatus::Signed, StatusEvent::Verify) => {
            if document.uploader.id != actor.id {
                return Err(refused(document, "verify", actor, "is not the uploader"));
            }
            document.status = DocumentStatus::Verified;
        }
        (DocumentStatus::Signed, StatusEvent::Reject { reason }) => {
            if document.uploader.id != actor.id {
                return Err(refused(document, "reject", actor, "is not the uploader"));
            }
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(refused(document, "reject", actor, "gave no reason"));
            }
            document.status = DocumentStatus::Rejected;
            document.rejection_reason = Some(reason.to_owned());
        }
        (status, event) => {
            return Err(Error::StateTransition(format!(
                "Event `{}` is not allowed on document `{}` with status `{}`.",
                event.name(),
                document.id,
                status
            )));
        }
    }
    debug_assert!(document.is_consistent());
    log::info!(
        "Document `{}` moved from `{}` to `{}` by `{}`.",
        document.id,
        from,
        document.status,
        actor.id
    );
    Ok(())
}

fn refused(document: &Document, event: &str, actor: &Identity, why: &str) -> Error {
    Error::StateTransition(format!(
        "Event `{}` on document `{}` refused: `{}` {}.",
        event, document.id, actor.id, why
    ))
}

/// The events `actor` may apply to `document` right now.
pub fn allowed_events(document: &Document, actor: &Identity) -> Vec<EventKind> {
    match document.status {
        DocumentStatus::Pending if document.assigned_signer.matches(actor) => vec![EventKind::Sign],
        DocumentStatus::Signed if document.uploader.id == actor.id => {
            vec![EventKind::Verify, EventKind::Reject]
        }
        _ => Vec::new(),
    }
}

/// The uploader's decision on a signed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Verify,
    Reject { reason: String },
}

/// Check `decision` against the document, then store it. A refused
/// transition never reaches the store.
pub async fn review(
    store: &dyn DocumentStore,
    document: &Document,
    decision: ReviewDecision,
    reviewer: &Identity,
) -> Result<Document, Error> {
    let (event, reason) = match decision {
        ReviewDecision::Verify => (StatusEvent::Verify, None),
        ReviewDecision::Reject { reason } => {
            let trimmed = reason.trim().to_owned();
            (StatusEvent::Reject { reason }, Some(trimmed))
        }
    };
    let mut reviewed = document.clone();
    apply(&mut reviewed, event, reviewer)?;
    store
        .update_status(&document.id, reviewed.status(), reason)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SignerRef;
    use pretty_assertions::assert_eq;

    fn uploader() -> Identity {
        Identity::new("u1", "Uma Uploader", "uma@example.com")
    }

    fn signer() -> Identity {
        Identity::new("s1", "Jane Doe", "jane@x.com")
    }

    fn stranger() -> Identity {
        Identity::new("x9", "Mallory", "mallory@x.com")
    }

    fn pending() -> Document {
        Document::upload(
            "d1",
            "Lease",
            "lease.pdf",
            "mem://lease.pdf",
            uploader(),
            SignerRef::Email("jane@x.com".to_owned()),
            vec![],
        )
    }

    fn sign_event() -> StatusEvent {
        StatusEvent::Sign {
            signature: SignatureRecord {
                signer_name: "Jane Doe".to_owned(),
                signer_email: "jane@x.com".to_owned(),
                signed_date: "2025-01-20".to_owned(),
            },
            signed_source_url: Some("mem://d1/signed.pdf".to_owned()),
            at: Utc::now(),
        }
    }

    fn signed() -> Document {
        let mut document = pending();
        apply(&mut document, sign_event(), &signer()).unwrap();
        document
    }

    #[test]
    fn signer_signs_pending_document() {
        let document = signed();
        assert_eq!(document.status(), DocumentStatus::Signed);
        assert!(document.signed_at().is_some());
        assert_eq!(document.signature().unwrap().signer_name, "Jane Doe");
        assert_eq!(document.signed_source_url(), Some("mem://d1/signed.pdf"));
        assert!(document.is_consistent());
    }

    #[test]
    fn only_the_assigned_signer_may_sign() {
        for actor in [uploader(), stranger()] {
            let mut document = pending();
            let before = document.clone();
            let err = apply(&mut document, sign_event(), &actor).unwrap_err();
            assert!(matches!(err, Error::StateTransition(_)));
            assert_eq!(document, before);
        }
    }

    #[test]
    fn uploader_verifies() {
        let mut document = signed();
        apply(&mut document, StatusEvent::Verify, &uploader()).unwrap();
        assert_eq!(document.status(), DocumentStatus::Verified);
        assert!(document.status().is_terminal());
        assert!(document.is_consistent());
    }

    #[test]
    fn signer_can_not_verify_own_signature() {
        let mut document = signed();
        let before = document.clone();
        assert!(apply(&mut document, StatusEvent::Verify, &signer()).is_err());
        assert_eq!(document, before);
    }

    #[test]
    fn rejection_needs_a_reason() {
        let mut document = signed();
        let before = document.clone();
        let err = apply(
            &mut document,
            StatusEvent::Reject {
                reason: "   ".to_owned(),
            },
            &uploader(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::StateTransition(_)));
        assert_eq!(document, before);
    }

    #[test]
    fn rejection_is_final() {
        let mut document = signed();
        apply(
            &mut document,
            StatusEvent::Reject {
                reason: "illegible".to_owned(),
            },
            &uploader(),
        )
        .unwrap();
        assert_eq!(document.status(), DocumentStatus::Rejected);
        assert_eq!(document.rejection_reason(), Some("illegible"));
        assert!(document.is_consistent());

        let before = document.clone();
        let err = apply(&mut document, sign_event(), &signer()).unwrap_err();
        assert!(matches!(err, Error::StateTransition(_)));
        assert_eq!(document, before);
        assert!(apply(&mut document, StatusEvent::Verify, &uploader()).is_err());
    }

    #[test]
    fn events_out_of_order_fail() {
        let mut document = pending();
        assert!(apply(&mut document, StatusEvent::Verify, &uploader()).is_err());
        assert!(apply(
            &mut document,
            StatusEvent::Reject {
                reason: "no".to_owned()
            },
            &uploader()
        )
        .is_err());
        assert_eq!(document.status(), DocumentStatus::Pending);

        let mut document = signed();
        assert!(apply(&mut document, sign_event(), &signer()).is_err());
        assert_eq!(document.status(), DocumentStatus::Signed);
    }

    #[test]
    fn allowed_events_follow_roles() {
        assert_eq!(allowed_events(&pending(), &signer()), vec![EventKind::Sign]);
        assert!(allowed_events(&pending(), &uploader()).is_empty());
        assert_eq!(
            allowed_events(&signed(), &uploader()),
            vec![EventKind::Verify, EventKind::Reject]
        );
        assert!(allowed_events(&signed(), &signer()).is_empty());
    }
}
