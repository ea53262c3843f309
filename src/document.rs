//! The document entity and everything it is made of.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new<I: Into<String>, N: Into<String>, E: Into<String>>(id: I, name: N, email: E) -> Self {
        Identity {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn has_email(&self, email: &str) -> bool {
        same_email(&self.email, email)
    }
}

fn same_email(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// The signer a document is assigned to. Uploads only know the signer's email
/// until that person has an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignerRef {
    Identity(Identity),
    Email(String),
}

impl SignerRef {
    pub fn email(&self) -> &str {
        match self {
            SignerRef::Identity(identity) => &identity.email,
            SignerRef::Email(email) => email,
        }
    }

    pub fn matches(&self, actor: &Identity) -> bool {
        match self {
            SignerRef::Identity(identity) => identity.id == actor.id,
            SignerRef::Email(email) => actor.has_email(email),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    #[default]
    Signature,
    Initials,
    Date,
    Text,
    #[serde(other)]
    Other,
}

/// A page-relative rectangle where a stamp should be drawn.
///
/// The coordinate convention (top-left or bottom-left origin) is not part of
/// the region; whoever resolves it has to say which one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRegion {
    /// 0-based page index.
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: RegionKind,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl PlacementRegion {
    pub fn signature(page: usize, x: f64, y: f64, width: f64, height: f64) -> Self {
        PlacementRegion {
            page,
            x,
            y,
            width,
            height,
            kind: RegionKind::Signature,
            required: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Signed,
    Verified,
    Rejected,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 4] = [
        DocumentStatus::Pending,
        DocumentStatus::Signed,
        DocumentStatus::Verified,
        DocumentStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Signed => "signed",
            DocumentStatus::Verified => "verified",
            DocumentStatus::Rejected => "rejected",
        }
    }

    /// No event leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Verified | DocumentStatus::Rejected)
    }

    /// Whether the signer has acted on the document.
    pub fn is_signed(&self) -> bool {
        !matches!(self, DocumentStatus::Pending)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// The plain-text part of an attestation, kept on the document once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub signer_name: String,
    pub signer_email: String,
    pub signed_date: String,
}

/// Deserializing refuses documents whose status fields contradict each other,
/// see [`Document::is_consistent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DocumentRepr")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub original_file_name: String,
    /// Opaque reference to the stored original bytes.
    pub source_url: String,
    pub uploader: Identity,
    pub assigned_signer: SignerRef,
    pub signature_fields: Vec<PlacementRegion>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    // Only changed through `status::apply`.
    pub(crate) status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signature: Option<SignatureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signed_source_url: Option<String>,
}

/// Wire form of [`Document`], checked before it becomes one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRepr {
    id: String,
    title: String,
    original_file_name: String,
    source_url: String,
    uploader: Identity,
    assigned_signer: SignerRef,
    #[serde(default)]
    signature_fields: Vec<PlacementRegion>,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    comments: Option<String>,
    status: DocumentStatus,
    #[serde(default)]
    rejection_reason: Option<String>,
    #[serde(default)]
    signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    signature: Option<SignatureRecord>,
    #[serde(default)]
    signed_source_url: Option<String>,
}

impl TryFrom<DocumentRepr> for Document {
    type Error = String;

    fn try_from(repr: DocumentRepr) -> Result<Self, Self::Error> {
        let document = Document {
            id: repr.id,
            title: repr.title,
            original_file_name: repr.original_file_name,
            source_url: repr.source_url,
            uploader: repr.uploader,
            assigned_signer: repr.assigned_signer,
            signature_fields: repr.signature_fields,
            priority: repr.priority,
            due_date: repr.due_date,
            comments: repr.comments,
            status: repr.status,
            rejection_reason: repr.rejection_reason,
            signed_at: repr.signed_at,
            signature: repr.signature,
            signed_source_url: repr.signed_source_url,
        };
        if !document.is_consistent() {
            return Err(format!(
                "document `{}` with status `{}` has inconsistent signing or rejection details",
                document.id, document.status
            ));
        }
        Ok(document)
    }
}

impl Document {
    /// A freshly uploaded document, waiting for its signer.
    pub fn upload<I, T, F, U>(
        id: I,
        title: T,
        original_file_name: F,
        source_url: U,
        uploader: Identity,
        assigned_signer: SignerRef,
        signature_fields: Vec<PlacementRegion>,
    ) -> Self
    where
        I: Into<String>,
        T: Into<String>,
        F: Into<String>,
        U: Into<String>,
    {
        Document {
            id: id.into(),
            title: title.into(),
            original_file_name: original_file_name.into(),
            source_url: source_url.into(),
            uploader,
            assigned_signer,
            signature_fields,
            priority: Priority::Normal,
            due_date: None,
            comments: None,
            status: DocumentStatus::Pending,
            rejection_reason: None,
            signed_at: None,
            signature: None,
            signed_source_url: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_comments<C: Into<String>>(mut self, comments: C) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        self.signed_at
    }

    pub fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    /// Where the composited pdf was stored. `None` for degraded submissions.
    pub fn signed_source_url(&self) -> Option<&str> {
        self.signed_source_url.as_deref()
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.original_file_name
        } else {
            &self.title
        }
    }

    /// File name offered when the signed result is downloaded.
    pub fn download_file_name(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            "signed-document.pdf".to_owned()
        } else if title.to_ascii_lowercase().ends_with(".pdf") {
            title.to_owned()
        } else {
            format!("{}.pdf", title)
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_signed() && self.due_date.map_or(false, |due| due < today)
    }

    /// `rejection_reason` is set iff rejected, `signed_at` iff signed at some point.
    pub fn is_consistent(&self) -> bool {
        let reason_ok = self.rejection_reason.is_some() == (self.status == DocumentStatus::Rejected);
        let signed_ok = self.signed_at.is_some() == self.status.is_signed();
        let record_ok = self.signature.is_some() == self.status.is_signed();
        reason_ok && signed_ok && record_ok
    }
}

/// Which side of a document a listing is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Uploader(Identity),
    Signer(Identity),
}

/// Filter over a list of documents, as the dashboards list them.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub audience: Option<Audience>,
    pub status: Option<DocumentStatus>,
}

impl DocumentQuery {
    pub fn uploaded_by(identity: Identity) -> Self {
        DocumentQuery {
            audience: Some(Audience::Uploader(identity)),
            status: None,
        }
    }

    pub fn assigned_to(identity: Identity) -> Self {
        DocumentQuery {
            audience: Some(Audience::Signer(identity)),
            status: None,
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        let audience_ok = match &self.audience {
            None => true,
            Some(Audience::Uploader(identity)) => document.uploader.id == identity.id,
            Some(Audience::Signer(identity)) => document.assigned_signer.matches(identity),
        };
        audience_ok && self.status.map_or(true, |status| document.status == status)
    }

    pub fn apply<'a>(&self, documents: &'a [Document]) -> Vec<&'a Document> {
        documents.iter().filter(|doc| self.matches(doc)).collect()
    }
}

/// Number of documents per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub pending: usize,
    pub signed: usize,
    pub verified: usize,
    pub rejected: usize,
}

impl StatusTally {
    pub fn count<'a, I: IntoIterator<Item = &'a Document>>(documents: I) -> Self {
        let mut tally = StatusTally::default();
        for document in documents {
            match document.status {
                DocumentStatus::Pending => tally.pending += 1,
                DocumentStatus::Signed => tally.signed += 1,
                DocumentStatus::Verified => tally.verified += 1,
                DocumentStatus::Rejected => tally.rejected += 1,
            }
        }
        tally
    }

    /// Documents the signer is done with.
    pub fn completed(&self) -> usize {
        self.signed + self.verified + self.rejected
    }

    pub fn total(&self) -> usize {
        self.pending + self.completed()
    }
}
