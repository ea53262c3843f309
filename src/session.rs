//! The signer's side of a countersignature: draw, look at the preview, submit.

use crate::attestation::{raster_from_data_url, SignatureAttestation};
use crate::config::Config;
use crate::document::{Document, Identity};
use crate::geometry::CoordinateOrigin;
use crate::preview::{CompositionJob, Generation, Preview, PreviewPipeline, PreviewUpdate, Render};
use crate::status::{allowed_events, EventKind};
use crate::store::DocumentStore;
use crate::{Error, ValidationError};
use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Drawing,
    PreviewPending,
    PreviewReady,
    Submitting,
    Done,
}

impl SessionState {
    fn is_editing(&self) -> bool {
        matches!(
            self,
            SessionState::Drawing | SessionState::PreviewPending | SessionState::PreviewReady
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Drawing => "drawing",
            SessionState::PreviewPending => "preview pending",
            SessionState::PreviewReady => "preview ready",
            SessionState::Submitting => "submitting",
            SessionState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    /// The document as stored after signing.
    pub document: Document,
    /// `false` when the approval was recorded without a composited pdf.
    pub composited: bool,
}

struct ActiveDocument {
    document: Document,
    attestation: SignatureAttestation,
    renderer: Arc<dyn Render>,
    pipeline: PreviewPipeline,
    updates: mpsc::UnboundedReceiver<PreviewUpdate>,
    pending: Option<Generation>,
    preview: Option<Preview>,
}

/// Holds the session in [`SessionState::Submitting`]. Unless completed it
/// falls back to [`SessionState::PreviewReady`] when dropped, also when the
/// `submit` future itself is dropped halfway.
struct SubmitGuard<'a> {
    state: &'a mut SessionState,
    completed: bool,
}

impl<'a> SubmitGuard<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::Submitting;
        SubmitGuard {
            state,
            completed: false,
        }
    }

    fn complete(mut self) {
        *self.state = SessionState::Done;
        self.completed = true;
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            *self.state = SessionState::PreviewReady;
        }
    }
}

/// One signer working through one document at a time.
///
/// `submit` borrows the session mutably across its awaits, so nothing else
/// can touch the session while a submission is in flight.
pub struct SigningSession {
    store: Arc<dyn DocumentStore>,
    config: Config,
    origin: CoordinateOrigin,
    state: SessionState,
    active: Option<ActiveDocument>,
}

impl SigningSession {
    /// `origin` is the coordinate convention of the stored signature fields.
    pub fn new(store: Arc<dyn DocumentStore>, config: Config, origin: CoordinateOrigin) -> Self {
        SigningSession {
            store,
            config,
            origin,
            state: SessionState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> Option<&Document> {
        self.active.as_ref().map(|active| &active.document)
    }

    pub fn attestation(&self) -> Option<&SignatureAttestation> {
        self.active.as_ref().map(|active| &active.attestation)
    }

    /// The last preview delivered for the current drawing.
    pub fn preview(&self) -> Option<&Preview> {
        self.active.as_ref().and_then(|active| active.preview.as_ref())
    }

    /// Start signing `document`, rendering previews with [`CompositionJob`].
    pub fn open(&mut self, document: Document, signer: &Identity, today: NaiveDate) -> Result<(), Error> {
        let renderer = Arc::new(CompositionJob::new(
            Arc::clone(&self.store),
            &document,
            self.origin,
            &self.config,
        ));
        self.open_with_renderer(document, signer, today, renderer)
    }

    /// Like [`SigningSession::open`] with a custom renderer.
    pub fn open_with_renderer(
        &mut self,
        document: Document,
        signer: &Identity,
        today: NaiveDate,
        renderer: Arc<dyn Render>,
    ) -> Result<(), Error> {
        if !allowed_events(&document, signer).contains(&EventKind::Sign) {
            return Err(Error::StateTransition(format!(
                "`{}` can not sign document `{}` with status `{}`.",
                signer.id,
                document.id,
                document.status()
            )));
        }
        if let Some(previous) = self.active.take() {
            log::debug!("Leaving document `{}`.", previous.document.id);
            previous.pipeline.cancel();
        }

        let (pipeline, updates) = PreviewPipeline::channel(Arc::clone(&renderer));
        log::info!("`{}` opened document `{}` for signing.", signer.id, document.id);
        self.active = Some(ActiveDocument {
            attestation: SignatureAttestation::seeded(signer, today),
            document,
            renderer,
            pipeline,
            updates,
            pending: None,
            preview: None,
        });
        self.state = SessionState::Drawing;
        Ok(())
    }

    /// Keep the drawn signature and start a preview of it.
    pub fn save_drawing(&mut self, raster: Vec<u8>) -> Result<Generation, Error> {
        let active = self.editing("save a drawing")?;
        if raster.is_empty() {
            return Err(ValidationError::field("signature", "Please draw your signature.").into());
        }
        active.attestation.raster_image = raster;
        active.preview = None;
        let generation = active.pipeline.request_preview(active.attestation.clone());
        active.pending = Some(generation);
        self.state = SessionState::PreviewPending;
        Ok(generation)
    }

    /// [`SigningSession::save_drawing`] for a `data:image/png;base64,...` url.
    pub fn save_drawing_data_url(&mut self, data_url: &str) -> Result<Generation, Error> {
        let raster = raster_from_data_url(data_url)?;
        self.save_drawing(raster)
    }

    /// Wait for the preview of the current drawing. Previews of earlier
    /// drawings are skipped. Returns `None` when no preview is pending.
    pub async fn next_preview(&mut self) -> Option<Preview> {
        if self.state != SessionState::PreviewPending {
            return None;
        }
        let active = self.active.as_mut()?;
        let pending = active.pending?;
        while let Some(update) = active.updates.recv().await {
            if update.generation != pending {
                log::debug!("Skipping preview {}, waiting for {}.", update.generation, pending);
                continue;
            }
            active.preview = Some(update.preview.clone());
            self.state = SessionState::PreviewReady;
            return Some(update.preview);
        }
        None
    }

    /// Throw the drawing away and start over.
    pub fn redraw(&mut self) -> Result<(), Error> {
        let active = self.editing("redraw")?;
        active.pipeline.invalidate();
        active.attestation.raster_image.clear();
        active.pending = None;
        active.preview = None;
        self.state = SessionState::Drawing;
        Ok(())
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) -> Result<(), Error> {
        self.editing("edit the name")?.attestation.signer_name = name.into();
        Ok(())
    }

    pub fn set_email<S: Into<String>>(&mut self, email: S) -> Result<(), Error> {
        self.editing("edit the email")?.attestation.signer_email = email.into();
        Ok(())
    }

    pub fn set_date(&mut self, date: NaiveDate) -> Result<(), Error> {
        self.editing("edit the date")?.attestation.signed_date = date.format("%Y-%m-%d").to_string();
        Ok(())
    }

    /// Compose the final document and record the signature.
    ///
    /// When composition fails the signature is recorded without a composited
    /// pdf. When storing fails the session goes back to
    /// [`SessionState::PreviewReady`] and the submission can be retried.
    pub async fn submit(&mut self) -> Result<SubmitReceipt, Error> {
        if self.state != SessionState::PreviewReady {
            return Err(Error::StateTransition(format!(
                "Can not submit while {}.",
                self.state
            )));
        }
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| Error::StateTransition("No document is open.".to_owned()))?;
        active.attestation.validate()?;

        let submitting = SubmitGuard::enter(&mut self.state);
        active.pipeline.invalidate();
        active.pending = None;

        // Always a fresh run, the preview may be older than the fields.
        let composited = match active.renderer.render(active.attestation.clone()).await {
            Ok(result) => Some(result.bytes),
            Err(err) => {
                log::warn!(
                    "Submitting document `{}` without a composited pdf: {}",
                    active.document.id,
                    err
                );
                None
            }
        };
        let is_composited = composited.is_some();

        match self
            .store
            .persist_signed_document(&active.document.id, &active.attestation, composited)
            .await
        {
            Ok(document) => {
                log::info!("Document `{}` signed.", document.id);
                active.document = document.clone();
                submitting.complete();
                Ok(SubmitReceipt {
                    document,
                    composited: is_composited,
                })
            }
            Err(err) => {
                log::warn!("Submitting document `{}` failed: {}", active.document.id, err);
                Err(err)
            }
        }
    }

    /// Leave the document. Previews still in flight are never delivered.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            active.pipeline.cancel();
        }
        self.state = SessionState::Idle;
    }

    fn editing(&mut self, action: &str) -> Result<&mut ActiveDocument, Error> {
        if !self.state.is_editing() {
            return Err(Error::StateTransition(format!(
                "Can not {} while {}.",
                action, self.state
            )));
        }
        self.active
            .as_mut()
            .ok_or_else(|| Error::StateTransition("No document is open.".to_owned()))
    }
}
