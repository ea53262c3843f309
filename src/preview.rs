//! Non-blocking previews of the composited document.
//!
//! Every request gets a new [`Generation`]. Only the result of the newest
//! request is ever delivered: older results are dropped when they arrive,
//! whatever order the runs finish in. After [`PreviewPipeline::cancel`]
//! nothing is delivered at all.

use crate::attestation::SignatureAttestation;
use crate::compositor::{CompositionResult, OverlayCompositor, StampReport};
use crate::config::Config;
use crate::document::{Document, PlacementRegion};
use crate::geometry::{CoordinateOrigin, GeometryResolver};
use crate::rectangle::PageSize;
use crate::source_document::page_sizes;
use crate::store::DocumentStore;
use crate::Error;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, OnceCell};

/// Produces a composited document for an attestation.
#[async_trait]
pub trait Render: Send + Sync {
    async fn render(&self, attestation: SignatureAttestation) -> Result<CompositionResult, Error>;
}

/// Renders one document: fetches the original once, then resolves and
/// composes for every attestation it is asked for.
pub struct CompositionJob {
    store: Arc<dyn DocumentStore>,
    source_url: String,
    regions: Vec<PlacementRegion>,
    origin: CoordinateOrigin,
    resolver: GeometryResolver,
    compositor: OverlayCompositor,
    original: OnceCell<Arc<OriginalDocument>>,
}

struct OriginalDocument {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

impl CompositionJob {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        document: &Document,
        origin: CoordinateOrigin,
        config: &Config,
    ) -> Self {
        CompositionJob {
            store,
            source_url: document.source_url.clone(),
            regions: document.signature_fields.clone(),
            origin,
            resolver: GeometryResolver::new(config.layout.clone()),
            compositor: OverlayCompositor::new(config.stamp.clone()),
            original: OnceCell::new(),
        }
    }

    async fn original(&self) -> Result<Arc<OriginalDocument>, Error> {
        let original = self
            .original
            .get_or_try_init(|| async {
                let bytes = self.store.fetch_bytes(&self.source_url).await?;
                let sizes = page_sizes(&bytes)?;
                log::debug!(
                    "Fetched `{}`: {} bytes, {} page(s).",
                    self.source_url,
                    bytes.len(),
                    sizes.len()
                );
                Ok::<_, Error>(Arc::new(OriginalDocument {
                    bytes,
                    page_sizes: sizes,
                }))
            })
            .await?;
        Ok(Arc::clone(original))
    }
}

#[async_trait]
impl Render for CompositionJob {
    async fn render(&self, attestation: SignatureAttestation) -> Result<CompositionResult, Error> {
        let original = self.original().await?;
        let placements = self
            .resolver
            .resolve(&self.regions, &original.page_sizes, self.origin)?;
        let compositor = self.compositor.clone();
        // Composition is CPU bound, keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            compositor.compose(&original.bytes, &attestation, &placements)
        })
        .await
        .map_err(|err| Error::Composition(format!("Composition task failed: {}", err)))?
    }
}

/// Identifies one preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Ready {
        /// `data:application/pdf;base64,...`
        data_uri: String,
        stamps: Vec<StampReport>,
    },
    /// Preview failed. Signing can go on without it.
    Unavailable { reason: String },
}

impl Preview {
    pub fn is_ready(&self) -> bool {
        matches!(self, Preview::Ready { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewUpdate {
    pub generation: Generation,
    pub preview: Preview,
}

#[derive(Debug, Default)]
struct Slot {
    current: u64,
    cancelled: bool,
}

impl Slot {
    fn accepts(&self, generation: Generation) -> bool {
        !self.cancelled && self.current == generation.0
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // The slot only holds plain counters, a poisoned lock is still usable.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PreviewPipeline {
    renderer: Arc<dyn Render>,
    slot: Arc<Mutex<Slot>>,
    updates: mpsc::UnboundedSender<PreviewUpdate>,
}

impl PreviewPipeline {
    pub fn new(renderer: Arc<dyn Render>, updates: mpsc::UnboundedSender<PreviewUpdate>) -> Self {
        PreviewPipeline {
            renderer,
            slot: Arc::new(Mutex::new(Slot::default())),
            updates,
        }
    }

    /// Pipeline together with the receiving end of its updates.
    pub fn channel(renderer: Arc<dyn Render>) -> (Self, mpsc::UnboundedReceiver<PreviewUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(renderer, sender), receiver)
    }

    /// Start a preview run and return its generation. Every earlier run is
    /// superseded. Must be called from within a tokio runtime.
    pub fn request_preview(&self, attestation: SignatureAttestation) -> Generation {
        let (generation, cancelled) = {
            let mut slot = lock(&self.slot);
            slot.current += 1;
            (Generation(slot.current), slot.cancelled)
        };
        if cancelled {
            log::debug!("Preview {} requested on a cancelled pipeline.", generation);
            return generation;
        }

        let renderer = Arc::clone(&self.renderer);
        let slot = Arc::clone(&self.slot);
        let updates = self.updates.clone();
        tokio::spawn(async move {
            let preview = match renderer.render(attestation).await {
                Ok(result) => Preview::Ready {
                    data_uri: result.to_data_url(),
                    stamps: result.stamps,
                },
                Err(err) => {
                    log::warn!("Preview {} unavailable: {}", generation, err);
                    Preview::Unavailable {
                        reason: err.to_string(),
                    }
                }
            };
            // Checked and sent under the lock, so `cancel` can not slip in between.
            let slot = lock(&slot);
            if !slot.accepts(generation) {
                log::debug!("Dropping stale preview {}.", generation);
                return;
            }
            if updates
                .send(PreviewUpdate {
                    generation,
                    preview,
                })
                .is_err()
            {
                log::debug!("Preview {} finished but nobody is listening.", generation);
            }
        });
        generation
    }

    /// Whether `generation` is the newest request and may still be delivered.
    pub fn is_current(&self, generation: Generation) -> bool {
        lock(&self.slot).accepts(generation)
    }

    /// Drop the results of all runs in flight. New requests are still served.
    pub fn invalidate(&self) {
        lock(&self.slot).current += 1;
    }

    /// Drop all runs in flight and refuse new ones. Once this returns no
    /// update is sent anymore.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.current += 1;
        slot.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.slot).cancelled
    }
}

impl Drop for PreviewPipeline {
    fn drop(&mut self) {
        self.cancel();
    }
}
