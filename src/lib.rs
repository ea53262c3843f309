//! Countersigning of uploaded pdf documents.
//!
//! An uploader assigns a pdf to a signer. The signer draws a signature, sees
//! a preview of it stamped into the document and submits. The uploader then
//! verifies or rejects the signed document.
//!
//! The pieces, bottom up:
//! - [`GeometryResolver`] turns stored signature fields into pdf rectangles.
//! - [`OverlayCompositor`] stamps the signature and its attestation text into
//!   a copy of the pdf.
//! - [`PreviewPipeline`] renders previews in the background, newest wins.
//! - [`SigningSession`] walks the signer from drawing to submission.
//! - [`status`] guards the document's status transitions.

mod attestation;
mod compositor;
mod config;
mod document;
mod error;
mod geometry;
mod image_xobject;
mod pdf_object;
mod preview;
mod rectangle;
mod session;
mod source_document;
mod stamp_layout;
pub mod status;
mod store;

pub use attestation::{raster_from_data_url, to_data_url, SignatureAttestation};
pub use compositor::{CompositionResult, OverlayCompositor, StampReport};
pub use config::{Config, LayoutPolicy, StampStyle};
pub use document::{
    Audience, Document, DocumentQuery, DocumentStatus, Identity, PlacementRegion, Priority,
    RegionKind, SignatureRecord, SignerRef, StatusTally,
};
pub use error::{Error, ValidationError};
pub use geometry::{
    pdf_to_viewer, region_from_viewer, viewer_to_pdf, CoordinateOrigin, GeometryResolver,
    ResolvedPlacement, ViewerSurface,
};
pub use lopdf;
pub use preview::{
    CompositionJob, Generation, Preview, PreviewPipeline, PreviewUpdate, Render,
};
pub use rectangle::{PageSize, Rectangle};
pub use session::{SessionState, SigningSession, SubmitReceipt};
pub use source_document::page_sizes;
pub use store::DocumentStore;
