#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use pdf_countersign::lopdf::{
    content::{Content, Operation},
    dictionary, Document as PdfDocument, Object, ObjectId, Stream,
};
use pdf_countersign::status::{apply, StatusEvent};
use pdf_countersign::{
    Document, DocumentStatus, DocumentStore, Error, Identity, PageSize, PlacementRegion,
    SignatureAttestation, SignerRef,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A pdf with one text line per page. With `inherit` the media box and
/// resources live on the page tree node instead of on each page.
pub fn pdf(pages: &[PageSize], inherit: bool) -> Vec<u8> {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (index, size) in pages.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![50.into(), 50.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !inherit {
            page.set("Resources", resources_id);
            page.set("MediaBox", media_box(*size));
        }
        kids.push(doc.add_object(page).into());
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages.len() as i64,
    };
    if inherit {
        tree.set("Resources", resources_id);
        tree.set("MediaBox", media_box(pages[0]));
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn media_box(size: PageSize) -> Vec<Object> {
    vec![0.into(), 0.into(), size.width.into(), size.height.into()]
}

/// A small RGBA drawing: dark strokes on a transparent background.
pub fn signature_png(width: u32, height: u32) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|index| {
            if index % 3 == 0 {
                [20, 20, 90, 255]
            } else {
                [0, 0, 0, 0]
            }
        })
        .collect();
    let mut data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut data, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    data
}

pub fn attestation() -> SignatureAttestation {
    SignatureAttestation {
        raster_image: signature_png(40, 20),
        signer_name: "Jane Doe".to_owned(),
        signer_email: "jane@x.com".to_owned(),
        signed_date: "2025-01-20".to_owned(),
    }
}

/// Names of the XObjects drawn by the content of `page` (0 based).
pub fn drawn_xobjects(bytes: &[u8], page: u32) -> Vec<String> {
    let doc = PdfDocument::load_mem(bytes).unwrap();
    let page_id = doc.get_pages()[&(page + 1)];
    doc.get_and_decode_page_content(page_id)
        .unwrap()
        .operations
        .iter()
        .filter(|op| op.operator == "Do")
        .map(|op| op.operands[0].as_name_str().unwrap().to_owned())
        .collect()
}

pub fn page_id(doc: &PdfDocument, page: u32) -> ObjectId {
    doc.get_pages()[&(page + 1)]
}

pub fn uploader() -> Identity {
    Identity::new("u1", "Uma Uploader", "uma@example.com")
}

pub fn signer() -> Identity {
    Identity::new("s1", "Jane Doe", "jane@x.com")
}

pub fn lease(regions: Vec<PlacementRegion>) -> Document {
    Document::upload(
        "d1",
        "Lease",
        "lease.pdf",
        "mem://lease.pdf",
        uploader(),
        SignerRef::Email("jane@x.com".to_owned()),
        regions,
    )
}

/// Keeps blobs and documents in memory and runs every change through the
/// status machine, like a real backend would.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    documents: Mutex<HashMap<String, Document>>,
    fetches: AtomicUsize,
    status_updates: AtomicUsize,
    failing_persists: AtomicUsize,
}

impl MemoryStore {
    pub fn with(document: Document, original: Vec<u8>) -> Self {
        let store = MemoryStore::default();
        store.put_blob(&document.source_url, original);
        store.insert(document);
        store
    }

    pub fn put_blob(&self, url: &str, bytes: Vec<u8>) {
        self.blobs.lock().unwrap().insert(url.to_owned(), bytes);
    }

    pub fn blob(&self, url: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(url).cloned()
    }

    pub fn insert(&self, document: Document) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.id.clone(), document);
    }

    pub fn document(&self, id: &str) -> Document {
        self.documents.lock().unwrap()[id].clone()
    }

    /// The next `count` persist calls fail with a transport error.
    pub fn fail_next_persists(&self, count: usize) {
        self.failing_persists.store(count, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn status_update_count(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failing_persists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.blob(url)
            .ok_or_else(|| Error::Transport(format!("`{}` not found", url)))
    }

    async fn persist_signed_document(
        &self,
        document_id: &str,
        attestation: &SignatureAttestation,
        composited: Option<Vec<u8>>,
    ) -> Result<Document, Error> {
        if self.take_failure() {
            return Err(Error::Transport("connection reset".to_owned()));
        }
        let mut document = self.document(document_id);
        let signed_source_url = composited.map(|bytes| {
            let url = format!("mem://{}/signed.pdf", document_id);
            self.put_blob(&url, bytes);
            url
        });
        let actor = Identity::new(
            "s1",
            attestation.signer_name.clone(),
            attestation.signer_email.clone(),
        );
        apply(
            &mut document,
            StatusEvent::Sign {
                signature: attestation.record(),
                signed_source_url,
                at: Utc::now(),
            },
            &actor,
        )?;
        self.insert(document.clone());
        Ok(document)
    }

    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        reason: Option<String>,
    ) -> Result<Document, Error> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let mut document = self.document(document_id);
        let event = match status {
            DocumentStatus::Verified => StatusEvent::Verify,
            DocumentStatus::Rejected => StatusEvent::Reject {
                reason: reason.unwrap_or_default(),
            },
            other => {
                return Err(Error::StateTransition(format!(
                    "`{}` is not a review outcome",
                    other
                )))
            }
        };
        let uploader = document.uploader.clone();
        apply(&mut document, event, &uploader)?;
        self.insert(document.clone());
        Ok(document)
    }
}
