//! Reading the original document: pages, their sizes and where their media
//! box starts.

use crate::pdf_object::PdfObjectDeref;
use crate::rectangle::PageSize;
use crate::Error;
use lopdf::{Dictionary, Document, ObjectId};

const MAX_TREE_DEPTH: usize = 64;

/// A page of the source document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageFrame {
    pub id: ObjectId,
    pub size: PageSize,
    /// Lower-left corner of the media box. Placements are relative to it.
    pub origin: (f64, f64),
}

#[derive(Debug, Clone)]
pub(crate) struct SourceDocument {
    pub raw_document: Document,
    pub pages: Vec<PageFrame>,
}

impl SourceDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, Error> {
        let raw_document = Document::load_mem(bytes)
            .map_err(|err| Error::SourceDecode(format!("Not a readable pdf: {}", err)))?;
        if raw_document.trailer.has(b"Encrypt") {
            return Err(Error::SourceDecode(
                "Encrypted documents are not supported.".to_owned(),
            ));
        }

        let page_ids: Vec<ObjectId> = raw_document.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(Error::SourceDecode("Document has no pages.".to_owned()));
        }
        let mut pages = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            pages.push(Self::page_frame(&raw_document, id)?);
        }
        log::debug!("Loaded source document with {} page(s).", pages.len());

        Ok(SourceDocument {
            raw_document,
            pages,
        })
    }

    pub fn page_sizes(&self) -> Vec<PageSize> {
        self.pages.iter().map(|page| page.size).collect()
    }

    /// `MediaBox` is inheritable, so walk up the page tree until one is found.
    fn page_frame(raw_document: &Document, page_id: ObjectId) -> Result<PageFrame, Error> {
        let mut current = Some(page_id);
        // Bounded, a malformed tree may loop.
        let mut depth = 0;
        while let Some(id) = current.filter(|_| depth < MAX_TREE_DEPTH) {
            depth += 1;
            let dict = raw_document
                .get_object(id)
                .and_then(|obj| obj.as_dict())
                .map_err(|err| Error::SourceDecode(format!("Broken page tree: {}", err)))?;
            if let Some((origin, size)) = Self::media_box(raw_document, dict)? {
                return Ok(PageFrame {
                    id: page_id,
                    size,
                    origin,
                });
            }
            current = dict
                .get(b"Parent")
                .ok()
                .and_then(|parent| parent.get_object_id());
        }
        log::warn!(
            "Page ({},{}) has no MediaBox, assuming A4.",
            page_id.0,
            page_id.1
        );
        Ok(PageFrame {
            id: page_id,
            size: PageSize::A4,
            origin: (0.0, 0.0),
        })
    }

    fn media_box(
        raw_document: &Document,
        dict: &Dictionary,
    ) -> Result<Option<((f64, f64), PageSize)>, Error> {
        let media_box = match dict.get(b"MediaBox") {
            Ok(media_box) => media_box.deref(raw_document)?,
            Err(_) => return Ok(None),
        };
        let values = media_box
            .as_array()
            .map_err(|err| Error::SourceDecode(format!("MediaBox is not an array: {}", err)))?;
        let numbers: Vec<f64> = values.iter().filter_map(|value| value.as_number()).collect();
        if numbers.len() != 4 {
            return Err(Error::SourceDecode(format!(
                "MediaBox should hold 4 numbers, found {}.",
                numbers.len()
            )));
        }
        let (x1, x2) = (numbers[0].min(numbers[2]), numbers[0].max(numbers[2]));
        let (y1, y2) = (numbers[1].min(numbers[3]), numbers[1].max(numbers[3]));
        if x2 - x1 <= 0.0 || y2 - y1 <= 0.0 {
            return Err(Error::SourceDecode("MediaBox has no area.".to_owned()));
        }
        Ok(Some(((x1, y1), PageSize::new(x2 - x1, y2 - y1))))
    }
}

/// Sizes of all pages of a pdf, in page order. Feed these to
/// [`GeometryResolver::resolve`](crate::GeometryResolver::resolve).
pub fn page_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, Error> {
    Ok(SourceDocument::load(bytes)?.page_sizes())
}
