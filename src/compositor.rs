//! Burns a signature and its attestation into a pdf.

use crate::attestation::{to_data_url, SignatureAttestation};
use crate::config::StampStyle;
use crate::geometry::ResolvedPlacement;
use crate::image_xobject::ImageXObject;
use crate::pdf_object::PdfObjectDeref;
use crate::rectangle::Rectangle;
use crate::source_document::{PageFrame, SourceDocument};
use crate::stamp_layout::{StampLayout, TextLine};
use crate::Error;
use lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, ObjectId, Stream, StringFormat,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const IMAGE_NAME: &str = "CsSignature";
const FONT_NAME: &str = "CsHelvetica";
const STAMP_NAME_PREFIX: &str = "CsStamp";

/// What was drawn for one placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampReport {
    pub page: usize,
    /// Where the signature image was drawn.
    pub stamp: Rectangle,
    /// Image plus all text.
    pub bounding_box: Rectangle,
    pub label: bool,
    pub text_lines: usize,
}

/// A freshly written pdf. Every run produces a new one.
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub bytes: Vec<u8>,
    pub stamps: Vec<StampReport>,
}

impl CompositionResult {
    /// Digest of the visual layout (stamp positions and text line counts).
    /// Equal digests mean the same visual result, whatever the bytes look like.
    pub fn layout_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for stamp in &self.stamps {
            hasher.update((stamp.page as u64).to_be_bytes());
            for value in [
                stamp.stamp.x1,
                stamp.stamp.y1,
                stamp.stamp.x2,
                stamp.stamp.y2,
                stamp.bounding_box.x1,
                stamp.bounding_box.y1,
                stamp.bounding_box.x2,
                stamp.bounding_box.y2,
            ] {
                hasher.update(value.to_be_bytes());
            }
            hasher.update([stamp.label as u8, stamp.text_lines as u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn to_data_url(&self) -> String {
        to_data_url("application/pdf", &self.bytes)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlayCompositor {
    style: StampStyle,
}

impl OverlayCompositor {
    pub fn new(style: StampStyle) -> Self {
        OverlayCompositor { style }
    }

    /// Stamp `attestation` at every placement. The input bytes are only read;
    /// on failure nothing is returned.
    pub fn compose(
        &self,
        original_bytes: &[u8],
        attestation: &SignatureAttestation,
        placements: &[ResolvedPlacement],
    ) -> Result<CompositionResult, Error> {
        let SourceDocument {
            raw_document: mut document,
            pages,
        } = SourceDocument::load(original_bytes)?;
        let (mut image_xobject, mask_xobject) =
            ImageXObject::try_from_png(&attestation.raster_image[..])?;
        if placements.is_empty() {
            return Err(Error::Composition("Nothing to stamp: no placements.".to_owned()));
        }
        let frames = placements
            .iter()
            .enumerate()
            .map(|(index, placement)| Self::frame_for(index, placement, &pages))
            .collect::<Result<Vec<PageFrame>, Error>>()?;

        // Image, mask and font are shared by all stamps.
        if let Some(mask_xobject) = mask_xobject {
            let mask_xobject_id = document.add_object(mask_xobject);
            image_xobject.s_mask = Some(mask_xobject_id);
        }
        let image_xobject_id = document.add_object(image_xobject);
        let font_id = document.add_object(helvetica_font());

        let mut page_operations: BTreeMap<usize, (PageFrame, Vec<Operation>)> = BTreeMap::new();
        let mut stamps = Vec::with_capacity(placements.len());
        for (index, (placement, frame)) in placements.iter().zip(frames).enumerate() {
            let layout = StampLayout::compute(placement.rect, frame.size, attestation, &self.style);
            let form_xobject = self.stamp_form_xobject(&layout, image_xobject_id, font_id)?;
            let form_id = document.add_object(form_xobject);
            let stamp_name = format!("{}{}", STAMP_NAME_PREFIX, index);
            materialize_resources(&mut document, frame.id)?;
            // Because of the unique name this item will not be inserted more then once.
            document.add_xobject(frame.id, stamp_name.as_bytes(), form_id)?;

            let (_, operations) = page_operations
                .entry(placement.page)
                .or_insert_with(|| (frame, Vec::new()));
            operations.extend(place_form_xobject(&stamp_name, &frame, &layout.stamp));

            stamps.push(StampReport {
                page: placement.page,
                stamp: layout.stamp,
                bounding_box: layout.bounding_box(),
                label: layout.label.is_some(),
                text_lines: layout.lines.len(),
            });
        }

        for (frame, operations) in page_operations.into_values() {
            append_to_page_content(&mut document, frame.id, operations)?;
        }

        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|err| Error::Composition(format!("Can not write pdf: {}", err)))?;
        log::info!(
            "Composited {} stamp(s) for `{}`, {} bytes.",
            stamps.len(),
            attestation.signer_email,
            bytes.len()
        );

        Ok(CompositionResult { bytes, stamps })
    }

    fn frame_for(
        index: usize,
        placement: &ResolvedPlacement,
        pages: &[PageFrame],
    ) -> Result<PageFrame, Error> {
        let frame = pages.get(placement.page).ok_or_else(|| {
            Error::Composition(format!(
                "Placement {} is on page {}, document has {} page(s).",
                index,
                placement.page,
                pages.len()
            ))
        })?;
        let rect = placement.rect;
        let finite = [rect.x1, rect.y1, rect.x2, rect.y2]
            .iter()
            .all(|value| value.is_finite());
        if !finite || rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Err(Error::Composition(format!(
                "Placement {} has a malformed rectangle: {:?}",
                index, rect
            )));
        }
        Ok(*frame)
    }

    /// One Form XObject per stamp, in coordinates relative to the stamp's
    /// lower-left corner. It draws the image and the attestation text.
    fn stamp_form_xobject(
        &self,
        layout: &StampLayout,
        image_xobject_id: ObjectId,
        font_id: ObjectId,
    ) -> Result<Stream, Error> {
        use lopdf::Object::*;
        let origin = (layout.stamp.x1, layout.stamp.y1);
        let size = (layout.stamp.width(), layout.stamp.height());
        let bbox = layout.bounding_box();

        let form_xobject = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("XObject".as_bytes().to_vec())),
            ("Subtype", Name("Form".as_bytes().to_vec())),
            (
                "Resources",
                Dictionary(lopdf::Dictionary::from_iter(vec![
                    (
                        "XObject",
                        Dictionary(lopdf::Dictionary::from_iter(vec![(
                            IMAGE_NAME,
                            Reference(image_xobject_id),
                        )])),
                    ),
                    (
                        "Font",
                        Dictionary(lopdf::Dictionary::from_iter(vec![(FONT_NAME, Reference(font_id))])),
                    ),
                ])),
            ),
            (
                "BBox",
                Array(vec![
                    (bbox.x1 - origin.0 - 1.0).into(),
                    (bbox.y1 - origin.1 - 1.0).into(),
                    (bbox.x2 - origin.0 + 1.0).into(),
                    (bbox.y2 - origin.1 + 1.0).into(),
                ]),
            ),
        ]);

        let mut content = Content {
            operations: Vec::<Operation>::new(),
        };
        // The following lines use commands: see p643 (Table A.1) for more info
        // `q` = Save graphics state
        content.operations.push(Operation::new("q", vec![]));
        // `cm` = Concatenate matrix to current transformation matrix
        content.operations.push(Operation::new(
            "cm",
            vec![
                size.0.into(),
                0i32.into(),
                0i32.into(),
                size.1.into(),
                0i32.into(),
                0i32.into(),
            ],
        ));
        // `Do` = Invoke named XObject
        content.operations.push(Operation::new(
            "Do",
            vec![Name(IMAGE_NAME.as_bytes().to_vec())],
        ));
        // `Q` = Restore graphics state
        content.operations.push(Operation::new("Q", vec![]));

        if layout.label.is_some() || !layout.lines.is_empty() {
            content.operations.push(Operation::new("q", vec![]));
            // `g` = Set gray level for filling
            content
                .operations
                .push(Operation::new("g", vec![self.style.text_gray.into()]));
            for line in layout.label.iter().chain(layout.lines.iter()) {
                content.operations.extend(text_operations(line, origin));
            }
            content.operations.push(Operation::new("Q", vec![]));
        }

        let content_data = content.encode()?;
        Ok(lopdf::Stream::new(form_xobject, content_data))
    }
}

fn text_operations(line: &TextLine, origin: (f64, f64)) -> Vec<Operation> {
    use lopdf::Object::*;
    vec![
        // `BT` = Begin text object
        Operation::new("BT", vec![]),
        // `Tf` = Set text font and size
        Operation::new(
            "Tf",
            vec![Name(FONT_NAME.as_bytes().to_vec()), line.size.into()],
        ),
        // `Td` = Move to the start of the next line
        Operation::new(
            "Td",
            vec![(line.x - origin.0).into(), (line.baseline - origin.1).into()],
        ),
        // `Tj` = Show text
        Operation::new(
            "Tj",
            vec![String(line.encoded.clone(), StringFormat::Literal)],
        ),
        // `ET` = End text object
        Operation::new("ET", vec![]),
    ]
}

/// Operations drawing a stamp Form XObject at its place on the page.
fn place_form_xobject(name: &str, frame: &PageFrame, stamp: &Rectangle) -> Vec<Operation> {
    use lopdf::Object::*;
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                1i32.into(),
                0i32.into(),
                0i32.into(),
                1i32.into(),
                (frame.origin.0 + stamp.x1).into(),
                (frame.origin.1 + stamp.y1).into(),
            ],
        ),
        Operation::new("Do", vec![Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Wrap the existing page content in `q`/`Q` and append `operations` after
/// it, so state left behind by the original content does not move the stamps.
fn append_to_page_content(
    document: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), Error> {
    let stamp_content = Content { operations }.encode()?;
    let mut suffix = b"Q\n".to_vec();
    suffix.extend_from_slice(&stamp_content);

    let existing: Vec<Object> = {
        let page = document.get_object(page_id)?.as_dict()?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match document.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            Ok(_) => {
                return Err(Error::Composition(
                    "Page `Contents` is neither a stream nor an array.".to_owned(),
                ))
            }
            Err(_) => Vec::new(),
        }
    };

    let prefix_id = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let suffix_id = document.add_object(Stream::new(Dictionary::new(), suffix));
    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));

    document
        .get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}

/// `Resources` is inheritable. Copy the inherited dictionary onto the page
/// before adding to it, or the page would lose the inherited entries.
fn materialize_resources(document: &mut Document, page_id: ObjectId) -> Result<(), Error> {
    let inherited = {
        let page = document.get_object(page_id)?.as_dict()?;
        if page.has(b"Resources") {
            return Ok(());
        }
        let mut found = None;
        let mut parent = page.get(b"Parent").ok().and_then(|p| p.get_object_id());
        let mut depth = 0;
        while let Some(parent_id) = parent.filter(|_| depth < 64) {
            depth += 1;
            let node = document.get_object(parent_id)?.as_dict()?;
            if let Ok(resources) = node.get(b"Resources") {
                found = Some(resources.deref(document)?.clone());
                break;
            }
            parent = node.get(b"Parent").ok().and_then(|p| p.get_object_id());
        }
        found
    };
    if let Some(resources) = inherited {
        document
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", resources);
    }
    Ok(())
}

fn helvetica_font() -> Dictionary {
    use lopdf::Object::*;
    lopdf::Dictionary::from_iter(vec![
        ("Type", Name("Font".as_bytes().to_vec())),
        ("Subtype", Name("Type1".as_bytes().to_vec())),
        ("BaseFont", Name("Helvetica".as_bytes().to_vec())),
        ("Encoding", Name("WinAnsiEncoding".as_bytes().to_vec())),
    ])
}
