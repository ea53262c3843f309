mod common;

use common::{attestation, drawn_xobjects, init_logging, page_id, pdf};
use pdf_countersign::lopdf::{Document as PdfDocument, Object};
use pdf_countersign::{
    page_sizes, CoordinateOrigin, Error, GeometryResolver, OverlayCompositor, PageSize,
    PlacementRegion, Rectangle, ResolvedPlacement,
};
use pretty_assertions::assert_eq;

fn placements(
    regions: &[PlacementRegion],
    original: &[u8],
    origin: CoordinateOrigin,
) -> Vec<ResolvedPlacement> {
    let sizes = page_sizes(original).unwrap();
    GeometryResolver::default()
        .resolve(regions, &sizes, origin)
        .unwrap()
}

#[test]
fn stamps_a_top_left_region() {
    init_logging();
    let original = pdf(&[PageSize::new(600.0, 800.0)], false);
    let placements = placements(
        &[PlacementRegion::signature(0, 100.0, 200.0, 200.0, 50.0)],
        &original,
        CoordinateOrigin::TopLeft,
    );

    let result = OverlayCompositor::default()
        .compose(&original, &attestation(), &placements)
        .unwrap();

    assert_eq!(result.stamps.len(), 1);
    let stamp = &result.stamps[0];
    assert_eq!(stamp.page, 0);
    assert_eq!(stamp.stamp, Rectangle::from_origin_size(100.0, 550.0, 200.0, 50.0));
    assert!(stamp.label);
    assert_eq!(stamp.text_lines, 3);
    assert!(PageSize::new(600.0, 800.0)
        .bounds()
        .contains(&stamp.bounding_box));

    let reloaded = PdfDocument::load_mem(&result.bytes).unwrap();
    assert_eq!(reloaded.get_pages().len(), 1);
    assert_eq!(drawn_xobjects(&result.bytes, 0), vec!["CsStamp0".to_owned()]);
    assert!(result.to_data_url().starts_with("data:application/pdf;base64,"));
}

#[test]
fn original_content_is_kept() {
    let original = pdf(&[PageSize::A4], false);
    let placements = placements(&[], &original, CoordinateOrigin::BottomLeft);
    let result = OverlayCompositor::default()
        .compose(&original, &attestation(), &placements)
        .unwrap();

    let reloaded = PdfDocument::load_mem(&result.bytes).unwrap();
    let content = reloaded
        .get_and_decode_page_content(page_id(&reloaded, 0))
        .unwrap();
    let operators: Vec<&str> = content
        .operations
        .iter()
        .map(|op| op.operator.as_str())
        .collect();
    assert_eq!(operators.first(), Some(&"q"));
    assert!(operators.contains(&"Tj"));
    assert_eq!(&operators[operators.len() - 4..], &["q", "cm", "Do", "Q"]);
}

#[test]
fn same_input_same_layout() {
    let original = pdf(&[PageSize::LETTER], false);
    let kept = original.clone();
    let placements = placements(
        &[PlacementRegion::signature(0, 72.0, 600.0, 180.0, 40.0)],
        &original,
        CoordinateOrigin::TopLeft,
    );
    let compositor = OverlayCompositor::default();

    let first = compositor.compose(&original, &attestation(), &placements).unwrap();
    let second = compositor.compose(&original, &attestation(), &placements).unwrap();
    assert_eq!(first.layout_digest(), second.layout_digest());
    assert_eq!(first.stamps, second.stamps);
    assert_eq!(original, kept);

    let moved = placements
        .iter()
        .map(|placement| ResolvedPlacement {
            rect: Rectangle::from_origin_size(200.0, 300.0, 180.0, 40.0),
            ..*placement
        })
        .collect::<Vec<_>>();
    let third = compositor.compose(&original, &attestation(), &moved).unwrap();
    assert_ne!(first.layout_digest(), third.layout_digest());
}

#[test]
fn cramped_stamps_drop_detail_lines() {
    let original = pdf(&[PageSize::new(600.0, 800.0)], false);
    let placements = vec![
        ResolvedPlacement {
            page: 0,
            rect: Rectangle::from_origin_size(100.0, 550.0, 200.0, 50.0),
            kind: Default::default(),
        },
        ResolvedPlacement {
            page: 0,
            rect: Rectangle::from_origin_size(300.0, 16.0, 100.0, 50.0),
            kind: Default::default(),
        },
    ];

    let result = OverlayCompositor::default()
        .compose(&original, &attestation(), &placements)
        .unwrap();

    let lines: Vec<usize> = result.stamps.iter().map(|stamp| stamp.text_lines).collect();
    assert_eq!(lines, vec![3, 1]);
    for stamp in &result.stamps {
        assert!(PageSize::new(600.0, 800.0)
            .bounds()
            .contains(&stamp.bounding_box));
    }
}

#[test]
fn stamps_every_placement_on_its_own_page() {
    let original = pdf(&[PageSize::A4; 3], false);
    let placements = placements(
        &[
            PlacementRegion::signature(0, 50.0, 700.0, 150.0, 40.0),
            PlacementRegion::signature(2, 300.0, 100.0, 150.0, 40.0),
        ],
        &original,
        CoordinateOrigin::BottomLeft,
    );
    let result = OverlayCompositor::default()
        .compose(&original, &attestation(), &placements)
        .unwrap();

    let pages: Vec<usize> = result.stamps.iter().map(|stamp| stamp.page).collect();
    assert_eq!(pages, vec![0, 2]);
    assert_eq!(drawn_xobjects(&result.bytes, 0), vec!["CsStamp0".to_owned()]);
    assert!(drawn_xobjects(&result.bytes, 1).is_empty());
    assert_eq!(drawn_xobjects(&result.bytes, 2), vec!["CsStamp1".to_owned()]);
    assert_eq!(
        PdfDocument::load_mem(&result.bytes).unwrap().get_pages().len(),
        3
    );
}

#[test]
fn inherited_resources_survive() {
    let original = pdf(&[PageSize::LETTER, PageSize::LETTER], true);
    assert_eq!(page_sizes(&original).unwrap(), vec![PageSize::LETTER; 2]);
    let placements = placements(&[], &original, CoordinateOrigin::TopLeft);
    assert_eq!(
        placements[0].rect,
        Rectangle::from_origin_size(482.0, 105.0, 100.0, 50.0)
    );

    let result = OverlayCompositor::default()
        .compose(&original, &attestation(), &placements)
        .unwrap();
    let reloaded = PdfDocument::load_mem(&result.bytes).unwrap();
    let page = reloaded
        .get_object(page_id(&reloaded, 0))
        .unwrap()
        .as_dict()
        .unwrap();
    let resources = match page.get(b"Resources").unwrap() {
        Object::Reference(id) => reloaded.get_object(*id).unwrap().as_dict().unwrap(),
        other => other.as_dict().unwrap(),
    };
    assert!(resources.get(b"Font").is_ok());
    let xobjects = match resources.get(b"XObject").unwrap() {
        Object::Reference(id) => reloaded.get_object(*id).unwrap().as_dict().unwrap(),
        other => other.as_dict().unwrap(),
    };
    assert!(xobjects.has(b"CsStamp0"));
}

#[test]
fn unreadable_source_is_a_decode_error() {
    let placements = vec![ResolvedPlacement {
        page: 0,
        rect: Rectangle::from_origin_size(10.0, 10.0, 50.0, 20.0),
        kind: Default::default(),
    }];
    let err = OverlayCompositor::default()
        .compose(b"%PDF-1.5 nothing here", &attestation(), &placements)
        .unwrap_err();
    assert!(matches!(err, Error::SourceDecode(_)), "{:?}", err);
}

#[test]
fn unreadable_signature_is_an_image_error() {
    let original = pdf(&[PageSize::A4], false);
    let placements = placements(&[], &original, CoordinateOrigin::TopLeft);
    let mut attestation = attestation();
    attestation.raster_image = b"not a png".to_vec();
    let err = OverlayCompositor::default()
        .compose(&original, &attestation, &placements)
        .unwrap_err();
    assert!(matches!(err, Error::ImageDecode(_)), "{:?}", err);
}

#[test]
fn placement_outside_the_document_fails() {
    let original = pdf(&[PageSize::A4], false);
    let placements = vec![ResolvedPlacement {
        page: 4,
        rect: Rectangle::from_origin_size(10.0, 10.0, 50.0, 20.0),
        kind: Default::default(),
    }];
    let err = OverlayCompositor::default()
        .compose(&original, &attestation(), &placements)
        .unwrap_err();
    assert!(matches!(err, Error::Composition(_)), "{:?}", err);

    let err = OverlayCompositor::default()
        .compose(&original, &attestation(), &[])
        .unwrap_err();
    assert!(matches!(err, Error::Composition(_)), "{:?}", err);
}
