//! Turns declared placement regions into page-local draw rectangles in pdf
//! user space (origin bottom-left, y going up).

use crate::config::LayoutPolicy;
use crate::document::{PlacementRegion, RegionKind};
use crate::rectangle::{PageSize, Rectangle};
use crate::{Error, ValidationError};
use serde::{Deserialize, Serialize};

/// Convention a region was authored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinateOrigin {
    /// Viewers and detectors: origin top-left, y going down.
    TopLeft,
    /// Native pdf user space.
    BottomLeft,
}

/// A region ready to be drawn: page index plus a rectangle in pdf user space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedPlacement {
    pub page: usize,
    pub rect: Rectangle,
    pub kind: RegionKind,
}

#[derive(Debug, Clone, Default)]
pub struct GeometryResolver {
    policy: LayoutPolicy,
}

impl GeometryResolver {
    pub fn new(policy: LayoutPolicy) -> Self {
        GeometryResolver { policy }
    }

    pub fn policy(&self) -> &LayoutPolicy {
        &self.policy
    }

    /// Resolve all regions. Without regions one fallback placement on the
    /// first page is returned.
    pub fn resolve(
        &self,
        regions: &[PlacementRegion],
        page_sizes: &[PageSize],
        origin: CoordinateOrigin,
    ) -> Result<Vec<ResolvedPlacement>, Error> {
        let first_page = page_sizes
            .first()
            .ok_or_else(|| ValidationError::field("pageSizes", "Document has no pages."))?;

        if regions.is_empty() {
            log::debug!("No placement regions declared, using fallback placement.");
            return Ok(vec![self.fallback(*first_page)]);
        }

        regions
            .iter()
            .enumerate()
            .map(|(index, region)| self.resolve_one(index, region, page_sizes, origin))
            .collect()
    }

    fn resolve_one(
        &self,
        index: usize,
        region: &PlacementRegion,
        page_sizes: &[PageSize],
        origin: CoordinateOrigin,
    ) -> Result<ResolvedPlacement, Error> {
        let page = page_sizes.get(region.page).ok_or_else(|| {
            ValidationError::field(
                "page",
                format!(
                    "Region {} refers to page {} but the document has {} page(s).",
                    index,
                    region.page,
                    page_sizes.len()
                ),
            )
        })?;
        if !(region.width > 0.0 && region.height > 0.0)
            || !region.width.is_finite()
            || !region.height.is_finite()
        {
            return Err(ValidationError::field(
                "size",
                format!("Region {} must have a positive width and height.", index),
            )
            .into());
        }
        if !region.x.is_finite() || !region.y.is_finite() {
            return Err(ValidationError::field(
                "position",
                format!("Region {} has a non-finite position.", index),
            )
            .into());
        }

        let y = match origin {
            CoordinateOrigin::TopLeft => page.height - region.y - region.height,
            CoordinateOrigin::BottomLeft => region.y,
        };
        let rect = self.clamp(region.x, y, region.width, region.height, *page);
        if rect != Rectangle::from_origin_size(region.x, y, region.width, region.height) {
            log::debug!(
                "Region {} on page {} clamped to ({:.1}, {:.1}, {:.1}, {:.1}).",
                index,
                region.page,
                rect.x1,
                rect.y1,
                rect.width(),
                rect.height()
            );
        }
        Ok(ResolvedPlacement {
            page: region.page,
            rect,
            kind: region.kind,
        })
    }

    /// Bottom-right box on the first page, raised so the attestation lines
    /// fit underneath it.
    pub fn fallback(&self, page: PageSize) -> ResolvedPlacement {
        let policy = &self.policy;
        let total_width = policy.fallback_width + policy.margin;
        let total_height = policy.fallback_height + policy.details_height + policy.margin;
        let x = policy.margin.max(page.width - total_width);
        let y = policy.margin.max(total_height);
        ResolvedPlacement {
            page: 0,
            rect: self.clamp(x, y, policy.fallback_width, policy.fallback_height, page),
            kind: RegionKind::Signature,
        }
    }

    /// Keep the rectangle inside the page, `margin` away from every edge.
    /// Never fails: oversized rectangles are shrunk.
    pub fn clamp(&self, x: f64, y: f64, width: f64, height: f64, page: PageSize) -> Rectangle {
        let (x, width) = clamp_axis(x, width, page.width, self.policy.margin);
        let (y, height) = clamp_axis(y, height, page.height, self.policy.margin);
        Rectangle::from_origin_size(x, y, width, height)
    }
}

// The margin gives way on pages too small for it, so there is always room left.
fn clamp_axis(position: f64, length: f64, extent: f64, margin: f64) -> (f64, f64) {
    let margin = margin.min(extent / 4.0);
    let length = length.min(extent - 2.0 * margin);
    let position = position.max(margin).min(extent - margin - length);
    (position, length)
}

/// Size of the surface a page is shown on, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerSurface {
    pub width: f64,
    pub height: f64,
}

/// Point on a viewer surface (top-left origin) to pdf user space.
pub fn viewer_to_pdf(x: f64, y: f64, surface: ViewerSurface, page: PageSize) -> (f64, f64) {
    let x_ratio = x / surface.width;
    let y_ratio = y / surface.height;
    (x_ratio * page.width, page.height - y_ratio * page.height)
}

/// Point in pdf user space to a viewer surface (top-left origin).
pub fn pdf_to_viewer(x: f64, y: f64, surface: ViewerSurface, page: PageSize) -> (f64, f64) {
    let x_ratio = x / page.width;
    let y_ratio = 1.0 - y / page.height;
    (x_ratio * surface.width, y_ratio * surface.height)
}

/// A rectangle selected on a viewer surface as a region in page units, still
/// in the top-left convention.
pub fn region_from_viewer(
    page_index: usize,
    (x, y, width, height): (f64, f64, f64, f64),
    surface: ViewerSurface,
    page: PageSize,
) -> PlacementRegion {
    let scale_x = page.width / surface.width;
    let scale_y = page.height / surface.height;
    PlacementRegion::signature(
        page_index,
        x * scale_x,
        y * scale_y,
        width * scale_x,
        height * scale_y,
    )
}
