//! Page geometry: one shot per page, image region at the shot's aspect ratio.

use serde::{Deserialize, Serialize};
use storyboard::AspectRatio;

/// Rectangle in millimetres from the top-left corner of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
    /// Space reserved under the image for the shot number and summary.
    pub caption_height_mm: f64,
}

impl PageSpec {
    pub const A4_LANDSCAPE: PageSpec = PageSpec {
        width_mm: 297.0,
        height_mm: 210.0,
        margin_mm: 10.0,
        caption_height_mm: 40.0,
    };
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::A4_LANDSCAPE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub image: Rect,
    pub caption: Rect,
}

/// Fits the image region into the area above the caption, centred
/// horizontally, without distorting `aspect`.
pub fn layout_page(spec: &PageSpec, aspect: AspectRatio) -> PageLayout {
    let avail_w = (spec.width_mm - 2.0 * spec.margin_mm).max(0.0);
    let avail_h = (spec.height_mm - 2.0 * spec.margin_mm - spec.caption_height_mm).max(0.0);
    let ratio = aspect.ratio();

    let (width, height) = if avail_h * ratio <= avail_w {
        (avail_h * ratio, avail_h)
    } else {
        (avail_w, avail_w / ratio)
    };

    let image = Rect {
        x: spec.margin_mm + (avail_w - width) / 2.0,
        y: spec.margin_mm,
        width,
        height,
    };
    let caption = Rect {
        x: spec.margin_mm,
        y: spec.margin_mm + height,
        width: avail_w,
        height: spec.height_mm - spec.margin_mm - (spec.margin_mm + height),
    };
    PageLayout { image, caption }
}
