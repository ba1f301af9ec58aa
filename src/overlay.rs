//! Overlay contract and preview geometry
//!
//! Drawing happens elsewhere; the controller only tells the overlay what the
//! image source looks like and which objects to show.

use crate::camera::{CameraFacing, Orientation, Resolution};
use crate::detection::DetectedObject;

/// Size and mirroring of the images the overlay draws on top of
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSourceInfo {
    pub width: u32,
    pub height: u32,
    pub flipped: bool,
}

/// Map the camera preview size onto display axes
///
/// In portrait the frames are rotated by 90 degrees, so width and height swap.
/// Front camera frames are mirrored.
pub fn image_source_info(
    preview: Resolution,
    orientation: Orientation,
    facing: CameraFacing,
) -> ImageSourceInfo {
    let size = if orientation.is_portrait() {
        preview.swapped()
    } else {
        preview
    };

    ImageSourceInfo {
        width: size.width,
        height: size.height,
        flipped: facing.is_front(),
    }
}

pub trait Overlay: Send {
    /// Drop everything drawn for the previous frame
    fn clear(&mut self);

    fn set_image_source(&mut self, info: ImageSourceInfo);

    fn render(&mut self, objects: &[DetectedObject]);
}

/// Overlay for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOverlay;

impl Overlay for NoopOverlay {
    fn clear(&mut self) {}

    fn set_image_source(&mut self, _info: ImageSourceInfo) {}

    fn render(&mut self, _objects: &[DetectedObject]) {}
}
