//! Scale pyramid construction.

use image::{imageops, GrayImage};

/// Levels smaller than this on either side are dropped; they cannot hold a
/// full descriptor patch.
const MIN_LEVEL_DIM: u32 = 48;

pub(crate) struct PyramidLevel {
    pub image: GrayImage,
    /// Downscale factor relative to the original image (level 0 = 1.0)
    pub scale: f32,
}

/// Build a scale pyramid by resampling the original image at each level.
///
/// Stops early once a level would be too small to describe keypoints in.
pub(crate) fn build_pyramid(image: &GrayImage, levels: u8, factor: f32) -> Vec<PyramidLevel> {
    let mut pyramid = Vec::with_capacity(levels as usize);
    pyramid.push(PyramidLevel {
        image: image.clone(),
        scale: 1.0,
    });

    let mut scale = 1.0f32;
    for _ in 1..levels {
        scale *= factor;
        let width = (image.width() as f32 / scale) as u32;
        let height = (image.height() as f32 / scale) as u32;
        if width < MIN_LEVEL_DIM || height < MIN_LEVEL_DIM {
            break;
        }
        let resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
        pyramid.push(PyramidLevel {
            image: resized,
            scale,
        });
    }

    pyramid
}
