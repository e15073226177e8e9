//! Pixel inversion: `255 - v` on every channel of an RGB raster.
//!
//! Pure and involutive: inverting twice yields the input unchanged.

use super::render::RasterPage;
use image::RgbImage;

/// Invert a raster in place.
pub fn invert_image(image: &mut RgbImage) {
    image::imageops::invert(image);
}

/// Invert a rendered page in place, keeping its index and dimensions.
pub fn invert_page(mut page: RasterPage) -> RasterPage {
    invert_image(&mut page.image);
    page
}
