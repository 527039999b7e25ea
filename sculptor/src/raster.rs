use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use base::defs::{Error, ErrorKind::*, Result};

pub type Point2i = nalgebra::Point2<i32>;

/// RGB key identifying the overlay paint of a single facial feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourKey {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColourKey {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn matches(&self, rgba: [u8; 4]) -> bool {
        self.r == rgba[0] && self.g == rgba[1] && self.b == rgba[2]
    }

    pub fn rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

/// Read-only pixel buffer addressed bottom-up: `y == 0` is the lowest row.
pub struct RasterImage {
    width: i32,
    height: i32,
    pixels: Vec<[u8; 4]>,
}

impl RasterImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|e| {
            let desc = format!("failed to decode image '{}'", path.display());
            Error::with_source(ImageError, desc, e)
        })?;
        Ok(Self::from_rgba(&image.to_rgba8()))
    }

    /// Builds the buffer from a top-down image, flipping it vertically.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (width, height) = (image.width() as i32, image.height() as i32);
        Self::from_fn(width, height, |x, y| {
            image.get_pixel(x as u32, (height - 1 - y) as u32).0
        })
    }

    pub fn from_fn<F: Fn(i32, i32) -> [u8; 4]>(
        width: i32,
        height: i32,
        func: F,
    ) -> Self {
        let mut pixels = Vec::with_capacity((width * height).max(0) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(func(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if self.contains(x, y) {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    pub fn has_colour(&self, x: i32, y: i32, colour: ColourKey) -> bool {
        self.get_pixel(x, y).map_or(false, |p| colour.matches(p))
    }

    /// Converts a pixel into coordinates relative to the image centre.
    pub fn centred(&self, x: i32, y: i32) -> Point2i {
        Point2i::new(x - self.width / 2, y - self.height / 2)
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;

    pub const WHITE: [u8; 4] = [255, 255, 255, 255];

    /// Paints every listed pixel with `colour` over a white background.
    pub fn paint(
        width: i32,
        height: i32,
        colour: ColourKey,
        pixels: &[(i32, i32)],
    ) -> RasterImage {
        RasterImage::from_fn(width, height, |x, y| {
            if pixels.contains(&(x, y)) {
                colour.rgba()
            } else {
                WHITE
            }
        })
    }

    pub fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
        let mut pixels = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                pixels.push((x, y));
            }
        }
        pixels
    }

    pub fn hollow_rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<(i32, i32)> {
        rect(x0, y0, x1, y1)
            .into_iter()
            .filter(|&(x, y)| x == x0 || x == x1 || y == y0 || y == y1)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_bounds_checked_lookup() {
        let image = RasterImage::from_fn(3, 2, |x, y| [x as u8, y as u8, 0, 255]);
        assert_eq!(image.get_pixel(2, 1), Some([2, 1, 0, 255]));
        assert_eq!(image.get_pixel(3, 0), None);
        assert_eq!(image.get_pixel(0, 2), None);
        assert_eq!(image.get_pixel(-1, 0), None);
    }

    #[test]
    fn test_from_rgba_flips_rows() {
        let mut rgba = RgbaImage::from_pixel(2, 3, Rgba([0, 0, 0, 255]));
        rgba.put_pixel(1, 0, Rgba([255, 0, 0, 255]));

        let image = RasterImage::from_rgba(&rgba);
        assert!(image.has_colour(1, 2, ColourKey::new(255, 0, 0)));
        assert!(!image.has_colour(1, 0, ColourKey::new(255, 0, 0)));
    }

    #[test]
    fn test_centred() {
        let image = RasterImage::from_fn(12, 9, |_, _| [0; 4]);
        assert_eq!(image.centred(3, 4), Point2i::new(-3, 0));
    }
}
