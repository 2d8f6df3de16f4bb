use std::path::Path;

use image::{ImageResult, Rgba, RgbaImage};
use swimmer_common::Vec2;

use crate::grid::Bounds;

pub const BACKGROUND: [u8; 3] = [12, 12, 20];

/// A pixel buffer looking at a rectangle of the world.
///
/// World `y` grows downward on screen, matching [`Bounds`].
pub struct Camera {
    image: RgbaImage,
    /// World position of the top-left pixel corner.
    origin: Vec2,
    /// Pixels per world unit.
    zoom: f64,
}

impl Camera {
    pub fn new(width: u32, height: u32, origin: Vec2, zoom: f64) -> Self {
        let [r, g, b] = BACKGROUND;
        Camera {
            image: RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255])),
            origin,
            zoom,
        }
    }

    /// Largest zoom that shows all of `bounds`, centred.
    pub fn fit(bounds: Bounds, width: u32, height: u32) -> Self {
        let span_x = bounds.width().max(f64::EPSILON);
        let span_y = bounds.height().max(f64::EPSILON);
        let zoom = (width as f64 / span_x).min(height as f64 / span_y);
        let half_view = Vec2::new(width as f64, height as f64) * (0.5 / zoom);
        Camera::new(width, height, bounds.center() - half_view, zoom)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// The world rectangle covered by the image.
    pub fn world_bounds(&self) -> Bounds {
        Bounds {
            left: self.origin.x,
            top: self.origin.y,
            right: self.origin.x + self.image.width() as f64 / self.zoom,
            bottom: self.origin.y + self.image.height() as f64 / self.zoom,
        }
    }

    #[inline]
    pub fn to_pixel(&self, point: Vec2) -> Vec2 {
        (point - self.origin) * self.zoom
    }

    /// Alpha-blends `color` into one pixel; pixels outside the image are ignored.
    #[inline]
    fn blend(&mut self, x: i64, y: i64, color: [u8; 3], alpha: f64) {
        if alpha <= 0.0 || x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return;
        }
        let alpha = alpha.min(1.0);
        let pixel = self.image.get_pixel_mut(x as u32, y as u32);
        for channel in 0..3 {
            let old = pixel[channel] as f64;
            pixel[channel] = (old + (color[channel] as f64 - old) * alpha).round() as u8;
        }
    }

    /// Calls `shade(distance_px)` for every pixel centre within `reach_px` of
    /// `center_px` and blends the returned alpha.
    fn shade_around<F: Fn(f64) -> f64>(&mut self, center_px: Vec2, reach_px: f64, color: [u8; 3], shade: F) {
        let (width, height) = (self.image.width() as i64, self.image.height() as i64);
        let x0 = ((center_px.x - reach_px).floor() as i64).max(0);
        let x1 = ((center_px.x + reach_px).ceil() as i64).min(width - 1);
        let y0 = ((center_px.y - reach_px).floor() as i64).max(0);
        let y1 = ((center_px.y + reach_px).ceil() as i64).min(height - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let pixel_center = Vec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let alpha = shade(pixel_center.distance(center_px));
                self.blend(x, y, color, alpha);
            }
        }
    }

    /// Filled disk whose rim fades out over its outer quarter.
    pub fn draw_disk(&mut self, center: Vec2, radius: f64, color: [u8; 3]) {
        let radius_px = radius * self.zoom;
        let fade_px = (0.25 * radius_px).max(1.0);
        let center_px = self.to_pixel(center);
        self.shade_around(center_px, radius_px, color, |d| ((radius_px - d) / fade_px).clamp(0.0, 1.0));
    }

    pub fn draw_annulus(&mut self, center: Vec2, inner_radius: f64, outer_radius: f64, color: [u8; 3]) {
        let inner_px = inner_radius * self.zoom;
        let outer_px = outer_radius * self.zoom;
        let center_px = self.to_pixel(center);
        self.shade_around(center_px, outer_px + 1.0, color, |d| {
            (d - inner_px + 0.5).clamp(0.0, 1.0).min((outer_px - d + 0.5).clamp(0.0, 1.0))
        });
    }

    /// Fills the world rectangle `[left, right] x [top, bottom]`.
    pub fn fill_rect(&mut self, left: f64, top: f64, right: f64, bottom: f64, color: [u8; 3]) {
        let top_left = self.to_pixel(Vec2::new(left, top));
        let bottom_right = self.to_pixel(Vec2::new(right, bottom));
        let x0 = top_left.x.round().max(0.0) as i64;
        let y0 = top_left.y.round().max(0.0) as i64;
        let x1 = bottom_right.x.round().min(self.image.width() as f64) as i64;
        let y1 = bottom_right.y.round().min(self.image.height() as f64) as i64;
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color, 1.0);
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.image.save(path)
    }
}
