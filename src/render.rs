//! PNG rendering of regions.
//!
//! Two images per region:
//! - `<id>.png`: the region alone, framed by its own envelope
//! - `<id>_result.png`: every region in the base color with this one highlighted,
//!   framed by the envelope of the whole store, padded by a margin
//!
//! Polygons are scan-converted at pixel centers with the even-odd rule, so
//! holes stay transparent. Row 0 is the northern edge.

use std::path::{Path, PathBuf};

use geo::{MultiPolygon, Polygon, Rect};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, GeometryError, Result};
use crate::region::{Region, RegionStore};

/// Mapping between source coordinates and an image grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterFrame {
    pub cols: u32,
    pub rows: u32,
    min_x: f64,
    max_y: f64,
    pixel_width: f64,
    pixel_height: f64,
}

impl RasterFrame {
    /// Fit `envelope` so its longer side spans `max_size` pixels; the shorter
    /// side gets `ceil(max_size * short / long)` pixels.
    pub fn fit(envelope: Rect<f64>, max_size: u32) -> Self {
        let max_size = max_size.max(1);
        let width = envelope.width();
        let height = envelope.height();

        let scaled = |short: f64, long: f64| -> u32 {
            if long <= 0.0 {
                max_size
            } else {
                ((max_size as f64 * short / long).ceil() as u32).clamp(1, max_size)
            }
        };
        let (cols, rows) = if width > height {
            (max_size, scaled(height, width))
        } else {
            (scaled(width, height), max_size)
        };

        let pixel_size = |extent: f64, count: u32| {
            if extent > 0.0 {
                extent / count as f64
            } else {
                1.0
            }
        };

        Self {
            cols,
            rows,
            min_x: envelope.min().x,
            max_y: envelope.max().y,
            pixel_width: pixel_size(width, cols),
            pixel_height: pixel_size(height, rows),
        }
    }

    fn row_center(&self, row: u32) -> f64 {
        self.max_y - (row as f64 + 0.5) * self.pixel_height
    }

    /// Columns whose centers fall in `[x0, x1)`.
    fn column_span(&self, x0: f64, x1: f64) -> (u32, u32) {
        let to_col = |x: f64| {
            ((x - self.min_x) / self.pixel_width - 0.5)
                .ceil()
                .clamp(0.0, self.cols as f64) as u32
        };
        (to_col(x0), to_col(x1))
    }

    pub fn blank(&self) -> RgbaImage {
        RgbaImage::new(self.cols, self.rows)
    }
}

/// Paint `polygon` into `image`.
pub fn rasterize_polygon(image: &mut RgbaImage, frame: &RasterFrame, polygon: &Polygon<f64>, color: Rgba<u8>) {
    let edges: Vec<_> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.lines())
        .collect();

    let rows = frame.rows.min(image.height());
    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..rows {
        let y = frame.row_center(row);
        crossings.clear();
        for line in &edges {
            let (a, b) = (line.start, line.end);
            if (a.y > y) != (b.y > y) {
                let t = (y - a.y) / (b.y - a.y);
                crossings.push(a.x + t * (b.x - a.x));
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let (start, end) = frame.column_span(span[0], span[1]);
            for col in start..end.min(image.width()) {
                image.put_pixel(col, row, color);
            }
        }
    }
}

/// Paint every polygon of `geometry` into `image`.
pub fn rasterize(image: &mut RgbaImage, frame: &RasterFrame, geometry: &MultiPolygon<f64>, color: Rgba<u8>) {
    for polygon in &geometry.0 {
        rasterize_polygon(image, frame, polygon, color);
    }
}

/// Default padding around the country frame, in source units.
pub const COUNTRY_MARGIN: f64 = 1.0;

/// Renders region and highlight images with fixed colors and size.
#[derive(Clone, Debug)]
pub struct Renderer {
    max_size: u32,
    margin: f64,
    base: Rgba<u8>,
    highlight: Rgba<u8>,
}

/// Background image of all regions, shared by every highlight image.
pub struct CountryImage {
    pub frame: RasterFrame,
    pub image: RgbaImage,
}

impl Renderer {
    pub fn new(max_size: u32, base: [u8; 4], highlight: [u8; 4]) -> Self {
        Self {
            max_size,
            margin: COUNTRY_MARGIN,
            base: Rgba(base),
            highlight: Rgba(highlight),
        }
    }

    /// Padding added on every side of the country frame.
    pub fn margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    fn envelope(region: &Region) -> std::result::Result<Rect<f64>, GeometryError> {
        region.validated_centroid()?;
        region
            .envelope()
            .ok_or_else(|| GeometryError::Missing(region.id.clone()))
    }

    /// The region alone, framed by its own envelope.
    pub fn region_image(&self, region: &Region) -> std::result::Result<RgbaImage, GeometryError> {
        let frame = RasterFrame::fit(Self::envelope(region)?, self.max_size);
        let mut image = frame.blank();
        rasterize(&mut image, &frame, &region.geometry, self.base);
        Ok(image)
    }

    /// All regions in the base color, framed by the padded store envelope.
    pub fn country_image(&self, store: &RegionStore) -> std::result::Result<CountryImage, GeometryError> {
        for region in store.iter() {
            Self::envelope(region)?;
        }
        let envelope = store
            .envelope()
            .ok_or_else(|| GeometryError::Missing("<all regions>".into()))?;
        let envelope = Rect::new(
            (envelope.min().x - self.margin, envelope.min().y - self.margin),
            (envelope.max().x + self.margin, envelope.max().y + self.margin),
        );
        let frame = RasterFrame::fit(envelope, self.max_size);
        let mut image = frame.blank();
        for region in store.iter() {
            rasterize(&mut image, &frame, &region.geometry, self.base);
        }
        Ok(CountryImage { frame, image })
    }

    /// The country image with `region` painted in the highlight color.
    pub fn highlighted_image(&self, country: &CountryImage, region: &Region) -> RgbaImage {
        let mut image = country.image.clone();
        rasterize(&mut image, &country.frame, &region.geometry, self.highlight);
        image
    }

    /// Write `<id>.png` and `<id>_result.png` for every region into `dir`.
    pub fn render_all(&self, store: &RegionStore, dir: &Path) -> Result<usize> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let country = self.country_image(store)?;
        info!(
            regions = store.len(),
            width = country.frame.cols,
            height = country.frame.rows,
            "rendering region images"
        );

        store.regions().par_iter().try_for_each(|region| -> Result<()> {
            let image = self.region_image(region)?;
            save_png(&image, dir.join(format!("{}.png", region.id)))?;

            let result = self.highlighted_image(&country, region);
            save_png(&result, dir.join(format!("{}_result.png", region.id)))?;
            debug!(id = %region.id, "rendered");
            Ok(())
        })?;

        let written = store.len() * 2;
        info!(images = written, dir = %dir.display(), "images written");
        Ok(written)
    }
}

fn save_png(image: &RgbaImage, path: PathBuf) -> Result<()> {
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .map_err(|source| Error::Image { path, source })
}
