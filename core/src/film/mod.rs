//! Film

use crate::error::*;
use crate::geometry::*;
use crate::image_io::*;
use crate::lm::*;
use crate::spectrum::*;
use crate::{stat_inc, stat_memory_counter, stat_register_fns};

mod film_tile;

// Re-export.
pub use film_tile::*;

stat_memory_counter!("Memory/Film pixels", FILM_PIXEL_MEMORY, film_stats_pixels);
stat_register_fns!(film_stats_pixels);

/// Receives contributions from renderers. Implemented by `Film` and by
/// `FilmTile`, which sums contributions per pixel for an ordered merge.
pub trait FilmSink {
    /// Add a contribution at a raster position in [0, 1]^2.
    ///
    /// * `raster` - Raster position.
    /// * `c`      - Contribution.
    fn accumulate_contribution(&mut self, raster: &Vector2f, c: &Spectrum);

    /// Add a contribution to an auxiliary layer. Sinks without layers ignore
    /// it.
    ///
    /// * `layer`  - Layer index.
    /// * `raster` - Raster position.
    /// * `c`      - Contribution.
    fn accumulate_layer(&mut self, _layer: usize, _raster: &Vector2f, _c: &Spectrum) {}
}

/// Rectangular grid of linear RGB accumulators. Raster position (0, 0) is
/// the bottom left corner of the image. Optional auxiliary layers of the same
/// size hold debugging images such as per-strategy contributions.
#[derive(Clone, Debug)]
pub struct Film {
    /// Width in pixels.
    width: usize,

    /// Height in pixels.
    height: usize,

    /// Pixels, row by row starting at the bottom.
    pixels: Vec<Spectrum>,

    /// Auxiliary layers.
    layers: Vec<Vec<Spectrum>>,
}

impl Film {
    /// Create a black film.
    ///
    /// * `width`  - Width in pixels.
    /// * `height` - Height in pixels.
    pub fn new(width: usize, height: usize) -> Self {
        register_stats();

        let n = width * height;
        stat_inc!(FILM_PIXEL_MEMORY, (n * std::mem::size_of::<Spectrum>()) as u64);
        Self {
            width,
            height,
            pixels: vec![Spectrum::ZERO; n],
            layers: vec![],
        }
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the aspect ratio.
    pub fn aspect(&self) -> Float {
        self.width as Float / self.height as Float
    }

    /// Allocate black auxiliary layers, replacing any existing ones.
    ///
    /// * `n` - Number of layers.
    pub fn allocate_layers(&mut self, n: usize) {
        let size = self.pixels.len();
        self.layers = vec![vec![Spectrum::ZERO; size]; n];
    }

    /// Returns the number of auxiliary layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns the pixel index of a raster position, or `None` if it lies
    /// outside [0, 1]^2.
    ///
    /// * `raster` - Raster position.
    pub fn pixel_index(&self, raster: &Vector2f) -> Option<usize> {
        if !(0.0..=1.0).contains(&raster.x) || !(0.0..=1.0).contains(&raster.y) {
            warn!("Ignoring contribution at raster position ({}, {})", raster.x, raster.y);
            return None;
        }
        let x = min((raster.x * self.width as Float) as usize, self.width - 1);
        let y = min((raster.y * self.height as Float) as usize, self.height - 1);
        Some(y * self.width + x)
    }

    /// Returns the raster position of the center of a pixel.
    ///
    /// * `x` - Column.
    /// * `y` - Row, counted from the bottom.
    pub fn pixel_center(&self, x: usize, y: usize) -> Vector2f {
        Vector2f::new(
            (x as Float + 0.5) / self.width as Float,
            (y as Float + 0.5) / self.height as Float,
        )
    }

    /// Returns a pixel.
    ///
    /// * `x` - Column.
    /// * `y` - Row, counted from the bottom.
    pub fn pixel(&self, x: usize, y: usize) -> Spectrum {
        self.pixels[y * self.width + x]
    }

    /// Returns all pixels row by row starting at the bottom.
    pub fn pixels(&self) -> &[Spectrum] {
        &self.pixels
    }

    /// Returns the pixels of an auxiliary layer.
    ///
    /// * `layer` - Layer index.
    pub fn layer(&self, layer: usize) -> &[Spectrum] {
        &self.layers[layer]
    }

    /// Overwrite the pixel at a raster position.
    ///
    /// * `raster` - Raster position.
    /// * `c`      - Value.
    pub fn record_contribution(&mut self, raster: &Vector2f, c: &Spectrum) {
        if let Some(i) = self.pixel_index(raster) {
            self.pixels[i] = *c;
        }
    }

    /// Add to a pixel by index.
    ///
    /// * `i` - Pixel index.
    /// * `c` - Contribution.
    pub fn accumulate_pixel(&mut self, i: usize, c: &Spectrum) {
        self.pixels[i] += *c;
    }

    /// Add to a pixel of an auxiliary layer by index. Missing layers are
    /// ignored.
    ///
    /// * `layer` - Layer index.
    /// * `i`     - Pixel index.
    /// * `c`     - Contribution.
    pub fn accumulate_layer_pixel(&mut self, layer: usize, i: usize, c: &Spectrum) {
        if let Some(l) = self.layers.get_mut(layer) {
            l[i] += *c;
        }
    }

    /// Add another film of the same size.
    ///
    /// * `other` - The other film.
    pub fn merge(&mut self, other: &Film) -> Result<()> {
        if other.width != self.width || other.height != self.height {
            return Err(Error::Fatal(format!(
                "cannot merge a {}x{} film into a {}x{} film",
                other.width, other.height, self.width, self.height
            )));
        }
        for (p, q) in self.pixels.iter_mut().zip(other.pixels.iter()) {
            *p += *q;
        }
        for (l, m) in self.layers.iter_mut().zip(other.layers.iter()) {
            for (p, q) in l.iter_mut().zip(m.iter()) {
                *p += *q;
            }
        }
        Ok(())
    }

    /// Multiply every pixel, layers included, by a weight.
    ///
    /// * `w` - The weight.
    pub fn rescale(&mut self, w: Float) {
        self.pixels.iter_mut().for_each(|p| *p *= w);
        self.layers
            .iter_mut()
            .for_each(|l| l.iter_mut().for_each(|p| *p *= w));
    }

    /// Reset all pixels to black.
    pub fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = Spectrum::ZERO);
        self.layers
            .iter_mut()
            .for_each(|l| l.iter_mut().for_each(|p| *p = Spectrum::ZERO));
    }

    /// Convert pixels to an image with the top row first.
    ///
    /// * `pixels` - Pixels row by row starting at the bottom.
    /// * `weight` - Scale applied to every pixel.
    fn to_image(&self, pixels: &[Spectrum], weight: Float) -> Result<RGBImage> {
        let flipped = pixels
            .chunks(self.width)
            .rev()
            .flat_map(|row| row.iter().map(|p| *p * weight))
            .collect();
        RGBImage::new(flipped, self.width, self.height)
    }

    /// Scale the pixels and write them to a file. The format follows the
    /// extension (exr, pfm, png, tga).
    ///
    /// * `path`   - Output file path.
    /// * `weight` - Scale applied to every pixel.
    pub fn rescale_and_save(&self, path: &str, weight: Float) -> Result<()> {
        write_image(path, &self.to_image(&self.pixels, weight)?)
    }

    /// Scale an auxiliary layer and write it to a file.
    ///
    /// * `layer`  - Layer index.
    /// * `path`   - Output file path.
    /// * `weight` - Scale applied to every pixel.
    pub fn rescale_and_save_layer(&self, layer: usize, path: &str, weight: Float) -> Result<()> {
        write_image(path, &self.to_image(&self.layers[layer], weight)?)
    }

    /// Write the pixels to a file. The format follows the extension.
    ///
    /// * `path` - Output file path.
    pub fn save(&self, path: &str) -> Result<()> {
        self.rescale_and_save(path, 1.0)
    }
}

impl FilmSink for Film {
    fn accumulate_contribution(&mut self, raster: &Vector2f, c: &Spectrum) {
        if let Some(i) = self.pixel_index(raster) {
            self.pixels[i] += *c;
        }
    }

    fn accumulate_layer(&mut self, layer: usize, raster: &Vector2f, c: &Spectrum) {
        if let Some(i) = self.pixel_index(raster) {
            self.accumulate_layer_pixel(layer, i, c);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
