//! Film Tile

use super::*;
use std::collections::HashMap;

/// Key of a tile entry: auxiliary layer (`None` for the image) and pixel
/// index.
type TileKey = (Option<u32>, u32);

/// Contributions of one block of work, summed per pixel. Contributions may
/// land anywhere on the film (light tracing splats), so a tile only stores
/// the pixels it touched. A block is rendered by one thread in a fixed order
/// and blocks are merged in block order, which reproduces the same film
/// regardless of how blocks were spread over threads.
#[derive(Clone, Debug)]
pub struct FilmTile {
    /// Width of the target film.
    width: usize,

    /// Height of the target film.
    height: usize,

    /// Sums per touched pixel.
    sums: HashMap<TileKey, Spectrum>,
}

impl FilmTile {
    /// Create an empty tile for a film of the given size.
    ///
    /// * `width`  - Width of the target film.
    /// * `height` - Height of the target film.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            sums: HashMap::new(),
        }
    }

    /// Returns the number of touched pixels, layers counted separately.
    pub fn len(&self) -> usize {
        self.sums.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Returns the pixel index of a raster position.
    ///
    /// * `raster` - Raster position.
    fn pixel_index(&self, raster: &Vector2f) -> Option<u32> {
        if !(0.0..=1.0).contains(&raster.x) || !(0.0..=1.0).contains(&raster.y) {
            warn!("Ignoring contribution at raster position ({}, {})", raster.x, raster.y);
            return None;
        }
        let x = min((raster.x * self.width as Float) as usize, self.width - 1);
        let y = min((raster.y * self.height as Float) as usize, self.height - 1);
        Some((y * self.width + x) as u32)
    }

    /// Add to the sum of an entry.
    ///
    /// * `layer`  - Auxiliary layer or `None` for the image.
    /// * `raster` - Raster position.
    /// * `c`      - Contribution.
    fn add(&mut self, layer: Option<u32>, raster: &Vector2f, c: &Spectrum) {
        if let Some(index) = self.pixel_index(raster) {
            *self.sums.entry((layer, index)).or_insert(Spectrum::ZERO) += *c;
        }
    }

    /// Add the sums into a film.
    ///
    /// * `film` - The film. Must have the size the tile was created for.
    pub fn merge_into(&self, film: &mut Film) -> Result<()> {
        if film.width() != self.width || film.height() != self.height {
            return Err(Error::Fatal(format!(
                "cannot merge a tile for a {}x{} film into a {}x{} film",
                self.width,
                self.height,
                film.width(),
                film.height()
            )));
        }
        for (&(layer, index), c) in self.sums.iter() {
            match layer {
                None => film.accumulate_pixel(index as usize, c),
                Some(l) => film.accumulate_layer_pixel(l as usize, index as usize, c),
            }
        }
        Ok(())
    }
}

impl FilmSink for FilmTile {
    fn accumulate_contribution(&mut self, raster: &Vector2f, c: &Spectrum) {
        self.add(None, raster, c);
    }

    fn accumulate_layer(&mut self, layer: usize, raster: &Vector2f, c: &Spectrum) {
        self.add(Some(layer as u32), raster, c);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_matches_direct_accumulation() {
        let points = [(0.1, 0.2, 1.0), (0.9, 0.9, 0.5), (0.1, 0.2, 0.25)];

        let mut direct = Film::new(4, 4);
        let mut tile = FilmTile::new(4, 4);
        for (x, y, c) in points {
            direct.accumulate_contribution(&Vector2f::new(x, y), &Spectrum::splat(c));
            tile.accumulate_contribution(&Vector2f::new(x, y), &Spectrum::splat(c));
        }
        tile.accumulate_contribution(&Vector2f::new(-0.1, 0.5), &Spectrum::ONE);
        assert_eq!(tile.len(), 2);

        let mut merged = Film::new(4, 4);
        tile.merge_into(&mut merged).unwrap();
        assert_eq!(merged.pixels(), direct.pixels());
    }

    #[test]
    fn storage_does_not_grow_with_samples() {
        let (w, h) = (16, 16);
        let mut tile = FilmTile::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let raster = Vector2f::new((x as Float + 0.5) / w as Float, (y as Float + 0.5) / h as Float);
                for _ in 0..4096 {
                    tile.accumulate_contribution(&raster, &Spectrum::splat(0.25));
                }
                tile.accumulate_layer(1, &raster, &Spectrum::ONE);
            }
        }
        assert_eq!(tile.len(), 2 * w * h);

        let mut film = Film::new(w, h);
        tile.merge_into(&mut film).unwrap();
        assert!(film.pixels().iter().all(|p| *p == Spectrum::splat(1024.0)));
    }

    #[test]
    fn size_mismatch_is_fatal() {
        let tile = FilmTile::new(2, 2);
        let mut film = Film::new(3, 3);
        assert!(matches!(tile.merge_into(&mut film), Err(Error::Fatal(_))));
    }
}
