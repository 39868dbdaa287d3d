//! Image I/O

use crate::error::{Error, Result};
use crate::lm::*;
use crate::spectrum::*;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use exr::prelude as exrs;
use exr::prelude::*;
use image::{open, ImageBuffer, ImageFormat, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Linear RGB image stored row by row, top row first.
#[derive(Clone, Debug, Default)]
pub struct RGBImage {
    /// The pixels.
    pub pixels: Vec<Spectrum>,

    /// Width in pixels.
    pub width: usize,

    /// Height in pixels.
    pub height: usize,
}

impl RGBImage {
    /// Creates a new `RGBImage` from pixel data.
    ///
    /// * `pixels` - RGB pixel data.
    /// * `width`  - Width of image.
    /// * `height` - Height of image.
    pub fn new(pixels: Vec<Spectrum>, width: usize, height: usize) -> Result<Self> {
        if width * height != pixels.len() {
            return Err(Error::Image(format!(
                "{} pixels for a {}x{} image",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self { pixels, width, height })
    }

    /// Returns the pixel at (x, y), with y = 0 the top row.
    ///
    /// * `x` - Column.
    /// * `y` - Row.
    pub fn pixel(&self, x: usize, y: usize) -> Spectrum {
        self.pixels[y * self.width + x]
    }
}

/// Read an image. The format is chosen by the file extension: OpenEXR,
/// PFM, or any 8-bit format the `image` crate decodes (treated as sRGB).
///
/// * `path` - Input file path.
pub fn read_image(path: &str) -> Result<RGBImage> {
    match extension(path).as_deref() {
        Some("exr") => read_exr(path),
        Some("pfm") => read_pfm(path),
        Some(_) => read_8_bit(path),
        None => Err(Error::Image(format!("can't determine file type from suffix of filename {path}"))),
    }
}

/// Write an image. The format is chosen by the file extension: OpenEXR, PFM,
/// PNG or TGA. 8-bit formats are gamma corrected and clamped.
///
/// * `path`  - Output file path.
/// * `image` - The image.
pub fn write_image(path: &str, image: &RGBImage) -> Result<()> {
    match extension(path).as_deref() {
        Some("exr") => write_exr(path, image),
        Some("pfm") => write_pfm(path, image),
        Some("png") => write_8_bit(path, image, ImageFormat::Png),
        Some("tga") => write_8_bit(path, image, ImageFormat::Tga),
        Some(ext) => Err(Error::Image(format!("extension .{ext} is not supported"))),
        None => Err(Error::Image(format!("can't determine file type from suffix of filename {path}"))),
    }
}

/// Returns the lower case extension of a path.
///
/// * `path` - The file path.
fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Read a single layer OpenEXR file.
///
/// * `path` - Input file path.
fn read_exr(path: &str) -> Result<RGBImage> {
    let reader = exrs::read()
        .no_deep_data()
        .largest_resolution_level()
        .rgba_channels(
            |resolution, _channels| RGBImage {
                pixels: vec![Spectrum::ZERO; resolution.width() * resolution.height()],
                width: resolution.width(),
                height: resolution.height(),
            },
            |img: &mut RGBImage, position, (r, g, b, _a): (f32, f32, f32, f32)| {
                let offset = position.y() * img.width + position.x();
                img.pixels[offset] = Spectrum::new(r as Float, g as Float, b as Float);
            },
        )
        .first_valid_layer()
        .all_attributes();

    let image = reader
        .from_file(path)
        .map_err(|e| Error::Image(format!("error reading {path}: {e}")))?;
    let pixels = image.layer_data.channel_data.pixels;
    info!("Read EXR image {path} ({} x {})", pixels.width, pixels.height);
    Ok(pixels)
}

/// Reads a whitespace terminated header word of at most `len` bytes.
///
/// * `reader` - The reader.
/// * `len`    - Maximum number of bytes to read.
fn read_pfm_word<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let mut s = String::new();
    loop {
        let c = reader.read_u8()? as char;
        if c.is_ascii_whitespace() {
            if s.is_empty() {
                continue;
            }
            return Ok(s);
        }
        if s.len() == len {
            return Err(Error::Image("PFM header word too long".to_string()));
        }
        s.push(c);
    }
}

/// Read a PFM (Portable FloatMap) file.
///
/// * `path` - Input file path.
fn read_pfm(path: &str) -> Result<RGBImage> {
    let mut reader = BufReader::new(File::open(path)?);

    let n_channels = match read_pfm_word(&mut reader, 2)?.as_str() {
        "Pf" => 1,
        "PF" => 3,
        s => return Err(Error::Image(format!("invalid PFM type '{s}'"))),
    };

    let parse_err = |what: &str| Error::Image(format!("error parsing PFM {what} in {path}"));
    let width = read_pfm_word(&mut reader, 80)?
        .parse::<usize>()
        .map_err(|_| parse_err("width"))?;
    let height = read_pfm_word(&mut reader, 80)?
        .parse::<usize>()
        .map_err(|_| parse_err("height"))?;
    let scale = read_pfm_word(&mut reader, 80)?
        .parse::<f32>()
        .map_err(|_| parse_err("scale"))?;
    let little_endian = scale < 0.0;
    let scale = scale.abs() as Float;

    // Rows are stored bottom to top.
    let mut pixels = vec![Spectrum::ZERO; width * height];
    for y in (0..height).rev() {
        for x in 0..width {
            let mut c = [0.0; 3];
            for v in c.iter_mut().take(n_channels) {
                let f = if little_endian {
                    reader.read_f32::<LittleEndian>()?
                } else {
                    reader.read_f32::<BigEndian>()?
                };
                *v = f as Float * scale;
            }
            if n_channels == 1 {
                c = [c[0]; 3];
            }
            pixels[y * width + x] = Spectrum::from_rgb(c);
        }
    }

    info!("Read PFM image {path} ({width} x {height} x {n_channels})");
    RGBImage::new(pixels, width, height)
}

/// Read an 8-bit image format.
///
/// * `path` - Input file path.
fn read_8_bit(path: &str) -> Result<RGBImage> {
    let img: RgbImage = open(path)
        .map_err(|e| Error::Image(format!("error reading {path}: {e}")))?
        .into_rgb8();

    let width = img.width() as usize;
    let height = img.height() as usize;
    let pixels = img
        .pixels()
        .map(|rgb| {
            Spectrum::new(
                inv_gamma_correct(rgb[0] as Float / 255.0),
                inv_gamma_correct(rgb[1] as Float / 255.0),
                inv_gamma_correct(rgb[2] as Float / 255.0),
            )
        })
        .collect();

    info!("Read 8-bit image {path} ({width} x {height})");
    RGBImage::new(pixels, width, height)
}

/// Writes the image in OpenEXR format.
///
/// * `path`  - Output file path.
/// * `image` - The image.
fn write_exr(path: &str, image: &RGBImage) -> Result<()> {
    info!("Writing image {} with resolution {}x{}", path, image.width, image.height);

    let size = Vec2(image.width, image.height);
    let layer = Layer::new(
        size,
        LayerAttributes::named("render"),
        Encoding::SMALL_LOSSLESS,
        SpecificChannels::rgb(|pos: Vec2<usize>| {
            let c = image.pixel(pos.0, pos.1);
            (c[0] as f32, c[1] as f32, c[2] as f32)
        }),
    );

    let attributes = ImageAttributes::new(IntegerBounds::from_dimensions(size));
    Image::empty(attributes)
        .with_layer(layer)
        .write()
        .to_file(path)
        .map_err(|e| Error::Image(format!("error saving output image {path}: {e}")))
}

/// Writes the image in an 8-bit image format.
///
/// * `path`         - Output file path.
/// * `image`        - The image.
/// * `image_format` - Image format.
fn write_8_bit(path: &str, image: &RGBImage, image_format: ImageFormat) -> Result<()> {
    info!("Writing image {} with resolution {}x{}", path, image.width, image.height);

    let imgbuf = ImageBuffer::from_fn(image.width as u32, image.height as u32, |x, y| {
        Rgb(apply_gamma(&image.pixel(x as usize, y as usize)))
    });
    imgbuf
        .save_with_format(path, image_format)
        .map_err(|e| Error::Image(format!("error saving output image {path}: {e}")))
}

/// Writes the image in PFM (Portable FloatMap) format, little endian.
///
/// * `path`  - Output file path.
/// * `image` - The image.
fn write_pfm(path: &str, image: &RGBImage) -> Result<()> {
    info!("Writing image {} with resolution {}x{}", path, image.width, image.height);

    let mut file = BufWriter::new(File::create(path)?);
    write!(file, "PF\n{} {}\n-1\n", image.width, image.height)?;

    // Rows are ordered bottom to top.
    for y in (0..image.height).rev() {
        for x in 0..image.width {
            for v in image.pixel(x, y).to_rgb() {
                file.write_f32::<LittleEndian>(v as f32)?;
            }
        }
    }
    file.flush()?;
    Ok(())
}

/// Apply gamma correction to a RGB floating point pixel and return the clamped 8-bit values.
///
/// * `rgb` - RGB floating point pixel value.
#[inline]
fn apply_gamma(rgb: &Spectrum) -> [u8; 3] {
    [clamp_byte(rgb[0]), clamp_byte(rgb[1]), clamp_byte(rgb[2])]
}

/// Clamp floating point value to 8-bit range [0, 255].
///
/// * `v` - Value to clamp.
#[inline]
fn clamp_byte(v: Float) -> u8 {
    clamp(255.0 * gamma_correct(v) + 0.5, 0.0, 255.0) as u8
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("transport-{}-{}", std::process::id(), name))
            .to_string_lossy()
            .into_owned()
    }

    fn gradient() -> RGBImage {
        let pixels = (0..6).map(|i| Spectrum::new(i as Float, 0.5, -1.0)).collect();
        RGBImage::new(pixels, 3, 2).unwrap()
    }

    #[test]
    fn pfm_preserves_rows() {
        let path = temp_path("rows.pfm");
        let img = gradient();
        write_image(&path, &img).unwrap();
        let back = read_image(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!((back.width, back.height), (3, 2));
        assert_eq!(back.pixel(2, 1), img.pixel(2, 1));
        assert_eq!(back.pixel(0, 0), img.pixel(0, 0));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let img = gradient();
        assert!(matches!(write_image("out.xyz", &img), Err(Error::Image(_))));
        assert!(matches!(write_image("out", &img), Err(Error::Image(_))));
    }

    #[test]
    fn bytes_are_gamma_corrected_and_clamped() {
        assert_eq!(clamp_byte(0.0), 0);
        assert_eq!(clamp_byte(1.0), 255);
        assert_eq!(clamp_byte(7.0), 255);
        assert!(clamp_byte(0.2) > 51);
    }

    #[test]
    fn mismatched_pixel_count_is_an_error() {
        assert!(RGBImage::new(vec![Spectrum::ZERO; 5], 3, 2).is_err());
    }
}
