//! Raster images for `<img>`: format sniffing, decoding into PDF image
//! XObject form, and a per-document cache keyed by resolved path.

use crate::compression::compress_deflate;
use crate::pdf_generator::{PdfGenerator, fmt_num};
use anyhow::{Context, Result, anyhow, bail};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Detect format from raw bytes
pub fn detect_image_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 4 {
        return Err(anyhow!("Image data too short"));
    }
    if data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
        Ok(ImageFormat::Jpeg)
    } else if data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47 {
        Ok(ImageFormat::Png)
    } else {
        Err(anyhow!("Unsupported image format"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageFilter {
    Dct,
    Flate,
}

/// Image data ready to be written as an XObject.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub color_space: String,
    pub bits_per_component: u8,
    pub filter: ImageFilter,
    pub decode: Option<&'static str>,
    pub data: Vec<u8>,
    /// Flate-compressed 8-bit alpha channel.
    pub smask: Option<Vec<u8>>,
}

impl EmbeddedImage {
    /// Natural size in points, one image pixel per CSS pixel.
    pub fn natural_size(&self) -> (f32, f32) {
        (
            self.width as f32 * crate::units::PT_PER_PX,
            self.height as f32 * crate::units::PT_PER_PX,
        )
    }
}

pub fn decode_image(data: Vec<u8>) -> Result<EmbeddedImage> {
    match detect_image_format(&data)? {
        ImageFormat::Jpeg => decode_jpeg(data),
        ImageFormat::Png => decode_png(&data),
    }
}

struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
}

/// Parse JPEG SOF marker to get width, height and component count
fn parse_jpeg_frame(data: &[u8]) -> Result<JpegFrame> {
    let mut i = 2; // skip FF D8
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        i += 2;

        // Fill bytes and standalone markers carry no length.
        if marker == 0xFF || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            if marker == 0xFF {
                i -= 1;
            }
            continue;
        }

        // SOF0..SOF15 except DHT (C4), JPG (C8) and DAC (CC)
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            if i + 8 > data.len() {
                return Err(anyhow!("JPEG SOF marker truncated"));
            }
            let height = ((data[i + 3] as u32) << 8) | (data[i + 4] as u32);
            let width = ((data[i + 5] as u32) << 8) | (data[i + 6] as u32);
            let components = data[i + 7];
            return Ok(JpegFrame { width, height, components });
        }

        if i + 1 >= data.len() {
            break;
        }
        let seg_len = ((data[i] as usize) << 8) | (data[i + 1] as usize);
        i += seg_len;
    }
    Err(anyhow!("Could not find JPEG SOF marker"))
}

fn decode_jpeg(data: Vec<u8>) -> Result<EmbeddedImage> {
    let frame = parse_jpeg_frame(&data)?;
    if frame.width == 0 || frame.height == 0 {
        bail!("JPEG has zero dimensions");
    }
    let (color_space, decode) = match frame.components {
        1 => ("/DeviceGray", None),
        3 => ("/DeviceRGB", None),
        // Adobe writes CMYK JPEGs inverted.
        4 => ("/DeviceCMYK", Some("[1 0 1 0 1 0 1 0]")),
        n => bail!("JPEG with {} components is not supported", n),
    };
    Ok(EmbeddedImage {
        format: ImageFormat::Jpeg,
        width: frame.width,
        height: frame.height,
        color_space: color_space.to_string(),
        bits_per_component: 8,
        filter: ImageFilter::Dct,
        decode,
        data,
        smask: None,
    })
}

/// Decode a PNG and re-encode its pixels as 8-bit samples, with any alpha
/// (including `tRNS` transparency) split out into a soft mask.
fn decode_png(data: &[u8]) -> Result<EmbeddedImage> {
    let decoded = ::image::load_from_memory_with_format(data, ::image::ImageFormat::Png)
        .context("invalid PNG data")?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        bail!("PNG has zero dimensions");
    }

    let color = decoded.color();
    let (color_space, pixels, alpha) = match (color.has_color(), color.has_alpha()) {
        (true, false) => ("/DeviceRGB", decoded.into_rgb8().into_raw(), None),
        (false, false) => ("/DeviceGray", decoded.into_luma8().into_raw(), None),
        (true, true) => {
            let rgba = decoded.into_rgba8().into_raw();
            let (rgb, alpha) = split_alpha(&rgba, 3);
            ("/DeviceRGB", rgb, Some(alpha))
        }
        (false, true) => {
            let la = decoded.into_luma_alpha8().into_raw();
            let (gray, alpha) = split_alpha(&la, 1);
            ("/DeviceGray", gray, Some(alpha))
        }
    };
    // A fully opaque alpha channel needs no mask.
    let smask = alpha.filter(|a| a.iter().any(|&v| v != u8::MAX)).map(|a| compress_deflate(&a));

    Ok(EmbeddedImage {
        format: ImageFormat::Png,
        width,
        height,
        color_space: color_space.to_string(),
        bits_per_component: 8,
        filter: ImageFilter::Flate,
        decode: None,
        data: compress_deflate(&pixels),
        smask,
    })
}

fn split_alpha(samples: &[u8], colors: usize) -> (Vec<u8>, Vec<u8>) {
    let pixels = samples.len() / (colors + 1);
    let mut color = Vec::with_capacity(pixels * colors);
    let mut alpha = Vec::with_capacity(pixels);
    for px in samples.chunks_exact(colors + 1) {
        color.extend_from_slice(&px[..colors]);
        alpha.push(px[colors]);
    }
    (color, alpha)
}

/// Scale dimensions to fit within max_width x max_height while preserving aspect ratio
pub fn scale_to_fit(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale_w = max_width / width;
    let scale_h = max_height / height;
    let scale = scale_w.min(scale_h).min(1.0); // don't upscale
    (width * scale, height * scale)
}

/// Content stream operators that paint an image XObject into a box whose
/// lower-left corner is `(x, y)` in PDF user space.
pub fn create_image_content_stream(x: f32, y: f32, width: f32, height: f32, image_name: &str) -> String {
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        fmt_num(width),
        fmt_num(height),
        fmt_num(x),
        fmt_num(y),
        image_name
    )
}

/// Decoded images of one document. Sources resolve against the directory of
/// the Markdown input; every distinct path is read and decoded once.
#[derive(Debug)]
pub struct ImageStore {
    base_dir: PathBuf,
    images: Vec<EmbeddedImage>,
    by_path: HashMap<PathBuf, std::result::Result<usize, String>>,
    /// Sources already reported as skipped.
    skipped: HashSet<String>,
}

impl ImageStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            images: Vec::new(),
            by_path: HashMap::new(),
            skipped: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&EmbeddedImage> {
        self.images.get(id)
    }

    /// Local file path for an `src` attribute.
    pub fn resolve(&self, src: &str) -> Result<PathBuf> {
        let src = src.trim();
        let lower = src.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:") {
            bail!("remote and inline images are not fetched");
        }
        let local = src.strip_prefix("file://").unwrap_or(src);
        let local = local.split(['?', '#']).next().unwrap_or(local);
        let path = PathBuf::from(percent_decode(local));
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(self.base_dir.join(path))
        }
    }

    /// Load and decode the image at `src`, returning its id. The first
    /// failure for each source is logged as a warning.
    pub fn load(&mut self, src: &str) -> Result<usize> {
        let result = self.load_cached(src);
        if let Err(e) = &result {
            if self.skipped.insert(src.to_string()) {
                log::warn!("image '{}' not embedded: {:#}", src, e);
            }
        }
        result
    }

    fn load_cached(&mut self, src: &str) -> Result<usize> {
        let path = self.resolve(src)?;
        if let Some(cached) = self.by_path.get(&path) {
            return cached.clone().map_err(|e| anyhow!(e));
        }
        let result = read_image(&path);
        let entry = match result {
            Ok(image) => {
                log::debug!("loaded {}x{} image {}", image.width, image.height, path.display());
                self.images.push(image);
                Ok(self.images.len() - 1)
            }
            Err(e) => Err(format!("{:#}", e)),
        };
        self.by_path.insert(path, entry.clone());
        entry.map_err(|e| anyhow!(e))
    }

    /// Write image `id` (and its soft mask) as XObjects, returning the
    /// object number.
    pub fn write_xobject(&self, id: usize, generator: &mut PdfGenerator) -> Option<u32> {
        let image = self.images.get(id)?;
        let smask = image.smask.as_ref().map(|alpha| {
            let dict = format!(
                "<< /Type /XObject\n/Subtype /Image\n/Width {}\n/Height {}\n/ColorSpace /DeviceGray\n\
                 /BitsPerComponent 8\n/Filter /FlateDecode\n/Length {}\n>>\n",
                image.width,
                image.height,
                alpha.len()
            );
            generator.add_stream_object(dict, alpha.clone())
        });

        let mut dict = format!(
            "<< /Type /XObject\n/Subtype /Image\n/Width {}\n/Height {}\n/ColorSpace {}\n/BitsPerComponent {}\n",
            image.width, image.height, image.color_space, image.bits_per_component
        );
        dict.push_str(match image.filter {
            ImageFilter::Dct => "/Filter /DCTDecode\n",
            ImageFilter::Flate => "/Filter /FlateDecode\n",
        });
        if let Some(decode) = image.decode {
            dict.push_str(&format!("/Decode {}\n", decode));
        }
        if let Some(mask) = smask {
            dict.push_str(&format!("/SMask {} 0 R\n", mask));
        }
        dict.push_str(&format!("/Length {}\n>>\n", image.data.len()));
        Some(generator.add_stream_object(dict, image.data.clone()))
    }
}

fn read_image(path: &Path) -> Result<EmbeddedImage> {
    let data = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    decode_image(data).with_context(|| format!("cannot decode {}", path.display()))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
