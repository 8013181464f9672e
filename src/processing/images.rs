//! Recovery of the raster images embedded in a PDF.
//!
//! JPEG and JPEG 2000 streams are stored as they are. Anything else is
//! decoded from its raw samples and re-encoded as PNG.

use crate::models::{CardConfig, ExtractedImage};
use crate::processing::pdf::{dict_get, dict_get_dict, resolve, PdfDocument};
use crate::utils::{ArtifactStore, CardError};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use rand::Rng;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

const SUFFIX_LEN: usize = 5;
const MAX_FORM_DEPTH: usize = 8;

pub struct ImageRecovery {
    store: ArtifactStore,
}

impl ImageRecovery {
    pub fn new(config: &CardConfig) -> Self {
        ImageRecovery {
            store: ArtifactStore::new(&config.image_dir),
        }
    }

    /// Write every embedded image to the image directory and return the
    /// paths in page order. Any failure yields an empty list.
    pub fn recover_images<P: AsRef<Path>, R: Rng + ?Sized>(&self, path: P, rng: &mut R) -> Vec<PathBuf> {
        let path = path.as_ref();
        match self.try_recover_images(path, rng) {
            Ok(paths) => {
                log::debug!("Recovered {} image(s) from {:?}", paths.len(), path);
                paths
            }
            Err(e) => {
                log::warn!("Image recovery failed for {:?}: {}", path, e);
                Vec::new()
            }
        }
    }

    pub fn try_recover_images<P: AsRef<Path>, R: Rng + ?Sized>(
        &self,
        path: P,
        rng: &mut R,
    ) -> Result<Vec<PathBuf>, CardError> {
        let doc = PdfDocument::open(path)?;
        let mut written = Vec::new();
        let result = self.write_all(&doc, rng, &mut written);
        if result.is_err() {
            ArtifactStore::discard(&written);
        }
        result.map(|_| written)
    }

    fn write_all<R: Rng + ?Sized>(
        &self,
        doc: &PdfDocument,
        rng: &mut R,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), CardError> {
        for page in doc.pages() {
            let Some(resources) = page.resources() else {
                continue;
            };
            let mut walker = PageImages {
                doc: doc.inner(),
                page: page.index() + 1,
                seen: HashSet::new(),
                found: Vec::new(),
            };
            walker.visit(resources, 0)?;
            for image in walker.found {
                let path = self
                    .store
                    .write(&image.artifact_prefix(), &image.ext, SUFFIX_LEN, &image.bytes, rng)?;
                written.push(path);
            }
        }
        Ok(())
    }
}

/// Collects the images reachable from one page's resources.
struct PageImages<'a> {
    doc: &'a Document,
    page: usize,
    seen: HashSet<ObjectId>,
    found: Vec<ExtractedImage>,
}

impl<'a> PageImages<'a> {
    fn visit(&mut self, resources: &'a Dictionary, depth: usize) -> Result<(), CardError> {
        let doc = self.doc;
        let Some(xobjects) = dict_get_dict(doc, resources, b"XObject") else {
            return Ok(());
        };

        for (_, obj) in xobjects.iter() {
            if let Object::Reference(id) = obj {
                if !self.seen.insert(*id) {
                    continue;
                }
            }
            let Object::Stream(stream) = resolve(doc, obj) else {
                continue;
            };
            match stream.dict.get(b"Subtype").and_then(Object::as_name).ok() {
                Some(b"Image") => {
                    let (ext, bytes) = encode_image(doc, stream)?;
                    self.found.push(ExtractedImage {
                        page: self.page,
                        index: self.found.len(),
                        ext: ext.to_string(),
                        bytes,
                    });
                }
                Some(b"Form") if depth < MAX_FORM_DEPTH => {
                    if let Some(form_resources) = dict_get_dict(doc, &stream.dict, b"Resources") {
                        self.visit(form_resources, depth + 1)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorModel>, palette: Vec<u8> },
}

impl ColorModel {
    fn components(&self) -> usize {
        match self {
            ColorModel::Gray | ColorModel::Indexed { .. } => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    fn from_object(doc: &Document, obj: &Object) -> Result<Self, CardError> {
        match resolve(doc, obj) {
            Object::Name(name) => Self::from_name(name),
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|o| resolve(doc, o).as_name().ok())
                    .unwrap_or(b"");
                match family {
                    b"ICCBased" => {
                        let n = items
                            .get(1)
                            .and_then(|o| resolve(doc, o).as_stream().ok())
                            .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok())
                            .unwrap_or(3);
                        match n {
                            1 => Ok(ColorModel::Gray),
                            4 => Ok(ColorModel::Cmyk),
                            _ => Ok(ColorModel::Rgb),
                        }
                    }
                    b"Indexed" | b"I" => {
                        let base = items.get(1).ok_or_else(|| {
                            CardError::ImageDecodeError("Indexed colour space without base".to_string())
                        })?;
                        let base = ColorModel::from_object(doc, base)?;
                        let palette = match items.get(3).map(|o| resolve(doc, o)) {
                            Some(Object::String(bytes, _)) => bytes.clone(),
                            Some(Object::Stream(s)) => stream_data(s)?,
                            _ => {
                                return Err(CardError::ImageDecodeError(
                                    "Indexed colour space without lookup table".to_string(),
                                ))
                            }
                        };
                        Ok(ColorModel::Indexed {
                            base: Box::new(base),
                            palette,
                        })
                    }
                    other => Self::from_name(other),
                }
            }
            other => Err(CardError::ImageDecodeError(format!(
                "Unsupported colour space object: {:?}",
                other
            ))),
        }
    }

    fn from_name(name: &[u8]) -> Result<Self, CardError> {
        match name {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorModel::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorModel::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
            other => Err(CardError::ImageDecodeError(format!(
                "Unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// Convert one sample (already split into components) to RGB.
    fn to_rgb(&self, sample: &[u8]) -> [u8; 3] {
        match self {
            ColorModel::Gray => [sample[0]; 3],
            ColorModel::Rgb => [sample[0], sample[1], sample[2]],
            ColorModel::Cmyk => {
                let k = 255 - u16::from(sample[3]);
                let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
                [channel(sample[0]), channel(sample[1]), channel(sample[2])]
            }
            ColorModel::Indexed { base, palette } => {
                let width = base.components();
                let start = usize::from(sample[0]) * width;
                match palette.get(start..start + width) {
                    Some(entry) => base.to_rgb(entry),
                    None => [0, 0, 0],
                }
            }
        }
    }
}

fn stream_data(stream: &Stream) -> Result<Vec<u8>, CardError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| CardError::ImageDecodeError(format!("Failed to decompress stream: {}", e)))
    } else {
        Ok(stream.content.clone())
    }
}

fn filters(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict_get(doc, dict, b"Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| resolve(doc, o).as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<u32, CardError> {
    dict_get(doc, dict, key)
        .and_then(|o| o.as_i64().ok())
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            CardError::ImageDecodeError(format!("Image without valid {}", String::from_utf8_lossy(key)))
        })
}

/// Native bytes and file extension for one image XObject.
fn encode_image(doc: &Document, stream: &Stream) -> Result<(&'static str, Vec<u8>), CardError> {
    let dict = &stream.dict;
    let filters = filters(doc, dict);
    match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") | Some(b"JPXDecode") if filters.len() > 1 => {
            return Err(CardError::ImageDecodeError(
                "Chained filters ahead of an image codec are not supported".to_string(),
            ));
        }
        Some(b"DCTDecode") => return Ok(("jpeg", stream.content.clone())),
        Some(b"JPXDecode") => return Ok(("jpx", stream.content.clone())),
        _ => {}
    }

    let width = dimension(doc, dict, b"Width")?;
    let height = dimension(doc, dict, b"Height")?;
    let is_mask = matches!(dict_get(doc, dict, b"ImageMask"), Some(Object::Boolean(true)));
    let bits = if is_mask {
        1
    } else {
        dict_get(doc, dict, b"BitsPerComponent")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8)
    };
    let model = if is_mask {
        ColorModel::Gray
    } else {
        let cs = dict.get(b"ColorSpace").map_err(|_| {
            CardError::ImageDecodeError("Image without colour space".to_string())
        })?;
        ColorModel::from_object(doc, cs)?
    };

    let bits = match bits {
        1 | 2 | 4 | 8 | 16 => bits as usize,
        other => {
            return Err(CardError::ImageDecodeError(format!(
                "Unsupported sample depth: {} bit(s) per component",
                other
            )))
        }
    };

    let data = stream_data(stream)?;
    let decoded = unpack_samples(&data, width, height, bits, &model)?;

    let mut png = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(("png", png))
}

fn checked_size(factors: &[usize]) -> Result<usize, CardError> {
    factors
        .iter()
        .try_fold(1usize, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| CardError::ImageDecodeError(format!("Image size overflows: {:?}", factors)))
}

/// Read sample `index` of a packed row. Depths below 8 are packed high bit
/// first; 16-bit samples are big-endian.
fn sample_at(row: &[u8], index: usize, bits: usize) -> u16 {
    match bits {
        8 => u16::from(row[index]),
        16 => u16::from(row[2 * index]) << 8 | u16::from(row[2 * index + 1]),
        _ => {
            let bit = index * bits;
            let shift = 8 - bits - bit % 8;
            let mask = (1u8 << bits) - 1;
            u16::from((row[bit / 8] >> shift) & mask)
        }
    }
}

fn scale_to_byte(value: u16, bits: usize) -> u8 {
    match bits {
        8 => value as u8,
        16 => (value >> 8) as u8,
        _ => {
            let max = (1u32 << bits) - 1;
            (u32::from(value) * 255 / max) as u8
        }
    }
}

/// Unpack raw image samples of any supported depth into an 8-bit image.
/// Rows are padded to whole bytes; palette indices are used as they are.
fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    bits: usize,
    model: &ColorModel,
) -> Result<DynamicImage, CardError> {
    let (w, h) = (width as usize, height as usize);
    let n = model.components();
    let row_bits = checked_size(&[w, n, bits])?;
    let stride = row_bits / 8 + usize::from(row_bits % 8 != 0);
    let packed = take(data, checked_size(&[stride, h])?)?;
    let indexed = matches!(model, ColorModel::Indexed { .. });

    let decoded = if *model == ColorModel::Gray {
        let mut pixels = Vec::with_capacity(checked_size(&[w, h])?);
        for row in packed.chunks_exact(stride) {
            pixels.extend((0..w).map(|x| scale_to_byte(sample_at(row, x, bits), bits)));
        }
        GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
    } else {
        let mut pixels = Vec::with_capacity(checked_size(&[w, h, 3])?);
        let mut components = vec![0u8; n];
        for row in packed.chunks_exact(stride) {
            for x in 0..w {
                for (c, component) in components.iter_mut().enumerate() {
                    let value = sample_at(row, x * n + c, bits);
                    *component = if indexed {
                        u8::try_from(value).unwrap_or(u8::MAX)
                    } else {
                        scale_to_byte(value, bits)
                    };
                }
                pixels.extend_from_slice(&model.to_rgb(&components));
            }
        }
        RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };
    decoded.ok_or_else(|| CardError::ImageDecodeError("Sample buffer size mismatch".to_string()))
}

fn take(data: &[u8], needed: usize) -> Result<&[u8], CardError> {
    data.get(..needed).ok_or_else(|| {
        CardError::ImageDecodeError(format!(
            "Image data too short: {} byte(s), expected {}",
            data.len(),
            needed
        ))
    })
}
