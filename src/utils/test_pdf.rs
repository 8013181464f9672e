//! In-memory PDF fixtures for unit tests.

use crate::models::Rect;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

pub(crate) const PAGE_HEIGHT: f64 = 842.0;
pub(crate) const FONT_SIZE: f64 = 10.0;

/// One `Tj` of Helvetica 10pt placed by its baseline, in top-left page space.
#[derive(Debug, Clone)]
pub(crate) struct TextRun {
    pub x: f64,
    pub baseline: f64,
    pub text: String,
}

impl TextRun {
    pub fn at(x: f64, baseline: f64, text: &str) -> Self {
        TextRun {
            x,
            baseline,
            text: text.to_string(),
        }
    }

    /// Place text so that its glyph boxes are centred inside `rect`.
    ///
    /// Without font metrics a 10pt glyph spans 8 units above the baseline
    /// and 2 below, so its centre sits 3 units above the baseline.
    pub fn in_rect(rect: Rect, text: &str) -> Self {
        let centre = ((rect.y0 + rect.y1) / 2.0).floor();
        TextRun::at(rect.x0 + 5.0, centre + 3.0, text)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TestImage {
    Raw {
        width: u32,
        height: u32,
        color_space: Object,
        bits: u8,
        data: Vec<u8>,
        compress: bool,
    },
    Jpeg {
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
}

impl TestImage {
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        TestImage::Raw {
            width,
            height,
            color_space: Object::Name(b"DeviceRGB".to_vec()),
            bits: 8,
            data,
            compress: false,
        }
    }

    pub fn gray(width: u32, height: u32, bits: u8, data: Vec<u8>) -> Self {
        TestImage::Raw {
            width,
            height,
            color_space: Object::Name(b"DeviceGray".to_vec()),
            bits,
            data,
            compress: false,
        }
    }

    pub fn indexed(width: u32, height: u32, palette: Vec<u8>, data: Vec<u8>) -> Self {
        let hival = (palette.len() / 3) as i64 - 1;
        TestImage::Raw {
            width,
            height,
            color_space: Object::Array(vec![
                Object::Name(b"Indexed".to_vec()),
                Object::Name(b"DeviceRGB".to_vec()),
                Object::Integer(hival),
                Object::String(palette, StringFormat::Hexadecimal),
            ]),
            bits: 8,
            data,
            compress: false,
        }
    }

    pub fn with_bits(mut self, depth: u8) -> Self {
        if let TestImage::Raw { bits, .. } = &mut self {
            *bits = depth;
        }
        self
    }

    pub fn compressed(self) -> Self {
        match self {
            TestImage::Raw {
                width,
                height,
                color_space,
                bits,
                data,
                ..
            } => TestImage::Raw {
                width,
                height,
                color_space,
                bits,
                data,
                compress: true,
            },
            other => other,
        }
    }

    fn into_stream(self) -> Stream {
        match self {
            TestImage::Raw {
                width,
                height,
                color_space,
                bits,
                data,
                compress,
            } => {
                let dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => bits as i64,
                };
                let mut stream = Stream::new(dict, data);
                if compress {
                    stream.compress().unwrap();
                }
                stream
            }
            TestImage::Jpeg {
                width,
                height,
                data,
            } => {
                let dict = dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                };
                Stream::new(dict, data)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct TestPage {
    runs: Vec<TextRun>,
    images: Vec<TestImage>,
    in_form: bool,
}

/// Builder for small single- or multi-page PDFs.
#[derive(Debug, Clone, Default)]
pub(crate) struct TestPdf {
    pages: Vec<TestPage>,
}

impl TestPdf {
    pub fn new() -> Self {
        TestPdf::default()
    }

    pub fn page(mut self, runs: Vec<TextRun>) -> Self {
        self.pages.push(TestPage {
            runs,
            ..Default::default()
        });
        self
    }

    pub fn page_with_images(mut self, runs: Vec<TextRun>, images: Vec<TestImage>) -> Self {
        self.pages.push(TestPage {
            runs,
            images,
            in_form: false,
        });
        self
    }

    /// Page whose text and images are drawn from inside a form XObject.
    pub fn form_page(mut self, runs: Vec<TextRun>, images: Vec<TestImage>) -> Self {
        self.pages.push(TestPage {
            runs,
            images,
            in_form: true,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in self.pages {
            let mut xobjects = Dictionary::new();
            let mut draw = Vec::new();
            for (i, image) in page.images.into_iter().enumerate() {
                let image_id = doc.add_object(image.into_stream());
                let name = format!("Im{}", i);
                xobjects.set(name.clone(), image_id);
                draw.push(Operation::new("q", vec![]));
                draw.push(Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 0.into(), 0.into()],
                ));
                draw.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                draw.push(Operation::new("Q", vec![]));
            }
            draw.extend(text_operations(&page.runs));

            let operations = if page.in_form {
                let form_content = Content { operations: draw }.encode().unwrap();
                let form = Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Form",
                        "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                        "Resources" => dictionary! {
                            "Font" => dictionary! { "F1" => font_id },
                            "XObject" => xobjects,
                        },
                    },
                    form_content,
                );
                let form_id = doc.add_object(form);
                xobjects = dictionary! { "Fm0" => form_id };
                vec![
                    Operation::new("q", vec![]),
                    Operation::new("Do", vec![Object::Name(b"Fm0".to_vec())]),
                    Operation::new("Q", vec![]),
                ]
            } else {
                draw
            };

            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                Content { operations }.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}

fn text_operations(runs: &[TextRun]) -> Vec<Operation> {
    let mut ops = Vec::new();
    for run in runs {
        let y = PAGE_HEIGHT - run.baseline;
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Real(FONT_SIZE as _)],
        ));
        ops.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                Object::Real(run.x as _),
                Object::Real(y as _),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(run.text.as_str())],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

/// A tiny baseline JPEG of a solid colour.
pub(crate) fn solid_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}
