// This code is inspired by https://github.com/fschutt/printpdf/blob/2bebdc65d06dafbe926ed4b43fedd10f966c59d3/src/xobject.rs

use crate::Error;
use lopdf::ObjectId;
use png::{BitDepth, ColorType, Transformations};
use std::io::Read;

/// Color space of a decoded image, after alpha has been split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageColorSpace {
    Gray,
    Rgb,
}

#[derive(Debug, Clone)]
pub(crate) struct ImageXObject {
    /// Width of the image (original width, not scaled width)
    pub width: u32,
    /// Height of the image (original height, not scaled height)
    pub height: u32,
    pub color_space: ImageColorSpace,
    /// Should the image be interpolated when scaled?
    pub interpolate: bool,
    /// The actual data from the image, 8 bits per component.
    pub image_data: Vec<u8>,
    /// Image used as a soft mask. (transparency)
    pub s_mask: Option<ObjectId>,
}

impl ImageXObject {
    /// Decode a png. Returns the color image and, when the png has an alpha
    /// channel, a grayscale image holding that channel (to be used as `SMask`).
    pub fn try_from_png<R: Read>(image_reader: R) -> Result<(Self, Option<Self>), Error> {
        let mut decoder = png::Decoder::new(image_reader);
        // Expand palettes and low bit depths, strip 16 bit down to 8.
        decoder.set_transformations(Transformations::normalize_to_color8());
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        // An APNG might contain multiple frames, only the first one is used.
        let info = reader.next_frame(&mut buf)?;
        if info.width == 0 || info.height == 0 {
            return Err(Error::ImageDecode("Image has no pixels.".to_owned()));
        }
        if info.bit_depth != BitDepth::Eight {
            return Err(Error::ImageDecode(format!(
                "Unsupported bit depth after normalization: {:?}",
                info.bit_depth
            )));
        }
        let image_data = &buf[..info.buffer_size()];
        // Rows may be padded; only whole rows of pixels are kept.
        let row_len = info.line_size;

        let (color_space, channels, has_alpha) = match info.color_type {
            ColorType::Grayscale => (ImageColorSpace::Gray, 1, false),
            ColorType::GrayscaleAlpha => (ImageColorSpace::Gray, 2, true),
            ColorType::Rgb => (ImageColorSpace::Rgb, 3, false),
            ColorType::Rgba => (ImageColorSpace::Rgb, 4, true),
            ColorType::Indexed => {
                return Err(Error::ImageDecode(
                    "Indexed image was not expanded.".to_owned(),
                ))
            }
        };
        let color_channels = if has_alpha { channels - 1 } else { channels };
        let pixels = (info.width as usize) * (info.height as usize);
        let mut color = Vec::with_capacity(pixels * color_channels);
        let mut alpha = Vec::with_capacity(if has_alpha { pixels } else { 0 });
        for row in image_data.chunks(row_len).take(info.height as usize) {
            for pixel in row[..info.width as usize * channels].chunks_exact(channels) {
                color.extend_from_slice(&pixel[..color_channels]);
                if has_alpha {
                    alpha.push(pixel[color_channels]);
                }
            }
        }

        let color_image = Self {
            width: info.width,
            height: info.height,
            color_space,
            image_data: color,
            interpolate: true,
            s_mask: None, // This should be filled in later
        };
        let mask_image = if has_alpha {
            Some(Self {
                width: info.width,
                height: info.height,
                color_space: ImageColorSpace::Gray,
                image_data: alpha,
                interpolate: true,
                s_mask: None,
            })
        } else {
            None
        };
        Ok((color_image, mask_image))
    }
}

// Inspired and derived from: https://github.com/fschutt/printpdf/blob/2bebdc65d06dafbe926ed4b43fedd10f966c59d3/src/xobject.rs#L245
impl From<ImageXObject> for lopdf::Stream {
    fn from(image: ImageXObject) -> Self {
        use lopdf::Object::*;

        let cs: &'static str = match image.color_space {
            ImageColorSpace::Rgb => "DeviceRGB",
            ImageColorSpace::Gray => "DeviceGray",
        };

        let mut dict = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("XObject".as_bytes().to_vec())),
            ("Subtype", Name("Image".as_bytes().to_vec())),
            ("Width", Integer(image.width as i64)),
            ("Height", Integer(image.height as i64)),
            ("Interpolate", image.interpolate.into()),
            ("BitsPerComponent", Integer(8)),
            ("ColorSpace", Name(cs.as_bytes().to_vec())),
        ]);
        if let Some(s_mask) = image.s_mask {
            dict.set("SMask", Reference(s_mask));
        }

        let mut stream = lopdf::Stream::new(dict, image.image_data);
        // Raw pixels compress well; a failure just leaves the stream uncompressed.
        let _ = stream.compress();
        stream
    }
}

impl From<ImageXObject> for lopdf::Object {
    fn from(image: ImageXObject) -> Self {
        lopdf::Object::Stream(image.into())
    }
}
