/// Errors produced when wrapping raw 8-bit buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image dimensions must be non-zero (width={width}, height={height})")]
    EmptyImage { width: usize, height: usize },
    #[error("row stride {stride} is smaller than the image width {width}")]
    InvalidStride { width: usize, stride: usize },
    #[error("image buffer too short (expected at least {expected} bytes, got {got})")]
    BufferTooShort { expected: usize, got: usize },
    #[error("packed image buffer must hold exactly {expected} bytes, got {got}")]
    BufferSizeMismatch { expected: usize, got: usize },
}

/// Borrowed single-channel 8-bit image.
///
/// Rows start every `stride` bytes; the `stride - width` trailing bytes of a
/// row are padding and never read.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> GrayImageView<'a> {
    /// Wrap a buffer whose rows may carry trailing padding.
    pub fn new(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        let view = Self {
            width,
            height,
            stride,
            data,
        };
        view.validate()?;
        Ok(view)
    }

    /// Check the invariants `new` enforces; useful for views built field by field.
    pub fn validate(&self) -> Result<(), ImageError> {
        let (width, height, stride) = (self.width, self.height, self.stride);
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage { width, height });
        }
        if stride < width {
            return Err(ImageError::InvalidStride { width, stride });
        }
        // The last row does not need its padding.
        let expected = stride * (height - 1) + width;
        if self.data.len() < expected {
            return Err(ImageError::BufferTooShort {
                expected,
                got: self.data.len(),
            });
        }
        Ok(())
    }

    /// Wrap a tightly packed buffer (`stride == width`).
    pub fn packed(width: usize, height: usize, data: &'a [u8]) -> Result<Self, ImageError> {
        Self::new(width, height, width, data)
    }

    /// Pixels of row `y`, without padding.
    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }
}

/// Owned, tightly packed single-channel 8-bit image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Create an image filled with `value`.
    pub fn new(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Take ownership of a packed buffer.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        GrayImageView::packed(width, height, &data)?;
        if data.len() != width * height {
            return Err(ImageError::BufferSizeMismatch {
                expected: width * height,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            stride: self.width,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Copy into a buffer with `padding` extra bytes per row, filled with `pad_value`.
    pub fn to_padded(&self, padding: usize, pad_value: u8) -> Vec<u8> {
        let stride = self.width + padding;
        let mut out = vec![pad_value; stride * self.height];
        for y in 0..self.height {
            let src = &self.data[y * self.width..(y + 1) * self.width];
            out[y * stride..y * stride + self.width].copy_from_slice(src);
        }
        out
    }
}
