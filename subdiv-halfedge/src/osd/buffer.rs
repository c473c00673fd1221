use crate::{Error, Result};

/// A typed, strided data array with a modified flag.
///
/// A `Buffer` stores `len` elements of `stride` bytes each. Storage is kept
/// as 32-bit words, so index buffers can be read as [`u32`] and attribute
/// buffers as [`f32`] without copying or `unsafe`. The stride must be a
/// non-zero multiple of four bytes.
///
/// Producers set the modified flag (every mutable accessor does so
/// implicitly); the [`Mesh`](crate::Mesh) consumes and clears it once the
/// state derived from the buffer has been rebuilt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Buffer {
    words: Vec<u32>,
    stride: usize,
    len: usize,
    modified: bool,
}

impl Buffer {
    /// Creates a zero-filled buffer of `len` elements with the given byte
    /// stride.
    pub fn new(stride: usize, len: usize) -> Result<Buffer> {
        check_stride(stride)?;
        Ok(Buffer {
            words: vec![0; len * stride / 4],
            stride,
            len,
            modified: true,
        })
    }

    /// Copies `len` elements of `stride` bytes, starting at byte `offset`,
    /// out of `bytes`.
    pub fn from_bytes(bytes: &[u8], offset: usize, stride: usize, len: usize) -> Result<Buffer> {
        if offset & 0x3 != 0 {
            return Err(Error::misaligned());
        }
        check_stride(stride)?;

        let byte_len = stride * len;
        if bytes.len() < offset + byte_len {
            return Err(Error::InvalidBufferSize {
                expected: offset + byte_len,
                actual: bytes.len(),
            });
        }

        let mut buffer = Buffer::new(stride, len)?;
        bytemuck::cast_slice_mut::<u32, u8>(&mut buffer.words)
            .copy_from_slice(&bytes[offset..offset + byte_len]);
        Ok(buffer)
    }

    /// One [`u32`] per element, e.g. an index or face-size buffer.
    pub fn from_u32(data: &[u32]) -> Buffer {
        Buffer {
            words: data.to_vec(),
            stride: 4,
            len: data.len(),
            modified: true,
        }
    }

    /// `floats_per_element` [`f32`]s per element, e.g. a vertex buffer.
    pub fn from_f32(data: &[f32], floats_per_element: usize) -> Result<Buffer> {
        if floats_per_element == 0 {
            return Err(Error::InvalidOperation(
                "buffer stride must not be zero".to_string(),
            ));
        }
        if data.len() % floats_per_element != 0 {
            return Err(Error::InvalidBufferSize {
                expected: data.len().next_multiple_of(floats_per_element),
                actual: data.len(),
            });
        }
        Ok(Buffer {
            words: bytemuck::cast_slice(data).to_vec(),
            stride: floats_per_element * 4,
            len: data.len() / floats_per_element,
            modified: true,
        })
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the element stride in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    #[inline]
    fn words_per_element(&self) -> usize {
        self.stride / 4
    }

    /// Returns the raw words of element `index`.
    #[inline]
    pub fn element(&self, index: usize) -> Option<&[u32]> {
        if index >= self.len {
            return None;
        }
        let w = self.words_per_element();
        self.words.get(index * w..(index + 1) * w)
    }

    /// Returns element `index` as floats.
    #[inline]
    pub fn floats(&self, index: usize) -> Option<&[f32]> {
        self.element(index).map(bytemuck::cast_slice)
    }

    /// Returns the first word of element `index` as an unsigned integer.
    #[inline]
    pub fn u32_at(&self, index: usize) -> Option<u32> {
        self.element(index).and_then(|e| e.first().copied())
    }

    /// Returns the first two words of element `index`, e.g. the vertex pair
    /// of an edge crease.
    #[inline]
    pub fn u32_pair_at(&self, index: usize) -> Option<(u32, u32)> {
        match self.element(index)? {
            [a, b, ..] => Some((*a, *b)),
            _ => None,
        }
    }

    /// Returns the first word of element `index` as a float.
    #[inline]
    pub fn f32_at(&self, index: usize) -> Option<f32> {
        self.floats(index).and_then(|e| e.first().copied())
    }

    /// Returns the first three floats of element `index`.
    #[inline]
    pub fn position(&self, index: usize) -> Option<[f32; 3]> {
        match self.floats(index)? {
            [x, y, z, ..] => Some([*x, *y, *z]),
            _ => None,
        }
    }

    /// Returns the whole buffer as bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Returns the whole buffer as floats.
    #[inline]
    pub fn as_f32(&self) -> &[f32] {
        bytemuck::cast_slice(&self.words)
    }

    /// Returns the whole buffer as words.
    #[inline]
    pub fn as_u32(&self) -> &[u32] {
        &self.words
    }

    /// Mutable access to the bytes. Marks the buffer modified.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.modified = true;
        bytemuck::cast_slice_mut(&mut self.words)
    }

    /// Mutable access to the words. Marks the buffer modified.
    #[inline]
    pub fn as_u32_mut(&mut self) -> &mut [u32] {
        self.modified = true;
        &mut self.words
    }

    /// Mutable access to the floats. Marks the buffer modified.
    #[inline]
    pub fn as_f32_mut(&mut self) -> &mut [f32] {
        self.modified = true;
        bytemuck::cast_slice_mut(&mut self.words)
    }
}

fn check_stride(stride: usize) -> Result<()> {
    if stride & 0x3 != 0 {
        return Err(Error::misaligned());
    }
    if stride == 0 {
        return Err(Error::InvalidOperation(
            "buffer stride must not be zero".to_string(),
        ));
    }
    Ok(())
}
