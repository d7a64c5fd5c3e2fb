//! Column-run Patch Model
//!
//! A patch is a sprite-like image stored column by column. Each column is a
//! list of opaque vertical runs ("posts"); everything between posts is a hole.
//!
//! # Lump Layout
//! ```text
//! i16 width, i16 height, i16 left_offset, i16 top_offset   (little-endian)
//! u32 column_offsets[width]
//! per column: { u8 top_delta, u8 length, u8 pad, u8 pixels[length], u8 pad }* 0xFF
//! ```
//! Tall patches reuse `top_delta`: a value not greater than the previous
//! post's top is relative to it.
//!
//! Two other encodings are turned into patches here: PNG images (recognized by
//! signature) and raw flats.

use image::RgbaImage;
use smallvec::SmallVec;

use crate::asset::LumpNum;
use crate::error::{CacheError, Result};
use crate::texture::Palette;

const HEADER_SIZE: usize = 8;
const COLUMN_END: u8 = 0xFF;
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Alpha below this becomes a hole when converting truecolor images.
const PNG_ALPHA_THRESHOLD: u8 = 0x80;

/// One opaque vertical run of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Post {
    pub top_delta: i32,
    pub length: i32,
    /// Offset of the run's first pixel in [`Column::pixels`].
    pub data_offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
    pub posts: SmallVec<[Post; 2]>,
    pub pixels: Vec<u8>,
}

impl Column {
    /// Build a column from per-row optional palette indices; `None` is a hole.
    pub fn from_rows(rows: impl IntoIterator<Item = Option<u8>>) -> Self {
        let mut column = Column::default();
        let mut open: Option<Post> = None;

        for (y, texel) in rows.into_iter().enumerate() {
            match texel {
                Some(texel) => {
                    if let Some(post) = open.as_mut() {
                        post.length += 1;
                    } else {
                        open = Some(Post {
                            top_delta: y as i32,
                            length: 1,
                            data_offset: column.pixels.len(),
                        });
                    }
                    column.pixels.push(texel);
                }
                None => {
                    if let Some(post) = open.take() {
                        column.posts.push(post);
                    }
                }
            }
        }
        if let Some(post) = open {
            column.posts.push(post);
        }
        column
    }

    /// Pixels of one post.
    #[inline]
    pub fn post_pixels(&self, post: &Post) -> &[u8] {
        let end = (post.data_offset + post.length.max(0) as usize).min(self.pixels.len());
        &self.pixels[post.data_offset.min(end)..end]
    }
}

/// A decoded patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub width: i32,
    pub height: i32,
    pub left_offset: i32,
    pub top_offset: i32,
    pub columns: Vec<Column>,
}

pub fn is_png(data: &[u8]) -> bool {
    data.len() >= PNG_SIGNATURE.len() && data[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

fn read_i16(data: &[u8], at: usize) -> i32 {
    i16::from_le_bytes([data[at], data[at + 1]]) as i32
}

/// Longest run and highest absolute top a post header can hold.
const MAX_POST_LENGTH: usize = 254;
const MAX_ABSOLUTE_TOP: i32 = 254;

fn push_post(data: &mut Vec<u8>, encoded_top: i32, pixels: &[u8]) {
    data.push(encoded_top as u8);
    data.push(pixels.len() as u8);
    data.push(0);
    data.extend_from_slice(pixels);
    data.push(0);
}

/// Append one post starting at row `top`; returns the decoder's new
/// reference row.
fn write_post(data: &mut Vec<u8>, mut prev: i32, top: i32, pixels: &[u8]) -> i32 {
    if top <= MAX_ABSOLUTE_TOP && top > prev {
        push_post(data, top, pixels);
        return top;
    }

    // A relative delta may not exceed the reference row or a byte.
    while top - prev > prev.min(MAX_ABSOLUTE_TOP) {
        push_post(data, MAX_ABSOLUTE_TOP, &[]);
        prev = if prev < MAX_ABSOLUTE_TOP {
            MAX_ABSOLUTE_TOP
        } else {
            prev + MAX_ABSOLUTE_TOP
        };
    }
    push_post(data, top - prev, pixels);
    top
}

impl Patch {
    /// Decode a lump, dispatching on the PNG signature.
    pub fn decode(lump: LumpNum, data: &[u8], palette: &Palette) -> Result<Self> {
        if is_png(data) {
            Self::from_png(lump, data, palette)
        } else {
            Self::from_lump(lump, data)
        }
    }

    /// Parse the column-run lump layout.
    pub fn from_lump(lump: LumpNum, data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(CacheError::malformed(lump, "lump shorter than patch header"));
        }

        let width = read_i16(data, 0);
        let height = read_i16(data, 2);
        let left_offset = read_i16(data, 4);
        let top_offset = read_i16(data, 6);

        if width < 0 || height < 0 {
            return Err(CacheError::malformed(
                lump,
                format!("negative dimensions {}x{}", width, height),
            ));
        }

        let table_end = HEADER_SIZE + width as usize * 4;
        if data.len() < table_end {
            return Err(CacheError::malformed(lump, "column offset table truncated"));
        }

        let mut columns = Vec::with_capacity(width as usize);
        for x in 0..width as usize {
            let at = HEADER_SIZE + x * 4;
            let offset = u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize;
            columns.push(Self::read_column(lump, data, offset, x)?);
        }

        Ok(Self {
            width,
            height,
            left_offset,
            top_offset,
            columns,
        })
    }

    fn read_column(lump: LumpNum, data: &[u8], mut offset: usize, x: usize) -> Result<Column> {
        let mut column = Column::default();
        let mut prev_delta = -1i32;

        loop {
            let Some(&top) = data.get(offset) else {
                return Err(CacheError::malformed(lump, format!("column {} runs past end of lump", x)));
            };
            if top == COLUMN_END {
                break;
            }
            let Some(&length) = data.get(offset + 1) else {
                return Err(CacheError::malformed(lump, format!("column {} post header truncated", x)));
            };

            let mut top_delta = top as i32;
            if top_delta <= prev_delta {
                top_delta += prev_delta;
            }
            prev_delta = top_delta;

            let start = offset + 3;
            let end = start + length as usize;
            let Some(pixels) = data.get(start..end) else {
                return Err(CacheError::malformed(lump, format!("column {} post data truncated", x)));
            };

            column.posts.push(Post {
                top_delta,
                length: length as i32,
                data_offset: column.pixels.len(),
            });
            column.pixels.extend_from_slice(pixels);
            offset = end + 1;
        }

        Ok(column)
    }

    /// Convert an embedded PNG, mapping colors to the nearest palette entry.
    pub fn from_png(lump: LumpNum, data: &[u8], palette: &Palette) -> Result<Self> {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|source| CacheError::Png { lump, source })?
            .to_rgba8();
        Ok(Self::from_rgba(&image, palette))
    }

    pub fn from_rgba(image: &RgbaImage, palette: &Palette) -> Self {
        let (width, height) = image.dimensions();
        let columns = (0..width)
            .map(|x| {
                Column::from_rows((0..height).map(|y| {
                    let px = image.get_pixel(x, y);
                    (px[3] >= PNG_ALPHA_THRESHOLD).then(|| palette.nearest_color(px[0], px[1], px[2]))
                }))
            })
            .collect();

        Self {
            width: width as i32,
            height: height as i32,
            left_offset: 0,
            top_offset: 0,
            columns,
        }
    }

    /// Convert a row-major flat. Pixels equal to `transparent_index` become holes.
    pub fn from_flat(data: &[u8], width: i32, height: i32, transparent_index: Option<u8>) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let columns = (0..width as usize)
            .map(|x| {
                Column::from_rows((0..height as usize).map(|y| {
                    data.get(y * width as usize + x)
                        .copied()
                        .filter(|&texel| Some(texel) != transparent_index)
                }))
            })
            .collect();

        Self {
            width,
            height,
            left_offset: 0,
            top_offset: 0,
            columns,
        }
    }

    /// Encode into the column-run lump layout.
    ///
    /// Runs longer than a post allows are split, and posts starting past row
    /// 254 use relative top deltas, with empty posts as stepping stones.
    pub fn to_lump(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [self.width, self.height, self.left_offset, self.top_offset] {
            data.extend_from_slice(&(v as i16).to_le_bytes());
        }
        let table_at = data.len();
        data.resize(table_at + self.columns.len() * 4, 0);

        for (x, column) in self.columns.iter().enumerate() {
            let offset = data.len() as u32;
            data[table_at + x * 4..table_at + x * 4 + 4].copy_from_slice(&offset.to_le_bytes());

            let mut prev = -1i32;
            for post in &column.posts {
                let pixels = column.post_pixels(post);
                for (i, chunk) in pixels.chunks(MAX_POST_LENGTH).enumerate() {
                    let top = post.top_delta + (i * MAX_POST_LENGTH) as i32;
                    prev = write_post(&mut data, prev, top, chunk);
                }
            }
            data.push(COLUMN_END);
        }
        data
    }

    #[inline]
    pub fn column(&self, x: i32) -> Option<&Column> {
        usize::try_from(x).ok().and_then(|x| self.columns.get(x))
    }
}
