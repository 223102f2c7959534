//! # BMP 编解码模块
//!
//! 按字节逐字段读写 14 字节文件头与 40 字节信息头 (小端序, 字段间无填充)，
//! 将 24 位无压缩 BMP 解码为内存中的像素缓冲区，并把单字节缓冲区编码为
//! 带 256 级灰度调色板的 8 位索引 BMP。
//!
//! 内存中的缓冲区始终按自上而下、从左到右的顺序存放；BMP 文件中的行顺序
//! (自下而上) 只在解码与编码时处理。

use crate::constants::{
    BMP_SIGNATURE, FILE_HEADER_SIZE, INFO_HEADER_SIZE, INPUT_BITS_PER_PIXEL,
    OUTPUT_BITS_PER_PIXEL, PALETTE_ENTRIES, PALETTE_ENTRY_SIZE, ROW_ALIGNMENT,
};
use std::fmt;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use thiserror::Error;
use tracing::debug;

/// 解码或编码 BMP 时可能出现的错误。
#[derive(Error, Debug)]
pub enum BmpError {
    #[error("Invalid BMP signature: expected \"BM\", found {found:02X?}")]
    Format { found: [u8; 2] },

    #[error("Unsupported bit depth: {bits} bits per pixel (expected {expected})")]
    UnsupportedFormat { bits: u16, expected: u16 },

    #[error("Image size is not {expected} (found {width}x{height})")]
    DimensionMismatch {
        expected: Dimensions,
        width: i32,
        height: i32,
    },

    #[error("Invalid image size in header: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("Unexpected end of file while reading {section}")]
    Truncated { section: &'static str },

    #[error("Failed to allocate {bytes} bytes for the {purpose} buffer")]
    Allocation { bytes: usize, purpose: &'static str },

    #[error("Image {dims} is too large for an 8-bit BMP file")]
    TooLarge { dims: Dimensions },

    #[error("Buffer holds {actual} pixels but the image needs {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// 图像的宽和高 (像素)。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 像素总数，即每个单字节缓冲区的长度。
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn matches(&self, width: i32, height: i32) -> bool {
        i64::from(width) == i64::from(self.width) && i64::from(height) == i64::from(self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 14 字节的 BITMAPFILEHEADER。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub signature: [u8; 2],
    pub file_size: u32,
    pub reserved1: u16,
    pub reserved2: u16,
    pub pixel_offset: u32,
}

impl FileHeader {
    fn from_bytes(b: &[u8; FILE_HEADER_SIZE]) -> Self {
        Self {
            signature: [b[0], b[1]],
            file_size: u32::from_le_bytes([b[2], b[3], b[4], b[5]]),
            reserved1: u16::from_le_bytes([b[6], b[7]]),
            reserved2: u16::from_le_bytes([b[8], b[9]]),
            pixel_offset: u32::from_le_bytes([b[10], b[11], b[12], b[13]]),
        }
    }

    fn to_bytes(self) -> [u8; FILE_HEADER_SIZE] {
        let mut b = [0; FILE_HEADER_SIZE];
        b[0..2].copy_from_slice(&self.signature);
        b[2..6].copy_from_slice(&self.file_size.to_le_bytes());
        b[6..8].copy_from_slice(&self.reserved1.to_le_bytes());
        b[8..10].copy_from_slice(&self.reserved2.to_le_bytes());
        b[10..14].copy_from_slice(&self.pixel_offset.to_le_bytes());
        b
    }
}

/// 40 字节的 BITMAPINFOHEADER。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoHeader {
    pub header_size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pixels_per_meter: i32,
    pub y_pixels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
}

impl InfoHeader {
    fn from_bytes(b: &[u8; INFO_HEADER_SIZE]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        let i32_at = |i: usize| i32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        Self {
            header_size: u32_at(0),
            width: i32_at(4),
            height: i32_at(8),
            planes: u16_at(12),
            bits_per_pixel: u16_at(14),
            compression: u32_at(16),
            image_size: u32_at(20),
            x_pixels_per_meter: i32_at(24),
            y_pixels_per_meter: i32_at(28),
            colors_used: u32_at(32),
            colors_important: u32_at(36),
        }
    }

    fn to_bytes(self) -> [u8; INFO_HEADER_SIZE] {
        let mut b = [0; INFO_HEADER_SIZE];
        b[0..4].copy_from_slice(&self.header_size.to_le_bytes());
        b[4..8].copy_from_slice(&self.width.to_le_bytes());
        b[8..12].copy_from_slice(&self.height.to_le_bytes());
        b[12..14].copy_from_slice(&self.planes.to_le_bytes());
        b[14..16].copy_from_slice(&self.bits_per_pixel.to_le_bytes());
        b[16..20].copy_from_slice(&self.compression.to_le_bytes());
        b[20..24].copy_from_slice(&self.image_size.to_le_bytes());
        b[24..28].copy_from_slice(&self.x_pixels_per_meter.to_le_bytes());
        b[28..32].copy_from_slice(&self.y_pixels_per_meter.to_le_bytes());
        b[32..36].copy_from_slice(&self.colors_used.to_le_bytes());
        b[36..40].copy_from_slice(&self.colors_important.to_le_bytes());
        b
    }
}

/// 成对出现的文件头与信息头。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headers {
    pub file: FileHeader,
    pub info: InfoHeader,
}

impl Headers {
    /// 由已校验的 24 位输入头派生 8 位灰度输出头。
    ///
    /// 保留字段、色彩平面、压缩方式与分辨率沿用输入值；文件大小、像素数据偏移、
    /// 位深度、图像数据大小与调色板颜色数按新格式重新计算。
    ///
    /// 文件大小超出 `u32` 范围时返回 [`BmpError::TooLarge`]。
    pub fn indexed(&self, dims: Dimensions) -> Result<Self, BmpError> {
        let too_large = || BmpError::TooLarge { dims };
        let pixel_offset = (FILE_HEADER_SIZE + INFO_HEADER_SIZE + palette_size()) as u32;
        let image_size = indexed_row_size(dims.width as usize)
            .checked_mul(dims.height as usize)
            .and_then(|size| u32::try_from(size).ok())
            .ok_or_else(too_large)?;
        let file_size = pixel_offset.checked_add(image_size).ok_or_else(too_large)?;

        Ok(Self {
            file: FileHeader {
                file_size,
                pixel_offset,
                ..self.file
            },
            info: InfoHeader {
                header_size: INFO_HEADER_SIZE as u32,
                bits_per_pixel: OUTPUT_BITS_PER_PIXEL,
                image_size,
                colors_used: PALETTE_ENTRIES as u32,
                colors_important: PALETTE_ENTRIES as u32,
                ..self.info
            },
        })
    }
}

/// 一个 24 位像素，按文件中的 B, G, R 顺序存放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bgr {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
}

impl Bgr {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { blue, green, red }
    }
}

/// 解码后的 24 位图像。
#[derive(Debug, Clone)]
pub struct RgbBitmap {
    pub headers: Headers,
    pub dimensions: Dimensions,
    /// 自上而下的 `width * height` 个像素。
    pub pixels: Vec<Bgr>,
}

/// 解码后的 8 位索引图像。
#[derive(Debug, Clone)]
pub struct IndexedBitmap {
    pub headers: Headers,
    pub dimensions: Dimensions,
    /// 调色板条目 (B, G, R, 保留)。
    pub palette: Vec<[u8; PALETTE_ENTRY_SIZE]>,
    /// 自上而下的 `width * height` 个调色板索引。
    pub pixels: Vec<u8>,
}

/// 每条扫描行末尾需要补齐的字节数。
pub fn row_padding(row_bytes: usize) -> usize {
    (ROW_ALIGNMENT - row_bytes % ROW_ALIGNMENT) % ROW_ALIGNMENT
}

fn indexed_row_size(width: usize) -> usize {
    width.saturating_add(row_padding(width))
}

fn palette_size() -> usize {
    PALETTE_ENTRIES * PALETTE_ENTRY_SIZE
}

/// 生成 256 级灰度调色板，第 i 项为 (i, i, i, 0)。
pub fn grayscale_palette() -> impl Iterator<Item = [u8; PALETTE_ENTRY_SIZE]> {
    (0..=u8::MAX).map(|i| [i, i, i, 0])
}

/// 以可失败的方式分配缓冲区，分配失败时返回 [`BmpError::Allocation`] 而不是中止进程。
pub fn alloc_buffer<T: Clone>(len: usize, fill: T, purpose: &'static str) -> Result<Vec<T>, BmpError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| BmpError::Allocation {
        bytes: len.saturating_mul(size_of::<T>()),
        purpose,
    })?;
    buf.resize(len, fill);
    Ok(buf)
}

fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    section: &'static str,
) -> Result<(), BmpError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => BmpError::Truncated { section },
        _ => BmpError::Io(e),
    })
}

/// 读取并校验签名，然后读取两个头部。签名不匹配时不会再读取任何后续字节。
fn read_headers<R: Read>(reader: &mut R) -> Result<Headers, BmpError> {
    let mut file_bytes = [0u8; FILE_HEADER_SIZE];
    read_exact_or_truncated(reader, &mut file_bytes[..2], "file signature")?;
    let found = [file_bytes[0], file_bytes[1]];
    if found != BMP_SIGNATURE {
        return Err(BmpError::Format { found });
    }
    read_exact_or_truncated(reader, &mut file_bytes[2..], "file header")?;

    let mut info_bytes = [0u8; INFO_HEADER_SIZE];
    read_exact_or_truncated(reader, &mut info_bytes, "info header")?;

    Ok(Headers {
        file: FileHeader::from_bytes(&file_bytes),
        info: InfoHeader::from_bytes(&info_bytes),
    })
}

/// 将 24 位无压缩 BMP 解码为自上而下的像素缓冲区。
///
/// 校验顺序依次为：签名、位深度、尺寸。图像尺寸必须与 `expected` 完全一致，
/// 解码器从不根据文件自动调整尺寸。
///
/// # Errors
///
/// * [`BmpError::Format`] - 前两个字节不是 "BM"。
/// * [`BmpError::UnsupportedFormat`] - 位深度不是 24。
/// * [`BmpError::DimensionMismatch`] - 宽或高与 `expected` 不同。
/// * [`BmpError::Truncated`] - 头部或像素数据不完整。
/// * [`BmpError::Allocation`] - 无法分配像素缓冲区。
pub fn decode<R: Read + Seek>(reader: &mut R, expected: Dimensions) -> Result<RgbBitmap, BmpError> {
    let headers = read_headers(reader)?;

    if headers.info.bits_per_pixel != INPUT_BITS_PER_PIXEL {
        return Err(BmpError::UnsupportedFormat {
            bits: headers.info.bits_per_pixel,
            expected: INPUT_BITS_PER_PIXEL,
        });
    }

    if !expected.matches(headers.info.width, headers.info.height) {
        return Err(BmpError::DimensionMismatch {
            expected,
            width: headers.info.width,
            height: headers.info.height,
        });
    }

    let width = expected.width as usize;
    let height = expected.height as usize;
    let padding = row_padding(width * 3);
    debug!(%expected, padding, offset = headers.file.pixel_offset, "decoding 24-bit pixel data");

    let mut pixels = alloc_buffer(expected.pixel_count(), Bgr::default(), "pixel")?;
    // 连同行尾填充一次读入整行，只使用前 width * 3 字节。
    let mut row = alloc_buffer(width * 3 + padding, 0u8, "scanline")?;

    reader.seek(SeekFrom::Start(u64::from(headers.file.pixel_offset)))?;

    // 文件中的第一行是图像最底部的一行。
    for file_row in 0..height {
        read_exact_or_truncated(reader, &mut row, "pixel data")?;
        let y = height - 1 - file_row;
        for (pixel, bgr) in pixels[y * width..(y + 1) * width]
            .iter_mut()
            .zip(row[..width * 3].chunks_exact(3))
        {
            *pixel = Bgr {
                blue: bgr[0],
                green: bgr[1],
                red: bgr[2],
            };
        }
    }

    Ok(RgbBitmap {
        headers,
        dimensions: expected,
        pixels,
    })
}

/// 把单字节缓冲区写成带灰度调色板的 8 位 BMP。
///
/// `headers` 是输入图像的头部，输出头由 [`Headers::indexed`] 派生。
/// 行按自下而上的顺序写出，每行末尾补 0 到 4 字节对齐。
pub fn write_indexed<W: Write>(
    writer: &mut W,
    headers: &Headers,
    dims: Dimensions,
    buffer: &[u8],
) -> Result<(), BmpError> {
    if buffer.len() != dims.pixel_count() {
        return Err(BmpError::BufferSize {
            expected: dims.pixel_count(),
            actual: buffer.len(),
        });
    }

    let out = headers.indexed(dims)?;
    writer.write_all(&out.file.to_bytes())?;
    writer.write_all(&out.info.to_bytes())?;
    for entry in grayscale_palette() {
        writer.write_all(&entry)?;
    }

    let width = dims.width as usize;
    let padding = [0u8; ROW_ALIGNMENT];
    let padding = &padding[..row_padding(width)];
    if width > 0 {
        for row in buffer.chunks_exact(width).rev() {
            writer.write_all(row)?;
            writer.write_all(padding)?;
        }
    }
    Ok(())
}

/// 在内存中编码出完整的 8 位 BMP 文件。
pub fn encode_indexed(headers: &Headers, dims: Dimensions, buffer: &[u8]) -> Result<Vec<u8>, BmpError> {
    let total = headers.indexed(dims)?.file.file_size as usize;
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(total).map_err(|_| BmpError::Allocation {
        bytes: total,
        purpose: "encoded image",
    })?;
    write_indexed(&mut bytes, headers, dims, buffer)?;
    Ok(bytes)
}

/// 解码 8 位索引 BMP，读出头部、调色板和像素索引。
///
/// 调色板条目数取自 `colors_used`，为 0 时按 256 处理。
pub fn read_indexed<R: Read + Seek>(reader: &mut R) -> Result<IndexedBitmap, BmpError> {
    let headers = read_headers(reader)?;

    if headers.info.bits_per_pixel != OUTPUT_BITS_PER_PIXEL {
        return Err(BmpError::UnsupportedFormat {
            bits: headers.info.bits_per_pixel,
            expected: OUTPUT_BITS_PER_PIXEL,
        });
    }

    let (Ok(width), Ok(height)) = (
        u32::try_from(headers.info.width),
        u32::try_from(headers.info.height),
    ) else {
        return Err(BmpError::InvalidDimensions {
            width: headers.info.width,
            height: headers.info.height,
        });
    };
    let dimensions = Dimensions::new(width, height);

    let entries = match headers.info.colors_used {
        0 => PALETTE_ENTRIES,
        n => (n as usize).min(PALETTE_ENTRIES),
    };
    reader.seek(SeekFrom::Start(
        (FILE_HEADER_SIZE as u64) + u64::from(headers.info.header_size),
    ))?;
    let mut palette = Vec::with_capacity(entries);
    for _ in 0..entries {
        let mut entry = [0u8; PALETTE_ENTRY_SIZE];
        read_exact_or_truncated(reader, &mut entry, "palette")?;
        palette.push(entry);
    }

    let width = width as usize;
    let height = height as usize;
    let row_size = indexed_row_size(width);
    let mut pixels = alloc_buffer(dimensions.pixel_count(), 0u8, "index")?;
    let mut row = alloc_buffer(row_size, 0u8, "scanline")?;

    reader.seek(SeekFrom::Start(u64::from(headers.file.pixel_offset)))?;
    for file_row in 0..height {
        read_exact_or_truncated(reader, &mut row, "pixel data")?;
        let y = height - 1 - file_row;
        pixels[y * width..(y + 1) * width].copy_from_slice(&row[..width]);
    }

    Ok(IndexedBitmap {
        headers,
        dimensions,
        palette,
        pixels,
    })
}
