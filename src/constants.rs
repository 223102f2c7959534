/// BMP 文件头 (BITMAPFILEHEADER) 的固定大小 (字节)。
pub const FILE_HEADER_SIZE: usize = 14;

/// BMP 信息头 (BITMAPINFOHEADER) 的固定大小 (字节)。
pub const INFO_HEADER_SIZE: usize = 40;

/// 文件开头必须出现的签名 "BM"。
pub const BMP_SIGNATURE: [u8; 2] = *b"BM";

/// 输入图像唯一支持的位深度 (无压缩真彩色)。
pub const INPUT_BITS_PER_PIXEL: u16 = 24;

/// 输出图像的位深度 (8 位索引色)。
pub const OUTPUT_BITS_PER_PIXEL: u16 = 8;

/// 灰度调色板的条目数。
pub const PALETTE_ENTRIES: usize = 256;

/// 调色板中每个条目占用的字节数 (B, G, R, 保留)。
pub const PALETTE_ENTRY_SIZE: usize = 4;

/// 扫描行按此字节数对齐。
pub const ROW_ALIGNMENT: usize = 4;

/// `gray` 子命令默认要求的图像尺寸。
pub const GRAY_DEFAULT_WIDTH: u32 = 630;
pub const GRAY_DEFAULT_HEIGHT: u32 = 630;

/// `sobel` 子命令默认要求的图像尺寸。
pub const SOBEL_DEFAULT_WIDTH: u32 = 1247;
pub const SOBEL_DEFAULT_HEIGHT: u32 = 720;
