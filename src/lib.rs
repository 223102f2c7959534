//! # bmp_gray 库
//!
//! 本库包含 BMP 灰度转换、Sobel 边缘检测与十六进制存储器文件导出的核心逻辑。

// 声明库包含的所有模块。

pub mod bitmap;
pub mod cli;
pub mod constants;
pub mod filter;
pub mod handler;
pub mod hexmem;
