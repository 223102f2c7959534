//! # 命令行接口模块
//!
//! 使用 `clap` 定义了程序的命令行结构，包括子命令和参数。
//! 图像尺寸与输出路径都是运行时参数，默认值沿用两个子命令各自的固定尺寸。

use crate::constants::{
    GRAY_DEFAULT_HEIGHT, GRAY_DEFAULT_WIDTH, SOBEL_DEFAULT_HEIGHT, SOBEL_DEFAULT_WIDTH,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// 将 24 位 BMP 图像转换为 8 位灰度 BMP，可选 Sobel 边缘检测，并导出十六进制存储器文件。
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "将 24 位 BMP 图像转换为 8 位灰度 BMP，可选 Sobel 边缘检测，并导出供硬件仿真使用的十六进制存储器 (.mem) 文件。"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令：gray (灰度) 和 sobel (灰度 + 边缘检测)。
#[derive(Parser, Debug)]
pub enum Commands {
    /// 生成灰度 BMP 和十六进制存储器文件。
    Gray(GrayArgs),

    /// 生成灰度 BMP、Sobel 边缘 BMP 和十六进制存储器文件。
    Sobel(SobelArgs),
}

/// 'gray' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct GrayArgs {
    /// 输入的 24 位无压缩 BMP 图像路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 要求的图像宽度 (像素)，与文件不符时报错。
    #[arg(long, default_value_t = GRAY_DEFAULT_WIDTH)]
    pub width: u32,

    /// 要求的图像高度 (像素)，与文件不符时报错。
    #[arg(long, default_value_t = GRAY_DEFAULT_HEIGHT)]
    pub height: u32,

    /// 灰度 BMP 的输出路径。默认为输入文件旁的 `output_<名称>.bmp`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 十六进制存储器文件的输出路径。默认为输入文件旁的 `output_<名称>.mem`。
    #[arg(short, long)]
    pub mem: Option<PathBuf>,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 'sobel' 命令所需的参数。
#[derive(Parser, Debug)]
pub struct SobelArgs {
    /// 输入的 24 位无压缩 BMP 图像路径。
    #[arg(short, long)]
    pub image: PathBuf,

    /// 要求的图像宽度 (像素)，与文件不符时报错。
    #[arg(long, default_value_t = SOBEL_DEFAULT_WIDTH)]
    pub width: u32,

    /// 要求的图像高度 (像素)，与文件不符时报错。
    #[arg(long, default_value_t = SOBEL_DEFAULT_HEIGHT)]
    pub height: u32,

    /// 灰度 BMP 的输出路径。默认为输入文件旁的 `output_<名称>.bmp`。
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// 边缘检测 BMP 的输出路径。默认为输入文件旁的 `output_<名称>_edge.bmp`。
    #[arg(short, long)]
    pub edge: Option<PathBuf>,

    /// 十六进制存储器文件的输出路径。默认为输入文件旁的 `output_<名称>.mem`。
    #[arg(short, long)]
    pub mem: Option<PathBuf>,

    /// 写入十六进制存储器文件的缓冲区。
    #[arg(long, value_enum, default_value_t = MemSource::Gray)]
    pub mem_source: MemSource,

    /// 覆盖已存在的输出文件。
    #[arg(short, long)]
    pub force: bool,
}

/// 十六进制存储器文件的数据来源。
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemSource {
    /// 灰度缓冲区。
    #[default]
    Gray,
    /// 边缘幅值缓冲区。
    Edge,
}
