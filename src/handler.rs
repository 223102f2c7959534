//! # 命令处理逻辑模块
//!
//! 包含处理 `gray` 和 `sobel` 子命令的高级业务逻辑。
//! 本模块负责把命令行参数整理为 [`PipelineConfig`]，协调文件 I/O、调用编解码与滤波函数，
//! 并向用户报告结果。
//!
//! 所有输出都先在内存中生成；只有在解码、转换和编码全部成功之后才会写出。
//! 写出时先落到临时文件，全部写入成功后才替换目标文件，失败时已有文件保持原样。

use crate::bitmap::{self, Dimensions, RgbBitmap};
use crate::cli::{GrayArgs, MemSource, SobelArgs};
use crate::filter;
use crate::hexmem;
use anyhow::{Context, Result};
use colored::Colorize;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// 一次转换所需的全部运行时配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub expected: Dimensions,
    pub gray_output: PathBuf,
    /// 为 `Some` 时执行 Sobel 边缘检测并写出边缘 BMP。
    pub edge_output: Option<PathBuf>,
    pub mem_output: PathBuf,
    pub mem_source: MemSource,
    pub force: bool,
}

impl From<GrayArgs> for PipelineConfig {
    fn from(args: GrayArgs) -> Self {
        let gray_output = args
            .dest
            .unwrap_or_else(|| default_output(&args.image, "", "bmp"));
        let mem_output = args
            .mem
            .unwrap_or_else(|| default_output(&args.image, "", "mem"));
        Self {
            expected: Dimensions::new(args.width, args.height),
            input: args.image,
            gray_output,
            edge_output: None,
            mem_output,
            mem_source: MemSource::Gray,
            force: args.force,
        }
    }
}

impl From<SobelArgs> for PipelineConfig {
    fn from(args: SobelArgs) -> Self {
        let gray_output = args
            .dest
            .unwrap_or_else(|| default_output(&args.image, "", "bmp"));
        let edge_output = args
            .edge
            .unwrap_or_else(|| default_output(&args.image, "_edge", "bmp"));
        let mem_output = args
            .mem
            .unwrap_or_else(|| default_output(&args.image, "", "mem"));
        Self {
            expected: Dimensions::new(args.width, args.height),
            input: args.image,
            gray_output,
            edge_output: Some(edge_output),
            mem_output,
            mem_source: args.mem_source,
            force: args.force,
        }
    }
}

/// 在输入文件所在目录生成默认输出路径：`output_<名称><后缀>.<扩展名>`。
fn default_output(input: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("output_{stem}{suffix}.{extension}"))
}

/// 处理 'Gray' 命令的执行逻辑。
///
/// # Errors
///
/// 见 [`run_pipeline`]。
pub fn handle_gray(args: GrayArgs) -> Result<()> {
    run_pipeline(&PipelineConfig::from(args)).map(|_| ())
}

/// 处理 'Sobel' 命令的执行逻辑。
///
/// # Errors
///
/// 见 [`run_pipeline`]。
pub fn handle_sobel(args: SobelArgs) -> Result<()> {
    run_pipeline(&PipelineConfig::from(args)).map(|_| ())
}

/// 执行完整的 读取 → 校验 → 灰度化 → (边缘检测) → 编码 → 写出 流程。
///
/// 返回按写出顺序排列的输出文件路径。
///
/// # Errors
///
/// 如果发生以下任一情况，将返回错误：
/// * 某个输出文件已存在且未指定 `--force`。
/// * 无法打开输入图像文件。
/// * 输入文件签名、位深度或尺寸不符合要求，或文件不完整。
/// * 无法分配图像缓冲区。
/// * 无法写入某个输出文件 (此时不会改动任何已有的输出文件)。
pub fn run_pipeline(config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let outputs = output_paths(config);
    for path in &outputs {
        anyhow::ensure!(
            config.force || !path.exists(),
            "Output file already exists: {}. \nUse --force to overwrite it.",
            path.to_string_lossy().red().bold()
        );
    }

    let bitmap = read_input(config)?;
    let dims = bitmap.dimensions;

    println!("Input image: {}", config.input.to_string_lossy().green().bold());
    println!("- Size: {dims}");
    println!("- Bit depth: {}", bitmap.headers.info.bits_per_pixel);
    println!("- File size: {} bytes", bitmap.headers.file.file_size);

    let gray = filter::grayscale(&bitmap.pixels).context("Grayscale conversion failed")?;
    info!(pixels = gray.len(), "grayscale buffer ready");

    let edges = match config.edge_output {
        Some(_) => {
            println!("Detecting edges...");
            Some(filter::sobel(&gray, dims).context("Edge detection failed")?)
        }
        None => None,
    };

    let mut encoded = Vec::with_capacity(outputs.len());
    let gray_bmp = bitmap::encode_indexed(&bitmap.headers, dims, &gray)
        .context("Failed to encode the grayscale image")?;
    encoded.push((config.gray_output.as_path(), gray_bmp));

    if let (Some(path), Some(edges)) = (&config.edge_output, &edges) {
        let edge_bmp = bitmap::encode_indexed(&bitmap.headers, dims, edges)
            .context("Failed to encode the edge image")?;
        encoded.push((path.as_path(), edge_bmp));
    }

    let mem_buffer = match (config.mem_source, &edges) {
        (MemSource::Edge, Some(edges)) => edges.as_slice(),
        (MemSource::Edge, None) => {
            warn!("edge buffer requested for the memory file but edge detection is off");
            gray.as_slice()
        }
        (MemSource::Gray, _) => gray.as_slice(),
    };
    encoded.push((config.mem_output.as_path(), hexmem::to_hex_text(mem_buffer)));

    write_outputs(&encoded)?;

    println!("\n{}", "Conversion complete!".green().bold());
    println!(
        "Grayscale 8-bit BMP: {}",
        config.gray_output.to_string_lossy().green().bold()
    );
    if let Some(path) = &config.edge_output {
        println!("Edge BMP: {}", path.to_string_lossy().green().bold());
    }
    println!(
        "Memory file: {}",
        config.mem_output.to_string_lossy().green().bold()
    );

    Ok(outputs)
}

fn output_paths(config: &PipelineConfig) -> Vec<PathBuf> {
    let mut paths = vec![config.gray_output.clone()];
    paths.extend(config.edge_output.clone());
    paths.push(config.mem_output.clone());
    paths
}

fn read_input(config: &PipelineConfig) -> Result<RgbBitmap> {
    let file = File::open(&config.input).with_context(|| {
        format!(
            "Unable to open input image file: {}",
            config.input.to_string_lossy().red().bold()
        )
    })?;
    debug!(path = %config.input.display(), expected = %config.expected, "decoding input");

    bitmap::decode(&mut BufReader::new(file), config.expected).with_context(|| {
        format!(
            "Failed to read a {} 24-bit BMP from: {}",
            config.expected,
            config.input.to_string_lossy().red().bold()
        )
    })
}

/// 在目标文件所在目录创建临时文件并写入全部内容。
fn stage_output(path: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    Ok(temp)
}

/// 先把所有输出写入目标目录中的临时文件，全部成功后再逐个替换为最终文件名。
///
/// 任一写入失败时，临时文件随 `NamedTempFile` 被丢弃而删除，已有的输出文件保持不变。
fn write_outputs(outputs: &[(&Path, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(outputs.len());
    for (path, bytes) in outputs {
        let temp = stage_output(path, bytes).with_context(|| {
            format!(
                "Unable to write output file: {}",
                path.to_string_lossy().red().bold()
            )
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "output staged");
        staged.push((*path, temp));
    }

    for (path, temp) in staged {
        temp.persist(path).map_err(|e| e.error).with_context(|| {
            format!(
                "Unable to replace output file: {}",
                path.to_string_lossy().red().bold()
            )
        })?;
        debug!(path = %path.display(), "output written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outputs_follow_input_name() {
        let config = PipelineConfig::from(SobelArgs {
            image: PathBuf::from("pics/a.bmp"),
            width: 4,
            height: 2,
            dest: None,
            edge: None,
            mem: None,
            mem_source: MemSource::Gray,
            force: false,
        });
        assert_eq!(config.gray_output, PathBuf::from("pics/output_a.bmp"));
        assert_eq!(
            config.edge_output,
            Some(PathBuf::from("pics/output_a_edge.bmp"))
        );
        assert_eq!(config.mem_output, PathBuf::from("pics/output_a.mem"));
        assert_eq!(config.expected, Dimensions::new(4, 2));
    }

    #[test]
    fn test_gray_config_has_no_edge_stage() {
        let config = PipelineConfig::from(GrayArgs {
            image: PathBuf::from("brainct_001.bmp"),
            width: 630,
            height: 630,
            dest: Some(PathBuf::from("out.bmp")),
            mem: None,
            force: true,
        });
        assert_eq!(config.gray_output, PathBuf::from("out.bmp"));
        assert_eq!(config.mem_output, PathBuf::from("output_brainct_001.mem"));
        assert!(config.edge_output.is_none());
        assert_eq!(output_paths(&config).len(), 2);
    }
}
