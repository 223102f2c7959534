use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use bmp_gray::{
    cli::{Cli, Commands},
    handler::{handle_gray, handle_sobel},
};

/// 程序的主入口点
///
/// 负责解析命令行参数，并根据指定的子命令（`gray` 或 `sobel`）
/// 将执行分派到相应的处理函数。失败时把完整的错误链打印到标准输出，并以状态码 1 退出
fn main() -> ExitCode {
    // 诊断日志写到 stderr，默认只显示警告，可用 RUST_LOG 调整
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Gray(args) => handle_gray(args),
        Commands::Sobel(args) => handle_sobel(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("{} {err:#}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
