//! # 十六进制存储器文件导出
//!
//! 供硬件仿真 (如 Verilog `$readmemh`) 预加载存储器阵列使用：
//! 每个像素一行，两位大写十六进制，以 CRLF 结尾，没有文件头。
//! 像素按内存缓冲区顺序输出，即图像空间中自上而下、从左到右。

use std::io::{self, Write};

/// 每行的字节数："XX\r\n"。
const LINE_LEN: usize = 4;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_line(byte: u8) -> [u8; LINE_LEN] {
    [
        HEX_DIGITS[usize::from(byte >> 4)],
        HEX_DIGITS[usize::from(byte & 0x0F)],
        b'\r',
        b'\n',
    ]
}

/// 将缓冲区逐字节写成十六进制存储器格式。
pub fn write_hex<W: Write>(writer: &mut W, buffer: &[u8]) -> io::Result<()> {
    for &byte in buffer {
        writer.write_all(&hex_line(byte))?;
    }
    Ok(())
}

/// 在内存中生成完整的十六进制存储器文件内容。
pub fn to_hex_text(buffer: &[u8]) -> Vec<u8> {
    buffer.iter().flat_map(|&byte| hex_line(byte)).collect()
}
