use crate::bitmap::{Bgr, BmpError, Dimensions, alloc_buffer};
use tracing::debug;

type Kernel3 = [[i32; 3]; 3];

const SOBEL_X: Kernel3 = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_Y: Kernel3 = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// `Y = 0.299R + 0.587G + 0.114B`，小数部分直接截断。
pub fn luminance(pixel: Bgr) -> u8 {
    (0.299 * f64::from(pixel.red) + 0.587 * f64::from(pixel.green) + 0.114 * f64::from(pixel.blue))
        as u8
}

pub fn grayscale(pixels: &[Bgr]) -> Result<Vec<u8>, BmpError> {
    let mut gray = alloc_buffer(pixels.len(), 0u8, "grayscale")?;
    for (out, &pixel) in gray.iter_mut().zip(pixels) {
        *out = luminance(pixel);
    }
    Ok(gray)
}

/// 越界坐标被钳制到最近的边缘像素 (复制边界)。
fn clamped(gray: &[u8], dims: Dimensions, x: i64, y: i64) -> i32 {
    let x = x.clamp(0, i64::from(dims.width) - 1) as usize;
    let y = y.clamp(0, i64::from(dims.height) - 1) as usize;
    i32::from(gray[y * dims.width as usize + x])
}

/// 在 (x, y) 处计算 Sobel 梯度幅值，截断为整数并饱和到 255。
///
/// 调用方保证 `gray` 长度等于 `dims.pixel_count()` 且宽高均不为 0。
fn sobel_at(gray: &[u8], dims: Dimensions, x: u32, y: u32) -> u8 {
    let (mut gx, mut gy) = (0i32, 0i32);
    for (ky, (row_x, row_y)) in SOBEL_X.iter().zip(&SOBEL_Y).enumerate() {
        for kx in 0..3 {
            let p = clamped(
                gray,
                dims,
                i64::from(x) + kx as i64 - 1,
                i64::from(y) + ky as i64 - 1,
            );
            gx += p * row_x[kx];
            gy += p * row_y[kx];
        }
    }
    let magnitude = f64::from(gx * gx + gy * gy).sqrt() as i32;
    magnitude.min(255) as u8
}

/// 对整幅灰度图做 Sobel 边缘检测，输出与输入同尺寸的幅值缓冲区。
pub fn sobel(gray: &[u8], dims: Dimensions) -> Result<Vec<u8>, BmpError> {
    if gray.len() != dims.pixel_count() {
        return Err(BmpError::BufferSize {
            expected: dims.pixel_count(),
            actual: gray.len(),
        });
    }
    debug!(%dims, "running sobel edge detection");

    let mut edges = alloc_buffer(dims.pixel_count(), 0u8, "edge")?;
    if dims.pixel_count() == 0 {
        return Ok(edges);
    }
    let width = dims.width as usize;
    for (y, row) in edges.chunks_exact_mut(width).enumerate() {
        for (x, out) in row.iter_mut().enumerate() {
            *out = sobel_at(gray, dims, x as u32, y as u32);
        }
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_truncates() {
        assert_eq!(luminance(Bgr::new(100, 0, 0)), 29);
        assert_eq!(luminance(Bgr::new(0, 100, 0)), 58);
        assert_eq!(luminance(Bgr::new(0, 0, 100)), 11);
        assert_eq!(luminance(Bgr::new(0, 0, 0)), 0);
        // 0.299*10 + 0.587*20 + 0.114*30 = 18.15
        assert_eq!(luminance(Bgr::new(10, 20, 30)), 18);
    }

    #[test]
    fn test_grayscale_matches_formula_for_every_pixel() {
        let pixels: Vec<Bgr> = (0..=255u8)
            .map(|v| Bgr::new(v, v.wrapping_mul(7), v.wrapping_mul(13)))
            .collect();
        let gray = grayscale(&pixels).unwrap();
        for (p, g) in pixels.iter().zip(&gray) {
            let expected = (0.299 * f64::from(p.red)
                + 0.587 * f64::from(p.green)
                + 0.114 * f64::from(p.blue))
            .floor() as u8;
            assert_eq!(*g, expected);
        }
    }

    #[test]
    fn test_sobel_flat_image_is_zero() {
        let dims = Dimensions::new(7, 5);
        let gray = vec![93u8; dims.pixel_count()];
        assert!(sobel(&gray, dims).unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_sobel_vertical_step_saturates_at_step() {
        let dims = Dimensions::new(6, 4);
        let gray: Vec<u8> = (0..dims.pixel_count())
            .map(|i| if i % 6 < 3 { 0 } else { 255 })
            .collect();
        let edges = sobel(&gray, dims).unwrap();
        for row in edges.chunks_exact(6) {
            assert_eq!(row, &[0, 0, 255, 255, 0, 0]);
        }
    }

    #[test]
    fn test_sobel_corner_uses_replicated_border() {
        let dims = Dimensions::new(3, 3);
        let gray = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        // 复制边界下的邻域为 [1 1 2; 1 1 2; 4 4 5]：gx = 4, gy = 12, sqrt(160) = 12.6。
        // 若用零填充会得到 sqrt(250) = 15。
        assert_eq!(sobel_at(&gray, dims, 0, 0), 12);
        assert_eq!(sobel(&gray, dims).unwrap()[0], 12);
    }

    #[test]
    fn test_sobel_rejects_short_buffer() {
        let err = sobel(&[0; 5], Dimensions::new(3, 2)).unwrap_err();
        assert!(matches!(err, BmpError::BufferSize { expected: 6, actual: 5 }));
    }

    #[test]
    fn test_sobel_empty_image() {
        assert!(sobel(&[], Dimensions::new(0, 3)).unwrap().is_empty());
        assert!(sobel(&[], Dimensions::new(3, 0)).unwrap().is_empty());
        assert!(sobel(&[], Dimensions::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_sobel_single_pixel_image() {
        let dims = Dimensions::new(1, 1);
        assert_eq!(sobel(&[200], dims).unwrap(), vec![0]);
    }
}
