//! 插值与缩放. 坐标以像素中心为整数点, 越界的邻居取最近的边界像素.

use ndarray::{Array2, ArrayView2};

use super::bool_to_f64;

#[inline]
fn clamped(input: &ArrayView2<f64>, y: isize, x: isize) -> f64 {
    let (h, w) = input.dim();
    input[[
        y.clamp(0, h as isize - 1) as usize,
        x.clamp(0, w as isize - 1) as usize,
    ]]
}

/// 在 `(y, x)` 处双线性插值. 输入不能为空.
pub fn bilinear_at(input: &ArrayView2<f64>, y: f64, x: f64) -> f64 {
    let (y0, x0) = (y.floor(), x.floor());
    let (fy, fx) = (y - y0, x - x0);
    let (y0, x0) = (y0 as isize, x0 as isize);
    let top = clamped(input, y0, x0) * (1.0 - fx) + clamped(input, y0, x0 + 1) * fx;
    let bottom = clamped(input, y0 + 1, x0) * (1.0 - fx) + clamped(input, y0 + 1, x0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Keys 三次卷积核, `a = -0.5`.
#[inline]
fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// 在 `(y, x)` 处双三次插值 (Keys, `a = -0.5`), 使用 4x4 邻域. 输入不能为空.
pub fn bicubic_at(input: &ArrayView2<f64>, y: f64, x: f64) -> f64 {
    let (y0, x0) = (y.floor(), x.floor());
    let (fy, fx) = (y - y0, x - x0);
    let (y0, x0) = (y0 as isize, x0 as isize);
    let mut acc = 0.0;
    for dy in -1..=2_isize {
        let wy = cubic_weight(fy - dy as f64);
        let mut row = 0.0;
        for dx in -1..=2_isize {
            row += cubic_weight(fx - dx as f64) * clamped(input, y0 + dy, x0 + dx);
        }
        acc += wy * row;
    }
    acc
}

/// 缩放后的边长, 至少为 1.
#[inline]
fn scaled_len(n: usize, factor: f64) -> usize {
    ((n as f64 * factor).round() as usize).max(1)
}

/// 输出坐标 `i` 在输入中的位置 (两端角点对齐).
#[inline]
fn source_coord(i: usize, n_in: usize, n_out: usize) -> f64 {
    if n_out <= 1 {
        0.0
    } else {
        i as f64 * (n_in - 1) as f64 / (n_out - 1) as f64
    }
}

/// 双线性缩放 `factor` 倍, 输出形状为 `(round(h * factor), round(w * factor))`.
/// 两端角点对齐. 输入为空时返回空数组.
pub fn rescale_bilinear(input: ArrayView2<f64>, factor: f64) -> Array2<f64> {
    let (h, w) = input.dim();
    if h == 0 || w == 0 {
        return Array2::zeros((0, 0));
    }
    let (oh, ow) = (scaled_len(h, factor), scaled_len(w, factor));
    Array2::from_shape_fn((oh, ow), |(r, c)| {
        bilinear_at(&input, source_coord(r, h, oh), source_coord(c, w, ow))
    })
}

/// 以 0/1 图像做双线性缩放, 结果中大于 0 的位置为前景.
pub fn rescale_mask(mask: ArrayView2<bool>, factor: f64) -> Array2<bool> {
    rescale_bilinear(bool_to_f64(mask).view(), factor).mapv(|v| v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_bilinear_at() {
        let input = array![[0.0, 10.0], [20.0, 30.0]];
        let v = input.view();
        assert!(f64_eq(bilinear_at(&v, 0.5, 0.5), 15.0));
        assert!(f64_eq(bilinear_at(&v, 0.0, 1.0), 10.0));
        // 越界取边界.
        assert!(f64_eq(bilinear_at(&v, 5.0, -3.0), 20.0));
    }

    #[test]
    fn test_bicubic_exact_on_grid_and_linear() {
        let input = Array2::from_shape_fn((6, 6), |(r, c)| (2 * r + 3 * c) as f64);
        let v = input.view();
        assert!(f64_eq(bicubic_at(&v, 2.0, 3.0), 13.0));
        // Keys 核对线性函数精确 (远离边界时).
        assert!(f64_eq(bicubic_at(&v, 2.5, 2.25), 11.75));
    }

    #[test]
    fn test_rescale_bilinear() {
        let input = Array2::from_shape_fn((5, 9), |(r, c)| (r * 10 + c) as f64);
        let out = rescale_bilinear(input.view(), 0.5);
        assert_eq!(out.dim(), (3, 5)); // round(2.5) = 3, round(4.5) = 5
        assert!(f64_eq(out[[0, 0]], 0.0));
        assert!(f64_eq(out[[2, 4]], 48.0));
        assert!(f64_eq(out[[1, 2]], 24.0));
    }

    #[test]
    fn test_rescale_mask() {
        let mut mask = Array2::from_elem((10, 10), false);
        mask[[9, 9]] = true;
        let out = rescale_mask(mask.view(), 0.5);
        assert_eq!(out.dim(), (5, 5));
        assert!(out[[4, 4]]);
        assert_eq!(out.iter().filter(|v| **v).count(), 1);
    }
}
