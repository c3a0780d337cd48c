//! 掩膜工具: 多边形栅格化, 掩膜到图像的类型转换, 以及掩膜之间的重合度量.

use ndarray::{Array2, ArrayView2, Zip};

use crate::data::roi::fix_points;
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::{Idx2d, Point2d};

/// 将多边形 `points` (`(行, 列)` 顺序) 栅格化为形状为 `shape` 的掩膜.
///
/// 越界顶点先被截断到图像之内. 填充规则与 Pillow 的 `ImageDraw.polygon`
/// 逐像素一致:
///
/// 1. 水平边直接画成线段 (包含两端);
/// 2. 其他边在每条扫描线上求交点 (单精度浮点), 边的下端点处的交点重复一次;
/// 3. 交点排序后两两配对, 从左交点四舍五入 (half up) 填充到右交点四舍五入 (half down).
pub fn poly_to_mask((h, w): Idx2d, points: &[Point2d]) -> Array2<bool> {
    let mut mask = Array2::from_elem((h, w), false);
    if points.is_empty() {
        return mask;
    }
    let Ok(points) = fix_points((h, w), points) else {
        return mask;
    };

    // (y_min, y_max, x0, y0, dx/dy)
    let mut edges: Vec<(i64, i64, f32, i64, f32)> = Vec::with_capacity(points.len());
    let (mut y_min, mut y_max) = (i64::MAX, i64::MIN);
    for (i, &(y0, x0)) in points.iter().enumerate() {
        let (y1, x1) = points[(i + 1) % points.len()];
        if y0 == y1 {
            hline(&mut mask, y0, x0.min(x1), x0.max(x1));
            continue;
        }
        let slope = (x1 - x0) as f32 / (y1 - y0) as f32;
        let (lo, hi) = (y0.min(y1), y0.max(y1));
        edges.push((lo, hi, x0 as f32, y0, slope));
        y_min = y_min.min(lo);
        y_max = y_max.max(hi);
    }
    if edges.is_empty() {
        return mask;
    }
    let (y_min, y_max) = (y_min.max(0), y_max.min(h as i64));

    let mut xs: Vec<f32> = Vec::with_capacity(edges.len() + 2);
    for y in y_min..=y_max {
        xs.clear();
        for &(lo, hi, x0, y0, slope) in edges.iter() {
            if (lo..=hi).contains(&y) {
                xs.push((y - y0) as f32 * slope + x0);
                if y == hi && y < y_max {
                    xs.push((y - y0) as f32 * slope + x0);
                }
            }
        }
        xs.sort_by(f32::total_cmp);
        for pair in xs.chunks_exact(2) {
            hline(&mut mask, y, round_half_up(pair[0]), round_half_down(pair[1]));
        }
    }
    mask
}

#[inline]
fn round_half_up(x: f32) -> i64 {
    if x >= 0.0 {
        (x + 0.5).floor() as i64
    } else {
        -((-x + 0.5).floor() as i64)
    }
}

#[inline]
fn round_half_down(x: f32) -> i64 {
    if x >= 0.0 {
        (x - 0.5).ceil() as i64
    } else {
        -((-x - 0.5).ceil() as i64)
    }
}

/// 在第 `y` 行将 `[x0, x1]` 涂为前景, 超出图像的部分被忽略.
fn hline(mask: &mut Array2<bool>, y: i64, x0: i64, x1: i64) {
    let (h, w) = mask.dim();
    if y < 0 || y >= h as i64 {
        return;
    }
    let (x0, x1) = (x0.max(0), x1.min(w as i64 - 1));
    for x in x0..=x1 {
        mask[[y as usize, x as usize]] = true;
    }
}

/// 可以由掩膜转换得到的像素类型.
///
/// 整数类型中 `true` 对应类型的最大值, 浮点类型中 `true` 对应 `1.0`.
pub trait MaskPixel: Copy {
    /// `false` 对应的像素值.
    const OFF: Self;

    /// `true` 对应的像素值.
    const ON: Self;
}

macro_rules! impl_mask_pixel {
    ($($int: ty),+; $($fp: ty),+) => {
        $(
            impl MaskPixel for $int {
                const OFF: Self = 0;
                const ON: Self = <$int>::MAX;
            }
        )+
        $(
            impl MaskPixel for $fp {
                const OFF: Self = 0.0;
                const ON: Self = 1.0;
            }
        )+
    };
}

impl_mask_pixel!(u8, u16, u32, u64; f32, f64);

/// 将掩膜转换为 `T` 类型的图像.
pub fn mask_to_image<T: MaskPixel>(mask: ArrayView2<bool>) -> Array2<T> {
    mask.mapv(|on| if on { T::ON } else { T::OFF })
}

/// 运行时确定像素类型的图像. 见 [`mask_to_image_as`].
#[derive(Clone, Debug, PartialEq)]
pub enum DynImage {
    /// `uint8`
    U8(Array2<u8>),
    /// `uint16`
    U16(Array2<u16>),
    /// `uint32`
    U32(Array2<u32>),
    /// `uint64`
    U64(Array2<u64>),
    /// `float32`
    F32(Array2<f32>),
    /// `float64`
    F64(Array2<f64>),
}

impl DynImage {
    /// 像素类型名.
    pub fn dtype(&self) -> &'static str {
        match self {
            DynImage::U8(_) => "uint8",
            DynImage::U16(_) => "uint16",
            DynImage::U32(_) => "uint32",
            DynImage::U64(_) => "uint64",
            DynImage::F32(_) => "float32",
            DynImage::F64(_) => "float64",
        }
    }
}

/// 按类型名 (`"uint8"`, `"uint16"`, `"uint32"`, `"uint64"`, `"float32"`, `"float64"`)
/// 将掩膜转换为图像. `"float128"` 没有对应的 Rust 类型, 按 `float64` 处理.
///
/// 其他类型名返回 [`VeinError::UnsupportedPixelType`], 错误信息中包含该类型名.
pub fn mask_to_image_as(mask: ArrayView2<bool>, dtype: &str) -> VeinResult<DynImage> {
    Ok(match dtype {
        "uint8" => DynImage::U8(mask_to_image(mask)),
        "uint16" => DynImage::U16(mask_to_image(mask)),
        "uint32" => DynImage::U32(mask_to_image(mask)),
        "uint64" => DynImage::U64(mask_to_image(mask)),
        "float32" => DynImage::F32(mask_to_image(mask)),
        "float64" | "float128" => DynImage::F64(mask_to_image(mask)),
        other => return Err(VeinError::UnsupportedPixelType(other.to_string())),
    })
}

/// 统计 `(a, b)` 同时满足 `pred` 的像素个数.
fn count_pairs(a: ArrayView2<bool>, b: ArrayView2<bool>, pred: fn(bool, bool) -> bool) -> usize {
    let mut n = 0;
    Zip::from(&a).and(&b).for_each(|&x, &y| {
        if pred(x, y) {
            n += 1;
        }
    });
    n
}

#[inline]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Jaccard 指数 `|A ∩ B| / |A ∪ B|`. 并集为空时为 `0`.
pub fn jaccard_index(a: ArrayView2<bool>, b: ArrayView2<bool>) -> VeinResult<f64> {
    ensure_same_shape(a.shape(), b.shape())?;
    let inter = count_pairs(a, b, |x, y| x && y);
    let union = count_pairs(a, b, |x, y| x || y);
    Ok(ratio(inter, union))
}

/// 真值 `a` 被 `b` 覆盖的比例 `|A ∩ B| / |A|`. `A` 为空时为 `0`.
pub fn intersect_ratio(a: ArrayView2<bool>, b: ArrayView2<bool>) -> VeinResult<f64> {
    ensure_same_shape(a.shape(), b.shape())?;
    let inter = count_pairs(a, b, |x, y| x && y);
    let total = a.iter().filter(|v| **v).count();
    Ok(ratio(inter, total))
}

/// `a` 的补集被 `b` 覆盖的比例 `|¬A ∩ B| / |¬A|`. `¬A` 为空时为 `0`.
pub fn intersect_ratio_of_complement(a: ArrayView2<bool>, b: ArrayView2<bool>) -> VeinResult<f64> {
    ensure_same_shape(a.shape(), b.shape())?;
    let inter = count_pairs(a, b, |x, y| !x && y);
    let total = a.iter().filter(|v| !**v).count();
    Ok(ratio(inter, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn parse(rows: &[&str]) -> Array2<bool> {
        let w = rows[0].len();
        Array2::from_shape_fn((rows.len(), w), |(r, c)| rows[r].as_bytes()[c] == b'#')
    }

    #[test]
    fn test_poly_to_mask_square() {
        let mask = poly_to_mask((10, 9), &[(2, 2), (2, 7), (7, 7), (7, 2)]);
        let expected = parse(&[
            ".........",
            ".........",
            "..######.",
            "..######.",
            "..######.",
            "..######.",
            "..######.",
            "..######.",
            ".........",
            ".........",
        ]);
        assert_eq!(mask, expected);
        assert_eq!(mask.iter().filter(|v| **v).count(), 36);
    }

    #[test]
    fn test_poly_to_mask_trapezoid() {
        let mask = poly_to_mask((10, 9), &[(3, 2), (5, 7), (8, 7), (7, 3)]);
        let expected = parse(&[
            ".........",
            ".........",
            ".........",
            "..#......",
            "..###....",
            "...#####.",
            "...#####.",
            "...#####.",
            ".......#.",
            ".........",
        ]);
        assert_eq!(mask, expected);
    }

    /// 越界顶点被截断, 等价于整幅图像.
    #[test]
    fn test_poly_to_mask_clipped() {
        let mask = poly_to_mask((4, 5), &[(-3, -3), (-3, 20), (20, 20), (20, -3)]);
        assert!(mask.iter().all(|v| *v));
        assert!(poly_to_mask((4, 5), &[]).iter().all(|v| !*v));
    }

    #[test]
    fn test_mask_to_image() {
        let sample = array![[false, true]];
        assert_eq!(mask_to_image::<u8>(sample.view()), array![[0, u8::MAX]]);
        assert_eq!(mask_to_image::<u16>(sample.view()), array![[0, u16::MAX]]);
        assert_eq!(mask_to_image::<u32>(sample.view()), array![[0, u32::MAX]]);
        assert_eq!(mask_to_image::<u64>(sample.view()), array![[0, u64::MAX]]);
        assert_eq!(mask_to_image::<f32>(sample.view()), array![[0.0, 1.0]]);
        assert_eq!(mask_to_image::<f64>(sample.view()), array![[0.0, 1.0]]);

        for name in ["uint8", "uint16", "uint32", "uint64", "float32", "float64"] {
            assert_eq!(mask_to_image_as(sample.view(), name).unwrap().dtype(), name);
        }
        let wide = mask_to_image_as(sample.view(), "float128").unwrap();
        assert_eq!(wide, DynImage::F64(array![[0.0, 1.0]]));

        let err = mask_to_image_as(sample.view(), "int16").unwrap_err();
        assert!(matches!(err, VeinError::UnsupportedPixelType(_)));
        assert!(err.to_string().contains("int16"));
    }

    #[test]
    fn test_jaccard_index() {
        let a = array![[false, false], [true, true]];
        let b = array![[true, true], [true, false]];
        let ones = Array2::from_elem((2, 2), true);
        let zeros = Array2::from_elem((2, 2), false);

        assert_eq!(jaccard_index(a.view(), b.view()).unwrap(), 0.25);
        assert_eq!(jaccard_index(a.view(), a.view()).unwrap(), 1.0);
        assert_eq!(jaccard_index(b.view(), b.view()).unwrap(), 1.0);
        assert_eq!(jaccard_index(a.view(), ones.view()).unwrap(), 0.5);
        assert_eq!(jaccard_index(a.view(), zeros.view()).unwrap(), 0.0);
        assert_eq!(jaccard_index(b.view(), ones.view()).unwrap(), 0.75);
        assert_eq!(jaccard_index(b.view(), zeros.view()).unwrap(), 0.0);
        assert_eq!(jaccard_index(zeros.view(), zeros.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_intersect_ratios() {
        let a = array![[false, false], [true, true]];
        let b = array![[true, false], [true, false]];
        let ones = Array2::from_elem((2, 2), true);
        let zeros = Array2::from_elem((2, 2), false);

        assert_eq!(intersect_ratio(a.view(), b.view()).unwrap(), 0.5);
        assert_eq!(intersect_ratio(a.view(), a.view()).unwrap(), 1.0);
        assert_eq!(intersect_ratio(b.view(), b.view()).unwrap(), 1.0);
        assert_eq!(intersect_ratio(a.view(), ones.view()).unwrap(), 1.0);
        assert_eq!(intersect_ratio(a.view(), zeros.view()).unwrap(), 0.0);
        assert_eq!(intersect_ratio(b.view(), ones.view()).unwrap(), 1.0);

        let irc = intersect_ratio_of_complement;
        assert_eq!(irc(a.view(), b.view()).unwrap(), 0.5);
        assert_eq!(irc(a.view(), a.view()).unwrap(), 0.0);
        assert_eq!(irc(b.view(), b.view()).unwrap(), 0.0);
        assert_eq!(irc(a.view(), ones.view()).unwrap(), 1.0);
        assert_eq!(irc(a.view(), zeros.view()).unwrap(), 0.0);
        assert_eq!(irc(b.view(), ones.view()).unwrap(), 1.0);
        assert_eq!(irc(b.view(), zeros.view()).unwrap(), 0.0);
    }

    #[test]
    fn test_metric_shape_mismatch() {
        let a = Array2::from_elem((2, 2), true);
        let b = Array2::from_elem((2, 3), true);
        assert!(matches!(
            jaccard_index(a.view(), b.view()),
            Err(VeinError::ShapeMismatch { .. })
        ));
    }
}
