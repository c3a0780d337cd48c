//! 归一化阶段: 旋转并平移图像, 使手指中线水平且位于图像中央.

use log::debug;
use ndarray::{Array1, Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Normalize;
use crate::consts::gray::MAX_F64;
use crate::consts::preprocess::{PADDING_CONSTANT, PADDING_WIDTH};
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::fitting::polyfit_f64;
use crate::ndimage::bicubic_at;
use crate::Idx2d;

/// 平面仿射变换, 作用于 `(x, y)` 即 `(列, 行)` 坐标:
///
/// ```text
/// x' = m[0][0] x + m[0][1] y + m[0][2]
/// y' = m[1][0] x + m[1][1] y + m[1][2]
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    m: [[f64; 3]; 2],
}

impl Affine {
    /// 先绕原点旋转 `angle` (弧度), 再沿 `y` 方向平移 `ty`.
    pub fn rotate_then_shift_y(angle: f64, ty: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            m: [[cos, -sin, 0.0], [sin, cos, ty]],
        }
    }

    /// 逆变换. 线性部分奇异时返回 `None`.
    pub fn inverse(&self) -> Option<Self> {
        let [[a, b, tx], [c, d, ty]] = self.m;
        let det = a * d - b * c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let (ia, ib, ic, id) = (d / det, -b / det, -c / det, a / det);
        Some(Self {
            m: [
                [ia, ib, -(ia * tx + ib * ty)],
                [ic, id, -(ic * tx + id * ty)],
            ],
        })
    }

    /// 变换点 `(x, y)`.
    #[inline]
    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let [[a, b, tx], [c, d, ty]] = self.m;
        (a * x + b * y + tx, c * x + d * y + ty)
    }
}

/// Huang 等人的归一化方法.
///
/// 每一列取掩膜的上下边缘, 其中点构成手指中线; 对中线做一次多项式最小二乘拟合,
/// 再通过旋转 `-atan(斜率)` 并平移使中线水平、位于 `h / 2` 附近.
/// 输出画布在四周各扩展 `padding_width` 像素, 画布上原图之外的像素取 `padding_constant`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HuangNormalization {
    /// 输出画布四周扩展的宽度.
    pub padding_width: usize,
    /// 画布上没有对应原图像素的位置的灰度.
    pub padding_constant: u8,
}

impl Default for HuangNormalization {
    fn default() -> Self {
        Self {
            padding_width: PADDING_WIDTH,
            padding_constant: PADDING_CONSTANT,
        }
    }
}

impl HuangNormalization {
    /// 构建.
    #[inline]
    pub const fn new(padding_width: usize, padding_constant: u8) -> Self {
        Self {
            padding_width,
            padding_constant,
        }
    }

    /// 估计中线并给出正向变换.
    pub fn estimate(&self, mask: ArrayView2<bool>) -> VeinResult<Affine> {
        let (h, w) = mask.dim();
        if !mask.iter().any(|v| *v) {
            return Err(VeinError::EmptyMask);
        }
        let x: Array1<f64> = (0..w).map(|c| c as f64).collect();
        let y: Array1<f64> = mask
            .columns()
            .into_iter()
            .map(|col| {
                let up = col.iter().position(|v| *v).unwrap_or(0);
                let lo = col.iter().rposition(|v| *v).unwrap_or(h - 1);
                (up + lo) as f64 / 2.0
            })
            .collect();

        let line = if w >= 2 {
            polyfit_f64(x.view(), y.view(), 1)?
        } else {
            // 只有一列时中线退化为一个点, 视为水平线.
            polyfit_f64(x.view(), y.view(), 0)?
        };
        let coef = line.coefficients();
        let (intercept, slope) = (coef[0], coef.get(1).copied().unwrap_or(0.0));

        let angle = -slope.atan();
        let tr = h as f64 / 2.0 - intercept;
        debug!("Huang 归一化, 中线斜率 {slope:.4}, 截距 {intercept:.2}, 平移 {tr:.2}");
        Ok(Affine::rotate_then_shift_y(angle, tr))
    }
}

/// 画布像素 `(r, c)` 在原图中对应的位置 `(x, y)`, 以像素中心为整数坐标.
///
/// 变换作用于像素边角坐标: 先取画布像素中心 `+0.5`, 变换后再 `-0.5`,
/// 与 Pillow 的 `Image.transform(.., AFFINE, ..)` 一致.
fn source_of(inverse: &Affine, (r, c): Idx2d, padding: usize) -> (f64, f64) {
    let target = (
        c as f64 - padding as f64 + 0.5,
        r as f64 - padding as f64 + 0.5,
    );
    let (xs, ys) = inverse.apply(target);
    (xs - 0.5, ys - 0.5)
}

impl Normalize for HuangNormalization {
    fn normalize(
        &self,
        image: ArrayView2<u8>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<(Array2<u8>, Array2<bool>)> {
        ensure_same_shape(image.shape(), mask.shape())?;
        let (h, w) = image.dim();
        let inverse = self
            .estimate(mask)?
            .inverse()
            .ok_or_else(|| VeinError::config("归一化变换不可逆"))?;

        let p = self.padding_width;
        let canvas = (h + 2 * p, w + 2 * p);
        let src = image.mapv(|v| v as f64);
        let src = src.view();
        let inside = |xs: f64, ys: f64| {
            xs >= -0.5 && ys >= -0.5 && xs < w as f64 - 0.5 && ys < h as f64 - 0.5
        };

        let mut out_image = Array2::from_elem(canvas, self.padding_constant);
        let mut out_mask = Array2::from_elem(canvas, false);
        for ((r, c), pix) in out_image.indexed_iter_mut() {
            let (xs, ys) = source_of(&inverse, (r, c), p);
            if !inside(xs, ys) {
                continue;
            }
            *pix = bicubic_at(&src, ys, xs).round().clamp(0.0, MAX_F64) as u8;
            // 最近邻取包含该点的像素.
            let (yn, xn) = ((ys + 0.5).floor() as usize, (xs + 0.5).floor() as usize);
            out_mask[[r, c]] = mask[[yn.min(h - 1), xn.min(w - 1)]];
        }
        Ok((out_image, out_mask))
    }
}
