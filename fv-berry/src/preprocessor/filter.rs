//! 滤波阶段.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Filter;
use crate::consts::gray::MAX_F64;
use crate::error::{ensure_same_shape, VeinResult};

/// 只统计掩膜内像素的直方图均衡化.
///
/// 直方图在掩膜内像素的 `[min, max]` 上每个整数灰度一个 bin, 累积分布归一化到 1;
/// 所有像素经累积分布映射后, 按整幅图像的最小 / 最大值拉伸到 `[0, 255]`,
/// 最后将掩膜外的像素置 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramEqualization;

impl HistogramEqualization {
    /// 掩膜内像素的累积分布, 及其第一个 bin 对应的灰度. 掩膜为空时返回 `None`.
    pub fn cdf(image: ArrayView2<u8>, mask: ArrayView2<bool>) -> Option<(u8, Vec<f64>)> {
        let masked = || image.iter().zip(mask.iter()).filter(|(_, m)| **m).map(|(v, _)| *v);
        let lo = masked().min()?;
        let hi = masked().max()?;

        let mut hist = vec![0_usize; (hi - lo) as usize + 1];
        for v in masked() {
            hist[(v - lo) as usize] += 1;
        }
        let total: usize = hist.iter().sum();
        let mut acc = 0;
        let cdf = hist
            .iter()
            .map(|&n| {
                acc += n;
                acc as f64 / total as f64
            })
            .collect();
        Some((lo, cdf))
    }
}

impl Filter for HistogramEqualization {
    fn filter(&self, image: ArrayView2<u8>, mask: ArrayView2<bool>) -> VeinResult<Array2<f64>> {
        ensure_same_shape(image.shape(), mask.shape())?;
        let Some((lo, cdf)) = Self::cdf(image, mask) else {
            warn!("直方图均衡化: 掩膜为空, 输出全 0 图像");
            return Ok(Array2::zeros(image.raw_dim()));
        };

        // 整数 bin 中心上的线性插值退化为查表, 范围外取两端的值.
        let last = cdf.len() - 1;
        let mut out = image.mapv(|v| cdf[(v.saturating_sub(lo) as usize).min(last)]);

        let min = out.iter().copied().fold(f64::INFINITY, f64::min);
        let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let scale = if max > min { MAX_F64 / (max - min) } else { 0.0 };
        out.zip_mut_with(&mask, |v, &m| {
            *v = if m { ((*v - min) * scale).min(MAX_F64) } else { 0.0 };
        });
        debug!("直方图均衡化, 掩膜内灰度范围 [{lo}, {}]", lo as usize + last);
        Ok(out)
    }
}
