//! Wide Line Detector (Huang 等, 2010).

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Extract, Feature};
use crate::consts::extract::{WLD_G, WLD_RADIUS, WLD_SCALE, WLD_THRESHOLD};
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::ndimage::{rescale_bilinear, rescale_mask, PosIter};

/// Wide Line Detector.
///
/// 对每个内部像素, 统计圆盘邻域内满足 `邻居 - 中心 <= threshold` 的像素个数,
/// 个数不超过 `g` 时该像素属于静脉. 粗的暗线中心比周围暗, 满足条件的邻居少.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WideLineDetector {
    /// 圆盘邻域半径.
    pub radius: usize,
    /// 灰度阈值.
    pub threshold: f64,
    /// 邻居计数阈值.
    pub g: usize,
    /// 是否先缩小到 0.24 倍.
    pub rescale: bool,
}

impl Default for WideLineDetector {
    fn default() -> Self {
        Self {
            radius: WLD_RADIUS,
            threshold: WLD_THRESHOLD,
            g: WLD_G,
            rescale: true,
        }
    }
}

impl WideLineDetector {
    /// 构建并检查参数.
    pub fn new(radius: usize, threshold: f64, g: usize, rescale: bool) -> VeinResult<Self> {
        let ret = Self {
            radius,
            threshold,
            g,
            rescale,
        };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        if self.radius == 0 {
            return Err(VeinError::config("Wide Line Detector 半径必须至少为 1"));
        }
        let side = 2 * self.radius + 1;
        if self.g > side * side {
            return Err(VeinError::config(format!(
                "Wide Line Detector 计数阈值 {} 超过邻域大小 {}",
                self.g,
                side * side
            )));
        }
        if !self.threshold.is_finite() {
            return Err(VeinError::config("Wide Line Detector 阈值必须为有限值"));
        }
        Ok(())
    }

    /// 圆盘邻域 `x² + y² <= r²` 内的 `(行, 列)` 偏移.
    fn disk(&self) -> Vec<(isize, isize)> {
        let r = self.radius as isize;
        (-r..=r)
            .flat_map(|y| (-r..=r).map(move |x| (y, x)))
            .filter(|(y, x)| x * x + y * y <= r * r)
            .collect()
    }
}

impl Extract for WideLineDetector {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        ensure_same_shape(image.shape(), mask.shape())?;
        let (image, mask) = if self.rescale {
            (
                rescale_bilinear(image, WLD_SCALE),
                rescale_mask(mask, WLD_SCALE),
            )
        } else {
            (image.to_owned(), mask.to_owned())
        };
        if !mask.iter().any(|v| *v) {
            warn!("Wide Line Detector: 掩膜为空");
        }

        let disk = self.disk();
        let mut veins = Array2::zeros(image.raw_dim());
        for (r, c) in PosIter::interior(image.dim(), self.radius) {
            if !mask[[r, c]] {
                continue;
            }
            let centre = image[[r, c]];
            let count = disk
                .iter()
                .filter(|(dy, dx)| {
                    let y = (r as isize + dy) as usize;
                    let x = (c as isize + dx) as usize;
                    image[[y, x]] - centre <= self.threshold
                })
                .count();
            if count <= self.g {
                veins[[r, c]] = 1.0;
            }
        }
        debug!(
            "Wide Line Detector, 形状 {:?}, 静脉像素 {}",
            veins.dim(),
            veins.iter().filter(|v| **v > 0.0).count()
        );
        Ok(Feature::Map(veins))
    }
}
