//! Repeated Line Tracking (Miura 等, 2004).

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Extract, Feature};
use crate::consts::extract::{
    RLT_ITERATIONS, RLT_PROFILE_W, RLT_P_LR, RLT_P_UD, RLT_R, RLT_SCALE,
};
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::ndimage::{
    argmax_first, binary_closing_2x2, bool_to_f64, positive_median, rescale_bilinear,
    rescale_mask,
};
use crate::Idx2d;

/// Repeated Line Tracking.
///
/// 从随机起点出发, 沿 "谷深" 最大的方向反复游走, 在轨迹空间中累积经过次数;
/// 最后以正值的中位数二值化, 并做 2x2 闭运算.
///
/// 随机数由 `ChaCha8Rng::seed_from_u64(seed)` 生成, 每次调用独立构造,
/// 因此同一输入、同一种子的输出逐位相同.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RepeatedLineTracking {
    /// 起点个数.
    pub iterations: usize,
    /// 跟踪点到剖面的距离.
    pub r: usize,
    /// 剖面宽度, 必须为奇数.
    pub profile_w: usize,
    /// 是否先缩小到 0.6 倍.
    pub rescale: bool,
    /// 随机数种子.
    pub seed: u64,
}

impl Default for RepeatedLineTracking {
    fn default() -> Self {
        Self {
            iterations: RLT_ITERATIONS,
            r: RLT_R,
            profile_w: RLT_PROFILE_W,
            rescale: true,
            seed: 0,
        }
    }
}

/// 一次提取中不变的几何量.
#[derive(Clone, Copy, Debug)]
struct Profile {
    /// 水平 / 竖直方向上剖面到候选点的距离.
    r: isize,
    /// 斜方向上剖面到候选点的距离 (每个轴).
    ro: isize,
    /// 水平 / 竖直剖面半宽.
    hw: isize,
    /// 斜剖面半宽 (每个轴).
    hwo: isize,
}

impl Profile {
    fn new(r: usize, profile_w: usize) -> Self {
        let hw = (profile_w - 1) / 2;
        let half_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
        Self {
            r: r as isize,
            ro: (r as f64 * half_sqrt2).round() as isize,
            hw: hw as isize,
            hwo: (hw as f64 * half_sqrt2).round() as isize,
        }
    }

    /// 候选点必须离边界至少这么远, 剖面才不会越界.
    #[inline]
    fn border(&self) -> usize {
        (self.r + self.hw) as usize
    }

    /// 从 `(yc, xc)` 移动到 `(ny, nx)` 时, 移动方向前方剖面的谷深.
    fn valley_depth(
        &self,
        image: &ArrayView2<f64>,
        (yc, xc): (isize, isize),
        (ny, nx): (isize, isize),
    ) -> f64 {
        let at = |y: isize, x: isize| image[[y as usize, x as usize]];
        let Self { r, ro, hw, hwo } = *self;
        if ny == yc {
            let xp = if nx > xc { nx + r } else { nx - r };
            at(ny + hw, xp) - 2.0 * at(ny, xp) + at(ny - hw, xp)
        } else if nx == xc {
            let yp = if ny > yc { ny + r } else { ny - r };
            at(yp, nx + hw) - 2.0 * at(yp, nx) + at(yp, nx - hw)
        } else if (nx > xc) == (ny < yc) {
            // "/" 方向, 剖面沿 "\".
            let (yp, xp) = if nx > xc {
                (ny - ro, nx + ro)
            } else {
                (ny + ro, nx - ro)
            };
            at(yp - hwo, xp - hwo) - 2.0 * at(yp, xp) + at(yp + hwo, xp + hwo)
        } else {
            // "\" 方向, 剖面沿 "/".
            let (yp, xp) = if nx < xc {
                (ny - ro, nx - ro)
            } else {
                (ny + ro, nx + ro)
            };
            at(yp + hwo, xp - hwo) - 2.0 * at(yp, xp) + at(yp - hwo, xp + hwo)
        }
    }
}

impl RepeatedLineTracking {
    /// 构建并检查参数.
    pub fn new(
        iterations: usize,
        r: usize,
        profile_w: usize,
        rescale: bool,
        seed: u64,
    ) -> VeinResult<Self> {
        let ret = Self {
            iterations,
            r,
            profile_w,
            rescale,
            seed,
        };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        if self.profile_w % 2 == 0 {
            return Err(VeinError::config(format!(
                "Repeated Line Tracking 剖面宽度必须为奇数, 实际为 {}",
                self.profile_w
            )));
        }
        if self.iterations == 0 {
            return Err(VeinError::config("Repeated Line Tracking 迭代次数必须至少为 1"));
        }
        if self.r == 0 {
            return Err(VeinError::config("Repeated Line Tracking 距离 r 必须至少为 1"));
        }
        Ok(())
    }

    /// 轨迹空间: 每个像素被游走经过的次数.
    pub fn locus_space(
        &self,
        image: ArrayView2<f64>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<Array2<f64>> {
        ensure_same_shape(image.shape(), mask.shape())?;
        self.validate()?;
        let (h, w) = image.dim();
        let profile = Profile::new(self.r, self.profile_w);
        let border = profile.border();

        // 去掉剖面无法到达的边框.
        let inner = |(y, x): Idx2d| y >= border && x >= border && y + border < h && x + border < w;
        let valid = Array2::from_shape_fn((h, w), |pos| inner(pos) && mask[pos]);
        let mut starts: Vec<Idx2d> = valid
            .indexed_iter()
            .filter(|(_, v)| **v)
            .map(|(pos, _)| pos)
            .collect();

        let mut locus = Array2::zeros((h, w));
        if starts.is_empty() {
            warn!("Repeated Line Tracking: 去掉边框后掩膜为空");
            return Ok(locus);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        starts.shuffle(&mut rng);

        for it in 0..self.iterations {
            let (y0, x0) = starts[it % starts.len()];
            let dlr: isize = if rng.gen::<f64>() >= 0.5 { -1 } else { 1 };
            let dud: isize = if rng.gen::<f64>() >= 0.5 { -1 } else { 1 };

            let mut visited = Array2::from_elem((h, w), false);
            let (mut yc, mut xc) = (y0 as isize, x0 as isize);
            loop {
                let u: f64 = rng.gen();
                let allowed = |dy: isize, dx: isize| {
                    if u < RLT_P_LR {
                        dx == dlr
                    } else if u < RLT_P_LR + RLT_P_UD {
                        dy == dud
                    } else {
                        dy != 0 || dx != 0
                    }
                };

                let mut candidates = Vec::with_capacity(8);
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        if !allowed(dy, dx) {
                            continue;
                        }
                        let pos = ((yc + dy) as usize, (xc + dx) as usize);
                        if valid[pos] && !visited[pos] {
                            candidates.push((yc + dy, xc + dx));
                        }
                    }
                }
                let depths = candidates
                    .iter()
                    .map(|&next| profile.valley_depth(&image, (yc, xc), next));
                let Some(best) = argmax_first(depths) else {
                    break;
                };

                let cur = (yc as usize, xc as usize);
                visited[cur] = true;
                locus[cur] += 1.0;
                (yc, xc) = candidates[best];
            }
        }
        Ok(locus)
    }
}

impl Extract for RepeatedLineTracking {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        ensure_same_shape(image.shape(), mask.shape())?;
        let (image, mask) = if self.rescale {
            (
                rescale_bilinear(image, RLT_SCALE),
                rescale_mask(mask, RLT_SCALE),
            )
        } else {
            (image.to_owned(), mask.to_owned())
        };

        let locus = self.locus_space(image.view(), mask.view())?;
        let Some(md) = positive_median(locus.iter()) else {
            return Ok(Feature::Map(locus));
        };
        let veins = binary_closing_2x2(locus.mapv(|v| v > md).view());
        debug!(
            "Repeated Line Tracking, 种子 {}, 中位数 {md}, 静脉像素 {}",
            self.seed,
            veins.iter().filter(|v| **v).count()
        );
        Ok(Feature::Map(bool_to_f64(veins.view())))
    }
}
