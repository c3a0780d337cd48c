//! Principal Curvature (Choi 等, 2009). 按文献描述实现, 尚无参考数据校验.

use log::debug;
use ndarray::{Array2, ArrayView2, Axis, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::max_curvature::GaussianKernels;
use super::{Extract, Feature};
use crate::consts::extract::{PC_SIGMA, PC_THRESHOLD};
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::ndimage::{correlate_same_zero, gradient, positive_median};

/// Principal Curvature.
///
/// 在高斯平滑后的梯度场上求 Hessian, 取较大的特征值作为谷线响应.
/// 梯度幅值低于 `threshold` 的位置视为平坦区域, 梯度置 0.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PrincipalCurvature {
    /// 高斯核标准差.
    pub sigma: f64,
    /// 梯度幅值阈值 (灰度单位).
    pub threshold: f64,
}

impl Default for PrincipalCurvature {
    fn default() -> Self {
        Self {
            sigma: PC_SIGMA,
            threshold: PC_THRESHOLD,
        }
    }
}

impl PrincipalCurvature {
    /// 构建并检查参数.
    pub fn new(sigma: f64, threshold: f64) -> VeinResult<Self> {
        let ret = Self { sigma, threshold };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(VeinError::config(format!(
                "Principal Curvature 的 sigma 必须为正数, 实际为 {}",
                self.sigma
            )));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(VeinError::config("Principal Curvature 的阈值必须为非负数"));
        }
        Ok(())
    }

    /// 最大主曲率, 负值截断为 0, 掩膜外为 0.
    pub fn curvature(
        &self,
        image: ArrayView2<f64>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<Array2<f64>> {
        ensure_same_shape(image.shape(), mask.shape())?;
        let k = GaussianKernels::new(self.sigma);
        // 导数核与图像做相关得到的是负梯度.
        let mut gx = correlate_same_zero(image, k.hx.view()).mapv(|v| -v);
        let mut gy = correlate_same_zero(image, k.hy.view()).mapv(|v| -v);

        let mut max_norm = 0.0_f64;
        Zip::from(&mut gx).and(&mut gy).for_each(|x, y| {
            let norm = x.hypot(*y);
            if norm < self.threshold {
                *x = 0.0;
                *y = 0.0;
            } else {
                max_norm = max_norm.max(norm);
            }
        });
        if max_norm > 0.0 {
            gx.mapv_inplace(|v| v / max_norm);
            gy.mapv_inplace(|v| v / max_norm);
        }

        let hxx = gradient(gx.view(), Axis(1));
        let hxy = gradient(gx.view(), Axis(0));
        let hyx = gradient(gy.view(), Axis(1));
        let hyy = gradient(gy.view(), Axis(0));

        let mut out = Array2::zeros(image.raw_dim());
        Zip::from(&mut out)
            .and(&mask)
            .and(&hxx)
            .and(&hxy)
            .and(&hyx)
            .and(&hyy)
            .for_each(|o, &m, &xx, &xy, &yx, &yy| {
                if m {
                    let disc = ((xx - yy).powi(2) + 4.0 * xy * yx).max(0.0);
                    *o = (0.5 * (xx + yy + disc.sqrt())).max(0.0);
                }
            });
        Ok(out)
    }
}

impl Extract for PrincipalCurvature {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        let lambda = self.curvature(image, mask)?;
        let veins = match positive_median(lambda.iter()) {
            Some(md) => lambda.mapv(|v| (v > md) as u8 as f64),
            None => Array2::zeros(lambda.raw_dim()),
        };
        debug!(
            "Principal Curvature, sigma {}, 静脉像素 {}",
            self.sigma,
            veins.iter().filter(|v| **v > 0.0).count()
        );
        Ok(Feature::Map(veins))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 第 20 行有一条高斯剖面的水平暗线, 越往右越深.
    fn dark_line() -> (Array2<f64>, Array2<bool>) {
        let image = Array2::from_shape_fn((40, 60), |(r, c)| {
            let d = r as f64 - 20.0;
            200.0 - (60.0 + c as f64) * (-d * d / 8.0).exp()
        });
        let mask = Array2::from_shape_fn((40, 60), |(r, c)| {
            (10..30).contains(&r) && (10..50).contains(&c)
        });
        (image, mask)
    }

    #[test]
    fn test_response_peaks_on_line() {
        let (image, mask) = dark_line();
        let pc = PrincipalCurvature::new(2.0, 4.0).unwrap();
        let lambda = pc.curvature(image.view(), mask.view()).unwrap();
        for c in 15..45 {
            assert!(lambda[[20, c]] > 0.0, "column {c}");
            assert!(lambda[[20, c]] >= lambda[[12, c]]);
            assert!(lambda[[20, c]] >= lambda[[28, c]]);
        }
        assert!(lambda.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_flat_image() {
        let image = Array2::from_elem((20, 20), 120.0);
        let mask = Array2::from_elem((20, 20), true);
        let mask_inner = Array2::from_shape_fn((20, 20), |pos| pos == (10, 10));
        let pc = PrincipalCurvature::default();
        let out = pc.extract(image.view(), mask_inner.view()).unwrap();
        assert!(out.as_map().unwrap().iter().all(|v| *v == 0.0));
        assert!(pc.extract(image.view(), mask.view()).is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(PrincipalCurvature::new(-1.0, 4.0).is_err());
        assert!(PrincipalCurvature::new(3.0, -4.0).is_err());
        assert!(PrincipalCurvature::new(3.0, 0.0).is_ok());
    }
}
