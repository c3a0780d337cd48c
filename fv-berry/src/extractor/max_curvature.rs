//! Maximum Curvature (Miura 等, 2007).
//!
//! 按文献描述实现, 尚无参考数据校验. 四个步骤分别公开, 便于检查中间结果:
//!
//! 1. [`MaximumCurvature::detect_valleys`]: 四个方向上的截面曲率;
//! 2. [`MaximumCurvature::eval_vein_probabilities`]: 每段正曲率区间的中心打分;
//! 3. [`MaximumCurvature::connect_centres`]: 连接相邻的中心, 抑制孤立点;
//! 4. [`MaximumCurvature::binarise`]: 以正值中位数二值化.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use log::debug;
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Extract, Feature};
use crate::consts::extract::MC_SIGMA;
use crate::consts::gray::MAX_F64;
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::ndimage::{argmax_first, correlate_same_zero, kernel_from_fn, positive_median};
use crate::Idx2d;

/// 二维高斯核及其各阶偏导数, 窗口半宽 `ceil(4σ)`.
pub(super) struct GaussianKernels {
    pub hx: Array2<f64>,
    pub hxx: Array2<f64>,
    pub hy: Array2<f64>,
    pub hyy: Array2<f64>,
    pub hxy: Array2<f64>,
}

impl GaussianKernels {
    pub(super) fn new(sigma: f64) -> Self {
        let half = (4.0 * sigma).ceil() as usize;
        let s2 = sigma * sigma;
        let s4 = s2 * s2;
        let h = move |x: f64, y: f64| (-(x * x + y * y) / (2.0 * s2)).exp() / (2.0 * PI * s2);
        Self {
            hx: kernel_from_fn(half, |x, y| -x / s2 * h(x, y)),
            hxx: kernel_from_fn(half, |x, y| (x * x - s2) / s4 * h(x, y)),
            hy: kernel_from_fn(half, |x, y| -y / s2 * h(x, y)),
            hyy: kernel_from_fn(half, |x, y| (y * y - s2) / s4 * h(x, y)),
            hxy: kernel_from_fn(half, |x, y| x * y / s4 * h(x, y)),
        }
    }
}

/// 扫描方向.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    /// 沿行.
    Horizontal,
    /// 沿列.
    Vertical,
    /// 左上到右下, `\`.
    Diagonal,
    /// 左下到右上, `/`.
    AntiDiagonal,
}

impl Direction {
    const ALL: [Direction; 4] = [
        Direction::Horizontal,
        Direction::Vertical,
        Direction::Diagonal,
        Direction::AntiDiagonal,
    ];

    /// 该方向上所有直线的像素坐标, 每条直线内按扫描顺序排列.
    fn lines(self, (h, w): Idx2d) -> Vec<Vec<Idx2d>> {
        if h == 0 || w == 0 {
            return Vec::new();
        }
        match self {
            Direction::Horizontal => (0..h).map(|r| (0..w).map(|c| (r, c)).collect()).collect(),
            Direction::Vertical => (0..w).map(|c| (0..h).map(|r| (r, c)).collect()).collect(),
            Direction::Diagonal => (0..h + w - 1)
                .map(|k| {
                    // 列减行为 k - (h - 1).
                    let (r0, c0) = if k < h { (h - 1 - k, 0) } else { (0, k + 1 - h) };
                    (0..)
                        .map(|i| (r0 + i, c0 + i))
                        .take_while(|&(r, c)| r < h && c < w)
                        .collect()
                })
                .collect(),
            Direction::AntiDiagonal => (0..h + w - 1)
                .map(|k| {
                    // 行加列为 k, 自下而上.
                    let (r0, c0) = if k < h { (k, 0) } else { (h - 1, k + 1 - h) };
                    (0..)
                        .map(|i| (r0.wrapping_sub(i), c0 + i))
                        .take_while(|&(r, c)| r < h && c < w)
                        .collect()
                })
                .collect(),
        }
    }
}

/// 一维信号中每段连续正值区间的最大值位置记为 `最大值 × 区间长度`, 其余为 0.
fn score_runs(a: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len()];
    let mut i = 0;
    while i < a.len() {
        if a[i] <= 0.0 {
            i += 1;
            continue;
        }
        let start = i;
        while i < a.len() && a[i] > 0.0 {
            i += 1;
        }
        let run = &a[start..i];
        if let Some(best) = argmax_first(run.iter().copied()) {
            out[start + best] = run[best] * run.len() as f64;
        }
    }
    out
}

/// `c[i] = min(max(a[i-1], a[i-2]), max(a[i+1], a[i+2]))`, 两端各 2 个元素为 0.
fn connect_1d(a: &[f64]) -> Vec<f64> {
    let n = a.len();
    let mut out = vec![0.0; n];
    if n < 5 {
        return out;
    }
    for i in 2..n - 2 {
        out[i] = a[i - 1].max(a[i - 2]).min(a[i + 1].max(a[i + 2]));
    }
    out
}

/// Maximum Curvature.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaximumCurvature {
    /// 高斯核标准差.
    pub sigma: f64,
}

impl Default for MaximumCurvature {
    fn default() -> Self {
        Self { sigma: MC_SIGMA }
    }
}

impl MaximumCurvature {
    /// 构建并检查参数.
    pub fn new(sigma: f64) -> VeinResult<Self> {
        let ret = Self { sigma };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(VeinError::config(format!(
                "Maximum Curvature 的 sigma 必须为正数, 实际为 {}",
                self.sigma
            )));
        }
        Ok(())
    }

    /// 水平、竖直、`\`、`/` 四个方向的截面曲率 `κ = f'' / (1 + f'²)^{3/2}`,
    /// 掩膜外为 0. 图像先缩放到 `[0, 1]`.
    pub fn detect_valleys(
        &self,
        image: ArrayView2<f64>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<[Array2<f64>; 4]> {
        ensure_same_shape(image.shape(), mask.shape())?;
        let image = image.mapv(|v| v / MAX_F64);
        let k = GaussianKernels::new(self.sigma);
        let filter = |kernel: &Array2<f64>| correlate_same_zero(image.view(), kernel.view());
        let (fx, fxx, fy, fyy, fxy) = (
            filter(&k.hx),
            filter(&k.hxx),
            filter(&k.hy),
            filter(&k.hyy),
            filter(&k.hxy),
        );

        let curvature = |second: f64, first: f64| second / (1.0 + first * first).powf(1.5);
        let mut out = [(); 4].map(|_| Array2::zeros(image.raw_dim()));
        for (pos, &m) in mask.indexed_iter() {
            if !m {
                continue;
            }
            let (dx, dy) = (fx[pos], fy[pos]);
            let (dxx, dyy, dxy) = (fxx[pos], fyy[pos], fxy[pos]);
            let f1 = FRAC_1_SQRT_2 * (dx + dy);
            let f2 = FRAC_1_SQRT_2 * (dx - dy);
            let f11 = 0.5 * dxx + dxy + 0.5 * dyy;
            let f22 = 0.5 * dxx - dxy + 0.5 * dyy;
            out[0][pos] = curvature(dxx, dx);
            out[1][pos] = curvature(dyy, dy);
            out[2][pos] = curvature(f11, f1);
            out[3][pos] = curvature(f22, f2);
        }
        Ok(out)
    }

    /// 沿每个方向的每条直线, 为正曲率区间的中心打分并累加.
    pub fn eval_vein_probabilities(&self, kappa: &[Array2<f64>; 4]) -> Array2<f64> {
        let shape = kappa[0].dim();
        let mut v = Array2::zeros(shape);
        for (dir, k) in Direction::ALL.iter().zip(kappa) {
            for line in dir.lines(shape) {
                let values: Vec<f64> = line.iter().map(|&pos| k[pos]).collect();
                for (&pos, s) in line.iter().zip(score_runs(&values)) {
                    v[pos] += s;
                }
            }
        }
        v
    }

    /// 在四个方向上连接中心, 取最大值.
    pub fn connect_centres(&self, v: ArrayView2<f64>) -> Array2<f64> {
        let shape = v.dim();
        let mut g = Array2::zeros(shape);
        for dir in Direction::ALL {
            for line in dir.lines(shape) {
                let values: Vec<f64> = line.iter().map(|&pos| v[pos]).collect();
                for (&pos, c) in line.iter().zip(connect_1d(&values)) {
                    if c > g[pos] {
                        g[pos] = c;
                    }
                }
            }
        }
        g
    }

    /// 大于正值中位数的位置为静脉. 没有正值时全为 0.
    pub fn binarise(&self, g: ArrayView2<f64>) -> Array2<f64> {
        match positive_median(g.iter()) {
            Some(md) => g.mapv(|v| (v > md) as u8 as f64),
            None => Array2::zeros(g.raw_dim()),
        }
    }
}

impl Extract for MaximumCurvature {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        let kappa = self.detect_valleys(image, mask)?;
        let v = self.eval_vein_probabilities(&kappa);
        let g = self.connect_centres(v.view());
        let veins = self.binarise(g.view());
        debug!(
            "Maximum Curvature, sigma {}, 静脉像素 {}",
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
            (6..34).contains(&r) && (6..54).contains(&c)
        });
        (image, mask)
    }

    #[test]
    fn test_lines_cover_every_pixel_once() {
        let shape = (3, 5);
        for dir in Direction::ALL {
            let mut seen = Array2::<u8>::zeros(shape);
            for line in dir.lines(shape) {
                for pos in line {
                    seen[pos] += 1;
                }
            }
            assert!(seen.iter().all(|v| *v == 1), "{dir:?}");
        }
        let anti = Direction::AntiDiagonal.lines(shape);
        assert_eq!(anti.len(), 7);
        assert_eq!(anti[2], vec![(2, 0), (1, 1), (0, 2)]);
        let diag = Direction::Diagonal.lines(shape);
        assert_eq!(diag[0], vec![(2, 0)]);
        assert_eq!(diag[2], vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_score_runs() {
        let a = [0.0, 1.0, 3.0, 2.0, -1.0, 0.5, 0.0, 2.0];
        assert_eq!(
            score_runs(&a),
            vec![0.0, 0.0, 9.0, 0.0, 0.0, 0.5, 0.0, 2.0]
        );
    }

    #[test]
    fn test_connect_1d() {
        let a = [0.0, 4.0, 0.0, 0.0, 3.0, 0.0];
        // i = 2: min(max(4, 0), max(0, 3)) = 3; i = 3: min(max(0, 4), max(3, 0)) = 3.
        assert_eq!(connect_1d(&a), vec![0.0, 0.0, 3.0, 3.0, 0.0, 0.0]);
        assert_eq!(connect_1d(&[1.0, 2.0, 3.0]), vec![0.0; 3]);
    }

    #[test]
    fn test_ridge_on_dark_line() {
        let (image, mask) = dark_line();
        let mc = MaximumCurvature::new(2.0).unwrap();
        let kappa = mc.detect_valleys(image.view(), mask.view()).unwrap();
        let v = mc.eval_vein_probabilities(&kappa);
        for c in 10..50 {
            let column = v.column(c);
            assert_eq!(argmax_first(column.iter().copied()), Some(20), "column {c}");
        }

        let veins = mc.extract(image.view(), mask.view()).unwrap();
        let veins = veins.as_map().unwrap();
        assert!(veins.iter().any(|v| *v == 1.0));
        for ((r, _), v) in veins.indexed_iter() {
            if *v > 0.0 {
                assert!((18..=22).contains(&r), "row {r}");
            }
        }
    }

    #[test]
    fn test_binarise_without_positive() {
        let mc = MaximumCurvature::default();
        let g = Array2::from_elem((3, 3), -1.0);
        assert!(mc.binarise(g.view()).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_validate() {
        assert!(MaximumCurvature::new(0.0).is_err());
        assert!(MaximumCurvature::new(f64::NAN).is_err());
    }
}
