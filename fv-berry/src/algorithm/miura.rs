//! Miura 匹配: 裁剪后的模板在探针上滑动求相关.

use log::debug;
use ndarray::{s, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{mean_score, Match, Model};
use crate::consts::matching::{MIURA_CH, MIURA_CW};
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::extractor::Feature;
use crate::ndimage::{argmax_first, correlate_valid};

/// Miura 匹配.
///
/// 每个注册样本在上下各裁去 `ch`、左右各裁去 `cw` 后, 在探针上滑动求相关 (`valid`),
/// 取第一个最大响应位置 `(t0, s0)`, 分数为
/// `Nm / (Σ 裁剪后的模板 + Σ 探针上对应的窗口)`. 对二值特征图分数在 `[0, 0.5]`,
/// 越大越相似.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MiuraMatch {
    /// 纵向裁剪量.
    pub ch: usize,
    /// 横向裁剪量.
    pub cw: usize,
}

impl Default for MiuraMatch {
    fn default() -> Self {
        Self {
            ch: MIURA_CH,
            cw: MIURA_CW,
        }
    }
}

impl MiuraMatch {
    /// 构建.
    #[inline]
    pub const fn new(ch: usize, cw: usize) -> Self {
        Self { ch, cw }
    }

    /// 单个注册样本与探针的分数.
    pub fn score_one(&self, model: ArrayView2<f64>, probe: ArrayView2<f64>) -> VeinResult<f64> {
        ensure_same_shape(model.shape(), probe.shape())?;
        let (h, w) = model.dim();
        let (ch, cw) = (self.ch, self.cw);
        if 2 * ch >= h || 2 * cw >= w {
            return Err(VeinError::config(format!(
                "Miura 裁剪量 ({ch}, {cw}) 对形状 {:?} 过大",
                (h, w)
            )));
        }
        let crop = model.slice(s![ch..h - ch, cw..w - cw]);
        let (th, tw) = crop.dim();

        let nm = correlate_valid(probe, crop);
        let Some(best) = argmax_first(nm.iter().copied()) else {
            return Ok(0.0);
        };
        let (t0, s0) = (best / nm.ncols(), best % nm.ncols());
        let peak = nm[[t0, s0]];
        let window = probe.slice(s![t0..t0 + th, s0..s0 + tw]);
        let denom = crop.sum() + window.sum();
        debug!("Miura 匹配, 峰值 {peak} 位于 ({t0}, {s0})");
        Ok(if denom == 0.0 { 0.0 } else { peak / denom })
    }
}

impl Match for MiuraMatch {
    fn score(&self, model: &Model, probe: &Feature) -> VeinResult<f64> {
        let probe = probe.to_plane();
        mean_score(model, &probe, |m, p| self.score_one(m, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// 几条互不平行的线段.
    fn veins() -> Array2<f64> {
        Array2::from_shape_fn((40, 60), |(r, c)| {
            let on = r == 20 && (10..50).contains(&c)
                || c == 30 && (5..35).contains(&r)
                || r + 10 == c && (12..28).contains(&r);
            on as u8 as f64
        })
    }

    #[test]
    fn test_self_match_is_half() {
        let map = veins();
        let mm = MiuraMatch::new(8, 5);
        let model = mm.enroll(&[Feature::Map(map.clone())]).unwrap();
        let score = mm.score(&model, &Feature::Map(map)).unwrap();
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_shifted_probe_scores_lower() {
        let map = veins();
        let shifted = Array2::from_shape_fn(map.dim(), |(r, c)| {
            if r >= 3 && c >= 2 {
                map[[r - 3, c - 2]]
            } else {
                0.0
            }
        });
        let unrelated =
            Array2::from_shape_fn(map.dim(), |(r, c)| ((r * 7 + c * 3) % 11 == 0) as u8 as f64);
        let mm = MiuraMatch::new(8, 5);
        let model = mm.enroll(&[Feature::Map(map)]).unwrap();
        let genuine = mm.score(&model, &Feature::Map(shifted)).unwrap();
        let impostor = mm.score(&model, &Feature::Map(unrelated)).unwrap();
        assert!(genuine > impostor, "{genuine} <= {impostor}");
        assert!((0.0..=0.5).contains(&genuine));
        assert!((0.0..=0.5).contains(&impostor));
    }

    /// 手工计算的非对称例子 (`ch = 1, cw = 2`).
    ///
    /// 原始的 `.mat` 参考数据无法获得, 这里逐项手算:
    /// 裁剪后的模板为 4 × 3, 共 6 个前景像素; 相关图
    ///
    /// ```text
    /// 0 0 1 3 2
    /// 0 0 0 2 3
    /// 0 0 0 2 5
    /// ```
    ///
    /// 唯一的峰值 5 位于 `(2, 4)`, 探针上对应窗口共 6 个前景像素,
    /// 因此分数为 `5 / (6 + 6)`. 模板边框上的两个像素不计入分母.
    #[test]
    fn test_hand_computed_score() {
        let model = ndarray::array![
            [1., 0., 0., 0., 0., 0., 0.],
            [0., 0., 1., 0., 0., 0., 0.],
            [0., 0., 1., 1., 0., 0., 0.],
            [0., 0., 0., 1., 0., 0., 0.],
            [0., 0., 0., 1., 1., 0., 0.],
            [0., 0., 0., 0., 0., 0., 1.]
        ];
        let probe = ndarray::array![
            [0., 0., 0., 0., 0., 0., 0.],
            [0., 0., 0., 0., 0., 0., 0.],
            [0., 0., 0., 0., 1., 1., 0.],
            [0., 0., 0., 0., 1., 1., 0.],
            [0., 0., 0., 0., 0., 0., 0.],
            [1., 0., 0., 0., 0., 1., 1.]
        ];
        let mm = MiuraMatch::new(1, 2);
        let score = mm.score_one(model.view(), probe.view()).unwrap();
        assert!((score - 5.0 / 12.0).abs() < 1e-12, "{score}");

        let enrolled = mm.enroll(&[Feature::Map(model)]).unwrap();
        let score = mm.score(&enrolled, &Feature::Map(probe)).unwrap();
        assert!((score - 5.0 / 12.0).abs() < 1e-12, "{score}");
    }

    #[test]
    fn test_mean_over_samples() {
        let map = veins();
        let empty = Array2::zeros(map.dim());
        let mm = MiuraMatch::new(8, 5);
        let model = mm
            .enroll(&[Feature::Map(map.clone()), Feature::Map(empty)])
            .unwrap();
        let score = mm.score(&model, &Feature::Map(map)).unwrap();
        assert_eq!(score, 0.25);
    }

    #[test]
    fn test_errors() {
        let mm = MiuraMatch::new(8, 5);
        let model = mm.enroll(&[Feature::Map(Array2::zeros((40, 60)))]).unwrap();
        let err = mm.score(&model, &Feature::Map(Array2::zeros((40, 61)))).unwrap_err();
        assert!(matches!(err, VeinError::ShapeMismatch { .. }));

        let small = mm.enroll(&[Feature::Map(Array2::zeros((16, 60)))]).unwrap();
        assert!(mm.score(&small, &Feature::Map(Array2::zeros((16, 60)))).is_err());
    }
}
