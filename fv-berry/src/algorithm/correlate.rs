//! 不裁剪的归一化模板匹配.

use ndarray::{Array2, ArrayView2, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{mean_score, Match, Model};
use crate::error::{ensure_same_shape, VeinResult};
use crate::extractor::Feature;

/// 归一化模板匹配 (Lewis, 1995), `valid` 模式.
///
/// 每个位置的响应是模板与对应窗口的 Pearson 相关系数, 在 `[-1, 1]` 之间;
/// 窗口或模板为常数时响应为 0. 模板大于输入时输出为空.
pub fn match_template(image: ArrayView2<f64>, template: ArrayView2<f64>) -> Array2<f64> {
    let (ih, iw) = image.dim();
    let (th, tw) = template.dim();
    if th == 0 || tw == 0 || th > ih || tw > iw {
        return Array2::zeros((0, 0));
    }
    let n = template.len() as f64;
    let t_mean = template.sum() / n;
    let centred = template.mapv(|v| v - t_mean);
    let t_energy = centred.iter().map(|v| v * v).sum::<f64>();

    let (oh, ow) = (ih - th + 1, iw - tw + 1);
    let mut out = Array2::zeros((oh, ow));
    Zip::from(&mut out)
        .and(image.windows((th, tw)))
        .for_each(|o, win| {
            let sum = win.sum();
            let sq: f64 = win.iter().map(|v| v * v).sum();
            let num = Zip::from(&win)
                .and(&centred)
                .fold(0.0, |acc, &a, &b| acc + a * b);
            let var = (sq - sum * sum / n).max(0.0);
            let den = (var * t_energy).sqrt();
            *o = if den > f64::EPSILON { num / den } else { 0.0 };
        });
    out
}

/// 不裁剪的归一化模板匹配. 每个注册样本取最大响应, 再对样本取平均; 越大越相似.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correlate;

impl Correlate {
    /// 单个注册样本与探针的分数.
    pub fn score_one(&self, model: ArrayView2<f64>, probe: ArrayView2<f64>) -> VeinResult<f64> {
        ensure_same_shape(model.shape(), probe.shape())?;
        let response = match_template(probe, model);
        Ok(response
            .iter()
            .copied()
            .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))))
            .unwrap_or(0.0))
    }
}

impl Match for Correlate {
    fn score(&self, model: &Model, probe: &Feature) -> VeinResult<f64> {
        let probe = probe.to_plane();
        mean_score(model, &probe, |m, p| self.score_one(m, p))
    }
}
