//! 注册与匹配.
//!
//! 注册只是把同一个体的若干特征堆叠成 [`Model`], 不计算任何统计量;
//! 匹配时对每个注册样本分别打分, 再取平均.

use ndarray::{Array2, Array3, ArrayView2, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::extractor::Feature;
use crate::Idx2d;

mod correlate;
mod hamming;
mod miura;

pub use correlate::{match_template, Correlate};
pub use hamming::HammingDistance;
pub use miura::MiuraMatch;

/// 注册模板: 同一个体的若干特征, 每个特征是一个二维平面.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Model {
    samples: Array3<f64>,
}

impl Model {
    /// 堆叠若干形状相同的特征. 一维直方图视为单行平面.
    pub fn from_samples(samples: &[Feature]) -> VeinResult<Self> {
        let first = samples
            .first()
            .ok_or(VeinError::EmptyInput("注册时没有任何样本"))?
            .to_plane();
        let (h, w) = first.dim();
        let mut stacked = Array3::zeros((samples.len(), h, w));
        stacked.index_axis_mut(Axis(0), 0).assign(&first);
        for (i, sample) in samples.iter().enumerate().skip(1) {
            let plane = sample.to_plane();
            ensure_same_shape(first.shape(), plane.shape())?;
            stacked.index_axis_mut(Axis(0), i).assign(&plane);
        }
        Ok(Self { samples: stacked })
    }

    /// 由一个已经堆叠好的三维数组构建, 第 0 维为样本.
    pub fn from_array(samples: Array3<f64>) -> VeinResult<Self> {
        if samples.len_of(Axis(0)) == 0 {
            return Err(VeinError::EmptyInput("注册时没有任何样本"));
        }
        Ok(Self { samples })
    }

    /// 样本个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    /// 是否没有样本. 通过构造函数得到的模板总是非空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 每个样本平面的形状.
    #[inline]
    pub fn plane_shape(&self) -> Idx2d {
        let (_, h, w) = self.samples.dim();
        (h, w)
    }

    /// 依次访问各样本.
    pub fn samples(&self) -> impl Iterator<Item = ArrayView2<'_, f64>> {
        self.samples.outer_iter()
    }

    /// 全部样本.
    #[inline]
    pub fn as_array(&self) -> &Array3<f64> {
        &self.samples
    }
}

/// 注册与打分.
pub trait Match {
    /// 堆叠注册样本.
    fn enroll(&self, samples: &[Feature]) -> VeinResult<Model> {
        Model::from_samples(samples)
    }

    /// 探针与模板的分数.
    fn score(&self, model: &Model, probe: &Feature) -> VeinResult<f64>;
}

/// 对模板中的每个样本打分并取平均.
pub(crate) fn mean_score<F>(
    model: &Model,
    probe: &Array2<f64>,
    mut per_sample: F,
) -> VeinResult<f64>
where
    F: FnMut(ArrayView2<f64>, ArrayView2<f64>) -> VeinResult<f64>,
{
    if model.is_empty() {
        return Err(VeinError::EmptyInput("模板中没有任何样本"));
    }
    let mut total = 0.0;
    for sample in model.samples() {
        total += per_sample(sample, probe.view())?;
    }
    Ok(total / model.len() as f64)
}

/// 匹配方式.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Matcher {
    /// Miura 匹配.
    Miura(MiuraMatch),
    /// 不裁剪的归一化模板匹配.
    Correlate,
    /// Hamming 距离.
    HammingDistance,
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::Miura(MiuraMatch::default())
    }
}

impl Matcher {
    /// 分数是否为距离, 即越小越相似.
    #[inline]
    pub fn is_distance(&self) -> bool {
        matches!(self, Matcher::HammingDistance)
    }

    /// 检查参数.
    #[inline]
    pub fn validate(&self) -> VeinResult<()> {
        Ok(())
    }
}

impl Match for Matcher {
    fn score(&self, model: &Model, probe: &Feature) -> VeinResult<f64> {
        match self {
            Matcher::Miura(m) => m.score(model, probe),
            Matcher::Correlate => Correlate.score(model, probe),
            Matcher::HammingDistance => HammingDistance.score(model, probe),
        }
    }
}
