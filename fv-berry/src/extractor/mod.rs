//! 特征提取.
//!
//! 输入为预处理后的 `[0, 255]` 尺度浮点图像及其掩膜, 输出 [`Feature`].
//! 静脉在图像中表现为暗的谷线, 各算法都以此为前提.

use ndarray::{Array1, Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::VeinResult;

mod cross_corr;
mod lbp;
mod max_curvature;
mod principal_curvature;
mod repeated_line;
mod wide_line;

pub use cross_corr::NormalisedCrossCorr;
pub use lbp::{LbpMapping, LocalBinaryPatterns};
pub use max_curvature::MaximumCurvature;
pub use principal_curvature::PrincipalCurvature;
pub use repeated_line::RepeatedLineTracking;
pub use wide_line::WideLineDetector;

/// 提取得到的特征.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Feature {
    /// 与 (可能缩放后的) 图像同形的特征图, 二值图以 0/1 表示.
    Map(Array2<f64>),
    /// 拼接后的一维直方图.
    Histogram(Array1<f64>),
    /// 每行一个分块的直方图.
    BlockHistograms(Array2<f64>),
    /// 只记录非零项的直方图.
    SparseHistogram {
        /// 稠密形式的长度.
        len: usize,
        /// 非零项下标, 严格递增.
        indices: Vec<usize>,
        /// 非零项的值.
        values: Vec<f64>,
    },
}

impl Feature {
    /// 特征图视图. 直方图类特征返回 `None`.
    pub fn as_map(&self) -> Option<ArrayView2<f64>> {
        match self {
            Feature::Map(map) => Some(map.view()),
            _ => None,
        }
    }

    /// 稠密形式的形状.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Feature::Map(a) | Feature::BlockHistograms(a) => a.shape().to_vec(),
            Feature::Histogram(a) => vec![a.len()],
            Feature::SparseHistogram { len, .. } => vec![*len],
        }
    }

    /// 转为二维平面: 特征图与分块直方图保持原样, 一维直方图视为单行.
    pub fn to_plane(&self) -> Array2<f64> {
        match self {
            Feature::Map(a) | Feature::BlockHistograms(a) => a.clone(),
            Feature::Histogram(a) => a.clone().insert_axis(ndarray::Axis(0)),
            Feature::SparseHistogram {
                len,
                indices,
                values,
            } => {
                let mut dense = Array2::zeros((1, *len));
                for (&i, &v) in indices.iter().zip(values) {
                    if i < *len {
                        dense[[0, i]] = v;
                    }
                }
                dense
            }
        }
    }
}

/// 从预处理后的图像中提取特征.
pub trait Extract {
    /// 提取特征. `image` 与 `mask` 必须同形.
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature>;
}

/// 特征提取方式.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Extractor {
    /// Wide Line Detector.
    WideLineDetector(WideLineDetector),
    /// Repeated Line Tracking.
    RepeatedLineTracking(RepeatedLineTracking),
    /// Maximum Curvature.
    MaximumCurvature(MaximumCurvature),
    /// Principal Curvature.
    PrincipalCurvature(PrincipalCurvature),
    /// 分块 LBP 直方图.
    LocalBinaryPatterns(LocalBinaryPatterns),
    /// 掩膜内的原始灰度.
    NormalisedCrossCorr,
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::RepeatedLineTracking(RepeatedLineTracking::default())
    }
}

impl Extractor {
    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        match self {
            Extractor::WideLineDetector(e) => e.validate(),
            Extractor::RepeatedLineTracking(e) => e.validate(),
            Extractor::MaximumCurvature(e) => e.validate(),
            Extractor::PrincipalCurvature(e) => e.validate(),
            Extractor::LocalBinaryPatterns(e) => e.validate(),
            Extractor::NormalisedCrossCorr => Ok(()),
        }
    }
}

impl Extract for Extractor {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        match self {
            Extractor::WideLineDetector(e) => e.extract(image, mask),
            Extractor::RepeatedLineTracking(e) => e.extract(image, mask),
            Extractor::MaximumCurvature(e) => e.extract(image, mask),
            Extractor::PrincipalCurvature(e) => e.extract(image, mask),
            Extractor::LocalBinaryPatterns(e) => e.extract(image, mask),
            Extractor::NormalisedCrossCorr => NormalisedCrossCorr.extract(image, mask),
        }
    }
}
