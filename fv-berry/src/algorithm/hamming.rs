//! Hamming 距离.

use ndarray::ArrayView2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{mean_score, Match, Model};
use crate::error::{VeinError, VeinResult};
use crate::extractor::Feature;

/// Hamming 距离: 把注册样本和探针都按行优先展平为位向量 (非零为 1),
/// 返回不相同位所占的比例, 再对注册样本取平均.
///
/// 这是一个 **距离**: `0` 表示完全相同, `1` 表示完全互补, 越小越相似.
/// 只要求两者元素个数相同, 不要求形状相同.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HammingDistance;

impl HammingDistance {
    /// 单个注册样本与探针的距离.
    pub fn score_one(&self, model: ArrayView2<f64>, probe: ArrayView2<f64>) -> VeinResult<f64> {
        if model.len() != probe.len() {
            return Err(VeinError::shape(&[model.len()], &[probe.len()]));
        }
        if model.is_empty() {
            return Err(VeinError::EmptyInput("Hamming 距离的输入为空"));
        }
        let differ = model
            .iter()
            .zip(probe.iter())
            .filter(|(a, b)| (**a != 0.0) != (**b != 0.0))
            .count();
        Ok(differ as f64 / model.len() as f64)
    }
}

impl Match for HammingDistance {
    fn score(&self, model: &Model, probe: &Feature) -> VeinResult<f64> {
        let probe = probe.to_plane();
        mean_score(model, &probe, |m, p| self.score_one(m, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn model_of(bits: [f64; 12]) -> Model {
        HammingDistance
            .enroll(&[Feature::Histogram(bits.to_vec().into())])
            .unwrap()
    }

    #[test]
    fn test_hamming_distance() {
        // 全部不同.
        let model = model_of([0., 1., 1., 1., 0., 1., 1., 0., 0., 0., 1., 0.]);
        let probe = Feature::Map(array![[1., 0., 0., 0., 1., 0.], [0., 1., 1., 1., 0., 1.]]);
        assert_eq!(HammingDistance.score(&model, &probe).unwrap(), 1.0);

        // 完全相同.
        let model = model_of([0., 1., 1., 1., 0., 1., 0., 1., 1., 1., 0., 1.]);
        let probe = Feature::Map(array![[0., 1., 1., 1., 0., 1.], [0., 1., 1., 1., 0., 1.]]);
        assert_eq!(HammingDistance.score(&model, &probe).unwrap(), 0.0);

        // 一半不同.
        let model = model_of([0., 1., 1., 1., 0., 1., 1., 0., 0., 0., 1., 0.]);
        assert_eq!(HammingDistance.score(&model, &probe).unwrap(), 0.5);
    }

    #[test]
    fn test_mean_and_mismatch() {
        let probe = Feature::Map(array![[1., 0.], [0., 1.]]);
        let model = HammingDistance
            .enroll(&[
                Feature::Map(array![[1., 0.], [0., 1.]]),
                Feature::Map(array![[0., 0.], [0., 1.]]),
            ])
            .unwrap();
        assert_eq!(HammingDistance.score(&model, &probe).unwrap(), 0.125);

        let long = Feature::Map(array![[1., 0., 1.], [0., 1., 1.]]);
        let err = HammingDistance.score(&model, &long).unwrap_err();
        assert!(matches!(err, VeinError::ShapeMismatch { .. }));
    }
}
