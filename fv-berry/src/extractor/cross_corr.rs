//! 原始灰度特征, 配合归一化互相关匹配使用.

use ndarray::ArrayView2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Extract, Feature};
use crate::error::{ensure_same_shape, VeinResult};
use crate::ndimage::apply_mask;

/// 直接返回 `image * mask`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalisedCrossCorr;

impl Extract for NormalisedCrossCorr {
    fn extract(&self, image: ArrayView2<f64>, mask: ArrayView2<bool>) -> VeinResult<Feature> {
        ensure_same_shape(image.shape(), mask.shape())?;
        Ok(Feature::Map(apply_mask(image, mask)))
    }
}
