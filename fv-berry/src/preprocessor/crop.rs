//! 裁剪阶段.

use log::debug;
use ndarray::s;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Crop;
use crate::data::AnnotatedImage;
use crate::error::{VeinError, VeinResult};
use crate::Idx2d;

/// 从四边各裁掉固定数量的行 / 列. 全为 0 时等价于不裁剪.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FixedCrop {
    /// 上边裁掉的行数.
    pub top: usize,
    /// 下边裁掉的行数.
    pub bottom: usize,
    /// 左边裁掉的列数.
    pub left: usize,
    /// 右边裁掉的列数.
    pub right: usize,
}

impl FixedCrop {
    /// 构建.
    #[inline]
    pub const fn new(top: usize, bottom: usize, left: usize, right: usize) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// 四个边距是否都为 0.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }

    /// 检查边距是否能作用于形状为 `(h, w)` 的图像: 裁剪后至少保留一行一列.
    pub(crate) fn check(&self, (h, w): Idx2d) -> VeinResult<()> {
        if self.top + self.bottom >= h || self.left + self.right >= w {
            return Err(VeinError::CropOutOfRange {
                top: self.top,
                bottom: self.bottom,
                left: self.left,
                right: self.right,
                shape: (h, w),
            });
        }
        Ok(())
    }
}

impl Crop for FixedCrop {
    fn crop(&self, sample: AnnotatedImage) -> VeinResult<AnnotatedImage> {
        if self.is_identity() {
            return Ok(sample);
        }
        let (h, w) = sample.shape();
        self.check((h, w))?;

        let (image, roi) = sample.into_parts();
        let image = image
            .slice(s![self.top..h - self.bottom, self.left..w - self.right])
            .to_owned();
        debug!("裁剪 {:?} -> {:?}", (h, w), image.dim());

        Ok(match roi {
            Some(roi) => {
                let roi = roi
                    .translated((-(self.top as i64), -(self.left as i64)))
                    .clipped(image.dim())?;
                AnnotatedImage::with_roi(image, roi)
            }
            None => AnnotatedImage::new(image),
        })
    }
}
