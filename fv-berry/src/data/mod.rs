use ndarray::Array2;

use crate::error::{VeinError, VeinResult};
use crate::Idx2d;

pub mod mask;
pub mod roi;
pub mod save;

pub use mask::{
    intersect_ratio, intersect_ratio_of_complement, jaccard_index, mask_to_image,
    mask_to_image_as, poly_to_mask, DynImage, MaskPixel,
};
pub use roi::{assert_points, fix_points, Roi};
pub use save::{ImgWriteRaw, ImgWriteVis};

/// 原始灰度图像及其可选的 ROI 标注.
///
/// ROI 作为显式字段随图像一同在裁剪、掩膜阶段之间传递.
/// 裁剪会同时平移并截断 ROI, 使其始终与图像对应.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedImage {
    image: Array2<u8>,
    roi: Option<Roi>,
}

impl AnnotatedImage {
    /// 不带 ROI 的图像.
    #[inline]
    pub fn new(image: Array2<u8>) -> Self {
        Self { image, roi: None }
    }

    /// 带 ROI 的图像.
    #[inline]
    pub fn with_roi(image: Array2<u8>, roi: Roi) -> Self {
        Self {
            image,
            roi: Some(roi),
        }
    }

    /// 图像.
    #[inline]
    pub fn image(&self) -> &Array2<u8> {
        &self.image
    }

    /// ROI 标注 (若有).
    #[inline]
    pub fn roi(&self) -> Option<&Roi> {
        self.roi.as_ref()
    }

    /// 获取 ROI, 没有时返回 [`VeinError::MissingRoi`].
    #[inline]
    pub fn require_roi(&self) -> VeinResult<&Roi> {
        self.roi.as_ref().ok_or(VeinError::MissingRoi)
    }

    /// 图像形状 `(高, 宽)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.image.dim()
    }

    /// 拆分为图像和 ROI.
    #[inline]
    pub fn into_parts(self) -> (Array2<u8>, Option<Roi>) {
        (self.image, self.roi)
    }
}

impl From<Array2<u8>> for AnnotatedImage {
    #[inline]
    fn from(image: Array2<u8>) -> Self {
        Self::new(image)
    }
}
