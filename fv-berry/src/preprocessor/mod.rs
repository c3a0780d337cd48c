//! 预处理: 裁剪 -> 掩膜 -> 归一化 -> 滤波.
//!
//! 每个阶段是一个封闭的 `enum`, 由 [`Preprocessor`] 按固定顺序组合.

use log::debug;
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::AnnotatedImage;
use crate::error::{ensure_same_shape, VeinResult};
use crate::Idx2d;

mod crop;
mod filter;
mod mask;
mod normalize;

pub use crop::FixedCrop;
pub use filter::HistogramEqualization;
pub use mask::{AnnotatedRoiMask, FixedMask, KonoMask, LeeMask, Padder, TomesLeeMask};
pub use normalize::{Affine, HuangNormalization};

/// 裁剪. ROI (若有) 随图像一起平移并截断.
pub trait Crop {
    /// 裁剪图像.
    fn crop(&self, sample: AnnotatedImage) -> VeinResult<AnnotatedImage>;
}

/// 估计手指区域掩膜. 掩膜与输入图像同形.
pub trait Mask {
    /// 计算掩膜.
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>>;
}

/// 几何归一化, 图像与掩膜同步变换.
pub trait Normalize {
    /// 归一化图像与掩膜.
    fn normalize(
        &self,
        image: ArrayView2<u8>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<(Array2<u8>, Array2<bool>)>;
}

/// 灰度滤波, 输出 `[0, 255]` 尺度的浮点图像.
pub trait Filter {
    /// 滤波.
    fn filter(&self, image: ArrayView2<u8>, mask: ArrayView2<bool>) -> VeinResult<Array2<f64>>;
}

/// 裁剪方式.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Cropper {
    /// 不裁剪.
    #[default]
    NoCrop,
    /// 固定边距裁剪.
    Fixed(FixedCrop),
}

impl Cropper {
    /// 检查参数. 边距与图像形状有关, 见 [`Cropper::output_shape`].
    #[inline]
    pub fn validate(&self) -> VeinResult<()> {
        Ok(())
    }

    /// 形状为 `shape` 的图像裁剪后的形状. 边距超出图像时返回
    /// [`VeinError::CropOutOfRange`](crate::VeinError::CropOutOfRange).
    pub fn output_shape(&self, shape: Idx2d) -> VeinResult<Idx2d> {
        match self {
            Cropper::NoCrop => Ok(shape),
            Cropper::Fixed(c) if c.is_identity() => Ok(shape),
            Cropper::Fixed(c) => {
                c.check(shape)?;
                Ok((shape.0 - c.top - c.bottom, shape.1 - c.left - c.right))
            }
        }
    }
}

impl Crop for Cropper {
    fn crop(&self, sample: AnnotatedImage) -> VeinResult<AnnotatedImage> {
        match self {
            Cropper::NoCrop => Ok(sample),
            Cropper::Fixed(c) => c.crop(sample),
        }
    }
}

/// 掩膜方式.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Masker {
    /// 全部为前景.
    NoMask,
    /// 固定边框.
    Fixed(FixedMask),
    /// 栅格化图像携带的 ROI.
    AnnotatedRoi,
    /// Kono 算法.
    Kono(KonoMask),
    /// Lee 算法.
    Lee(LeeMask),
    /// Tomes-Lee 算法.
    TomesLee(TomesLeeMask),
}

impl Default for Masker {
    fn default() -> Self {
        Masker::Lee(LeeMask::default())
    }
}

impl Masker {
    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        match self {
            Masker::Kono(m) => m.validate(),
            Masker::Lee(m) => m.validate(),
            Masker::TomesLee(m) => m.validate(),
            Masker::NoMask | Masker::Fixed(_) | Masker::AnnotatedRoi => Ok(()),
        }
    }
}

impl Mask for Masker {
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>> {
        match self {
            Masker::NoMask => Ok(Array2::from_elem(sample.shape(), true)),
            Masker::Fixed(m) => m.mask(sample),
            Masker::AnnotatedRoi => AnnotatedRoiMask.mask(sample),
            Masker::Kono(m) => m.mask(sample),
            Masker::Lee(m) => m.mask(sample),
            Masker::TomesLee(m) => m.mask(sample),
        }
    }
}

/// 归一化方式.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Normalizer {
    /// 不做归一化.
    NoNormalization,
    /// Huang 归一化.
    Huang(HuangNormalization),
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::Huang(HuangNormalization::default())
    }
}

impl Normalizer {
    /// 检查参数. 任意填充宽度与灰度都合法.
    #[inline]
    pub fn validate(&self) -> VeinResult<()> {
        Ok(())
    }
}

impl Normalize for Normalizer {
    fn normalize(
        &self,
        image: ArrayView2<u8>,
        mask: ArrayView2<bool>,
    ) -> VeinResult<(Array2<u8>, Array2<bool>)> {
        match self {
            Normalizer::NoNormalization => {
                ensure_same_shape(image.shape(), mask.shape())?;
                Ok((image.to_owned(), mask.to_owned()))
            }
            Normalizer::Huang(n) => n.normalize(image, mask),
        }
    }
}

/// 滤波方式.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum PostFilter {
    /// 只做类型转换.
    #[default]
    NoFilter,
    /// 掩膜内直方图均衡化.
    HistogramEqualization,
}

impl PostFilter {
    /// 检查参数. 两种滤波都没有参数.
    #[inline]
    pub fn validate(&self) -> VeinResult<()> {
        Ok(())
    }
}

impl Filter for PostFilter {
    fn filter(&self, image: ArrayView2<u8>, mask: ArrayView2<bool>) -> VeinResult<Array2<f64>> {
        match self {
            PostFilter::NoFilter => {
                ensure_same_shape(image.shape(), mask.shape())?;
                Ok(image.mapv(|v| v as f64))
            }
            PostFilter::HistogramEqualization => HistogramEqualization.filter(image, mask),
        }
    }
}

/// 预处理后的图像 (`[0, 255]` 尺度) 和掩膜, 两者同形.
#[derive(Clone, Debug, PartialEq)]
pub struct Preprocessed {
    /// 图像.
    pub image: Array2<f64>,
    /// 掩膜.
    pub mask: Array2<bool>,
}

/// 由四个阶段组成的预处理流水线.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Preprocessor {
    /// 裁剪.
    pub cropper: Cropper,
    /// 掩膜.
    pub masker: Masker,
    /// 归一化.
    pub normalizer: Normalizer,
    /// 滤波.
    pub filter: PostFilter,
}

impl Preprocessor {
    /// 组合四个阶段, 并检查参数.
    pub fn new(
        cropper: Cropper,
        masker: Masker,
        normalizer: Normalizer,
        filter: PostFilter,
    ) -> VeinResult<Self> {
        let ret = Self {
            cropper,
            masker,
            normalizer,
            filter,
        };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查全部四个阶段的参数.
    pub fn validate(&self) -> VeinResult<()> {
        self.cropper.validate()?;
        self.masker.validate()?;
        self.normalizer.validate()?;
        self.filter.validate()
    }

    /// 检查与图像形状有关的参数: 裁剪边距, 以及裁剪后固定掩膜的边框.
    ///
    /// 批量处理前用第一幅图像的形状调用一次, 可以避免逐个样本失败.
    pub fn validate_shape(&self, shape: Idx2d) -> VeinResult<()> {
        let cropped = self.cropper.output_shape(shape)?;
        if let Masker::Fixed(m) = &self.masker {
            m.make(cropped)?;
        }
        Ok(())
    }

    /// 依次执行裁剪、掩膜、归一化和滤波.
    pub fn process(&self, sample: AnnotatedImage) -> VeinResult<Preprocessed> {
        let cropped = self.cropper.crop(sample)?;
        let mask = self.masker.mask(&cropped)?;
        let (image, mask) = self.normalizer.normalize(cropped.image().view(), mask.view())?;
        let image = self.filter.filter(image.view(), mask.view())?;
        debug!(
            "预处理完成, 形状 {:?}, 前景像素 {}",
            image.dim(),
            mask.iter().filter(|v| **v).count()
        );
        Ok(Preprocessed { image, mask })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finger() -> AnnotatedImage {
        AnnotatedImage::new(Array2::from_shape_fn((60, 80), |(r, c)| {
            if (20..40).contains(&r) {
                150 + (c % 50) as u8
            } else {
                20
            }
        }))
    }

    #[test]
    fn test_default_pipeline() {
        let pre = Preprocessor::default();
        let out = pre.process(finger()).unwrap();
        // Huang 归一化在四周各扩展 5 像素.
        assert_eq!(out.image.dim(), (70, 90));
        assert_eq!(out.mask.dim(), out.image.dim());
        assert!(out.mask.iter().any(|v| *v));
    }

    #[test]
    fn test_pipeline_with_equalization() {
        let pre = Preprocessor::new(
            Cropper::Fixed(FixedCrop::new(2, 2, 3, 3)),
            Masker::Lee(LeeMask::new(4, 20, Some(Padder::default())).unwrap()),
            Normalizer::NoNormalization,
            PostFilter::HistogramEqualization,
        )
        .unwrap();
        let out = pre.process(finger()).unwrap();
        assert_eq!(out.image.dim(), (56, 74));
        for (v, m) in out.image.iter().zip(out.mask.iter()) {
            assert!((0.0..=255.0).contains(v));
            if !m {
                assert_eq!(*v, 0.0);
            }
        }
        assert!(out.image.iter().any(|v| *v > 254.999));
    }

    #[test]
    fn test_validate_shape() {
        let pre = Preprocessor::new(
            Cropper::Fixed(FixedCrop::new(30, 30, 0, 0)),
            Masker::NoMask,
            Normalizer::NoNormalization,
            PostFilter::NoFilter,
        )
        .unwrap();
        let err = pre.validate_shape((60, 80)).unwrap_err();
        assert!(matches!(err, crate::VeinError::CropOutOfRange { .. }));
        assert!(pre.validate_shape((61, 80)).is_ok());

        // 固定掩膜的边框按裁剪后的形状检查.
        let pre = Preprocessor {
            cropper: Cropper::Fixed(FixedCrop::new(2, 2, 10, 10)),
            masker: Masker::Fixed(FixedMask::new(0, 0, 30, 30)),
            ..pre
        };
        assert!(pre.validate_shape((60, 80)).is_err());
        assert!(pre.validate_shape((60, 81)).is_ok());
        assert_eq!(pre.cropper.output_shape((60, 81)).unwrap(), (56, 61));
        assert!(pre.validate().is_ok());
    }

    #[test]
    fn test_identity_pipeline() {
        let pre = Preprocessor::new(
            Cropper::NoCrop,
            Masker::NoMask,
            Normalizer::NoNormalization,
            PostFilter::NoFilter,
        )
        .unwrap();
        let sample = finger();
        let expected = sample.image().mapv(|v| v as f64);
        let out = pre.process(sample).unwrap();
        assert_eq!(out.image, expected);
        assert!(out.mask.iter().all(|v| *v));
    }
}
