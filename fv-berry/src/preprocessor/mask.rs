//! 掩膜阶段: 估计图像中手指所在的区域.
//!
//! Kono, Lee 和 Tomes-Lee 三种算法都是按列 (及按行) 寻找边缘响应的极值:
//! 上半部分的最大响应是手指上边缘, 下半部分的最小响应是手指下边缘.
//! 估计前可以先在图像四周做常数填充 ([`Padder`]), 以便手指贴近图像边界时也能找到边缘,
//! 返回的掩膜会去掉填充部分.

use log::debug;
use ndarray::{s, Array2, ArrayView2, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Mask;
use crate::consts::gray::MAX_F64;
use crate::consts::preprocess::*;
use crate::data::{poly_to_mask, AnnotatedImage};
use crate::error::{VeinError, VeinResult};
use crate::ndimage::{argmax_first, argmin_first, convolve_nearest, kernel_from_fn, median};
use crate::Idx2d;

/// 除边框之外全部为前景的掩膜. 边距全为 0 时等价于不使用掩膜.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FixedMask {
    /// 上边框行数.
    pub top: usize,
    /// 下边框行数.
    pub bottom: usize,
    /// 左边框列数.
    pub left: usize,
    /// 右边框列数.
    pub right: usize,
}

impl FixedMask {
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

    /// 生成形状为 `(h, w)` 的掩膜. 边框吞掉整幅图像时返回
    /// [`VeinError::CropOutOfRange`].
    pub fn make(&self, (h, w): Idx2d) -> VeinResult<Array2<bool>> {
        if self.top + self.bottom >= h || self.left + self.right >= w {
            return Err(VeinError::CropOutOfRange {
                top: self.top,
                bottom: self.bottom,
                left: self.left,
                right: self.right,
                shape: (h, w),
            });
        }
        let mut mask = Array2::from_elem((h, w), false);
        mask.slice_mut(s![self.top..h - self.bottom, self.left..w - self.right])
            .fill(true);
        Ok(mask)
    }
}

impl Mask for FixedMask {
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>> {
        self.make(sample.shape())
    }
}

/// 直接将图像携带的 ROI 多边形栅格化为掩膜. 多边形边线上的像素属于前景.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnnotatedRoiMask;

impl Mask for AnnotatedRoiMask {
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>> {
        let roi = sample.require_roi()?;
        Ok(poly_to_mask(sample.shape(), roi.points()))
    }
}

/// 估计掩膜前, 在图像四周填充 `width` 像素宽、灰度为 `constant` 的边框.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Padder {
    /// 填充宽度. 为 0 时不做任何填充.
    pub width: usize,
    /// 填充灰度.
    pub constant: u8,
}

impl Default for Padder {
    fn default() -> Self {
        Self {
            width: PADDING_WIDTH,
            constant: PADDING_CONSTANT,
        }
    }
}

impl Padder {
    /// 构建.
    #[inline]
    pub const fn new(width: usize, constant: u8) -> Self {
        Self { width, constant }
    }

    /// 填充后的图像.
    pub fn pad(&self, image: ArrayView2<u8>) -> Array2<u8> {
        let (h, w) = image.dim();
        let p = self.width;
        let mut out = Array2::from_elem((h + 2 * p, w + 2 * p), self.constant);
        out.slice_mut(s![p..p + h, p..p + w]).assign(&image);
        out
    }

    /// 去掉 [`Padder::pad`] 添加的边框.
    pub fn strip<T: Clone>(&self, padded: Array2<T>) -> Array2<T> {
        if self.width == 0 {
            return padded;
        }
        let (h, w) = padded.dim();
        let p = self.width;
        padded.slice(s![p..h - p, p..w - p]).to_owned()
    }
}

/// 填充 (若有) 并转换为 `[0, 1]` 浮点图像.
fn prepare(padder: &Option<Padder>, image: ArrayView2<u8>) -> VeinResult<Array2<f64>> {
    if image.is_empty() {
        return Err(VeinError::EmptyInput("图像为空"));
    }
    let to_unit = |v: u8| v as f64 / MAX_F64;
    Ok(match padder {
        Some(p) => p.pad(image).mapv(to_unit),
        None => image.mapv(to_unit),
    })
}

#[inline]
fn finish(padder: &Option<Padder>, mask: Array2<bool>) -> Array2<bool> {
    match padder {
        Some(p) => p.strip(mask),
        None => mask,
    }
}

/// 按列填充 `[up, end)`, `end` 会被截断到图像高度.
fn fill_columns<I>(shape: Idx2d, spans: I) -> Array2<bool>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let (h, _) = shape;
    let mut mask = Array2::from_elem(shape, false);
    for (c, (up, end)) in spans.into_iter().enumerate() {
        let end = end.min(h);
        if up < end {
            mask.slice_mut(s![up..end, c]).fill(true);
        }
    }
    mask
}

/// Kono 等人的手指区域检测: 用高斯函数的纵向导数滤波, 按列寻找上下边缘.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KonoMask {
    sigma: f64,
    padder: Option<Padder>,
}

impl Default for KonoMask {
    fn default() -> Self {
        Self {
            sigma: KONO_SIGMA,
            padder: Some(Padder::default()),
        }
    }
}

impl KonoMask {
    /// `sigma` 为高斯核标准差, 必须为正数.
    pub fn new(sigma: f64, padder: Option<Padder>) -> VeinResult<Self> {
        let ret = Self { sigma, padder };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(VeinError::config(format!(
                "KonoMask 的 sigma 必须为正数, 实际为 {}",
                self.sigma
            )));
        }
        Ok(())
    }

    /// 纵向高斯导数核, 尺寸为 `2 * ceil(4 sigma) + 1`.
    pub fn kernel(&self) -> Array2<f64> {
        let sigma = self.sigma;
        let winsize = (4.0 * sigma).ceil() as usize;
        let norm = 2.0 * std::f64::consts::PI * sigma.powi(4);
        kernel_from_fn(winsize, |x, y| {
            -y / norm * (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
        })
    }
}

impl Mask for KonoMask {
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>> {
        let image = prepare(&self.padder, sample.image().view())?;
        let (h, w) = image.dim();
        let half = if h % 2 == 0 { h / 2 + 1 } else { (h + 1) / 2 };

        let fy = convolve_nearest(image.view(), self.kernel().view());
        let spans = fy.axis_iter(Axis(1)).map(|col| {
            let up = argmax_first(col.slice(s![..half]).iter().copied()).unwrap_or(0);
            let lo = argmin_first(col.slice(s![half - 1..]).iter().copied()).unwrap_or(0);
            (up, lo + h - half + 2)
        });
        let mask = fill_columns((h, w), spans);
        debug!("Kono 掩膜, sigma = {}, 形状 {:?}", self.sigma, (h, w));
        Ok(finish(&self.padder, mask))
    }
}

/// Lee 等人的手指区域检测: 用上 `+1` 下 `-1` 的矩形核滤波, 按列寻找上下边缘.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LeeMask {
    filter_height: usize,
    filter_width: usize,
    padder: Option<Padder>,
}

impl Default for LeeMask {
    fn default() -> Self {
        Self {
            filter_height: LEE_FILTER_HEIGHT,
            filter_width: LEE_FILTER_WIDTH,
            padder: Some(Padder::default()),
        }
    }
}

/// 检查 Lee 核的尺寸: 高度为不小于 2 的偶数, 宽度不小于 1.
fn check_lee_filter(name: &str, height: usize, width: usize) -> VeinResult<()> {
    if height < 2 || height % 2 != 0 {
        return Err(VeinError::config(format!(
            "{name} 的滤波核高度必须是不小于 2 的偶数, 实际为 {height}"
        )));
    }
    if width == 0 {
        return Err(VeinError::config(format!("{name} 的滤波核宽度不能为 0")));
    }
    Ok(())
}

/// `fh × fw` 的全 1 核, 下半部分为 -1.
fn lee_kernel(fh: usize, fw: usize) -> Array2<f64> {
    Array2::from_shape_fn((fh, fw), |(r, _)| if r < fh / 2 { 1.0 } else { -1.0 })
}

/// Lee 的按列填充: 上半部分最大响应到下半部分最小响应.
fn lee_fill(filtered: &Array2<f64>) -> Array2<bool> {
    let (h, w) = filtered.dim();
    let half = h / 2;
    let spans = filtered.axis_iter(Axis(1)).map(|col| {
        let up = argmax_first(col.slice(s![..half]).iter().copied()).unwrap_or(0);
        let lo = argmin_first(col.slice(s![half..]).iter().copied()).unwrap_or(0);
        (up, lo + (h - half) + 1)
    });
    fill_columns((h, w), spans)
}

impl LeeMask {
    /// `filter_height` 必须是不小于 2 的偶数.
    pub fn new(
        filter_height: usize,
        filter_width: usize,
        padder: Option<Padder>,
    ) -> VeinResult<Self> {
        let ret = Self {
            filter_height,
            filter_width,
            padder,
        };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        check_lee_filter("LeeMask", self.filter_height, self.filter_width)
    }
}

impl Mask for LeeMask {
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>> {
        let image = prepare(&self.padder, sample.image().view())?;
        let kernel = lee_kernel(self.filter_height, self.filter_width);
        let filtered = convolve_nearest(image.view(), kernel.view());
        let mask = lee_fill(&filtered);
        debug!(
            "Lee 掩膜, 核 {:?}, 形状 {:?}",
            (self.filter_height, self.filter_width),
            mask.dim()
        );
        Ok(finish(&self.padder, mask))
    }
}

/// Lee 算法的改进版本: 额外用转置核在水平方向寻找手指左右边界.
///
/// 左侧按行清除最大响应及其左侧的像素; 右侧 (指尖一侧) 以所有行最小响应位置的
/// 中位数为界清除.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TomesLeeMask {
    filter_height: usize,
    filter_width: usize,
    padder: Option<Padder>,
}

impl Default for TomesLeeMask {
    fn default() -> Self {
        Self {
            filter_height: LEE_FILTER_HEIGHT,
            filter_width: LEE_FILTER_WIDTH,
            padder: Some(Padder::default()),
        }
    }
}

impl TomesLeeMask {
    /// `filter_height` 必须是不小于 2 的偶数.
    pub fn new(
        filter_height: usize,
        filter_width: usize,
        padder: Option<Padder>,
    ) -> VeinResult<Self> {
        let ret = Self {
            filter_height,
            filter_width,
            padder,
        };
        ret.validate()?;
        Ok(ret)
    }

    /// 检查参数.
    pub fn validate(&self) -> VeinResult<()> {
        check_lee_filter("TomesLeeMask", self.filter_height, self.filter_width)
    }
}

impl Mask for TomesLeeMask {
    fn mask(&self, sample: &AnnotatedImage) -> VeinResult<Array2<bool>> {
        let image = prepare(&self.padder, sample.image().view())?;
        let (_, w) = image.dim();
        let half_w = w / 2;
        let kernel = lee_kernel(self.filter_height, self.filter_width);

        let filtered = convolve_nearest(image.view(), kernel.view());
        let mut mask = lee_fill(&filtered);

        let filtered = convolve_nearest(image.view(), kernel.t());
        let mut right_edges = Vec::with_capacity(filtered.nrows());
        for (row, mut mask_row) in filtered.axis_iter(Axis(0)).zip(mask.axis_iter_mut(Axis(0))) {
            let lf = argmax_first(row.slice(s![..half_w]).iter().copied()).unwrap_or(0);
            mask_row.slice_mut(s![..=lf.min(w - 1)]).fill(false);
            let rg = argmin_first(row.slice(s![half_w..]).iter().copied()).unwrap_or(0);
            right_edges.push(rg as f64);
        }
        if let Some(m) = median(right_edges) {
            let cut = ((m + (w - half_w) as f64).floor() as usize).min(w);
            mask.slice_mut(s![.., cut..]).fill(false);
        }
        debug!(
            "Tomes-Lee 掩膜, 核 {:?}, 形状 {:?}",
            (self.filter_height, self.filter_width),
            mask.dim()
        );
        Ok(finish(&self.padder, mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Roi;
    use crate::preprocessor::Masker;

    /// 暗背景上横贯图像的亮带, 行 `[band.0, band.1)`.
    fn finger((h, w): Idx2d, band: (usize, usize)) -> AnnotatedImage {
        AnnotatedImage::new(Array2::from_shape_fn((h, w), |(r, _)| {
            if (band.0..band.1).contains(&r) {
                200
            } else {
                20
            }
        }))
    }

    fn count(mask: &Array2<bool>) -> usize {
        mask.iter().filter(|v| **v).count()
    }

    #[test]
    fn test_no_mask() {
        let sample = AnnotatedImage::new(Array2::zeros((17, 20)));
        let mask = Masker::NoMask.mask(&sample).unwrap();
        assert_eq!(mask.dim(), (17, 20));
        assert_eq!(count(&mask), 17 * 20);
    }

    #[test]
    fn test_fixed_mask() {
        let (h, w) = (17, 20);
        let (top, bottom, left, right) = (4, 2, 3, 1);
        let sample = AnnotatedImage::new(Array2::zeros((h, w)));
        let mask = FixedMask::new(top, bottom, left, right)
            .mask(&sample)
            .unwrap();
        let expected = (h - top - bottom) * (w - left - right);
        assert_eq!(count(&mask), expected);
        let inner = mask.slice(s![top..h - bottom, left..w - right]);
        assert_eq!(inner.iter().filter(|v| **v).count(), expected);

        let err = FixedMask::new(10, 10, 0, 0).mask(&sample).unwrap_err();
        assert!(matches!(err, VeinError::CropOutOfRange { .. }));
    }

    /// 多边形边线上的像素属于 ROI, 因此结果与相同边距的固定掩膜一致.
    #[test]
    fn test_annotated_roi_mask() {
        let (h, w) = (10, 10);
        let (top, bottom, left, right) = (4_i64, 2_i64, 3_i64, 1_i64);
        let roi = Roi::new(vec![
            (top, left),
            (top, w - (right + 1)),
            (h - (bottom + 1), w - (right + 1)),
            (h - (bottom + 1), left),
        ]);
        let sample = AnnotatedImage::with_roi(Array2::zeros((10, 10)), roi);
        let mask = AnnotatedRoiMask.mask(&sample).unwrap();
        let fixed = FixedMask::new(4, 2, 3, 1).make((10, 10)).unwrap();
        assert_eq!(mask, fixed);

        let bare = AnnotatedImage::new(Array2::zeros((10, 10)));
        assert!(matches!(
            AnnotatedRoiMask.mask(&bare),
            Err(VeinError::MissingRoi)
        ));
    }

    #[test]
    fn test_padder() {
        let image = Array2::from_elem((2, 3), 7_u8);
        let padder = Padder::new(2, 51);
        let padded = padder.pad(image.view());
        assert_eq!(padded.dim(), (6, 7));
        assert_eq!(padded[[0, 0]], 51);
        assert_eq!(padded[[2, 2]], 7);
        assert_eq!(padder.strip(padded), image);

        let none = Padder::new(0, 51);
        assert_eq!(none.pad(image.view()), image);
    }

    #[test]
    fn test_lee_mask_band() {
        let sample = finger((60, 80), (20, 40));
        let mask = LeeMask::default().mask(&sample).unwrap();
        assert_eq!(mask.dim(), (60, 80));
        for col in mask.axis_iter(Axis(1)) {
            let rows: Vec<usize> = (0..60).filter(|&r| col[r]).collect();
            assert_eq!(rows, (19..40).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_kono_mask_band() {
        let sample = finger((60, 80), (20, 40));
        let mask = KonoMask::default().mask(&sample).unwrap();
        assert_eq!(mask.dim(), (60, 80));
        for col in mask.axis_iter(Axis(1)) {
            assert!((20..40).all(|r| col[r]));
            assert!((0..15).all(|r| !col[r]));
            assert!((45..60).all(|r| !col[r]));
        }
    }

    #[test]
    fn test_tomes_lee_mask_is_subset_of_lee() {
        let sample = finger((60, 80), (20, 40));
        let lee = LeeMask::default().mask(&sample).unwrap();
        let tomes = TomesLeeMask::default().mask(&sample).unwrap();
        assert_eq!(tomes.dim(), lee.dim());
        assert!(tomes.iter().zip(lee.iter()).all(|(t, l)| !*t || *l));
        assert!(count(&tomes) > 0);
    }

    #[test]
    fn test_mask_config_validation() {
        assert!(KonoMask::new(0.0, None).is_err());
        assert!(KonoMask::new(f64::NAN, None).is_err());
        assert!(LeeMask::new(3, 40, None).is_err());
        assert!(LeeMask::new(4, 0, None).is_err());
        assert!(TomesLeeMask::new(0, 40, None).is_err());
        assert!(LeeMask::new(40, 4, Some(Padder::new(0, 0))).is_ok());
    }
}
