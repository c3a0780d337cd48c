//! 图像、预处理结果与特征的持久化存储.
//!
//! 预处理结果和特征以 npz 格式保存, 数组名见 [`crate::consts::slots`].
//! 该布局与 NumPy 的 `numpy.savez` 兼容.

use std::fs::File;
use std::path::Path;

use image::{GrayImage, ImageResult, Luma, Rgb, RgbImage};
use log::debug;
use ndarray::{arr1, Array1, Array2, ArrayView2, Ix1, Ix2, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::consts::gray::{BLACK, WHITE};
use crate::consts::slots;
use crate::error::{ensure_same_shape, VeinError, VeinResult};
use crate::extractor::Feature;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// `ImgWriteVis` trait 的意图是, 图像将以 "可视化友好" 的方式保存,
/// 而不是 "as is" 的方式. 例如掩膜会映射为黑白图像, 实值特征图会按最大值拉伸到
/// `[0, 255]`, [`MaskOverlay`] 会把掩膜之外的区域染成半透明红色.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 表明一个可以通过 **按原样** 模式持久化存储的图像对象.
pub trait ImgWriteRaw {
    /// 按原样将图片保存到 `path` 路径.
    fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

fn save_gray<P, F>((height, width): (usize, usize), path: P, pixel: F) -> ImageResult<()>
where
    P: AsRef<Path>,
    F: Fn(usize, usize) -> u8,
{
    let mut buf = GrayImage::new(width as u32, height as u32);
    for h in 0..height {
        for w in 0..width {
            buf.put_pixel(w as u32, h as u32, Luma([pixel(h, w)]));
        }
    }
    buf.save(path)
}

macro_rules! impl_gray_raw {
    ($($img: ty),+) => {
        $(
            /// 按原样存储.
            impl ImgWriteRaw for $img {
                fn save_raw<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    save_gray(self.dim(), path, |h, w| self[[h, w]])
                }
            }
        )+
    };
}

macro_rules! impl_mask_vis {
    ($($mask: ty),+) => {
        $(
            /// 前景为白色, 背景为黑色.
            impl ImgWriteVis for $mask {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    save_gray(self.dim(), path, |h, w| if self[[h, w]] { WHITE } else { BLACK })
                }
            }
        )+
    };
}

macro_rules! impl_map_vis {
    ($($map: ty),+) => {
        $(
            /// 负值截断为 0, 其余按最大值线性拉伸到 `[0, 255]`.
            impl ImgWriteVis for $map {
                fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
                    let max = self.iter().copied().fold(0.0_f64, f64::max);
                    let scale = if max > 0.0 { WHITE as f64 / max } else { 0.0 };
                    save_gray(self.dim(), path, |h, w| {
                        (self[[h, w]].max(0.0) * scale).round().min(WHITE as f64) as u8
                    })
                }
            }
        )+
    };
}

impl_gray_raw!(Array2<u8>, ArrayView2<'_, u8>);
impl_mask_vis!(Array2<bool>, ArrayView2<'_, bool>);
impl_map_vis!(Array2<f64>, ArrayView2<'_, f64>);

/// 掩膜叠加在图像上的可视化视图: 掩膜之外的像素与红色混合.
#[derive(Clone, Copy, Debug)]
pub struct MaskOverlay<'a> {
    image: ArrayView2<'a, u8>,
    mask: ArrayView2<'a, bool>,
}

impl<'a> MaskOverlay<'a> {
    /// 叠加层的不透明度, 取值 `[0, 255]`.
    pub const ALPHA: u8 = 80;

    /// 构建叠加视图. 两者形状必须一致.
    pub fn new(image: ArrayView2<'a, u8>, mask: ArrayView2<'a, bool>) -> VeinResult<Self> {
        ensure_same_shape(image.shape(), mask.shape())?;
        Ok(Self { image, mask })
    }

    /// 计算 `(h, w)` 处的 RGB 颜色.
    pub fn pixel(&self, pos: (usize, usize)) -> [u8; 3] {
        let gray = self.image[pos];
        if self.mask[pos] {
            return [gray; 3];
        }
        let alpha = Self::ALPHA as u32;
        let blend = |c: u8, over: u8| {
            ((c as u32 * (255 - alpha) + over as u32 * alpha + 127) / 255) as u8
        };
        [blend(gray, WHITE), blend(gray, BLACK), blend(gray, BLACK)]
    }
}

impl ImgWriteVis for MaskOverlay<'_> {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (height, width) = self.image.dim();
        let mut buf = RgbImage::new(width as u32, height as u32);
        for h in 0..height {
            for w in 0..width {
                buf.put_pixel(w as u32, h as u32, Rgb(self.pixel((h, w))));
            }
        }
        buf.save(path)
    }
}

/// 以 8-bit 灰度读取图像. 彩色图像会被转换为灰度.
pub fn load_grayscale<P: AsRef<Path>>(path: P) -> VeinResult<Array2<u8>> {
    let img = image::open(path.as_ref())?.into_luma8();
    let (width, height) = img.dimensions();
    let arr = Array2::from_shape_vec((height as usize, width as usize), img.into_raw())
        .map_err(|_| VeinError::shape(&[height as usize, width as usize], &[]))?;
    debug!("读取图像 {:?}, 形状 {:?}", path.as_ref(), arr.dim());
    Ok(arr)
}

/// 将预处理后的图像 (浮点) 和掩膜保存为 npz 文件, 数组名分别为 `image.npy` 和 `mask.npy`.
pub fn save_preprocessed<P: AsRef<Path>>(
    path: P,
    image: ArrayView2<f64>,
    mask: ArrayView2<bool>,
) -> VeinResult<()> {
    ensure_same_shape(image.shape(), mask.shape())?;
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array(slots::IMAGE, &image)?;
    npz.add_array(slots::MASK, &mask)?;
    npz.finish()?;
    Ok(())
}

/// 读取 [`save_preprocessed`] 保存的图像和掩膜.
pub fn load_preprocessed<P: AsRef<Path>>(path: P) -> VeinResult<(Array2<f64>, Array2<bool>)> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let image = npz.by_name::<OwnedRepr<f64>, Ix2>(slots::IMAGE)?;
    let mask = npz.by_name::<OwnedRepr<bool>, Ix2>(slots::MASK)?;
    ensure_same_shape(image.shape(), mask.shape())?;
    Ok((image, mask))
}

/// 特征类别在 npz 中的编码.
const KIND_MAP: u8 = 0;
const KIND_HISTOGRAM: u8 = 1;
const KIND_BLOCKS: u8 = 2;
const KIND_SPARSE: u8 = 3;

/// 将特征保存为 npz 文件.
///
/// 稠密特征保存在 `feature.npy` 中; 稀疏直方图的值保存在 `feature.npy`,
/// 下标和稠密长度分别保存在 `indices.npy` 和 `len.npy`.
pub fn save_feature<P: AsRef<Path>>(path: P, feature: &Feature) -> VeinResult<()> {
    let mut npz = NpzWriter::new(File::create(path)?);
    match feature {
        Feature::Map(map) => {
            npz.add_array(slots::KIND, &arr1(&[KIND_MAP]))?;
            npz.add_array(slots::FEATURE, map)?;
        }
        Feature::Histogram(hist) => {
            npz.add_array(slots::KIND, &arr1(&[KIND_HISTOGRAM]))?;
            npz.add_array(slots::FEATURE, hist)?;
        }
        Feature::BlockHistograms(blocks) => {
            npz.add_array(slots::KIND, &arr1(&[KIND_BLOCKS]))?;
            npz.add_array(slots::FEATURE, blocks)?;
        }
        Feature::SparseHistogram {
            len,
            indices,
            values,
        } => {
            let indices: Array1<u64> = indices.iter().map(|&i| i as u64).collect();
            npz.add_array(slots::KIND, &arr1(&[KIND_SPARSE]))?;
            npz.add_array(slots::FEATURE, &Array1::from(values.clone()))?;
            npz.add_array(slots::INDICES, &indices)?;
            npz.add_array(slots::LEN, &arr1(&[*len as u64]))?;
        }
    }
    npz.finish()?;
    Ok(())
}

/// 读取 [`save_feature`] 保存的特征.
pub fn load_feature<P: AsRef<Path>>(path: P) -> VeinResult<Feature> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let kind = npz.by_name::<OwnedRepr<u8>, Ix1>(slots::KIND)?;
    let feature = match kind.iter().next().copied() {
        Some(KIND_MAP) => Feature::Map(npz.by_name::<OwnedRepr<f64>, Ix2>(slots::FEATURE)?),
        Some(KIND_HISTOGRAM) => {
            Feature::Histogram(npz.by_name::<OwnedRepr<f64>, Ix1>(slots::FEATURE)?)
        }
        Some(KIND_BLOCKS) => {
            Feature::BlockHistograms(npz.by_name::<OwnedRepr<f64>, Ix2>(slots::FEATURE)?)
        }
        Some(KIND_SPARSE) => {
            let values = npz.by_name::<OwnedRepr<f64>, Ix1>(slots::FEATURE)?;
            let indices = npz.by_name::<OwnedRepr<u64>, Ix1>(slots::INDICES)?;
            let len = npz.by_name::<OwnedRepr<u64>, Ix1>(slots::LEN)?;
            ensure_same_shape(values.shape(), indices.shape())?;
            Feature::SparseHistogram {
                len: len.iter().next().copied().unwrap_or_default() as usize,
                indices: indices.iter().map(|&i| i as usize).collect(),
                values: values.to_vec(),
            }
        }
        _ => return Err(VeinError::EmptyInput("特征类别标记缺失或无法识别")),
    };
    Ok(feature)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        use crate::algorithm::Model;
        use std::io::{BufReader, BufWriter};

        /// 以 bincode 格式保存注册模板.
        pub fn save_model<P: AsRef<Path>>(path: P, model: &Model) -> VeinResult<()> {
            let writer = BufWriter::new(File::create(path)?);
            bincode::serialize_into(writer, model)?;
            Ok(())
        }

        /// 读取 [`save_model`] 保存的注册模板.
        pub fn load_model<P: AsRef<Path>>(path: P) -> VeinResult<Model> {
            let reader = BufReader::new(File::open(path)?);
            Ok(bincode::deserialize_from(reader)?)
        }
    }
}
