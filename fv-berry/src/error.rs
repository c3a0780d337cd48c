//! 运行时错误.

use crate::{Idx2d, Point2d};
use thiserror::Error;

/// 预处理、特征提取与匹配过程中可能出现的全部错误.
///
/// 配置错误总是在构造阶段暴露, 不会在处理图像时才出现.
#[derive(Error, Debug)]
pub enum VeinError {
    /// 参数组合非法, 字符串描述了具体原因.
    #[error("配置错误: {0}")]
    InvalidConfig(String),

    /// 裁剪 (或固定掩膜) 的边距超出图像范围.
    #[error("边距 (上 {top}, 下 {bottom}, 左 {left}, 右 {right}) 超出图像范围 {shape:?}")]
    CropOutOfRange {
        /// 上边距.
        top: usize,
        /// 下边距.
        bottom: usize,
        /// 左边距.
        left: usize,
        /// 右边距.
        right: usize,
        /// 图像形状 (高, 宽).
        shape: Idx2d,
    },

    /// 需要 ROI 标注, 但图像没有携带.
    #[error("图像没有携带 ROI 标注")]
    MissingRoi,

    /// 坐标点不在给定区域内.
    #[error("点 {point:?} 不在区域 {shape:?} 之内")]
    PointOutOfRange {
        /// 越界的点 (行, 列).
        point: Point2d,
        /// 区域形状 (高, 宽).
        shape: Idx2d,
    },

    /// 两个数组形状不一致.
    #[error("形状不一致: 期望 {expected:?}, 实际 {found:?}")]
    ShapeMismatch {
        /// 期望的形状.
        expected: Vec<usize>,
        /// 实际的形状.
        found: Vec<usize>,
    },

    /// 掩膜中没有任何前景像素, 而当前操作必须依赖前景.
    #[error("掩膜为空")]
    EmptyMask,

    /// 输入集合为空 (例如注册时没有任何样本).
    #[error("输入为空: {0}")]
    EmptyInput(&'static str),

    /// 不支持的像素类型.
    #[error("不支持的像素类型 `{0}`")]
    UnsupportedPixelType(String),

    /// 底层 I/O 错误.
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 读取 npz 文件错误.
    #[error("读取 npz 错误: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    /// 写入 npz 文件错误.
    #[error("写入 npz 错误: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    /// 图像编解码错误.
    #[error("图像错误: {0}")]
    Image(#[from] image::ImageError),

    /// 配置文件解析错误.
    #[cfg(feature = "serde")]
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 模板序列化错误.
    #[cfg(feature = "serde")]
    #[error("模板序列化错误: {0}")]
    Bincode(#[from] bincode::Error),
}

/// 本 crate 的通用返回类型.
pub type VeinResult<T> = Result<T, VeinError>;

impl VeinError {
    /// 便捷构造 [`VeinError::InvalidConfig`].
    #[inline]
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// 便捷构造 [`VeinError::ShapeMismatch`].
    #[inline]
    pub(crate) fn shape(expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

/// 检查两个数组形状是否一致.
#[inline]
pub(crate) fn ensure_same_shape(expected: &[usize], found: &[usize]) -> VeinResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(VeinError::shape(expected, found))
    }
}
