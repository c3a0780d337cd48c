#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供手指静脉图像的预处理、特征提取与匹配算法.
//!
//! 数据流从左到右依次为:
//!
//! ```text
//! 裁剪 (Cropper) -> 掩膜 (Masker) -> 归一化 (Normalizer) -> 滤波 (Filter)
//!     -> 特征提取 (Extractor) -> 匹配 (Matcher)
//! ```
//!
//! 每一阶段都是一个封闭的 `enum`, 每个变体实现同一个单方法 trait
//! (`Crop`, `Mask`, `Normalize`, `Filter`, `Extract`, `Match`).
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 图像一律以 `(行, 列)` 即 `(高, 宽)` 方式索引.
//! 2. 参数错误在构造阶段以 [`VeinError::InvalidConfig`] 报告,
//!   处理合法输入时程序不会 panic.
//!
//! # 开发计划
//!
//! ### 多边形 ROI 栅格化 ✅
//!
//! 与 Pillow 的多边形填充逐像素一致.
//!
//! 实现位于 `fv-berry/src/data/mask.rs`.
//!
//! ### 手指区域掩膜 (Kono / Lee / Tomes-Lee) ✅
//!
//! 边缘检测前先做常数填充, 结果中去除填充.
//!
//! 实现位于 `fv-berry/src/preprocessor/mask.rs`.
//!
//! ### Huang 归一化 ✅
//!
//! 用最小二乘直线拟合手指中线, 再做仿射变换使其水平居中.
//!
//! 实现位于 `fv-berry/src/preprocessor/normalize.rs` 和 `fv-berry/src/fitting`.
//!
//! ### 特征提取 ✅
//!
//! 1. Wide Line Detector ✅
//! 2. Repeated Line Tracking (可复现的随机数) ✅
//! 3. Maximum Curvature ✅ (按文献实现, 尚无参考数据校验)
//! 4. Principal Curvature ✅ (按文献实现, 尚无参考数据校验)
//! 5. Local Binary Patterns ✅
//!
//! 实现位于 `fv-berry/src/extractor`.
//!
//! ### 匹配 ✅
//!
//! Miura 匹配, 归一化互相关匹配和 Hamming 距离.
//!
//! 实现位于 `fv-berry/src/algorithm`.
//!
//! ### 批处理 ✅
//!
//! 样本之间互不依赖, 打开 `rayon` feature 时按样本并行.
//!
//! 实现位于 `fv-berry/src/batch.rs`.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 带符号二维坐标 `(行, 列)`. 外部标注的点可能落在图像之外.
pub type Point2d = (i64, i64);

pub mod consts;

mod error;

pub use error::{VeinError, VeinResult};

/// 图像、ROI 与掩膜的基础数据结构.
pub mod data;

pub use data::{AnnotatedImage, ImgWriteRaw, ImgWriteVis, Roi};

pub mod ndimage;

pub mod fitting;

pub mod preprocessor;

pub mod extractor;

pub mod algorithm;

pub use algorithm::Model;
pub use extractor::Feature;

cfg_if::cfg_if! {
    if #[cfg(feature = "serde")] {
        pub mod config;
        pub use config::VeinConfig;
    }
}

pub mod batch;

pub mod prelude;
