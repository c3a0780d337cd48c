//! 批处理.
//!
//! 样本之间互不依赖. 打开 `rayon` feature 时按样本并行, 否则顺序执行;
//! 两种方式的输出顺序与输入一致, 结果完全相同.

use itertools::iproduct;
use log::info;
use ndarray::Array2;

use crate::algorithm::{Match, Model};
use crate::data::AnnotatedImage;
use crate::error::{VeinError, VeinResult};
use crate::extractor::{Extract, Feature};
use crate::preprocessor::{Preprocessed, Preprocessor};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<R>
        where
            T: Sync,
            R: Send,
            F: Fn(&T) -> R + Sync + Send,
        {
            items.par_iter().map(f).collect()
        }
    } else {
        fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<R>
        where
            F: Fn(&T) -> R,
        {
            items.iter().map(f).collect()
        }
    }
}

/// 逐个预处理. 单个样本失败不影响其余样本.
pub fn preprocess_batch(
    preprocessor: &Preprocessor,
    samples: &[AnnotatedImage],
) -> Vec<VeinResult<Preprocessed>> {
    info!("批量预处理 {} 个样本", samples.len());
    map_ordered(samples, |sample| preprocessor.process(sample.clone()))
}

/// 逐个提取特征.
pub fn extract_batch<E>(extractor: &E, samples: &[Preprocessed]) -> Vec<VeinResult<Feature>>
where
    E: Extract + Sync,
{
    info!("批量提取 {} 个样本的特征", samples.len());
    map_ordered(samples, |p| extractor.extract(p.image.view(), p.mask.view()))
}

/// 每个探针与同一模板的分数.
pub fn score_batch<M>(matcher: &M, model: &Model, probes: &[Feature]) -> Vec<VeinResult<f64>>
where
    M: Match + Sync,
{
    map_ordered(probes, |probe| matcher.score(model, probe))
}

/// 全部模板与全部探针两两打分, 第 `(i, j)` 个元素为第 `i` 个模板与第 `j` 个探针的分数.
///
/// 任意一对出错即返回该错误.
pub fn score_matrix<M>(
    matcher: &M,
    models: &[Model],
    probes: &[Feature],
) -> VeinResult<Array2<f64>>
where
    M: Match + Sync,
{
    let pairs: Vec<_> = iproduct!(0..models.len(), 0..probes.len()).collect();
    info!("计算 {} 对分数", pairs.len());
    let scores = map_ordered(&pairs, |&(i, j)| matcher.score(&models[i], &probes[j]))
        .into_iter()
        .collect::<VeinResult<Vec<_>>>()?;
    let shape = (models.len(), probes.len());
    let len = scores.len();
    Array2::from_shape_vec(shape, scores)
        .map_err(|_| VeinError::shape(&[shape.0, shape.1], &[len]))
}
