//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Point2d};
pub use crate::{VeinError, VeinResult};

pub use crate::data::save::{load_feature, load_grayscale, save_feature};
pub use crate::data::{AnnotatedImage, ImgWriteRaw, ImgWriteVis, Roi};

pub use crate::preprocessor::{
    Crop, Cropper, Filter, Mask, Masker, Normalize, Normalizer, PostFilter, Preprocessed,
    Preprocessor,
};

pub use crate::extractor::{Extract, Extractor, Feature};

pub use crate::algorithm::{Match, Matcher, Model};

pub use crate::batch::{extract_batch, preprocess_batch, score_batch, score_matrix};

#[cfg(feature = "serde")]
pub use crate::config::VeinConfig;

#[cfg(feature = "serde")]
pub use crate::data::save::{load_model, save_model};
