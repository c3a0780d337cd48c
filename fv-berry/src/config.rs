//! JSON 配置.
//!
//! 各字段均可省略, 省略时取 [`crate::consts`] 中的默认值. 例如:
//!
//! ```json
//! {
//!     "preprocessor": {
//!         "cropper": { "type": "no_crop" },
//!         "masker": { "type": "lee", "filter_height": 4, "filter_width": 40 },
//!         "normalizer": { "type": "huang" },
//!         "filter": { "type": "histogram_equalization" }
//!     },
//!     "extractor": { "type": "repeated_line_tracking", "iterations": 3000, "seed": 0 },
//!     "matcher": { "type": "miura", "ch": 18, "cw": 28 }
//! }
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::Matcher;
use crate::error::VeinResult;
use crate::extractor::Extractor;
use crate::preprocessor::Preprocessor;

/// 完整流水线的配置.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VeinConfig {
    /// 预处理.
    pub preprocessor: Preprocessor,
    /// 特征提取.
    pub extractor: Extractor,
    /// 匹配.
    pub matcher: Matcher,
}

impl VeinConfig {
    /// 从 JSON 字符串读取并检查参数.
    pub fn from_json_str(s: &str) -> VeinResult<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        debug!("读取配置: {config:?}");
        Ok(config)
    }

    /// 从 JSON 文件读取并检查参数.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> VeinResult<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// 序列化为带缩进的 JSON.
    pub fn to_json_string(&self) -> VeinResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 检查全部阶段的参数.
    pub fn validate(&self) -> VeinResult<()> {
        self.preprocessor.validate()?;
        self.extractor.validate()?;
        self.matcher.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::MiuraMatch;
    use crate::extractor::RepeatedLineTracking;
    use crate::preprocessor::{Masker, Padder, PostFilter, TomesLeeMask};
    use crate::VeinError;
    use std::io::Write;

    #[test]
    fn test_empty_json_is_default() {
        let config = VeinConfig::from_json_str("{}").unwrap();
        assert_eq!(config, VeinConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = VeinConfig::from_json_str(
            r#"{
                "preprocessor": {
                    "masker": { "type": "tomes_lee", "filter_height": 6 },
                    "filter": { "type": "histogram_equalization" }
                },
                "extractor": { "type": "repeated_line_tracking", "seed": 7, "rescale": false },
                "matcher": { "type": "miura", "ch": 18, "cw": 28 }
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.preprocessor.masker,
            Masker::TomesLee(TomesLeeMask::new(6, 40, Some(Padder::default())).unwrap())
        );
        assert_eq!(config.preprocessor.filter, PostFilter::HistogramEqualization);
        assert_eq!(
            config.extractor,
            Extractor::RepeatedLineTracking(RepeatedLineTracking {
                seed: 7,
                rescale: false,
                ..Default::default()
            })
        );
        assert_eq!(config.matcher, Matcher::Miura(MiuraMatch::new(18, 28)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = VeinConfig::from_json_str(
            r#"{ "extractor": { "type": "repeated_line_tracking", "profile_w": 20 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, VeinError::InvalidConfig(_)));

        let err = VeinConfig::from_json_str(
            r#"{ "extractor": { "type": "local_binary_patterns",
                 "block_size": 10, "block_overlap": 10 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, VeinError::InvalidConfig(_)));

        let err = VeinConfig::from_json_str(r#"{ "matcher": { "type": "cosine" } }"#).unwrap_err();
        assert!(matches!(err, VeinError::Json(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let config = VeinConfig {
            matcher: Matcher::HammingDistance,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes())
            .unwrap();
        assert_eq!(VeinConfig::from_json_file(file.path()).unwrap(), config);
    }
}
