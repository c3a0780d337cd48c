//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素值的最大灰度 (浮点形式).
    pub const MAX_F64: f64 = 255.0;
}

/// 预处理默认参数.
pub mod preprocess {
    /// 边缘检测前的默认填充宽度 (像素).
    pub const PADDING_WIDTH: usize = 5;

    /// 默认填充值. 对低质量样本 (如 VERA 库) 取 51, 即浮点图像中的 0.2.
    pub const PADDING_CONSTANT: u8 = 51;

    /// Kono 掩膜高斯核的默认标准差.
    pub const KONO_SIGMA: f64 = 5.0;

    /// Lee 掩膜默认滤波核高度, 必须为偶数.
    pub const LEE_FILTER_HEIGHT: usize = 4;

    /// Lee 掩膜默认滤波核宽度.
    pub const LEE_FILTER_WIDTH: usize = 40;
}

/// 特征提取默认参数.
pub mod extract {
    /// Wide Line Detector 的默认邻域半径.
    pub const WLD_RADIUS: usize = 5;

    /// Wide Line Detector 的默认灰度阈值.
    pub const WLD_THRESHOLD: f64 = 1.0;

    /// Wide Line Detector 的默认邻域计数阈值.
    pub const WLD_G: usize = 41;

    /// Wide Line Detector 下采样倍率.
    pub const WLD_SCALE: f64 = 0.24;

    /// Repeated Line Tracking 默认迭代次数.
    pub const RLT_ITERATIONS: usize = 3000;

    /// Repeated Line Tracking 跟踪点到剖面的默认距离.
    pub const RLT_R: usize = 1;

    /// Repeated Line Tracking 默认剖面宽度, 必须为奇数.
    pub const RLT_PROFILE_W: usize = 21;

    /// Repeated Line Tracking 下采样倍率.
    pub const RLT_SCALE: f64 = 0.6;

    /// 左右移动的概率.
    pub const RLT_P_LR: f64 = 0.5;

    /// 上下移动的概率.
    pub const RLT_P_UD: f64 = 0.25;

    /// Maximum Curvature 默认高斯标准差.
    pub const MC_SIGMA: f64 = 5.0;

    /// Principal Curvature 默认高斯标准差.
    pub const PC_SIGMA: f64 = 3.0;

    /// Principal Curvature 默认梯度幅值阈值 (灰度单位).
    pub const PC_THRESHOLD: f64 = 4.0;

    /// LBP 默认分块大小.
    pub const LBP_BLOCK_SIZE: usize = 59;

    /// LBP 默认分块重叠.
    pub const LBP_BLOCK_OVERLAP: usize = 15;

    /// LBP 默认半径.
    pub const LBP_RADIUS: usize = 7;

    /// LBP 默认邻居数.
    pub const LBP_NEIGHBORS: usize = 16;
}

/// 匹配默认参数.
pub mod matching {
    /// Miura 匹配默认纵向裁剪量.
    pub const MIURA_CH: usize = 8;

    /// Miura 匹配默认横向裁剪量.
    pub const MIURA_CW: usize = 5;
}

/// npz 持久化时使用的数组名.
pub mod slots {
    /// 预处理后的图像.
    pub const IMAGE: &str = "image.npy";

    /// 预处理后的掩膜.
    pub const MASK: &str = "mask.npy";

    /// 特征.
    pub const FEATURE: &str = "feature.npy";

    /// 稀疏特征的下标.
    pub const INDICES: &str = "indices.npy";

    /// 稀疏特征的稠密长度.
    pub const LEN: &str = "len.npy";

    /// 特征类别标记.
    pub const KIND: &str = "kind.npy";
}
