/// 检测系统 (Detection System)
///
/// 检测模型本身由调用方构建并注入, 流水线只通过下列接口调用
/// - Detector:      单通道检测能力 (可见光/热成像各自的模型)
/// - FusedDetector: 双光融合检测能力 (同一tick两帧 → 一个共享结果)
/// - DetectionAdapter: 按通道分发, 统一错误
pub mod adapter;
pub mod fixed;
pub mod replay;
pub mod types;

use thiserror::Error;

use crate::types::Frame;

pub use adapter::DetectionAdapter;
pub use fixed::FixedDetector;
pub use replay::ReplayDetector;
pub use types::{BBox, Detection, DetectionSet};

#[derive(Debug, Clone, Error)]
pub enum DetectorError {
    #[error("模型不可用: {0}")]
    Unavailable(String),
    #[error("推理失败: {0}")]
    Inference(String),
}

/// 单通道检测能力
///
/// 不修改输入帧, 不做置信度过滤 (过滤属于渲染策略)
pub trait Detector: Send + Sync {
    fn name(&self) -> &str {
        "detector"
    }

    fn detect(&self, frame: &Frame) -> Result<DetectionSet, DetectorError>;
}

/// 双光融合检测能力 (仅用于 Combined 模式)
pub trait FusedDetector: Send + Sync {
    fn name(&self) -> &str {
        "fused-detector"
    }

    fn detect_pair(&self, visible: &Frame, thermal: &Frame) -> Result<DetectionSet, DetectorError>;
}
