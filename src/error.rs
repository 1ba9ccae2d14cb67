/// 流水线错误类型
/// Pipeline error taxonomy
use std::fmt;

use thiserror::Error;

use crate::types::{Channel, Mode};

/// 检测失败的范围: 单通道模型或双光融合模型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionScope {
    Channel(Channel),
    Fused,
}

impl fmt::Display for DetectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionScope::Channel(channel) => write!(f, "{}", channel),
            DetectionScope::Fused => f.write_str("fused"),
        }
    }
}

/// 错误种类 (便于调用方匹配)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingRequiredInput,
    SourceUnreadable,
    StreamExhausted,
    DetectionUnavailable,
    DimensionMismatch,
    InvalidChannelSet,
    SinkUnopenable,
    WriteFailed,
}

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("缺少必需输入: {0}")]
    MissingRequiredInput(String),

    #[error("{channel} 视频源不可读: {reason}")]
    SourceUnreadable { channel: Channel, reason: String },

    /// 正常结束信号, 不是面向用户的错误
    #[error("{channel} 视频流已结束")]
    StreamExhausted { channel: Channel },

    #[error("检测能力不可用 ({scope}): {reason}")]
    DetectionUnavailable {
        scope: DetectionScope,
        reason: String,
    },

    #[error("尺寸不匹配: 期望 {expected:?}, 实际 {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("通道集合无效: 模式 {mode} 需要 {expected:?}, 实际 {actual:?}")]
    InvalidChannelSet {
        mode: Mode,
        expected: Vec<Channel>,
        actual: Vec<Channel>,
    },

    #[error("无法打开输出 {target}: {reason}")]
    SinkUnopenable { target: String, reason: String },

    #[error("写入失败: {0}")]
    WriteFailed(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingRequiredInput(_) => ErrorKind::MissingRequiredInput,
            PipelineError::SourceUnreadable { .. } => ErrorKind::SourceUnreadable,
            PipelineError::StreamExhausted { .. } => ErrorKind::StreamExhausted,
            PipelineError::DetectionUnavailable { .. } => ErrorKind::DetectionUnavailable,
            PipelineError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            PipelineError::InvalidChannelSet { .. } => ErrorKind::InvalidChannelSet,
            PipelineError::SinkUnopenable { .. } => ErrorKind::SinkUnopenable,
            PipelineError::WriteFailed(_) => ErrorKind::WriteFailed,
        }
    }

    /// 只有流结束属于正常终止
    pub fn is_graceful(&self) -> bool {
        matches!(self, PipelineError::StreamExhausted { .. })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
