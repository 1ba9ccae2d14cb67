// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 流水线配置参数
pub mod detection; // 检测能力接口与适配
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod output; // 视频输出系统
pub mod pipeline; // 双光合成流水线
pub mod renderer; // 叠加渲染与布局合成
pub mod types; // 核心数据结构

pub use crate::config::PipelineConfig;
pub use crate::detection::{
    BBox, Detection, DetectionAdapter, DetectionSet, Detector, DetectorError, FixedDetector,
    FusedDetector, ReplayDetector,
};
pub use crate::error::{DetectionScope, ErrorKind, PipelineError, PipelineResult};
pub use crate::input::{FrameSource, MemoryStream, StreamHandle, StreamReader};
pub use crate::output::{FrameSink, MemoryRecording, OutputHandle, OutputMuxer, OutputTarget};
pub use crate::pipeline::{
    run_pipeline, PipelineRun, RunFailure, RunReport, RunRequest, RunState, Termination,
    TickOutcome,
};
pub use crate::renderer::{OverlayRenderer, OverlayStyle};
pub use crate::types::{Channel, ChannelMap, ComposedFrame, Frame, Mode, StreamInfo};

/// 本地时间字符串, 例如 `gen_time_string("-")` → `2024-05-01-12-30-45-123456`
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%6f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    chrono::Local::now().format(&fmt).to_string()
}
