//! 输出复用器 (Output Muxer)
//! 打开时固定尺寸和帧率, 追加顺序即输出顺序, 收尾幂等

use std::path::PathBuf;

use super::image_seq::ImageSequenceSink;
use super::{FrameSink, OutputTarget};
use crate::error::{PipelineError, PipelineResult};
use crate::types::ComposedFrame;

/// 输出结果描述
#[derive(Debug, Clone, PartialEq)]
pub struct OutputHandle {
    pub description: String,
    pub path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
}

pub struct OutputMuxer {
    sink: Option<Box<dyn FrameSink>>,
    description: String,
    path: Option<PathBuf>,
    width: u32,
    height: u32,
    fps: f64,
    frames: u64,
}

impl OutputMuxer {
    pub fn open(target: OutputTarget, width: u32, height: u32, fps: f64) -> PipelineResult<Self> {
        let description = target.describe();
        let path = target.path().map(|p| p.to_path_buf());
        let unopenable = |reason: String| PipelineError::SinkUnopenable {
            target: description.clone(),
            reason,
        };

        if width == 0 || height == 0 {
            return Err(unopenable(format!("输出尺寸非法 {}x{}", width, height)));
        }
        if !(fps.is_finite() && fps > 0.0) {
            return Err(unopenable(format!("输出帧率非法 {}", fps)));
        }

        let sink: Box<dyn FrameSink> = match target {
            OutputTarget::Memory(recording) => Box::new(recording.sink()),
            OutputTarget::Custom(sink) => sink,
            OutputTarget::ImageSequence(dir) => Box::new(
                ImageSequenceSink::create(&dir, width, height, fps)
                    .map_err(|e| unopenable(format!("{:#}", e)))?,
            ),
            #[cfg(feature = "ffmpeg")]
            OutputTarget::Video { path, codec } => Box::new(
                super::encoder::FfmpegSink::open(&path, &codec, width, height, fps)
                    .map_err(|e| unopenable(format!("{:#}", e)))?,
            ),
            #[cfg(not(feature = "ffmpeg"))]
            OutputTarget::Video { .. } => {
                return Err(unopenable("未启用 ffmpeg 功能, 无法编码视频文件".to_string()));
            }
        };

        tracing::info!(
            "💾 输出已打开: {} ({}x{} @ {:.2}fps)",
            description,
            width,
            height,
            fps
        );

        Ok(Self {
            sink: Some(sink),
            description,
            path,
            width,
            height,
            fps,
            frames: 0,
        })
    }

    /// 追加一帧, 尺寸必须与打开时一致
    pub fn append(&mut self, frame: &ComposedFrame) -> PipelineResult<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(PipelineError::WriteFailed(format!(
                "{} 已收尾, 不能继续写入",
                self.description
            )));
        };

        let actual = frame.dimensions();
        if actual != (self.width, self.height) {
            return Err(PipelineError::DimensionMismatch {
                expected: (self.width, self.height),
                actual,
            });
        }

        sink.write_frame(&frame.image).map_err(|e| {
            PipelineError::WriteFailed(format!("第{}帧: {:#}", frame.index, e))
        })?;
        self.frames += 1;
        Ok(())
    }

    /// 收尾: 第一次调用写入尾部信息, 之后的调用无操作
    pub fn finalize(&mut self) -> PipelineResult<OutputHandle> {
        if let Some(mut sink) = self.sink.take() {
            sink.finish()
                .map_err(|e| PipelineError::WriteFailed(format!("收尾失败: {:#}", e)))?;
            tracing::info!("✅ 输出已完成: {} ({} 帧)", self.description, self.frames);
        }
        Ok(self.handle())
    }

    pub fn is_finalized(&self) -> bool {
        self.sink.is_none()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn handle(&self) -> OutputHandle {
        OutputHandle {
            description: self.description.clone(),
            path: self.path.clone(),
            width: self.width,
            height: self.height,
            fps: self.fps,
            frames: self.frames,
        }
    }
}

impl Drop for OutputMuxer {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            tracing::error!("❌ {}", e);
        }
    }
}
