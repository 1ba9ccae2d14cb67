/// 双光检测合成流水线 (RGB-T Pipeline)
///
/// 单线程按tick顺序推进:
/// - Synchronizer: 各通道步调一致地取帧
/// - DetectionAdapter: 逐通道 (或融合) 检测
/// - OverlayRenderer: 叠加检测框和标签
/// - compose: 按模式合成输出帧
/// - OutputMuxer: 追加到输出, 结束时收尾
pub mod synchronizer;

pub use synchronizer::{FrameSet, Synchronizer};

use std::time::Instant;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::detection::DetectionAdapter;
use crate::error::{ErrorKind, PipelineError, PipelineResult};
use crate::input::{StreamHandle, StreamReader};
use crate::output::{OutputHandle, OutputMuxer, OutputTarget};
use crate::renderer::{compose, output_dimensions, OverlayRenderer};
use crate::types::{AnnotatedFrame, Channel, ChannelMap, Mode};

// ========== 调用边界 ==========

/// 一次运行的输入
#[derive(Debug)]
pub struct RunRequest {
    pub mode: Mode,
    pub visible: Option<StreamHandle>,
    pub thermal: Option<StreamHandle>,
    pub output: OutputTarget,
}

impl RunRequest {
    pub fn new(mode: Mode, output: OutputTarget) -> Self {
        Self {
            mode,
            visible: None,
            thermal: None,
            output,
        }
    }

    pub fn with_visible(mut self, handle: StreamHandle) -> Self {
        self.visible = Some(handle);
        self
    }

    pub fn with_thermal(mut self, handle: StreamHandle) -> Self {
        self.thermal = Some(handle);
        self
    }
}

/// 运行状态机: Idle → Opened → Running → {Finalized | Aborted}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Opened,
    Running,
    Finalized,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Finalized | RunState::Aborted)
    }
}

/// 单个tick的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Appended { index: u64 },
    /// 该序号的tick因通道结束而无法完成
    Exhausted { channel: Channel, index: u64 },
}

/// 正常结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exhausted { channel: Channel, index: u64 },
    /// 调用方在tick之间放弃
    Abandoned { index: u64 },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: OutputHandle,
    pub frames_written: u64,
    pub termination: Termination,
}

/// 运行失败: 原始错误 + 发生位置 + 已写出的部分
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: PipelineError,
    /// 出错的tick序号 (打开阶段失败时为 None)
    pub sequence_index: Option<u64>,
    pub frames_written: u64,
    pub output: Option<OutputHandle>,
    /// 尽力收尾时的次要错误, 不覆盖原始错误
    pub finalize_error: Option<PipelineError>,
}

impl RunFailure {
    fn before_start(error: PipelineError) -> Self {
        Self {
            error,
            sequence_index: None,
            frames_written: 0,
            output: None,
            finalize_error: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// 入口: 打开 → 逐tick处理直到任一通道结束 → 收尾
pub fn run_pipeline(
    request: RunRequest,
    adapter: &DetectionAdapter,
    config: &PipelineConfig,
) -> Result<RunReport, RunFailure> {
    PipelineRun::open(request, adapter, config)
        .map_err(RunFailure::before_start)?
        .run()
}

/// 检查输入句柄与模式是否完全一致 (在打开任何读取器之前)
pub fn validate_inputs(
    mode: Mode,
    visible: Option<&StreamHandle>,
    thermal: Option<&StreamHandle>,
) -> PipelineResult<()> {
    for (channel, handle) in [(Channel::Visible, visible), (Channel::Thermal, thermal)] {
        match (mode.requires(channel), handle.is_some()) {
            (true, false) => {
                return Err(PipelineError::MissingRequiredInput(format!(
                    "模式 {} 需要{}输入",
                    mode,
                    channel.label()
                )));
            }
            (false, true) => {
                return Err(PipelineError::MissingRequiredInput(format!(
                    "模式 {} 不接受{}输入",
                    mode,
                    channel.label()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

// ========== 运行实体 ==========

pub struct PipelineRun<'a> {
    mode: Mode,
    adapter: &'a DetectionAdapter,
    renderer: OverlayRenderer,
    sync: Synchronizer,
    /// 第一个tick合成后才打开输出 (尺寸由首帧决定)
    target: Option<OutputTarget>,
    muxer: Option<OutputMuxer>,
    fps: f64,
    state: RunState,
    current_index: u64,
    frames_written: u64,
    parallel_detection: bool,
    log_every: u64,
    started: Instant,
}

impl<'a> PipelineRun<'a> {
    pub fn open(
        request: RunRequest,
        adapter: &'a DetectionAdapter,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        let RunRequest {
            mode,
            visible,
            thermal,
            output,
        } = request;

        validate_inputs(mode, visible.as_ref(), thermal.as_ref())?;
        adapter.check_mode(mode)?;

        // 按通道顺序打开, 失败时已打开的读取器随 Drop 释放
        let mut readers = ChannelMap::new();
        for (channel, handle) in [(Channel::Visible, visible), (Channel::Thermal, thermal)] {
            if let Some(handle) = handle {
                readers.insert(channel, StreamReader::open(channel, handle)?);
            }
        }

        let fps = reference_fps(&readers);
        tracing::info!("🚀 运行已就绪: {} → {}", mode, output.describe());

        Ok(Self {
            mode,
            adapter,
            renderer: OverlayRenderer::new(config.overlay.clone()),
            sync: Synchronizer::new(readers),
            target: Some(output),
            muxer: None,
            fps,
            state: RunState::Opened,
            current_index: 1,
            frames_written: 0,
            parallel_detection: config.parallel_detection,
            log_every: config.log_every,
            started: Instant::now(),
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// 处理一个tick: 取帧 → 检测 → 叠加 → 合成 → 追加
    pub fn tick(&mut self) -> PipelineResult<TickOutcome> {
        if self.state.is_terminal() {
            return Err(PipelineError::WriteFailed(format!(
                "运行已终止 ({:?}), 不能继续处理",
                self.state
            )));
        }
        self.state = RunState::Running;
        self.current_index = self.sync.next_index();

        let set = match self.sync.tick() {
            Ok(set) => set,
            Err(PipelineError::StreamExhausted { channel }) => {
                return Ok(TickOutcome::Exhausted {
                    channel,
                    index: self.current_index,
                });
            }
            Err(e) => return Err(e),
        };

        let detections = self.adapter.detect_tick(&set.frames, self.parallel_detection)?;

        let annotated: ChannelMap<AnnotatedFrame> = set
            .frames
            .iter()
            .map(|(channel, frame)| {
                let found = detections.get(channel).map(Vec::as_slice).unwrap_or(&[]);
                (channel, self.renderer.render(frame, found))
            })
            .collect();

        let composed = compose(self.mode, annotated)?;

        if self.muxer.is_none() {
            let (width, height) = composed.dimensions();
            self.muxer = Some(self.open_muxer(width, height)?);
        }
        if let Some(muxer) = self.muxer.as_mut() {
            muxer.append(&composed)?;
        }
        self.frames_written += 1;

        if self.log_every > 0 && self.frames_written % self.log_every == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            tracing::info!(
                "🎬 已处理 {} 帧 ({:.1} fps)",
                self.frames_written,
                self.frames_written as f64 / elapsed.max(1e-6)
            );
        }

        Ok(TickOutcome::Appended { index: set.index })
    }

    /// 处理到结束
    pub fn run(mut self) -> Result<RunReport, RunFailure> {
        loop {
            match self.tick() {
                Ok(TickOutcome::Appended { .. }) => {}
                Ok(TickOutcome::Exhausted { channel, index }) => {
                    tracing::info!("🏁 {}通道结束于第{}帧", channel.label(), index);
                    return self.complete(Termination::Exhausted { channel, index });
                }
                Err(error) => return Err(self.abort(error)),
            }
        }
    }

    /// 在tick之间放弃: 释放读取器并收尾已写出的帧
    pub fn abandon(mut self) -> Result<RunReport, RunFailure> {
        let index = self.sync.next_index();
        tracing::warn!("⚠️ 运行在第{}帧前被放弃", index);
        self.complete(Termination::Abandoned { index })
    }

    fn complete(&mut self, termination: Termination) -> Result<RunReport, RunFailure> {
        self.sync.close();

        // 没有任何tick时按读取器属性打开, 保证输出是有效的空容器
        if self.muxer.is_none() {
            match self.open_empty_muxer() {
                Ok(muxer) => self.muxer = Some(muxer),
                Err(error) => return Err(self.abort(error)),
            }
        }

        match self.finalize_output() {
            Some(Ok(output)) => {
                self.state = RunState::Finalized;
                tracing::info!(
                    "✅ 运行完成: {} 帧, 耗时 {:.2}s",
                    self.frames_written,
                    self.started.elapsed().as_secs_f64()
                );
                Ok(RunReport {
                    output,
                    frames_written: self.frames_written,
                    termination,
                })
            }
            Some(Err(error)) => Err(self.abort(error)),
            None => Err(self.abort(PipelineError::SinkUnopenable {
                target: "output".to_string(),
                reason: "输出未打开".to_string(),
            })),
        }
    }

    fn abort(&mut self, error: PipelineError) -> RunFailure {
        self.sync.close();

        let (output, finalize_error) = match self.finalize_output() {
            Some(Ok(handle)) => (Some(handle), None),
            Some(Err(e)) => {
                tracing::error!("❌ 收尾失败: {}", e);
                (self.muxer.as_ref().map(|m| m.handle()), Some(e))
            }
            None => (None, None),
        };

        self.state = RunState::Aborted;
        tracing::error!(
            "❌ 运行在第{}帧中止: {} (已写出 {} 帧)",
            self.current_index,
            error,
            self.frames_written
        );

        RunFailure {
            error,
            sequence_index: Some(self.current_index),
            frames_written: self.frames_written,
            output,
            finalize_error,
        }
    }

    /// 收尾已打开的输出; 未打开时返回 None
    fn finalize_output(&mut self) -> Option<PipelineResult<OutputHandle>> {
        self.muxer.as_mut().map(|muxer| muxer.finalize())
    }

    fn open_muxer(&mut self, width: u32, height: u32) -> PipelineResult<OutputMuxer> {
        let target = self.target.take().ok_or_else(|| PipelineError::SinkUnopenable {
            target: "output".to_string(),
            reason: "输出目标已被使用".to_string(),
        })?;
        OutputMuxer::open(target, width, height, self.fps)
    }

    fn open_empty_muxer(&mut self) -> PipelineResult<OutputMuxer> {
        let infos = self.sync.infos();
        let (width, height) = match output_dimensions(self.mode, &infos) {
            Ok(dims) => dims,
            // 没有帧需要合成: 高度不一致时退回第一个通道的尺寸
            Err(PipelineError::DimensionMismatch { expected, actual }) => {
                let reference = infos.iter().next().map(|(_, info)| (info.width, info.height));
                let Some(dims) = reference else {
                    return Err(PipelineError::DimensionMismatch { expected, actual });
                };
                tracing::warn!(
                    "⚠️ 各通道高度不一致 ({:?} / {:?}), 空输出使用 {}x{}",
                    expected,
                    actual,
                    dims.0,
                    dims.1
                );
                dims
            }
            Err(e) => return Err(e),
        };
        self.open_muxer(width, height)
    }
}

impl Drop for PipelineRun<'_> {
    fn drop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.sync.close();
        if let Some(Err(e)) = self.finalize_output() {
            tracing::error!("❌ {}", e);
        }
        self.state = RunState::Aborted;
    }
}

/// 输出帧率取第一个通道, 其余通道不同时告警
fn reference_fps(readers: &ChannelMap<StreamReader>) -> f64 {
    let mut infos = readers.iter().map(|(channel, reader)| (channel, reader.info()));
    let Some((reference, first)) = infos.next() else {
        return 0.0;
    };
    for (channel, info) in infos {
        if (info.fps - first.fps).abs() > 1e-3 {
            tracing::warn!(
                "⚠️ {}帧率 {:.2} 与{}帧率 {:.2} 不一致, 输出使用 {:.2}fps",
                channel.label(),
                info.fps,
                reference.label(),
                first.fps,
                first.fps
            );
        }
    }
    first.fps
}
