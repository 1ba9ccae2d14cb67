//! 检测适配器 (Detection Adapter)
//! 职责: 按通道调用注入的检测能力 → 返回检测集合, 错误统一为 DetectionUnavailable

use std::sync::Arc;

use super::{DetectionSet, Detector, DetectorError, FusedDetector};
use crate::error::{DetectionScope, PipelineError, PipelineResult};
use crate::types::{Channel, ChannelMap, Frame, Mode};

/// 检测能力组合
#[derive(Clone)]
pub enum DetectionAdapter {
    /// 每个通道独立模型 (不同权重)
    PerChannel(ChannelMap<Arc<dyn Detector>>),
    /// 双光融合模型: 一个tick的两帧 → 一个共享检测集合
    Unified(Arc<dyn FusedDetector>),
}

impl Default for DetectionAdapter {
    fn default() -> Self {
        Self::PerChannel(ChannelMap::new())
    }
}

impl DetectionAdapter {
    pub fn per_channel() -> Self {
        Self::default()
    }

    /// 为通道注入检测能力 (仅 PerChannel)
    pub fn with_detector(mut self, channel: Channel, detector: Arc<dyn Detector>) -> Self {
        match &mut self {
            DetectionAdapter::PerChannel(detectors) => {
                detectors.insert(channel, detector);
            }
            DetectionAdapter::Unified(_) => {
                tracing::warn!("⚠️ 融合模式下忽略单通道检测器: {}", channel);
            }
        }
        self
    }

    pub fn unified(detector: Arc<dyn FusedDetector>) -> Self {
        Self::Unified(detector)
    }

    /// 运行前检查: 模式需要的检测能力是否齐全
    pub fn check_mode(&self, mode: Mode) -> PipelineResult<()> {
        match self {
            DetectionAdapter::PerChannel(detectors) => {
                for &channel in mode.channels() {
                    if !detectors.contains(channel) {
                        return Err(PipelineError::DetectionUnavailable {
                            scope: DetectionScope::Channel(channel),
                            reason: "未注入检测能力".to_string(),
                        });
                    }
                }
                Ok(())
            }
            DetectionAdapter::Unified(_) if mode == Mode::Combined => Ok(()),
            DetectionAdapter::Unified(_) => Err(PipelineError::DetectionUnavailable {
                scope: DetectionScope::Fused,
                reason: format!("融合模型只能用于双光模式, 当前模式: {}", mode),
            }),
        }
    }

    /// 单通道检测
    pub fn detect(&self, frame: &Frame, channel: Channel) -> PipelineResult<DetectionSet> {
        match self {
            DetectionAdapter::PerChannel(detectors) => {
                let detector = detectors.get(channel).ok_or_else(|| {
                    PipelineError::DetectionUnavailable {
                        scope: DetectionScope::Channel(channel),
                        reason: "未注入检测能力".to_string(),
                    }
                })?;
                detector
                    .detect(frame)
                    .map_err(|e| unavailable(DetectionScope::Channel(channel), e))
            }
            DetectionAdapter::Unified(_) => Err(PipelineError::DetectionUnavailable {
                scope: DetectionScope::Fused,
                reason: "融合模型需要同一tick的两路帧".to_string(),
            }),
        }
    }

    /// 一个tick的全部检测
    ///
    /// `parallel` 为真时各通道检测在作用域线程中并行执行, 结果顺序不变
    pub fn detect_tick(
        &self,
        frames: &ChannelMap<Frame>,
        parallel: bool,
    ) -> PipelineResult<ChannelMap<DetectionSet>> {
        match self {
            DetectionAdapter::Unified(fused) => {
                let (Some(visible), Some(thermal)) =
                    (frames.get(Channel::Visible), frames.get(Channel::Thermal))
                else {
                    return Err(PipelineError::DetectionUnavailable {
                        scope: DetectionScope::Fused,
                        reason: "融合模型需要同一tick的两路帧".to_string(),
                    });
                };
                let shared = fused
                    .detect_pair(visible, thermal)
                    .map_err(|e| unavailable(DetectionScope::Fused, e))?;
                Ok([
                    (Channel::Visible, shared.clone()),
                    (Channel::Thermal, shared),
                ]
                .into_iter()
                .collect())
            }
            DetectionAdapter::PerChannel(_) if parallel && frames.len() > 1 => {
                let results: Vec<(Channel, PipelineResult<DetectionSet>)> =
                    std::thread::scope(|s| {
                        let handles: Vec<_> = frames
                            .iter()
                            .map(|(channel, frame)| {
                                (channel, s.spawn(move || self.detect(frame, channel)))
                            })
                            .collect();
                        handles
                            .into_iter()
                            .map(|(channel, handle)| {
                                let result = handle.join().unwrap_or_else(|_| {
                                    Err(PipelineError::DetectionUnavailable {
                                        scope: DetectionScope::Channel(channel),
                                        reason: "检测线程崩溃".to_string(),
                                    })
                                });
                                (channel, result)
                            })
                            .collect()
                    });

                let mut sets = ChannelMap::new();
                for (channel, result) in results {
                    sets.insert(channel, result?);
                }
                Ok(sets)
            }
            DetectionAdapter::PerChannel(_) => {
                let mut sets = ChannelMap::new();
                for (channel, frame) in frames.iter() {
                    sets.insert(channel, self.detect(frame, channel)?);
                }
                Ok(sets)
            }
        }
    }
}

fn unavailable(scope: DetectionScope, e: DetectorError) -> PipelineError {
    PipelineError::DetectionUnavailable {
        scope,
        reason: e.to_string(),
    }
}
