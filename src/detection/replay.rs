//! 回放检测器 (Replay Detector)
//! 从JSON文件读取预先计算的逐帧检测结果, 按tick序号回放
//!
//! 文件格式:
//! ```json
//! {
//!   "model": "rgb_training/best.pt",
//!   "frames": {
//!     "1": [{ "bbox": { "x1": 200, "y1": 200, "x2": 400, "y2": 400 }, "label": "UAV", "confidence": 0.95 }]
//!   }
//! }
//! ```
//! `frames` 也可以是按tick顺序排列的数组 (第一个元素对应序号1)。
//! 未出现的序号视为空检测集合。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use super::{DetectionSet, Detector, DetectorError, FusedDetector};
use crate::types::Frame;

#[derive(Debug, Deserialize)]
struct ReplayFile {
    #[serde(default)]
    model: Option<String>,
    frames: ReplayFrames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayFrames {
    ByIndex(HashMap<String, DetectionSet>),
    Sequence(Vec<DetectionSet>),
}

#[derive(Clone, Debug)]
pub struct ReplayDetector {
    name: String,
    frames: HashMap<u64, DetectionSet>,
}

impl ReplayDetector {
    pub fn new(name: impl Into<String>, frames: HashMap<u64, DetectionSet>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: ReplayFile = serde_json::from_str(json).context("检测回放文件解析失败")?;
        let name = file.model.unwrap_or_else(|| "replay".to_string());
        let frames = match file.frames {
            ReplayFrames::ByIndex(map) => map
                .into_iter()
                .map(|(key, set)| {
                    key.trim()
                        .parse::<u64>()
                        .map(|index| (index, set))
                        .map_err(|_| anyhow!("非法帧序号 '{}'", key))
                })
                .collect::<Result<HashMap<_, _>>>()?,
            ReplayFrames::Sequence(sets) => sets
                .into_iter()
                .enumerate()
                .map(|(i, set)| (i as u64 + 1, set))
                .collect(),
        };
        Ok(Self::new(name, frames))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("无法读取检测回放文件 {}", path.display()))?;
        let detector = Self::from_json(&json)?;
        tracing::info!(
            "✅ 检测回放已加载: {} ({} 帧有结果)",
            path.display(),
            detector.frames.len()
        );
        Ok(detector)
    }

    fn lookup(&self, index: u64) -> DetectionSet {
        self.frames.get(&index).cloned().unwrap_or_default()
    }
}

impl Detector for ReplayDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, frame: &Frame) -> Result<DetectionSet, DetectorError> {
        Ok(self.lookup(frame.index))
    }
}

impl FusedDetector for ReplayDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect_pair(&self, visible: &Frame, _thermal: &Frame) -> Result<DetectionSet, DetectorError> {
        Ok(self.lookup(visible.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;
    use image::RgbImage;

    const SAMPLE: &str = r#"{
        "model": "ir_training",
        "frames": {
            "2": [
                { "bbox": { "x1": 10, "y1": 12, "x2": 30, "y2": 40 }, "label": "UAV", "confidence": 0.42 },
                { "bbox": { "x1": 50, "y1": 50, "x2": 60, "y2": 60 }, "label": "bird", "confidence": 0.10 }
            ]
        }
    }"#;

    #[test]
    fn test_replay_by_index() {
        let detector = ReplayDetector::from_json(SAMPLE).unwrap();
        assert_eq!(Detector::name(&detector), "ir_training");

        let frame = |index| Frame::new(Channel::Thermal, index, RgbImage::new(4, 4));
        assert!(detector.detect(&frame(1)).unwrap().is_empty());
        let second = detector.detect(&frame(2)).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].label, "UAV");
        assert_eq!(second[1].caption(), "bird - 0.10");
    }

    #[test]
    fn test_sequence_form() {
        let json = r#"{ "frames": [[], [{ "bbox": { "x1": 0, "y1": 0, "x2": 5, "y2": 5 }, "label": "UAV", "confidence": 0.5 }]] }"#;
        let detector = ReplayDetector::from_json(json).unwrap();
        assert_eq!(Detector::name(&detector), "replay");
        let frame = |index| Frame::new(Channel::Visible, index, RgbImage::new(4, 4));
        assert!(detector.detect(&frame(1)).unwrap().is_empty());
        assert_eq!(detector.detect(&frame(2)).unwrap().len(), 1);
        assert!(detector.detect(&frame(3)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(ReplayDetector::from_json("{\"frames\": 3}").is_err());
        assert!(ReplayDetector::from_json("{\"frames\": {\"first\": []}}").is_err());
    }
}
