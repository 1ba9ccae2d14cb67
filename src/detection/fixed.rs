/// 固定结果检测器: 每帧返回同一组检测 (演示/联调用)
use super::{BBox, Detection, DetectionSet, Detector, DetectorError};
use crate::types::Frame;

#[derive(Clone, Debug, Default)]
pub struct FixedDetector {
    detections: DetectionSet,
}

impl FixedDetector {
    pub fn new(detections: DetectionSet) -> Self {
        Self { detections }
    }

    /// 演示框: UAV 0.95 @ (200,200)-(400,400)
    pub fn demo() -> Self {
        Self::new(vec![Detection::new(
            BBox::new(200.0, 200.0, 400.0, 400.0),
            "UAV",
            0.95,
        )])
    }
}

impl Detector for FixedDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _frame: &Frame) -> Result<DetectionSet, DetectorError> {
        Ok(self.detections.clone())
    }
}
