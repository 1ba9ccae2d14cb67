/// 检测数据结构定义
/// Detection data structures
use serde::{Deserialize, Serialize};

/// 检测框 (像素坐标, 左上 + 右下)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// 坐标规范化 (保证 x1<=x2, y1<=y2)
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }
}

/// 单个检测结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    pub label: String,
    pub confidence: f32, // [0, 1]
}

impl Detection {
    pub fn new(bbox: BBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }

    /// 标签文本, 例如 `UAV - 0.95`
    pub fn caption(&self) -> String {
        format!("{} - {:.2}", self.label, self.confidence)
    }
}

/// 单帧检测集合 (有序, 可为空)
pub type DetectionSet = Vec<Detection>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_two_decimals() {
        let det = Detection::new(BBox::new(200.0, 200.0, 400.0, 400.0), "UAV", 0.95);
        assert_eq!(det.caption(), "UAV - 0.95");
        let det = Detection::new(BBox::new(0.0, 0.0, 1.0, 1.0), "bird", 0.5);
        assert_eq!(det.caption(), "bird - 0.50");
    }

    #[test]
    fn test_bbox_normalized() {
        let b = BBox::new(10.0, 40.0, 5.0, 20.0).normalized();
        assert_eq!(b, BBox::new(5.0, 20.0, 10.0, 40.0));
        assert_eq!(b.width(), 5.0);
        assert_eq!(b.height(), 20.0);
    }
}
