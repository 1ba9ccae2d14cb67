//! 检测框叠加渲染器 (Overlay Renderer)
//! 职责: 帧 + 检测集合 → 新的标注帧, 输入帧保持不变

use std::fs;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::{glyph, OverlayStyle};
use crate::detection::{BBox, Detection};
use crate::types::{AnnotatedFrame, Frame};

/// 标签字体
pub enum LabelFont {
    /// 内置 5x7 点阵
    Bitmap,
    TrueType(FontVec),
}

impl LabelFont {
    /// 从文件加载 TrueType 字体, 失败时回退到点阵字体
    pub fn load(path: &str) -> Self {
        match fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()))
        {
            Ok(font) => {
                tracing::info!("✅ 标签字体已加载: {}", path);
                LabelFont::TrueType(font)
            }
            Err(e) => {
                tracing::warn!("⚠️ 字体加载失败 ({}): {}, 使用内置点阵字体", path, e);
                LabelFont::Bitmap
            }
        }
    }
}

/// 画面坐标系下的整数框 (已归一化并限幅)
#[derive(Clone, Copy, Debug)]
struct PixelBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

pub struct OverlayRenderer {
    style: OverlayStyle,
    font: LabelFont,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        let font = match style.font_path.as_deref() {
            Some(path) => LabelFont::load(path),
            None => LabelFont::Bitmap,
        };
        Self { style, font }
    }

    pub fn with_font(style: OverlayStyle, font: LabelFont) -> Self {
        Self { style, font }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// 绘制检测框和 "label - 0.95" 标签
    ///
    /// 空集合返回与输入逐像素相同的副本
    pub fn render(&self, frame: &Frame, detections: &[Detection]) -> AnnotatedFrame {
        let mut image = frame.image.clone();

        for detection in detections
            .iter()
            .filter(|d| d.confidence >= self.style.min_confidence)
        {
            let Some(bbox) = self.clip_to_canvas(&detection.bbox, &image) else {
                tracing::warn!("⚠️ 忽略非法检测框: {} {:?}", detection.label, detection.bbox);
                continue;
            };
            self.draw_box(&mut image, bbox);
            self.draw_caption(&mut image, bbox, &detection.caption());
        }

        Frame::new(frame.channel, frame.index, image)
    }

    /// 框坐标转为整数像素, 限制在画面外扩 `thickness + 1` 的范围内
    ///
    /// NaN 或无穷坐标返回 `None`
    fn clip_to_canvas(&self, bbox: &BBox, image: &RgbImage) -> Option<PixelBox> {
        if ![bbox.x1, bbox.y1, bbox.x2, bbox.y2].iter().all(|v| v.is_finite()) {
            return None;
        }
        let bbox = bbox.normalized();
        let margin = self.style.thickness.max(1) as f32 + 1.0;
        let (w, h) = (image.width() as f32, image.height() as f32);
        let x = |v: f32| v.clamp(-margin, w + margin).round() as i32;
        let y = |v: f32| v.clamp(-margin, h + margin).round() as i32;
        Some(PixelBox {
            x1: x(bbox.x1),
            y1: y(bbox.y1),
            x2: x(bbox.x2),
            y2: y(bbox.y2),
        })
    }

    fn draw_box(&self, image: &mut RgbImage, bbox: PixelBox) {
        let color = Rgb(self.style.box_color);
        let PixelBox { x1, y1, x2, y2 } = bbox;
        let thickness = self.style.thickness.max(1) as i32;

        // 线宽以框边为中心向内外扩展
        for i in 0..thickness {
            let d = i - (thickness - 1) / 2;
            let width = x2 - x1 - 2 * d + 1;
            let height = y2 - y1 - 2 * d + 1;
            if width <= 0 || height <= 0 {
                continue;
            }
            let rect = Rect::at(x1 + d, y1 + d).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, color);
        }
    }

    fn draw_caption(&self, image: &mut RgbImage, bbox: PixelBox, caption: &str) {
        let color = Rgb(self.style.text_color);
        let (text_w, text_h) = self.text_size(caption);
        let gap = self.style.label_gap as i32;
        let (x1, y1) = (bbox.x1, bbox.y1);

        // 优先放在框上方, 越界时放进框内
        let mut y = y1.saturating_sub(text_h as i32).saturating_sub(gap);
        if y < 0 {
            y = y1.saturating_add(self.style.thickness as i32).saturating_add(gap);
        }
        let max_x = (image.width() as i32 - text_w as i32).max(0);
        let max_y = (image.height() as i32 - text_h as i32).max(0);
        let x = x1.clamp(0, max_x);
        let y = y.clamp(0, max_y);

        match &self.font {
            LabelFont::Bitmap => {
                glyph::draw_text(image, x, y, self.style.bitmap_scale, caption, color)
            }
            LabelFont::TrueType(font) => {
                draw_text_mut(image, color, x, y, PxScale::from(self.style.font_size), font, caption)
            }
        }
    }

    fn text_size(&self, text: &str) -> (u32, u32) {
        match &self.font {
            LabelFont::Bitmap => glyph::text_size(text, self.style.bitmap_scale),
            LabelFont::TrueType(font) => text_size(PxScale::from(self.style.font_size), font, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Channel;

    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame::new(
            Channel::Visible,
            1,
            RgbImage::from_pixel(width, height, Rgb([40, 40, 40])),
        )
    }

    fn uav() -> Detection {
        Detection::new(BBox::new(200.0, 200.0, 400.0, 400.0), "UAV", 0.95)
    }

    fn has_color_in(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>, color: Rgb<u8>) -> bool {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .any(|(x, y)| image.get_pixel(x, y) == &color)
    }

    #[test]
    fn test_empty_detections_identical_copy() {
        let renderer = OverlayRenderer::new(OverlayStyle::default());
        let frame = gray_frame(64, 48);
        let annotated = renderer.render(&frame, &[]);
        assert_eq!(annotated, frame);
    }

    #[test]
    fn test_box_edges_and_caption() {
        let renderer = OverlayRenderer::new(OverlayStyle::default());
        let frame = gray_frame(640, 480);
        let annotated = renderer.render(&frame, &[uav()]);

        // 原帧不变
        assert_eq!(frame.image.get_pixel(200, 300), &Rgb([40, 40, 40]));

        // 3像素线宽: 199..=201
        for x in 199..=201 {
            assert_eq!(annotated.image.get_pixel(x, 300), &GREEN);
        }
        assert_eq!(annotated.image.get_pixel(300, 300), &Rgb([40, 40, 40]));
        assert_eq!(annotated.image.get_pixel(300, 200), &GREEN);
        assert_eq!(annotated.image.get_pixel(400, 399), &GREEN);

        // 标签位于框上方: y = 200 - 14 - 6
        assert!(has_color_in(&annotated.image, 200..320, 180..194, GREEN));
        assert!(!has_color_in(&annotated.image, 0..640, 0..170, GREEN));
    }

    #[test]
    fn test_caption_moves_inside_at_top_edge() {
        let renderer = OverlayRenderer::new(OverlayStyle::default());
        let frame = gray_frame(320, 240);
        let detection = Detection::new(BBox::new(10.0, 2.0, 120.0, 100.0), "UAV", 0.5);
        let annotated = renderer.render(&frame, &[detection]);

        // 框内: y = 2 + 3 + 6 = 11
        assert!(has_color_in(&annotated.image, 12..100, 11..25, GREEN));
    }

    #[test]
    fn test_min_confidence_filter() {
        let style = OverlayStyle {
            min_confidence: 0.5,
            ..OverlayStyle::default()
        };
        let renderer = OverlayRenderer::new(style);
        let frame = gray_frame(640, 480);
        let weak = Detection::new(BBox::new(10.0, 10.0, 50.0, 50.0), "bird", 0.2);
        assert_eq!(renderer.render(&frame, &[weak]), frame);
    }

    #[test]
    fn test_missing_font_falls_back_to_bitmap() {
        let style = OverlayStyle {
            font_path: Some("/nonexistent/font.ttf".to_string()),
            ..OverlayStyle::default()
        };
        let renderer = OverlayRenderer::new(style);
        assert!(matches!(renderer.font, LabelFont::Bitmap));
        let annotated = renderer.render(&gray_frame(640, 480), &[uav()]);
        assert!(has_color_in(&annotated.image, 200..320, 180..194, GREEN));
    }

    #[test]
    fn test_extreme_boxes_do_not_panic() {
        let renderer = OverlayRenderer::new(OverlayStyle::default());
        let frame = gray_frame(64, 48);

        // 超大框被限幅到画面附近, 上下边仍然横贯整个画面
        let wide = Detection::new(BBox::new(-3.0e9, 10.0, 3.0e9, 20.0), "UAV", 0.9);
        let annotated = renderer.render(&frame, &[wide]);
        assert_eq!(annotated.image.dimensions(), (64, 48));
        for x in [0, 32, 63] {
            assert_eq!(annotated.image.get_pixel(x, 10), &GREEN);
            assert_eq!(annotated.image.get_pixel(x, 20), &GREEN);
        }

        // 无穷 / NaN 坐标的框被忽略
        let infinite = Detection::new(BBox::new(5.0, f32::NEG_INFINITY, 20.0, 30.0), "UAV", 0.9);
        let nan = Detection::new(BBox::new(f32::NAN, 1.0, 20.0, 30.0), "UAV", 0.9);
        assert_eq!(renderer.render(&frame, &[infinite, nan]), frame);

        let huge = Detection::new(BBox::new(f32::MIN, f32::MIN, f32::MAX, f32::MAX), "UAV", 0.9);
        assert_eq!(renderer.render(&frame, &[huge]).image.dimensions(), (64, 48));
    }
}
