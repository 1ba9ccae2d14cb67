/// 图片序列目录帧源
/// Image-sequence directory source (frames sorted by file name)
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;

use super::FrameSource;
use crate::types::StreamInfo;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    info: StreamInfo,
    pending: VecDeque<PathBuf>,
}

impl ImageSequenceSource {
    /// 扫描目录并读取第一帧确定尺寸
    pub fn open(dir: &Path, fps: f64) -> Result<Self> {
        if fps <= 0.0 || !fps.is_finite() {
            bail!("帧率无效: {}", fps);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("无法读取目录 {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_frame_file(p))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .with_context(|| format!("目录中没有图片帧: {}", dir.display()))?;
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("无法读取图片尺寸: {}", first.display()))?;

        tracing::debug!("🖼️ 图片序列: {} 帧 {}x{}", paths.len(), width, height);

        Ok(Self {
            info: StreamInfo { width, height, fps },
            pending: paths.into(),
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let img = image::open(&path)
            .with_context(|| format!("图片解码失败: {}", path.display()))?
            .to_rgb8();
        Ok(Some(img))
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_reads_frames_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, v) in [("b_0002.png", 20u8), ("a_0001.png", 10u8)] {
            RgbImage::from_pixel(8, 6, Rgb([v, v, v]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();
        assert_eq!(
            source.info(),
            StreamInfo {
                width: 8,
                height: 6,
                fps: 30.0
            }
        );
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), &Rgb([10, 10, 10]));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.get_pixel(0, 0), &Rgb([20, 20, 20]));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequenceSource::open(dir.path(), 30.0).is_err());
    }
}
