/// PNG图片序列输出
/// Writes `frame_000001.png`... plus a `manifest.json` on finish
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::FrameSink;

/// 序列清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceManifest {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u64,
}

pub struct ImageSequenceSink {
    dir: PathBuf,
    manifest: SequenceManifest,
}

impl ImageSequenceSink {
    pub fn create(dir: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("无法创建输出目录 {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            manifest: SequenceManifest {
                width,
                height,
                fps,
                frames: 0,
            },
        })
    }

    pub fn frame_path(&self, number: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", number))
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        let path = self.frame_path(self.manifest.frames + 1);
        image
            .save(&path)
            .with_context(|| format!("写入 {} 失败", path.display()))?;
        self.manifest.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let path = self.dir.join("manifest.json");
        let json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(&path, json).with_context(|| format!("写入 {} 失败", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_writes_frames_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let mut sink = ImageSequenceSink::create(&dir, 4, 2, 25.0).unwrap();
        for v in [10u8, 20] {
            sink.write_frame(&RgbImage::from_pixel(4, 2, Rgb([v, v, v])))
                .unwrap();
        }
        sink.finish().unwrap();

        let second = image::open(dir.join("frame_000002.png")).unwrap().to_rgb8();
        assert_eq!(second.get_pixel(0, 0), &Rgb([20, 20, 20]));

        let manifest: SequenceManifest =
            serde_json::from_str(&fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest.frames, 2);
        assert_eq!((manifest.width, manifest.height), (4, 2));
    }
}
