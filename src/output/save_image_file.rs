// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的整图
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  chip::{Chip, PixelRect},
  model::Detection,
  output::{OutputError, Render, check_scheme},
};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i64 = 2;

pub struct SaveImageFileOutput {
  path: PathBuf,
  color: [u8; 3],
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = OutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(uri)?;
    Ok(SaveImageFileOutput {
      path: uri.path().to_string().into(),
      color: BOX_COLOR,
    })
  }
}

/// 在整图上绘制检测框，越界部分被裁掉，退化的框被忽略
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection], color: [u8; 3]) {
  let (w, h) = (image.width() as i64, image.height() as i64);
  if w == 0 || h == 0 {
    return;
  }
  for detection in detections {
    let PixelRect {
      min_x,
      min_y,
      max_x,
      max_y,
    } = detection.bounds;

    for t in 0..BOX_THICKNESS {
      let x0 = (min_x + t).clamp(0, w - 1);
      let y0 = (min_y + t).clamp(0, h - 1);
      let x1 = (max_x - t).clamp(0, w - 1);
      let y1 = (max_y - t).clamp(0, h - 1);
      if x0 >= x1 || y0 >= y1 {
        continue;
      }
      let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: &RgbImage) -> Result<(), OutputError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    warn!("保存图像到文件: {}", self.path.display());
    Ok(())
  }
}

impl Render for SaveImageFileOutput {
  type Error = OutputError;

  fn render_chip(&self, chip: &Chip, detections: &[Detection]) -> Result<(), Self::Error> {
    debug!(
      "切片 ({}, {}) 检测到 {} 个目标",
      chip.index.x,
      chip.index.y,
      detections.len()
    );
    Ok(())
  }

  fn finish(&self, image: &RgbImage, detections: &[Detection]) -> Result<(), Self::Error> {
    let mut image = image.clone();
    draw_detections(&mut image, detections, self.color);
    self.save_image(&image)
  }
}
