// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/output/text_file.rs - 检测结果文本文件
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  chip::Chip,
  model::Detection,
  output::{LineFormat, OutputError, Render, check_scheme},
};

pub struct TextFileOutput {
  path: PathBuf,
  format: LineFormat,
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for TextFileOutput {
  const SCHEME: &'static str = "file";
}

impl FromUrl for TextFileOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Self::create(url.path(), LineFormat::from_url(url)?)
  }
}

impl TextFileOutput {
  pub fn create(path: impl AsRef<Path>, format: LineFormat) -> Result<Self, OutputError> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;

    Ok(TextFileOutput {
      path,
      format,
      writer: Mutex::new(BufWriter::new(file)),
    })
  }

  fn with_writer<F>(&self, f: F) -> Result<(), OutputError>
  where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
  {
    // 写入中途 panic 后锁会损坏，缓冲区仍可继续使用
    let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut *writer)?;
    Ok(())
  }
}

impl Render for TextFileOutput {
  type Error = OutputError;

  fn render_chip(&self, _chip: &Chip, detections: &[Detection]) -> Result<(), Self::Error> {
    self.with_writer(|writer| {
      for detection in detections {
        writeln!(writer, "{}", self.format.format(detection))?;
      }
      Ok(())
    })
  }

  fn finish(&self, _image: &RgbImage, detections: &[Detection]) -> Result<(), Self::Error> {
    self.with_writer(|writer| writer.flush())?;
    warn!("写入 {} 条检测结果到文件: {}", detections.len(), self.path.display());
    Ok(())
  }
}
