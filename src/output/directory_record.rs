// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/output/directory_record.rs - 切片目录记录输出
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

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  chip::Chip,
  model::Detection,
  output::{OutputError, Render, check_scheme},
};

/// 记录文件中类别列的写法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn lines(&self, detections: &[Detection]) -> Vec<String> {
    detections
      .iter()
      .map(|d| {
        let name = if self.label_with_name && !d.description.is_empty() {
          d.description.clone()
        } else {
          d.class_id.to_string()
        };
        format!(
          "{}, {:.4}, {}, {}, {}, {}",
          name, d.confidence, d.bounds.min_x, d.bounds.min_y, d.bounds.max_x, d.bounds.max_y
        )
      })
      .collect()
  }

  pub fn record(&self, detections: &[Detection], path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.lines(detections).join("\n"))
  }
}

/// 把每个切片保存为 PNG，并在同名 `.txt` 中记录其检测结果。
///
/// `folder:///dir?record=id&always`：`record=id` 记录类别编号而非名称，
/// `always` 表示没有检测结果的切片也保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Record,
  always: bool,
  started: DateTime<Utc>,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = OutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(uri)?;

    let label_with_name = !uri.query_pairs().any(|(k, v)| k == "record" && v == "id");
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      record: Record { label_with_name },
      always,
      started: Utc::now(),
    })
  }
}

impl DirectoryRecordOutput {
  /// 同一次运行的所有切片放在 `年/月/日` 目录下，文件名以精确到毫秒的启动时间开头
  fn chip_path(&self, chip: &Chip) -> Result<PathBuf, OutputError> {
    let directory = self
      .directory
      .join(self.started.year().to_string())
      .join(format!("{:02}", self.started.month()))
      .join(format!("{:02}", self.started.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-chip-{:03}-{:03}.png",
      self.started.format("%H-%M-%S-%3f"),
      chip.index.x,
      chip.index.y
    )))
  }
}

impl Render for DirectoryRecordOutput {
  type Error = OutputError;

  fn render_chip(&self, chip: &Chip, detections: &[Detection]) -> Result<(), Self::Error> {
    if !self.always && detections.is_empty() {
      debug!("切片 ({}, {}) 没有检测结果，跳过保存", chip.index.x, chip.index.y);
      return Ok(());
    }

    let path = self.chip_path(chip)?;
    chip.image.save(&path)?;
    self.record.record(detections, &path)?;
    warn!("保存切片到文件: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chip::{ChipIndex, PixelRect};
  use image::RgbImage;

  fn chip(x: u32, y: u32) -> Chip {
    Chip {
      index: ChipIndex { x, y },
      image: RgbImage::new(4, 4),
    }
  }

  fn detection(description: &str) -> Detection {
    Detection {
      bounds: PixelRect {
        min_x: 10,
        min_y: 20,
        max_x: 30,
        max_y: 40,
      },
      class_id: 2,
      chip: ChipIndex { x: 1, y: 0 },
      description: description.to_string(),
      confidence: 0.5,
    }
  }

  fn files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
      for entry in std::fs::read_dir(d).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          found.push(path);
        }
      }
    }
    found.sort();
    found
  }

  #[test]
  fn record_prefers_names_and_falls_back_to_ids() {
    let record = Record {
      label_with_name: true,
    };
    let lines = record.lines(&[detection("bicycle"), detection("")]);
    assert_eq!(lines[0], "bicycle, 0.5000, 10, 20, 30, 40");
    assert_eq!(lines[1], "2, 0.5000, 10, 20, 30, 40");
  }

  #[test]
  fn saves_only_chips_with_detections_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::from_directory_path(dir.path()).unwrap();
    let url = Url::parse(&url.as_str().replacen("file", "folder", 1)).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    output.render_chip(&chip(0, 0), &[]).unwrap();
    output.render_chip(&chip(1, 0), &[detection("bicycle")]).unwrap();

    let files = files(dir.path());
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|p| p.to_string_lossy().ends_with("chip-001-000.png")));
    assert!(files.iter().any(|p| p.to_string_lossy().ends_with("chip-001-000.txt")));
  }

  #[test]
  fn chip_names_carry_millisecond_start_time() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let path = output.chip_path(&chip(4, 7)).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    let expected = format!("{}-chip-004-007.png", output.started.format("%H-%M-%S-%3f"));
    assert_eq!(name, expected);
    assert_eq!(name.len(), "00-00-00-000-chip-004-007.png".len());
  }

  #[test]
  fn always_keeps_empty_chips() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("folder://{}?always&record=id", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert!(!output.record.label_with_name);

    output.render_chip(&chip(0, 0), &[]).unwrap();
    assert_eq!(files(dir.path()).len(), 2);
  }
}
