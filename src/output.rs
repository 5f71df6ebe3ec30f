// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/output.rs - 输出定义
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

use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, chip::Chip, model::Detection};

mod stdout_output;
mod text_file;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "save_image_file")]
mod save_image_file;

pub use self::stdout_output::StdoutOutput;
pub use self::text_file::TextFileOutput;

#[cfg(feature = "directory_record")]
pub use self::directory_record::DirectoryRecordOutput;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::SaveImageFileOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch { expected: &'static str, found: String },
  #[error("不支持的输出方式: {0}")]
  UnsupportedScheme(String),
  #[error("不支持的输出格式: {0}")]
  UnsupportedFormat(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

pub(crate) fn check_scheme<T: FromUrlWithScheme>(url: &Url) -> Result<(), OutputError> {
  if url.scheme() != T::SCHEME {
    return Err(OutputError::SchemeMismatch {
      expected: T::SCHEME,
      found: url.scheme().to_string(),
    });
  }
  Ok(())
}

/// 检测结果的渲染目标。切片按行优先顺序依次到达，最后调用一次 `finish`。
pub trait Render {
  type Error;

  fn render_chip(&self, chip: &Chip, detections: &[Detection]) -> Result<(), Self::Error>;

  fn finish(&self, _image: &RgbImage, _detections: &[Detection]) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// 文本输出的行格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineFormat {
  /// `min_x min_y max_x max_y class_id confidence`
  #[default]
  Plain,
  /// 每行一个 JSON 对象
  Json,
}

impl LineFormat {
  pub fn from_url(url: &Url) -> Result<Self, OutputError> {
    match url.query_pairs().find(|(k, _)| k == "format") {
      None => Ok(LineFormat::Plain),
      Some((_, v)) if v == "plain" || v == "text" => Ok(LineFormat::Plain),
      Some((_, v)) if v == "json" => Ok(LineFormat::Json),
      Some((_, v)) => Err(OutputError::UnsupportedFormat(v.into_owned())),
    }
  }

  pub fn format(&self, detection: &Detection) -> String {
    match self {
      LineFormat::Plain => detection.to_line(),
      LineFormat::Json => json!({
        "min_x": detection.bounds.min_x,
        "min_y": detection.bounds.min_y,
        "max_x": detection.bounds.max_x,
        "max_y": detection.bounds.max_y,
        "class_id": detection.class_id,
        "description": detection.description,
        "confidence": shortest_f64(detection.confidence),
        "chip": [detection.chip.x, detection.chip.y],
      })
      .to_string(),
    }
  }
}

/// f32 按最短十进制表示转为 f64，使 JSON 与文本行打印相同的数字
fn shortest_f64(value: f32) -> f64 {
  value.to_string().parse().unwrap_or(value as f64)
}

pub enum OutputWrapper {
  Stdout(StdoutOutput),
  TextFile(TextFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordOutput),
  #[cfg(feature = "save_image_file")]
  SaveImageFile(SaveImageFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == StdoutOutput::SCHEME {
      return Ok(OutputWrapper::Stdout(StdoutOutput::from_url(url)?));
    }
    if url.scheme() == TextFileOutput::SCHEME {
      return Ok(OutputWrapper::TextFile(TextFileOutput::from_url(url)?));
    }
    #[cfg(feature = "directory_record")]
    {
      if url.scheme() == DirectoryRecordOutput::SCHEME {
        let output = DirectoryRecordOutput::from_url(url)?;
        return Ok(OutputWrapper::DirectoryRecord(output));
      }
    }
    #[cfg(feature = "save_image_file")]
    {
      if url.scheme() == SaveImageFileOutput::SCHEME {
        let output = SaveImageFileOutput::from_url(url)?;
        return Ok(OutputWrapper::SaveImageFile(output));
      }
    }
    Err(OutputError::UnsupportedScheme(url.scheme().to_string()))
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_chip(&self, chip: &Chip, detections: &[Detection]) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Stdout(output) => output.render_chip(chip, detections),
      OutputWrapper::TextFile(output) => output.render_chip(chip, detections),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output.render_chip(chip, detections),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFile(output) => output.render_chip(chip, detections),
    }
  }

  fn finish(&self, image: &RgbImage, detections: &[Detection]) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Stdout(output) => output.finish(image, detections),
      OutputWrapper::TextFile(output) => output.finish(image, detections),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output.finish(image, detections),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFile(output) => output.finish(image, detections),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chip::{ChipIndex, PixelRect};

  fn detection() -> Detection {
    Detection {
      bounds: PixelRect {
        min_x: 300,
        min_y: 600,
        max_x: 600,
        max_y: 900,
      },
      class_id: 3,
      chip: ChipIndex { x: 1, y: 2 },
      description: "car".to_string(),
      confidence: 0.5,
    }
  }

  #[test]
  fn format_is_read_from_query() {
    let url = Url::parse("stdout:?format=json").unwrap();
    assert_eq!(LineFormat::from_url(&url).unwrap(), LineFormat::Json);
    let url = Url::parse("stdout:").unwrap();
    assert_eq!(LineFormat::from_url(&url).unwrap(), LineFormat::Plain);
    let url = Url::parse("stdout:?format=xml").unwrap();
    assert!(matches!(
      LineFormat::from_url(&url),
      Err(OutputError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn json_line_carries_description_and_chip() {
    let line = LineFormat::Json.format(&detection());
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["min_y"], 600);
    assert_eq!(value["description"], "car");
    assert_eq!(value["chip"], json!([1, 2]));
  }

  #[test]
  fn plain_line_matches_detection_record() {
    assert_eq!(LineFormat::Plain.format(&detection()), "300 600 600 900 3 0.5");
  }

  #[test]
  fn json_confidence_prints_like_plain_line() {
    let detection = Detection {
      confidence: 0.7,
      ..detection()
    };
    assert!(LineFormat::Plain.format(&detection).ends_with(" 0.7"));
    assert!(LineFormat::Json.format(&detection).contains("\"confidence\":0.7,"));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://localhost/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::UnsupportedScheme(_))
    ));
  }
}
