// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/model.rs - 模型
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

use crate::chip::{ChipIndex, PixelRect};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 模型在单个切片上给出的一个候选目标
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: i64,
  pub score: f32,
  pub bbox: [f32; 4], // 相对切片尺寸的归一化坐标，映射规则见 `chip::remap_box`
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

/// 映射到整图坐标后的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bounds: PixelRect,
  pub class_id: i64,
  pub chip: ChipIndex,
  pub description: String,
  pub confidence: f32,
}

impl Detection {
  /// `min_x min_y max_x max_y class_id confidence`
  pub fn to_line(&self) -> String {
    format!(
      "{} {} {} {} {} {}",
      self.bounds.min_x,
      self.bounds.min_y,
      self.bounds.max_x,
      self.bounds.max_y,
      self.class_id,
      self.confidence
    )
  }
}

mod classifier;
mod detector;

pub use self::classifier::{BestMatch, ClassifyError, Classifier, best_match};
pub use self::detector::{Detector, DetectorError, decode_detections};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detection_line_is_whitespace_separated() {
    let detection = Detection {
      bounds: PixelRect {
        min_x: 12,
        min_y: -3,
        max_x: 310,
        max_y: 299,
      },
      class_id: 18,
      chip: ChipIndex { x: 0, y: 0 },
      description: String::new(),
      confidence: 0.875,
    };
    assert_eq!(detection.to_line(), "12 -3 310 299 18 0.875");
  }
}
