// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/model/detector.rs - 目标检测模型
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
use thiserror::Error;
use tracing::debug;

use crate::{
  config::{DetectorOutputs, ModelConfig},
  engine::{EngineError, OrtEngine, RawTensor},
  frame::Preprocessor,
  model::{DetectItem, DetectResult, Model},
};

const BOX_COORDS: usize = 4;

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("推理引擎错误: {0}")]
  Engine(#[from] EngineError),
  #[error("输出张量 {tensor} 解析失败: {reason}")]
  Decode { tensor: String, reason: String },
}

impl DetectorError {
  fn decode(tensor: &str, reason: impl Into<String>) -> Self {
    DetectorError::Decode {
      tensor: tensor.to_string(),
      reason: reason.into(),
    }
  }
}

pub struct Detector {
  engine: OrtEngine,
  preprocessor: Preprocessor,
  outputs: DetectorOutputs,
  min_confidence: f32,
}

impl Detector {
  pub fn new(config: &ModelConfig, outputs: DetectorOutputs) -> Result<Self, DetectorError> {
    let engine = OrtEngine::load(config.graph_path(), &config.input_name, config.sessions)?;
    Ok(Self {
      engine,
      preprocessor: Preprocessor::new(config.preprocess.clone()),
      outputs,
      min_confidence: 0.0,
    })
  }

  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }
}

impl Model for Detector {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.preprocessor.preprocess(input);
    let names = self.outputs.names();
    let mut raw = self.engine.run(&tensor, &names)?.into_iter();

    // `names` 的顺序：boxes, scores, classes, [count]
    let missing = |name: &str| DetectorError::decode(name, "输出缺失");
    let boxes = raw.next().ok_or_else(|| missing(&self.outputs.boxes))?;
    let scores = raw.next().ok_or_else(|| missing(&self.outputs.scores))?;
    let classes = raw.next().ok_or_else(|| missing(&self.outputs.classes))?;
    let count = raw.next();

    decode_detections(
      &boxes,
      &scores,
      &classes,
      count.as_ref(),
      self.min_confidence,
    )
  }
}

/// 将检测模型的批输出（批大小为 1）解析为候选目标。
///
/// `count` 存在时，超出其数量的行视为填充并丢弃；低于 `min_confidence` 的行被过滤。
pub fn decode_detections(
  boxes: &RawTensor,
  scores: &RawTensor,
  classes: &RawTensor,
  count: Option<&RawTensor>,
  min_confidence: f32,
) -> Result<DetectResult, DetectorError> {
  if boxes.shape.last().copied() != Some(BOX_COORDS as i64) {
    return Err(DetectorError::decode(
      "boxes",
      format!("最后一维应为 {}，实际形状 {:?}", BOX_COORDS, boxes.shape),
    ));
  }
  if boxes.data.len() % BOX_COORDS != 0 {
    return Err(DetectorError::decode(
      "boxes",
      format!("数据长度 {} 不是 {} 的倍数", boxes.data.len(), BOX_COORDS),
    ));
  }

  let rows = boxes.data.len() / BOX_COORDS;
  if scores.data.len() != rows {
    return Err(DetectorError::decode(
      "scores",
      format!("期望 {} 行，实际 {} 行", rows, scores.data.len()),
    ));
  }
  if classes.data.len() != rows {
    return Err(DetectorError::decode(
      "classes",
      format!("期望 {} 行，实际 {} 行", rows, classes.data.len()),
    ));
  }

  let valid = match count {
    Some(count) => {
      let n = count
        .data
        .first()
        .ok_or_else(|| DetectorError::decode("count", "张量为空"))?;
      (n.max(0.0) as usize).min(rows)
    }
    None => rows,
  };
  debug!("检测输出 {} 行，有效 {} 行", rows, valid);

  let items: Vec<DetectItem> = boxes
    .data
    .chunks_exact(BOX_COORDS)
    .zip(scores.data.iter())
    .zip(classes.data.iter())
    .take(valid)
    .filter(|((_, score), _)| **score >= min_confidence)
    .map(|((bbox, &score), &class)| DetectItem {
      class_id: class as i64,
      score,
      bbox: [bbox[0], bbox[1], bbox[2], bbox[3]],
    })
    .collect();

  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}
