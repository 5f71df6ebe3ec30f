// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/config.rs - 模型与预处理配置
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

use std::path::PathBuf;

use crate::chip::ChipSize;

pub const DEFAULT_LABEL_FILE: &str = "labels.txt";

pub const DETECTOR_GRAPH_FILE: &str = "multires.onnx";
pub const DETECTOR_INPUT: &str = "image_tensor";
pub const DETECTOR_BOXES: &str = "detection_boxes";
pub const DETECTOR_SCORES: &str = "detection_scores";
pub const DETECTOR_CLASSES: &str = "detection_classes";
pub const DETECTOR_COUNT: &str = "num_detections";

pub const CLASSIFIER_GRAPH_FILE: &str = "tensorflow_inception_graph.onnx";
pub const CLASSIFIER_INPUT: &str = "input";
pub const CLASSIFIER_OUTPUT: &str = "output";
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;
pub const CLASSIFIER_MEAN: f32 = 117.0;
pub const CLASSIFIER_SCALE: f32 = 1.0;

/// 输入张量的元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorDType {
  /// 原始像素，检测模型常用
  U8,
  /// `(value - mean) / scale` 归一化后的浮点
  F32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
  pub width: u32,
  pub height: u32,
  pub mean: f32,
  pub scale: f32,
  pub dtype: TensorDType,
}

impl PreprocessConfig {
  pub fn detector(size: ChipSize) -> Self {
    Self {
      width: size.width,
      height: size.height,
      mean: 0.0,
      scale: 1.0,
      dtype: TensorDType::U8,
    }
  }

  pub fn classifier(size: u32, mean: f32, scale: f32) -> Self {
    Self {
      width: size,
      height: size,
      mean,
      scale,
      dtype: TensorDType::F32,
    }
  }
}

/// 检测模型输出张量的名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorOutputs {
  pub boxes: String,
  pub scores: String,
  pub classes: String,
  /// 部分导出的模型没有该输出
  pub count: Option<String>,
}

impl Default for DetectorOutputs {
  fn default() -> Self {
    Self {
      boxes: DETECTOR_BOXES.to_string(),
      scores: DETECTOR_SCORES.to_string(),
      classes: DETECTOR_CLASSES.to_string(),
      count: Some(DETECTOR_COUNT.to_string()),
    }
  }
}

impl DetectorOutputs {
  pub fn names(&self) -> Vec<&str> {
    let mut names = vec![
      self.boxes.as_str(),
      self.scores.as_str(),
      self.classes.as_str(),
    ];
    if let Some(count) = &self.count {
      names.push(count.as_str());
    }
    names
  }
}

/// 一个模型目录中的文件与张量约定
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
  pub model_dir: PathBuf,
  pub graph_file: String,
  pub label_file: String,
  pub input_name: String,
  pub preprocess: PreprocessConfig,
  /// 会话池大小，等于可并发推理的切片数
  pub sessions: usize,
}

impl ModelConfig {
  pub fn detector(model_dir: impl Into<PathBuf>, size: ChipSize) -> Self {
    Self {
      model_dir: model_dir.into(),
      graph_file: DETECTOR_GRAPH_FILE.to_string(),
      label_file: DEFAULT_LABEL_FILE.to_string(),
      input_name: DETECTOR_INPUT.to_string(),
      preprocess: PreprocessConfig::detector(size),
      sessions: 1,
    }
  }

  pub fn classifier(model_dir: impl Into<PathBuf>) -> Self {
    Self {
      model_dir: model_dir.into(),
      graph_file: CLASSIFIER_GRAPH_FILE.to_string(),
      label_file: DEFAULT_LABEL_FILE.to_string(),
      input_name: CLASSIFIER_INPUT.to_string(),
      preprocess: PreprocessConfig::classifier(
        CLASSIFIER_INPUT_SIZE,
        CLASSIFIER_MEAN,
        CLASSIFIER_SCALE,
      ),
      sessions: 1,
    }
  }

  pub fn graph_path(&self) -> PathBuf {
    self.model_dir.join(&self.graph_file)
  }

  pub fn label_path(&self) -> PathBuf {
    self.model_dir.join(&self.label_file)
  }
}
