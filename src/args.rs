// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use url::Url;

use crate::{
  chip::ChipSize,
  config::{
    CLASSIFIER_GRAPH_FILE, CLASSIFIER_INPUT, CLASSIFIER_INPUT_SIZE, CLASSIFIER_MEAN,
    CLASSIFIER_OUTPUT, CLASSIFIER_SCALE, DEFAULT_LABEL_FILE, DETECTOR_BOXES, DETECTOR_CLASSES,
    DETECTOR_COUNT, DETECTOR_GRAPH_FILE, DETECTOR_INPUT, DETECTOR_SCORES, DetectorOutputs,
    ModelConfig, PreprocessConfig,
  },
  label::LabelPolicy,
};

/// 将大图切分为固定尺寸的切片，逐片检测并输出整图坐标
#[derive(Parser, Debug)]
#[command(name = "qiepian-detect", author, version, about, long_about = None)]
pub struct DetectArgs {
  /// 包含模型与标签文件的目录
  #[arg(long, value_name = "DIR")]
  pub dir: PathBuf,

  /// 待检测的 JPEG 图像路径
  #[arg(long, value_name = "IMAGE")]
  pub image: String,

  /// 输出目标
  /// 支持:
  /// - stdout:                 每行 `min_x min_y max_x max_y class_id confidence`
  /// - stdout:?format=json     每行一个 JSON 对象
  /// - file:///path.txt        写入文本文件
  /// - folder:///dir           保存切片与检测记录
  /// - image:///path.png       保存标注后的整图
  #[arg(long, default_value = "stdout:", value_name = "OUTPUT", verbatim_doc_comment)]
  pub output: Url,

  /// 模型目录中的计算图文件名
  #[arg(long, default_value = DETECTOR_GRAPH_FILE, value_name = "FILE")]
  pub graph: String,

  /// 模型目录中的标签文件名（每行 `id:描述`）
  #[arg(long, default_value = DEFAULT_LABEL_FILE, value_name = "FILE")]
  pub labels: String,

  /// 切片宽度（模型输入宽度）
  #[arg(long, default_value_t = 300, value_name = "PIXELS")]
  pub chip_width: u32,

  /// 切片高度（模型输入高度）
  #[arg(long, default_value_t = 300, value_name = "PIXELS")]
  pub chip_height: u32,

  /// 并行推理的线程数
  #[arg(long, default_value_t = 1, value_name = "COUNT")]
  pub workers: usize,

  /// 置信度下限 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.0, value_name = "THRESHOLD")]
  pub min_confidence: f32,

  /// 跳过格式错误的标签行而不是报错退出
  #[arg(long)]
  pub skip_bad_labels: bool,

  /// 输入张量名
  #[arg(long, default_value = DETECTOR_INPUT, value_name = "NAME")]
  pub input_name: String,

  /// 检测框输出张量名
  #[arg(long, default_value = DETECTOR_BOXES, value_name = "NAME")]
  pub boxes_name: String,

  /// 置信度输出张量名
  #[arg(long, default_value = DETECTOR_SCORES, value_name = "NAME")]
  pub scores_name: String,

  /// 类别输出张量名
  #[arg(long, default_value = DETECTOR_CLASSES, value_name = "NAME")]
  pub classes_name: String,

  /// 有效检测数输出张量名，传空字符串表示模型没有该输出
  #[arg(long, default_value = DETECTOR_COUNT, value_name = "NAME")]
  pub count_name: String,

  /// 日志详细程度，可重复
  #[arg(short, long, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

impl DetectArgs {
  pub fn chip_size(&self) -> ChipSize {
    ChipSize::new(self.chip_width, self.chip_height)
  }

  /// 会话池与线程池同样大小
  pub fn model_config(&self) -> ModelConfig {
    ModelConfig {
      graph_file: self.graph.clone(),
      label_file: self.labels.clone(),
      input_name: self.input_name.clone(),
      sessions: self.workers.max(1),
      ..ModelConfig::detector(&self.dir, self.chip_size())
    }
  }

  pub fn detector_outputs(&self) -> DetectorOutputs {
    DetectorOutputs {
      boxes: self.boxes_name.clone(),
      scores: self.scores_name.clone(),
      classes: self.classes_name.clone(),
      count: Some(self.count_name.clone()).filter(|name| !name.is_empty()),
    }
  }

  pub fn label_policy(&self) -> LabelPolicy {
    if self.skip_bad_labels {
      LabelPolicy::Skip
    } else {
      LabelPolicy::Strict
    }
  }
}

/// 对单张图像分类，打印最可能的标签
#[derive(Parser, Debug)]
#[command(name = "qiepian-classify", author, version, about, long_about = None)]
pub struct ClassifyArgs {
  /// 包含模型与标签文件的目录
  #[arg(long, value_name = "DIR")]
  pub dir: PathBuf,

  /// 待分类的 JPEG 图像路径
  #[arg(long, value_name = "IMAGE")]
  pub image: String,

  /// 模型目录中的计算图文件名
  #[arg(long, default_value = CLASSIFIER_GRAPH_FILE, value_name = "FILE")]
  pub graph: String,

  /// 模型目录中的标签文件名（每行一个标签）
  #[arg(long, default_value = DEFAULT_LABEL_FILE, value_name = "FILE")]
  pub labels: String,

  /// 模型输入边长
  #[arg(long, default_value_t = CLASSIFIER_INPUT_SIZE, value_name = "PIXELS")]
  pub input_size: u32,

  /// 归一化均值
  #[arg(long, default_value_t = CLASSIFIER_MEAN)]
  pub mean: f32,

  /// 归一化缩放
  #[arg(long, default_value_t = CLASSIFIER_SCALE)]
  pub scale: f32,

  /// 输入张量名
  #[arg(long, default_value = CLASSIFIER_INPUT, value_name = "NAME")]
  pub input_name: String,

  /// 概率输出张量名
  #[arg(long, default_value = CLASSIFIER_OUTPUT, value_name = "NAME")]
  pub output_name: String,

  /// 日志详细程度，可重复
  #[arg(short, long, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

impl ClassifyArgs {
  pub fn model_config(&self) -> ModelConfig {
    ModelConfig {
      graph_file: self.graph.clone(),
      label_file: self.labels.clone(),
      input_name: self.input_name.clone(),
      preprocess: PreprocessConfig::classifier(self.input_size, self.mean, self.scale),
      ..ModelConfig::classifier(&self.dir)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::normalize_legacy_flags;
  use clap::error::ErrorKind;

  #[test]
  fn detect_requires_dir_and_image() {
    for args in [
      vec!["qiepian-detect", "--image", "a.jpg"],
      vec!["qiepian-detect", "--dir", "/models"],
    ] {
      let err = DetectArgs::try_parse_from(args).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
      assert_eq!(err.exit_code(), 2);
    }
  }

  #[test]
  fn classify_requires_dir_and_image() {
    for args in [
      vec!["qiepian-classify", "--image", "a.jpg"],
      vec!["qiepian-classify", "--dir", "/models"],
    ] {
      let err = ClassifyArgs::try_parse_from(args).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
      assert_eq!(err.exit_code(), 2);
    }
  }

  #[test]
  fn detect_defaults_build_detector_config() {
    let args = DetectArgs::try_parse_from(normalize_legacy_flags([
      "qiepian-detect",
      "-dir",
      "/models",
      "-image",
      "a.jpg",
    ]))
    .unwrap();
    assert_eq!(args.output.as_str(), "stdout:");
    assert_eq!(args.chip_size(), ChipSize::new(300, 300));
    assert_eq!(args.label_policy(), LabelPolicy::Strict);

    let config = args.model_config();
    assert_eq!(config.graph_path(), PathBuf::from("/models/multires.onnx"));
    assert_eq!(config.sessions, 1);
    assert_eq!(args.detector_outputs(), DetectorOutputs::default());
  }

  #[test]
  fn detect_overrides_reach_config() {
    let args = DetectArgs::try_parse_from([
      "qiepian-detect",
      "--dir=/models",
      "--image=a.jpg",
      "--workers=4",
      "--chip-width=320",
      "--count-name=",
      "--skip-bad-labels",
    ])
    .unwrap();
    let config = args.model_config();
    assert_eq!(config.sessions, 4);
    assert_eq!(config.preprocess.width, 320);
    assert_eq!(config.preprocess.height, 300);
    assert_eq!(args.detector_outputs().count, None);
    assert_eq!(args.label_policy(), LabelPolicy::Skip);
  }

  #[test]
  fn classify_preprocess_follows_flags() {
    let args = ClassifyArgs::try_parse_from([
      "qiepian-classify",
      "--dir",
      "/models",
      "--image",
      "a.jpg",
      "--input-size",
      "299",
      "--mean",
      "128",
    ])
    .unwrap();
    let config = args.model_config();
    assert_eq!(
      config.graph_path(),
      PathBuf::from("/models/tensorflow_inception_graph.onnx")
    );
    assert_eq!(config.preprocess, PreprocessConfig::classifier(299, 128.0, 1.0));
  }
}
