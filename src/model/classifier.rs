// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/model/classifier.rs - 图像分类模型
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

use std::fmt;

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  config::ModelConfig,
  engine::{EngineError, OrtEngine},
  frame::Preprocessor,
  label::LabelList,
  model::Model,
};

#[derive(Error, Debug)]
pub enum ClassifyError {
  #[error("推理引擎错误: {0}")]
  Engine(#[from] EngineError),
  #[error("概率向量为空")]
  EmptyProbabilities,
  #[error("类别 {index} 没有对应的标签（共 {labels} 个标签）")]
  MissingLabel { index: usize, labels: usize },
}

pub struct Classifier {
  engine: OrtEngine,
  preprocessor: Preprocessor,
  output_name: String,
}

impl Classifier {
  pub fn new(config: &ModelConfig, output_name: impl Into<String>) -> Result<Self, ClassifyError> {
    let engine = OrtEngine::load(config.graph_path(), &config.input_name, config.sessions)?;
    Ok(Self {
      engine,
      preprocessor: Preprocessor::new(config.preprocess.clone()),
      output_name: output_name.into(),
    })
  }
}

impl Model for Classifier {
  type Input = RgbImage;
  type Output = Vec<f32>;
  type Error = ClassifyError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.preprocessor.preprocess(input);
    let mut outputs = self.engine.run(&tensor, &[self.output_name.as_str()])?;
    let probabilities = outputs
      .pop()
      .map(|t| t.data)
      .ok_or_else(|| EngineError::MissingOutput(self.output_name.clone()))?;
    debug!("类别数: {}", probabilities.len());
    Ok(probabilities)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch<'a> {
  pub index: usize,
  pub label: &'a str,
  pub probability: f32,
}

impl fmt::Display for BestMatch<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "BEST MATCH: ({:2.0}% likely) {}",
      self.probability * 100.0,
      self.label
    )
  }
}

/// 取概率最大的类别，并列时取靠前者，NaN 不参与比较
pub fn best_match<'a>(
  probabilities: &[f32],
  labels: &'a LabelList,
) -> Result<BestMatch<'a>, ClassifyError> {
  let (index, probability) = probabilities
    .iter()
    .copied()
    .enumerate()
    .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
      Some((_, b)) if !(p > b || (b.is_nan() && !p.is_nan())) => best,
      _ => Some((i, p)),
    })
    .ok_or(ClassifyError::EmptyProbabilities)?;

  let label = labels.get(index).ok_or(ClassifyError::MissingLabel {
    index,
    labels: labels.len(),
  })?;

  Ok(BestMatch {
    index,
    label,
    probability,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels() -> LabelList {
    ["cat", "dog", "bird"].into_iter().collect()
  }

  #[test]
  fn picks_highest_probability() {
    let labels = labels();
    let best = best_match(&[0.1, 0.7, 0.2], &labels).unwrap();
    assert_eq!(best.label, "dog");
    assert_eq!(best.probability, 0.7);
  }

  #[test]
  fn ties_go_to_first_occurrence() {
    let labels = labels();
    let best = best_match(&[0.2, 0.4, 0.4], &labels).unwrap();
    assert_eq!(best.index, 1);
  }

  #[test]
  fn nan_never_wins() {
    let labels = labels();
    let best = best_match(&[f32::NAN, 0.1, 0.05], &labels).unwrap();
    assert_eq!(best.index, 1);
  }

  #[test]
  fn empty_vector_is_an_error() {
    let labels = labels();
    assert!(matches!(
      best_match(&[], &labels),
      Err(ClassifyError::EmptyProbabilities)
    ));
  }

  #[test]
  fn index_without_label_is_an_error() {
    let labels = labels();
    assert!(matches!(
      best_match(&[0.1, 0.1, 0.1, 0.7], &labels),
      Err(ClassifyError::MissingLabel { index: 3, labels: 3 })
    ));
  }

  #[test]
  fn formats_best_match_line() {
    let best = BestMatch {
      index: 0,
      label: "golden retriever",
      probability: 0.873,
    };
    assert_eq!(best.to_string(), "BEST MATCH: (87% likely) golden retriever");

    let best = BestMatch {
      probability: 0.05,
      ..best
    };
    assert_eq!(best.to_string(), "BEST MATCH: ( 5% likely) golden retriever");
  }
}
