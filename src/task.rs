// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/task.rs - 推理任务
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

use std::io::Write;
use std::time::Instant;

use anyhow::Context;
use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
  chip::{Chip, ChipSize, remap_box, tile},
  label::{LabelList, LabelTable},
  model::{DetectResult, Detection, Model, best_match},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectSummary {
  pub chips: usize,
  pub detections: usize,
}

/// 切片检测：切分整图，逐片推理，映射坐标，按行优先顺序输出
#[derive(Debug, Clone, Default)]
pub struct TiledDetectTask {
  size: ChipSize,
  workers: usize,
  labels: LabelTable,
}

impl TiledDetectTask {
  pub fn new(size: ChipSize) -> Self {
    Self {
      size,
      workers: 1,
      labels: LabelTable::default(),
    }
  }

  /// 大于 1 时切片在独立的线程池中并行推理，输出顺序不变
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  pub fn with_labels(mut self, labels: LabelTable) -> Self {
    self.labels = labels;
    self
  }

  fn detect_chip<M>(&self, model: &M, chip: &Chip) -> Result<Vec<Detection>, M::Error>
  where
    M: Model<Input = RgbImage, Output = DetectResult>,
  {
    let now = Instant::now();
    let result = model.infer(&chip.image)?;
    debug!(
      "切片 ({}, {}) 推理完成，耗时: {:.2?}，候选 {} 个",
      chip.index.x,
      chip.index.y,
      now.elapsed(),
      result.len()
    );

    Ok(
      result
        .items
        .iter()
        .map(|item| Detection {
          bounds: remap_box(chip.index, self.size, &item.bbox),
          class_id: item.class_id,
          chip: chip.index,
          description: self.labels.get(item.class_id).unwrap_or_default().to_string(),
          confidence: item.score,
        })
        .collect(),
    )
  }
}

impl<I, M, O, ME, RE> Task<I, M, O> for TiledDetectTask
where
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = DetectResult, Error = ME> + Sync,
  O: Render<Error = RE>,
  ME: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Output = DetectSummary;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始切片检测任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    let chips = tile(&image, self.size)?;
    info!(
      "图像 {}x{} 切分为 {} 个 {}x{} 切片",
      image.width(),
      image.height(),
      chips.len(),
      self.size.width,
      self.size.height
    );

    let now = Instant::now();
    let mut detections = Vec::new();
    if self.workers <= 1 {
      for chip in &chips {
        let found = self.detect_chip(&model, chip)?;
        output.render_chip(chip, &found)?;
        detections.extend(found);
      }
    } else {
      let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(self.workers)
        .build()
        .context("无法创建推理线程池")?;
      info!("使用 {} 个线程并行推理", self.workers);
      // 出错切片之前的结果照常输出，与顺序执行一致
      let results: Vec<Result<Vec<Detection>, ME>> = pool.install(|| {
        chips
          .par_iter()
          .map(|chip| self.detect_chip(&model, chip))
          .collect()
      });
      for (chip, found) in chips.iter().zip(results) {
        let found = found?;
        output.render_chip(chip, &found)?;
        detections.extend(found);
      }
    }
    info!(
      "推理完成，耗时: {:.2?}，共检测到 {} 个目标",
      now.elapsed(),
      detections.len()
    );

    output.finish(&image, &detections)?;

    Ok(DetectSummary {
      chips: chips.len(),
      detections: detections.len(),
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifySummary {
  pub index: usize,
  pub label: String,
  pub probability: f32,
}

/// 单张图像分类，向 `output` 写出一行 `BEST MATCH`
#[derive(Debug, Clone, Default)]
pub struct ClassifyTask {
  labels: LabelList,
}

impl ClassifyTask {
  pub fn new(labels: LabelList) -> Self {
    Self { labels }
  }
}

impl<I, M, O, ME> Task<I, M, O> for ClassifyTask
where
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = Vec<f32>, Error = ME>,
  O: Write,
  ME: std::error::Error + Send + Sync + 'static,
{
  type Output = ClassifySummary;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, mut output: O) -> Result<Self::Output, Self::Error> {
    info!("开始分类任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;

    let now = Instant::now();
    let probabilities = model.infer(&image)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let best = best_match(&probabilities, &self.labels)?;
    writeln!(output, "{}", best)?;
    output.flush()?;

    Ok(ClassifySummary {
      index: best.index,
      label: best.label.to_string(),
      probability: best.probability,
    })
  }
}
