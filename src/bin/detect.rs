// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/bin/detect.rs - 切片目标检测
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

use anyhow::Result;
use clap::Parser;

use qiepian::{
  FromUrl,
  args::DetectArgs,
  input::open_image,
  label::LabelTable,
  model::Detector,
  output::OutputWrapper,
  task::{Task, TiledDetectTask},
  utils::{init_tracing, normalize_legacy_flags},
};
use tracing::info;

fn main() -> Result<()> {
  let args = DetectArgs::parse_from(normalize_legacy_flags(std::env::args_os()));
  init_tracing(args.verbose);

  info!("模型目录: {}", args.dir.display());
  info!("输入图像: {}", args.image);
  info!("输出目标: {}", args.output);

  let config = args.model_config();
  let labels = LabelTable::load(config.label_path(), args.label_policy())?;
  let input = open_image(&args.image)?;
  let model =
    Detector::new(&config, args.detector_outputs())?.with_min_confidence(args.min_confidence);
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = TiledDetectTask::new(args.chip_size())
    .with_workers(args.workers)
    .with_labels(labels)
    .run_task(input, model, output)?;
  info!(
    "处理完成: {} 个切片，{} 个检测结果",
    summary.chips, summary.detections
  );

  Ok(())
}
