// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/bin/classify.rs - 单图分类
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
  args::ClassifyArgs,
  input::open_image,
  label::LabelList,
  model::Classifier,
  task::{ClassifyTask, Task},
  utils::{init_tracing, normalize_legacy_flags},
};
use tracing::info;

fn main() -> Result<()> {
  let args = ClassifyArgs::parse_from(normalize_legacy_flags(std::env::args_os()));
  init_tracing(args.verbose);

  info!("模型目录: {}", args.dir.display());
  info!("输入图像: {}", args.image);

  let config = args.model_config();
  let labels = LabelList::load(config.label_path())?;
  info!("加载 {} 个标签", labels.len());
  let input = open_image(&args.image)?;
  let model = Classifier::new(&config, args.output_name.as_str())?;

  let summary = ClassifyTask::new(labels).run_task(input, model, std::io::stdout())?;
  info!(
    "分类完成: #{} {} ({:.4})",
    summary.index, summary.label, summary.probability
  );

  Ok(())
}
