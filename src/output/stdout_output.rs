// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/output/stdout_output.rs - 标准输出
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

use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  chip::Chip,
  model::Detection,
  output::{LineFormat, OutputError, Render, check_scheme},
};

pub struct StdoutOutput {
  format: LineFormat,
}

impl FromUrlWithScheme for StdoutOutput {
  const SCHEME: &'static str = "stdout";
}

impl FromUrl for StdoutOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme::<Self>(url)?;
    Ok(StdoutOutput {
      format: LineFormat::from_url(url)?,
    })
  }
}

impl Render for StdoutOutput {
  type Error = OutputError;

  fn render_chip(&self, _chip: &Chip, detections: &[Detection]) -> Result<(), Self::Error> {
    let mut stdout = std::io::stdout().lock();
    for detection in detections {
      writeln!(stdout, "{}", self.format.format(detection))?;
    }
    stdout.flush()?;
    Ok(())
  }
}
