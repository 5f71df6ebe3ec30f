// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/utils.rs - 命令行工具函数
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

use std::ffi::OsString;

use tracing::Level;

/// 单横线写法的长参数，如 `-dir`、`-image`
const LEGACY_FLAGS: [&str; 2] = ["dir", "image"];

/// 把 `-dir x` / `-image=x` 改写为 clap 可识别的 `--dir x` / `--image=x`
pub fn normalize_legacy_flags<I, T>(args: I) -> Vec<OsString>
where
  I: IntoIterator<Item = T>,
  T: Into<OsString>,
{
  args
    .into_iter()
    .map(Into::into)
    .map(|arg| {
      let Some(s) = arg.to_str() else {
        return arg;
      };
      let Some(rest) = s.strip_prefix('-').filter(|r| !r.starts_with('-')) else {
        return arg;
      };
      let name = rest.split_once('=').map_or(rest, |(name, _)| name);
      if LEGACY_FLAGS.contains(&name) {
        OsString::from(format!("-{}", s))
      } else {
        arg
      }
    })
    .collect()
}

/// `-v` 的次数映射到日志级别，默认只输出警告
pub fn verbosity_level(verbose: u8) -> Level {
  match verbose {
    0 => Level::WARN,
    1 => Level::INFO,
    2 => Level::DEBUG,
    _ => Level::TRACE,
  }
}

/// 日志写到标准错误，标准输出只留给结果
pub fn init_tracing(verbose: u8) {
  tracing_subscriber::fmt()
    .with_max_level(verbosity_level(verbose))
    .with_writer(std::io::stderr)
    .init();
}
