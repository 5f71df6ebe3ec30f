// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/label.rs - 标签文件解析
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelLineErrorKind {
  #[error("缺少 ':' 分隔符")]
  MissingSeparator,
  #[error("类别编号无效: {0:?}")]
  InvalidId(String),
}

/// 单行解析错误，`line` 从 1 开始
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("第 {line} 行 {content:?}: {kind}")]
pub struct LabelLineError {
  pub line: usize,
  pub content: String,
  pub kind: LabelLineErrorKind,
}

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("标签文件格式错误: {0}")]
  Malformed(#[from] LabelLineError),
}

/// 格式错误的标签行如何处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelPolicy {
  /// 第一条错误行即中止
  #[default]
  Strict,
  /// 记录警告并跳过错误行
  Skip,
}

fn read_to_string(path: &Path) -> Result<String, LabelError> {
  std::fs::read_to_string(path).map_err(|source| LabelError::Io {
    path: path.to_path_buf(),
    source,
  })
}

/// 解析 `id:description` 格式的一行
pub fn parse_label_line(line_no: usize, line: &str) -> Result<(i64, String), LabelLineError> {
  let error = |kind| LabelLineError {
    line: line_no,
    content: line.to_string(),
    kind,
  };

  let (id, description) = line
    .split_once(':')
    .ok_or_else(|| error(LabelLineErrorKind::MissingSeparator))?;
  let id = id
    .trim()
    .parse::<i64>()
    .map_err(|_| error(LabelLineErrorKind::InvalidId(id.to_string())))?;

  Ok((id, description.to_string()))
}

/// 检测模型的标签表：`类别编号 -> 描述`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  labels: HashMap<i64, String>,
}

impl LabelTable {
  /// 逐行解析，每行返回一个结果，由调用方决定跳过还是中止
  pub fn parse_lines(content: &str) -> impl Iterator<Item = Result<(i64, String), LabelLineError>> + '_ {
    content
      .lines()
      .enumerate()
      .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
      .filter(|(_, line)| !line.trim().is_empty())
      .map(|(line_no, line)| parse_label_line(line_no, line))
  }

  pub fn parse(content: &str, policy: LabelPolicy) -> Result<Self, LabelLineError> {
    let mut labels = HashMap::new();
    for entry in Self::parse_lines(content) {
      match (entry, policy) {
        (Ok((id, description)), _) => {
          labels.insert(id, description);
        }
        (Err(e), LabelPolicy::Skip) => warn!("跳过格式错误的标签行: {}", e),
        (Err(e), LabelPolicy::Strict) => return Err(e),
      }
    }
    Ok(Self { labels })
  }

  pub fn load(path: impl AsRef<Path>, policy: LabelPolicy) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let table = Self::parse(&read_to_string(path)?, policy)?;
    debug!("标签数量: {}", table.len());
    Ok(table)
  }

  pub fn get(&self, id: i64) -> Option<&str> {
    self.labels.get(&id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

/// 分类模型的标签列表：行号即类别编号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelList {
  labels: Vec<String>,
}

impl LabelList {
  pub fn parse(content: &str) -> Self {
    let labels = content
      .lines()
      .map(|line| line.trim_end_matches('\r').to_string())
      .collect();
    Self { labels }
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let list = Self::parse(&read_to_string(path)?);
    debug!("标签数量: {}", list.len());
    Ok(list)
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }
}

impl<S: Into<String>> FromIterator<S> for LabelList {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().map(Into::into).collect(),
    }
  }
}
