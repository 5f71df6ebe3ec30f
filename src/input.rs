// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/input.rs - 图像输入
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

use std::path::Path;

use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

mod read_image_file;

pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 接受普通路径或 `image:///path`、`file:///path` 形式的 URL。
///
/// 已存在的文件总按路径打开；其它 scheme（如 `scene:01.png`）也按相对路径处理。
pub fn open_image(source: &str) -> Result<ImageFileInput, ImageFileInputError> {
  let path = Path::new(source);
  if !path.exists()
    && let Ok(url) = Url::parse(source)
  {
    if url.scheme() == ImageFileInput::SCHEME {
      return ImageFileInput::from_url(&url);
    }
    if url.scheme() == "file"
      && let Ok(path) = url.to_file_path()
    {
      return ImageFileInput::open(path);
    }
  }
  ImageFileInput::open(path)
}
