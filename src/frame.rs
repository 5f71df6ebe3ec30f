// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/frame.rs - NHWC 输入张量构造
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

use std::borrow::Cow;

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;

use crate::config::{PreprocessConfig, TensorDType};

const RGB_CHANNELS: usize = 3;

/// 批大小为 1 的 NHWC 输入张量
#[derive(Debug, Clone, PartialEq)]
pub enum InputTensor {
  U8(Array4<u8>),
  F32(Array4<f32>),
}

impl InputTensor {
  pub fn shape(&self) -> &[usize] {
    match self {
      InputTensor::U8(array) => array.shape(),
      InputTensor::F32(array) => array.shape(),
    }
  }
}

/// 将 RGB 图像转换为模型输入：缩放、类型转换、归一化、增加批维度
#[derive(Debug, Clone)]
pub struct Preprocessor {
  config: PreprocessConfig,
}

impl Preprocessor {
  pub fn new(config: PreprocessConfig) -> Self {
    Self { config }
  }

  fn resized<'a>(&self, image: &'a RgbImage) -> Cow<'a, RgbImage> {
    if image.dimensions() == (self.config.width, self.config.height) {
      Cow::Borrowed(image)
    } else {
      Cow::Owned(image::imageops::resize(
        image,
        self.config.width,
        self.config.height,
        FilterType::Triangle,
      ))
    }
  }

  pub fn preprocess(&self, image: &RgbImage) -> InputTensor {
    let image = self.resized(image);
    let (width, height) = (self.config.width as usize, self.config.height as usize);
    let shape = (1, height, width, RGB_CHANNELS);

    match self.config.dtype {
      TensorDType::U8 => {
        InputTensor::U8(Array4::from_shape_fn(shape, |(_, y, x, c)| {
          image.get_pixel(x as u32, y as u32)[c]
        }))
      }
      TensorDType::F32 => {
        let (mean, scale) = (self.config.mean, self.config.scale);
        InputTensor::F32(Array4::from_shape_fn(shape, |(_, y, x, c)| {
          (image.get_pixel(x as u32, y as u32)[c] as f32 - mean) / scale
        }))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chip::ChipSize;
  use image::Rgb;

  #[test]
  fn u8_tensor_keeps_raw_pixels_in_nhwc_order() {
    let image = RgbImage::from_fn(4, 2, |x, y| Rgb([x as u8, y as u8, 200]));
    let preprocessor = Preprocessor::new(PreprocessConfig::detector(ChipSize::new(4, 2)));
    let InputTensor::U8(tensor) = preprocessor.preprocess(&image) else {
      panic!("expected u8 tensor");
    };
    assert_eq!(tensor.shape(), &[1, 2, 4, 3]);
    assert_eq!(tensor[[0, 1, 3, 0]], 3);
    assert_eq!(tensor[[0, 1, 3, 1]], 1);
    assert_eq!(tensor[[0, 1, 3, 2]], 200);
  }

  #[test]
  fn f32_tensor_is_normalized() {
    let image = RgbImage::from_pixel(8, 8, Rgb([117, 127, 255]));
    let preprocessor = Preprocessor::new(PreprocessConfig::classifier(8, 117.0, 2.0));
    let InputTensor::F32(tensor) = preprocessor.preprocess(&image) else {
      panic!("expected f32 tensor");
    };
    assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    assert_eq!(tensor[[0, 5, 5, 1]], 5.0);
    assert_eq!(tensor[[0, 7, 7, 2]], 69.0);
  }

  #[test]
  fn mismatched_input_is_resized() {
    let image = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
    let preprocessor = Preprocessor::new(PreprocessConfig::classifier(224, 0.0, 1.0));
    let tensor = preprocessor.preprocess(&image);
    assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
  }
}
