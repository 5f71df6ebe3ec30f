// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/chip.rs - 图像切片与坐标映射
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

use image::{RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChipError {
  #[error("切片尺寸无效: {width}x{height}")]
  InvalidChipSize { width: u32, height: u32 },
  #[error("图像尺寸 {image_width}x{image_height} 小于切片尺寸 {chip_width}x{chip_height}")]
  ImageTooSmall {
    image_width: u32,
    image_height: u32,
    chip_width: u32,
    chip_height: u32,
  },
}

/// 切片像素尺寸，即检测模型的固定输入尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipSize {
  pub width: u32,
  pub height: u32,
}

impl ChipSize {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

impl Default for ChipSize {
  fn default() -> Self {
    Self::new(300, 300)
  }
}

/// 切片在网格中的列/行坐标（从 0 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipIndex {
  pub x: u32,
  pub y: u32,
}

/// 整图像素坐标下的矩形，不做裁剪，可以为负或越界
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub min_x: i64,
  pub min_y: i64,
  pub max_x: i64,
  pub max_y: i64,
}

/// 行优先的切片网格，多余的右侧/底部像素条被丢弃
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipGrid {
  columns: u32,
  rows: u32,
  size: ChipSize,
}

impl ChipGrid {
  pub fn new(image_width: u32, image_height: u32, size: ChipSize) -> Result<Self, ChipError> {
    if size.width == 0 || size.height == 0 {
      return Err(ChipError::InvalidChipSize {
        width: size.width,
        height: size.height,
      });
    }

    let columns = image_width / size.width;
    let rows = image_height / size.height;
    if columns == 0 || rows == 0 {
      return Err(ChipError::ImageTooSmall {
        image_width,
        image_height,
        chip_width: size.width,
        chip_height: size.height,
      });
    }

    Ok(Self {
      columns,
      rows,
      size,
    })
  }

  pub fn columns(&self) -> u32 {
    self.columns
  }

  pub fn rows(&self) -> u32 {
    self.rows
  }

  pub fn size(&self) -> ChipSize {
    self.size
  }

  pub fn len(&self) -> usize {
    self.columns as usize * self.rows as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 第 `i` 个切片（行优先）的网格坐标
  pub fn index(&self, i: usize) -> ChipIndex {
    let columns = self.columns as usize;
    ChipIndex {
      x: (i % columns) as u32,
      y: (i / columns) as u32,
    }
  }

  /// 切片在原图中的像素范围，左上闭、右下开
  pub fn rect(&self, index: ChipIndex) -> PixelRect {
    let w = self.size.width as i64;
    let h = self.size.height as i64;
    PixelRect {
      min_x: index.x as i64 * w,
      min_y: index.y as i64 * h,
      max_x: (index.x as i64 + 1) * w,
      max_y: (index.y as i64 + 1) * h,
    }
  }

  pub fn indices(&self) -> impl Iterator<Item = ChipIndex> + '_ {
    (0..self.len()).map(|i| self.index(i))
  }
}

/// 从原图裁剪出的固定尺寸切片
#[derive(Debug, Clone)]
pub struct Chip {
  pub index: ChipIndex,
  pub image: RgbImage,
}

/// 将图像切分为行优先排列的切片
pub fn tile(image: &RgbImage, size: ChipSize) -> Result<Vec<Chip>, ChipError> {
  let (width, height) = image.dimensions();
  let grid = ChipGrid::new(width, height, size)?;
  debug!(
    "图像 {}x{} 切分为 {}x{} 个切片，丢弃右侧 {} 像素、底部 {} 像素",
    width,
    height,
    grid.columns(),
    grid.rows(),
    width - grid.columns() * size.width,
    height - grid.rows() * size.height
  );

  let chips = grid
    .indices()
    .map(|index| {
      let chip = imageops::crop_imm(
        image,
        index.x * size.width,
        index.y * size.height,
        size.width,
        size.height,
      )
      .to_image();
      Chip { index, image: chip }
    })
    .collect();

  Ok(chips)
}

/// 将切片内归一化的检测框映射到整图像素坐标。
///
/// `bbox[0]`/`bbox[2]` 按切片宽度缩放为 x，`bbox[1]`/`bbox[3]` 按切片高度缩放为 y。
pub fn remap_box(chip: ChipIndex, size: ChipSize, bbox: &[f32; 4]) -> PixelRect {
  let w = size.width as i64;
  let h = size.height as i64;
  let offset_x = chip.x as i64 * w;
  let offset_y = chip.y as i64 * h;

  PixelRect {
    min_x: (bbox[0] * size.width as f32).round() as i64 + offset_x,
    min_y: (bbox[1] * size.height as f32).round() as i64 + offset_y,
    max_x: (bbox[2] * size.width as f32).round() as i64 + offset_x,
    max_y: (bbox[3] * size.height as f32).round() as i64 + offset_y,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  const CHIP: ChipSize = ChipSize::new(300, 300);

  #[test]
  fn grid_drops_remainder_strips() {
    let grid = ChipGrid::new(650, 620, CHIP).unwrap();
    assert_eq!(grid.columns(), 2);
    assert_eq!(grid.rows(), 2);
    let indices: Vec<_> = grid.indices().map(|i| (i.x, i.y)).collect();
    assert_eq!(indices, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
  }

  #[test]
  fn tile_produces_disjoint_chips_in_row_major_order() {
    let image = RgbImage::from_fn(650, 620, |x, y| Rgb([(x / 300) as u8, (y / 300) as u8, 0]));
    let chips = tile(&image, CHIP).unwrap();
    assert_eq!(chips.len(), 4);

    for chip in &chips {
      assert_eq!(chip.image.dimensions(), (300, 300));
      // 每个像素记录了它所属的网格列/行
      assert!(
        chip
          .image
          .pixels()
          .all(|p| p[0] as u32 == chip.index.x && p[1] as u32 == chip.index.y)
      );
    }

    let grid = ChipGrid::new(650, 620, CHIP).unwrap();
    for (a, b) in chips.iter().zip(chips.iter().skip(1)) {
      let (ra, rb) = (grid.rect(a.index), grid.rect(b.index));
      let overlap = ra.min_x < rb.max_x && rb.min_x < ra.max_x && ra.min_y < rb.max_y && rb.min_y < ra.max_y;
      assert!(!overlap);
    }
  }

  #[test]
  fn undersized_image_is_reported() {
    let image = RgbImage::new(299, 800);
    assert_eq!(
      tile(&image, CHIP).unwrap_err(),
      ChipError::ImageTooSmall {
        image_width: 299,
        image_height: 800,
        chip_width: 300,
        chip_height: 300,
      }
    );
  }

  #[test]
  fn zero_chip_size_is_rejected() {
    assert!(matches!(
      ChipGrid::new(600, 600, ChipSize::new(0, 300)),
      Err(ChipError::InvalidChipSize { .. })
    ));
  }

  #[test]
  fn full_box_maps_to_chip_rect() {
    let chip = ChipIndex { x: 1, y: 2 };
    let rect = remap_box(chip, CHIP, &[0.0, 0.0, 1.0, 1.0]);
    assert_eq!(
      rect,
      PixelRect {
        min_x: 300,
        min_y: 600,
        max_x: 600,
        max_y: 900,
      }
    );
  }

  #[test]
  fn remap_shifts_by_one_chip_per_grid_step() {
    let size = ChipSize::new(320, 240);
    let bbox = [0.125, 0.4, 0.6, 0.9];
    let base = remap_box(ChipIndex { x: 2, y: 3 }, size, &bbox);
    let right = remap_box(ChipIndex { x: 3, y: 3 }, size, &bbox);
    let down = remap_box(ChipIndex { x: 2, y: 4 }, size, &bbox);

    assert_eq!(right.min_x - base.min_x, 320);
    assert_eq!(right.max_x - base.max_x, 320);
    assert_eq!((right.min_y, right.max_y), (base.min_y, base.max_y));
    assert_eq!(down.min_y - base.min_y, 240);
    assert_eq!(down.max_y - base.max_y, 240);
    assert_eq!((down.min_x, down.max_x), (base.min_x, base.max_x));
  }

  #[test]
  fn remap_rounds_and_does_not_clamp() {
    let rect = remap_box(ChipIndex { x: 0, y: 0 }, CHIP, &[-0.1, 0.5017, 1.2, 0.0049]);
    assert_eq!(rect.min_x, -30);
    assert_eq!(rect.min_y, 151);
    assert_eq!(rect.max_x, 360);
    assert_eq!(rect.max_y, 1);
  }

  #[test]
  fn remap_is_idempotent() {
    let chip = ChipIndex { x: 4, y: 1 };
    let bbox = [0.33, 0.66, 0.5, 0.75];
    assert_eq!(remap_box(chip, CHIP, &bbox), remap_box(chip, CHIP, &bbox));
  }
}
