// 该文件是 Chouqian （抽签） 项目的一部分。
// src/mask.rs - 二值分割掩码
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

use thiserror::Error;

use crate::geometry::Point;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaskError {
  #[error("掩码数据长度不匹配: 期望 {expected}, 实际 {found}")]
  LengthMismatch { expected: usize, found: usize },
  #[error("掩码第 {row} 行宽度不一致: 期望 {expected}, 实际 {found}")]
  RaggedRow {
    row: usize,
    expected: usize,
    found: usize,
  },
}

/// 行优先存储的二值掩码，每个单元为 0 或 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl Mask {
  /// 非零值一律视为前景
  pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, MaskError> {
    if data.len() != width * height {
      return Err(MaskError::LengthMismatch {
        expected: width * height,
        found: data.len(),
      });
    }

    let data = data
      .into_iter()
      .map(|v| u8::from(v != 0))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    Ok(Self {
      width,
      height,
      data,
    })
  }

  /// 从检测服务返回的二维数组构建
  pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, MaskError> {
    let height = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);
    let mut data = Vec::with_capacity(width * height);

    for (row, cells) in rows.into_iter().enumerate() {
      if cells.len() != width {
        return Err(MaskError::RaggedRow {
          row,
          expected: width,
          found: cells.len(),
        });
      }
      data.extend(cells);
    }

    Self::new(width, height, data)
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  /// 越界坐标视为背景
  pub fn is_foreground(&self, x: i32, y: i32) -> bool {
    if x < 0 || y < 0 {
      return false;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= self.width || y >= self.height {
      return false;
    }
    self.data[y * self.width + x] == 1
  }

  /// 行优先扫描到的第一个前景像素
  pub fn first_foreground(&self) -> Option<Point<i32>> {
    let idx = self.data.iter().position(|&v| v == 1)?;
    Some(Point::new(
      (idx % self.width) as i32,
      (idx / self.width) as i32,
    ))
  }

  pub fn foreground_count(&self) -> usize {
    self.data.iter().filter(|&&v| v == 1).count()
  }
}

/// 测试用：'#' 为前景，其它字符为背景
#[cfg(test)]
pub(crate) fn mask_from_ascii(rows: &[&str]) -> Mask {
  let rows = rows
    .iter()
    .map(|row| row.bytes().map(|b| u8::from(b == b'#')).collect())
    .collect();
  Mask::from_rows(rows).unwrap()
}
