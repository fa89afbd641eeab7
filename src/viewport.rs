// 该文件是 Chouqian （抽签） 项目的一部分。
// src/viewport.rs - 保持宽高比的居中投影（letterbox）
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

use crate::geometry::{Point, Polygon};

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ViewportError {
  #[error("图像原始尺寸无效: {width}x{height}")]
  InvalidNaturalSize { width: f64, height: f64 },
  #[error("容器尺寸无效: {width}x{height}")]
  InvalidContainerSize { width: f64, height: f64 },
}

/// 投影输入：图像原始尺寸与显示容器尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportParams {
  pub natural_width: f64,
  pub natural_height: f64,
  pub container_width: f64,
  pub container_height: f64,
}

/// 原始像素空间到容器像素空间的映射
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
  pub scale_x: f64,
  pub scale_y: f64,
  pub offset_x: f64,
  pub offset_y: f64,
  pub rendered_width: f64,
  pub rendered_height: f64,
}

impl ViewportParams {
  pub fn new(
    natural_width: f64,
    natural_height: f64,
    container_width: f64,
    container_height: f64,
  ) -> Self {
    Self {
      natural_width,
      natural_height,
      container_width,
      container_height,
    }
  }

  /// 每次调用都重新计算，尺寸变化时无需失效任何缓存
  pub fn viewport(&self) -> Result<Viewport, ViewportError> {
    let (nw, nh) = (self.natural_width, self.natural_height);
    let (cw, ch) = (self.container_width, self.container_height);

    if !(nw.is_finite() && nh.is_finite() && nw > 0.0 && nh > 0.0) {
      return Err(ViewportError::InvalidNaturalSize {
        width: nw,
        height: nh,
      });
    }
    if !(cw.is_finite() && ch.is_finite() && cw >= 0.0 && ch >= 0.0) {
      return Err(ViewportError::InvalidContainerSize {
        width: cw,
        height: ch,
      });
    }

    let image_ratio = nw / nh;
    let container_ratio = cw / ch;

    let (rendered_width, rendered_height) = if image_ratio > container_ratio {
      // 图像更宽，上下留边
      (cw, cw / image_ratio)
    } else {
      // 图像更高，左右留边
      (ch * image_ratio, ch)
    };

    Ok(Viewport {
      scale_x: rendered_width / nw,
      scale_y: rendered_height / nh,
      offset_x: (cw - rendered_width) / 2.0,
      offset_y: (ch - rendered_height) / 2.0,
      rendered_width,
      rendered_height,
    })
  }
}

impl Viewport {
  pub fn project_point(&self, point: Point<f64>) -> Point<f64> {
    Point::new(
      point.x * self.scale_x + self.offset_x,
      point.y * self.scale_y + self.offset_y,
    )
  }

  pub fn project_polygon(&self, polygon: &Polygon) -> Vec<Point<f64>> {
    polygon
      .points()
      .iter()
      .map(|&p| self.project_point(p.into()))
      .collect()
  }
}

/// 把单个点从原始像素空间映射到容器空间
pub fn project(
  point: impl Into<Point<f64>>,
  params: &ViewportParams,
) -> Result<Point<f64>, ViewportError> {
  Ok(params.viewport()?.project_point(point.into()))
}
