// 该文件是 Chouqian （抽签） 项目的一部分。
// src/geometry.rs - 点、多边形与包围盒
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

use serde::Serialize;

/// 像素坐标点。追踪阶段为整数，投影之后为浮点数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Point<T> {
  pub x: T,
  pub y: T,
}

impl<T> Point<T> {
  pub const fn new(x: T, y: T) -> Self {
    Self { x, y }
  }
}

impl From<Point<i32>> for Point<f64> {
  fn from(p: Point<i32>) -> Self {
    Point::new(p.x as f64, p.y as f64)
  }
}

/// 闭合多边形：至少 3 个点，相邻点不重复，首尾相邻但不重复存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Polygon {
  points: Vec<Point<i32>>,
}

/// 构成多边形所需的最少顶点数
pub const MIN_POLYGON_POINTS: usize = 3;

impl Polygon {
  /// 折叠相邻重复点后，不足 3 个点返回 None
  pub fn new(mut points: Vec<Point<i32>>) -> Option<Self> {
    points.dedup();
    if points.len() < MIN_POLYGON_POINTS {
      return None;
    }
    Some(Self { points })
  }

  pub fn points(&self) -> &[Point<i32>] {
    &self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn bbox(&self) -> BBox {
    BBox::enclosing(&self.points).unwrap_or_default()
  }

  pub fn into_points(self) -> Vec<Point<i32>> {
    self.points
  }
}

/// 轴对齐包围盒，单位为掩码像素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BBox {
  /// 计算点集的包围盒，空点集返回 None
  pub fn enclosing(points: &[Point<i32>]) -> Option<Self> {
    let first = points.first()?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);

    for p in &points[1..] {
      min_x = min_x.min(p.x);
      max_x = max_x.max(p.x);
      min_y = min_y.min(p.y);
      max_y = max_y.max(p.y);
    }

    Some(BBox {
      x: min_x,
      y: min_y,
      width: max_x - min_x,
      height: max_y - min_y,
    })
  }

  pub fn area(&self) -> u64 {
    self.width as u64 * self.height as u64
  }

  /// 上边中点，用于放置"选中"标签
  pub fn top_center(&self) -> Point<f64> {
    Point::new(self.x as f64 + self.width as f64 / 2.0, self.y as f64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn polygon_rejects_fewer_than_three_distinct_neighbours() {
    assert!(Polygon::new(vec![]).is_none());
    assert!(Polygon::new(vec![Point::new(0, 0), Point::new(1, 0)]).is_none());
    // 折叠重复点后只剩两个点
    assert!(
      Polygon::new(vec![
        Point::new(0, 0),
        Point::new(0, 0),
        Point::new(1, 1),
        Point::new(1, 1)
      ])
      .is_none()
    );
  }

  #[test]
  fn polygon_collapses_consecutive_duplicates() {
    let polygon = Polygon::new(vec![
      Point::new(0, 0),
      Point::new(4, 0),
      Point::new(4, 0),
      Point::new(4, 3),
    ])
    .unwrap();
    assert_eq!(
      polygon.points(),
      &[Point::new(0, 0), Point::new(4, 0), Point::new(4, 3)]
    );
  }

  #[test]
  fn bbox_and_area_of_triangle() {
    let polygon = Polygon::new(vec![Point::new(2, 5), Point::new(10, 1), Point::new(6, 9)]).unwrap();
    let bbox = polygon.bbox();
    assert_eq!(
      bbox,
      BBox {
        x: 2,
        y: 1,
        width: 8,
        height: 8
      }
    );
    assert_eq!(bbox.area(), 64);
    assert_eq!(bbox.top_center(), Point::new(6.0, 1.0));
  }

  #[test]
  fn bbox_of_empty_set_is_none() {
    assert!(BBox::enclosing(&[]).is_none());
  }
}
