// 该文件是 Chouqian （抽签） 项目的一部分。
// src/simplify.rs - 轮廓简化
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

use crate::geometry::Point;

/// 共线容差，单位为掩码像素，不随显示尺寸缩放
pub const COLLINEAR_TOLERANCE: f64 = 0.5;

fn cross(p0: Point<i32>, p1: Point<i32>, p2: Point<i32>) -> f64 {
  let (ax, ay) = ((p1.x - p0.x) as f64, (p1.y - p0.y) as f64);
  let (bx, by) = ((p2.x - p1.x) as f64, (p2.y - p1.y) as f64);
  ax * by - ay * bx
}

/// 去掉没有明显方向变化的中间点，首尾点无条件保留。
///
/// 每个中间点按原始序列中的前后邻居判断，删点之后产生的相邻重复点会被折叠，
/// 所以结果长度不会超过输入。
pub fn simplify(points: &[Point<i32>]) -> Vec<Point<i32>> {
  if points.len() < 3 {
    return points.to_vec();
  }

  let mut kept = Vec::with_capacity(points.len());
  kept.push(points[0]);
  kept.extend(
    points
      .windows(3)
      .filter(|w| cross(w[0], w[1], w[2]).abs() > COLLINEAR_TOLERANCE)
      .map(|w| w[1]),
  );
  kept.push(points[points.len() - 1]);

  // 只在中间折叠，保证末尾点原样保留
  let last = kept.len() - 1;
  let mut out: Vec<Point<i32>> = Vec::with_capacity(kept.len());
  for (i, p) in kept.into_iter().enumerate() {
    if i != last && out.last() == Some(&p) {
      continue;
    }
    out.push(p);
  }
  out
}
