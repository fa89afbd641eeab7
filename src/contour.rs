// 该文件是 Chouqian （抽签） 项目的一部分。
// src/contour.rs - 掩码轮廓追踪（Moore 邻域边界跟踪）
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

use tracing::{debug, warn};

use crate::{geometry::Point, mask::Mask};

/// 8 邻域方向，从"上"开始顺时针编号 0..7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
  Up = 0,
  UpRight = 1,
  Right = 2,
  DownRight = 3,
  Down = 4,
  DownLeft = 5,
  Left = 6,
  UpLeft = 7,
}

impl Direction {
  pub const ALL: [Direction; 8] = [
    Direction::Up,
    Direction::UpRight,
    Direction::Right,
    Direction::DownRight,
    Direction::Down,
    Direction::DownLeft,
    Direction::Left,
    Direction::UpLeft,
  ];

  pub fn index(self) -> usize {
    self as usize
  }

  pub fn from_index(index: usize) -> Self {
    Self::ALL[index % 8]
  }

  /// 图像坐标系下的 (dx, dy)，y 轴向下
  pub fn offset(self) -> (i32, i32) {
    match self {
      Direction::Up => (0, -1),
      Direction::UpRight => (1, -1),
      Direction::Right => (1, 0),
      Direction::DownRight => (1, 1),
      Direction::Down => (0, 1),
      Direction::DownLeft => (-1, 1),
      Direction::Left => (-1, 0),
      Direction::UpLeft => (-1, -1),
    }
  }

  /// 下一次邻域搜索的起点：到达方向 + 5（模 8）
  pub fn search_start(self) -> Self {
    Self::from_index(self.index() + 5)
  }
}

/// 边界跟踪的游标：当前像素与到达该像素时的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceState {
  pub position: Point<i32>,
  pub direction: Direction,
}

impl TraceState {
  /// 起点像素之上和左侧都是背景，按"从左侧向右到达"初始化
  pub fn start(position: Point<i32>) -> Self {
    Self {
      position,
      direction: Direction::Right,
    }
  }
}

/// 单步推进：从 search_start 开始顺时针扫描 8 个邻居，第一个前景邻居即下一个边界像素。
/// 没有前景邻居时返回 None。
pub fn step(mask: &Mask, state: TraceState) -> Option<TraceState> {
  let start = state.direction.search_start().index();
  (0..8)
    .map(|i| Direction::from_index(start + i))
    .find_map(|direction| {
      let (dx, dy) = direction.offset();
      let position = Point::new(state.position.x + dx, state.position.y + dy);
      mask
        .is_foreground(position.x, position.y)
        .then_some(TraceState {
          position,
          direction,
        })
    })
}

/// 追踪行优先扫描遇到的第一个前景区域的外边界。
///
/// 返回的点序列包含所有经过的像素（含重复经过的像素），回到起点时停止，起点不会重复追加。
/// 掩码没有前景时返回空序列；孤立像素只返回起点本身。
/// 孔洞和其它不连通区域都会被忽略。
pub fn trace(mask: &Mask) -> Vec<Point<i32>> {
  let Some(origin) = mask.first_foreground() else {
    return Vec::new();
  };

  let max_steps = 4 * mask.width() * mask.height() + 8;
  let mut state = TraceState::start(origin);
  let mut points = vec![origin];

  loop {
    let Some(next) = step(mask, state) else {
      debug!("像素 ({}, {}) 没有前景邻居，提前结束追踪", state.position.x, state.position.y);
      break;
    };

    if next.position == origin {
      break;
    }

    if points.len() >= max_steps {
      warn!("轮廓追踪超过步数上限 {}，提前结束", max_steps);
      break;
    }

    points.push(next.position);
    state = next;
  }

  points
}
