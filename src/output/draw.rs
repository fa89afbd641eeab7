// 该文件是 Chouqian （抽签） 项目的一部分。
// src/output/draw.rs - 候选对象可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{GrayImage, Luma, Rgb, RgbImage, imageops::FilterType};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut, text_size},
  point::Point as RasterPoint,
  rect::Rect,
};
use thiserror::Error;
use tracing::debug;

use crate::{
  geometry::Point,
  output::{Role, Scene},
  viewport::{Viewport, ViewportError},
};

// 文本渲染常量
const BADGE_TEXT: &str = "Selected Object!";
const BADGE_FONT_SIZE: f32 = 16.0;
const BADGE_PADDING: i32 = 4;
const BADGE_MARGIN: i32 = 4;

const PRIMARY_COLOR: [u8; 3] = [139, 92, 246]; // 紫色
const ACCENT_COLOR: [u8; 3] = [0, 185, 185]; // 青色
const BACKGROUND_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
  #[error("投影错误: {0}")]
  ViewportError(#[from] ViewportError),
}

/// 某一角色的填充色、填充不透明度与描边宽度
#[derive(Debug, Clone, Copy)]
struct Style {
  color: [u8; 3],
  fill_alpha: f32,
  stroke: u32,
}

impl Style {
  fn of(role: Role) -> Self {
    match role {
      Role::Normal => Style {
        color: PRIMARY_COLOR,
        fill_alpha: 0.2,
        stroke: 1,
      },
      Role::Highlighted => Style {
        color: PRIMARY_COLOR,
        fill_alpha: 0.3,
        stroke: 2,
      },
      Role::Selected => Style {
        color: ACCENT_COLOR,
        fill_alpha: 0.3,
        stroke: 2,
      },
    }
  }
}

#[derive(Default)]
pub struct Draw {
  font: Option<FontVec>,
}

impl Draw {
  /// 没有字体时不绘制选中标签
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontVec::try_from_vec(data)?;
    debug!("加载字体: {}", path.as_ref().display());
    Ok(Self { font: Some(font) })
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 把照片按比例放入容器大小的画布，再叠加所有候选
  pub fn draw_scene(&self, scene: &Scene<'_>) -> Result<RgbImage, DrawError> {
    let viewport = scene.viewport()?;
    let mut canvas = letterbox(scene, &viewport);

    for candidate in scene.candidates {
      let points = raster_points(&viewport.project_polygon(&candidate.polygon));
      if points.len() < 3 {
        debug!("{} 投影后不足 3 个点，跳过", candidate.id);
        continue;
      }
      let style = Style::of(scene.role(candidate.id));
      fill_translucent(&mut canvas, &points, style);
      outline(&mut canvas, &points, style);
    }

    if let (Some(font), Some(selected)) = (self.font.as_ref(), scene.selected()) {
      let anchor = viewport.project_point(selected.bbox.top_center());
      draw_badge(&mut canvas, font, anchor);
    }

    Ok(canvas)
  }
}

fn letterbox(scene: &Scene<'_>, viewport: &Viewport) -> RgbImage {
  let (cw, ch) = scene.canvas_size();
  let mut canvas = RgbImage::from_pixel(cw, ch, Rgb(BACKGROUND_COLOR));

  let width = (viewport.rendered_width.round() as u32).clamp(1, cw.max(1));
  let height = (viewport.rendered_height.round() as u32).clamp(1, ch.max(1));
  if (width, height) == scene.image.dimensions() {
    image::imageops::overlay(
      &mut canvas,
      scene.image,
      viewport.offset_x.round() as i64,
      viewport.offset_y.round() as i64,
    );
  } else {
    let resized = image::imageops::resize(scene.image, width, height, FilterType::Triangle);
    image::imageops::overlay(
      &mut canvas,
      &resized,
      viewport.offset_x.round() as i64,
      viewport.offset_y.round() as i64,
    );
  }
  canvas
}

/// 取整后折叠重复点，并去掉与首点重合的尾点
fn raster_points(points: &[Point<f64>]) -> Vec<RasterPoint<i32>> {
  let mut raster: Vec<RasterPoint<i32>> = points
    .iter()
    .map(|p| RasterPoint::new(p.x.round() as i32, p.y.round() as i32))
    .collect();
  raster.dedup();
  while raster.len() > 1 && raster.first() == raster.last() {
    raster.pop();
  }
  raster
}

fn fill_translucent(canvas: &mut RgbImage, points: &[RasterPoint<i32>], style: Style) {
  let mut coverage = GrayImage::new(canvas.width(), canvas.height());
  draw_polygon_mut(&mut coverage, points, Luma([255u8]));

  let alpha = style.fill_alpha;
  for (x, y, covered) in coverage.enumerate_pixels() {
    if covered[0] == 0 {
      continue;
    }
    let pixel = canvas.get_pixel_mut(x, y);
    for c in 0..3 {
      let blended = pixel[c] as f32 * (1.0 - alpha) + style.color[c] as f32 * alpha;
      pixel[c] = blended.round() as u8;
    }
  }
}

fn outline(canvas: &mut RgbImage, points: &[RasterPoint<i32>], style: Style) {
  let color = Rgb(style.color);
  let n = points.len();
  for i in 0..n {
    let a = points[i];
    let b = points[(i + 1) % n];
    for t in 0..style.stroke {
      // 加粗时向右下偏移一像素
      let d = t as f32;
      draw_line_segment_mut(
        canvas,
        (a.x as f32 + d, a.y as f32 + d),
        (b.x as f32 + d, b.y as f32 + d),
        color,
      );
    }
  }
}

/// 标签水平居中于锚点、底边位于锚点上方；超出画布时向内收
fn draw_badge(canvas: &mut RgbImage, font: &FontVec, anchor: Point<f64>) {
  let scale = PxScale::from(BADGE_FONT_SIZE);
  let (text_w, text_h) = text_size(scale, font, BADGE_TEXT);
  let badge_w = text_w as i32 + 2 * BADGE_PADDING;
  let badge_h = text_h as i32 + 2 * BADGE_PADDING;

  let max_x = (canvas.width() as i32 - badge_w).max(0);
  let max_y = (canvas.height() as i32 - badge_h).max(0);
  let x = (anchor.x.round() as i32 - badge_w / 2).clamp(0, max_x);
  let y = (anchor.y.round() as i32 - BADGE_MARGIN - badge_h).clamp(0, max_y);

  let rect = Rect::at(x, y).of_size(badge_w as u32, badge_h as u32);
  draw_filled_rect_mut(canvas, rect, Rgb(ACCENT_COLOR));
  draw_text_mut(
    canvas,
    Rgb([255u8, 255u8, 255u8]),
    x + BADGE_PADDING,
    y + BADGE_PADDING,
    scale,
    font,
    BADGE_TEXT,
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{candidate::CandidateId, output::tests::sample_candidates, shuffle::ShuffleState};

  #[test]
  fn raster_points_drop_closing_duplicate() {
    let points = [
      Point { x: 0.2, y: 0.0 },
      Point { x: 4.0, y: 0.0 },
      Point { x: 4.0, y: 0.4 },
      Point { x: 4.0, y: 4.0 },
      Point { x: 0.0, y: 0.1 },
    ];
    let raster = raster_points(&points);
    assert_eq!(
      raster,
      vec![RasterPoint::new(0, 0), RasterPoint::new(4, 0), RasterPoint::new(4, 4)]
    );
  }

  #[test]
  fn selected_candidate_is_tinted_inside_letterbox() {
    // 4x2 的照片放进 8x8 的容器：放大 2 倍，上下各留 2 像素
    let image = RgbImage::from_pixel(4, 2, Rgb([100, 100, 100]));
    let candidates = sample_candidates();
    let state = ShuffleState::Selected { id: CandidateId(0) };
    let scene = Scene::new(&image, &candidates, &state, (8, 8));

    let canvas = Draw::default().draw_scene(&scene).unwrap();
    assert_eq!(canvas.dimensions(), (8, 8));
    assert_eq!(canvas.get_pixel(1, 0), &Rgb(BACKGROUND_COLOR));
    assert_eq!(canvas.get_pixel(1, 7), &Rgb(BACKGROUND_COLOR));

    // 左侧对象被选中，右侧对象保持默认样式
    let selected = canvas.get_pixel(1, 3);
    assert!(selected[1] > 100 && selected[0] < 100);
    let normal = canvas.get_pixel(5, 3);
    assert!(normal[2] > 100 && normal[1] < 100);
  }

  #[test]
  fn missing_font_file_is_an_error() {
    assert!(matches!(
      Draw::with_font_file("/nonexistent/chouqian.ttf"),
      Err(DrawError::IoError(_))
    ));
  }
}
