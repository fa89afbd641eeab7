// 该文件是 Chouqian （抽签） 项目的一部分。
// src/output/svg_output.rs - SVG 叠加层输出
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

use std::{fmt::Write as _, io::Cursor, path::Path};

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, Scene},
  url_file_path,
  viewport::ViewportError,
};

const STYLE: &str = "\
.candidate { fill: rgb(139 92 246 / 0.2); stroke: rgb(139 92 246 / 0.8); stroke-width: 1; }
.candidate.highlighted { fill: rgb(139 92 246 / 0.3); stroke: rgb(139 92 246); stroke-width: 2; }
.candidate.selected { fill: rgb(0 185 185 / 0.3); stroke: rgb(0 185 185); stroke-width: 2; }
.badge { fill: rgb(0 185 185); }
.badge-text { fill: white; font: 12px sans-serif; }
";

#[derive(Error, Debug)]
pub enum SvgOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("投影错误: {0}")]
  ViewportError(#[from] ViewportError),
  #[error("格式化错误: {0}")]
  FormatError(#[from] std::fmt::Error),
}

/// 生成与容器同尺寸的 SVG：照片按比例嵌入，每个候选一个 `<polygon>`。
///
/// `svg:///tmp/pick.svg` 嵌入照片；加 `?photo=false` 只输出多边形叠加层。
pub struct SvgOutput {
  path: String,
  embed_photo: bool,
}

impl FromUrlWithScheme for SvgOutput {
  const SCHEME: &'static str = "svg";
}

impl FromUrl for SvgOutput {
  type Error = SvgOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SvgOutputError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let embed_photo = !uri
      .query_pairs()
      .any(|(k, v)| k == "photo" && (v == "false" || v == "0"));

    Ok(SvgOutput {
      path: url_file_path(uri),
      embed_photo,
    })
  }
}

fn png_data_uri(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(format!("data:image/png;base64,{}", STANDARD.encode(buffer.into_inner())))
}

impl SvgOutput {
  pub fn document(&self, scene: &Scene<'_>) -> Result<String, SvgOutputError> {
    let viewport = scene.viewport()?;
    let (cw, ch) = scene.canvas_size();

    let mut svg = String::new();
    writeln!(svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
      svg,
      r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{cw}" height="{ch}" viewBox="0 0 {cw} {ch}">"#
    )?;
    writeln!(svg, "  <style>\n{}  </style>", STYLE)?;

    if self.embed_photo {
      writeln!(
        svg,
        r#"  <image x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" preserveAspectRatio="none" href="{}" />"#,
        viewport.offset_x,
        viewport.offset_y,
        viewport.rendered_width,
        viewport.rendered_height,
        png_data_uri(scene.image)?
      )?;
    }

    for candidate in scene.candidates {
      let points = viewport
        .project_polygon(&candidate.polygon)
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
      writeln!(
        svg,
        r#"  <polygon data-id="{}" data-confidence="{:.3}" class="{}" points="{}" />"#,
        candidate.id,
        candidate.confidence,
        scene.role(candidate.id).class(),
        points
      )?;
    }

    if let Some(selected) = scene.selected() {
      let anchor = viewport.project_point(selected.bbox.top_center());
      writeln!(
        svg,
        r#"  <g transform="translate({:.2},{:.2})">"#,
        anchor.x, anchor.y
      )?;
      writeln!(
        svg,
        r#"    <rect class="badge" x="-56" y="-24" width="112" height="20" rx="4" />"#
      )?;
      writeln!(
        svg,
        r#"    <text class="badge-text" x="0" y="-10" text-anchor="middle">Selected Object!</text>"#
      )?;
      writeln!(svg, "  </g>")?;
    }

    writeln!(svg, "</svg>")?;
    Ok(svg)
  }
}

impl Render for SvgOutput {
  type Error = SvgOutputError;

  fn render(&self, scene: &Scene<'_>) -> Result<(), Self::Error> {
    let svg = self.document(scene)?;
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.path, svg)?;
    info!("保存 SVG 到文件: {}", self.path);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{candidate::CandidateId, output::tests::sample_candidates, shuffle::ShuffleState};

  fn output(query: &str) -> SvgOutput {
    SvgOutput::from_url(&Url::parse(&format!("svg:///tmp/pick.svg{}", query)).unwrap()).unwrap()
  }

  #[test]
  fn polygons_are_projected_into_container() {
    let image = RgbImage::new(4, 2);
    let candidates = sample_candidates();
    let state = ShuffleState::Shuffling {
      highlighted: Some(CandidateId(1)),
    };
    let scene = Scene::new(&image, &candidates, &state, (8, 8));

    let svg = output("?photo=false").document(&scene).unwrap();
    assert!(svg.contains(r#"viewBox="0 0 8 8""#));
    assert!(!svg.contains("<image"));
    assert!(svg.contains(r#"data-id="object-0""#));
    assert!(svg.contains(r#"class="candidate highlighted""#));
    assert!(svg.contains("0.00,2.00"));
    assert!(!svg.contains("Selected Object!"));
  }

  #[test]
  fn selection_gets_a_badge_and_photo_is_embedded() {
    let image = RgbImage::new(4, 2);
    let candidates = sample_candidates();
    let state = ShuffleState::Selected { id: CandidateId(0) };
    let scene = Scene::new(&image, &candidates, &state, (8, 8));

    let svg = output("").document(&scene).unwrap();
    assert!(svg.contains("data:image/png;base64,"));
    assert!(svg.contains(r#"class="candidate selected""#));
    assert!(svg.contains("Selected Object!"));
    // 包围盒顶边中点 (0.5, 0) 投影到 (1, 2)
    assert!(svg.contains(r#"translate(1.00,2.00)"#));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    assert!(matches!(
      SvgOutput::from_url(&Url::parse("image:///tmp/a.png").unwrap()),
      Err(SvgOutputError::SchemeMismatch(_))
    ));
  }
}
