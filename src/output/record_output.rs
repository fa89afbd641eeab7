// 该文件是 Chouqian （抽签） 项目的一部分。
// src/output/record_output.rs - 按日期目录记录抽取结果
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

use std::{
  path::PathBuf,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  candidate::Candidate,
  output::{Render, Scene},
  shuffle::ShuffleState,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Record<'a> {
  timestamp: String,
  image: (u32, u32),
  container: (u32, u32),
  state: &'a ShuffleState,
  selected: Option<&'a Candidate>,
  candidates: &'a [Candidate],
}

/// `record:///var/lib/chouqian` 在其下的 `YYYY/MM/DD/` 中写入 JSON 记录。
/// 默认跳过没有候选的画面，`?always` 时也记录。
pub struct RecordOutput {
  directory: PathBuf,
  counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(RecordOutput {
      directory: PathBuf::from(url_file_path(uri)),
      counter: Mutex::new(0),
      always,
    })
  }
}

impl RecordOutput {
  fn record_id(&self) -> u16 {
    let mut counter = self.counter.lock().unwrap_or_else(PoisonError::into_inner);
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn record_path(&self, now: &DateTime<Utc>) -> Result<PathBuf, RecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.json",
      now.format("%H-%M-%S"),
      self.record_id()
    )))
  }

  /// 写入一条记录，返回文件路径；被跳过时返回 None
  pub fn write_record(&self, scene: &Scene<'_>) -> Result<Option<PathBuf>, RecordOutputError> {
    if !self.always && scene.candidates.is_empty() {
      debug!("没有候选对象，跳过记录");
      return Ok(None);
    }

    let now = Utc::now();
    let record = Record {
      timestamp: now.to_rfc3339(),
      image: scene.image.dimensions(),
      container: scene.canvas_size(),
      state: scene.state,
      selected: scene.selected(),
      candidates: scene.candidates,
    };

    let path = self.record_path(&now)?;
    std::fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
    info!("写入记录: {}", path.display());
    Ok(Some(path))
  }
}

impl Render for RecordOutput {
  type Error = RecordOutputError;

  fn render(&self, scene: &Scene<'_>) -> Result<(), Self::Error> {
    self.write_record(scene).map(|_| ())
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;
  use url::Url;

  use super::*;
  use crate::{candidate::CandidateId, output::tests::sample_candidates};

  fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("chouqian-record-{}-{}", tag, std::process::id()))
  }

  #[test]
  fn writes_selection_into_dated_directory() {
    let dir = temp_dir("selected");
    let url = Url::parse(&format!("record://{}", dir.display())).unwrap();
    let output = RecordOutput::from_url(&url).unwrap();

    let image = RgbImage::new(4, 2);
    let candidates = sample_candidates();
    let state = ShuffleState::Selected { id: CandidateId(1) };
    let scene = Scene::new(&image, &candidates, &state, (8, 8));

    let path = output.write_record(&scene).unwrap().unwrap();
    assert!(path.starts_with(&dir));
    assert_eq!(path.strip_prefix(&dir).unwrap().components().count(), 4);
    assert!(path.to_string_lossy().ends_with("-0001.json"));

    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(json["state"]["state"], "selected");
    assert_eq!(json["selected"]["id"], "object-1");
    assert_eq!(json["candidates"].as_array().unwrap().len(), 2);
    assert_eq!(json["container"], serde_json::json!([8, 8]));

    let second = output.write_record(&scene).unwrap().unwrap();
    assert!(second.to_string_lossy().ends_with("-0002.json"));

    std::fs::remove_dir_all(dir).unwrap();
  }

  #[test]
  fn empty_scene_is_skipped_unless_always() {
    let image = RgbImage::new(4, 2);
    let scene = Scene::new(&image, &[], &ShuffleState::Idle, (8, 8));

    let dir = temp_dir("skip");
    let url = Url::parse(&format!("record://{}", dir.display())).unwrap();
    assert!(RecordOutput::from_url(&url).unwrap().write_record(&scene).unwrap().is_none());
    assert!(!dir.exists());

    let url = Url::parse(&format!("record://{}?always", dir.display())).unwrap();
    assert!(RecordOutput::from_url(&url).unwrap().write_record(&scene).unwrap().is_some());
    std::fs::remove_dir_all(dir).unwrap();
  }
}
