// 该文件是 Chouqian （抽签） 项目的一部分。
// src/task.rs - 任务：检测、抽取、输出
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::{Duration, Instant},
};

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  candidate::SegmentationResultBuilder,
  model::{Detection, Model},
  output::{Render, Scene},
  session::{DetectionSession, mask_frame},
  shuffle::{RunOutcome, ShuffleState},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 对每一帧：检测，抽取 `rounds` 次，输出每次的结果
pub struct PickTask {
  session: DetectionSession,
  rounds: usize,
  container: (u32, u32),
  render_ticks: bool,
  handle_interrupt: bool,
}

impl PickTask {
  pub fn new(session: DetectionSession, rounds: usize, container: (u32, u32)) -> Self {
    Self {
      session,
      rounds,
      container,
      render_ticks: false,
      handle_interrupt: false,
    }
  }

  /// 抽取过程中的每次跳动也输出一帧
  pub fn with_render_ticks(mut self, render_ticks: bool) -> Self {
    self.render_ticks = render_ticks;
    self
  }

  /// 安装 Ctrl-C 处理：重置抽取并结束任务
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }

  fn install_interrupt(&self) -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let stop = Arc::new(AtomicBool::new(false));
    if self.handle_interrupt {
      let selector = self.session.selector().clone();
      let flag = Arc::clone(&stop);
      ctrlc::set_handler(move || {
        info!("收到中断信号，重置抽取...");
        flag.store(true, Ordering::SeqCst);
        selector.reset();
      })?;
    }
    Ok(stop)
  }

  fn render<O, RE>(&self, output: &O, state: &ShuffleState) -> Result<(), RE>
  where
    O: Render<Error = RE>,
  {
    match self.session.image() {
      Some(image) => output.render(&Scene::new(
        image,
        self.session.candidates(),
        state,
        self.container,
      )),
      None => Ok(()),
    }
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = Detection, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for PickTask
{
  type Error = anyhow::Error;

  fn run_task(mut self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop = self.install_interrupt()?;

    'frames: for (frame_index, frame) in input.enumerate() {
      info!("处理第 {} 帧图像", frame_index + 1);
      let now = Instant::now();
      if let Err(e) = self.session.process(&model, frame) {
        warn!("第 {} 帧检测失败，跳过: {}", frame_index + 1, e);
        continue;
      }
      info!(
        "检测完成，{} 个候选，耗时: {:.2?}",
        self.session.candidates().len(),
        now.elapsed()
      );

      if self.session.candidates().is_empty() {
        warn!("没有可抽取的对象");
        self.render(&output, &ShuffleState::Idle)?;
        continue;
      }

      for round in 0..self.rounds {
        if stop.load(Ordering::SeqCst) {
          break 'frames;
        }
        let Some(handle) = self.session.shuffle() else {
          warn!("无法开始第 {} 次抽取", round + 1);
          break;
        };

        for state in handle.events() {
          if self.render_ticks {
            self.render(&output, &state)?;
          }
        }

        match handle.join() {
          RunOutcome::Completed(id) => {
            info!("第 {} 次抽取结果: {}", round + 1, id);
            if !self.render_ticks {
              self.render(&output, &self.session.state())?;
            }
          }
          RunOutcome::Cancelled => {
            warn!("抽取被取消，退出任务");
            break 'frames;
          }
        }
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

/// 对同一帧检测一次，重复构建候选 `repeat` 次并统计耗时
pub struct BenchmarkTask {
  builder: SegmentationResultBuilder,
  repeat: usize,
}

impl BenchmarkTask {
  pub fn new(builder: SegmentationResultBuilder, repeat: usize) -> Self {
    Self { builder, repeat }
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = Detection, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for BenchmarkTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始检测...");
    let now = Instant::now();
    let Detection { preview, masks } = model.infer(&frame)?;
    info!("检测完成，{} 个掩码，耗时: {:.2?}", masks.len(), now.elapsed());
    let image = mask_frame(frame, preview, &masks);

    let repeat = self.repeat.max(1);
    let mut times = Vec::with_capacity(repeat);
    let mut candidates = Vec::new();
    for i in 0..repeat {
      let now = Instant::now();
      candidates = self.builder.build(masks.iter().cloned());
      let elapsed = now.elapsed();
      info!("({})构建 {} 个候选，耗时: {:.2?}", i, candidates.len(), elapsed);
      times.push(elapsed);
    }

    // 前两次作为预热不计入平均
    let warm = if times.len() > 2 { &times[2..] } else { &times[..] };
    warn!(
      "平均构建时间: {:.2?}",
      warm.iter().sum::<Duration>() / warm.len() as u32
    );

    output.render(&Scene::new(&image, &candidates, &ShuffleState::Idle, image.dimensions()))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{
    candidate::RawMask,
    mask::mask_from_ascii,
    shuffle::{ShuffleConfig, ShuffleSelector},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("never")]
  struct Never;

  struct TwoObjects;

  impl Model for TwoObjects {
    type Input = RgbImage;
    type Output = Detection;
    type Error = Never;

    fn infer(&self, _input: &RgbImage) -> Result<Detection, Never> {
      Ok(Detection {
        preview: None,
        masks: vec![
          RawMask::from(mask_from_ascii(&["##..", "##.."])),
          RawMask::from(mask_from_ascii(&["..##", "..##"])),
        ],
      })
    }
  }

  #[derive(Default)]
  struct Collect {
    states: RefCell<Vec<ShuffleState>>,
    candidates: RefCell<usize>,
  }

  impl Render for &Collect {
    type Error = Never;

    fn render(&self, scene: &Scene<'_>) -> Result<(), Never> {
      self.states.borrow_mut().push(scene.state.clone());
      *self.candidates.borrow_mut() = scene.candidates.len();
      Ok(())
    }
  }

  fn session() -> DetectionSession {
    DetectionSession::new(
      SegmentationResultBuilder::default(),
      ShuffleSelector::new(ShuffleConfig {
        interval: Duration::from_millis(1),
        seed: Some(3),
        ..ShuffleConfig::default()
      }),
    )
  }

  #[test]
  fn pick_renders_each_final_selection() {
    let output = Collect::default();
    PickTask::new(session(), 3, (8, 8))
      .run_task(vec![RgbImage::new(4, 2)].into_iter(), TwoObjects, &output)
      .unwrap();

    let states = output.states.borrow();
    assert_eq!(states.len(), 3);
    assert!(states.iter().all(|s| s.selected().is_some()));
    assert_eq!(*output.candidates.borrow(), 2);
  }

  #[test]
  fn pick_with_ticks_ends_on_selection() {
    let output = Collect::default();
    PickTask::new(session(), 2, (8, 8))
      .with_render_ticks(true)
      .run_task(vec![RgbImage::new(4, 2)].into_iter(), TwoObjects, &output)
      .unwrap();

    let states = output.states.borrow();
    assert!(states.len() > 2);
    assert_eq!(states.iter().filter(|s| s.selected().is_some()).count(), 2);
    assert!(states.last().unwrap().selected().is_some());
    assert_eq!(states[0], ShuffleState::Shuffling { highlighted: None });
  }

  #[test]
  fn benchmark_renders_once() {
    let output = Collect::default();
    BenchmarkTask::new(SegmentationResultBuilder::default(), 3)
      .run_task(vec![RgbImage::new(4, 2)].into_iter(), TwoObjects, &output)
      .unwrap();

    assert_eq!(*output.states.borrow(), vec![ShuffleState::Idle]);
    assert_eq!(*output.candidates.borrow(), 2);
  }

  #[test]
  fn benchmark_without_input_fails() {
    let output = Collect::default();
    let result =
      BenchmarkTask::new(SegmentationResultBuilder::default(), 1).run_task(std::iter::empty(), TwoObjects, &output);
    assert!(result.is_err());
  }
}
