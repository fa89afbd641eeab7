// 该文件是 Chouqian （抽签） 项目的一部分。
// src/shuffle.rs - 随机滚动抽取状态机
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
    Arc, Mutex, MutexGuard, PoisonError,
    mpsc::{self, Receiver, RecvTimeoutError, Sender},
  },
  thread::{self, JoinHandle},
  time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::candidate::CandidateId;

mod feedback;
pub use self::feedback::{Feedback, FeedbackError, LogFeedback, NoFeedback, Signal, TerminalBell};

pub const DEFAULT_TICKS: u32 = 15;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(150);
/// 最后几次跳动不发提示音
pub const DEFAULT_SILENT_TAIL: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleConfig {
  pub ticks: u32,
  pub interval: Duration,
  pub silent_tail: u32,
  /// 固定种子时每次抽取使用 `seed + 第几次抽取` 作为种子
  pub seed: Option<u64>,
}

impl Default for ShuffleConfig {
  fn default() -> Self {
    Self {
      ticks: DEFAULT_TICKS,
      interval: DEFAULT_INTERVAL,
      silent_tail: DEFAULT_SILENT_TAIL,
      seed: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShuffleState {
  #[default]
  Idle,
  /// 第一次跳动之前 highlighted 为 None
  Shuffling { highlighted: Option<CandidateId> },
  Selected { id: CandidateId },
}

impl ShuffleState {
  pub fn is_shuffling(&self) -> bool {
    matches!(self, ShuffleState::Shuffling { .. })
  }

  pub fn highlighted(&self) -> Option<CandidateId> {
    match self {
      ShuffleState::Shuffling { highlighted } => *highlighted,
      _ => None,
    }
  }

  pub fn selected(&self) -> Option<CandidateId> {
    match self {
      ShuffleState::Selected { id } => Some(*id),
      _ => None,
    }
  }
}

/// 一次抽取中的离散步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
  Tick {
    number: u32,
    highlighted: CandidateId,
    signal: bool,
  },
  Land {
    selected: CandidateId,
  },
}

impl Step {
  pub fn state(&self) -> ShuffleState {
    match *self {
      Step::Tick { highlighted, .. } => ShuffleState::Shuffling {
        highlighted: Some(highlighted),
      },
      Step::Land { selected } => ShuffleState::Selected { id: selected },
    }
  }
}

/// 不含定时的抽取过程：`ticks` 次跳动后落定一次。
/// 每次都在整个候选列表上独立均匀抽取（有放回），与面积、置信度无关。
pub struct ShuffleRun<R> {
  candidates: Arc<[CandidateId]>,
  rng: R,
  ticks: u32,
  silent_tail: u32,
  done: u32,
  landed: bool,
}

impl<R: Rng> ShuffleRun<R> {
  /// 候选列表为空时返回 None
  pub fn new(candidates: Arc<[CandidateId]>, config: &ShuffleConfig, rng: R) -> Option<Self> {
    if candidates.is_empty() {
      return None;
    }
    Some(Self {
      candidates,
      rng,
      ticks: config.ticks,
      silent_tail: config.silent_tail,
      done: 0,
      landed: false,
    })
  }

  fn draw(&mut self) -> CandidateId {
    let index = self.rng.gen_range(0..self.candidates.len());
    self.candidates[index]
  }
}

impl<R: Rng> Iterator for ShuffleRun<R> {
  type Item = Step;

  fn next(&mut self) -> Option<Self::Item> {
    if self.landed {
      return None;
    }

    if self.done < self.ticks {
      self.done += 1;
      let number = self.done;
      let signal = number > 1 && number + self.silent_tail <= self.ticks;
      let highlighted = self.draw();
      return Some(Step::Tick {
        number,
        highlighted,
        signal,
      });
    }

    // 最终结果是一次独立抽取，与最后一次跳动无关
    self.landed = true;
    Some(Step::Land {
      selected: self.draw(),
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
  Completed(CandidateId),
  Cancelled,
}

struct Session {
  candidates: Arc<[CandidateId]>,
  state: ShuffleState,
  /// 每次开始、重置、替换列表都会递增；过期的跳动据此丢弃
  generation: u64,
  runs: u64,
  cancel: Option<Sender<()>>,
}

impl Session {
  fn invalidate(&mut self) {
    self.generation = self.generation.wrapping_add(1);
    if let Some(cancel) = self.cancel.take() {
      let _ = cancel.send(());
    }
    self.state = ShuffleState::Idle;
  }
}

fn lock_session(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
  session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 候选列表与抽取状态的唯一持有者
#[derive(Clone)]
pub struct ShuffleSelector {
  session: Arc<Mutex<Session>>,
  config: ShuffleConfig,
  feedback: Arc<dyn Feedback>,
}

impl Default for ShuffleSelector {
  fn default() -> Self {
    Self::new(ShuffleConfig::default())
  }
}

impl ShuffleSelector {
  pub fn new(config: ShuffleConfig) -> Self {
    Self {
      session: Arc::new(Mutex::new(Session {
        candidates: Arc::from(Vec::<CandidateId>::new()),
        state: ShuffleState::Idle,
        generation: 0,
        runs: 0,
        cancel: None,
      })),
      config,
      feedback: Arc::new(NoFeedback),
    }
  }

  pub fn with_feedback(mut self, feedback: impl Feedback + 'static) -> Self {
    self.feedback = Arc::new(feedback);
    self
  }

  pub fn config(&self) -> &ShuffleConfig {
    &self.config
  }

  pub fn state(&self) -> ShuffleState {
    lock_session(&self.session).state.clone()
  }

  pub fn candidates(&self) -> Arc<[CandidateId]> {
    Arc::clone(&lock_session(&self.session).candidates)
  }

  /// 整体替换候选列表。进行中的抽取被放弃，状态回到 Idle。
  pub fn set_candidates<I>(&self, ids: I)
  where
    I: IntoIterator<Item = CandidateId>,
  {
    let candidates: Arc<[CandidateId]> = ids.into_iter().collect();
    let mut session = lock_session(&self.session);
    if session.state.is_shuffling() {
      info!("候选列表已替换，放弃进行中的抽取");
    }
    session.invalidate();
    session.candidates = candidates;
  }

  /// 回到 Idle；已经是 Idle 时什么也不做
  pub fn reset(&self) {
    let mut session = lock_session(&self.session);
    if session.state == ShuffleState::Idle {
      return;
    }
    debug!("重置抽取状态");
    session.invalidate();
  }

  /// 开始一次抽取。候选为空或已有抽取在进行时返回 None。
  pub fn start(&self) -> Option<ShuffleHandle> {
    let (run, generation, cancel) = {
      let mut session = lock_session(&self.session);
      if session.state.is_shuffling() {
        debug!("已有抽取在进行，忽略本次请求");
        return None;
      }

      let run_number = session.runs + 1;
      let rng = match self.config.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(run_number)),
        None => StdRng::from_entropy(),
      };
      let Some(run) = ShuffleRun::new(Arc::clone(&session.candidates), &self.config, rng) else {
        debug!("候选列表为空，忽略本次请求");
        return None;
      };
      session.runs = run_number;

      let (cancel_tx, cancel_rx) = mpsc::channel();
      session.generation = session.generation.wrapping_add(1);
      session.cancel = Some(cancel_tx);
      session.state = ShuffleState::Shuffling { highlighted: None };
      (run, session.generation, cancel_rx)
    };

    let (events_tx, events_rx) = mpsc::channel();
    let _ = events_tx.send(ShuffleState::Shuffling { highlighted: None });

    let worker = Worker {
      session: Arc::clone(&self.session),
      feedback: Arc::clone(&self.feedback),
      interval: self.config.interval,
      generation,
      cancel,
      events: events_tx,
    };

    match thread::Builder::new()
      .name("shuffle".to_string())
      .spawn(move || worker.drive(run))
    {
      Ok(worker) => Some(ShuffleHandle {
        events: events_rx,
        worker,
      }),
      Err(e) => {
        error!("无法启动抽取线程: {}", e);
        let mut session = lock_session(&self.session);
        if session.generation == generation {
          session.invalidate();
        }
        None
      }
    }
  }
}

struct Worker {
  session: Arc<Mutex<Session>>,
  feedback: Arc<dyn Feedback>,
  interval: Duration,
  generation: u64,
  cancel: Receiver<()>,
  events: Sender<ShuffleState>,
}

impl Worker {
  fn drive<R: Rng>(self, run: ShuffleRun<R>) -> RunOutcome {
    for step in run {
      // 每次跳动前等待一个间隔，期间收到取消立即退出
      if let Step::Tick { .. } = step {
        match self.cancel.recv_timeout(self.interval) {
          Err(RecvTimeoutError::Timeout) => {}
          Ok(()) | Err(RecvTimeoutError::Disconnected) => {
            debug!("抽取已取消");
            return RunOutcome::Cancelled;
          }
        }
      }

      {
        // 持锁发送，替换或重置之后不会再送出旧的状态
        let mut session = lock_session(&self.session);
        if session.generation != self.generation {
          debug!("抽取已过期，丢弃步骤 {:?}", step);
          return RunOutcome::Cancelled;
        }
        session.state = step.state();
        if let Step::Land { .. } = step {
          session.cancel = None;
        }
        let _ = self.events.send(session.state.clone());
      }

      match step {
        Step::Tick {
          number,
          highlighted,
          signal,
        } => {
          debug!("第 {} 次跳动: {}", number, highlighted);
          if signal {
            self.emit(Signal::Tick);
          }
        }
        Step::Land { selected } => {
          info!("抽取结果: {}", selected);
          self.emit(Signal::Result);
          return RunOutcome::Completed(selected);
        }
      }
    }

    RunOutcome::Cancelled
  }

  fn emit(&self, signal: Signal) {
    if let Err(e) = self.feedback.signal(signal) {
      warn!("反馈信号 {:?} 发送失败: {}", signal, e);
    }
  }
}

/// 一次抽取的句柄：按顺序接收状态变化，结束后取得结果
pub struct ShuffleHandle {
  events: Receiver<ShuffleState>,
  worker: JoinHandle<RunOutcome>,
}

impl ShuffleHandle {
  /// 阻塞迭代状态变化，抽取结束或被取消时迭代结束
  pub fn events(&self) -> mpsc::Iter<'_, ShuffleState> {
    self.events.iter()
  }

  pub fn join(self) -> RunOutcome {
    drop(self.events);
    match self.worker.join() {
      Ok(outcome) => outcome,
      Err(_) => {
        error!("抽取线程异常退出");
        RunOutcome::Cancelled
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(n: usize) -> Vec<CandidateId> {
    (0..n).map(CandidateId).collect()
  }

  fn fast_config(seed: u64) -> ShuffleConfig {
    ShuffleConfig {
      interval: Duration::from_millis(1),
      seed: Some(seed),
      ..ShuffleConfig::default()
    }
  }

  struct Recorder(Arc<Mutex<Vec<Signal>>>);

  impl Feedback for Recorder {
    fn signal(&self, signal: Signal) -> Result<(), FeedbackError> {
      self.0.lock().unwrap().push(signal);
      Ok(())
    }
  }

  struct Broken;

  impl Feedback for Broken {
    fn signal(&self, _signal: Signal) -> Result<(), FeedbackError> {
      Err(std::io::Error::other("speaker unplugged").into())
    }
  }

  #[test]
  fn run_ticks_then_lands_once() {
    let config = ShuffleConfig::default();
    let run = ShuffleRun::new(ids(3).into(), &config, StdRng::seed_from_u64(7)).unwrap();
    let steps: Vec<Step> = run.collect();

    assert_eq!(steps.len(), 16);
    assert!(matches!(steps[15], Step::Land { .. }));
    let signalled: Vec<u32> = steps
      .iter()
      .filter_map(|s| match s {
        Step::Tick {
          number,
          signal: true,
          ..
        } => Some(*number),
        _ => None,
      })
      .collect();
    assert_eq!(signalled, (2..=13).collect::<Vec<_>>());
  }

  #[test]
  fn run_on_empty_list_is_none() {
    let run = ShuffleRun::new(ids(0).into(), &ShuffleConfig::default(), StdRng::seed_from_u64(1));
    assert!(run.is_none());
  }

  #[test]
  fn final_selection_is_uniform() {
    const RUNS: usize = 100_000;
    let config = ShuffleConfig::default();
    let candidates: Arc<[CandidateId]> = ids(4).into();
    let mut rng = StdRng::seed_from_u64(20260101);
    let mut counts = [0usize; 4];

    for _ in 0..RUNS {
      let run = ShuffleRun::new(Arc::clone(&candidates), &config, &mut rng).unwrap();
      if let Some(Step::Land { selected }) = run.last() {
        counts[selected.mask_index()] += 1;
      }
    }

    assert_eq!(counts.iter().sum::<usize>(), RUNS);
    for count in counts {
      let share = count as f64 / RUNS as f64;
      assert!((share - 0.25).abs() < 0.01, "share {} out of tolerance", share);
    }
  }

  #[test]
  fn selector_completes_with_listed_candidate() {
    let signals = Arc::new(Mutex::new(Vec::new()));
    let selector =
      ShuffleSelector::new(fast_config(3)).with_feedback(Recorder(Arc::clone(&signals)));
    selector.set_candidates(ids(4));

    let handle = selector.start().unwrap();
    let states: Vec<ShuffleState> = handle.events().collect();
    let outcome = handle.join();

    assert_eq!(states.len(), 17);
    assert_eq!(states[0], ShuffleState::Shuffling { highlighted: None });
    assert!(states[1..16].iter().all(|s| s.highlighted().is_some()));
    let RunOutcome::Completed(id) = outcome else {
      panic!("run was cancelled");
    };
    assert!(id.mask_index() < 4);
    assert_eq!(states[16], ShuffleState::Selected { id });
    assert_eq!(selector.state(), ShuffleState::Selected { id });

    let signals = signals.lock().unwrap();
    assert_eq!(signals.iter().filter(|s| **s == Signal::Tick).count(), 12);
    assert_eq!(signals.last(), Some(&Signal::Result));
  }

  #[test]
  fn empty_list_and_reentrant_start_are_noops() {
    let selector = ShuffleSelector::new(ShuffleConfig {
      interval: Duration::from_millis(50),
      ..ShuffleConfig::default()
    });
    assert!(selector.start().is_none());
    assert_eq!(selector.state(), ShuffleState::Idle);

    selector.set_candidates(ids(2));
    let handle = selector.start().unwrap();
    assert!(selector.start().is_none());
    assert!(selector.state().is_shuffling());

    selector.reset();
    assert_eq!(handle.join(), RunOutcome::Cancelled);
    assert_eq!(selector.state(), ShuffleState::Idle);
  }

  #[test]
  fn reset_from_idle_is_a_noop() {
    let selector = ShuffleSelector::default();
    selector.reset();
    assert_eq!(selector.state(), ShuffleState::Idle);
    selector.reset();
    assert_eq!(selector.state(), ShuffleState::Idle);
  }

  #[test]
  fn reset_after_selection_returns_to_idle_and_allows_restart() {
    let selector = ShuffleSelector::new(ShuffleConfig {
      interval: Duration::from_millis(40),
      seed: Some(11),
      ..ShuffleConfig::default()
    });
    selector.set_candidates(ids(3));
    let first = selector.start().unwrap().join();
    assert!(matches!(first, RunOutcome::Completed(_)));

    selector.reset();
    assert_eq!(selector.state(), ShuffleState::Idle);

    // Selected 状态下也可以直接重新开始
    let RunOutcome::Completed(previous) = selector.start().unwrap().join() else {
      panic!("run was cancelled");
    };
    assert_eq!(selector.state(), ShuffleState::Selected { id: previous });

    let handle = selector.start().unwrap();
    assert_eq!(selector.state(), ShuffleState::Shuffling { highlighted: None });
    assert!(selector.state().selected().is_none());
    selector.reset();
    assert_eq!(handle.join(), RunOutcome::Cancelled);
  }

  #[test]
  fn reset_mid_run_sends_no_selection() {
    let selector = ShuffleSelector::new(ShuffleConfig {
      interval: Duration::from_millis(30),
      seed: Some(9),
      ..ShuffleConfig::default()
    });
    selector.set_candidates(ids(3));

    let handle = selector.start().unwrap();
    let mut events = handle.events();
    assert_eq!(
      events.next(),
      Some(ShuffleState::Shuffling { highlighted: None })
    );
    selector.reset();

    let rest: Vec<ShuffleState> = events.collect();
    assert!(rest.iter().all(|s| s.selected().is_none()));
    assert_eq!(handle.join(), RunOutcome::Cancelled);
    assert_eq!(selector.state(), ShuffleState::Idle);
  }

  #[test]
  fn rejected_starts_keep_seeded_sequence() {
    let outcomes = |selector: &ShuffleSelector| -> Vec<RunOutcome> {
      (0..3).map(|_| selector.start().unwrap().join()).collect()
    };

    let fresh = ShuffleSelector::new(fast_config(21));
    fresh.set_candidates(ids(5));
    let expected = outcomes(&fresh);

    let rejected = ShuffleSelector::new(fast_config(21));
    assert!(rejected.start().is_none());
    assert!(rejected.start().is_none());
    rejected.set_candidates(ids(5));
    assert_eq!(outcomes(&rejected), expected);
  }

  #[test]
  fn replacing_candidates_cancels_without_stale_selection() {
    let selector = ShuffleSelector::new(ShuffleConfig {
      interval: Duration::from_millis(20),
      seed: Some(5),
      ..ShuffleConfig::default()
    });
    selector.set_candidates(ids(4));

    let handle = selector.start().unwrap();
    let mut events = handle.events();
    assert_eq!(
      events.next(),
      Some(ShuffleState::Shuffling { highlighted: None })
    );
    assert!(events.next().is_some_and(|s| s.highlighted().is_some()));

    let replacement = vec![CandidateId(10), CandidateId(11)];
    selector.set_candidates(replacement.clone());

    let rest: Vec<ShuffleState> = events.collect();
    assert!(rest.iter().all(|s| s.selected().is_none()));
    assert_eq!(handle.join(), RunOutcome::Cancelled);
    assert_eq!(selector.state(), ShuffleState::Idle);

    let RunOutcome::Completed(id) = selector.start().unwrap().join() else {
      panic!("run was cancelled");
    };
    assert!(replacement.contains(&id));
  }

  #[test]
  fn feedback_failures_do_not_affect_selection() {
    let selector = ShuffleSelector::new(fast_config(9)).with_feedback(Broken);
    selector.set_candidates(ids(2));
    let outcome = selector.start().unwrap().join();
    let RunOutcome::Completed(id) = outcome else {
      panic!("run was cancelled");
    };
    assert_eq!(selector.state(), ShuffleState::Selected { id });
  }

  #[test]
  fn state_serializes_with_tag() {
    let json = serde_json::to_string(&ShuffleState::Selected { id: CandidateId(2) }).unwrap();
    assert_eq!(json, r#"{"state":"selected","id":"object-2"}"#);
  }
}
