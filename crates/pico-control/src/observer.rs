//! Observer - 控制器状态观察器
//!
//! 控制器由循环线程独占。其他线程（监控、界面、测试）读取控制器在每次状态变化后
//! 通过 `ArcSwap` 提交的快照，读取是 wait-free 的，不会阻塞控制循环。
//!
//! # 使用示例
//!
//! ```rust
//! use pico_control::{ControllerConfig, PositionHoldController};
//!
//! let mut controller = PositionHoldController::new(ControllerConfig::default()).unwrap();
//! let observer = controller.observer();
//!
//! // 克隆后可以交给另一个线程
//! let monitor = observer.clone();
//! std::thread::spawn(move || {
//!     println!("ticks: {}, armed: {}", monitor.ticks(), monitor.is_armed());
//! })
//! .join()
//! .unwrap();
//! ```

use crate::pid::PidGains;
use arc_swap::ArcSwap;
use pico_protocol::{AxisArray, PidError, PositionEstimate, RcCommand};
use std::sync::Arc;

/// 控制器状态快照
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlSnapshot {
    /// 最近一次发布的命令是否为解锁状态
    pub armed: bool,
    /// 已完成的 tick 次数
    pub ticks: u64,
    /// 控制器看到的最新位置估计
    pub position: PositionEstimate,
    /// 每轴物理增益
    pub gains: AxisArray<PidGains>,
    /// 每轴累积误差
    pub error_sum: AxisArray<f64>,
    /// 最近一次构建的命令
    pub last_command: RcCommand,
    /// 最近一次原始误差遥测
    pub last_error: PidError,
    /// 启动以来发布失败的次数
    pub publish_failures: u64,
}

/// 快照读取句柄
///
/// 克隆开销很小，所有克隆共享同一份状态。
#[derive(Debug, Clone)]
pub struct ControllerObserver {
    state: Arc<ArcSwap<ControlSnapshot>>,
}

impl ControllerObserver {
    pub(crate) fn new(initial: ControlSnapshot) -> Self {
        ControllerObserver {
            state: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// 最新提交的快照
    pub fn snapshot(&self) -> ControlSnapshot {
        self.state.load().as_ref().clone()
    }

    /// 已完成的 tick 次数
    pub fn ticks(&self) -> u64 {
        self.state.load().ticks
    }

    /// 是否已解锁
    pub fn is_armed(&self) -> bool {
        self.state.load().armed
    }

    pub(crate) fn commit(&self, snapshot: ControlSnapshot) {
        self.state.store(Arc::new(snapshot));
    }
}
