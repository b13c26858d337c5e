//! # Pico Control
//!
//! 三轴定点悬停 PID 控制器：读取外部位置估计，按轴计算相对固定目标点的
//! PID 修正，以固定周期发布钳位后的 RC 执行器命令和误差遥测。
//!
//! ## 模块
//!
//! - `controller`: 控制器本体（解锁序列、位置更新、调参、tick）
//! - `pid`: 单轴离散 PID
//! - `config`: 构造时固定的配置（TOML）
//! - `sink`: 发布接口 `CommandSink` 及 crossbeam 通道实现
//! - `runner`: 单线程协作式控制循环
//! - `observer`: 无锁状态快照
//! - `error`: 错误类型
//!
//! ## 快速开始
//!
//! ```rust
//! use pico_control::{ChannelSink, ControllerConfig, PositionHoldController};
//! use pico_protocol::{PositionEstimate, RcCommand};
//!
//! let mut controller = PositionHoldController::new(ControllerConfig::default()).unwrap();
//! let (mut sink, published) = ChannelSink::bounded(16);
//!
//! controller.arm(&mut sink).unwrap();
//! controller.on_position_update(PositionEstimate::new(2.0, 2.0, 20.0));
//! let output = controller.tick(&mut sink).unwrap();
//!
//! // 位置等于目标点且增益为零：命令保持中位
//! assert_eq!(output.command, RcCommand::ARM);
//! assert_eq!(published.len(), 4);
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod observer;
pub mod pid;
pub mod runner;
pub mod sink;

pub use config::{ActuatorRange, ArmingMode, ControllerConfig};
pub use controller::{PositionHoldController, TickOutput};
pub use error::{ConfigError, ControlError, SinkError};
pub use observer::{ControlSnapshot, ControllerObserver};
pub use pid::{AxisPidState, PidGains};
pub use runner::{
    ControlInputs, LoopConfig, RunSummary, StopReason, run_controller, run_controller_spin,
};
pub use sink::{ChannelSink, CommandSink, Publication};
