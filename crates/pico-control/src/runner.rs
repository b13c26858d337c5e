//! Loop Runner - 控制循环执行器
//!
//! 在单个线程内协作式分发三个操作：位置更新、增益调参、周期 tick。
//! 控制器由执行器按值持有，三个操作天然互斥，tick 之间不会重叠，不需要锁。
//!
//! # 两种定时方式
//!
//! - [`run_controller`]: `crossbeam_channel::select!` 同时等待输入通道和
//!   `crossbeam_channel::tick` 定时器，输入一到即应用
//! - [`run_controller_spin`]: 使用 `spin_sleep` 实现低抖动周期，
//!   每次 tick 前用 `try_recv` 取空输入通道（最新位置生效）
//!
//! # 生命周期
//!
//! 1. 发布 DISARM + ARM（按 `ArmingMode` 决定是否等待确认）
//! 2. 每个采样周期 tick 一次；发布失败记录日志后继续
//! 3. 收到关闭信号（或关闭通道断开）或达到 `max_iterations` 后发布 DISARM 并返回
//!
//! 输入通道断开不会停止调度：位置源丢失后继续使用最后一个位置。
//!
//! # 示例
//!
//! ```rust,no_run
//! use pico_control::{
//!     ChannelSink, ControlInputs, ControllerConfig, LoopConfig, PositionHoldController,
//!     run_controller,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = PositionHoldController::new(ControllerConfig::default())?;
//! let (sink, _published) = ChannelSink::bounded(64);
//!
//! let (position_tx, position_rx) = crossbeam_channel::unbounded();
//! let (gain_tx, gain_rx) = crossbeam_channel::unbounded();
//! let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
//! let inputs = ControlInputs::new(position_rx, gain_rx).with_shutdown(shutdown_rx);
//!
//! # drop((position_tx, gain_tx, shutdown_tx));
//! let summary = run_controller(controller, sink, inputs, LoopConfig::default())?;
//! println!("ticks: {}", summary.ticks);
//! # Ok(())
//! # }
//! ```

use crate::config::ArmingMode;
use crate::controller::PositionHoldController;
use crate::error::ControlError;
use crate::sink::CommandSink;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, select};
use pico_protocol::{GainTune, PositionEstimate};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 控制器的输入通道
#[derive(Debug)]
pub struct ControlInputs {
    /// 位置估计
    pub positions: Receiver<PositionEstimate>,
    /// 增益调参
    pub gains: Receiver<GainTune>,
    /// 解锁确认（仅 `ArmingMode::AwaitAck` 使用）
    pub arm_acks: Receiver<()>,
    /// 关闭信号
    pub shutdown: Receiver<()>,
}

impl ControlInputs {
    /// 创建输入集合，解锁确认和关闭信号默认永不触发
    pub fn new(positions: Receiver<PositionEstimate>, gains: Receiver<GainTune>) -> Self {
        ControlInputs {
            positions,
            gains,
            arm_acks: crossbeam_channel::never(),
            shutdown: crossbeam_channel::never(),
        }
    }

    /// 设置解锁确认通道
    pub fn with_arm_acks(mut self, arm_acks: Receiver<()>) -> Self {
        self.arm_acks = arm_acks;
        self
    }

    /// 设置关闭信号通道
    ///
    /// 收到消息或发送端全部 drop 都视为关闭。
    pub fn with_shutdown(mut self, shutdown: Receiver<()>) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// 循环配置
#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// 最大 tick 次数（None 表示一直运行到关闭）
    ///
    /// 用于测试或定时运行。
    pub max_iterations: Option<u64>,
}

impl LoopConfig {
    /// 运行指定次数后停止
    pub fn with_max_iterations(iterations: u64) -> Self {
        LoopConfig {
            max_iterations: Some(iterations),
        }
    }
}

/// 停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 收到关闭信号
    Shutdown,
    /// 达到最大 tick 次数
    MaxIterations,
}

/// 运行结果摘要
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// 完成的 tick 次数
    pub ticks: u64,
    /// 累计发布失败次数
    pub publish_failures: u64,
    /// 迟到的 tick 次数
    pub late_ticks: u64,
    /// 停止原因
    pub stop_reason: StopReason,
}

/// 运行控制循环（通道定时）
///
/// 阻塞当前线程直到关闭信号或达到 `max_iterations`，两种情况都会在返回前发布 DISARM。
///
/// # 错误
/// - `ControlError::ArmTimeout`: `AwaitAck` 模式下未在超时内收到确认（已重新上锁）
/// - `ControlError::AckChannelClosed`: `AwaitAck` 模式下确认通道断开（已重新上锁）
pub fn run_controller<S>(
    mut controller: PositionHoldController,
    mut sink: S,
    inputs: ControlInputs,
    config: LoopConfig,
) -> Result<RunSummary, ControlError>
where
    S: CommandSink,
{
    let period = controller.config().sample_period();
    start(&mut controller, &mut sink, &inputs)?;

    let ticker = crossbeam_channel::tick(period);
    let closed_positions = crossbeam_channel::never();
    let closed_gains = crossbeam_channel::never();
    let mut positions_open = true;
    let mut gains_open = true;
    let mut timing = TickTiming::new(period, controller.config().late_tick_multiplier);

    let stop_reason = loop {
        if reached(&config, timing.ticks) {
            break StopReason::MaxIterations;
        }

        // 断开的输入通道换成 never()，避免 select! 反复命中
        let positions = if positions_open {
            &inputs.positions
        } else {
            &closed_positions
        };
        let gains = if gains_open {
            &inputs.gains
        } else {
            &closed_gains
        };

        select! {
            recv(positions) -> msg => match msg {
                Ok(position) => controller.on_position_update(position),
                Err(_) => {
                    warn!("Position source disconnected, holding last estimate");
                    positions_open = false;
                },
            },
            recv(gains) -> msg => match msg {
                Ok(tune) => controller.apply_gain_tune(tune),
                Err(_) => {
                    debug!("Gain tuning source disconnected");
                    gains_open = false;
                },
            },
            recv(ticker) -> _ => {
                timing.mark(Instant::now());
                // 发布失败已在控制器内记录，调度继续
                let _ = controller.tick(&mut sink);
            },
            recv(inputs.shutdown) -> _ => break StopReason::Shutdown,
        }
    };

    Ok(finish(controller, &mut sink, timing, stop_reason))
}

/// 运行控制循环（`spin_sleep` 高精度定时）
///
/// 与 [`run_controller`] 语义相同，但使用 `SpinSleeper` 等待周期截止时间。
///
/// ⚠️ **注意**: `spin_sleep` 会占用更多 CPU，适合对周期抖动敏感的场景。
pub fn run_controller_spin<S>(
    mut controller: PositionHoldController,
    mut sink: S,
    inputs: ControlInputs,
    config: LoopConfig,
) -> Result<RunSummary, ControlError>
where
    S: CommandSink,
{
    use spin_sleep::SpinSleeper;

    let period = controller.config().sample_period();
    start(&mut controller, &mut sink, &inputs)?;

    let sleeper = SpinSleeper::default();
    let mut timing = TickTiming::new(period, controller.config().late_tick_multiplier);
    let mut deadline = Instant::now() + period;
    let mut positions_open = true;
    let mut gains_open = true;

    let stop_reason = loop {
        if reached(&config, timing.ticks) {
            break StopReason::MaxIterations;
        }

        let now = Instant::now();
        if deadline > now {
            sleeper.sleep(deadline - now);
        }

        match inputs.shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break StopReason::Shutdown,
            Err(TryRecvError::Empty) => {},
        }

        if positions_open {
            positions_open = drain(&inputs.positions, |p| controller.on_position_update(p));
            if !positions_open {
                warn!("Position source disconnected, holding last estimate");
            }
        }
        if gains_open {
            gains_open = drain(&inputs.gains, |t| controller.apply_gain_tune(t));
            if !gains_open {
                debug!("Gain tuning source disconnected");
            }
        }

        let now = Instant::now();
        timing.mark(now);
        let _ = controller.tick(&mut sink);

        deadline += period;
        // 落后超过一个周期时重新对齐，避免连续补发
        if deadline + period < now {
            deadline = now + period;
        }
    };

    Ok(finish(controller, &mut sink, timing, stop_reason))
}

/// 发布解锁序列，并按策略等待确认
fn start<S>(
    controller: &mut PositionHoldController,
    sink: &mut S,
    inputs: &ControlInputs,
) -> Result<(), ControlError>
where
    S: CommandSink,
{
    info!(
        period_ms = controller.config().sample_period_ms,
        setpoint = ?controller.setpoint(),
        "Starting position hold"
    );

    let arming = controller.config().arming;
    if let ArmingMode::AwaitAck { .. } = arming {
        // 解锁命令发出前到达的确认不算数
        let stale = inputs.arm_acks.try_iter().count();
        if stale > 0 {
            debug!(stale, "Discarding arm acknowledgments received before arming");
        }
    }

    // 发布失败已记录，解锁序列不重试
    let _ = controller.arm(sink);

    if let ArmingMode::AwaitAck { ack_timeout_ms } = arming {
        match inputs
            .arm_acks
            .recv_timeout(Duration::from_millis(ack_timeout_ms))
        {
            Ok(()) => info!("Arm acknowledged"),
            Err(RecvTimeoutError::Timeout) => {
                warn!(ack_timeout_ms, "Arm acknowledgment timed out, disarming");
                let _ = controller.disarm(sink);
                return Err(ControlError::ArmTimeout {
                    timeout_ms: ack_timeout_ms,
                });
            },
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Arm acknowledgment channel closed, disarming");
                let _ = controller.disarm(sink);
                return Err(ControlError::AckChannelClosed);
            },
        }
    }

    Ok(())
}

fn finish<S>(
    mut controller: PositionHoldController,
    sink: &mut S,
    timing: TickTiming,
    stop_reason: StopReason,
) -> RunSummary
where
    S: CommandSink,
{
    if stop_reason == StopReason::Shutdown {
        info!("Shutdown requested");
    }
    // 所有退出路径都以 DISARM 结束
    let _ = controller.disarm(sink);

    let summary = RunSummary {
        ticks: timing.ticks,
        publish_failures: controller.publish_failures(),
        late_ticks: timing.late_ticks,
        stop_reason,
    };
    info!(?summary, "Position hold stopped");
    summary
}

fn reached(config: &LoopConfig, ticks: u64) -> bool {
    matches!(config.max_iterations, Some(max) if ticks >= max)
}

/// 取空通道，返回通道是否仍然连接
fn drain<T>(rx: &Receiver<T>, mut apply: impl FnMut(T)) -> bool {
    loop {
        match rx.try_recv() {
            Ok(msg) => apply(msg),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

/// tick 计数和迟到检测
struct TickTiming {
    late_after: Duration,
    last: Option<Instant>,
    ticks: u64,
    late_ticks: u64,
}

impl TickTiming {
    fn new(period: Duration, late_tick_multiplier: f64) -> Self {
        TickTiming {
            late_after: Duration::try_from_secs_f64(period.as_secs_f64() * late_tick_multiplier)
                .unwrap_or(Duration::MAX),
            last: None,
            ticks: 0,
            late_ticks: 0,
        }
    }

    fn mark(&mut self, now: Instant) {
        if let Some(last) = self.last {
            let gap = now - last;
            if gap > self.late_after {
                self.late_ticks += 1;
                warn!(
                    gap_ms = gap.as_secs_f64() * 1000.0,
                    tick = self.ticks,
                    "Control tick late"
                );
            }
        }
        self.last = Some(now);
        self.ticks += 1;
    }
}
