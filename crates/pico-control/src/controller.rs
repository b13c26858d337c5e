//! Position Hold Controller - 三轴定点悬停 PID 控制器
//!
//! 持有全部可变控制状态（当前位置、每轴增益、累积误差、上次误差、最新命令），
//! 每个采样周期执行一次 [`tick`](PositionHoldController::tick)。
//!
//! # 状态转换
//!
//! ```text
//! [构造] --arm()--> 发布 DISARM --> 发布 ARM --> [已解锁] --tick()...--> disarm() --> [已上锁]
//! ```
//!
//! # 每周期计算
//!
//! ```text
//! error[i]  = position[i] - setpoint[i]
//! output[i] = Kp[i]*error[i] + Ki[i]*sum[i] + Kd[i]*(error[i] - prev[i])
//!
//! roll     = 1500 + output[roll]
//! pitch    = 1500 - output[pitch]     // 俯仰轴符号相反
//! throttle = 1500 + output[throttle]
//! yaw      = 1500
//! ```
//!
//! 每个通道截断取整后钳位到该轴的 `[min, max]`，然后依次发布命令和原始误差。
//!
//! # 线程模型
//!
//! 控制器本身不做同步，三个操作（`tick`、`on_position_update`、`on_gain_tune`）
//! 通过 `&mut self` 互斥。循环执行器（`runner`）在单线程内协作式分发这三个操作。
//!
//! # 示例
//!
//! ```rust
//! use pico_control::{ChannelSink, ControllerConfig, PositionHoldController};
//! use pico_protocol::{Axis, PositionEstimate};
//!
//! let mut controller = PositionHoldController::new(ControllerConfig::default()).unwrap();
//! let (mut sink, rx) = ChannelSink::bounded(16);
//!
//! controller.arm(&mut sink).unwrap();
//! controller.on_gain_tune(Axis::Throttle, 100.0, 0.0, 0.0);
//! controller.on_position_update(PositionEstimate::new(2.0, 2.0, 15.0));
//!
//! let output = controller.tick(&mut sink).unwrap();
//! assert!(output.command.rc_throttle < 1500);
//! assert_eq!(rx.len(), 4); // DISARM, ARM, 命令, 误差
//! ```

use crate::config::ControllerConfig;
use crate::error::{ConfigError, SinkError};
use crate::observer::{ControlSnapshot, ControllerObserver};
use crate::pid::{AxisPidState, PidGains};
use crate::sink::CommandSink;
use pico_protocol::{
    Axis, AxisArray, GainTune, PidError, PositionEstimate, RC_NEUTRAL, RcCommand, channels,
};
use tracing::{debug, info, trace, warn};

/// 单次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    /// 已钳位的执行器命令
    pub command: RcCommand,
    /// 原始误差（未钳位）
    pub error: PidError,
    /// 每轴 PID 输出（未加中位、未钳位）
    pub output: AxisArray<f64>,
}

/// 三轴定点悬停控制器
#[derive(Debug)]
pub struct PositionHoldController {
    config: ControllerConfig,
    position: PositionEstimate,
    gains: AxisArray<PidGains>,
    state: AxisArray<AxisPidState>,
    command: RcCommand,
    last_error: PidError,
    armed: bool,
    ticks: u64,
    publish_failures: u64,
    observer: Option<ControllerObserver>,
}

impl PositionHoldController {
    /// 创建控制器
    ///
    /// 误差和累积量清零，增益取 `config.initial_gains`（默认全零），位置默认原点。
    ///
    /// # 错误
    /// - `ConfigError`: 配置校验失败
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(PositionHoldController {
            gains: config.initial_gains,
            config,
            position: PositionEstimate::ORIGIN,
            state: AxisArray::default(),
            command: RcCommand::default(),
            last_error: PidError::default(),
            armed: false,
            ticks: 0,
            publish_failures: 0,
            observer: None,
        })
    }

    /// 获取只读观察器
    ///
    /// 观察器在每次 tick、解锁/上锁和调参后更新；位置更新只在下一次 tick 时体现。
    pub fn observer(&mut self) -> ControllerObserver {
        let snapshot = self.snapshot();
        self.observer
            .get_or_insert_with(|| ControllerObserver::new(snapshot))
            .clone()
    }

    /// 位置更新：只覆盖保存的当前位置，不计算、不发布
    ///
    /// 非有限的估计同样生效，只记录警告。
    #[inline]
    pub fn on_position_update(&mut self, position: PositionEstimate) {
        if !position.is_finite() {
            warn!(channel = channels::POSITION_ESTIMATE, ?position, "Non-finite position estimate");
        }
        self.position = position;
    }

    /// 增益调参：旋钮值乘以该轴标定系数后写入，只影响这一个轴，不发布
    pub fn on_gain_tune(&mut self, axis: Axis, kp_raw: f64, ki_raw: f64, kd_raw: f64) {
        let raw = PidGains::new(kp_raw, ki_raw, kd_raw);
        let gains = raw.scaled_by(self.config.calibration[axis]);
        debug!(%axis, ?raw, ?gains, "Gain tune applied");
        self.gains[axis] = gains;
        self.commit_snapshot();
    }

    /// 应用调参消息
    pub fn apply_gain_tune(&mut self, tune: GainTune) {
        self.on_gain_tune(tune.axis, tune.kp, tune.ki, tune.kd);
    }

    /// 直接设置物理增益（不经过标定系数）
    pub fn set_gains(&mut self, axis: Axis, gains: PidGains) {
        self.gains[axis] = gains;
        self.commit_snapshot();
    }

    /// 上锁：所有通道低位，辅助通道为未解锁，立即发布
    pub fn disarm<S>(&mut self, sink: &mut S) -> Result<(), SinkError>
    where
        S: CommandSink + ?Sized,
    {
        self.command = RcCommand::DISARM;
        self.armed = false;
        info!("Disarming");
        let result = self.publish_command(sink);
        self.commit_snapshot();
        result
    }

    /// 解锁序列：先发布上锁命令，紧接着发布解锁命令（中位 + 辅助通道已解锁）
    ///
    /// 两条命令都会发布，不等待确认；返回第一个发布错误（如有）。
    pub fn arm<S>(&mut self, sink: &mut S) -> Result<(), SinkError>
    where
        S: CommandSink + ?Sized,
    {
        let disarm_result = self.disarm(sink);

        self.command = RcCommand::ARM;
        self.armed = true;
        info!("Arming");
        let arm_result = self.publish_command(sink);
        self.commit_snapshot();

        disarm_result.and(arm_result)
    }

    /// 计算一步控制输出并更新状态（不发布）
    ///
    /// 更新每轴的累积误差和上次误差，写入当前命令。
    pub fn compute(&mut self) -> TickOutput {
        let error = self
            .position
            .to_axis_array()
            .map_with(self.config.setpoint.to_axis_array(), |p, s| p - s);

        let mut output = AxisArray::splat(0.0);
        for axis in Axis::ALL {
            output[axis] =
                self.state[axis].step(&self.gains[axis], error[axis], self.config.integral_limit);
        }

        let neutral = f64::from(RC_NEUTRAL);
        let raw = AxisArray::new(
            neutral + output.roll,
            neutral - output.pitch,
            neutral + output.throttle,
        );

        for axis in Axis::ALL {
            let value = self.config.limits[axis].clamp_channel(raw[axis], RC_NEUTRAL);
            if f64::from(value) != raw[axis].trunc() {
                debug!(%axis, raw = raw[axis], clamped = value, "Channel saturated");
            }
            self.command.set_channel(axis, value);
        }
        self.command.rc_yaw = RC_NEUTRAL;

        self.last_error = PidError::from(error);
        self.ticks += 1;

        trace!(
            tick = self.ticks,
            ?error,
            ?output,
            command = ?self.command,
            "Control tick"
        );

        TickOutput {
            command: self.command,
            error: self.last_error,
            output,
        }
    }

    /// 执行一个控制周期：计算、发布命令、发布误差遥测
    ///
    /// 状态在发布之前已经更新，发布失败不会回滚，也不会影响下一次 tick。
    /// 两次发布都会尝试，返回第一个发布错误（如有）。
    pub fn tick<S>(&mut self, sink: &mut S) -> Result<TickOutput, SinkError>
    where
        S: CommandSink + ?Sized,
    {
        let output = self.compute();

        let command_result = self.publish_command(sink);
        let error_result = sink.publish_error(&output.error).inspect_err(|e| {
            self.publish_failures += 1;
            warn!(
                channel = channels::CONTROL_ERROR,
                tick = self.ticks,
                "Failed to publish PID error: {}",
                e
            );
        });

        self.commit_snapshot();

        command_result.and(error_result).map(|()| output)
    }

    /// 清零所有轴的累积误差和上次误差，不影响增益和解锁状态
    pub fn reset(&mut self) {
        for axis in Axis::ALL {
            self.state[axis].reset();
        }
        self.last_error = PidError::default();
        self.commit_snapshot();
    }

    fn publish_command<S>(&mut self, sink: &mut S) -> Result<(), SinkError>
    where
        S: CommandSink + ?Sized,
    {
        sink.publish_command(&self.command).inspect_err(|e| {
            self.publish_failures += 1;
            warn!(
                channel = channels::ACTUATOR_COMMAND,
                tick = self.ticks,
                "Failed to publish command: {}",
                e
            );
        })
    }

    fn commit_snapshot(&self) {
        if let Some(observer) = &self.observer {
            observer.commit(self.snapshot());
        }
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            armed: self.armed,
            ticks: self.ticks,
            position: self.position,
            gains: self.gains,
            error_sum: self.error_sum(),
            last_command: self.command,
            last_error: self.last_error,
            publish_failures: self.publish_failures,
        }
    }

    /// 配置
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 目标点
    pub fn setpoint(&self) -> PositionEstimate {
        self.config.setpoint
    }

    /// 当前保存的位置
    pub fn position(&self) -> PositionEstimate {
        self.position
    }

    /// 每轴物理增益
    pub fn gains(&self) -> AxisArray<PidGains> {
        self.gains
    }

    /// 每轴累积误差
    pub fn error_sum(&self) -> AxisArray<f64> {
        self.state.map(|s| s.error_sum)
    }

    /// 每轴上次误差
    pub fn prev_error(&self) -> AxisArray<f64> {
        self.state.map(|s| s.prev_error)
    }

    /// 最新命令
    pub fn command(&self) -> RcCommand {
        self.command
    }

    /// 最新误差遥测
    pub fn last_error(&self) -> PidError {
        self.last_error
    }

    /// 是否已解锁
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// 已完成的 tick 次数
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 累计发布失败次数
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures
    }
}
