//! # 控制器配置
//!
//! 构造时固定，运行期间不可修改：目标点、采样周期、每轴执行器范围、
//! 每轴增益标定系数，以及两个可选行为（积分限幅、解锁确认）。
//!
//! 配置文件为 TOML，缺省字段取默认值：
//!
//! ```toml
//! sample_period_ms = 60
//! setpoint = { x = 2.0, y = 2.0, z = 20.0 }
//!
//! [limits]
//! roll = { min = 1000, max = 2000 }
//! pitch = { min = 1000, max = 2000 }
//! throttle = { min = 1000, max = 2000 }
//!
//! [arming]
//! mode = "await_ack"
//! ack_timeout_ms = 1000
//! ```
//!
//! 按轴的表（`limits`、`calibration`、`initial_gains`）出现时必须写全三个轴。

use crate::error::ConfigError;
use crate::pid::PidGains;
use pico_protocol::{Axis, AxisArray, DEFAULT_SAMPLE_PERIOD_MS, PositionEstimate, RC_MAX, RC_MIN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 默认增益标定系数（旋钮值 → 物理增益）
pub const DEFAULT_CALIBRATION: PidGains = PidGains::new(0.03, 0.008, 0.6);

/// 默认目标点
pub const DEFAULT_SETPOINT: PositionEstimate = PositionEstimate::new(2.0, 2.0, 20.0);

/// 采样周期上限（毫秒）
pub const MAX_SAMPLE_PERIOD_MS: u64 = 60_000;

/// 延迟判定倍数上限
pub const MAX_LATE_TICK_MULTIPLIER: f64 = 1000.0;

/// 执行器通道范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorRange {
    pub min: u16,
    pub max: u16,
}

impl Default for ActuatorRange {
    fn default() -> Self {
        ActuatorRange {
            min: RC_MIN,
            max: RC_MAX,
        }
    }
}

impl ActuatorRange {
    pub const fn new(min: u16, max: u16) -> Self {
        ActuatorRange { min, max }
    }

    /// 把浮点通道值截断取整并钳位到范围内
    ///
    /// 向零截断（与整数转换一致），±inf 钳位到边界，NaN 视为中位后再钳位。
    #[inline]
    pub fn clamp_channel(&self, value: f64, neutral: u16) -> u16 {
        let value = if value.is_nan() {
            f64::from(neutral)
        } else {
            value.trunc()
        };
        value.clamp(f64::from(self.min), f64::from(self.max)) as u16
    }

    /// 数值是否在范围内
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// 解锁确认策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ArmingMode {
    /// 发布上锁+解锁后立即开始控制，不等待确认
    #[default]
    FireAndForget,
    /// 发布解锁后等待确认，超时则重新上锁并报错
    AwaitAck {
        /// 等待确认的超时时间（毫秒）
        ack_timeout_ms: u64,
    },
}

/// 控制器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// 采样周期（毫秒）
    pub sample_period_ms: u64,

    /// 积分项对称限幅
    ///
    /// `None` 表示不限幅（默认，积分无界累积）。
    pub integral_limit: Option<f64>,

    /// 延迟判定倍数
    ///
    /// 两次 tick 间隔超过 `sample_period × late_tick_multiplier` 时记录警告。
    pub late_tick_multiplier: f64,

    /// 目标位置
    pub setpoint: PositionEstimate,

    /// 每轴执行器范围
    pub limits: AxisArray<ActuatorRange>,

    /// 每轴增益标定系数
    pub calibration: AxisArray<PidGains>,

    /// 构造时直接生效的物理增益（已标定，不再乘系数）
    pub initial_gains: AxisArray<PidGains>,

    /// 解锁确认策略
    pub arming: ArmingMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            sample_period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            setpoint: DEFAULT_SETPOINT,
            limits: AxisArray::splat(ActuatorRange::default()),
            calibration: AxisArray::splat(DEFAULT_CALIBRATION),
            initial_gains: AxisArray::splat(PidGains::ZERO),
            integral_limit: None,
            late_tick_multiplier: 2.0,
            arming: ArmingMode::FireAndForget,
        }
    }
}

impl ControllerConfig {
    /// 采样周期
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    /// 设置目标点
    pub fn with_setpoint(mut self, setpoint: PositionEstimate) -> Self {
        self.setpoint = setpoint;
        self
    }

    /// 设置采样周期
    pub fn with_sample_period(mut self, period: Duration) -> Self {
        self.sample_period_ms = period.as_millis() as u64;
        self
    }

    /// 设置单轴执行器范围
    pub fn with_limit(mut self, axis: Axis, range: ActuatorRange) -> Self {
        self.limits[axis] = range;
        self
    }

    /// 设置单轴初始增益
    pub fn with_initial_gains(mut self, axis: Axis, gains: PidGains) -> Self {
        self.initial_gains[axis] = gains;
        self
    }

    /// 设置积分限幅
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit);
        self
    }

    /// 设置解锁确认策略
    pub fn with_arming(mut self, arming: ArmingMode) -> Self {
        self.arming = arming;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_period_ms == 0 || self.sample_period_ms > MAX_SAMPLE_PERIOD_MS {
            return Err(ConfigError::InvalidSamplePeriod(self.sample_period_ms));
        }

        for axis in Axis::ALL {
            let range = self.limits[axis];
            if range.min > range.max || range.min < RC_MIN || range.max > RC_MAX {
                return Err(ConfigError::InvalidRange {
                    axis: axis.name().to_string(),
                    min: range.min,
                    max: range.max,
                });
            }

            check_finite(
                &format!("setpoint.{}", axis.position_component()),
                self.setpoint.component(axis),
            )?;
            check_gains(&format!("calibration.{}", axis), &self.calibration[axis])?;
            check_gains(&format!("initial_gains.{}", axis), &self.initial_gains[axis])?;
        }

        if let Some(limit) = self.integral_limit
            && !(limit.is_finite() && limit >= 0.0)
        {
            return Err(ConfigError::InvalidIntegralLimit(limit));
        }

        if !(1.0..=MAX_LATE_TICK_MULTIPLIER).contains(&self.late_tick_multiplier) {
            return Err(ConfigError::InvalidLateTickMultiplier(
                self.late_tick_multiplier,
            ));
        }

        Ok(())
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn check_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite {
            field: field.to_string(),
            value,
        })
    }
}

fn check_gains(field: &str, gains: &PidGains) -> Result<(), ConfigError> {
    check_finite(&format!("{}.kp", field), gains.kp)?;
    check_finite(&format!("{}.ki", field), gains.ki)?;
    check_finite(&format!("{}.kd", field), gains.kd)
}
