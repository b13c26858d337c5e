//! 通道消息定义
//!
//! 所有消息都是 `Copy` 的小结构体，适合按值在通道中传递。

use crate::axis::{Axis, AxisArray};
use crate::constants::*;
use crate::ProtocolError;

/// 位置估计（世界坐标系）
///
/// 由外部位置源（如标记定位）以不规则频率产生。控制器只保留最新值，
/// 不缓冲、不插值。未收到任何估计时默认为原点。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PositionEstimate {
    /// 原点
    pub const ORIGIN: PositionEstimate = PositionEstimate {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        PositionEstimate { x, y, z }
    }

    /// 按控制轴取分量（x→roll, y→pitch, z→throttle）
    #[inline]
    pub fn component(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Roll => self.x,
            Axis::Pitch => self.y,
            Axis::Throttle => self.z,
        }
    }

    /// 转换为按轴数组
    #[inline]
    pub fn to_axis_array(self) -> AxisArray<f64> {
        AxisArray::new(self.x, self.y, self.z)
    }

    /// 三个分量是否都是有限值
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for PositionEstimate {
    fn from([x, y, z]: [f64; 3]) -> Self {
        PositionEstimate { x, y, z }
    }
}

/// 增益调参消息
///
/// 携带无量纲的旋钮值（不是物理增益），控制器按轴乘以标定系数后保存。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GainTune {
    /// 目标轴
    pub axis: Axis,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl GainTune {
    pub const fn new(axis: Axis, kp: f64, ki: f64, kd: f64) -> Self {
        GainTune { axis, kp, ki, kd }
    }
}

/// RC 执行器命令
///
/// 四个执行器通道加一个解锁辅助通道，取值 `[1000, 2000]`。
/// Yaw 始终为中位，`aux4` 编码解锁状态（1000 = 未解锁，2000 = 已解锁）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RcCommand {
    pub rc_roll: u16,
    pub rc_pitch: u16,
    pub rc_yaw: u16,
    pub rc_throttle: u16,
    pub rc_aux4: u16,
}

impl RcCommand {
    /// 上锁命令：所有通道低位，辅助通道为未解锁
    pub const DISARM: RcCommand = RcCommand {
        rc_roll: RC_MIN,
        rc_pitch: RC_MIN,
        rc_yaw: RC_MIN,
        rc_throttle: RC_MIN,
        rc_aux4: AUX_DISARMED,
    };

    /// 解锁命令：所有通道中位，辅助通道为已解锁
    pub const ARM: RcCommand = RcCommand {
        rc_roll: RC_NEUTRAL,
        rc_pitch: RC_NEUTRAL,
        rc_yaw: RC_NEUTRAL,
        rc_throttle: RC_NEUTRAL,
        rc_aux4: AUX_ARMED,
    };

    /// 是否处于解锁状态
    #[inline]
    pub const fn is_armed(&self) -> bool {
        self.rc_aux4 == AUX_ARMED
    }

    /// 按控制轴读取通道值
    #[inline]
    pub fn channel(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Roll => self.rc_roll,
            Axis::Pitch => self.rc_pitch,
            Axis::Throttle => self.rc_throttle,
        }
    }

    /// 按控制轴写入通道值
    #[inline]
    pub fn set_channel(&mut self, axis: Axis, value: u16) {
        match axis {
            Axis::Roll => self.rc_roll = value,
            Axis::Pitch => self.rc_pitch = value,
            Axis::Throttle => self.rc_throttle = value,
        }
    }

    /// 检查所有通道都在 `[RC_MIN, RC_MAX]` 内
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let channels = [
            self.rc_roll,
            self.rc_pitch,
            self.rc_yaw,
            self.rc_throttle,
            self.rc_aux4,
        ];
        for value in channels {
            if !(RC_MIN..=RC_MAX).contains(&value) {
                return Err(ProtocolError::ChannelOutOfRange {
                    value,
                    min: RC_MIN,
                    max: RC_MAX,
                });
            }
        }
        Ok(())
    }
}

impl Default for RcCommand {
    /// 默认命令为中位（对应控制器构造时的初始命令）
    fn default() -> Self {
        RcCommand {
            rc_aux4: AUX_DISARMED,
            ..RcCommand::ARM
        }
    }
}

/// PID 误差遥测
///
/// 三个轴的原始误差（位置 − 目标点），未经钳位。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidError {
    pub roll_error: f64,
    pub pitch_error: f64,
    pub throttle_error: f64,
}

impl PidError {
    /// 所有轴误差是否都为零
    pub fn is_zero(&self) -> bool {
        self.roll_error == 0.0 && self.pitch_error == 0.0 && self.throttle_error == 0.0
    }
}

impl From<AxisArray<f64>> for PidError {
    fn from(errors: AxisArray<f64>) -> Self {
        PidError {
            roll_error: errors.roll,
            pitch_error: errors.pitch,
            throttle_error: errors.throttle,
        }
    }
}
