//! 控制轴和按轴索引的数组
//!
//! 提供编译期安全的轴索引，固定顺序 `0 = roll/x, 1 = pitch/y, 2 = throttle/z`，
//! 防止读写之间轴顺序漂移。
//!
//! # 示例
//!
//! ```rust
//! use pico_protocol::{Axis, AxisArray};
//!
//! let mut gains = AxisArray::splat(0.0);
//! gains[Axis::Throttle] = 2.0;
//!
//! assert_eq!(gains.throttle, 2.0);
//! assert_eq!(gains[Axis::Roll], 0.0);
//!
//! for (axis, kp) in Axis::ALL.iter().zip(gains.iter()) {
//!     println!("{}: {}", axis, kp);
//! }
//! ```

use crate::ProtocolError;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// 控制轴枚举
///
/// 三个受 PID 控制的通道。Yaw 不在此列，它始终保持中位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase", try_from = "String"))]
pub enum Axis {
    /// 横滚（对应位置 x）
    Roll = 0,
    /// 俯仰（对应位置 y）
    Pitch = 1,
    /// 油门（对应位置 z）
    Throttle = 2,
}

impl Axis {
    /// 所有轴，按固定顺序排列
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Throttle];

    /// 获取轴名称
    pub const fn name(self) -> &'static str {
        match self {
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Throttle => "throttle",
        }
    }

    /// 对应的位置分量名称
    pub const fn position_component(self) -> &'static str {
        match self {
            Axis::Roll => "x",
            Axis::Pitch => "y",
            Axis::Throttle => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Axis {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roll" => Ok(Axis::Roll),
            "pitch" => Ok(Axis::Pitch),
            // 兼容 "altitude"（调参节点的旧命名）
            "throttle" | "altitude" => Ok(Axis::Throttle),
            _ => Err(ProtocolError::UnknownAxis {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Axis {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// 按轴存放的三元组
///
/// 以具名字段保存，避免裸数组的位置含义错乱；同时支持 `Axis` 索引和统一的逐轴映射。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisArray<T> {
    /// 横滚
    pub roll: T,
    /// 俯仰
    pub pitch: T,
    /// 油门
    pub throttle: T,
}

impl<T> AxisArray<T> {
    /// 创建新的轴数组
    #[inline]
    pub const fn new(roll: T, pitch: T, throttle: T) -> Self {
        AxisArray {
            roll,
            pitch,
            throttle,
        }
    }

    /// 迭代器（固定顺序 roll, pitch, throttle）
    pub fn iter(&self) -> std::array::IntoIter<&T, 3> {
        [&self.roll, &self.pitch, &self.throttle].into_iter()
    }

    /// 映射转换
    pub fn map<U, F>(self, mut f: F) -> AxisArray<U>
    where
        F: FnMut(T) -> U,
    {
        AxisArray::new(f(self.roll), f(self.pitch), f(self.throttle))
    }

    /// 按轴和另一个数组的元素执行映射
    pub fn map_with<U, V, F>(self, other: AxisArray<U>, mut f: F) -> AxisArray<V>
    where
        F: FnMut(T, U) -> V,
    {
        AxisArray::new(
            f(self.roll, other.roll),
            f(self.pitch, other.pitch),
            f(self.throttle, other.throttle),
        )
    }

    /// 转换为数组（固定顺序）
    #[inline]
    pub fn into_array(self) -> [T; 3] {
        [self.roll, self.pitch, self.throttle]
    }
}

impl<T: Copy> AxisArray<T> {
    /// 创建所有元素相同的数组
    #[inline]
    pub const fn splat(value: T) -> Self {
        AxisArray::new(value, value, value)
    }
}

impl<T> Index<Axis> for AxisArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, axis: Axis) -> &T {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Throttle => &self.throttle,
        }
    }
}

impl<T> IndexMut<Axis> for AxisArray<T> {
    #[inline]
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::Roll => &mut self.roll,
            Axis::Pitch => &mut self.pitch,
            Axis::Throttle => &mut self.throttle,
        }
    }
}

impl<T> From<[T; 3]> for AxisArray<T> {
    #[inline]
    fn from(data: [T; 3]) -> Self {
        let [roll, pitch, throttle] = data;
        AxisArray::new(roll, pitch, throttle)
    }
}

impl<T> From<AxisArray<T>> for [T; 3] {
    #[inline]
    fn from(arr: AxisArray<T>) -> Self {
        arr.into_array()
    }
}

impl<T> IntoIterator for AxisArray<T> {
    type Item = T;
    type IntoIter = std::array::IntoIter<T, 3>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_array().into_iter()
    }
}
