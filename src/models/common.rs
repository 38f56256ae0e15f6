use std::ops::{Add, Mul, Sub};

/// 3次元位置（および方向ベクトル）を表す構造体
///
/// XY平面が床面、Zが高さです。方向ベクトルとしても使用します。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position3D {
    pub x: f64, // m
    pub y: f64, // m
    pub z: f64, // m (height)
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 原点
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// XY平面上の方位角（度、+X軸から反時計回り）から単位方向ベクトルを作成
    pub fn from_heading_deg(heading_deg: f64) -> Self {
        let rad = math_utils::deg_to_rad(heading_deg);
        Self::new(rad.cos(), rad.sin(), 0.0)
    }

    /// 3次元距離を計算
    pub fn distance_3d(&self, other: &Position3D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// ベクトルの長さ（原点からの距離）
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 単位ベクトルに正規化（長さ0の場合はそのまま）
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            *self
        }
    }

    /// 内積
    pub fn dot(&self, other: &Position3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 2つのベクトルのなす角（度、0〜180）
    ///
    /// どちらかが長さ0の場合は0度を返します。
    pub fn angle_between_deg(&self, other: &Position3D) -> f64 {
        let denom = self.magnitude() * other.magnitude();
        if denom <= 0.0 {
            return 0.0;
        }
        (self.dot(other) / denom).clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// 目標位置に向かって最大 `max_step` だけ移動した位置
    pub fn move_towards(&self, target: &Position3D, max_step: f64) -> Self {
        let delta = *target - *self;
        let distance = delta.magnitude();
        if distance <= max_step || distance <= f64::EPSILON {
            *target
        } else {
            *self + delta * (max_step / distance)
        }
    }
}

impl Add for Position3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Position3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Position3D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * std::f64::consts::PI / 180.0
    }
}
