use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{common::Position3D, traits::IDetectable};

/// 侵入者の隠密パラメータ
///
/// 移動速度としゃがみ状態から騒音レベルと視認されやすさを決めます。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StealthProfile {
    /// 歩行時の騒音
    pub walking_noise: f64,
    /// 走行時の騒音
    pub running_noise: f64,
    /// しゃがみ歩き時の騒音
    pub crouching_noise: f64,
    /// 立っている時の視認されやすさ
    pub standing_visibility: f64,
    /// しゃがんでいる時の視認されやすさ
    pub crouching_visibility: f64,
    /// 走行とみなす水平速度（m/s）
    pub running_speed_threshold: f64,
    /// 移動中とみなす水平速度（m/s）
    pub moving_speed_threshold: f64,
}

impl Default for StealthProfile {
    fn default() -> Self {
        Self {
            walking_noise: 0.4,
            running_noise: 0.8,
            crouching_noise: 0.1,
            standing_visibility: 0.8,
            crouching_visibility: 0.4,
            running_speed_threshold: 3.5,
            moving_speed_threshold: 0.1,
        }
    }
}

impl StealthProfile {
    /// 水平速度としゃがみ状態に対応する騒音レベル
    pub fn noise_for(&self, horizontal_speed: f64, crouching: bool) -> f64 {
        if horizontal_speed > self.running_speed_threshold {
            self.running_noise
        } else if horizontal_speed > self.moving_speed_threshold {
            if crouching {
                self.crouching_noise
            } else {
                self.walking_noise
            }
        } else {
            0.0
        }
    }

    pub fn visibility_for(&self, crouching: bool) -> f64 {
        if crouching {
            self.crouching_visibility
        } else {
            self.standing_visibility
        }
    }
}

/// 侵入者の移動行程（1区間）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLeg {
    /// 区間の目的地
    pub destination: Position3D,
    /// 移動速度（m/s）
    pub speed: f64,
    /// しゃがんで移動するか
    pub crouching: bool,
    /// 到着後の待機時間（秒）
    pub hold_s: f64,
}

/// 侵入者の状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntruderStatus {
    /// 行程に沿って移動中
    Moving,
    /// 区間の終点で待機中
    Holding,
    /// 行程をすべて消化した
    Idle,
    /// 警備員に捕まった
    Caught,
}

/// 侵入者（プレイヤー）エージェント
///
/// スクリプト化された行程に沿って移動し、速度と姿勢から騒音・視認性を算出します。
/// 警備員のセンサーからは `IDetectable` として観測されます。
#[derive(Debug, Clone)]
pub struct Intruder {
    /// 侵入者の一意識別子
    pub id: String,
    /// 現在位置
    pub position: Position3D,
    /// 直近ティックの速度ベクトル
    pub velocity: Position3D,
    /// しゃがみ状態
    pub crouching: bool,
    /// 隠密パラメータ
    pub stealth: StealthProfile,
    /// 現在の状態
    pub status: IntruderStatus,
    legs: VecDeque<RouteLeg>,
    hold_remaining: f64,
    noise_level: f64,
    visibility_level: f64,
}

impl Intruder {
    /// 新しい侵入者を作成
    ///
    /// # 引数
    ///
    /// * `id` - 侵入者の一意識別子
    /// * `position` - 初期位置
    /// * `stealth` - 隠密パラメータ
    /// * `legs` - 移動行程（空の場合はその場に留まる）
    pub fn new(
        id: String,
        position: Position3D,
        stealth: StealthProfile,
        legs: Vec<RouteLeg>,
    ) -> Self {
        let crouching = legs.first().is_some_and(|leg| leg.crouching);
        let status = if legs.is_empty() {
            IntruderStatus::Idle
        } else {
            IntruderStatus::Moving
        };
        let visibility_level = stealth.visibility_for(crouching);

        Self {
            id,
            position,
            velocity: Position3D::zero(),
            crouching,
            stealth,
            status,
            legs: legs.into(),
            hold_remaining: 0.0,
            noise_level: 0.0,
            visibility_level,
        }
    }

    /// 侵入者の状態を更新（移動と隠密レベルの再計算）
    ///
    /// # 引数
    ///
    /// * `dt` - 時間刻み（秒）
    pub fn update(&mut self, dt: f64) {
        if self.status == IntruderStatus::Caught || dt <= 0.0 {
            return;
        }

        let previous = self.position;

        if self.hold_remaining > 0.0 {
            self.hold_remaining = (self.hold_remaining - dt).max(0.0);
            self.status = IntruderStatus::Holding;
        } else if let Some(leg) = self.legs.front().copied() {
            self.status = IntruderStatus::Moving;
            self.crouching = leg.crouching;
            self.position = self.position.move_towards(&leg.destination, leg.speed * dt);

            if self.position.distance_3d(&leg.destination) <= f64::EPSILON {
                self.legs.pop_front();
                self.hold_remaining = leg.hold_s;
                debug!(
                    intruder = %self.id,
                    x = self.position.x,
                    y = self.position.y,
                    remaining_legs = self.legs.len(),
                    "行程の区間を完了"
                );
            }
        } else {
            self.status = IntruderStatus::Idle;
        }

        self.velocity = (self.position - previous) * (1.0 / dt);
        self.recalculate_stealth();
    }

    /// 騒音レベルと視認性を現在の速度・姿勢から再計算
    pub fn recalculate_stealth(&mut self) {
        let horizontal_speed = Position3D::new(self.velocity.x, self.velocity.y, 0.0).magnitude();
        self.noise_level = self.stealth.noise_for(horizontal_speed, self.crouching);
        self.visibility_level = self.stealth.visibility_for(self.crouching);
    }

    /// しゃがみ状態を変更
    pub fn set_crouching(&mut self, crouching: bool) {
        self.crouching = crouching;
        self.recalculate_stealth();
    }

    /// 捕獲済みとしてマーク（以後は移動しない）
    pub fn mark_caught(&mut self) {
        self.status = IntruderStatus::Caught;
        self.velocity = Position3D::zero();
        self.noise_level = 0.0;
    }

    pub fn is_caught(&self) -> bool {
        self.status == IntruderStatus::Caught
    }

    /// 残りの行程数
    pub fn remaining_legs(&self) -> usize {
        self.legs.len()
    }
}

impl IDetectable for Intruder {
    fn position(&self) -> Position3D {
        self.position
    }

    fn visibility_level(&self) -> f64 {
        self.visibility_level
    }

    fn noise_level(&self) -> f64 {
        self.noise_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(x: f64, y: f64, speed: f64, crouching: bool, hold_s: f64) -> RouteLeg {
        RouteLeg {
            destination: Position3D::new(x, y, 0.0),
            speed,
            crouching,
            hold_s,
        }
    }

    #[test]
    fn test_noise_levels_by_gait() {
        let stealth = StealthProfile::default();
        assert_eq!(stealth.noise_for(5.0, false), 0.8);
        assert_eq!(stealth.noise_for(5.0, true), 0.8);
        assert_eq!(stealth.noise_for(1.5, false), 0.4);
        assert_eq!(stealth.noise_for(1.5, true), 0.1);
        assert_eq!(stealth.noise_for(0.0, false), 0.0);
        assert_eq!(stealth.visibility_for(false), 0.8);
        assert_eq!(stealth.visibility_for(true), 0.4);
    }

    #[test]
    fn test_follows_legs_and_holds() {
        let mut intruder = Intruder::new(
            "player".to_string(),
            Position3D::zero(),
            StealthProfile::default(),
            vec![leg(2.0, 0.0, 1.0, true, 1.0), leg(2.0, 8.0, 4.0, false, 0.0)],
        );

        intruder.update(1.0);
        assert_eq!(intruder.position, Position3D::new(1.0, 0.0, 0.0));
        assert_eq!(intruder.noise_level(), 0.1);
        assert_eq!(intruder.visibility_level(), 0.4);

        intruder.update(1.0);
        assert_eq!(intruder.remaining_legs(), 1);

        // 待機中は静止
        intruder.update(0.5);
        assert_eq!(intruder.status, IntruderStatus::Holding);
        assert_eq!(intruder.noise_level(), 0.0);

        intruder.update(0.5);
        intruder.update(1.0);
        assert_eq!(intruder.status, IntruderStatus::Moving);
        assert_eq!(intruder.noise_level(), 0.8);
        assert_eq!(intruder.visibility_level(), 0.8);

        intruder.update(1.0);
        intruder.update(1.0);
        assert_eq!(intruder.status, IntruderStatus::Idle);
        assert_eq!(intruder.position, Position3D::new(2.0, 8.0, 0.0));
    }

    #[test]
    fn test_caught_intruder_stops() {
        let mut intruder = Intruder::new(
            "player".to_string(),
            Position3D::zero(),
            StealthProfile::default(),
            vec![leg(10.0, 0.0, 2.0, false, 0.0)],
        );
        intruder.update(1.0);
        intruder.mark_caught();
        intruder.update(1.0);
        assert!(intruder.is_caught());
        assert_eq!(intruder.position, Position3D::new(2.0, 0.0, 0.0));
    }
}
