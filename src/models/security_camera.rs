//! # SecurityCamera モジュール
//!
//! 首振りしながら侵入者を監視する防犯カメラです。
//!
//! 視野内に侵入者を捉え続けると検知進捗が溜まり、一定時間で警報を発します。
//! 警報は範囲内の警備員に調査要求（`IAlarmResponder::respond_to_alarm`）として届き、
//! その後カメラはクールダウンに入ります。

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{
    common::Position3D,
    traits::{IAlarmResponder, IDetectable, ISpatialQuery},
};

/// カメラの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    /// 首振り監視中
    Scanning,
    /// 侵入者を捉えて検知進捗を蓄積中
    Detecting,
    /// 警報発令後のクールダウン中
    Alerted,
    /// 無効化中
    Disabled,
}

/// カメラの調整パラメータ
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraProfile {
    /// 視認距離（m）
    pub view_radius_m: f64,
    /// 視野角（度、全角）
    pub view_angle_deg: f64,
    /// 首振り速度（度/秒）
    pub pan_speed_deg_s: f64,
    /// 初期方位から左右への首振り角（度）
    pub pan_angle_deg: f64,
    /// 首振り端での停止時間（秒）
    pub pan_pause_s: f64,
    /// 警報までの連続捕捉時間（秒）
    pub time_to_detect_s: f64,
    /// 警報が届く範囲（m）
    pub alarm_range_m: f64,
    /// 警報後のクールダウン（秒）
    pub alert_cooldown_s: f64,
}

impl Default for CameraProfile {
    fn default() -> Self {
        Self {
            view_radius_m: 15.0,
            view_angle_deg: 90.0,
            pan_speed_deg_s: 30.0,
            pan_angle_deg: 45.0,
            pan_pause_s: 2.0,
            time_to_detect_s: 2.0,
            alarm_range_m: 50.0,
            alert_cooldown_s: 10.0,
        }
    }
}

/// 防犯カメラ
#[derive(Debug, Clone)]
pub struct SecurityCamera {
    /// カメラの一意識別子
    pub id: String,
    /// 設置位置
    pub position: Position3D,
    /// 首振りの中心方位（度）
    pub base_heading_deg: f64,
    pub profile: CameraProfile,
    state: CameraState,
    detection_progress: f64,
    pan_offset_deg: f64,
    pan_direction: f64,
    pan_pause_remaining: f64,
    cooldown_remaining: f64,
    disabled_remaining: Option<f64>,
    permanently_disabled: bool,
    alarms_raised: u32,
}

impl SecurityCamera {
    pub fn new(
        id: String,
        position: Position3D,
        base_heading_deg: f64,
        profile: CameraProfile,
    ) -> Self {
        Self {
            id,
            position,
            base_heading_deg,
            profile,
            state: CameraState::Scanning,
            detection_progress: 0.0,
            pan_offset_deg: 0.0,
            pan_direction: 1.0,
            pan_pause_remaining: 0.0,
            cooldown_remaining: 0.0,
            disabled_remaining: None,
            permanently_disabled: false,
            alarms_raised: 0,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn detection_progress(&self) -> f64 {
        self.detection_progress
    }

    pub fn alarms_raised(&self) -> u32 {
        self.alarms_raised
    }

    /// 現在の向き（度）
    pub fn heading_deg(&self) -> f64 {
        self.base_heading_deg + self.pan_offset_deg
    }

    pub fn forward(&self) -> Position3D {
        Position3D::from_heading_deg(self.heading_deg())
    }

    /// 1ティック分の処理
    ///
    /// # 引数
    ///
    /// * `dt` - 時間刻み（秒）
    /// * `target` - 監視対象（未設定の場合はNone）
    /// * `spatial` - 空間クエリサービス
    ///
    /// # 戻り値
    ///
    /// このティックで警報を発した場合は侵入者の位置
    pub fn update(
        &mut self,
        dt: f64,
        target: Option<&dyn IDetectable>,
        spatial: &dyn ISpatialQuery,
    ) -> Option<Position3D> {
        if self.permanently_disabled {
            self.state = CameraState::Disabled;
            return None;
        }

        match self.state {
            CameraState::Disabled => {
                if let Some(remaining) = self.disabled_remaining {
                    let remaining = remaining - dt;
                    if remaining <= 0.0 {
                        self.disabled_remaining = None;
                        self.state = CameraState::Scanning;
                        debug!(camera = %self.id, "無効化が解除された");
                    } else {
                        self.disabled_remaining = Some(remaining);
                    }
                }
                None
            }
            CameraState::Alerted => {
                self.cooldown_remaining -= dt;
                if self.cooldown_remaining <= 0.0 {
                    self.cooldown_remaining = 0.0;
                    self.state = CameraState::Scanning;
                }
                None
            }
            CameraState::Scanning => {
                self.pan(dt);
                self.look_for_target(dt, target, spatial)
            }
            CameraState::Detecting => self.look_for_target(dt, target, spatial),
        }
    }

    fn pan(&mut self, dt: f64) {
        let limit = self.profile.pan_angle_deg;
        if limit <= 0.0 {
            return;
        }
        if self.pan_pause_remaining > 0.0 {
            self.pan_pause_remaining = (self.pan_pause_remaining - dt).max(0.0);
            return;
        }

        self.pan_offset_deg += self.pan_direction * self.profile.pan_speed_deg_s * dt;
        if self.pan_offset_deg >= limit {
            self.pan_offset_deg = limit;
            self.pan_direction = -1.0;
            self.pan_pause_remaining = self.profile.pan_pause_s;
        } else if self.pan_offset_deg <= -limit {
            self.pan_offset_deg = -limit;
            self.pan_direction = 1.0;
            self.pan_pause_remaining = self.profile.pan_pause_s;
        }
    }

    /// 対象がカメラの視野内にあるか（距離は境界を含み、角度は境界を含まない）
    pub fn can_see(&self, point: Position3D, spatial: &dyn ISpatialQuery) -> bool {
        let to_point = point - self.position;
        if spatial.distance(self.position, point) > self.profile.view_radius_m {
            return false;
        }
        if to_point.magnitude() > f64::EPSILON
            && self.forward().angle_between_deg(&to_point) >= self.profile.view_angle_deg / 2.0
        {
            return false;
        }
        spatial.has_line_of_sight(self.position, point)
    }

    fn look_for_target(
        &mut self,
        dt: f64,
        target: Option<&dyn IDetectable>,
        spatial: &dyn ISpatialQuery,
    ) -> Option<Position3D> {
        let sighted = target
            .map(|target| target.position())
            .filter(|position| self.can_see(*position, spatial));

        let Some(position) = sighted else {
            self.detection_progress = (self.detection_progress - dt * 2.0).max(0.0);
            if self.detection_progress <= 0.0 {
                self.state = CameraState::Scanning;
            }
            return None;
        };

        self.detection_progress += dt;
        self.state = CameraState::Detecting;
        if self.detection_progress < self.profile.time_to_detect_s {
            return None;
        }

        warn!(camera = %self.id, x = position.x, y = position.y, "カメラ警報");
        self.state = CameraState::Alerted;
        self.detection_progress = 0.0;
        self.cooldown_remaining = self.profile.alert_cooldown_s;
        self.alarms_raised += 1;
        Some(position)
    }

    /// 警報範囲内の応答者に調査を要求
    ///
    /// # 戻り値
    ///
    /// 要求に応じた応答者の数
    pub fn broadcast_alarm<'a, R>(
        &self,
        position: Position3D,
        responders: impl IntoIterator<Item = &'a mut R>,
    ) -> usize
    where
        R: IAlarmResponder + 'a,
    {
        let mut responded = 0;
        for responder in responders {
            let distance = responder.responder_position().distance_3d(&self.position);
            if distance > self.profile.alarm_range_m {
                continue;
            }
            if responder.respond_to_alarm(position) {
                responded += 1;
            }
        }
        info!(camera = %self.id, responded, "警報を警備員に通知");
        responded
    }

    /// 指定時間だけ無効化（永久無効化されている場合は何もしない）
    pub fn disable_for(&mut self, duration: f64) {
        if self.permanently_disabled {
            return;
        }
        self.state = CameraState::Disabled;
        self.detection_progress = 0.0;
        self.disabled_remaining = Some(duration);
    }

    /// 永久に無効化
    pub fn disable_permanently(&mut self) {
        self.permanently_disabled = true;
        self.state = CameraState::Disabled;
        self.detection_progress = 0.0;
        self.disabled_remaining = None;
    }

    pub fn is_permanently_disabled(&self) -> bool {
        self.permanently_disabled
    }
}
