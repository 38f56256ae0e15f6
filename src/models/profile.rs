use serde::{Deserialize, Serialize};

/// 警備員の調整パラメータ
///
/// 警備員のバリエーション（美術館の警備員、巡回兵など）は継承ではなく、
/// このパラメータの違いとして表現します。シナリオファイルでは全項目が省略可能です。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardProfile {
    /// 巡回速度（m/s）
    pub patrol_speed_mps: f64,
    /// 追跡速度（m/s）
    pub chase_speed_mps: f64,
    /// 調査時の速度倍率（巡回速度に対して）
    pub investigate_speed_factor: f64,
    /// 捜索時の速度倍率（巡回速度に対して）
    pub search_speed_factor: f64,

    /// 視認距離（m）
    pub view_radius_m: f64,
    /// 視野角（度、全角）
    pub view_angle_deg: f64,
    /// 聴覚範囲（m）
    pub hearing_range_m: f64,
    /// 探知レート（生信号に対する倍率、1/s）
    pub detection_rate: f64,
    /// 聴覚探知が反応する最小騒音レベル
    pub noise_floor: f64,
    /// 視覚による寄与の重み
    pub visual_weight: f64,
    /// 聴覚による寄与の重み
    pub aural_weight: f64,

    /// 巡回・帰還中の疑念減衰レート（1/s）
    pub decay_rate: f64,
    /// 調査・捜索中の疑念減衰レート（1/s）
    pub lingering_decay_rate: f64,
    /// 調査を開始する疑念レベル
    pub investigate_threshold: f64,
    /// 完全探知とみなす疑念レベル
    pub detection_threshold: f64,
    /// 調査後に諦めて帰還する疑念レベル（これ未満で帰還）
    pub give_up_threshold: f64,

    /// 巡回ポイントでの待機時間（秒）
    pub waypoint_wait_s: f64,
    /// 調査地点での待機時間（秒）
    pub investigation_wait_s: f64,
    /// 追跡タイマー（秒）
    pub chase_duration_s: f64,
    /// 視線を失ってから捜索に移るまでの猶予（秒）
    pub lost_sight_grace_s: f64,
    /// 捜索時間（秒）
    pub search_duration_s: f64,
    /// 捜索地点のサンプリング半径（m）
    pub search_radius_m: f64,
    /// 1ティックあたりの捜索地点サンプリング試行回数
    pub search_sample_attempts: u32,

    /// 捕獲距離（m）
    pub catch_distance_m: f64,
    /// 巡回ポイント到着判定距離（m）
    pub waypoint_tolerance_m: f64,
    /// その他の目的地の到着判定距離（m）
    pub arrival_tolerance_m: f64,
}

impl Default for GuardProfile {
    fn default() -> Self {
        Self {
            patrol_speed_mps: 2.0,
            chase_speed_mps: 6.0,
            investigate_speed_factor: 1.5,
            search_speed_factor: 1.2,
            view_radius_m: 10.0,
            view_angle_deg: 90.0,
            hearing_range_m: 8.0,
            detection_rate: 0.5,
            noise_floor: 0.3,
            visual_weight: 1.0,
            aural_weight: 0.5,
            decay_rate: 0.5,
            lingering_decay_rate: 0.1,
            investigate_threshold: 0.5,
            detection_threshold: 1.0,
            give_up_threshold: 0.3,
            waypoint_wait_s: 2.0,
            investigation_wait_s: 4.0,
            chase_duration_s: 5.0,
            lost_sight_grace_s: 3.0,
            search_duration_s: 10.0,
            search_radius_m: 5.0,
            search_sample_attempts: 5,
            catch_distance_m: 1.5,
            waypoint_tolerance_m: 0.5,
            arrival_tolerance_m: 1.0,
        }
    }
}

impl GuardProfile {
    /// 調査時の移動速度
    pub fn investigate_speed(&self) -> f64 {
        self.patrol_speed_mps * self.investigate_speed_factor
    }

    /// 捜索時の移動速度
    pub fn search_speed(&self) -> f64 {
        self.patrol_speed_mps * self.search_speed_factor
    }

    /// パラメータの整合性チェック
    ///
    /// # 戻り値
    ///
    /// 問題がない場合はOk(())、問題がある場合は説明文字列
    pub fn validate(&self) -> Result<(), String> {
        if self.view_angle_deg <= 0.0 || self.view_angle_deg > 360.0 {
            return Err(format!("view_angle_deg must be in (0, 360], got {}", self.view_angle_deg));
        }
        if self.view_radius_m < 0.0 || self.hearing_range_m < 0.0 {
            return Err("sensing ranges must be non-negative".to_string());
        }
        if self.detection_rate < 0.0 || self.decay_rate < 0.0 || self.lingering_decay_rate < 0.0 {
            return Err("rates must be non-negative".to_string());
        }
        if self.visual_weight < 0.0 || self.aural_weight < 0.0 {
            return Err("sensor weights must be non-negative".to_string());
        }
        if !(self.give_up_threshold < self.investigate_threshold
            && self.investigate_threshold <= self.detection_threshold
            && self.detection_threshold <= 1.0)
        {
            return Err(format!(
                "thresholds must satisfy give_up < investigate <= detection <= 1.0 ({} / {} / {})",
                self.give_up_threshold, self.investigate_threshold, self.detection_threshold
            ));
        }
        if self.patrol_speed_mps <= 0.0 || self.chase_speed_mps <= 0.0 {
            return Err("speeds must be positive".to_string());
        }
        if self.search_duration_s <= 0.0 || self.chase_duration_s <= 0.0 {
            return Err("chase and search durations must be positive".to_string());
        }
        Ok(())
    }
}
