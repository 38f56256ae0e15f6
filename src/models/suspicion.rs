//! # Suspicion モジュール
//!
//! センサーの生信号を 0〜1 の疑念レベルに積分する探知アキュムレーターです。
//! 上昇は `信号 × 探知レート × Δt`、減衰は探知レートに依存しない一定レートで
//! 線形に行われ、信号のあったティックで到達している閾値を返します。

use crate::models::profile::GuardProfile;

/// 浮動小数点の積算誤差を吸収する許容幅
const LEVEL_EPSILON: f64 = 1e-9;

/// 信号のあったティックで疑念レベルが到達している閾値
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionTrigger {
    /// 調査閾値（既定0.5）に達した
    Investigate,
    /// 完全探知閾値（既定1.0）に達した
    Detected,
}

/// 減衰モード
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayMode {
    /// 減衰しない（追跡中）
    Hold,
    /// 通常の減衰（巡回・帰還中）
    Normal,
    /// 緩やかな減衰（調査・捜索中）
    Lingering,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionAccumulator {
    level: f64,
    detection_rate: f64,
    decay_rate: f64,
    lingering_decay_rate: f64,
    investigate_threshold: f64,
    detection_threshold: f64,
}

impl DetectionAccumulator {
    pub fn from_profile(profile: &GuardProfile) -> Self {
        Self {
            level: 0.0,
            detection_rate: profile.detection_rate,
            decay_rate: profile.decay_rate,
            lingering_decay_rate: profile.lingering_decay_rate,
            investigate_threshold: profile.investigate_threshold,
            detection_threshold: profile.detection_threshold,
        }
    }

    /// 現在の疑念レベル（常に0〜1）
    pub fn level(&self) -> f64 {
        self.level
    }

    /// 1ティック分の積分
    ///
    /// 信号がある場合は上昇、ない場合は `decay` に従って減衰します。
    /// 信号があったティックに限り、到達している閾値（高い方を優先）を返します。
    /// 減衰だけのティックでは閾値判定を行いません。
    ///
    /// # 引数
    ///
    /// * `raw_signal` - センサーの生信号（非負）
    /// * `dt` - 時間刻み（秒）
    /// * `decay` - 信号がない場合の減衰モード
    pub fn integrate(
        &mut self,
        raw_signal: f64,
        dt: f64,
        decay: DecayMode,
    ) -> Option<DetectionTrigger> {
        if raw_signal <= 0.0 {
            let rate = match decay {
                DecayMode::Hold => 0.0,
                DecayMode::Normal => self.decay_rate,
                DecayMode::Lingering => self.lingering_decay_rate,
            };
            self.level = (self.level - rate * dt).max(0.0);
            return None;
        }

        self.level = (self.level + raw_signal * self.detection_rate * dt).clamp(0.0, 1.0);
        if self.level > 1.0 - LEVEL_EPSILON {
            self.level = 1.0;
        }

        if self.is_detected() {
            Some(DetectionTrigger::Detected)
        } else if self.is_suspicious() {
            Some(DetectionTrigger::Investigate)
        } else {
            None
        }
    }

    /// 完全探知閾値以上か
    pub fn is_detected(&self) -> bool {
        self.level + LEVEL_EPSILON >= self.detection_threshold
    }

    /// 調査閾値以上か
    pub fn is_suspicious(&self) -> bool {
        self.level + LEVEL_EPSILON >= self.investigate_threshold
    }

    /// 疑念レベルを0に戻す
    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    /// 疑念レベルを直接設定（0〜1にクランプ）
    #[cfg(test)]
    pub(crate) fn set_level(&mut self, level: f64) {
        self.level = level.clamp(0.0, 1.0);
    }
}
