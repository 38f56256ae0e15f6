//! # Alert モジュール
//!
//! 全体警報を管理するコーディネーターを提供します。
//!
//! 生存中の警備員IDを登録簿として保持し、警報の発令・位置更新・カウントダウン・
//! 終了を一元的に扱います。警備員への通知は所有者から渡されたリスナー群に対して
//! 同期的に行い、コーディネーター自身は警備員への参照を保持しません。

use std::collections::BTreeMap;

use tracing::{debug, info, trace};

use crate::models::{common::Position3D, guard::GuardState, traits::IAlertListener};

/// 警報コーディネーターの設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertConfig {
    /// 警報を伝播する半径（m）
    pub alert_radius: f64,
    /// 警報の持続時間（秒、正の値）
    pub alert_duration: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_radius: 30.0,
            alert_duration: 30.0,
        }
    }
}

/// コーディネーターが発する通知
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertEvent {
    /// 警報が発令された（非警報状態からの立ち上がり時のみ）
    PlayerDetected { position: Position3D },
    /// 警報が終了した
    AlertEnded,
}

/// 警備員に渡す警報状態のスナップショット
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlertView {
    pub is_alerted: bool,
    pub last_known_position: Option<Position3D>,
    pub time_remaining: f64,
}

/// 全体警報コーディネーター
#[derive(Debug, Clone)]
pub struct AlertCoordinator {
    config: AlertConfig,
    registry: Vec<String>,
    is_alerted: bool,
    last_known_position: Option<Position3D>,
    time_remaining: f64,
    events: Vec<AlertEvent>,
}

impl AlertCoordinator {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            registry: Vec::new(),
            is_alerted: false,
            last_known_position: None,
            time_remaining: 0.0,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> AlertConfig {
        self.config
    }

    /// 警備員を登録（登録済みの場合は何もしない）
    ///
    /// # 戻り値
    ///
    /// 新たに登録した場合はtrue
    pub fn register(&mut self, guard_id: &str) -> bool {
        if self.is_registered(guard_id) {
            return false;
        }
        self.registry.push(guard_id.to_string());
        debug!(guard = guard_id, count = self.registry.len(), "警備員を登録");
        true
    }

    /// 警備員の登録を解除（未登録の場合は何もしない）
    pub fn unregister(&mut self, guard_id: &str) -> bool {
        let before = self.registry.len();
        self.registry.retain(|id| id != guard_id);
        let removed = self.registry.len() != before;
        if removed {
            debug!(guard = guard_id, count = self.registry.len(), "警備員の登録を解除");
        }
        removed
    }

    pub fn is_registered(&self, guard_id: &str) -> bool {
        self.registry.iter().any(|id| id == guard_id)
    }

    /// 登録順の警備員ID
    pub fn registered_ids(&self) -> &[String] {
        &self.registry
    }

    pub fn is_alerted(&self) -> bool {
        self.is_alerted
    }

    pub fn last_known_position(&self) -> Option<Position3D> {
        self.last_known_position
    }

    pub fn time_remaining(&self) -> f64 {
        self.time_remaining
    }

    pub fn view(&self) -> AlertView {
        AlertView {
            is_alerted: self.is_alerted,
            last_known_position: self.last_known_position,
            time_remaining: self.time_remaining,
        }
    }

    /// 警報を発令
    ///
    /// 警報状態・最終確認位置・残り時間を更新し、非警報状態からの立ち上がり時のみ
    /// `PlayerDetected` を記録します。発令元を除く、半径内の登録済み警備員に
    /// 毎回警報を伝播します。
    ///
    /// # 引数
    ///
    /// * `position` - プレイヤーの位置
    /// * `reporting_id` - 発令元の警備員ID（外部要因の場合はNone）
    /// * `listeners` - 警備員IDをキーとするリスナー群
    pub fn trigger_alert<L: IAlertListener>(
        &mut self,
        position: Position3D,
        reporting_id: Option<&str>,
        listeners: &mut BTreeMap<String, L>,
    ) {
        let rising = !self.is_alerted;
        self.is_alerted = true;
        self.last_known_position = Some(position);
        self.time_remaining = self.config.alert_duration;

        if rising {
            info!(
                reporter = reporting_id.unwrap_or("-"),
                x = position.x,
                y = position.y,
                "警報発令"
            );
            self.events.push(AlertEvent::PlayerDetected { position });
        }

        for id in &self.registry {
            if Some(id.as_str()) == reporting_id {
                continue;
            }
            let Some(listener) = listeners.get_mut(id) else {
                continue;
            };
            if listener.listener_position().distance_3d(&position) <= self.config.alert_radius {
                debug!(guard = %id, "警報を伝播");
                listener.on_alert_received(position);
            }
        }
    }

    /// 警報中のプレイヤー位置を更新
    ///
    /// 警報中でなければ何もしません。追跡中の登録済み警備員に位置を転送します。
    pub fn update_player_position<L: IAlertListener>(
        &mut self,
        position: Position3D,
        listeners: &mut BTreeMap<String, L>,
    ) {
        if !self.is_alerted {
            return;
        }
        self.last_known_position = Some(position);
        self.time_remaining = self.config.alert_duration;

        for id in &self.registry {
            if let Some(listener) = listeners.get_mut(id) {
                if listener.current_state() == GuardState::Chasing {
                    listener.on_player_position_updated(position);
                }
            }
        }
    }

    /// 警報のカウントダウンを進める
    ///
    /// 残り時間が0になった時点で警報を解除し、`AlertEnded` を一度だけ記録して
    /// 全登録済み警備員に終了を通知します。
    pub fn tick<L: IAlertListener>(&mut self, dt: f64, listeners: &mut BTreeMap<String, L>) {
        if !self.is_alerted {
            return;
        }

        self.time_remaining -= dt;
        trace!(remaining = self.time_remaining, "警報カウントダウン");
        if self.time_remaining > 0.0 {
            return;
        }

        self.time_remaining = 0.0;
        self.is_alerted = false;
        info!("警報終了");
        self.events.push(AlertEvent::AlertEnded);

        for id in &self.registry {
            if let Some(listener) = listeners.get_mut(id) {
                listener.on_alert_ended();
            }
        }
    }

    /// 記録された通知を取り出す
    pub fn drain_events(&mut self) -> Vec<AlertEvent> {
        std::mem::take(&mut self.events)
    }
}
