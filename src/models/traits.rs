use std::fmt::Debug;

use crate::models::common::*;
use crate::models::guard::GuardState;

/// 経路探索の結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathQuery {
    /// 目的地に到達可能か
    pub reachable: bool,
    /// 経路が部分的（目的地手前で途切れる）か
    pub partial: bool,
}

impl PathQuery {
    pub fn complete() -> Self {
        Self { reachable: true, partial: false }
    }

    pub fn unreachable() -> Self {
        Self { reachable: false, partial: false }
    }

    /// 経路が完全に使用可能かどうか
    pub fn is_usable(&self) -> bool {
        self.reachable && !self.partial
    }
}

/// 空間クエリサービスのインターフェース（外部協力者）
///
/// 視線判定、距離、視野コーン判定、経路可否を同期的に返します。
/// 副作用は持ちません。
pub trait ISpatialQuery {
    /// 2点間に遮蔽物のない視線が通っているか
    fn has_line_of_sight(&self, from: Position3D, to: Position3D) -> bool;

    /// 2点間の距離
    fn distance(&self, a: Position3D, b: Position3D) -> f64;

    /// `point` が `origin` から `forward` 方向の視野コーン
    /// （全角 `angle_deg`、半径 `radius`）内にあるか
    fn is_within_cone(
        &self,
        origin: Position3D,
        forward: Position3D,
        point: Position3D,
        angle_deg: f64,
        radius: f64,
    ) -> bool;

    /// `from` から `destination` への経路を試算
    fn try_find_path(&self, from: Position3D, destination: Position3D) -> PathQuery;
}

/// 経路追従（移動実行）のインターフェース（外部協力者）
///
/// コアは目的地と速度を設定し、残距離と計算中フラグを読むだけです。
/// 移動そのものは実装側の責務です。
pub trait IPathFollower: Debug {
    /// 目的地と希望速度を設定
    fn set_destination(&mut self, destination: Position3D, speed: f64);

    /// 目的地までの残距離
    fn remaining_distance(&self) -> f64;

    /// 経路計算中かどうか
    fn is_pending(&self) -> bool;

    /// 現在位置
    fn position(&self) -> Position3D;

    /// 現在の正面方向
    fn forward(&self) -> Position3D;
}

/// 探知対象（プレイヤーなど）のインターフェース
pub trait IDetectable {
    /// 現在位置
    fn position(&self) -> Position3D;

    /// 視認されやすさ（0〜1程度、しゃがみ中は低い）
    fn visibility_level(&self) -> f64;

    /// 発している騒音（0〜1程度）
    fn noise_level(&self) -> f64;
}

/// ゲームループ管理（外部協力者）への通知インターフェース
pub trait IGameLoop {
    /// 警備員がプレイヤーを捕まえた
    fn on_player_caught(&mut self, guard_id: &str, position: Position3D);
}

/// 警報（カメラ、投擲物の音など）に反応するエージェント
pub trait IAlarmResponder {
    /// 指定位置の調査に向かう
    ///
    /// # 戻り値
    ///
    /// 反応した場合はtrue、より優先度の高い状態のため無視した場合はfalse
    fn respond_to_alarm(&mut self, position: Position3D) -> bool;

    /// 反応判定に使う現在位置
    fn responder_position(&self) -> Position3D;
}

/// 警報コーディネーターからの通知を受け取るエージェント
pub trait IAlertListener {
    /// 半径判定に使う現在位置
    fn listener_position(&self) -> Position3D;

    /// 現在の状態
    fn current_state(&self) -> GuardState;

    /// 他のエージェントが発した警報を受信
    fn on_alert_received(&mut self, position: Position3D);

    /// 警報中のプレイヤー位置更新を受信
    fn on_player_position_updated(&mut self, position: Position3D);

    /// 全体警報の終了を受信
    fn on_alert_ended(&mut self);
}
