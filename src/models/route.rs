use serde::{Deserialize, Serialize};

use crate::models::common::Position3D;

/// 巡回ルートの終端での振る舞い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMode {
    /// 最後の地点の次は最初の地点に戻る
    #[default]
    Loop,
    /// 終端で折り返す
    PingPong,
    /// 最後の地点で停止する
    Once,
}

/// 巡回ルート
///
/// 順序付きの巡回ポイントと現在のインデックス・進行方向を保持します。
#[derive(Debug, Clone, PartialEq)]
pub struct PatrolRoute {
    waypoints: Vec<Position3D>,
    mode: RouteMode,
    current_index: usize,
    reversing: bool,
    finished: bool,
}

impl PatrolRoute {
    pub fn new(waypoints: Vec<Position3D>, mode: RouteMode) -> Self {
        Self {
            waypoints,
            mode,
            current_index: 0,
            reversing: false,
            finished: false,
        }
    }

    /// 巡回ポイントのないルート
    pub fn empty() -> Self {
        Self::new(Vec::new(), RouteMode::Loop)
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn mode(&self) -> RouteMode {
        self.mode
    }

    pub fn waypoints(&self) -> &[Position3D] {
        &self.waypoints
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// 一方通行ルートの終端に到達済みか
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 現在目指している巡回ポイント
    pub fn current_waypoint(&self) -> Option<Position3D> {
        self.waypoints.get(self.current_index).copied()
    }

    /// 次の巡回ポイントに進む
    ///
    /// # 戻り値
    ///
    /// 新しいインデックス。一方通行ルートの終端では現在位置に留まり None
    pub fn advance(&mut self) -> Option<usize> {
        let count = self.waypoints.len();
        if count == 0 || self.finished {
            return None;
        }
        if count == 1 {
            if self.mode == RouteMode::Once {
                self.finished = true;
                return None;
            }
            return Some(0);
        }

        let next = if self.reversing {
            if self.current_index == 0 {
                self.reversing = false;
                1
            } else {
                self.current_index - 1
            }
        } else if self.current_index + 1 >= count {
            match self.mode {
                RouteMode::Loop => 0,
                RouteMode::PingPong => {
                    self.reversing = true;
                    count - 2
                }
                RouteMode::Once => {
                    self.finished = true;
                    return None;
                }
            }
        } else {
            self.current_index + 1
        };

        self.current_index = next;
        Some(next)
    }

    /// 指定位置に最も近い巡回ポイントのインデックス
    pub fn nearest_index(&self, position: Position3D) -> Option<usize> {
        self.waypoints
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_3d(&position)
                    .partial_cmp(&b.distance_3d(&position))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, _)| index)
    }

    /// 指定インデックスから巡回を再開する
    ///
    /// 一方通行ルートで終端以外から再開する場合は終了状態を解除します。
    pub fn resume_from(&mut self, index: usize) {
        if self.waypoints.is_empty() {
            return;
        }
        self.current_index = index.min(self.waypoints.len() - 1);
        if self.current_index + 1 < self.waypoints.len() {
            self.finished = false;
        }
    }
}
