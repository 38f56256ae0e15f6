//! # World モジュール
//!
//! 空間クエリと経路追従の参照実装です。
//!
//! - `ObstacleMap`: 矩形の領域と軸平行な直方体の障害物からなる簡易マップ
//! - `StraightLineMover`: 目的地へ直線的に移動する経路追従
//!
//! 本格的なナビメッシュや物理エンジンの代わりに、シミュレーション実行と
//! テストで使用します。

use crate::models::{
    common::Position3D,
    traits::{IPathFollower, ISpatialQuery, PathQuery},
};

/// 軸平行な直方体の障害物
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub min: Position3D,
    pub max: Position3D,
}

impl Obstacle {
    /// 2つの頂点から障害物を作成（座標の大小は自動で並べ替え）
    pub fn new(a: Position3D, b: Position3D) -> Self {
        Self {
            min: Position3D::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Position3D::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, point: Position3D) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// 線分 `from`→`to` が直方体と交差するか（スラブ法）
    ///
    /// 面や角に接するだけの線分も交差とみなします。
    pub fn intersects_segment(&self, from: Position3D, to: Position3D) -> bool {
        let delta = to - from;
        let mut t_enter: f64 = 0.0;
        let mut t_exit: f64 = 1.0;

        let axes = [
            (from.x, delta.x, self.min.x, self.max.x),
            (from.y, delta.y, self.min.y, self.max.y),
            (from.z, delta.z, self.min.z, self.max.z),
        ];

        for (origin, direction, low, high) in axes {
            if direction.abs() < 1e-12 {
                if origin < low || origin > high {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / direction;
            let mut t1 = (low - origin) * inv;
            let mut t2 = (high - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_enter = t_enter.max(t1);
            t_exit = t_exit.min(t2);
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}

/// 矩形領域＋障害物の簡易マップ
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleMap {
    /// 領域（XY）の最小座標
    pub min: Position3D,
    /// 領域（XY）の最大座標
    pub max: Position3D,
    pub obstacles: Vec<Obstacle>,
}

impl ObstacleMap {
    /// 領域を指定してマップを作成
    ///
    /// # 引数
    ///
    /// * `x_min`, `y_min`, `x_max`, `y_max` - 領域の矩形 [m]
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            min: Position3D::new(x_min, y_min, 0.0),
            max: Position3D::new(x_max, y_max, 0.0),
            obstacles: Vec::new(),
        }
    }

    /// 原点中心、障害物なしの正方形マップ
    pub fn open(half_extent: f64) -> Self {
        Self::new(-half_extent, -half_extent, half_extent, half_extent)
    }

    /// 障害物を追加したマップを返す
    pub fn with_obstacle(mut self, a: Position3D, b: Position3D) -> Self {
        self.add_obstacle(a, b);
        self
    }

    pub fn add_obstacle(&mut self, a: Position3D, b: Position3D) {
        self.obstacles.push(Obstacle::new(a, b));
    }

    /// 点が領域内（XY、境界含む）にあるか
    pub fn in_bounds(&self, point: Position3D) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// 点がいずれかの障害物の内部にあるか
    pub fn is_blocked(&self, point: Position3D) -> bool {
        self.obstacles.iter().any(|obstacle| obstacle.contains(point))
    }
}

impl ISpatialQuery for ObstacleMap {
    fn has_line_of_sight(&self, from: Position3D, to: Position3D) -> bool {
        !self
            .obstacles
            .iter()
            .any(|obstacle| obstacle.intersects_segment(from, to))
    }

    fn distance(&self, a: Position3D, b: Position3D) -> f64 {
        a.distance_3d(&b)
    }

    fn is_within_cone(
        &self,
        origin: Position3D,
        forward: Position3D,
        point: Position3D,
        angle_deg: f64,
        radius: f64,
    ) -> bool {
        let to_point = point - origin;
        let distance = to_point.magnitude();
        if distance > radius {
            return false;
        }
        if distance <= f64::EPSILON {
            return true;
        }
        forward.angle_between_deg(&to_point) <= angle_deg / 2.0
    }

    fn try_find_path(&self, from: Position3D, destination: Position3D) -> PathQuery {
        if !self.in_bounds(destination) || self.is_blocked(destination) {
            return PathQuery::unreachable();
        }
        if self.has_line_of_sight(from, destination) {
            PathQuery::complete()
        } else {
            PathQuery {
                reachable: true,
                partial: true,
            }
        }
    }
}

/// 目的地へ直線的に移動する経路追従
#[derive(Debug, Clone, PartialEq)]
pub struct StraightLineMover {
    position: Position3D,
    forward: Position3D,
    destination: Option<Position3D>,
    speed: f64,
    pending: bool,
}

impl StraightLineMover {
    /// # 引数
    ///
    /// * `position` - 初期位置
    /// * `heading_deg` - 初期方位（度、+X軸から反時計回り）
    pub fn new(position: Position3D, heading_deg: f64) -> Self {
        Self {
            position,
            forward: Position3D::from_heading_deg(heading_deg),
            destination: None,
            speed: 0.0,
            pending: false,
        }
    }

    pub fn destination(&self) -> Option<Position3D> {
        self.destination
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// 向きを変更
    pub fn face(&mut self, direction: Position3D) {
        if direction.magnitude() > f64::EPSILON {
            self.forward = direction.normalize();
        }
    }

    /// 1ティック分移動
    ///
    /// 経路計算中フラグを解除し、目的地へ `speed × dt` だけ進みます。
    pub fn advance(&mut self, dt: f64) {
        self.pending = false;
        let Some(destination) = self.destination else {
            return;
        };
        let direction = destination - self.position;
        if direction.magnitude() <= f64::EPSILON {
            return;
        }
        self.face(direction);
        self.position = self.position.move_towards(&destination, self.speed * dt);
    }
}

impl IPathFollower for StraightLineMover {
    fn set_destination(&mut self, destination: Position3D, speed: f64) {
        self.destination = Some(destination);
        self.speed = speed.max(0.0);
        self.pending = true;
    }

    fn remaining_distance(&self) -> f64 {
        self.destination
            .map(|destination| self.position.distance_3d(&destination))
            .unwrap_or(0.0)
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn position(&self) -> Position3D {
        self.position
    }

    fn forward(&self) -> Position3D {
        self.forward
    }
}
