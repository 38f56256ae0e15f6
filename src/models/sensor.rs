use crate::models::{
    common::Position3D,
    profile::GuardProfile,
    traits::{IDetectable, ISpatialQuery},
};

/// 警備員の感覚センサー
///
/// 視野コーン＋視線による視覚チャンネルと、聴覚範囲による聴覚チャンネルで
/// 探知対象を評価し、ティックごとの生の探知信号を算出します。
#[derive(Debug, Clone)]
pub struct Sensor {
    /// 視認距離（m）
    pub view_radius: f64,
    /// 視野角（度、全角）
    pub view_angle_deg: f64,
    /// 聴覚範囲（m）
    pub hearing_range: f64,
    /// 聴覚が反応する最小騒音レベル
    pub noise_floor: f64,
    /// 視覚寄与の重み
    pub visual_weight: f64,
    /// 聴覚寄与の重み
    pub aural_weight: f64,
}

/// 1対象に対する1ティック分の評価結果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Contribution {
    /// 視覚による寄与
    pub visual: f64,
    /// 聴覚による寄与
    pub aural: f64,
}

impl Contribution {
    pub fn total(&self) -> f64 {
        self.visual + self.aural
    }
}

/// センサーの1ティック分の出力
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// 生の探知信号（非負）
    pub signal: f64,
    /// 視覚チャンネルが反応したか
    pub seen: bool,
    /// 最も強く寄与した対象の位置（信号がある場合のみ）
    pub last_known_position: Option<Position3D>,
}

impl Sensor {
    /// 警備員パラメータからセンサーを作成
    pub fn from_profile(profile: &GuardProfile) -> Self {
        Self {
            view_radius: profile.view_radius_m,
            view_angle_deg: profile.view_angle_deg,
            hearing_range: profile.hearing_range_m,
            noise_floor: profile.noise_floor,
            visual_weight: profile.visual_weight,
            aural_weight: profile.aural_weight,
        }
    }

    /// 1つの対象に対する寄与を評価（状態は変更しない）
    ///
    /// # 引数
    ///
    /// * `origin` - センサー位置
    /// * `forward` - センサーの正面方向
    /// * `target` - 評価対象
    /// * `spatial` - 空間クエリサービス
    pub fn evaluate(
        &self,
        origin: Position3D,
        forward: Position3D,
        target: &dyn IDetectable,
        spatial: &dyn ISpatialQuery,
    ) -> Contribution {
        let target_position = target.position();
        let distance = spatial.distance(origin, target_position);
        let mut contribution = Contribution::default();

        // 視覚: 距離 → 視野角 → 視線の順に判定
        if distance <= self.view_radius
            && spatial.is_within_cone(
                origin,
                forward,
                target_position,
                self.view_angle_deg,
                self.view_radius,
            )
            && spatial.has_line_of_sight(origin, target_position)
        {
            contribution.visual = (target.visibility_level() * self.visual_weight).max(0.0);
        }

        // 聴覚
        let noise = target.noise_level();
        if distance <= self.hearing_range && noise > self.noise_floor {
            contribution.aural = (noise * self.aural_weight).max(0.0);
        }

        contribution
    }

    /// 対象群を感知して生の探知信号を算出
    ///
    /// 対象が空の場合は信号0を返します（エラーではありません）。
    ///
    /// # 引数
    ///
    /// * `origin` - センサー位置
    /// * `forward` - センサーの正面方向
    /// * `targets` - 感知対象のスライス
    /// * `spatial` - 空間クエリサービス
    ///
    /// # 戻り値
    ///
    /// 合計信号と最も強い寄与元の位置
    pub fn sense(
        &self,
        origin: Position3D,
        forward: Position3D,
        targets: &[&dyn IDetectable],
        spatial: &dyn ISpatialQuery,
    ) -> SensorReading {
        let mut reading = SensorReading::default();
        let mut strongest = 0.0;

        for target in targets {
            let contribution = self.evaluate(origin, forward, *target, spatial);
            let total = contribution.total();
            if total <= 0.0 {
                continue;
            }

            reading.signal += total;
            reading.seen |= contribution.visual > 0.0;
            if total > strongest {
                strongest = total;
                reading.last_known_position = Some(target.position());
            }
        }

        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObstacleMap;

    struct StaticTarget {
        position: Position3D,
        visibility: f64,
        noise: f64,
    }

    impl IDetectable for StaticTarget {
        fn position(&self) -> Position3D {
            self.position
        }
        fn visibility_level(&self) -> f64 {
            self.visibility
        }
        fn noise_level(&self) -> f64 {
            self.noise
        }
    }

    fn sensor() -> Sensor {
        Sensor::from_profile(&GuardProfile::default())
    }

    fn target_at(x: f64, y: f64, visibility: f64, noise: f64) -> StaticTarget {
        StaticTarget {
            position: Position3D::new(x, y, 0.0),
            visibility,
            noise,
        }
    }

    #[test]
    fn test_visual_contribution_in_cone() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let target = target_at(5.0, 0.0, 0.8, 0.0);
        let reading = sensor.sense(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &[&target],
            &map,
        );
        assert!((reading.signal - 0.8).abs() < 1e-9);
        assert!(reading.seen);
        assert_eq!(reading.last_known_position, Some(target.position));
    }

    #[test]
    fn test_behind_guard_is_only_heard() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let target = target_at(-5.0, 0.0, 1.0, 0.8);
        let reading = sensor.sense(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &[&target],
            &map,
        );
        assert!(!reading.seen);
        assert!((reading.signal - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_both_channels_add() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let target = target_at(4.0, 0.0, 1.0, 0.6);
        let reading = sensor.sense(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &[&target],
            &map,
        );
        assert!((reading.signal - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_noise_at_floor_is_ignored() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let target = target_at(-2.0, 0.0, 1.0, 0.3);
        let contribution = sensor.evaluate(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &target,
            &map,
        );
        assert_eq!(contribution.total(), 0.0);
    }

    #[test]
    fn test_no_targets_is_zero_signal() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let reading = sensor.sense(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &[],
            &map,
        );
        assert_eq!(reading, SensorReading::default());
    }

    #[test]
    fn test_view_radius_boundary() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let forward = Position3D::from_heading_deg(0.0);

        let at_edge = target_at(10.0, 0.0, 1.0, 0.0);
        let just_outside = target_at(10.0 + 1e-6, 0.0, 1.0, 0.0);
        let just_inside = target_at(10.0 - 1e-6, 0.0, 1.0, 0.0);

        assert!(sensor.evaluate(Position3D::zero(), forward, &just_inside, &map).visual > 0.0);
        assert!(sensor.evaluate(Position3D::zero(), forward, &at_edge, &map).visual > 0.0);
        assert_eq!(sensor.evaluate(Position3D::zero(), forward, &just_outside, &map).visual, 0.0);
    }

    #[test]
    fn test_view_angle_boundary() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let forward = Position3D::from_heading_deg(0.0);
        let visual_at = |heading: f64| {
            let dir = Position3D::from_heading_deg(heading) * 5.0;
            let target = target_at(dir.x, dir.y, 1.0, 0.0);
            sensor.evaluate(Position3D::zero(), forward, &target, &map).visual
        };

        assert!(visual_at(44.999) > 0.0);
        assert_eq!(visual_at(45.001), 0.0);
        assert!(visual_at(-44.999) > 0.0);
        assert_eq!(visual_at(-45.001), 0.0);
    }

    #[test]
    fn test_obstacle_blocks_sight_but_not_hearing() {
        let map = ObstacleMap::open(100.0).with_obstacle(
            Position3D::new(2.0, -1.0, 0.0),
            Position3D::new(3.0, 1.0, 3.0),
        );
        let sensor = sensor();
        let target = target_at(5.0, 0.0, 1.0, 0.8);
        let contribution = sensor.evaluate(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &target,
            &map,
        );
        assert_eq!(contribution.visual, 0.0);
        assert!((contribution.aural - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_targets_sum_and_keep_strongest_position() {
        let map = ObstacleMap::open(100.0);
        let sensor = sensor();
        let faint = target_at(6.0, 0.0, 0.3, 0.0);
        let bright = target_at(3.0, 1.0, 0.9, 0.0);
        let reading = sensor.sense(
            Position3D::zero(),
            Position3D::from_heading_deg(0.0),
            &[&faint, &bright],
            &map,
        );
        assert!((reading.signal - 1.2).abs() < 1e-9);
        assert_eq!(reading.last_known_position, Some(bright.position));
    }
}
