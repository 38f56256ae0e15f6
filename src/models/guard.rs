//! # Guard モジュール
//!
//! 警備員エージェントの状態機械を提供します。
//!
//! 警備員は毎ティック、センサーで探知対象を評価し、疑念レベルを積分し、
//! 現在の状態に応じた行動（目的地の設定）を行います。移動そのものは
//! 外部の経路追従 (`IPathFollower`) が担当し、ここでは「どこへ向かうか」と
//! 「どの状態にあるか」だけを決定します。
//!
//! ## 状態遷移
//!
//! ```text
//! Patrolling → Investigating → Chasing → Searching → Returning → Patrolling
//!                    └──────────────→ Searching / Returning
//! ```
//!
//! - 巡回中に疑念が調査閾値に達すると調査へ
//! - どの状態でも（追跡中を除く）疑念が完全探知閾値に達すると追跡へ
//! - 到達不能な目的地では停止せず、次の候補（次の巡回ポイント、捜索、自位置）に進む

use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::models::{
    alert::AlertView,
    common::Position3D,
    profile::GuardProfile,
    route::PatrolRoute,
    sensor::{Sensor, SensorReading},
    suspicion::{DecayMode, DetectionAccumulator, DetectionTrigger},
    traits::{IAlarmResponder, IAlertListener, IDetectable, IPathFollower, ISpatialQuery},
};

/// 目的地の同一判定に使う距離（m）
const SAME_DESTINATION_EPSILON: f64 = 1e-6;

/// 警備員の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardState {
    /// 巡回中
    Patrolling,
    /// 不審な地点を調査中
    Investigating,
    /// 追跡中
    Chasing,
    /// 最後に確認した位置の周辺を捜索中
    Searching,
    /// 巡回ルートへ帰還中
    Returning,
}

impl GuardState {
    /// 外部からの警報に対する優先度（高いほど上書きされにくい）
    pub fn priority(&self) -> u8 {
        match self {
            GuardState::Patrolling | GuardState::Returning => 0,
            GuardState::Investigating => 1,
            GuardState::Searching => 2,
            GuardState::Chasing => 3,
        }
    }
}

/// 追跡状態に入った理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseReason {
    /// 自身の疑念レベルが完全探知閾値に達した
    Detected,
    /// 他のエージェントからの警報を受信した
    Alerted,
}

/// 警備員が1ティックの間に発するイベント
#[derive(Debug, Clone, PartialEq)]
pub enum GuardEvent {
    /// 状態が変化した
    StateChanged { from: GuardState, to: GuardState },
    /// 自身の探知でプレイヤーを完全に発見した（警報の発端）
    PlayerDetected { position: Position3D },
    /// 追跡中にプレイヤーを視認した（警報の位置更新用）
    TargetSighted { position: Position3D },
    /// プレイヤーを捕まえた
    PlayerCaught { position: Position3D },
}

/// 1ティック分の入力
pub struct GuardContext<'a> {
    /// 時間刻み（秒）
    pub dt: f64,
    /// 空間クエリサービス
    pub spatial: &'a dyn ISpatialQuery,
    /// 追跡対象（未設定の場合はNone）
    pub target: Option<&'a dyn IDetectable>,
    /// 全体警報の状態
    pub alert: AlertView,
}

/// 警備員エージェント
///
/// 状態機械・センサー・探知アキュムレーター・巡回ルートを1つにまとめたものです。
/// 移動実行は型パラメータ `M` の経路追従に委譲します。
#[derive(Debug, Clone)]
pub struct Guard<M: IPathFollower> {
    /// 警備員の一意識別子
    pub id: String,
    /// 調整パラメータ
    pub profile: GuardProfile,
    /// 経路追従（移動実行）
    pub mover: M,
    /// 感覚センサー
    pub sensor: Sensor,
    state: GuardState,
    chase_reason: Option<ChaseReason>,
    suspicion: DetectionAccumulator,
    last_known_target_position: Option<Position3D>,
    target_id: Option<String>,
    route: PatrolRoute,
    home_position: Position3D,

    /// 巡回ポイントでの残り待機時間（秒）
    waypoint_wait_remaining: f64,
    /// 調査地点での経過待機時間（秒）
    investigation_wait: f64,
    /// 追跡タイマーの残り時間（秒）
    chase_timer: f64,
    /// 視線を失ってからの経過時間（秒）
    lost_sight_timer: f64,
    /// 今回の追跡で自ら視認したことがあるか
    had_visual_contact: bool,
    /// 捜索の経過時間（秒）
    search_timer: f64,
    search_point: Option<Position3D>,
    /// 連続して到達不能だった巡回ポイントの数
    blocked_waypoints: usize,
    /// 巡回ポイントがすべて到達不能な場合の迂回地点
    detour_point: Option<Position3D>,

    current_destination: Option<Position3D>,
    current_speed: f64,
    rng: SmallRng,
    events: Vec<GuardEvent>,
}

impl<M: IPathFollower> Guard<M> {
    /// 新しい警備員を作成します
    ///
    /// 巡回ルートがある場合は現在位置に最も近い巡回ポイントから開始します。
    ///
    /// # 引数
    ///
    /// * `id` - 警備員の一意識別子
    /// * `mover` - 経路追従（初期位置・向きを保持している必要があります）
    /// * `profile` - 調整パラメータ
    /// * `route` - 巡回ルート
    /// * `seed` - 捜索地点サンプリング用の乱数シード
    pub fn new(
        id: String,
        mover: M,
        profile: GuardProfile,
        mut route: PatrolRoute,
        seed: u64,
    ) -> Self {
        let home_position = mover.position();
        if let Some(nearest) = route.nearest_index(home_position) {
            route.resume_from(nearest);
        }

        Self {
            id,
            sensor: Sensor::from_profile(&profile),
            suspicion: DetectionAccumulator::from_profile(&profile),
            profile,
            mover,
            state: GuardState::Patrolling,
            chase_reason: None,
            last_known_target_position: None,
            target_id: None,
            route,
            home_position,
            waypoint_wait_remaining: 0.0,
            investigation_wait: 0.0,
            chase_timer: 0.0,
            lost_sight_timer: 0.0,
            had_visual_contact: false,
            search_timer: 0.0,
            search_point: None,
            blocked_waypoints: 0,
            detour_point: None,
            current_destination: None,
            current_speed: 0.0,
            rng: SmallRng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    /// 追跡対象のIDを設定（Noneで解除）
    pub fn set_target(&mut self, target_id: Option<String>) {
        self.target_id = target_id;
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// 追跡中の場合、その理由
    pub fn chase_reason(&self) -> Option<ChaseReason> {
        self.chase_reason
    }

    /// 現在の疑念レベル（0〜1）
    pub fn suspicion(&self) -> f64 {
        self.suspicion.level()
    }

    pub fn last_known_target_position(&self) -> Option<Position3D> {
        self.last_known_target_position
    }

    pub fn route(&self) -> &PatrolRoute {
        &self.route
    }

    pub fn chase_timer(&self) -> f64 {
        self.chase_timer
    }

    pub fn current_destination(&self) -> Option<Position3D> {
        self.current_destination
    }

    pub fn position(&self) -> Position3D {
        self.mover.position()
    }

    /// 1ティック分の処理を実行
    ///
    /// センサー → 疑念の積分 → 状態ごとの行動 の順に処理し、
    /// このティックで発生したイベントを返します。
    pub fn tick(&mut self, ctx: &GuardContext<'_>) -> Vec<GuardEvent> {
        let origin = self.mover.position();
        let forward = self.mover.forward();
        let targets: Vec<&dyn IDetectable> = ctx.target.into_iter().collect();
        let reading = self
            .sensor
            .sense(origin, forward, &targets, ctx.spatial);

        if let Some(position) = reading.last_known_position {
            self.last_known_target_position = Some(position);
        }

        let decay = match self.state {
            GuardState::Patrolling | GuardState::Returning => DecayMode::Normal,
            GuardState::Investigating | GuardState::Searching => DecayMode::Lingering,
            GuardState::Chasing => DecayMode::Hold,
        };

        match self.suspicion.integrate(reading.signal, ctx.dt, decay) {
            Some(DetectionTrigger::Detected) if self.state != GuardState::Chasing => {
                let position = reading
                    .last_known_position
                    .or(self.last_known_target_position)
                    .unwrap_or(origin);
                info!(guard = %self.id, x = position.x, y = position.y, "プレイヤーを発見");
                self.events.push(GuardEvent::PlayerDetected { position });
                self.enter_chase(ChaseReason::Detected);
            }
            Some(DetectionTrigger::Investigate) if self.state == GuardState::Patrolling => {
                self.change_state(GuardState::Investigating);
            }
            _ => {}
        }

        match self.state {
            GuardState::Patrolling => self.patrol(ctx),
            GuardState::Investigating => self.investigate(ctx),
            GuardState::Chasing => self.chase(ctx, &reading),
            GuardState::Searching => self.search(ctx),
            GuardState::Returning => self.return_to_patrol(ctx),
        }

        std::mem::take(&mut self.events)
    }

    fn patrol(&mut self, ctx: &GuardContext<'_>) {
        let position = self.mover.position();

        let Some(waypoint) = self.route.current_waypoint() else {
            // 巡回ポイントがない場合は持ち場に立つ
            self.move_to(self.home_position, self.profile.patrol_speed_mps);
            return;
        };

        if self.route.is_finished() {
            return;
        }

        if self.waypoint_wait_remaining > 0.0 {
            self.waypoint_wait_remaining = (self.waypoint_wait_remaining - ctx.dt).max(0.0);
            return;
        }

        if let Some(detour) = self.detour_point {
            let changed = self.move_to(detour, self.profile.patrol_speed_mps);
            if !changed && self.has_arrived(self.profile.arrival_tolerance_m) {
                self.detour_point = None;
                self.blocked_waypoints = 0;
            }
            return;
        }

        if !ctx.spatial.try_find_path(position, waypoint).is_usable() {
            self.blocked_waypoints += 1;
            if self.blocked_waypoints >= self.route.len() {
                self.start_detour(ctx.spatial, position);
                return;
            }
            warn!(
                guard = %self.id,
                waypoint = self.route.current_index(),
                "巡回ポイントに到達できないため次のポイントへ"
            );
            self.route.advance();
            return;
        }
        self.blocked_waypoints = 0;

        let changed = self.move_to(waypoint, self.profile.patrol_speed_mps);
        if !changed && self.has_arrived(self.profile.waypoint_tolerance_m) {
            self.waypoint_wait_remaining = self.profile.waypoint_wait_s;
            if let Some(next) = self.route.advance() {
                debug!(guard = %self.id, next, "巡回ポイントに到着");
            }
        }
    }

    fn investigate(&mut self, ctx: &GuardContext<'_>) {
        let position = self.mover.position();
        let Some(point) = self.last_known_target_position else {
            self.change_state(GuardState::Returning);
            return;
        };

        let mut reached = ctx.spatial.distance(position, point) <= self.profile.arrival_tolerance_m;
        if !reached {
            if !ctx.spatial.try_find_path(position, point).is_usable() {
                warn!(guard = %self.id, "調査地点に到達できないため捜索へ");
                self.change_state(GuardState::Searching);
                return;
            }
            let changed = self.move_to(point, self.profile.investigate_speed());
            reached = !changed && self.has_arrived(self.profile.arrival_tolerance_m);
        }

        if !reached {
            self.investigation_wait = 0.0;
            return;
        }

        self.investigation_wait += ctx.dt;
        if self.investigation_wait >= self.profile.investigation_wait_s {
            if self.suspicion.level() < self.profile.give_up_threshold {
                self.change_state(GuardState::Returning);
            } else {
                self.change_state(GuardState::Searching);
            }
        }
    }

    fn chase(&mut self, ctx: &GuardContext<'_>, reading: &SensorReading) {
        let position = self.mover.position();
        let live_target = ctx.target.map(|target| target.position());

        if let Some(target_position) = live_target {
            if ctx.spatial.distance(position, target_position) <= self.profile.catch_distance_m {
                self.catch_target(target_position);
                return;
            }
        }

        let destination = match (reading.seen, live_target) {
            (true, Some(target_position)) => {
                self.lost_sight_timer = 0.0;
                self.had_visual_contact = true;
                self.chase_timer = self.profile.chase_duration_s;
                self.events.push(GuardEvent::TargetSighted { position: target_position });
                target_position
            }
            _ => {
                self.lost_sight_timer += ctx.dt;
                ctx.alert
                    .last_known_position
                    .filter(|_| ctx.alert.is_alerted)
                    .or(self.last_known_target_position)
                    .unwrap_or(position)
            }
        };

        self.chase_timer -= ctx.dt;

        if self.had_visual_contact && self.lost_sight_timer > self.profile.lost_sight_grace_s {
            info!(guard = %self.id, "視線を失ったため捜索へ");
            self.change_state(GuardState::Searching);
            return;
        }
        if self.chase_timer <= 0.0 {
            info!(guard = %self.id, "追跡タイマー切れのため捜索へ");
            self.change_state(GuardState::Searching);
            return;
        }
        if !ctx.spatial.try_find_path(position, destination).is_usable() {
            warn!(guard = %self.id, "追跡先に到達できないため捜索へ");
            self.change_state(GuardState::Searching);
            return;
        }

        self.move_to(destination, self.profile.chase_speed_mps);
    }

    fn search(&mut self, ctx: &GuardContext<'_>) {
        self.search_timer += ctx.dt;
        if self.search_timer >= self.profile.search_duration_s {
            self.change_state(GuardState::Returning);
            return;
        }

        let needs_point = match self.search_point {
            None => true,
            Some(_) => self.has_arrived(self.profile.arrival_tolerance_m),
        };
        if !needs_point {
            return;
        }

        let position = self.mover.position();
        let center = self.last_known_target_position.unwrap_or(position);
        match self.sample_search_point(ctx.spatial, position, center) {
            Some(point) => {
                debug!(guard = %self.id, x = point.x, y = point.y, "捜索地点を選択");
                self.search_point = Some(point);
                self.move_to(point, self.profile.search_speed());
            }
            None => {
                // 候補が見つからない場合はその場に留まり、次のティックで再試行
                self.search_point = None;
                self.move_to(position, self.profile.search_speed());
            }
        }
    }

    fn sample_search_point(
        &mut self,
        spatial: &dyn ISpatialQuery,
        from: Position3D,
        center: Position3D,
    ) -> Option<Position3D> {
        for _ in 0..self.profile.search_sample_attempts {
            let radius = self.profile.search_radius_m * self.rng.gen_range(0.0..=1.0_f64).sqrt();
            let angle = self.rng.gen_range(0.0..std::f64::consts::TAU);
            let candidate = Position3D::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
                from.z,
            );
            if spatial.try_find_path(from, candidate).is_usable() {
                return Some(candidate);
            }
        }
        None
    }

    /// 巡回ポイントが一巡してすべて到達不能な場合、周辺の到達可能な地点へ移動
    ///
    /// 候補が見つからない場合は自位置に留まり、次のティックで巡回を再試行します。
    fn start_detour(&mut self, spatial: &dyn ISpatialQuery, position: Position3D) {
        match self.sample_search_point(spatial, position, position) {
            Some(point) => {
                warn!(
                    guard = %self.id,
                    x = point.x,
                    y = point.y,
                    "到達可能な巡回ポイントがないため迂回"
                );
                self.detour_point = Some(point);
                self.move_to(point, self.profile.patrol_speed_mps);
            }
            None => {
                self.blocked_waypoints = 0;
                self.move_to(position, self.profile.patrol_speed_mps);
            }
        }
    }

    fn return_to_patrol(&mut self, ctx: &GuardContext<'_>) {
        let position = self.mover.position();

        let Some(nearest) = self.route.nearest_index(position) else {
            if !ctx.spatial.try_find_path(position, self.home_position).is_usable() {
                self.change_state(GuardState::Patrolling);
                return;
            }
            let changed = self.move_to(self.home_position, self.profile.patrol_speed_mps);
            if !changed && self.has_arrived(self.profile.arrival_tolerance_m) {
                self.change_state(GuardState::Patrolling);
            }
            return;
        };

        let waypoint = self.route.waypoints()[nearest];
        if !ctx.spatial.try_find_path(position, waypoint).is_usable() {
            warn!(
                guard = %self.id,
                waypoint = nearest,
                "帰還先に到達できないためその場から巡回を再開"
            );
            self.route.resume_from(nearest);
            self.change_state(GuardState::Patrolling);
            return;
        }

        let changed = self.move_to(waypoint, self.profile.patrol_speed_mps);
        if !changed && self.has_arrived(self.profile.arrival_tolerance_m) {
            self.route.resume_from(nearest);
            info!(guard = %self.id, waypoint = nearest, "巡回に復帰");
            self.change_state(GuardState::Patrolling);
        }
    }

    fn catch_target(&mut self, position: Position3D) {
        info!(guard = %self.id, x = position.x, y = position.y, "プレイヤーを捕獲");
        self.events.push(GuardEvent::PlayerCaught { position });
        self.suspicion.reset();
        if let Some(nearest) = self.route.nearest_index(self.mover.position()) {
            self.route.resume_from(nearest);
        }
        self.change_state(GuardState::Patrolling);
    }

    fn enter_chase(&mut self, reason: ChaseReason) {
        if self.change_state(GuardState::Chasing) {
            self.chase_reason = Some(reason);
        }
    }

    /// 状態遷移（現在と同じ状態への遷移は何もしない）
    ///
    /// 状態ごとのタイマーは遷移のたびにリセットされます。
    fn change_state(&mut self, new_state: GuardState) -> bool {
        if self.state == new_state {
            return false;
        }

        let previous = self.state;
        self.state = new_state;

        self.waypoint_wait_remaining = 0.0;
        self.investigation_wait = 0.0;
        self.lost_sight_timer = 0.0;
        self.had_visual_contact = false;
        self.search_timer = 0.0;
        self.search_point = None;
        self.blocked_waypoints = 0;
        self.detour_point = None;
        self.chase_reason = None;
        self.chase_timer = if new_state == GuardState::Chasing {
            self.profile.chase_duration_s
        } else {
            0.0
        };

        info!(guard = %self.id, from = ?previous, to = ?new_state, "状態遷移");
        self.events.push(GuardEvent::StateChanged {
            from: previous,
            to: new_state,
        });
        true
    }

    /// 目的地を設定（同じ目的地・速度の場合は再設定しない）
    ///
    /// # 戻り値
    ///
    /// 目的地を新たに設定した場合はtrue
    fn move_to(&mut self, destination: Position3D, speed: f64) -> bool {
        let unchanged = self
            .current_destination
            .is_some_and(|current| current.distance_3d(&destination) <= SAME_DESTINATION_EPSILON)
            && (self.current_speed - speed).abs() <= f64::EPSILON;
        if unchanged {
            return false;
        }

        self.mover.set_destination(destination, speed);
        self.current_destination = Some(destination);
        self.current_speed = speed;
        true
    }

    fn has_arrived(&self, tolerance: f64) -> bool {
        !self.mover.is_pending() && self.mover.remaining_distance() <= tolerance
    }
}

impl<M: IPathFollower> IAlertListener for Guard<M> {
    fn listener_position(&self) -> Position3D {
        self.mover.position()
    }

    fn current_state(&self) -> GuardState {
        self.state
    }

    /// 追跡中でなければ追跡へ移行し、追跡中であれば追跡タイマーのみ再設定
    fn on_alert_received(&mut self, position: Position3D) {
        if self.state == GuardState::Chasing {
            self.chase_timer = self.profile.chase_duration_s;
            return;
        }
        debug!(guard = %self.id, x = position.x, y = position.y, "警報を受信");
        self.last_known_target_position = Some(position);
        self.enter_chase(ChaseReason::Alerted);
    }

    fn on_player_position_updated(&mut self, position: Position3D) {
        self.last_known_target_position = Some(position);
        if self.state == GuardState::Chasing {
            self.chase_timer = self.profile.chase_duration_s;
        }
    }

    fn on_alert_ended(&mut self) {
        if self.state == GuardState::Chasing {
            self.change_state(GuardState::Returning);
        }
    }
}

impl<M: IPathFollower> IAlarmResponder for Guard<M> {
    /// 巡回・帰還中なら調査へ、調査中なら調査地点を更新
    fn respond_to_alarm(&mut self, position: Position3D) -> bool {
        match self.state {
            GuardState::Patrolling | GuardState::Returning => {
                self.last_known_target_position = Some(position);
                self.change_state(GuardState::Investigating);
                true
            }
            GuardState::Investigating => {
                self.last_known_target_position = Some(position);
                self.investigation_wait = 0.0;
                true
            }
            GuardState::Searching | GuardState::Chasing => false,
        }
    }

    fn responder_position(&self) -> Position3D {
        self.mover.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::RouteMode;
    use crate::world::{ObstacleMap, StraightLineMover};

    struct Dummy {
        position: Position3D,
        visibility: f64,
        noise: f64,
    }

    impl Dummy {
        fn visible_at(x: f64, y: f64) -> Self {
            Self {
                position: Position3D::new(x, y, 0.0),
                visibility: 1.0,
                noise: 0.0,
            }
        }
    }

    impl IDetectable for Dummy {
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

    fn guard_with(profile: GuardProfile, waypoints: Vec<Position3D>) -> Guard<StraightLineMover> {
        guard_at(Position3D::zero(), profile, PatrolRoute::new(waypoints, RouteMode::Loop))
    }

    fn guard_at(
        position: Position3D,
        profile: GuardProfile,
        route: PatrolRoute,
    ) -> Guard<StraightLineMover> {
        let mut guard = Guard::new(
            "g1".to_string(),
            StraightLineMover::new(position, 0.0),
            profile,
            route,
            7,
        );
        guard.set_target(Some("player".to_string()));
        guard
    }

    fn states_visited(events: &[GuardEvent]) -> Vec<GuardState> {
        events
            .iter()
            .filter_map(|event| match event {
                GuardEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    fn step(
        guard: &mut Guard<StraightLineMover>,
        map: &ObstacleMap,
        target: Option<&Dummy>,
        dt: f64,
    ) -> Vec<GuardEvent> {
        let ctx = GuardContext {
            dt,
            spatial: map,
            target: target.map(|t| t as &dyn IDetectable),
            alert: AlertView::default(),
        };
        let events = guard.tick(&ctx);
        guard.mover.advance(dt);
        events
    }

    #[test]
    fn test_full_detection_after_two_seconds_at_sixty_hz() {
        let map = ObstacleMap::open(50.0);
        let mut guard = guard_with(GuardProfile::default(), Vec::new());
        let target = Dummy::visible_at(5.0, 0.0);
        let dt = 1.0 / 60.0;

        let mut detected_at = None;
        for tick in 1..=120 {
            let events = step(&mut guard, &map, Some(&target), dt);
            if events.iter().any(|e| matches!(e, GuardEvent::PlayerDetected { .. })) {
                detected_at = Some(tick);
                break;
            }
        }

        assert_eq!(detected_at, Some(120));
        assert_eq!(guard.state(), GuardState::Chasing);
        assert_eq!(guard.chase_reason(), Some(ChaseReason::Detected));
        assert_eq!(guard.suspicion(), 1.0);
    }

    #[test]
    fn test_investigation_round_trip_resumes_nearest_waypoint() {
        let map = ObstacleMap::open(50.0);
        let profile = GuardProfile {
            waypoint_wait_s: 100.0,
            ..GuardProfile::default()
        };
        let mut guard = guard_with(
            profile,
            vec![Position3D::zero(), Position3D::new(0.0, -10.0, 0.0)],
        );
        let target = Dummy::visible_at(6.0, 0.0);
        let dt = 0.1;

        // 最初の巡回ポイントに到着して待機に入る
        for _ in 0..3 {
            step(&mut guard, &map, None, dt);
        }
        assert_eq!(guard.route().current_index(), 1);

        for _ in 0..50 {
            step(&mut guard, &map, Some(&target), dt);
            if guard.state() == GuardState::Investigating {
                break;
            }
        }
        assert_eq!(guard.state(), GuardState::Investigating);

        let mut visited = Vec::new();
        for _ in 0..300 {
            for event in step(&mut guard, &map, None, dt) {
                if let GuardEvent::StateChanged { to, .. } = event {
                    visited.push(to);
                }
            }
            if guard.state() == GuardState::Patrolling {
                break;
            }
        }

        assert_eq!(visited, vec![GuardState::Returning, GuardState::Patrolling]);
        assert!(guard.suspicion() < 0.3);
        assert_eq!(guard.route().current_index(), 0);
    }

    #[test]
    fn test_lost_sight_grace_leads_to_search() {
        let map = ObstacleMap::open(50.0)
            .with_obstacle(Position3D::new(-5.0, 2.0, 0.0), Position3D::new(15.0, 3.0, 3.0));
        let profile = GuardProfile {
            detection_rate: 20.0,
            ..GuardProfile::default()
        };
        let mut guard = guard_with(profile, Vec::new());
        let dt = 0.1;

        step(&mut guard, &map, Some(&Dummy::visible_at(8.0, 0.0)), dt);
        assert_eq!(guard.state(), GuardState::Chasing);

        let hidden = Dummy::visible_at(8.0, 10.0);
        let mut searching_after = None;
        for tick in 1..=60 {
            step(&mut guard, &map, Some(&hidden), dt);
            if guard.state() == GuardState::Searching {
                searching_after = Some(tick as f64 * dt);
                break;
            }
        }

        let elapsed = searching_after.unwrap_or(f64::INFINITY);
        assert!((2.9..=3.3).contains(&elapsed), "elapsed = {elapsed}");
    }

    #[test]
    fn test_alert_received_is_idempotent_when_chasing() {
        let map = ObstacleMap::open(50.0);
        let mut guard = guard_with(GuardProfile::default(), Vec::new());
        let first = Position3D::new(10.0, 10.0, 0.0);

        guard.on_alert_received(first);
        step(&mut guard, &map, None, 0.5);
        guard.on_alert_received(Position3D::new(-10.0, 0.0, 0.0));

        assert_eq!(guard.state(), GuardState::Chasing);
        assert_eq!(guard.chase_reason(), Some(ChaseReason::Alerted));
        assert_eq!(guard.chase_timer(), guard.profile.chase_duration_s);
        assert_eq!(guard.last_known_target_position(), Some(first));

        let events = step(&mut guard, &map, None, 0.5);
        assert!(!events.iter().any(|e| matches!(e, GuardEvent::StateChanged { .. })));
    }

    #[test]
    fn test_chase_timer_expiry_without_contact() {
        let map = ObstacleMap::open(50.0);
        let mut guard = guard_with(GuardProfile::default(), Vec::new());
        guard.on_alert_received(Position3D::new(20.0, 20.0, 0.0));

        let mut time: f64 = 0.0;
        while guard.state() == GuardState::Chasing && time < 10.0 {
            time += 0.5;
            step(&mut guard, &map, None, 0.5);
        }
        assert_eq!(guard.state(), GuardState::Searching);
        assert!((time - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_catch_resets_suspicion_and_patrols() {
        let map = ObstacleMap::open(50.0);
        let profile = GuardProfile {
            detection_rate: 20.0,
            ..GuardProfile::default()
        };
        let mut guard = guard_with(profile, vec![Position3D::new(0.0, 5.0, 0.0)]);
        step(&mut guard, &map, Some(&Dummy::visible_at(3.0, 0.0)), 0.1);
        assert_eq!(guard.state(), GuardState::Chasing);

        let events = step(&mut guard, &map, Some(&Dummy::visible_at(1.0, 0.0)), 0.1);
        assert!(events.iter().any(|e| matches!(e, GuardEvent::PlayerCaught { .. })));
        assert_eq!(guard.state(), GuardState::Patrolling);
        assert_eq!(guard.suspicion(), 0.0);
    }

    #[test]
    fn test_respond_to_alarm_respects_priority() {
        let mut guard = guard_with(GuardProfile::default(), Vec::new());
        let first = Position3D::new(3.0, 0.0, 0.0);
        let second = Position3D::new(0.0, 3.0, 0.0);

        assert!(guard.respond_to_alarm(first));
        assert_eq!(guard.state(), GuardState::Investigating);
        assert!(guard.respond_to_alarm(second));
        assert_eq!(guard.last_known_target_position(), Some(second));

        guard.on_alert_received(first);
        assert!(!guard.respond_to_alarm(second));
        assert_eq!(guard.state(), GuardState::Chasing);
    }

    #[test]
    fn test_unreachable_waypoint_is_skipped() {
        let map = ObstacleMap::open(50.0)
            .with_obstacle(Position3D::new(4.0, 4.0, 0.0), Position3D::new(6.0, 6.0, 3.0));
        let profile = GuardProfile {
            waypoint_wait_s: 0.0,
            ..GuardProfile::default()
        };
        let mut guard = guard_with(
            profile,
            vec![
                Position3D::zero(),
                Position3D::new(5.0, 5.0, 0.0),
                Position3D::new(0.0, 10.0, 0.0),
            ],
        );

        let mut reached = false;
        for _ in 0..100 {
            step(&mut guard, &map, None, 0.1);
            if guard.position().distance_3d(&Position3D::new(0.0, 10.0, 0.0)) < 0.5 {
                reached = true;
                break;
            }
        }
        assert!(reached);
        assert_eq!(guard.state(), GuardState::Patrolling);
    }

    #[test]
    fn test_search_picks_reachable_points_then_returns() {
        let map = ObstacleMap::open(50.0);
        let mut guard = guard_with(GuardProfile::default(), vec![Position3D::zero()]);
        guard.on_alert_received(Position3D::new(10.0, 0.0, 0.0));
        guard.on_alert_ended();
        assert_eq!(guard.state(), GuardState::Returning);

        guard.respond_to_alarm(Position3D::new(10.0, 0.0, 0.0));
        guard.change_state(GuardState::Searching);

        step(&mut guard, &map, None, 0.1);
        let point = guard.current_destination().unwrap_or_default();
        let center = Position3D::new(10.0, 0.0, 0.0);
        assert!(point.distance_3d(&center) <= guard.profile.search_radius_m + 1e-9);

        let mut time = 0.1;
        while guard.state() == GuardState::Searching && time < 20.0 {
            time += 0.1;
            step(&mut guard, &map, None, 0.1);
        }
        assert_eq!(guard.state(), GuardState::Returning);
    }

    #[test]
    fn test_investigation_with_lingering_suspicion_turns_to_search() {
        let map = ObstacleMap::open(50.0);
        let mut guard = guard_with(GuardProfile::default(), Vec::new());

        assert!(guard.respond_to_alarm(Position3D::new(4.0, 0.0, 0.0)));
        guard.suspicion.set_level(0.95);

        let mut visited = Vec::new();
        for _ in 0..200 {
            visited.extend(states_visited(&step(&mut guard, &map, None, 0.1)));
            if guard.state() != GuardState::Investigating {
                break;
            }
        }

        assert_eq!(visited, vec![GuardState::Investigating, GuardState::Searching]);
        assert!(guard.suspicion() >= guard.profile.give_up_threshold);
    }

    #[test]
    fn test_unreachable_investigation_point_turns_to_search() {
        let map = ObstacleMap::open(50.0)
            .with_obstacle(Position3D::new(4.0, -1.0, 0.0), Position3D::new(6.0, 1.0, 3.0));
        let mut guard = guard_with(GuardProfile::default(), vec![Position3D::zero()]);

        assert!(guard.respond_to_alarm(Position3D::new(5.0, 0.0, 0.0)));

        let mut visited = Vec::new();
        for _ in 0..400 {
            visited.extend(states_visited(&step(&mut guard, &map, None, 0.1)));
            if guard.state() == GuardState::Patrolling {
                break;
            }
        }

        assert_eq!(
            visited,
            vec![
                GuardState::Investigating,
                GuardState::Searching,
                GuardState::Returning,
                GuardState::Patrolling,
            ]
        );
    }

    #[test]
    fn test_unreachable_chase_destination_turns_to_search() {
        let map = ObstacleMap::open(50.0)
            .with_obstacle(Position3D::new(4.0, -1.0, 0.0), Position3D::new(6.0, 1.0, 3.0));
        let mut guard = guard_with(GuardProfile::default(), Vec::new());

        guard.on_alert_received(Position3D::new(5.0, 0.0, 0.0));
        let events = step(&mut guard, &map, None, 0.1);

        assert_eq!(states_visited(&events), vec![GuardState::Chasing, GuardState::Searching]);
        assert_eq!(guard.chase_reason(), None);
    }

    #[test]
    fn test_occluded_route_falls_back_to_detour() {
        let map = ObstacleMap::open(50.0)
            .with_obstacle(Position3D::new(4.0, -3.0, 0.0), Position3D::new(5.0, 3.0, 3.0));
        let start = Position3D::new(10.0, 0.0, 0.0);
        let mut guard = guard_at(
            start,
            GuardProfile::default(),
            PatrolRoute::new(vec![Position3D::zero()], RouteMode::Loop),
        );

        guard.on_alert_received(Position3D::new(12.0, 0.0, 0.0));
        guard.on_alert_ended();
        assert_eq!(guard.state(), GuardState::Returning);

        // 帰還先が遮蔽されているため、その場から巡回を再開する
        step(&mut guard, &map, None, 0.1);
        assert_eq!(guard.state(), GuardState::Patrolling);
        assert_eq!(guard.route().current_index(), 0);

        let mut farthest: f64 = 0.0;
        for _ in 0..600 {
            step(&mut guard, &map, None, 0.1);
            farthest = farthest.max(guard.position().distance_3d(&start));
        }

        assert!(farthest > 0.5, "guard stayed within {farthest} m of its start");
        assert!(guard.current_destination().is_some());
    }

    #[test]
    fn test_once_route_stops_at_last_waypoint() {
        let map = ObstacleMap::open(50.0);
        let profile = GuardProfile {
            waypoint_wait_s: 0.0,
            ..GuardProfile::default()
        };
        let end = Position3D::new(3.0, 0.0, 0.0);
        let mut guard = guard_at(
            Position3D::zero(),
            profile,
            PatrolRoute::new(vec![Position3D::zero(), end], RouteMode::Once),
        );

        for _ in 0..100 {
            step(&mut guard, &map, None, 0.1);
        }

        assert!(guard.route().is_finished());
        assert_eq!(guard.route().current_index(), 1);
        assert!(guard.position().distance_3d(&end) < 1e-9);
        assert_eq!(guard.state(), GuardState::Patrolling);
    }
}
