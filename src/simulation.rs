//! # Simulation モジュール
//!
//! 警備シミュレーションの中核となるシミュレーションエンジンを提供します。
//!
//! 固定時間刻み（Δt）でエージェントを更新し、警備員が発したイベントを
//! 警報コーディネーターとゲームループへ同期的に配送します。
//!
//! ## シミュレーション処理順序
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **侵入者処理**: 行程に沿った移動、騒音・視認性の更新
//! 2. **物音処理**: 予定時刻に達した物音を範囲内の警備員へ通知
//! 3. **警備員処理**: 感知・疑念積分・状態行動。イベントは次の警備員の前に配送
//! 4. **カメラ処理**: 首振り・検知進捗・警報
//! 5. **移動処理**: 各警備員の経路追従を1ティック分進める
//! 6. **警報処理**: 全体警報のカウントダウン
//!
//! ## 使用例
//!
//! ```no_run
//! use stealthsim::simulation::SimulationEngine;
//! use stealthsim::scenario::ScenarioConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScenarioConfig::from_file("scenarios/museum_night.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! engine.run()?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use tracing::{debug, info, trace, warn};

use crate::models::{Position3D as ModelPosition3D, *};
use crate::scenario::ScenarioConfig;
use crate::world::{ObstacleMap, StraightLineMover};

/// シミュレーションで使用する警備員の型
pub type SimGuard = Guard<StraightLineMover>;

/// 警備員ごとの乱数シードの混合定数
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// 捕獲の記録
#[derive(Debug, Clone, PartialEq)]
pub struct CatchRecord {
    pub guard_id: String,
    pub position: ModelPosition3D,
}

/// 捕獲通知を記録するだけのゲームループ
#[derive(Debug, Default)]
pub struct CatchLog {
    pub records: Vec<CatchRecord>,
}

impl IGameLoop for CatchLog {
    fn on_player_caught(&mut self, guard_id: &str, position: ModelPosition3D) {
        self.records.push(CatchRecord {
            guard_id: guard_id.to_string(),
            position,
        });
    }
}

/// 予定された物音
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseEvent {
    pub time: f64,
    pub position: ModelPosition3D,
    pub radius: f64,
}

/// 実行統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStats {
    /// 全体警報の発令回数
    pub alerts_raised: u32,
    /// 全体警報の終了回数
    pub alerts_ended: u32,
    /// カメラ警報の回数
    pub camera_alarms: u32,
    /// 処理した物音の数
    pub noises: u32,
    /// 警備員の状態遷移の総数
    pub state_changes: u32,
    /// 捕獲回数
    pub catches: u32,
    /// 最初に捕獲された時刻（秒）
    pub first_catch_time: Option<f64>,
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub seed: u64,
    pub step_count: u64,

    pub world: ObstacleMap,
    pub guards: BTreeMap<String, SimGuard>,
    pub intruder: Option<Intruder>,
    pub cameras: Vec<SecurityCamera>,
    pub coordinator: AlertCoordinator,
    pub noise_events: Vec<NoiseEvent>,
    pub stats: SimulationStats,

    pub scenario_config: Option<ScenarioConfig>,
    pub verbose_level: u8,
    /// 捕獲時にシミュレーションを終了するか
    pub stop_on_catch: bool,

    game_loop: Box<dyn IGameLoop>,
    spawned_guards: u64,
}

impl SimulationEngine {
    /// シナリオからエンジンを作成（エージェントは `initialize` で配置）
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let region = &scenario.world.region_rect;
        let mut world =
            ObstacleMap::new(region.xmin_m, region.ymin_m, region.xmax_m, region.ymax_m);
        for obstacle in &scenario.world.obstacles {
            world.add_obstacle(obstacle.min.to_model(), obstacle.max.to_model());
        }
        let alert = AlertConfig {
            alert_radius: scenario.alert.alert_radius_m,
            alert_duration: scenario.alert.alert_duration_s,
        };

        let mut engine = Self::with_world(
            world,
            alert,
            scenario.sim.dt_s,
            scenario.sim.t_max_s,
            scenario.sim.seed,
        );
        engine.verbose_level = verbose_level;
        engine.scenario_config = Some(scenario);
        engine
    }

    /// シナリオを使わずにエンジンを作成
    ///
    /// # 引数
    ///
    /// * `world` - 空間クエリに使うマップ
    /// * `alert` - 警報コーディネーターの設定
    /// * `dt` - 時間刻み（秒）
    /// * `max_time` - 最大シミュレーション時間（秒）
    /// * `seed` - 乱数シード
    pub fn with_world(
        world: ObstacleMap,
        alert: AlertConfig,
        dt: f64,
        max_time: f64,
        seed: u64,
    ) -> Self {
        Self {
            current_time: 0.0,
            dt,
            max_time,
            seed,
            step_count: 0,
            world,
            guards: BTreeMap::new(),
            intruder: None,
            cameras: Vec::new(),
            coordinator: AlertCoordinator::new(alert),
            noise_events: Vec::new(),
            stats: SimulationStats::default(),
            scenario_config: None,
            verbose_level: 0,
            stop_on_catch: true,
            game_loop: Box::new(CatchLog::default()),
            spawned_guards: 0,
        }
    }

    /// 捕獲通知の送り先を差し替え
    pub fn set_game_loop(&mut self, game_loop: Box<dyn IGameLoop>) {
        self.game_loop = game_loop;
    }

    /// シナリオに従ってエージェントを配置
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(scenario) = self.scenario_config.clone() else {
            return Ok(());
        };

        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        if let Some(intruder_config) = &scenario.intruder {
            let legs = intruder_config.route.iter().map(|leg| leg.to_model()).collect();
            self.set_intruder(Intruder::new(
                intruder_config.id.clone(),
                intruder_config.pos.to_model(),
                intruder_config.stealth.clone(),
                legs,
            ));
        }

        for guard_config in &scenario.guards {
            let profile = guard_config.resolved_profile(&scenario.guard_defaults)?;
            let waypoints = guard_config.route.waypoints.iter().map(|wp| wp.to_model()).collect();
            self.spawn_guard(
                &guard_config.id,
                guard_config.pos.to_model(),
                guard_config.forward_deg,
                profile,
                PatrolRoute::new(waypoints, guard_config.route.mode),
                guard_config.track_intruder,
            );
        }

        for camera_config in &scenario.cameras {
            self.cameras.push(SecurityCamera::new(
                camera_config.id.clone(),
                camera_config.pos.to_model(),
                camera_config.heading_deg,
                camera_config.profile.clone(),
            ));
        }

        for event in &scenario.noise_events {
            self.schedule_noise(event.time_s, event.pos.to_model(), event.radius_m);
        }

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  警備員: {}名", self.guards.len());
            info!("  防犯カメラ: {}台", self.cameras.len());
            info!("  侵入者: {}", if self.intruder.is_some() { "あり" } else { "なし" });
        }

        Ok(())
    }

    /// 侵入者を配置（既存の侵入者は置き換え）
    pub fn set_intruder(&mut self, intruder: Intruder) {
        debug!("侵入者を配置: {}", intruder.id);
        self.intruder = Some(intruder);
    }

    /// 警備員を配置して警報コーディネーターに登録
    ///
    /// # 戻り値
    ///
    /// 配置した場合はtrue、同じIDの警備員が既にいる場合はfalse
    pub fn spawn_guard(
        &mut self,
        id: &str,
        position: ModelPosition3D,
        heading_deg: f64,
        profile: GuardProfile,
        route: PatrolRoute,
        track_intruder: bool,
    ) -> bool {
        if self.guards.contains_key(id) {
            warn!(guard = id, "同じIDの警備員が既に存在します");
            return false;
        }

        let seed = self.seed ^ self.spawned_guards.wrapping_add(1).wrapping_mul(SEED_MIX);
        self.spawned_guards += 1;

        let mover = StraightLineMover::new(position, heading_deg);
        let mut guard = Guard::new(id.to_string(), mover, profile, route, seed);
        if track_intruder {
            guard.set_target(self.intruder.as_ref().map(|intruder| intruder.id.clone()));
        }

        self.guards.insert(id.to_string(), guard);
        self.coordinator.register(id);
        debug!(guard = id, x = position.x, y = position.y, "警備員を配置");
        true
    }

    /// 警備員を撤去して登録を解除
    pub fn despawn_guard(&mut self, id: &str) -> Option<SimGuard> {
        self.coordinator.unregister(id);
        let removed = self.guards.remove(id);
        if removed.is_some() {
            debug!(guard = id, "警備員を撤去");
        }
        removed
    }

    pub fn add_camera(&mut self, camera: SecurityCamera) {
        self.cameras.push(camera);
    }

    /// 物音を予定に追加
    pub fn schedule_noise(&mut self, time: f64, position: ModelPosition3D, radius: f64) {
        self.noise_events.push(NoiseEvent { time, position, radius });
        self.noise_events
            .sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));
    }

    /// 物音を発生させ、範囲内の警備員に調査を要求
    ///
    /// # 戻り値
    ///
    /// 調査に向かった警備員の数
    pub fn emit_noise(&mut self, position: ModelPosition3D, radius: f64) -> usize {
        self.stats.noises += 1;
        let mut responded = 0;
        for guard in self.guards.values_mut() {
            let within = guard.responder_position().distance_3d(&position) <= radius;
            if within && guard.respond_to_alarm(position) {
                responded += 1;
            }
        }
        debug!(x = position.x, y = position.y, radius, responded, "物音");
        responded
    }

    pub fn guard(&self, id: &str) -> Option<&SimGuard> {
        self.guards.get(id)
    }

    pub fn guard_mut(&mut self, id: &str) -> Option<&mut SimGuard> {
        self.guards.get_mut(id)
    }

    pub fn is_player_caught(&self) -> bool {
        self.intruder.as_ref().is_some_and(|intruder| intruder.is_caught())
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("=== シミュレーション実行開始 ===");

        while self.current_time < self.max_time {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.1}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!(
                    "進行状況: {:.1}% ({:.1}/{:.1}秒)",
                    progress, self.current_time, self.max_time
                );
            }

            if self.stop_on_catch && self.is_player_caught() {
                info!("侵入者が捕獲されたためシミュレーションを終了");
                break;
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);

        Ok(())
    }

    /// 1ティック分の処理
    pub fn step(&mut self) {
        self.process_intruder();
        self.process_noise_events();
        self.process_guards();
        self.process_cameras();
        self.process_movement();
        self.process_alert();

        self.current_time += self.dt;
        self.step_count += 1;
    }

    fn process_intruder(&mut self) {
        if let Some(intruder) = &mut self.intruder {
            intruder.update(self.dt);
        }
    }

    fn process_noise_events(&mut self) {
        let due = self
            .noise_events
            .iter()
            .take_while(|event| event.time <= self.current_time)
            .count();
        let events: Vec<NoiseEvent> = self.noise_events.drain(..due).collect();
        for event in events {
            self.emit_noise(event.position, event.radius);
        }
    }

    fn process_guards(&mut self) {
        let ids: Vec<String> = self.guards.keys().cloned().collect();

        for id in ids {
            let alert = self.coordinator.view();
            let events = {
                let Some(guard) = self.guards.get_mut(&id) else {
                    continue;
                };
                let target = match (&self.intruder, guard.target_id()) {
                    (Some(intruder), Some(target_id))
                        if intruder.id == target_id && !intruder.is_caught() =>
                    {
                        Some(intruder as &dyn IDetectable)
                    }
                    _ => None,
                };
                let ctx = GuardContext {
                    dt: self.dt,
                    spatial: &self.world,
                    target,
                    alert,
                };
                guard.tick(&ctx)
            };

            self.dispatch_guard_events(&id, events);
        }
    }

    /// 警備員のイベントを配送（次の警備員が処理される前に完了する）
    fn dispatch_guard_events(&mut self, guard_id: &str, events: Vec<GuardEvent>) {
        for event in events {
            match event {
                GuardEvent::StateChanged { .. } => {
                    self.stats.state_changes += 1;
                }
                GuardEvent::PlayerDetected { position } => {
                    self.coordinator.trigger_alert(position, Some(guard_id), &mut self.guards);
                }
                GuardEvent::TargetSighted { position } => {
                    self.coordinator.update_player_position(position, &mut self.guards);
                }
                GuardEvent::PlayerCaught { position } => {
                    self.stats.catches += 1;
                    self.stats.first_catch_time.get_or_insert(self.current_time);
                    if let Some(intruder) = &mut self.intruder {
                        intruder.mark_caught();
                    }
                    self.game_loop.on_player_caught(guard_id, position);
                }
            }
        }
    }

    fn process_cameras(&mut self) {
        let target = self
            .intruder
            .as_ref()
            .filter(|intruder| !intruder.is_caught())
            .map(|intruder| intruder as &dyn IDetectable);

        for camera in &mut self.cameras {
            if let Some(position) = camera.update(self.dt, target, &self.world) {
                self.stats.camera_alarms += 1;
                camera.broadcast_alarm(position, self.guards.values_mut());
            }
        }
    }

    fn process_movement(&mut self) {
        for guard in self.guards.values_mut() {
            guard.mover.advance(self.dt);
        }
    }

    fn process_alert(&mut self) {
        self.coordinator.tick(self.dt, &mut self.guards);
        for event in self.coordinator.drain_events() {
            match event {
                AlertEvent::PlayerDetected { .. } => self.stats.alerts_raised += 1,
                AlertEvent::AlertEnded => self.stats.alerts_ended += 1,
            }
        }
    }

    /// 実行結果の概要を表示
    pub fn print_summary(&self) {
        println!("=== 実行結果 ===");
        println!("経過時間: {:.1}秒 ({}ステップ)", self.current_time, self.step_count);
        println!(
            "全体警報: 発令{}回 / 終了{}回",
            self.stats.alerts_raised, self.stats.alerts_ended
        );
        println!("カメラ警報: {}回", self.stats.camera_alarms);
        println!("物音: {}回", self.stats.noises);
        println!("状態遷移: {}回", self.stats.state_changes);
        match self.stats.first_catch_time {
            Some(time) => println!("侵入者捕獲: {:.1}秒", time),
            None => println!("侵入者捕獲: なし"),
        }
        for (id, guard) in &self.guards {
            let position = guard.position();
            println!(
                "  {}: {:?} (疑念 {:.2}, 位置 {:.1}, {:.1})",
                id,
                guard.state(),
                guard.suspicion(),
                position.x,
                position.y
            );
        }
    }
}
