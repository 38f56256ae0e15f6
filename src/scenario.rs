use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{
    CameraProfile, GuardProfile, Position3D as ModelPosition3D, RouteLeg, RouteMode, StealthProfile,
};

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    #[serde(default)]
    pub seed: u64,
}

/// 世界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    pub region_rect: RegionRect,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionRect {
    pub xmin_m: f64,
    pub xmax_m: f64,
    pub ymin_m: f64,
    pub ymax_m: f64,
}

/// 障害物（直方体の対角2頂点）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObstacleConfig {
    pub min: Position3D,
    pub max: Position3D,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Position3D {
    pub x_m: f64,
    pub y_m: f64,
    #[serde(default)]
    pub z_m: f64,
}

impl Position3D {
    pub fn to_model(&self) -> ModelPosition3D {
        ModelPosition3D::new(self.x_m, self.y_m, self.z_m)
    }
}

/// 全体警報の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertSettings {
    pub alert_radius_m: f64,
    pub alert_duration_s: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            alert_radius_m: 30.0,
            alert_duration_s: 30.0,
        }
    }
}

/// 巡回ルート設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub mode: RouteMode,
    #[serde(default)]
    pub waypoints: Vec<Position3D>,
}

/// 警備員設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardConfig {
    pub id: String,
    pub pos: Position3D,
    #[serde(default)]
    pub forward_deg: f64,
    #[serde(default)]
    pub route: RouteConfig,
    /// `guard_defaults` に対する部分的な上書き
    #[serde(default)]
    pub profile: serde_yaml::Mapping,
    #[serde(default = "default_true")]
    pub track_intruder: bool,
}

fn default_true() -> bool {
    true
}

fn default_intruder_id() -> String {
    "player".to_string()
}

impl GuardConfig {
    /// 既定プロファイルに上書き項目を適用したプロファイル
    pub fn resolved_profile(&self, defaults: &GuardProfile) -> Result<GuardProfile, ScenarioError> {
        if self.profile.is_empty() {
            return Ok(defaults.clone());
        }

        let mut base = serde_yaml::to_value(defaults)
            .map_err(|e| ScenarioError::ProfileError(self.id.clone(), e))?;
        if let serde_yaml::Value::Mapping(fields) = &mut base {
            for (key, value) in &self.profile {
                fields.insert(key.clone(), value.clone());
            }
        }
        serde_yaml::from_value(base).map_err(|e| ScenarioError::ProfileError(self.id.clone(), e))
    }
}

/// 侵入者の行程1区間
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntruderLegConfig {
    pub to: Position3D,
    pub speed_mps: f64,
    #[serde(default)]
    pub crouching: bool,
    #[serde(default)]
    pub hold_s: f64,
}

impl IntruderLegConfig {
    pub fn to_model(&self) -> RouteLeg {
        RouteLeg {
            destination: self.to.to_model(),
            speed: self.speed_mps,
            crouching: self.crouching,
            hold_s: self.hold_s,
        }
    }
}

/// 侵入者設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntruderConfig {
    #[serde(default = "default_intruder_id")]
    pub id: String,
    pub pos: Position3D,
    #[serde(default)]
    pub stealth: StealthProfile,
    #[serde(default)]
    pub route: Vec<IntruderLegConfig>,
}

/// 防犯カメラ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    pub id: String,
    pub pos: Position3D,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub profile: CameraProfile,
}

/// 物音（投擲物の着地など）の発生予定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NoiseEventConfig {
    pub time_s: f64,
    pub pos: Position3D,
    pub radius_m: f64,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub guard_defaults: GuardProfile,
    #[serde(default)]
    pub guards: Vec<GuardConfig>,
    #[serde(default)]
    pub intruder: Option<IntruderConfig>,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub noise_events: Vec<NoiseEventConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents =
            fs::read_to_string(path).map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents)
                .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |msg: String| Err(ScenarioError::ValidationError(msg));

        // 時間設定の検証
        if self.sim.dt_s <= 0.0 {
            return invalid("dt_s must be positive".to_string());
        }
        if self.sim.t_max_s <= 0.0 {
            return invalid("t_max_s must be positive".to_string());
        }

        // 座標範囲の検証
        let region = &self.world.region_rect;
        if region.xmin_m >= region.xmax_m || region.ymin_m >= region.ymax_m {
            return invalid("Invalid region bounds".to_string());
        }

        if self.alert.alert_duration_s <= 0.0 {
            return invalid("alert_duration_s must be positive".to_string());
        }
        if self.alert.alert_radius_m < 0.0 {
            return invalid("alert_radius_m must be non-negative".to_string());
        }

        self.guard_defaults
            .validate()
            .or_else(|msg| invalid(format!("guard_defaults: {}", msg)))?;

        let mut guard_ids = HashSet::new();
        for guard in &self.guards {
            if !guard_ids.insert(guard.id.as_str()) {
                return invalid(format!("Duplicate guard id {}", guard.id));
            }
            if !self.is_position_in_bounds(guard.pos.x_m, guard.pos.y_m) {
                return invalid(format!("Guard {} outside region bounds", guard.id));
            }
            if let Some(index) = guard
                .route
                .waypoints
                .iter()
                .position(|wp| !self.is_position_in_bounds(wp.x_m, wp.y_m))
            {
                return invalid(format!(
                    "Guard {} waypoint {} outside region bounds",
                    guard.id, index
                ));
            }
            guard
                .resolved_profile(&self.guard_defaults)?
                .validate()
                .or_else(|msg| invalid(format!("Guard {}: {}", guard.id, msg)))?;
        }

        if let Some(intruder) = &self.intruder {
            if !self.is_position_in_bounds(intruder.pos.x_m, intruder.pos.y_m) {
                return invalid(format!("Intruder {} outside region bounds", intruder.id));
            }
            if intruder.route.iter().any(|leg| leg.speed_mps < 0.0 || leg.hold_s < 0.0) {
                return invalid(format!(
                    "Intruder {} has a negative leg speed or hold",
                    intruder.id
                ));
            }
        }

        let mut camera_ids = HashSet::new();
        for camera in &self.cameras {
            if !camera_ids.insert(camera.id.as_str()) {
                return invalid(format!("Duplicate camera id {}", camera.id));
            }
            if camera.profile.time_to_detect_s <= 0.0 {
                return invalid(format!("Camera {} time_to_detect_s must be positive", camera.id));
            }
        }

        for event in &self.noise_events {
            if event.radius_m < 0.0 || event.time_s < 0.0 {
                return invalid("noise event time and radius must be non-negative".to_string());
            }
        }

        Ok(())
    }

    /// 位置が領域内かどうかをチェック
    fn is_position_in_bounds(&self, x: f64, y: f64) -> bool {
        let region = &self.world.region_rect;
        x >= region.xmin_m && x <= region.xmax_m && y >= region.ymin_m && y <= region.ymax_m
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒 ({:.1}分)", self.sim.t_max_s, self.sim.t_max_s / 60.0);
        println!("シード値: {}", self.sim.seed);
        println!("障害物: {}個", self.world.obstacles.len());
        println!();

        println!("=== 警報設定 ===");
        println!("伝播半径: {:.1}m", self.alert.alert_radius_m);
        println!("持続時間: {:.1}秒", self.alert.alert_duration_s);
        println!();

        println!("=== 警備 ===");
        println!("警備員: {}名", self.guards.len());
        for guard in &self.guards {
            println!(
                "  {}: 巡回ポイント{}個 ({:?})",
                guard.id,
                guard.route.waypoints.len(),
                guard.route.mode
            );
        }
        println!("防犯カメラ: {}台", self.cameras.len());
        println!("物音イベント: {}件", self.noise_events.len());
        println!();

        println!("=== 侵入者 ===");
        match &self.intruder {
            Some(intruder) => {
                println!("ID: {}", intruder.id);
                println!("行程: {}区間", intruder.route.len());
            }
            None => println!("なし"),
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("警備員 {0} のプロファイルが不正です: {1}")]
    ProfileError(String, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}
