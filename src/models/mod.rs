// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 外部協力者とエージェントのインターフェース（trait）定義
pub mod traits;

// 警備員の構成要素
pub mod profile;
pub mod sensor;
pub mod suspicion;
pub mod route;
pub mod guard;

// 全体警報
pub mod alert;

// 警備員以外のエージェント
pub mod intruder;
pub mod security_camera;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use profile::GuardProfile;
pub use sensor::{Contribution, Sensor, SensorReading};
pub use suspicion::{DecayMode, DetectionAccumulator, DetectionTrigger};
pub use route::{PatrolRoute, RouteMode};
pub use guard::{ChaseReason, Guard, GuardContext, GuardEvent, GuardState};
pub use alert::{AlertConfig, AlertCoordinator, AlertEvent, AlertView};
pub use intruder::{Intruder, IntruderStatus, RouteLeg, StealthProfile};
pub use security_camera::{CameraProfile, CameraState, SecurityCamera};
