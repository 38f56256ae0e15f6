//! # stealthsim
//!
//! ステルスゲームの警備AIを時間駆動で再現するシミュレーションライブラリです。
//!
//! - `models`: 警備員（センサー・疑念・状態機械）、全体警報、侵入者、防犯カメラ
//! - `world`: 空間クエリと経路追従の参照実装
//! - `scenario`: YAMLシナリオの読み込みと検証
//! - `simulation`: 固定時間刻みのシミュレーションエンジン
//! - `logging`: tracingによるログ出力の初期化

pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
pub mod world;
