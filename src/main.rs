use clap::{Arg, Command};
use stealthsim::logging::{self, LogConfig, LogOutput};
use stealthsim::scenario::ScenarioConfig;
use stealthsim::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("stealthsim")
        .version("0.1.0")
        .about("警備AIシミュレーション (Stealth Guard Simulation)")
        .long_about(
            "ステルスゲームの警備AIを再現する時間駆動型シミュレーション\n\
             巡回・調査・追跡・捜索・帰還の状態遷移と全体警報の伝播を評価します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help(
                    "実行するシナリオファイル(.yaml)のパスを指定します。\n\
                     指定しない場合、使用方法とシナリオ一覧を表示します。",
                ),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。省略時は -v の回数で決定"),
        )
        .get_matches();

    println!("警備AIシミュレーション (Stealth Guard Simulation) - stealthsim v0.1.0");
    println!();

    let verbose_level = matches.get_count("verbose");
    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    // ログシステムの初期化（ガードは終了まで保持）
    let _log_guard = match init_logging_from_args(&matches, verbose_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match run_scenario(scenario_path, matches.get_flag("info"), verbose_level) {
            Ok(_) => {
                if verbose_level > 0 {
                    println!("シナリオ実行が正常に完了しました。");
                }
            }
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        // デフォルト動作: 利用可能なシナリオ一覧を表示
        show_default_help();
    }
}

fn init_logging_from_args(
    matches: &clap::ArgMatches,
    verbose_level: u8,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, logging::LoggingError> {
    let output: LogOutput = matches
        .get_one::<String>("log-output")
        .map(String::as_str)
        .unwrap_or("console")
        .parse()?;
    let level = match matches.get_one::<String>("log-level") {
        Some(level) => logging::parse_log_level(level),
        None => logging::level_for_verbosity(verbose_level),
    };

    logging::init_logging(LogConfig {
        level,
        output,
        ..LogConfig::default()
    })
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    // 情報表示のみの場合
    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    execute_scenario(scenario, verbose_level)?;

    Ok(())
}

/// シナリオの実行
fn execute_scenario(
    scenario: ScenarioConfig,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    simulation.initialize()?;
    simulation.run()?;

    println!();
    simulation.print_summary();

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  stealthsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>     シナリオファイルを指定して実行");
    println!("  -i, --info                シナリオ情報のみ表示");
    println!("  -v, --verbose             詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-output <TARGET> ログ出力先 (console, file, both)");
    println!("      --log-level <LEVEL>   ログレベル");
    println!("  -h, --help                このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/museum_night.yaml    - 美術館の夜間警備（カメラ・物音あり）");
    println!("  scenarios/corridor_chase.yaml  - 廊下での発見と全体警報");
    println!();
    println!("例:");
    println!("  stealthsim -s scenarios/museum_night.yaml");
    println!("  stealthsim -s scenarios/museum_night.yaml -vv --log-output both");
    println!("  stealthsim -s scenarios/corridor_chase.yaml -i");
}
