use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use citywalk_client::chat::{ChatService, NpcConfig};
use citywalk_client::cli::{CliArgs, Command};
use citywalk_client::project_config::{self, CitywalkConfig};
use citywalk_client::session::GameSession;
use citywalk_client::{assets, engine, script_runner};
use clap::Parser;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    tracing::info!("citywalk v{}", env!("CARGO_PKG_VERSION"));

    let (project_root, config) = match project_config::discover(Path::new(&args.project)) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("  Point --project at a directory containing citywalk.yaml.");
            std::process::exit(1);
        }
    };
    tracing::info!("Loaded project: {} v{}", config.name, config.version);

    let event_log = args.event_log.as_deref().map(PathBuf::from);
    match args.command.unwrap_or(Command::Play) {
        Command::Play => play(&project_root, config, !args.no_watch, event_log),
        Command::Simulate { script } => simulate(&project_root, config, &script, event_log),
        Command::Chat => chat(&project_root, &config),
        Command::Inspect { model } => inspect(&project_root, &model),
    }
}

fn load_session(project_root: &Path, config: CitywalkConfig, event_log: Option<PathBuf>) -> GameSession {
    match GameSession::load(project_root, config) {
        Ok(mut session) => {
            if let Some(path) = event_log {
                session.log_events_to(path);
            }
            session
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn play(project_root: &Path, config: CitywalkConfig, hot_reload: bool, event_log: Option<PathBuf>) {
    let session = load_session(project_root, config, event_log);
    if let Err(e) = engine::run(session, hot_reload) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn simulate(project_root: &Path, config: CitywalkConfig, script: &str, event_log: Option<PathBuf>) {
    let script_path: PathBuf = project_root.join(script);
    let script = match script_runner::load_script(&script_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = load_session(project_root, config, event_log);
    let result = script_runner::run_script(&mut session, &script);

    let status = if result.passed { "PASS" } else { "FAIL" };
    println!(
        "{} {} ({} frames, {:.2}s game time)",
        status, result.name, result.frames, result.game_time
    );
    for failure in &result.failures {
        println!("  - {}", failure);
    }
    if !result.passed {
        std::process::exit(1);
    }
}

fn chat(project_root: &Path, config: &CitywalkConfig) {
    let npc_config = NpcConfig::load_or_default(&project_root.join(&config.assets.npc_config));
    let mut service = ChatService::new(npc_config);
    println!("{}: {}", service.npc_name(), service.greeting());

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("you: ");
        let _ = std::io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        let reply = service.send_message(line);
        println!("{}: {}", service.npc_name(), reply);
    }
}

fn inspect(project_root: &Path, model: &str) {
    let asset = match assets::load_model(project_root, model) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    println!("{}", asset.source);
    println!("  bounds: {:?} .. {:?}", asset.min, asset.max);
    println!("  height: {:.3}", asset.height());
    println!("  ground offset: {:.3}", asset.ground_offset(1.0));
    if asset.clips.is_empty() {
        println!("  clips: none");
    } else {
        println!("  clips:");
        for clip in &asset.clips {
            println!("    {} ({:.2}s)", clip.name, clip.duration);
        }
    }
}
