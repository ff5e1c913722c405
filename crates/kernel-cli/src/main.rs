use std::env;
use std::fs;

use contracts::{ActivityTimings, ActorId, Cube, EngineConfig, GroupId, Terrain};
use kernel_core::{
    ActorExpr, BoolExpr, Expr, PositionExpr, ProgramBuilder, SandboxWorld, Scenario, TaskFactory,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DEMO_TICKS: u64 = 60;
const DEMO_DT: f64 = 0.1;

fn print_usage() {
    println!("kernel-cli <command>");
    println!("commands:");
    println!("  demo [ticks] [--json]");
    println!("    runs the built-in survey and lumber scenario");
    println!("  check <scenario.json>");
    println!("    builds every task program and reports formation errors");
    println!("  run <scenario.json> [ticks] [--json]");
    println!("    loads the scenario and advances it, printing task events");
    println!("    --json prints one event object per line instead of text");
    println!("logging: RUST_LOG=debug kernel-cli ...");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_ticks(value: Option<&String>, default: u64) -> Result<u64, String> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| format!("invalid ticks: {raw}")),
    }
}

fn load_scenario(value: Option<&String>) -> Result<Scenario, String> {
    let path = value.ok_or_else(|| "missing scenario path".to_string())?;
    let raw = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    Scenario::from_json(&raw).map_err(|err| format!("invalid scenario {path}: {err}"))
}

fn demo_world() -> Result<SandboxWorld, String> {
    let config = EngineConfig {
        world_size: [12, 12, 8],
        timings: ActivityTimings {
            move_seconds_per_cube: 0.2,
            work_seconds: 0.5,
            attack_seconds: 0.5,
        },
        ..EngineConfig::default()
    };
    let crew = GroupId(1);
    let mut world = SandboxWorld::new(config);
    world.add_group(crew);
    world
        .spawn_actor(ActorId(1), crew, Cube::new(0, 0, 0))
        .map_err(|err| err.to_string())?;
    world
        .spawn_actor(ActorId(2), crew, Cube::new(2, 0, 0))
        .map_err(|err| err.to_string())?;
    let trees = [Cube::new(7, 0, 0), Cube::new(7, 2, 0)];
    for tree in trees {
        world
            .set_terrain(tree, Terrain::Tree)
            .map_err(|err| err.to_string())?;
    }
    world
        .set_terrain(Cube::new(0, 5, 0), Terrain::Workshop)
        .map_err(|err| err.to_string())?;

    // move_to (5,5,5); work (5,5,5)
    let mut b = ProgramBuilder::new();
    let go = b.move_to(PositionExpr::at(5, 5, 5));
    let inspect = b.work(PositionExpr::at(5, 5, 5));
    let root = b.sequence(vec![go, inspect]);
    let survey = b.finish(root).map_err(|err| err.to_string())?;

    // move_to next_to(selected); work selected; work log;
    // while carries_item(this) do move_to next_to(workshop); work workshop done;
    // print here
    let mut b = ProgramBuilder::new();
    let approach = b.move_to(PositionExpr::next_to(PositionExpr::Selected));
    let fell = b.work(PositionExpr::Selected);
    let pick = b.work(PositionExpr::Log);
    let haul = b.move_to(PositionExpr::next_to(PositionExpr::Workshop));
    let unload = b.work(PositionExpr::Workshop);
    let trip = b.sequence(vec![haul, unload]);
    let deliver = b.while_loop(BoolExpr::CarriesItem(ActorExpr::This), trip);
    let report = b.print(Expr::Position(PositionExpr::Here));
    let root = b.sequence(vec![approach, fell, pick, deliver, report]);
    let lumber = b.finish(root).map_err(|err| err.to_string())?;

    let mut factory = TaskFactory::new();
    let mut tasks = factory
        .create_tasks("survey", 10, survey, &[])
        .map_err(|err| err.to_string())?;
    tasks.extend(
        factory
            .create_tasks("lumber", 5, lumber, &trees)
            .map_err(|err| err.to_string())?,
    );
    for task in tasks {
        world.add_task(crew, task).map_err(|err| err.to_string())?;
    }
    Ok(world)
}

fn run_world(mut world: SandboxWorld, ticks: u64, dt: f64, json: bool) -> Result<(), String> {
    info!(ticks, dt, "running");
    for _ in 0..ticks {
        world.advance_time(dt);
        for event in world.drain_events() {
            if json {
                let line = serde_json::to_string(&event).map_err(|err| err.to_string())?;
                println!("{line}");
            } else {
                println!("{event}");
            }
        }
    }
    if !json {
        print_summary(&world);
    }
    Ok(())
}

fn print_summary(world: &SandboxWorld) {
    println!("-- tick {} --", world.current_tick());
    for task in world.runtime().board().iter() {
        println!("{} {} priority={} {:?}", task.id(), task.name(), task.priority(), task.status());
    }
    for (actor, state) in world.state().actors() {
        let carrying = state
            .carrying
            .map(|item| item.to_string())
            .unwrap_or_else(|| "nothing".to_string());
        println!(
            "{actor} at {} alive={} carrying {carrying} {}",
            state.position,
            state.alive,
            state.activity.label()
        );
    }
}

fn check_scenario(scenario: &Scenario) -> Result<(), String> {
    let mut factory = TaskFactory::new();
    let mut failures = 0_usize;
    for spec in &scenario.tasks {
        let outcome = spec
            .program
            .build()
            .and_then(|program| factory.create_tasks(&spec.name, spec.priority, program, &spec.targets));
        match outcome {
            Ok(tasks) => println!("ok {} ({} task(s))", spec.name, tasks.len()),
            Err(err) => {
                failures += 1;
                println!("rejected {}: {err}", spec.name);
            }
        }
    }
    SandboxWorld::from_scenario(scenario).map_err(|err| format!("scenario setup: {err}"))?;
    if failures > 0 {
        return Err(format!("{failures} task(s) rejected"));
    }
    Ok(())
}

fn main() {
    init_tracing();
    let mut args: Vec<String> = env::args().collect();
    let json = args.iter().any(|arg| arg == "--json");
    args.retain(|arg| arg != "--json");
    let command = args.get(1).map(String::as_str);

    let result = match command {
        Some("demo") => parse_ticks(args.get(2), DEFAULT_DEMO_TICKS)
            .and_then(|ticks| demo_world().and_then(|world| run_world(world, ticks, DEMO_DT, json))),
        Some("check") => load_scenario(args.get(2)).and_then(|scenario| check_scenario(&scenario)),
        Some("run") => load_scenario(args.get(2)).and_then(|scenario| {
            let ticks = parse_ticks(args.get(3), scenario.ticks)?;
            let world = SandboxWorld::from_scenario(&scenario).map_err(|err| err.to_string())?;
            run_world(world, ticks, scenario.dt, json)
        }),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
