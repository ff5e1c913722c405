use contracts::{ActorId, Cube, EngineConfig, GroupId, TaskEventType, TaskStatus, Value};
use kernel_core::{
    BoolExpr, EvaluationError, Expr, PositionExpr, ProgramBuilder, SandboxWorld, Scenario,
    TaskRuntime, TickOutcome,
};
use serde_json::json;

const CREW: GroupId = GroupId(1);
const WORKER: ActorId = ActorId(1);

fn base_world(config: EngineConfig) -> SandboxWorld {
    let mut world = SandboxWorld::new(config);
    world.add_group(CREW);
    world
        .spawn_actor(WORKER, CREW, Cube::new(0, 0, 0))
        .expect("worker spawned");
    world
}

#[test]
fn zero_cost_infinite_loop_is_suspended_each_tick() {
    let mut world = base_world(EngineConfig {
        max_steps_per_tick: 64,
        ..EngineConfig::default()
    });
    let mut b = ProgramBuilder::new();
    let flip = b.assign("flag", BoolExpr::Literal(true));
    let lp = b.while_loop(BoolExpr::Literal(true), flip);
    let task = world
        .create_tasks(CREW, "spin", 0, b.finish(lp).expect("built"), &[])
        .expect("scheduled")[0];

    world.run_ticks(3, 0.1);
    assert_eq!(
        world.runtime().task(task).map(|task| task.status()),
        Some(TaskStatus::AssignedTo(WORKER))
    );
    let executor = world.runtime().executor(WORKER).expect("still running");
    assert_eq!(executor.variable("flag"), Some(Value::Boolean(true)));
    assert_eq!(executor.call_stack().first(), Some(&lp));
}

#[test]
fn variable_of_the_wrong_kind_fails_the_task() {
    let mut world = base_world(EngineConfig::default());
    let mut b = ProgramBuilder::new();
    let bind = b.assign("spot", PositionExpr::Here);
    let noop = b.no_op();
    let check = b.if_then(BoolExpr::variable("spot"), noop, None);
    let root = b.sequence(vec![bind, check]);
    let task = world
        .create_tasks(CREW, "confused", 0, b.finish(root).expect("built"), &[])
        .expect("scheduled")[0];

    let metrics = world.advance_time(0.1);
    assert_eq!(metrics.failed_tasks, 1);
    let failure = world
        .events()
        .iter()
        .find(|event| event.event_type == TaskEventType::TaskFailed)
        .expect("failure recorded");
    assert_eq!(failure.task_id, task);
    assert_eq!(failure.actor_id, Some(WORKER));
    let message = failure
        .details
        .as_ref()
        .and_then(|details| details.get("error"))
        .and_then(serde_json::Value::as_str)
        .expect("error text");
    assert!(message.contains("spot"));
}

#[test]
fn runtime_reports_failures_to_direct_callers() {
    let mut world = SandboxWorld::new(EngineConfig::default());
    world.add_group(CREW);
    world
        .spawn_actor(WORKER, CREW, Cube::new(0, 0, 0))
        .expect("spawned");

    let mut runtime = TaskRuntime::new(100);
    runtime.register_group(CREW);
    let mut b = ProgramBuilder::new();
    let show = b.print(Expr::Bool(BoolExpr::variable("missing")));
    let task = kernel_core::Task::new(
        contracts::TaskId(7),
        "unbound",
        0,
        b.finish(show).expect("built"),
    )
    .expect("task");
    runtime.add_task(CREW, task).expect("added");
    runtime.assign_idle(WORKER, CREW);

    let mut state = world.state().clone();
    assert_eq!(
        runtime.run_actor(&mut state, WORKER, 0.1),
        TickOutcome::Failed(
            contracts::TaskId(7),
            EvaluationError::UnboundVariable("missing".to_string())
        )
    );
}

#[test]
fn events_are_ordered_within_and_across_ticks() {
    let mut world = base_world(EngineConfig::default());
    for name in ["first", "second"] {
        let mut b = ProgramBuilder::new();
        let show = b.print(BoolExpr::Literal(true));
        world
            .create_tasks(CREW, name, 0, b.finish(show).expect("built"), &[])
            .expect("scheduled");
    }
    world.run_ticks(3, 0.1);

    let keys: Vec<(u64, u64)> = world
        .events()
        .iter()
        .map(|event| (event.tick, event.sequence_in_tick))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    let printed = world
        .events()
        .iter()
        .filter(|event| event.event_type == TaskEventType::TaskPrinted)
        .count();
    assert_eq!(printed, 2);
}

#[test]
fn scenario_document_runs_end_to_end() {
    let document = json!({
        "config": {
            "world_size": [10, 10, 4],
            "timings": { "move_seconds_per_cube": 0.1, "work_seconds": 0.2 }
        },
        "terrain": [ { "cube": { "x": 3, "y": 0, "z": 0 }, "terrain": "tree" } ],
        "groups": [1],
        "actors": [ { "id": 1, "group": 1, "position": { "x": 0, "y": 0, "z": 0 } } ],
        "tasks": [ {
            "name": "fell",
            "groups": [1],
            "priority": 2,
            "targets": [ { "x": 3, "y": 0, "z": 0 } ],
            "program": { "op": "sequence", "body": [
                { "op": "move_to", "target": { "next_to": "selected" } },
                { "op": "work", "target": "selected" },
                { "op": "print", "value": { "position": "log" } }
            ] }
        } ],
        "ticks": 12
    });
    let scenario = Scenario::from_json(&document.to_string()).expect("scenario");
    let mut world = SandboxWorld::from_scenario(&scenario).expect("world");
    world.run_ticks(scenario.ticks, scenario.dt);

    assert!(world.state().logs().contains(&Cube::new(3, 0, 0)));
    let printed = world
        .events()
        .iter()
        .find(|event| event.event_type == TaskEventType::TaskPrinted)
        .and_then(|event| event.details.clone())
        .expect("print recorded");
    assert_eq!(
        printed["value"],
        json!({ "kind": "position", "value": { "x": 3, "y": 0, "z": 0 } })
    );
}

#[test]
fn bundled_demo_scenario_builds() {
    let scenario =
        Scenario::from_json(include_str!("../../../demos/lumber.json")).expect("scenario");
    let mut world = SandboxWorld::from_scenario(&scenario).expect("world");
    assert_eq!(world.runtime().board().len(), 4);

    world.advance_time(scenario.dt);
    assert!(world.current_task(WORKER).is_some());
    assert!(world.current_task(ActorId(3)).is_some());
}

#[test]
fn shared_task_runs_on_one_actor_at_a_time() {
    let mut world = base_world(EngineConfig::default());
    let guards = GroupId(2);
    world.add_group(guards);
    world
        .spawn_actor(ActorId(2), CREW, Cube::new(1, 0, 0))
        .expect("second worker");
    world
        .spawn_actor(ActorId(3), guards, Cube::new(2, 0, 0))
        .expect("guard");

    let mut b = ProgramBuilder::new();
    let go = b.move_to(PositionExpr::Literal(Cube::new(9, 9, 0)));
    let task = world
        .create_tasks(CREW, "patrol", 0, b.finish(go).expect("built"), &[])
        .expect("scheduled")[0];
    world.share_task(guards, task).expect("shared");

    for _ in 0..3 {
        world.advance_time(0.1);
        let owners: Vec<ActorId> = [ActorId(1), ActorId(2), ActorId(3)]
            .into_iter()
            .filter(|actor| world.current_task(*actor) == Some(task))
            .collect();
        assert_eq!(owners, vec![WORKER]);
        assert_eq!(
            world.runtime().task(task).map(|task| task.status()),
            Some(TaskStatus::AssignedTo(WORKER))
        );
    }
}
