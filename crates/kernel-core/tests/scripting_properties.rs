use contracts::{
    ActivityTimings, ActorId, Cube, EngineConfig, GroupId, Progress, TaskEventType, TaskId,
    TaskStatus,
};
use kernel_core::scan::nearest_match;
use kernel_core::{
    BoolExpr, FormationError, PositionExpr, Program, ProgramBuilder, SandboxWorld, Scheduler,
    Task, TaskBoard, TaskFactory, WorldError, WorldQuery,
};
use proptest::prelude::*;

const CREW: GroupId = GroupId(1);
const WORKER: ActorId = ActorId(1);

fn config(move_seconds_per_cube: f64, work_seconds: f64) -> EngineConfig {
    EngineConfig {
        timings: ActivityTimings {
            move_seconds_per_cube,
            work_seconds,
            attack_seconds: 1.0,
        },
        ..EngineConfig::default()
    }
}

fn world_with_worker(config: EngineConfig) -> SandboxWorld {
    let mut world = SandboxWorld::new(config);
    world.add_group(CREW);
    world
        .spawn_actor(WORKER, CREW, Cube::new(0, 0, 0))
        .expect("worker spawned");
    world
}

fn schedule(world: &mut SandboxWorld, name: &str, priority: i64, program: Program) -> TaskId {
    world
        .create_tasks(CREW, name, priority, program, &[])
        .expect("scheduled")[0]
}

fn status(world: &SandboxWorld, task: TaskId) -> Option<TaskStatus> {
    world.runtime().task(task).map(Task::status)
}

fn visible(world: &SandboxWorld) -> Vec<TaskId> {
    world
        .runtime()
        .scheduler(CREW)
        .expect("crew scheduler")
        .tasks_by_descending_priority(world.runtime().board())
        .map(Task::id)
        .collect()
}

fn no_op() -> Program {
    let mut b = ProgramBuilder::new();
    let root = b.no_op();
    b.finish(root).expect("built")
}

fn move_then_work(target: Cube) -> Program {
    let mut b = ProgramBuilder::new();
    let go = b.move_to(PositionExpr::Literal(target));
    let work = b.work(PositionExpr::Literal(target));
    let root = b.sequence(vec![go, work]);
    b.finish(root).expect("built")
}

#[test]
fn property_1_break_outside_a_loop_never_reaches_a_scheduler() {
    let mut world = world_with_worker(EngineConfig::default());
    let mut b = ProgramBuilder::new();
    let stop = b.break_loop();
    let noop = b.no_op();
    let guard = b.if_then(BoolExpr::Literal(true), stop, Some(noop));
    let root = b.sequence(vec![guard]);
    let program = b.finish(root).expect("structurally fine");

    let result = world.create_tasks(CREW, "stray break", 0, program, &[]);
    assert_eq!(
        result,
        Err(WorldError::Formation(FormationError::UnboundBreak(stop)))
    );
    assert!(world.runtime().board().is_empty());
    assert!(world.runtime().scheduler(CREW).is_some_and(Scheduler::is_empty));
}

#[test]
fn property_2_false_while_completes_in_the_same_tick() {
    let mut world = world_with_worker(EngineConfig::default());
    let mut b = ProgramBuilder::new();
    let body = b.move_to(PositionExpr::Literal(Cube::new(3, 3, 3)));
    let lp = b.while_loop(BoolExpr::Literal(false), body);
    let task = schedule(&mut world, "never", 0, b.finish(lp).expect("built"));

    world.advance_time(0.1);
    assert_eq!(status(&world, task), Some(TaskStatus::Completed));
    assert_eq!(world.actor_position(WORKER), Some(Cube::new(0, 0, 0)));
}

#[test]
fn property_3_sequence_children_run_strictly_in_order() {
    let mut world = world_with_worker(config(0.1, 0.3));
    let task = schedule(&mut world, "visit", 0, move_then_work(Cube::new(2, 0, 0)));

    world.advance_time(0.1);
    let root = world.runtime().task(task).expect("task").program().root();
    let executor = world.runtime().executor(WORKER).expect("running");
    assert_eq!(executor.progress(root), Progress::Active);
    let stack = executor.call_stack();
    assert_eq!(stack.len(), 2);

    // The move needs two cubes; the work leaf is only entered once it is done.
    let first = stack[1];
    let work = world
        .runtime()
        .task(task)
        .expect("task")
        .program()
        .subtree(root)[2];
    assert_eq!(executor.progress(work), Progress::NotStarted);
    world.advance_time(0.1);
    let executor = world.runtime().executor(WORKER).expect("running");
    assert_eq!(executor.progress(first), Progress::Completed);
    // Entered during the settle pass, but not started without allowance.
    assert_eq!(executor.call_stack(), vec![root, work]);
    assert_eq!(executor.progress(work), Progress::NotStarted);

    world.advance_time(0.1);
    let executor = world.runtime().executor(WORKER).expect("running");
    assert_eq!(executor.progress(work), Progress::Active);
}

#[test]
fn property_5_interrupt_mid_move_restarts_from_scratch() {
    let mut world = world_with_worker(config(0.5, 0.5));
    let task = schedule(&mut world, "walk", 0, move_then_work(Cube::new(6, 0, 0)));

    world.run_ticks(3, 0.1);
    let root = world.runtime().task(task).expect("task").program().root();
    assert_eq!(
        world.runtime().executor(WORKER).map(|e| e.progress(root)),
        Some(Progress::Active)
    );

    assert_eq!(world.interrupt(WORKER), Ok(Some(task)));
    assert_eq!(status(&world, task), Some(TaskStatus::Unassigned));
    assert!(world.runtime().executor(WORKER).is_none());
    assert!(world
        .state()
        .actor(WORKER)
        .is_some_and(|actor| actor.activity.is_idle()));

    // Reassignment starts a fresh executor: every statement begins NotStarted,
    // then the first visit re-enters the tree from the root.
    world.advance_time(0.1);
    assert_eq!(status(&world, task), Some(TaskStatus::AssignedTo(WORKER)));
    let executor = world.runtime().executor(WORKER).expect("running again");
    assert_eq!(executor.call_stack().first(), Some(&root));
    let assigned = world
        .events()
        .iter()
        .filter(|event| event.event_type == TaskEventType::TaskAssigned)
        .count();
    assert_eq!(assigned, 2);
}

#[test]
fn property_6_completed_tasks_are_never_yielded() {
    let mut world = world_with_worker(config(0.1, 0.1));
    let a = schedule(&mut world, "A", 5, no_op());
    let b = schedule(&mut world, "B", 10, no_op());
    let c = schedule(&mut world, "C", 10, no_op());
    assert_eq!(visible(&world), vec![b, c, a]);

    world.advance_time(0.1);
    assert_eq!(status(&world, b), Some(TaskStatus::Completed));
    assert_eq!(visible(&world), vec![c, a]);

    world.run_ticks(2, 0.1);
    assert!(visible(&world).is_empty());
    assert_eq!(
        world.runtime().scheduler(CREW).map(Scheduler::len),
        Some(3)
    );
}

#[test]
fn property_7_replace_keeps_the_slot() {
    let mut board = TaskBoard::new();
    let mut factory = TaskFactory::new();
    let mut scheduler = Scheduler::new(CREW);
    let mut ids = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let task = factory
            .create_tasks(name, 1, no_op(), &[])
            .expect("task")
            .remove(0);
        ids.push(task.id());
        board.insert(task);
    }
    let [a, b, c, d] = [ids[0], ids[1], ids[2], ids[3]];
    for id in [a, b, c] {
        scheduler.add_task(&mut board, id).expect("added");
    }

    scheduler.replace(&mut board, b, d).expect("replaced");
    let order: Vec<TaskId> = scheduler
        .tasks_by_descending_priority(&board)
        .map(Task::id)
        .collect();
    assert_eq!(order, vec![a, d, c]);
}

#[test]
fn property_8_move_then_work_completes_after_exactly_five_ticks() {
    let mut world = world_with_worker(config(0.06, 0.2));
    let task = schedule(&mut world, "survey", 0, move_then_work(Cube::new(5, 5, 5)));

    for _ in 0..4 {
        world.advance_time(0.1);
        assert_eq!(status(&world, task), Some(TaskStatus::AssignedTo(WORKER)));
    }
    assert_eq!(world.actor_position(WORKER), Some(Cube::new(5, 5, 5)));

    world.advance_time(0.1);
    assert_eq!(status(&world, task), Some(TaskStatus::Completed));
    assert!(visible(&world).is_empty());
    assert_eq!(world.current_task(WORKER), None);
}

proptest! {
    #[test]
    fn property_4_scan_is_idempotent_and_nearest(
        logs in proptest::collection::vec((0_i32..16, 0_i32..16, 0_i32..4), 1..12),
        origin in (0_i32..16, 0_i32..16, 0_i32..4),
    ) {
        let mut world = SandboxWorld::new(EngineConfig {
            world_size: [16, 16, 4],
            ..EngineConfig::default()
        });
        for (x, y, z) in &logs {
            world.place_log(Cube::new(*x, *y, *z)).expect("in bounds");
        }
        let origin = Cube::new(origin.0, origin.1, origin.2);
        let state = world.state();

        let first = nearest_match(state, origin, |cube| state.has_log(cube));
        let second = nearest_match(state, origin, |cube| state.has_log(cube));
        prop_assert_eq!(first, second);

        let found = first.expect("a log exists");
        let nearest = logs
            .iter()
            .map(|(x, y, z)| origin.chebyshev_distance(&Cube::new(*x, *y, *z)))
            .min()
            .expect("non-empty");
        prop_assert_eq!(origin.chebyshev_distance(&found), nearest);
    }

    #[test]
    fn property_9_iteration_orders_by_priority_then_insertion(
        priorities in proptest::collection::vec(-5_i64..5, 1..20),
    ) {
        let mut board = TaskBoard::new();
        let mut scheduler = Scheduler::new(CREW);
        for (index, priority) in priorities.iter().enumerate() {
            let id = TaskId(index as u64 + 1);
            board.insert(Task::new(id, "t", *priority, no_op()).expect("task"));
            scheduler.add_task(&mut board, id).expect("added");
        }

        let order: Vec<(i64, u64)> = scheduler
            .tasks_by_descending_priority(&board)
            .map(|task| (task.priority(), task.id().0))
            .collect();
        let mut expected = order.clone();
        expected.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.cmp(&right.1)));
        prop_assert_eq!(order.len(), priorities.len());
        prop_assert_eq!(order, expected);
    }

    #[test]
    fn property_10_break_is_bound_only_under_a_while(depth in 0_usize..6, looped in any::<bool>()) {
        let mut b = ProgramBuilder::new();
        let stop = b.break_loop();
        let mut current = stop;
        for _ in 0..depth {
            current = b.if_then(BoolExpr::Literal(true), current, None);
        }
        let root = if looped {
            b.while_loop(BoolExpr::Literal(true), current)
        } else {
            b.sequence(vec![current])
        };
        let program = b.finish(root).expect("structurally fine");

        let result = Task::new(TaskId(1), "nested", 0, program);
        if looped {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result.err(), Some(FormationError::UnboundBreak(stop)));
        }
    }
}
