use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{info, warn};

use sim_core::network::{publish_latest, start_snapshot_feed, SnapshotFeed};
use sim_core::{
    build_headless_app, run_turn, ColonyRegistry, EnergyEventLog, EnvironmentState, EpisodeStatus,
    EventLog, FoodTypeConfig, GridWorld, PendingActions, PlayerId, SimulationConfig,
    SimulationTick, SnapshotHistory, SpatialIndex, TerritoryLedger, WorldRng,
};
use sim_schema::command_text::{parse_command_line, ControlCommand};
use sim_schema::TraitRecord;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut app = build_headless_app();
    let config = app.world.resource::<SimulationConfig>().clone();

    let feed = start_snapshot_feed(config.snapshot_bind);
    let command_rx = spawn_command_listener(config.command_bind);

    // First update runs the startup schedule and materializes the world.
    run_turn(&mut app);
    publish_latest(feed.as_ref(), app.world.resource::<SnapshotHistory>());

    info!(
        command_bind = %config.command_bind,
        snapshot_bind = %config.snapshot_bind,
        "headless creature-world server ready"
    );

    while let Ok(command) = command_rx.recv() {
        match command {
            ControlCommand::Tick { steps } => {
                for _ in 0..steps {
                    step(&mut app, feed.as_ref());
                }
            }
            ControlCommand::Spawn { count, traits } => {
                handle_spawn(&mut app, count, traits);
            }
            ControlCommand::Status => report_status(&app),
            ControlCommand::Reset => {
                handle_reset(&mut app);
                publish_latest(feed.as_ref(), app.world.resource::<SnapshotHistory>());
            }
        }
    }
}

fn spawn_command_listener(bind_addr: std::net::SocketAddr) -> Receiver<ControlCommand> {
    let listener = TcpListener::bind(bind_addr).expect("command listener bind failed");
    listener
        .set_nonblocking(true)
        .expect("set_nonblocking failed");

    let (sender, receiver) = unbounded::<ControlCommand>();
    thread::spawn(move || loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!("Command client connected: {}", addr);
                let sender = sender.clone();
                thread::spawn(move || handle_client(stream, sender));
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(std::time::Duration::from_millis(50));
            }
            Err(err) => {
                warn!("Error accepting command client: {}", err);
                thread::sleep(std::time::Duration::from_millis(200));
            }
        }
    });

    receiver
}

fn handle_client(stream: std::net::TcpStream, sender: Sender<ControlCommand>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command_line(&line) {
                    Ok(command) => {
                        if sender.send(command).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("Rejected command '{}': {}", line.trim(), err),
                }
            }
            Err(err) => {
                warn!("Command read error: {}", err);
                break;
            }
        }
    }
}

fn step(app: &mut bevy::prelude::App, feed: Option<&SnapshotFeed>) {
    run_turn(app);
    publish_latest(feed, app.world.resource::<SnapshotHistory>());

    let tick = app.world.resource::<SimulationTick>().0;
    let world = app.world.resource::<GridWorld>();
    info!(
        target: "creature_world::server",
        tick,
        living = world.living_count(),
        food = world.food.len(),
        "turn.completed"
    );
}

fn handle_spawn(app: &mut bevy::prelude::App, count: u32, traits: TraitRecord) {
    app.world
        .resource_scope(|world, mut grid: bevy::prelude::Mut<GridWorld>| {
            let mut rng = world.resource_mut::<WorldRng>();
            grid.populate(&traits, count as usize, Some(PlayerId(1)), &mut rng.0);
        });
    info!(
        target: "creature_world::server",
        count,
        color = %traits.color,
        diet = traits.diet.as_str(),
        "spawn.applied"
    );
}

fn report_status(app: &bevy::prelude::App) {
    let tick = app.world.resource::<SimulationTick>().0;
    let world = app.world.resource::<GridWorld>();
    let status = app.world.resource::<EpisodeStatus>();
    let territories = app.world.resource::<TerritoryLedger>();
    let colonies = app.world.resource::<ColonyRegistry>();
    info!(
        target: "creature_world::server",
        tick,
        agents = world.agents.len(),
        living = world.living_count(),
        max_stage = world.max_stage,
        food = world.food.len(),
        colonies = colonies.colony_count(),
        territories = territories.len(),
        extinct = status.extinct,
        "status"
    );
}

/// Tears the episode down in place: fresh grid, population, food, and
/// hazards; all registries and counters cleared.
fn handle_reset(app: &mut bevy::prelude::App) {
    app.world
        .resource_scope(|world, mut grid: bevy::prelude::Mut<GridWorld>| {
            let config = world.resource::<SimulationConfig>().clone();
            {
                let mut rng = world.resource_mut::<WorldRng>();
                let rng = &mut rng.0;
                *grid = GridWorld::new(
                    config.grid_width,
                    config.grid_height,
                    FoodTypeConfig::generate(rng),
                );
                grid.populate(
                    &TraitRecord::default(),
                    config.initial_population,
                    Some(PlayerId(1)),
                    rng,
                );
                grid.spawn_resources(config.initial_food, rng);
            }
            world.resource_scope(|world, mut env: bevy::prelude::Mut<EnvironmentState>| {
                let mut rng = world.resource_mut::<WorldRng>();
                *env = EnvironmentState::default();
                env.seed_hazards(&grid, &mut rng.0);
            });
            world
                .resource_mut::<SpatialIndex>()
                .rebuild(&grid);
        });

    app.world.resource_mut::<ColonyRegistry>().clear();
    app.world.resource_mut::<TerritoryLedger>().clear();
    app.world.resource_mut::<PendingActions>().clear();
    app.world.resource_mut::<EventLog>().reset_turn();
    app.world.resource_mut::<EnergyEventLog>().reset();
    app.world.resource_mut::<SimulationTick>().0 = 0;
    *app.world.resource_mut::<EpisodeStatus>() = EpisodeStatus::default();

    let limit = app
        .world
        .resource::<SimulationConfig>()
        .snapshot_history_limit;
    *app.world.resource_mut::<SnapshotHistory>() = SnapshotHistory::new(limit);

    warn!(
        target: "creature_world::server",
        "episode reset -- clients should reconnect to receive fresh state"
    );
}
