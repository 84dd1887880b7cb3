use std::rc::Rc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zephyr::{
    shared_map, Chunk, ChunkKind, EntityWorld, EventArgs, Interpreter, OpCode, ScriptDefinition,
    ScriptRegistry, SharedValueMap, ValueMap, VmConfig, ZephyrValue,
};

#[derive(Parser)]
#[command(version, about = "Zephyr scripting core tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in demo script against a small entity world
    Demo,
    /// Print the disassembly of the built-in demo script
    Disasm,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Disasm => print_disassembly(),
    }
}

/// Hand-assembled stand-in for compiler output; the front end that would
/// emit this from source lives with the individual games.
///
/// The script reads roughly as:
///
/// ```text
/// var health = 100
/// var speed = 2.5
/// var target = "drone"
///
/// state Patrol {
///     var pos = vec2(3, 4)
///     pos.x = pos.x + speed
/// }
///
/// on damage(amount) {
///     health = health - amount
///     fire target.report_hit(remaining = health)
/// }
/// ```
fn build_sentry_script() -> ScriptDefinition {
    let mut global = Chunk::new("sentry", ChunkKind::Global);
    emit_store_number(&mut global, "health", 100.0);
    emit_store_number(&mut global, "speed", 2.5);
    global.emit_push_string("target");
    global.emit_push_string("drone");
    global.write_op(OpCode::StoreVariable);

    let mut patrol = Chunk::new("Patrol", ChunkKind::State);
    patrol.emit_push_string("pos");
    patrol.emit_push_vec2(3.0, 4.0);
    patrol.write_op(OpCode::StoreVariable);
    patrol.emit_push_string("pos.x");
    patrol.emit_push_string("pos.x");
    patrol.write_op(OpCode::LoadVariable);
    patrol.emit_push_string("speed");
    patrol.write_op(OpCode::LoadVariable);
    patrol.write_op(OpCode::Add);
    patrol.write_op(OpCode::StoreVariable);

    let mut on_damage = Chunk::new("on_damage", ChunkKind::Event);
    on_damage.emit_push_string("health");
    on_damage.emit_push_string("health");
    on_damage.write_op(OpCode::LoadVariable);
    on_damage.emit_push_string("amount");
    on_damage.write_op(OpCode::LoadVariable);
    on_damage.write_op(OpCode::Subtract);
    on_damage.write_op(OpCode::StoreVariable);
    on_damage.emit_push_string("target");
    on_damage.emit_push_string("report_hit");
    on_damage.emit_push_string("remaining");
    on_damage.emit_push_string("health");
    on_damage.write_op(OpCode::LoadVariable);
    on_damage.emit_fire_event(1);

    let mut definition = ScriptDefinition::new("sentry", global);
    definition.add_chunk(patrol);
    definition.add_chunk(on_damage);
    definition
}

fn emit_store_number(chunk: &mut Chunk, name: &str, value: f32) {
    chunk.emit_push_string(name);
    chunk.emit_push_number(value);
    chunk.write_op(OpCode::StoreVariable);
}

fn run_demo() {
    let config = VmConfig::load();
    let mut registry = ScriptRegistry::new();
    let definition = registry.register("demos/sentry.zephyr", build_sentry_script());

    let mut world = EntityWorld::new();
    let sentry = world.spawn("sentry");
    if !sentry.bind_script(Rc::clone(&definition)) {
        return;
    }
    let sentry_vars = sentry.variables();
    world.spawn("drone");

    let patrol_vars = shared_map(ValueMap::new());
    let mut interpreter = Interpreter::with_config(config);

    interpreter.begin_frame();
    // Spawn: global chunk first, then the first declared state.
    interpreter.interpret_state_chunk(
        definition.global_chunk(),
        &sentry_vars,
        Some(&mut world),
        None,
    );
    if let Some(initial) = definition.initial_state_chunk() {
        interpreter.interpret_state_chunk(
            initial,
            &sentry_vars,
            Some(&mut world),
            Some(&patrol_vars),
        );
    }
    // A game event lands.
    let mut args = EventArgs::new();
    args.set("amount", ZephyrValue::Number(12.0));
    if let Some(handler) = definition.chunk("on_damage") {
        interpreter.interpret_event_chunk(
            handler,
            &sentry_vars,
            Some(&mut world),
            &args,
            Some(&patrol_vars),
        );
    }
    interpreter.end_frame();

    println!("sentry globals:");
    print_map(&sentry_vars);
    println!("patrol state:");
    print_map(&patrol_vars);
    if let Some(drone) = world.entity("drone") {
        println!("events received by drone:");
        for (event, args) in drone.received_events() {
            let rendered: Vec<String> = args
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            println!("  {}({})", event, rendered.join(", "));
        }
    }
}

fn print_map(vars: &SharedValueMap) {
    let map = vars.borrow();
    let mut entries: Vec<(&String, &ZephyrValue)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in entries {
        println!("  {} = {}", name, value);
    }
}

fn print_disassembly() {
    let definition = build_sentry_script();
    print!("{}", definition.global_chunk().disassemble());
    for chunk in definition.state_chunks() {
        print!("{}", chunk.disassemble());
    }
    for chunk in definition.event_chunks() {
        print!("{}", chunk.disassemble());
    }
}
