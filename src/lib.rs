//! Zephyr is the bytecode scripting core shared by our game projects: a
//! small compiled language that drives entity behavior through state
//! machines and event handlers.
//!
//! The compiler front end (lexer, parser, emitter) and the entity layer
//! both live with the individual games. This crate owns everything in
//! between: [`token::Token`] as the front-end boundary type, compiled
//! [`chunk::Chunk`]s grouped into [`definition::ScriptDefinition`]s, and the
//! stack VM behind the two [`interpreter::Interpreter`] entry points.
//!
//! Scripts run to completion inside the game frame that invoked them. They
//! read and write three variable scopes (event, state, entity globals, in
//! that order) and may reach other entities through dotted identifier
//! chains like `target.health`. A script error logs, halts that one call,
//! and nothing else.

pub mod chunk;
pub mod config;
pub mod definition;
pub mod error;
pub mod interpreter;
pub mod member;
pub mod opcode;
pub mod token;
pub mod value;
mod vm;
pub mod world;

pub use chunk::{Chunk, ChunkKind};
pub use config::VmConfig;
pub use definition::{ScriptDefinition, ScriptRegistry};
pub use error::RuntimeError;
pub use interpreter::{EventArgs, Interpreter, ScriptableEntity, ZephyrHost};
pub use member::MemberAccess;
pub use opcode::OpCode;
pub use token::{Token, TokenKind};
pub use value::{shared_map, SharedValueMap, ValueMap, ZephyrValue};
pub use world::{EntityWorld, ScriptedEntity};
