pub mod compile_db;
mod core;
pub mod executor;
pub mod generate;
pub mod invoke;

pub use compile_db::{
    CommandSpec, CompileCommand, read_compile_commands, write_compile_commands,
};
pub use core::{
    extract_compile_commands_json, generate_compile_commands_json, run_compile_commands_json,
};
pub use executor::{
    Executor, PoolExecutor, SequentialExecutor, Tally, executor_for, run_commands_in_parallel,
};
pub use generate::CompileCommands;
pub use invoke::{CommandWithResponse, InvocationContext, Outcome};
