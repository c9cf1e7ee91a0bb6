pub mod engine;
pub mod runspec;

pub use engine::{Engine, EngineType, ContainerState};
pub use runspec::RunSpec;

use crate::errors::*;
use crate::extensions::CommandExt;

/// Create and start a container from `spec`, by shelling out to
/// `docker create` followed by `docker start`. Split into two steps
/// (rather than one `docker run -d`) so a failed `create` never leaves a
/// started container behind to clean up.
pub fn create_and_start(engine: &Engine, spec: &RunSpec, verbose: bool) -> Result<()> {
    let args = runspec::to_args(spec);
    engine::subcommand(engine, "create").args(args).run(verbose)?;
    engine::container_start(engine, &spec.name, verbose)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_type_is_reexported() {
        let _ = EngineType::Docker;
    }
}
