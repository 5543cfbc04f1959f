mod compose;
mod manager;

pub use compose::{CommandOutput, ComposeError, ComposeRunner};
pub use manager::{ContainerState, ContainerStats, DockerError, DockerManager};
