mod diff;
mod run;

pub use diff::{run_diff, DiffArgs};
pub use run::{run_matrix, RunArgs};
