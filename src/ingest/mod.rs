/// Input collaborators that hand validated values to the core.
///
/// Submodules:
/// - `input` — text tokens → `Measurement`, with typed validation failures.

pub mod input;
