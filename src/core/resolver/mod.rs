mod policy;
#[allow(clippy::module_inception)]
mod resolver;
mod run;
mod selector;

pub use policy::{
    validate_server_side, DedupPolicy, Denylist, LockIndex, ResolvePolicy, RootSpec, Target,
    DEFAULT_MAX_DEPTH,
};
pub use resolver::{DependencyResolver, RequiredBy, SkippedProject};
pub use run::{resolve_and_place, RunRequest, RunSummary};
pub use selector::select_compatible;
