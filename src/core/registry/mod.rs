mod client;
mod model;

pub use client::{ModrinthClient, RegistryApi, MODRINTH_PROD_BASE_URL, MODRINTH_STAGING_BASE_URL};
pub use model::{
    Dependency, DependencyType, File, FileHashes, PlatformRequirement, Project, Version,
};
