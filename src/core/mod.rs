// ─── modpull core ───
// Registry-backed resolver for Minecraft mods, datapacks and plugins.
//
// Architecture:
//   core/
//     registry/   — Modrinth wire model + read-only API client
//     resolver/   — Version selection, policy, recursive dependency walk
//     downloader/ — Artifact fetch into staging with SHA-512 validation
//     placement   — Copy verified artifacts into the output directory
//     state/      — Settings file and lockfile on disk
//     http        — Shared reqwest client (user agent, credential)

pub mod downloader;
pub mod error;
pub mod http;
pub mod placement;
pub mod registry;
pub mod resolver;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
