use crate::core::registry::Version;

/// Pick the most recently published version that supports `loader`.
///
/// Timestamps are compared at whole-second precision. On an exact tie the
/// first maximum in listing order wins. Returns `None` when no version
/// supports the loader.
pub fn select_compatible<'v, I>(versions: I, loader: &str) -> Option<&'v Version>
where
    I: IntoIterator<Item = &'v Version>,
{
    let mut best: Option<&Version> = None;
    for candidate in versions.into_iter().filter(|v| v.supports_loader(loader)) {
        match best {
            Some(current) if candidate.published_secs() <= current.published_secs() => {}
            _ => best = Some(candidate),
        }
    }
    best
}
