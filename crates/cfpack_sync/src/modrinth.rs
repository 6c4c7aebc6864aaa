//! Which files of a Modrinth pack get installed, and whether they may be
//! downloaded at all.

use cfpack_manifest::{ModpackFile, ModrinthIndex};
use url::Url;

use crate::error::{Error, Result};
use crate::options::ModrinthOptions;

/// Files of one index split by whether the chosen side wants them.
#[derive(Debug)]
pub struct ModrinthPlan<'a> {
    /// In index order.
    pub files: Vec<&'a ModpackFile>,
    /// Unsupported on this side, or optional and not included.
    pub excluded: Vec<&'a ModpackFile>,
}

/// Check every download URL in `index`, then split its files by side.
///
/// Runs before anything is written, so a pack pointing at a disallowed host
/// leaves the destination untouched.
pub fn plan_files<'a>(
    index: &'a ModrinthIndex,
    options: &ModrinthOptions,
) -> Result<ModrinthPlan<'a>> {
    if options.check_hosts {
        for url in index.files.iter().flat_map(|file| &file.downloads) {
            check_host(url, &options.allowed_hosts)?;
        }
    } else {
        tracing::warn!("Download host check disabled");
    }

    let (files, excluded) = index
        .files
        .iter()
        .partition(|file| file.is_wanted(options.side, options.include_optional));

    Ok(ModrinthPlan { files, excluded })
}

/// Fails unless `url` names one of `allowed` by domain. IP addresses are never
/// allowed.
pub fn check_host(url: &str, allowed: &[String]) -> Result<()> {
    let parsed = Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    match parsed.domain() {
        Some(domain) if allowed.iter().any(|host| host.eq_ignore_ascii_case(domain)) => Ok(()),
        _ => Err(Error::DisallowedHost {
            url: url.to_string(),
            host: parsed.host_str().unwrap_or_default().to_string(),
        }),
    }
}
