//! Client self-update from published releases.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::constants::RELEASES_URL;
use crate::error::AldaError;
use crate::logging::Console;

const UPDATE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

/// Numeric components of a version tag such as `v2.3.1` or `release-2.3.1`.
pub fn parse_version(tag: &str) -> Option<Vec<u64>> {
    let start = tag.find(|c: char| c.is_ascii_digit())?;
    let core = tag[start..].split(['-', '+']).next()?;
    core.split('.').map(|part| part.parse().ok()).collect()
}

/// Whether `candidate` is strictly newer than `current`. Unparseable tags
/// never count as newer.
pub fn is_newer(current: &str, candidate: &str) -> bool {
    match (parse_version(current), parse_version(candidate)) {
        (Some(mut current), Some(mut candidate)) => {
            let len = current.len().max(candidate.len());
            current.resize(len, 0);
            candidate.resize(len, 0);
            candidate > current
        }
        _ => false,
    }
}

/// Pick the asset built for this platform.
pub fn select_asset<'a>(release: &'a Release, os: &str, arch: &str) -> Option<&'a Asset> {
    release.assets.iter().find(|asset| {
        let name = asset.name.to_ascii_lowercase();
        name.contains(os) && name.contains(arch)
    })
}

fn client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(UPDATE_TIMEOUT_SECS))
        .user_agent(concat!("alda-client/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to create HTTP client")
}

fn fetch_latest(client: &reqwest::blocking::Client) -> Result<Release> {
    let release = client
        .get(RELEASES_URL)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| AldaError::Update(format!("could not fetch release information: {e}")))?
        .json::<Release>()
        .map_err(|e| AldaError::Update(format!("malformed release information: {e}")))?;
    Ok(release)
}

/// Write `bytes` to a temporary file beside `target` and rename it into place.
pub fn replace_executable(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| AldaError::Update(format!("{} has no parent directory", target.display())))?;
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|source| AldaError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    staged.write_all(bytes).map_err(|source| AldaError::Io {
        path: staged.path().to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o755))
            .map_err(|source| AldaError::Io {
                path: staged.path().to_path_buf(),
                source,
            })?;
    }

    staged.persist(target).map_err(|e| AldaError::Io {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Install the latest release over the running executable if it is newer.
pub fn run(console: &Console) -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    let client = client()?;
    let release = fetch_latest(&client)?;
    debug!("latest release is {}", release.tag_name);

    if !is_newer(current, &release.tag_name) {
        console.msg(&format!("Already up to date (version {current})"));
        return Ok(());
    }

    let asset = select_asset(&release, std::env::consts::OS, std::env::consts::ARCH)
        .ok_or_else(|| {
            AldaError::Update(format!(
                "release {} has no build for {}-{}",
                release.tag_name,
                std::env::consts::OS,
                std::env::consts::ARCH
            ))
        })?;

    console.msg(&format!("Downloading {} ({})...", release.tag_name, asset.name));
    let bytes = client
        .get(&asset.browser_download_url)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| AldaError::Update(format!("download failed: {e}")))?;

    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    replace_executable(&exe, &bytes)?;
    info!("replaced {} with {}", exe.display(), asset.name);
    console.msg(&format!("Updated to {}", release.tag_name));
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
