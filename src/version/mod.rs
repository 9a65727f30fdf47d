//! Version check (component I): poll the release feed, filter
//! drafts/prereleases/pre-release-keyword tags, compare with semver.
//!
//! Grounded directly on the teacher's `auto_update/releases_api.rs`
//! (`fetch_latest_release`, GitHub releases JSON shape, `reqwest::Client`
//! with a fixed `User-Agent` and timeout).

use std::time::Duration;

use semver::Version;
use serde::Deserialize;

const GITHUB_API_URL: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const BLOCKED_KEYWORDS: &[&str] = &["-beta", "-rc", "-alpha", "-dev", "-preview", "-snapshot"];

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    prerelease: bool,
    draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub tag: String,
}

fn is_blocked(tag_lower: &str) -> bool {
    BLOCKED_KEYWORDS.iter().any(|kw| tag_lower.contains(kw))
}

/// Fetches `/releases?per_page=5&page=1` from `owner/repo` and returns the
/// first entry that is neither draft nor prerelease and whose lowercased
/// name contains none of the blocked keywords (spec §4.I).
pub async fn fetch_latest_release(client: &reqwest::Client, owner: &str, repo: &str) -> anyhow::Result<Option<LatestRelease>> {
    let url = format!("{GITHUB_API_URL}/repos/{owner}/{repo}/releases?per_page=5&page=1");

    let response = client
        .get(&url)
        .header("Accept", "application/vnd.github.v3+json")
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("GitHub API returned status: {}", response.status());
    }

    let releases: Vec<GitHubRelease> = response.json().await?;
    Ok(releases
        .into_iter()
        .find(|r| !r.draft && !r.prerelease && !is_blocked(&r.tag_name.to_lowercase()))
        .map(|r| LatestRelease { tag: r.tag_name }))
}

pub fn build_client(product: &str) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(format!("{product}-Version-Checker"))
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// True iff `candidate` parses as a semver strictly greater than `current`.
/// Invalid or empty inputs compare as "not newer" (spec §4.I).
pub fn is_newer(current: &str, candidate: &str) -> bool {
    let normalize = |s: &str| s.trim_start_matches('v').to_string();
    let current = Version::parse(&normalize(current));
    let candidate = Version::parse(&normalize(candidate));
    match (current, candidate) {
        (Ok(current), Ok(candidate)) => candidate > current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_prerelease_keywords() {
        assert!(is_blocked("2.0.0-beta"));
        assert!(is_blocked("2.0.0-RC".to_lowercase().as_str()));
        assert!(!is_blocked("2.0.0"));
    }

    #[test]
    fn semver_precedence_is_standard() {
        assert!(is_newer("1.2.3", "1.3.0"));
        assert!(!is_newer("1.3.0", "1.2.3"));
        assert!(!is_newer("1.2.3", "1.2.3"));
    }

    #[test]
    fn invalid_or_empty_inputs_are_not_newer() {
        assert!(!is_newer("", "1.0.0"));
        assert!(!is_newer("1.0.0", "not-a-version"));
        assert!(!is_newer("garbage", "also-garbage"));
    }

    #[test]
    fn handles_v_prefixed_tags() {
        assert!(is_newer("v1.0.0", "v1.1.0"));
    }
}
