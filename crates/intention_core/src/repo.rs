use std::fmt;

use url::Url;

pub const DEFAULT_BRANCH: &str = "main";

/// A GitHub repository coordinate parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid repository. Use owner/repo or GitHub URL.")]
pub struct InvalidRepoReference {
    pub input: String,
}

impl RepoRef {
    /// Replaces the branch when `branch` is non-blank.
    pub fn with_branch(mut self, branch: Option<&str>) -> Self {
        if let Some(branch) = branch.map(str::trim).filter(|b| !b.is_empty()) {
            self.branch = branch.to_string();
        }
        self
    }

    /// Canonical browse URL; `main` and `master` map to the repository root.
    pub fn url(&self) -> String {
        if self.branch != "main" && self.branch != "master" {
            format!(
                "https://github.com/{}/{}/tree/{}",
                self.owner, self.repo, self.branch
            )
        } else {
            format!("https://github.com/{}/{}", self.owner, self.repo)
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

/// Parse `owner/repo`, `owner/repo#branch`, `owner/repo@branch` or a full URL
/// (optionally with a `/tree/<branch>` segment).
pub fn parse_repo_input(input: &str) -> Result<RepoRef, InvalidRepoReference> {
    let trimmed = input.trim();
    let invalid = || InvalidRepoReference {
        input: input.to_string(),
    };

    let (owner, repo, branch) = if trimmed.starts_with("http") {
        parse_url_form(trimmed).ok_or_else(invalid)?
    } else {
        parse_short_form(trimmed)
    };

    if owner.is_empty() || repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoRef {
        owner,
        repo,
        branch: branch
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
    })
}

fn parse_url_form(raw: &str) -> Option<(String, String, Option<String>)> {
    let url = Url::parse(raw).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let owner = segments.first().copied().unwrap_or_default().to_string();
    let repo = segments.get(1).copied().unwrap_or_default().to_string();
    let branch = segments
        .iter()
        .position(|s| *s == "tree")
        .and_then(|idx| segments.get(idx + 1))
        .map(|s| s.to_string());
    Some((owner, repo, branch))
}

fn parse_short_form(raw: &str) -> (String, String, Option<String>) {
    let separator = if raw.contains('#') {
        Some('#')
    } else if raw.contains('@') {
        Some('@')
    } else {
        None
    };

    let (path, branch) = match separator {
        Some(sep) => {
            let mut parts = raw.split(sep);
            let path = parts.next().unwrap_or_default();
            (path, parts.next().map(str::to_string))
        }
        None => (raw, None),
    };

    let mut parts = path.split('/');
    let owner = parts.next().unwrap_or_default().trim().to_string();
    let repo = parts.next().unwrap_or_default().trim().to_string();
    (owner, repo, branch)
}
