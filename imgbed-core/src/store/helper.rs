//! Pure helpers for paths, URLs and payload encoding

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Placeholder that keeps an otherwise empty folder visible to listings
pub const MARKER_FILE: &str = ".gitkeep";

/// jsDelivr host serving raw repository files
pub const DEFAULT_CDN_HOST: &str = "cdn.jsdelivr.net";

/// Public URL for a repository file: `https://<host>/gh/<owner>/<repo>[@<branch>]/<path>`
pub fn cdn_url(host: &str, owner: &str, repo: &str, branch: Option<&str>, path: &str) -> String {
    let path = path.trim_start_matches('/');
    match branch {
        Some(branch) => format!("https://{}/gh/{}/{}@{}/{}", host, owner, repo, branch, path),
        None => format!("https://{}/gh/{}/{}/{}", host, owner, repo, path),
    }
}

/// Path of a new object: `root/[folder/]<timestamp>-<name>`
pub fn object_path(root: &str, folder: Option<&str>, timestamp_millis: i64, name: &str) -> String {
    let file_name = format!("{}-{}", timestamp_millis, name);
    join_path(&[root, folder.unwrap_or(""), &file_name])
}

/// Base64 text for the contents API, which only accepts encoded payloads
pub fn encode_content(content: &[u8]) -> String {
    BASE64.encode(content)
}

/// Join path components with `/`, skipping empty ones and stray separators
pub(crate) fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
