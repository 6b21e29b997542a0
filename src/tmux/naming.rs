// ABOUTME: Session naming: gwt-{repo} with a numeric suffix when the name is taken

/// Prefix shared by every session gwt creates
pub const SESSION_PREFIX: &str = "gwt-";

/// Build a session name for `repo_name` that collides with none of `existing`
///
/// The first session for a repo is `gwt-{repo}`; later ones are
/// `gwt-{repo}-2`, `gwt-{repo}-3`, and so on.
pub fn generate_session_name(repo_name: &str, existing: &[String]) -> String {
    let base = format!("{}{}", SESSION_PREFIX, sanitize_session_name(repo_name));
    if !existing.iter().any(|s| *s == base) {
        return base;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !existing.iter().any(|s| *s == candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Make a repository name safe for tmux targets and file names
///
/// Anything outside `[A-Za-z0-9_-]` becomes `-`, and runs of `-` collapse.
pub fn sanitize_session_name(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let joined = mapped
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if joined.is_empty() {
        "repo".to_string()
    } else {
        joined
    }
}

pub fn is_gwt_session(session_name: &str) -> bool {
    session_name.starts_with(SESSION_PREFIX)
}

/// Recover the sanitized repository name from a gwt session name
pub fn extract_repo_name(session_name: &str) -> Option<&str> {
    let rest = session_name.strip_prefix(SESSION_PREFIX)?;

    if let Some((head, suffix)) = rest.rsplit_once('-') {
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return Some(head);
        }
    }

    Some(rest)
}
