//! URL construction against the deployment base path.

/// Normalize a configured base path to `""` or `/segment[/...]` with no
/// trailing slash.
pub fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Agent profile images are always relative to the base path
pub fn agent_image_url(base: &str, image: &str) -> String {
    format!("{}/{}", base, image.trim_start_matches('/'))
}

/// `./uploads/a.png` -> `{base}/uploads/a.png`; anything else is used as is.
pub fn message_src_url(base: &str, src: &str) -> String {
    match src.strip_prefix("./") {
        Some(rest) => format!("{}/{}", base, rest),
        None => src.to_string(),
    }
}

pub fn session_url(base: &str, session_id: &str) -> String {
    format!("{}/session/{}", base, urlencoding::encode(session_id))
}

pub fn home_url(base: &str) -> String {
    if base.is_empty() {
        "/".to_string()
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base(""), "");
        assert_eq!(normalize_base("/"), "");
        assert_eq!(normalize_base("texts-with-the-machine/"), "/texts-with-the-machine");
        assert_eq!(normalize_base("/a/b/"), "/a/b");
    }

    #[test]
    fn test_message_src_rewrite() {
        assert_eq!(message_src_url("/site", "./uploads/cat.png"), "/site/uploads/cat.png");
        assert_eq!(message_src_url("", "./uploads/cat.png"), "/uploads/cat.png");
        assert_eq!(
            message_src_url("/site", "https://example.com/cat.png"),
            "https://example.com/cat.png"
        );
        assert_eq!(message_src_url("/site", "uploads/cat.png"), "uploads/cat.png");
    }

    #[test]
    fn test_links() {
        assert_eq!(agent_image_url("/site", "agents/mira.png"), "/site/agents/mira.png");
        assert_eq!(session_url("/site", "a b"), "/site/session/a%20b");
        assert_eq!(home_url(""), "/");
        assert_eq!(home_url("/site"), "/site");
    }
}
