use crate::domain::SnippetKind;
use std::str::FromStr;
use uuid::Uuid;

/// Missing `type` means the plain script snippet.
pub(super) fn parse_snippet_kind(kind: Option<&str>) -> Option<SnippetKind> {
    match kind.map(str::trim) {
        None | Some("") => Some(SnippetKind::default()),
        Some(k) => SnippetKind::from_str(&k.to_lowercase()).ok(),
    }
}

pub(super) fn parse_agent_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_kind_defaults_to_js() {
        assert_eq!(parse_snippet_kind(None), Some(SnippetKind::Js));
        assert_eq!(parse_snippet_kind(Some("")), Some(SnippetKind::Js));
        assert_eq!(parse_snippet_kind(Some("React")), Some(SnippetKind::React));
    }

    #[test]
    fn parse_invalid_inputs_return_none() {
        assert!(parse_snippet_kind(Some("vue")).is_none());
        assert!(parse_agent_id("not-a-uuid").is_none());
    }
}
