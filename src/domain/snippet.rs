use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SnippetKind {
    #[default]
    Js,
    React,
}

const JS_TEMPLATE: &str = r#"<script>
(function () {
  var agentId = '{{AGENT_ID}}';
  var apiBase = '{{API_BASE}}';
  function load() {
    if (window.__agentdeskWidgetLoaded) return;
    window.__agentdeskWidgetLoaded = true;
    var s = document.createElement('script');
    s.src = apiBase + '/widget.js';
    s.async = true;
    s.setAttribute('data-agent-id', agentId);
    s.setAttribute('data-api-base', apiBase);
    document.body.appendChild(s);
  }
  if (document.readyState === 'loading') {
    document.addEventListener('DOMContentLoaded', load);
  } else {
    load();
  }
})();
</script>"#;

const REACT_TEMPLATE: &str = r#"import { useEffect } from 'react';

export default function AgentChatWidget() {
  useEffect(() => {
    if (window.__agentdeskWidgetLoaded) return;
    window.__agentdeskWidgetLoaded = true;
    const script = document.createElement('script');
    script.src = '{{API_BASE}}/widget.js';
    script.async = true;
    script.setAttribute('data-agent-id', '{{AGENT_ID}}');
    script.setAttribute('data-api-base', '{{API_BASE}}');
    document.body.appendChild(script);
  }, []);

  return null;
}"#;

/// Substitute the agent id and API base URL into the chosen template.
pub fn render_snippet(kind: SnippetKind, agent_id: Uuid, api_base: &str) -> String {
    let template = match kind {
        SnippetKind::Js => JS_TEMPLATE,
        SnippetKind::React => REACT_TEMPLATE,
    };
    template
        .replace("{{AGENT_ID}}", &agent_id.to_string())
        .replace("{{API_BASE}}", api_base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn snippet_is_deterministic_and_embeds_id() {
        let id = Uuid::new_v4();
        for kind in [SnippetKind::Js, SnippetKind::React] {
            let a = render_snippet(kind, id, "https://api.example.com/");
            let b = render_snippet(kind, id, "https://api.example.com/");
            assert_eq!(a, b);
            assert!(a.contains(&id.to_string()));
            assert!(a.contains("https://api.example.com/widget.js"));
            assert!(!a.contains("{{"));
        }
    }

    #[test]
    fn kinds_parse_from_query_values() {
        assert_eq!(SnippetKind::from_str("js").unwrap(), SnippetKind::Js);
        assert_eq!(SnippetKind::from_str("react").unwrap(), SnippetKind::React);
        assert!(SnippetKind::from_str("vue").is_err());
    }
}
