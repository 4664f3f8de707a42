//! Maps alert text to a target and a derived state. Pure functions only.

use crate::models::{
    CheckStatus, ProbeKind, Target, DEFAULT_OFFLINE_KEYWORDS, DEFAULT_ONLINE_KEYWORDS,
};

fn keywords_or_default(configured: &[String], defaults: &[&str]) -> Vec<String> {
    let configured: Vec<String> = configured
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if configured.is_empty() {
        defaults.iter().map(|k| k.to_lowercase()).collect()
    } else {
        configured
    }
}

/// Scans `text` for state keywords. Offline wins when both classes match.
pub fn derive_state(text: &str, offline_keywords: &[String], online_keywords: &[String]) -> Option<CheckStatus> {
    let haystack = text.to_lowercase();
    let offline = keywords_or_default(offline_keywords, &DEFAULT_OFFLINE_KEYWORDS);
    if offline.iter().any(|k| haystack.contains(k.as_str())) {
        return Some(CheckStatus::Down);
    }
    let online = keywords_or_default(online_keywords, &DEFAULT_ONLINE_KEYWORDS);
    if online.iter().any(|k| haystack.contains(k.as_str())) {
        return Some(CheckStatus::Up);
    }
    None
}

/// The first of `names` that `text` mentions (case-insensitive). An empty list never matches.
pub fn first_mention<'a>(text: &str, names: &'a [String]) -> Option<&'a str> {
    let haystack = text.to_lowercase();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .find(|n| haystack.contains(n.to_lowercase().as_str()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassiveMatch<'a> {
    pub target: &'a Target,
    /// The name filter that selected the target.
    pub matched_name: &'a str,
    pub state: Option<CheckStatus>,
}

/// Chat path: the first active passive-listen target bound to `source_chat` whose
/// name filters appear in the text.
pub fn match_chat_message<'a>(targets: &'a [Target], text: &str, source_chat: &str) -> Option<PassiveMatch<'a>> {
    targets.iter().find_map(|target| {
        let ProbeKind::PassiveListen(listen) = &target.probe else {
            return None;
        };
        if !target.is_active || listen.chat_id.trim() != source_chat {
            return None;
        }
        let matched_name = first_mention(text, &listen.server_names)?;
        Some(PassiveMatch {
            target,
            matched_name,
            state: derive_state(text, &listen.offline_keywords, &listen.online_keywords),
        })
    })
}

/// Webhook path: the first active status-API target whose server filter appears in
/// the text. Default keywords apply.
pub fn match_webhook_alert<'a>(targets: &'a [Target], text: &str) -> Option<PassiveMatch<'a>> {
    targets.iter().find_map(|target| {
        let ProbeKind::StatusApi(api) = &target.probe else {
            return None;
        };
        if !target.is_active {
            return None;
        }
        let matched_name = first_mention(text, &api.server_filter)?;
        Some(PassiveMatch {
            target,
            matched_name,
            state: derive_state(text, &[], &[]),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PassiveListen, StatusApiProbe};
    use chrono::Utc;

    fn listen_target(id: &str, chat: &str, names: &[&str]) -> Target {
        Target {
            id: id.to_string(),
            name: id.to_string(),
            url: String::new(),
            probe: ProbeKind::PassiveListen(PassiveListen {
                chat_id: chat.to_string(),
                server_names: names.iter().map(|s| s.to_string()).collect(),
                offline_keywords: vec![],
                online_keywords: vec![],
            }),
            check_interval: 1,
            check_interval_max: None,
            check_timeout: 30,
            webhook: None,
            notify_chat_id: None,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_keywords() {
        assert_eq!(derive_state("HK-1 server offline now", &[], &[]), Some(CheckStatus::Down));
        assert_eq!(derive_state("节点 上线", &[], &[]), Some(CheckStatus::Up));
        assert_eq!(derive_state("weekly report", &[], &[]), None);
    }

    #[test]
    fn test_offline_takes_precedence() {
        assert_eq!(derive_state("went offline, back online soon", &[], &[]), Some(CheckStatus::Down));
    }

    #[test]
    fn test_custom_keywords_replace_defaults() {
        let offline = vec!["DEAD".to_string()];
        let online = vec!["alive".to_string()];
        assert_eq!(derive_state("node is dead", &offline, &online), Some(CheckStatus::Down));
        assert_eq!(derive_state("node is offline", &offline, &online), None);
        assert_eq!(derive_state("ALIVE again", &offline, &online), Some(CheckStatus::Up));
    }

    #[test]
    fn test_chat_match_requires_address_and_name() {
        let targets = vec![
            listen_target("other-chat", "-200", &["HK-1"]),
            listen_target("no-names", "-100", &[]),
            listen_target("hk", "-100", &["hk-1", "hk-2"]),
            listen_target("hk-dup", "-100", &["HK-1"]),
        ];
        let found = match_chat_message(&targets, "HK-1 server offline now", "-100").unwrap();
        assert_eq!(found.target.id, "hk");
        assert_eq!(found.matched_name, "hk-1");
        assert_eq!(found.state, Some(CheckStatus::Down));

        assert!(match_chat_message(&targets, "SG-1 offline", "-100").is_none());
        assert!(match_chat_message(&targets, "HK-1 offline", "-300").is_none());
    }

    #[test]
    fn test_inactive_targets_are_skipped() {
        let mut paused = listen_target("paused", "-100", &["hk-1"]);
        paused.is_active = false;
        assert!(match_chat_message(&[paused], "hk-1 offline", "-100").is_none());
    }

    #[test]
    fn test_webhook_match_uses_server_filter() {
        let mut fleet = listen_target("fleet", "", &[]);
        fleet.probe = ProbeKind::StatusApi(StatusApiProbe {
            server_filter: vec!["tokyo-1".to_string()],
            offline_threshold_minutes: 3,
        });
        let targets = vec![listen_target("chat", "-1", &["tokyo-1"]), fleet];
        let found = match_webhook_alert(&targets, "Tokyo-1 is offline").unwrap();
        assert_eq!(found.target.id, "fleet");
        assert_eq!(found.state, Some(CheckStatus::Down));
    }
}
