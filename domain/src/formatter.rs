//! Plain-text renderings handed to the document analyzer.
use crate::messages;
use crate::PolicyWithRules;

const POLICY_SEPARATOR: &str = "\n\n---\n\n";

/// Renders policies and their rules as the rule block of an analyzer prompt.
pub fn policies_text(policies: &[PolicyWithRules]) -> String {
    policies
        .iter()
        .map(|entry| {
            let policy = &entry.policy;
            let mut lines = vec![
                format!("Policy Type: {}", policy.policy_type),
                format!("Policy Name: {}", policy.name),
                format!("Description: {}", policy.description.as_deref().unwrap_or("")),
                "Rules:".to_string(),
            ];
            for scored in &entry.rules {
                let rule = &scored.rule;
                lines.push(format!("  - Rule Type: {}", rule.rule_type));
                lines.push(format!("  - Severity: {}", rule.severity));
                lines.push(format!(
                    "  - Description: {}",
                    rule.description.as_deref().unwrap_or("")
                ));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join(POLICY_SEPARATOR)
}

/// Renders earlier chat turns, oldest first, one `Author: content` line each.
///
/// `recent` is newest first, as returned by the recent-message window.
/// Returns `None` when there is no history.
pub fn messages_history(recent: &[messages::Model]) -> Option<String> {
    if recent.is_empty() {
        return None;
    }
    Some(
        recent
            .iter()
            .rev()
            .map(|message| format!("{}: {}", message.author, message.content))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_author::MessageAuthor;
    use crate::policy_type::PolicyType;
    use crate::rule_type::RuleType;
    use crate::severity::Severity;
    use crate::{policies, policy_rules};
    use chrono::Utc;

    fn policy(name: &str, description: Option<&str>) -> policies::Model {
        let now = Utc::now();
        policies::Model {
            id: 1,
            name: name.to_string(),
            description: description.map(str::to_string),
            policy_type: PolicyType::Standard,
            source_url: None,
            is_active: true,
            company_id: None,
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn rule(id: i32, description: &str, severity: Severity) -> policy_rules::Model {
        let now = Utc::now();
        policy_rules::Model {
            id,
            policy_id: 1,
            rule_type: RuleType::Conflict,
            description: Some(description.to_string()),
            severity,
            keywords: Default::default(),
            is_deleted: false,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn policies_are_rendered_with_their_rules() {
        let text = policies_text(&[
            PolicyWithRules::new(
                policy("GDPR", Some("Data protection")),
                vec![rule(1, "Personal data stays in the EU", Severity::High)],
            ),
            PolicyWithRules::new(policy("Payments", None), vec![]),
        ]);

        assert_eq!(
            text,
            "Policy Type: standard\n\
             Policy Name: GDPR\n\
             Description: Data protection\n\
             Rules:\n  \
             - Rule Type: conflict\n  \
             - Severity: high\n  \
             - Description: Personal data stays in the EU\
             \n\n---\n\n\
             Policy Type: standard\n\
             Policy Name: Payments\n\
             Description: \n\
             Rules:"
        );
        assert_eq!(policies_text(&[]), "");
    }

    #[test]
    fn history_is_oldest_first() {
        let now = Utc::now();
        let message = |id, content: &str, author| messages::Model {
            id,
            conversation_id: 1,
            content: content.to_string(),
            author,
            is_deleted: false,
            created_at: now.into(),
        };
        let newest_first = vec![
            message(2, "It runs for two years.", MessageAuthor::LegalCheck),
            message(1, "How long is the term?", MessageAuthor::User),
        ];

        assert_eq!(
            messages_history(&newest_first).as_deref(),
            Some("User: How long is the term?\nLegalCheck: It runs for two years.")
        );
        assert_eq!(messages_history(&[]), None);
    }
}
