//! Types for document analysis operations.

use serde::{Deserialize, Serialize};

/// A document to place in the provider's file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Name shown in the provider's console, usually the original filename.
    pub display_name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// Reference to a document held by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Provider-assigned name, stable for the lifetime of the upload.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}

/// A chat question about an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub question: String,
    pub file: FileHandle,
    /// Plain-text rendering of the policies relevant to the question.
    pub rules_text: String,
    /// Earlier turns of the conversation, oldest first, if any.
    pub history: Option<String>,
}

/// A clash between the document and one of the reviewer's policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub policy_name: String,
    pub conflict_detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub risk_type: String,
    pub detail: String,
}

/// A clause the document should contain but does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingClause {
    pub clause_name: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub title: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTerm {
    pub title: String,
    pub due_date: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount_due: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub penalties: Option<String>,
    #[serde(default)]
    pub discount: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Structured findings of one document review.
///
/// Lists the model leaves out are treated as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub missing_clauses: Vec<MissingClause>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub payment_terms: Vec<PaymentTerm>,
}

impl DocumentAnalysis {
    /// The JSON schema the analysis must follow, in the subset understood by
    /// structured-output model APIs.
    pub fn response_schema() -> serde_json::Value {
        fn string() -> serde_json::Value {
            serde_json::json!({ "type": "STRING" })
        }
        fn object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
            serde_json::json!({
                "type": "OBJECT",
                "properties": properties,
                "required": required,
            })
        }
        fn array(items: serde_json::Value) -> serde_json::Value {
            serde_json::json!({ "type": "ARRAY", "items": items })
        }

        object(
            serde_json::json!({
                "title": string(),
                "company_name": string(),
                "conflicts": array(object(
                    serde_json::json!({ "policy_name": string(), "conflict_detail": string() }),
                    &["policy_name", "conflict_detail"],
                )),
                "risks": array(object(
                    serde_json::json!({ "risk_type": string(), "detail": string() }),
                    &["risk_type", "detail"],
                )),
                "missing_clauses": array(object(
                    serde_json::json!({ "clause_name": string(), "suggestion": string() }),
                    &["clause_name", "suggestion"],
                )),
                "suggestions": array(object(
                    serde_json::json!({ "title": string(), "details": string() }),
                    &["title", "details"],
                )),
                "payment_terms": array(object(
                    serde_json::json!({
                        "title": string(),
                        "due_date": string(),
                        "payment_method": string(),
                        "amount_due": { "type": "NUMBER" },
                        "currency": string(),
                        "penalties": string(),
                        "discount": string(),
                        "notes": string(),
                    }),
                    &["title", "due_date"],
                )),
            }),
            &[
                "title",
                "company_name",
                "conflicts",
                "risks",
                "missing_clauses",
                "suggestions",
                "payment_terms",
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_deserialize_as_empty() {
        let analysis: DocumentAnalysis = serde_json::from_str(
            r#"{"title": "NDA", "conflicts": [{"policy_name": "Confidentiality", "conflict_detail": "Term is 1 year"}]}"#,
        )
        .unwrap();

        assert_eq!(analysis.title.as_deref(), Some("NDA"));
        assert_eq!(analysis.company_name, None);
        assert_eq!(analysis.conflicts.len(), 1);
        assert!(analysis.risks.is_empty());
        assert!(analysis.payment_terms.is_empty());
    }

    #[test]
    fn payment_terms_keep_optional_fields() {
        let term: PaymentTerm = serde_json::from_str(
            r#"{"title": "Deposit", "due_date": "on signature", "amount_due": 1500.5, "currency": "EUR"}"#,
        )
        .unwrap();

        assert_eq!(term.amount_due, Some(1500.5));
        assert_eq!(term.currency.as_deref(), Some("EUR"));
        assert_eq!(term.penalties, None);
    }

    #[test]
    fn response_schema_requires_every_section() {
        let schema = DocumentAnalysis::response_schema();

        assert_eq!(schema["type"], "OBJECT");
        assert_eq!(schema["required"].as_array().map(Vec::len), Some(7));
        assert_eq!(
            schema["properties"]["payment_terms"]["items"]["required"],
            serde_json::json!(["title", "due_date"])
        );
    }
}
