//! The ownership graph used by cascading soft-delete and restore.
//!
//! Every edge names an owner, the owned entity, and the column on the owned
//! table that points back at the owner. Edges are walked owner to child when
//! deleting and child to owner when restoring.

use serde::Serialize;

/// Entities that take part in soft-delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    User,
    Document,
    AnalysisResult,
    Conversation,
    Message,
    Policy,
    PolicyRule,
    Checklist,
    Embedding,
}

/// One owner to child edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ownership {
    /// Name used in log lines and errors when walking this edge fails.
    pub name: &'static str,
    pub owner: EntityKind,
    pub child: EntityKind,
    /// Column on the child's table holding the owner's id.
    pub foreign_key: &'static str,
    /// Extra `(column, value)` equality the child must also match, used for
    /// polymorphic children such as embeddings.
    pub discriminator: Option<(&'static str, &'static str)>,
    /// Whether restoring the owner with children also restores these rows.
    pub restores_with_owner: bool,
}

pub const OWNERSHIPS: &[Ownership] = &[
    Ownership {
        name: "company.documents",
        owner: EntityKind::Company,
        child: EntityKind::Document,
        foreign_key: "company_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "company.policies",
        owner: EntityKind::Company,
        child: EntityKind::Policy,
        foreign_key: "company_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "company.users",
        owner: EntityKind::Company,
        child: EntityKind::User,
        foreign_key: "company_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "company.checklists",
        owner: EntityKind::Company,
        child: EntityKind::Checklist,
        foreign_key: "company_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "document.analysis_results",
        owner: EntityKind::Document,
        child: EntityKind::AnalysisResult,
        foreign_key: "document_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "document.conversations",
        owner: EntityKind::Document,
        child: EntityKind::Conversation,
        foreign_key: "document_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "policy.rules",
        owner: EntityKind::Policy,
        child: EntityKind::PolicyRule,
        foreign_key: "policy_id",
        discriminator: None,
        restores_with_owner: true,
    },
    Ownership {
        name: "conversation.messages",
        owner: EntityKind::Conversation,
        child: EntityKind::Message,
        foreign_key: "conversation_id",
        discriminator: None,
        restores_with_owner: true,
    },
    // A stale vector is worse than a missing one, so embeddings are removed
    // with their source but rebuilt rather than restored.
    Ownership {
        name: "policy.embedding",
        owner: EntityKind::Policy,
        child: EntityKind::Embedding,
        foreign_key: "content_id",
        discriminator: Some(("content_type", "policy")),
        restores_with_owner: false,
    },
    Ownership {
        name: "policy_rule.embedding",
        owner: EntityKind::PolicyRule,
        child: EntityKind::Embedding,
        foreign_key: "content_id",
        discriminator: Some(("content_type", "rule")),
        restores_with_owner: false,
    },
];

impl EntityKind {
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Company => "companies",
            EntityKind::User => "users",
            EntityKind::Document => "documents",
            EntityKind::AnalysisResult => "analysis_results",
            EntityKind::Conversation => "conversations",
            EntityKind::Message => "messages",
            EntityKind::Policy => "policies",
            EntityKind::PolicyRule => "policy_rules",
            EntityKind::Checklist => "checklists",
            EntityKind::Embedding => "embeddings",
        }
    }

    /// Whether the table carries an `updated_at` column to touch on change.
    pub fn has_updated_at(&self) -> bool {
        !matches!(self, EntityKind::Message)
    }

    /// Edges where this entity is the owner.
    pub fn owned(self) -> impl Iterator<Item = &'static Ownership> {
        OWNERSHIPS.iter().filter(move |o| o.owner == self)
    }

    /// Edges where this entity is the child.
    pub fn owners(self) -> impl Iterator<Item = &'static Ownership> {
        OWNERSHIPS.iter().filter(move |o| o.child == self)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(fmt, "{}", self.table_name())
    }
}
