//! Access gate over an audit's hierarchy list.
//!
//! Access passes strictly in chain order: the actor at index `i > 0` may
//! act only once the entry at `i - 1` has signed off. The gate is a pure
//! function of the record and never writes.

use referline_core::models::loan_audit::LoanAudit;
use uuid::Uuid;

use crate::error::ChainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPosition {
    NotInChain,
    FirstInChain,
    Waiting { predecessor: Uuid },
    Granted { index: usize },
}

impl ChainPosition {
    pub fn is_granted(&self) -> bool {
        matches!(
            self,
            ChainPosition::FirstInChain | ChainPosition::Granted { .. }
        )
    }
}

/// Where `actor_id` currently stands on `audit`.
pub fn evaluate(audit: &LoanAudit, actor_id: Uuid) -> ChainPosition {
    match audit.position_of(actor_id) {
        None => ChainPosition::NotInChain,
        Some(0) => ChainPosition::FirstInChain,
        Some(index) => {
            let predecessor = &audit.hierarchy[index - 1];
            if predecessor.updated {
                ChainPosition::Granted { index }
            } else {
                ChainPosition::Waiting {
                    predecessor: predecessor.actor_id,
                }
            }
        }
    }
}

/// Like [`evaluate`], but turns the denied positions into errors.
pub fn authorize(audit: &LoanAudit, actor_id: Uuid) -> Result<ChainPosition, ChainError> {
    match evaluate(audit, actor_id) {
        ChainPosition::NotInChain => Err(ChainError::NotInChain { actor_id }),
        ChainPosition::Waiting { predecessor } => {
            Err(ChainError::PredecessorPending { predecessor })
        }
        granted => Ok(granted),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use referline_core::models::actor::ActorRole;
    use referline_core::models::loan_audit::{AuditStatus, HierarchyEntry, LoanAuditMetadata};

    use super::*;

    fn audit(entries: &[(Uuid, bool)]) -> LoanAudit {
        LoanAudit {
            id: Uuid::new_v4(),
            metadata: LoanAuditMetadata {
                client_name: "X".into(),
                bank_name: "SBI".into(),
                loan_type: "personal".into(),
                loan_amount: 500_000,
                content: String::new(),
            },
            hierarchy: entries
                .iter()
                .map(|(id, updated)| HierarchyEntry {
                    actor_id: *id,
                    actor_role: ActorRole::Employee,
                    updated: *updated,
                })
                .collect(),
            status: AuditStatus::InProgress,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_in_chain_is_always_granted() {
        let initiator = Uuid::new_v4();
        let record = audit(&[(initiator, false), (Uuid::new_v4(), false)]);
        assert_eq!(evaluate(&record, initiator), ChainPosition::FirstInChain);
        assert!(authorize(&record, initiator).is_ok());
    }

    #[test]
    fn granted_once_predecessor_signed_off() {
        let (e1, admin) = (Uuid::new_v4(), Uuid::new_v4());
        let record = audit(&[(e1, true), (admin, false)]);
        assert_eq!(
            evaluate(&record, admin),
            ChainPosition::Granted { index: 1 }
        );
    }

    #[test]
    fn waiting_on_pending_predecessor() {
        let (dsa, emp, admin) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let record = audit(&[(dsa, true), (emp, false), (admin, false)]);

        assert_eq!(
            evaluate(&record, admin),
            ChainPosition::Waiting { predecessor: emp }
        );
        let err = authorize(&record, admin).unwrap_err();
        assert!(matches!(err, ChainError::PredecessorPending { predecessor } if predecessor == emp));
    }

    #[test]
    fn outsider_is_not_in_chain() {
        let record = audit(&[(Uuid::new_v4(), true)]);
        let outsider = Uuid::new_v4();
        assert_eq!(evaluate(&record, outsider), ChainPosition::NotInChain);
        assert!(matches!(
            authorize(&record, outsider),
            Err(ChainError::NotInChain { .. })
        ));
    }

    #[test]
    fn access_follows_predecessor_flag_at_every_index() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let flags = [true, false, true, true, false];
        let record = audit(&ids.iter().copied().zip(flags).collect::<Vec<_>>());

        for i in 1..ids.len() {
            assert_eq!(
                evaluate(&record, ids[i]).is_granted(),
                flags[i - 1],
                "index {i}"
            );
        }
    }
}
