//! Order status state machine and its timestamp side effects.
//!
//! Status changes are role-gated: regular staff only move orders forward
//! (and between closed states), admins may additionally roll orders back.
//! `depart_time` and `complete_time` are never set by client input; they
//! are derived here from the `(from, to, role)` triple and written
//! atomically with the status by the repository layer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::Role;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle status of an order. Stored as its `as_str` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Waiting,
    InProgress,
    Complete,
    Issue,
    Cancel,
}

/// All valid order status strings, in lifecycle order.
pub const VALID_ORDER_STATUSES: &[&str] =
    &["WAITING", "IN_PROGRESS", "COMPLETE", "ISSUE", "CANCEL"];

impl OrderStatus {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::InProgress => "IN_PROGRESS",
            Self::Complete => "COMPLETE",
            Self::Issue => "ISSUE",
            Self::Cancel => "CANCEL",
        }
    }

    /// Human-readable label for messages shown to staff.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::InProgress => "In progress",
            Self::Complete => "Complete",
            Self::Issue => "Issue",
            Self::Cancel => "Cancelled",
        }
    }

    /// Parse from a string, returning an error for unknown statuses.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETE" => Ok(Self::Complete),
            "ISSUE" => Ok(Self::Issue),
            "CANCEL" => Ok(Self::Cancel),
            other => Err(CoreError::Validation(format!(
                "Unknown order status: '{other}'. Valid statuses: {}",
                VALID_ORDER_STATUSES.join(", ")
            ))),
        }
    }

    /// Closed statuses carry a `complete_time`.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Complete | Self::Issue | Self::Cancel)
    }
}

/// Delivery direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Delivery,
    Return,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivery => "DELIVERY",
            Self::Return => "RETURN",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "DELIVERY" => Ok(Self::Delivery),
            "RETURN" => Ok(Self::Return),
            other => Err(CoreError::Validation(format!(
                "Unknown order kind: '{other}'. Valid kinds: DELIVERY, RETURN"
            ))),
        }
    }
}

/// Handover note status. Stored as `OPEN` / `CLOSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoverStatus {
    Open,
    Close,
}

impl HandoverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CLOSE" => Ok(Self::Close),
            other => Err(CoreError::Validation(format!(
                "Unknown handover status: '{other}'. Valid statuses: OPEN, CLOSE"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Returns `true` if `role` may move an order from `from` to `to`.
///
/// A same-status "transition" is not covered here; callers treat it as a
/// no-op success before consulting the table.
pub fn transition_allowed(from: OrderStatus, to: OrderStatus, role: Role) -> bool {
    use OrderStatus::*;

    let base = match (from, to) {
        (Waiting, InProgress) => true,
        (InProgress, Complete) | (InProgress, Issue) | (InProgress, Cancel) => true,
        (Complete, Issue) | (Complete, Cancel) => true,
        (Issue, Complete) | (Issue, Cancel) => true,
        (Cancel, Complete) | (Cancel, Issue) => true,
        _ => false,
    };
    if base {
        return true;
    }

    // Rollbacks are admin-only.
    role.is_admin()
        && matches!(
            (from, to),
            (InProgress, Waiting)
                | (Complete, InProgress)
                | (Issue, InProgress)
                | (Issue, Waiting)
                | (Cancel, InProgress)
                | (Cancel, Waiting)
        )
}

// ---------------------------------------------------------------------------
// Transition planning
// ---------------------------------------------------------------------------

/// The computed outcome of a status change: the new status and the derived
/// timestamp values to store alongside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPlan {
    pub status: OrderStatus,
    pub depart_time: Option<Timestamp>,
    pub complete_time: Option<Timestamp>,
    /// `false` for a same-status no-op.
    pub changed: bool,
}

/// Validate a status change and derive its timestamp side effects.
///
/// `depart_time` / `complete_time` are the row's current values; the plan
/// carries the values to persist. Fails with `InvalidTransition` when the
/// table does not permit the move for the caller's role.
pub fn plan_transition(
    from: OrderStatus,
    to: OrderStatus,
    role: Role,
    depart_time: Option<Timestamp>,
    complete_time: Option<Timestamp>,
    now: Timestamp,
) -> Result<TransitionPlan, CoreError> {
    use OrderStatus::*;

    if from == to {
        return Ok(TransitionPlan {
            status: to,
            depart_time,
            complete_time,
            changed: false,
        });
    }

    if !transition_allowed(from, to, role) {
        return Err(CoreError::InvalidTransition {
            from: from.label().to_string(),
            to: to.label().to_string(),
        });
    }

    let (depart_time, complete_time) = match (from, to) {
        (Waiting, InProgress) => (depart_time.or(Some(now)), complete_time),
        // Self-healing: a closed order must have departed, backfill if null.
        (InProgress, _) if to.is_closed() => (depart_time.or(Some(now)), Some(now)),
        (InProgress, Waiting) => (None, None),
        (_, InProgress) if from.is_closed() => (depart_time, None),
        (Issue, Waiting) | (Cancel, Waiting) => (None, None),
        // Lateral move between closed states: complete_time reflects the
        // last closed-state change, so it is re-stamped.
        (_, _) if from.is_closed() && to.is_closed() => (depart_time, Some(now)),
        _ => (depart_time, complete_time),
    };

    Ok(TransitionPlan {
        status: to,
        depart_time,
        complete_time,
        changed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use OrderStatus::*;

    const ALL: [OrderStatus; 5] = [Waiting, InProgress, Complete, Issue, Cancel];

    fn t(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    // -----------------------------------------------------------------------
    // String conversions
    // -----------------------------------------------------------------------

    #[test]
    fn test_order_status_round_trip() {
        for status in ALL {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = OrderStatus::from_str("DONE").unwrap_err();
        assert!(err.to_string().contains("DONE"));
    }

    #[test]
    fn test_kind_round_trip() {
        assert_eq!(OrderKind::from_str("DELIVERY").unwrap(), OrderKind::Delivery);
        assert_eq!(OrderKind::from_str("RETURN").unwrap(), OrderKind::Return);
        assert!(OrderKind::from_str("PICKUP").is_err());
    }

    #[test]
    fn test_handover_status_round_trip() {
        assert_eq!(HandoverStatus::from_str("OPEN").unwrap(), HandoverStatus::Open);
        assert_eq!(HandoverStatus::from_str("CLOSE").unwrap(), HandoverStatus::Close);
        assert!(HandoverStatus::from_str("CLOSED").is_err());
    }

    // -----------------------------------------------------------------------
    // Transition table conformance
    // -----------------------------------------------------------------------

    fn expected_allowed(from: OrderStatus, to: OrderStatus, role: Role) -> bool {
        let forward = matches!(
            (from, to),
            (Waiting, InProgress)
                | (InProgress, Complete)
                | (InProgress, Issue)
                | (InProgress, Cancel)
                | (Complete, Issue)
                | (Complete, Cancel)
                | (Issue, Complete)
                | (Issue, Cancel)
                | (Cancel, Complete)
                | (Cancel, Issue)
        );
        let admin_rollback = matches!(
            (from, to),
            (InProgress, Waiting)
                | (Complete, InProgress)
                | (Issue, InProgress)
                | (Issue, Waiting)
                | (Cancel, InProgress)
                | (Cancel, Waiting)
        );
        forward || (role.is_admin() && admin_rollback)
    }

    #[test]
    fn test_full_table_conformance() {
        for from in ALL {
            for to in ALL {
                if from == to {
                    continue;
                }
                for role in [Role::User, Role::Admin] {
                    assert_eq!(
                        transition_allowed(from, to, role),
                        expected_allowed(from, to, role),
                        "{:?} -> {:?} as {:?}",
                        from,
                        to,
                        role
                    );
                }
            }
        }
    }

    #[test]
    fn test_waiting_to_complete_forbidden_for_everyone() {
        assert!(!transition_allowed(Waiting, Complete, Role::User));
        assert!(!transition_allowed(Waiting, Complete, Role::Admin));
    }

    #[test]
    fn test_complete_to_waiting_forbidden_even_for_admin() {
        assert!(!transition_allowed(Complete, Waiting, Role::Admin));
    }

    #[test]
    fn test_rollbacks_require_admin() {
        assert!(!transition_allowed(Complete, InProgress, Role::User));
        assert!(transition_allowed(Complete, InProgress, Role::Admin));
        assert!(!transition_allowed(InProgress, Waiting, Role::User));
        assert!(transition_allowed(InProgress, Waiting, Role::Admin));
    }

    // -----------------------------------------------------------------------
    // Timestamp side effects
    // -----------------------------------------------------------------------

    #[test]
    fn test_same_status_is_noop() {
        let plan =
            plan_transition(Complete, Complete, Role::User, Some(t(1)), Some(t(2)), t(10))
                .unwrap();
        assert!(!plan.changed);
        assert_eq!(plan.depart_time, Some(t(1)));
        assert_eq!(plan.complete_time, Some(t(2)));
    }

    #[test]
    fn test_depart_set_on_start() {
        let plan = plan_transition(Waiting, InProgress, Role::User, None, None, t(10)).unwrap();
        assert!(plan.changed);
        assert_eq!(plan.depart_time, Some(t(10)));
        assert_eq!(plan.complete_time, None);
    }

    #[test]
    fn test_depart_not_overwritten_on_start() {
        let plan =
            plan_transition(Waiting, InProgress, Role::User, Some(t(3)), None, t(10)).unwrap();
        assert_eq!(plan.depart_time, Some(t(3)));
    }

    #[test]
    fn test_complete_time_set_and_depart_preserved() {
        let plan =
            plan_transition(InProgress, Issue, Role::User, Some(t(3)), None, t(10)).unwrap();
        assert_eq!(plan.depart_time, Some(t(3)));
        assert_eq!(plan.complete_time, Some(t(10)));
    }

    #[test]
    fn test_missing_depart_backfilled_on_close() {
        let plan =
            plan_transition(InProgress, Complete, Role::User, None, None, t(10)).unwrap();
        assert_eq!(plan.depart_time, Some(t(10)));
        assert_eq!(plan.complete_time, Some(t(10)));
    }

    #[test]
    fn test_admin_reopen_clears_complete_keeps_depart() {
        let plan =
            plan_transition(Complete, InProgress, Role::Admin, Some(t(3)), Some(t(5)), t(10))
                .unwrap();
        assert_eq!(plan.depart_time, Some(t(3)));
        assert_eq!(plan.complete_time, None);
    }

    #[test]
    fn test_admin_reset_to_waiting_clears_both() {
        let plan =
            plan_transition(InProgress, Waiting, Role::Admin, Some(t(3)), None, t(10)).unwrap();
        assert_eq!(plan.depart_time, None);
        assert_eq!(plan.complete_time, None);

        let plan =
            plan_transition(Issue, Waiting, Role::Admin, Some(t(3)), Some(t(5)), t(10)).unwrap();
        assert_eq!(plan.depart_time, None);
        assert_eq!(plan.complete_time, None);
    }

    #[test]
    fn test_lateral_move_restamps_complete_time() {
        let plan =
            plan_transition(Complete, Issue, Role::User, Some(t(3)), Some(t(5)), t(10)).unwrap();
        assert_eq!(plan.depart_time, Some(t(3)));
        assert_eq!(plan.complete_time, Some(t(10)));
    }

    #[test]
    fn test_rejected_transition_names_labels() {
        let err =
            plan_transition(Waiting, Complete, Role::User, None, None, t(0)).unwrap_err();
        match err {
            CoreError::InvalidTransition { from, to } => {
                assert_eq!(from, "Waiting");
                assert_eq!(to, "Complete");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_user_cannot_reopen() {
        assert!(
            plan_transition(Complete, InProgress, Role::User, Some(t(1)), Some(t(2)), t(10))
                .is_err()
        );
    }
}
