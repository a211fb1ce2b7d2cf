//! Approval transition table for supply records.
//!
//! Every (current, requested) pair is listed once in [`Transition::between`].
//! The stock effect of a transition is the difference between the record's
//! contribution before and after it, so re-approval with a corrected quantity
//! and plain approval share one rule.
use super::ledger::{ApprovalState, inbound_contribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested state equals the current one.
    Unchanged,
    /// Pending or Rejected to Approved.
    Approve,
    /// Pending to Rejected.
    Reject,
    /// Approved to Approved, possibly with a corrected quantity.
    Reapprove,
    /// Approved back to Pending or Rejected.
    Revoke,
    /// Rejected back to Pending.
    Reopen,
}

impl Transition {
    pub fn between(current: ApprovalState, requested: ApprovalState) -> Self {
        use ApprovalState::*;
        match (current, requested) {
            (Pending, Pending) => Transition::Unchanged,
            (Pending, Approved) => Transition::Approve,
            (Pending, Rejected) => Transition::Reject,
            (Approved, Approved) => Transition::Reapprove,
            (Approved, Pending) => Transition::Revoke,
            (Approved, Rejected) => Transition::Revoke,
            (Rejected, Pending) => Transition::Reopen,
            (Rejected, Approved) => Transition::Approve,
            (Rejected, Rejected) => Transition::Unchanged,
        }
    }
}

/// Outcome of applying a transition to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub transition: Transition,
    /// Signed change to the product's stock cache.
    pub stock_delta: i64,
    /// Whether the record row itself changes.
    pub record_changes: bool,
}

impl TransitionPlan {
    pub fn new(
        current: ApprovalState,
        old_quantity: u64,
        requested: ApprovalState,
        new_quantity: u64,
    ) -> Self {
        let transition = Transition::between(current, requested);
        let stock_delta = inbound_contribution(requested, new_quantity)
            - inbound_contribution(current, old_quantity);

        Self {
            transition,
            stock_delta,
            record_changes: current != requested || old_quantity != new_quantity,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.record_changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApprovalState::*;

    #[test]
    fn table_covers_every_pair() {
        let expected = [
            [Transition::Unchanged, Transition::Approve, Transition::Reject],
            [Transition::Revoke, Transition::Reapprove, Transition::Revoke],
            [Transition::Reopen, Transition::Approve, Transition::Unchanged],
        ];

        for (row, current) in ApprovalState::ALL.into_iter().enumerate() {
            for (col, requested) in ApprovalState::ALL.into_iter().enumerate() {
                assert_eq!(
                    Transition::between(current, requested),
                    expected[row][col],
                    "{current:?} -> {requested:?}"
                );
            }
        }
    }

    #[test]
    fn approval_adds_and_revocation_removes() {
        assert_eq!(TransitionPlan::new(Pending, 50, Approved, 50).stock_delta, 50);
        assert_eq!(TransitionPlan::new(Rejected, 50, Approved, 50).stock_delta, 50);
        assert_eq!(TransitionPlan::new(Approved, 50, Pending, 50).stock_delta, -50);
        assert_eq!(TransitionPlan::new(Approved, 50, Rejected, 50).stock_delta, -50);
    }

    #[test]
    fn zero_contribution_moves_leave_stock_alone() {
        for (from, to) in [(Pending, Rejected), (Rejected, Pending)] {
            let plan = TransitionPlan::new(from, 30, to, 30);
            assert_eq!(plan.stock_delta, 0);
            assert!(!plan.is_noop());
        }
    }

    #[test]
    fn reapproval_applies_the_quantity_difference() {
        let plan = TransitionPlan::new(Approved, 50, Approved, 35);
        assert_eq!(plan.transition, Transition::Reapprove);
        assert_eq!(plan.stock_delta, -15);

        let plan = TransitionPlan::new(Approved, 50, Approved, 70);
        assert_eq!(plan.stock_delta, 20);
    }

    #[test]
    fn same_state_same_quantity_is_a_noop() {
        for state in ApprovalState::ALL {
            let plan = TransitionPlan::new(state, 10, state, 10);
            assert!(plan.is_noop());
            assert_eq!(plan.stock_delta, 0);
        }
    }

    #[test]
    fn correcting_a_pending_quantity_does_not_touch_stock() {
        let plan = TransitionPlan::new(Pending, 10, Pending, 12);
        assert!(!plan.is_noop());
        assert_eq!(plan.stock_delta, 0);
    }
}
