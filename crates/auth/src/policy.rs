//! Access decision engine.
//!
//! Every policy here is a pure function of an [`EffectiveAccess`] (plus the
//! roles involved for employee management):
//!
//! - No IO
//! - No panics
//! - Business denials are values ([`Verdict::Denied`]), never errors
//!
//! Superusers are allowed unconditionally, except where an action compares two
//! memberships (employee management); there they act with `Owner` rank, so the
//! "cannot act on an equal or higher rank" rule still applies to them.

use serde::{Deserialize, Serialize};

use crate::{AccessGrant, AuthzError, CompanyRole, EffectiveAccess};

/// Why an action was denied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Private company and the caller holds no membership.
    PrivateCompany,
    /// The action requires a membership; the caller is a public guest.
    MembershipRequired,
    /// Only the company owner (or a superuser) may do this.
    OwnerRequired,
    /// The caller's rank is below `Creator`.
    CreatorRequired,
    /// The target membership's rank is equal to or higher than the caller's.
    TargetNotOutranked,
    /// The requested role's rank exceeds the caller's.
    GrantAboveOwnRank,
}

impl DenialReason {
    /// Stable code for logs and transport mapping.
    pub const fn code(self) -> &'static str {
        match self {
            DenialReason::PrivateCompany => "private_company",
            DenialReason::MembershipRequired => "membership_required",
            DenialReason::OwnerRequired => "owner_required",
            DenialReason::CreatorRequired => "creator_required",
            DenialReason::TargetNotOutranked => "target_not_outranked",
            DenialReason::GrantAboveOwnRank => "grant_above_own_rank",
        }
    }
}

impl core::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            DenialReason::PrivateCompany => "company is private and you are not a member",
            DenialReason::MembershipRequired => "company membership required",
            DenialReason::OwnerRequired => "only the company owner can do this",
            DenialReason::CreatorRequired => "creator role or higher required",
            DenialReason::TargetNotOutranked => {
                "you can't manage an employee with the same or higher role than yours"
            }
            DenialReason::GrantAboveOwnRank => "you can't grant a role higher than your own",
        };
        f.write_str(msg)
    }
}

/// Outcome of a policy check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Allowed,
    Denied(DenialReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    /// Convert a denial into [`AuthzError::PermissionDenied`] with the reason intact.
    pub fn into_result(self) -> Result<(), AuthzError> {
        match self {
            Verdict::Allowed => Ok(()),
            Verdict::Denied(reason) => Err(AuthzError::PermissionDenied(reason)),
        }
    }
}

impl From<Result<(), DenialReason>> for Verdict {
    fn from(value: Result<(), DenialReason>) -> Self {
        match value {
            Ok(()) => Verdict::Allowed,
            Err(reason) => Verdict::Denied(reason),
        }
    }
}

/// Company-scoped action subject to a policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ViewCompany,
    UpdateCompany,
    DeleteCompany,
    ListEmployees,
    AddEmployee { granted: CompanyRole },
    UpdateEmployee { current: CompanyRole, requested: CompanyRole },
    DeleteEmployee { target: CompanyRole },
    ListTags,
    CreateTag,
    UpdateTag,
    DeleteTag,
}

impl Action {
    pub const fn name(&self) -> &'static str {
        match self {
            Action::ViewCompany => "company.view",
            Action::UpdateCompany => "company.update",
            Action::DeleteCompany => "company.delete",
            Action::ListEmployees => "employee.list",
            Action::AddEmployee { .. } => "employee.add",
            Action::UpdateEmployee { .. } => "employee.update",
            Action::DeleteEmployee { .. } => "employee.delete",
            Action::ListTags => "tag.list",
            Action::CreateTag => "tag.create",
            Action::UpdateTag => "tag.update",
            Action::DeleteTag => "tag.delete",
        }
    }
}

/// Dispatch an action to its policy.
pub fn decide(access: &EffectiveAccess, action: &Action) -> Verdict {
    match *action {
        Action::ViewCompany | Action::ListTags => can_view_company(access),
        Action::UpdateCompany | Action::DeleteCompany => can_mutate_company(access),
        Action::ListEmployees => can_list_employees(access),
        Action::AddEmployee { granted } => can_add_employee(access, granted),
        Action::UpdateEmployee { current, requested } => {
            can_update_employee(access, current, requested)
        }
        Action::DeleteEmployee { target } => can_delete_employee(access, target),
        Action::CreateTag | Action::UpdateTag | Action::DeleteTag => can_mutate_tag(access),
    }
}

/// View a company: superuser, public company, or any membership.
///
/// Every [`AccessGrant`] satisfies one of those; resolution already rejected
/// everyone else.
pub fn can_view_company(access: &EffectiveAccess) -> Verdict {
    match access.grant {
        AccessGrant::Superuser | AccessGrant::Member(_) | AccessGrant::PublicGuest => {
            Verdict::Allowed
        }
    }
}

/// Update or delete a company: superuser, or exactly `Owner`.
///
/// Exact match rather than a rank bound, so a role inserted above `Owner`
/// would not inherit company ownership.
pub fn can_mutate_company(access: &EffectiveAccess) -> Verdict {
    match access.grant {
        AccessGrant::Superuser => Verdict::Allowed,
        AccessGrant::Member(CompanyRole::Owner) => Verdict::Allowed,
        AccessGrant::Member(_) => Verdict::Denied(DenialReason::OwnerRequired),
        AccessGrant::PublicGuest => Verdict::Denied(DenialReason::MembershipRequired),
    }
}

/// List employees: superuser or any membership.
pub fn can_list_employees(access: &EffectiveAccess) -> Verdict {
    match access.grant {
        AccessGrant::Superuser | AccessGrant::Member(_) => Verdict::Allowed,
        AccessGrant::PublicGuest => Verdict::Denied(DenialReason::MembershipRequired),
    }
}

/// Manage employees at all: `Creator` rank or above, superusers included.
///
/// Handlers check this before looking up the target membership.
pub fn can_manage_employees(access: &EffectiveAccess) -> Verdict {
    Verdict::from(manager_role(access).map(|_| ()))
}

/// Add an employee with role `granted`.
pub fn can_add_employee(access: &EffectiveAccess, granted: CompanyRole) -> Verdict {
    Verdict::from(manager_role(access).and_then(|caller| ensure_grantable(caller, granted)))
}

/// Change an employee's role from `current` to `requested`.
pub fn can_update_employee(
    access: &EffectiveAccess,
    current: CompanyRole,
    requested: CompanyRole,
) -> Verdict {
    Verdict::from(manager_role(access).and_then(|caller| {
        ensure_outranks(caller, current)?;
        ensure_grantable(caller, requested)
    }))
}

/// Remove an employee currently holding `target`.
pub fn can_delete_employee(access: &EffectiveAccess, target: CompanyRole) -> Verdict {
    Verdict::from(manager_role(access).and_then(|caller| ensure_outranks(caller, target)))
}

/// Create, update or delete a tag: rank above `Reader`, or superuser.
pub fn can_mutate_tag(access: &EffectiveAccess) -> Verdict {
    match access.grant {
        AccessGrant::Superuser => Verdict::Allowed,
        AccessGrant::Member(role) if role.outranks(CompanyRole::Reader) => Verdict::Allowed,
        AccessGrant::Member(_) => Verdict::Denied(DenialReason::CreatorRequired),
        AccessGrant::PublicGuest => Verdict::Denied(DenialReason::MembershipRequired),
    }
}

/// Rank the caller manages employees with (`Creator` or above).
fn manager_role(access: &EffectiveAccess) -> Result<CompanyRole, DenialReason> {
    let role = access
        .acting_role()
        .ok_or(DenialReason::MembershipRequired)?;
    if !role.is_at_least(CompanyRole::Creator) {
        return Err(DenialReason::CreatorRequired);
    }
    Ok(role)
}

fn ensure_outranks(caller: CompanyRole, target: CompanyRole) -> Result<(), DenialReason> {
    if caller.outranks(target) {
        Ok(())
    } else {
        Err(DenialReason::TargetNotOutranked)
    }
}

fn ensure_grantable(caller: CompanyRole, requested: CompanyRole) -> Result<(), DenialReason> {
    if requested.outranks(caller) {
        Err(DenialReason::GrantAboveOwnRank)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use atelier_core::{CompanyId, UserId};
    use proptest::prelude::*;

    use super::*;
    use crate::CompanyRole::{Creator, Owner, Reader};

    fn access(grant: AccessGrant) -> EffectiveAccess {
        EffectiveAccess::new(UserId::new(), CompanyId::new(), grant)
    }

    fn member(role: CompanyRole) -> EffectiveAccess {
        access(AccessGrant::Member(role))
    }

    fn denied(reason: DenialReason) -> Verdict {
        Verdict::Denied(reason)
    }

    #[test]
    fn everyone_resolved_can_view() {
        for grant in [
            AccessGrant::Superuser,
            AccessGrant::PublicGuest,
            AccessGrant::Member(Reader),
        ] {
            assert!(decide(&access(grant), &Action::ViewCompany).is_allowed());
        }
    }

    #[test]
    fn only_owner_or_superuser_mutates_company() {
        assert!(can_mutate_company(&access(AccessGrant::Superuser)).is_allowed());
        assert!(can_mutate_company(&member(Owner)).is_allowed());
        assert_eq!(can_mutate_company(&member(Creator)), denied(DenialReason::OwnerRequired));
        assert_eq!(can_mutate_company(&member(Reader)), denied(DenialReason::OwnerRequired));
        assert_eq!(
            can_mutate_company(&access(AccessGrant::PublicGuest)),
            denied(DenialReason::MembershipRequired)
        );
    }

    #[test]
    fn employee_management_gate_needs_creator() {
        assert!(can_manage_employees(&access(AccessGrant::Superuser)).is_allowed());
        assert!(can_manage_employees(&member(Creator)).is_allowed());
        assert_eq!(can_manage_employees(&member(Reader)), denied(DenialReason::CreatorRequired));
        assert_eq!(
            can_manage_employees(&access(AccessGrant::PublicGuest)),
            denied(DenialReason::MembershipRequired)
        );
    }

    #[test]
    fn public_guest_is_denied_everything_but_viewing() {
        let guest = access(AccessGrant::PublicGuest);
        let actions = [
            Action::UpdateCompany,
            Action::DeleteCompany,
            Action::ListEmployees,
            Action::AddEmployee { granted: Reader },
            Action::UpdateEmployee { current: Reader, requested: Reader },
            Action::DeleteEmployee { target: Reader },
            Action::CreateTag,
            Action::UpdateTag,
            Action::DeleteTag,
        ];
        for action in actions {
            assert_eq!(
                decide(&guest, &action),
                denied(DenialReason::MembershipRequired),
                "{}",
                action.name()
            );
        }
        assert!(decide(&guest, &Action::ListTags).is_allowed());
    }

    #[test]
    fn creator_adds_up_to_own_rank() {
        let creator = member(Creator);
        assert!(can_add_employee(&creator, Reader).is_allowed());
        assert!(can_add_employee(&creator, Creator).is_allowed());
        assert_eq!(can_add_employee(&creator, Owner), denied(DenialReason::GrantAboveOwnRank));
    }

    #[test]
    fn reader_cannot_manage_employees() {
        let reader = member(Reader);
        assert_eq!(can_add_employee(&reader, Reader), denied(DenialReason::CreatorRequired));
        assert_eq!(can_delete_employee(&reader, Reader), denied(DenialReason::CreatorRequired));
    }

    #[test]
    fn creator_deletes_only_readers() {
        let creator = member(Creator);
        assert!(can_delete_employee(&creator, Reader).is_allowed());
        assert_eq!(
            can_delete_employee(&creator, Creator),
            denied(DenialReason::TargetNotOutranked)
        );
        assert_eq!(can_delete_employee(&creator, Owner), denied(DenialReason::TargetNotOutranked));
    }

    #[test]
    fn creator_cannot_promote_to_owner() {
        assert_eq!(
            can_update_employee(&member(Creator), Reader, Owner),
            denied(DenialReason::GrantAboveOwnRank)
        );
    }

    #[test]
    fn owner_cannot_demote_another_owner() {
        assert_eq!(
            can_update_employee(&member(Owner), Owner, Reader),
            denied(DenialReason::TargetNotOutranked)
        );
        assert!(can_update_employee(&member(Owner), Creator, Owner).is_allowed());
    }

    #[test]
    fn superuser_manages_employees_with_owner_rank() {
        let su = access(AccessGrant::Superuser);
        assert!(can_add_employee(&su, Owner).is_allowed());
        assert!(can_update_employee(&su, Creator, Owner).is_allowed());
        assert_eq!(can_delete_employee(&su, Owner), denied(DenialReason::TargetNotOutranked));
    }

    #[test]
    fn tags_need_more_than_reader() {
        assert_eq!(can_mutate_tag(&member(Reader)), denied(DenialReason::CreatorRequired));
        assert!(can_mutate_tag(&member(Creator)).is_allowed());
        assert!(can_mutate_tag(&member(Owner)).is_allowed());
        assert!(can_mutate_tag(&access(AccessGrant::Superuser)).is_allowed());
    }

    #[test]
    fn denial_becomes_permission_denied_error() {
        let err = can_mutate_tag(&member(Reader)).into_result().unwrap_err();
        assert_eq!(err, AuthzError::PermissionDenied(DenialReason::CreatorRequired));
        assert!(Verdict::Allowed.into_result().is_ok());
    }

    #[test]
    fn verdict_serializes_reason_code() {
        let json = serde_json::to_value(Verdict::Denied(DenialReason::OwnerRequired)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "verdict": "denied", "reason": "owner_required" })
        );
        assert_eq!(DenialReason::OwnerRequired.code(), "owner_required");
    }

    fn any_role() -> impl Strategy<Value = CompanyRole> {
        prop::sample::select(CompanyRole::ALL.to_vec())
    }

    proptest! {
        /// A granted update never touches an equal or higher rank and never
        /// grants above the caller.
        #[test]
        fn update_respects_both_rank_bounds(
            caller in any_role(),
            current in any_role(),
            requested in any_role(),
        ) {
            let allowed = can_update_employee(&member(caller), current, requested).is_allowed();
            let expected = caller.is_at_least(Creator)
                && caller.outranks(current)
                && !requested.outranks(caller);
            prop_assert_eq!(allowed, expected);
        }

        /// Property: nobody can delete a membership at or above their own rank.
        #[test]
        fn delete_requires_strictly_higher_rank(caller in any_role(), target in any_role()) {
            let allowed = can_delete_employee(&member(caller), target).is_allowed();
            prop_assert_eq!(allowed, caller.is_at_least(Creator) && caller.outranks(target));
        }

        /// Property: nobody can add a role above their own.
        #[test]
        fn add_never_escalates(caller in any_role(), granted in any_role()) {
            let allowed = can_add_employee(&member(caller), granted).is_allowed();
            prop_assert_eq!(allowed, caller.is_at_least(Creator) && !granted.outranks(caller));
        }
    }
}
