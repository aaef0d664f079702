//! Role and ownership rules for every resource the API exposes.
//!
//! Services describe what they are about to touch as a [`Resource`] and ask
//! [`AccessPolicy::check`] whether the caller may perform an [`Action`] on it.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::auth::{CallerContext, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    List,
    Create,
    Update,
    UpdateStatus,
    /// Soft delete.
    Cancel,
    Restore,
    HardDelete,
    ViewDeleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::View => "view",
            Action::List => "list",
            Action::Create => "create",
            Action::Update => "update",
            Action::UpdateStatus => "change the status of",
            Action::Cancel => "cancel",
            Action::Restore => "restore",
            Action::HardDelete => "permanently delete",
            Action::ViewDeleted => "view deleted",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Appointment {
        patient_id: &'a str,
        doctor_id: &'a str,
        created_by: Option<&'a str>,
        starts_at: DateTime<Utc>,
    },
    /// `patient_id` is empty for collection-level actions.
    Patient { patient_id: &'a str },
    /// Treatments and prescriptions.
    ClinicalRecord { patient_id: &'a str, doctor_id: &'a str },
    Medicine,
    Department,
    StaffMember { staff_id: &'a str },
    Dashboard,
}

impl Resource<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Resource::Appointment { .. } => "appointment",
            Resource::Patient { .. } => "patient record",
            Resource::ClinicalRecord { .. } => "clinical record",
            Resource::Medicine => "medicine",
            Resource::Department => "department",
            Resource::StaffMember { .. } => "staff member",
            Resource::Dashboard => "dashboard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct AccessDenied {
    pub action: Action,
    pub role: Role,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    cancellation_window: Duration,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(24)
    }
}

impl AccessPolicy {
    pub fn new(cancellation_window_hours: i64) -> Self {
        Self {
            cancellation_window: Duration::hours(cancellation_window_hours),
        }
    }

    pub fn cancellation_window(&self) -> Duration {
        self.cancellation_window
    }

    pub fn check(
        &self,
        action: Action,
        resource: &Resource<'_>,
        caller: &CallerContext,
        now: DateTime<Utc>,
    ) -> Result<(), AccessDenied> {
        self.evaluate(action, resource, caller, Some(now))
    }

    /// Role and ownership only; the patient cancellation window is not applied.
    pub fn check_ownership(
        &self,
        action: Action,
        resource: &Resource<'_>,
        caller: &CallerContext,
    ) -> Result<(), AccessDenied> {
        self.evaluate(action, resource, caller, None)
    }

    fn evaluate(
        &self,
        action: Action,
        resource: &Resource<'_>,
        caller: &CallerContext,
        now: Option<DateTime<Utc>>,
    ) -> Result<(), AccessDenied> {
        let role = caller.role;
        let privileged = role.is_privileged();

        let allowed = match *resource {
            Resource::Appointment { patient_id, doctor_id, created_by, starts_at } => {
                let own_patient = role == Role::Patient && caller.is(patient_id);
                let own_doctor = role == Role::Doctor && caller.is(doctor_id);

                match action {
                    Action::View | Action::List | Action::Create => {
                        privileged || role == Role::Nurse || own_doctor || own_patient
                    }
                    Action::Update | Action::UpdateStatus | Action::Cancel => {
                        if privileged || own_doctor {
                            true
                        } else if own_patient {
                            match now {
                                Some(now) if starts_at - now <= self.cancellation_window => {
                                    return Err(AccessDenied {
                                        action,
                                        role,
                                        reason: format!(
                                            "Appointments can only be changed more than {} hours before they start",
                                            self.cancellation_window.num_hours()
                                        ),
                                    });
                                }
                                _ => true,
                            }
                        } else {
                            false
                        }
                    }
                    Action::Restore | Action::ViewDeleted => privileged,
                    Action::HardDelete => {
                        privileged
                            || (role == Role::Doctor
                                && (caller.is(doctor_id) || created_by.is_some_and(|c| caller.is(c))))
                    }
                }
            }
            Resource::Patient { patient_id } => {
                let is_self = role == Role::Patient && caller.is(patient_id);
                match action {
                    Action::View => role.is_clinical_or_office() || is_self,
                    Action::List | Action::Create => privileged || role == Role::Nurse,
                    Action::Update => privileged || role == Role::Nurse || is_self,
                    Action::UpdateStatus => privileged || role == Role::Nurse,
                    Action::Cancel | Action::Restore | Action::ViewDeleted => privileged,
                    Action::HardDelete => role == Role::Admin,
                }
            }
            Resource::ClinicalRecord { patient_id, doctor_id } => {
                let own_doctor = role == Role::Doctor && caller.is(doctor_id);
                match action {
                    Action::View | Action::List => {
                        role.is_clinical_or_office() || (role == Role::Patient && caller.is(patient_id))
                    }
                    Action::Create | Action::Update | Action::UpdateStatus => {
                        role == Role::Admin || own_doctor
                    }
                    Action::Cancel | Action::Restore => privileged || own_doctor,
                    Action::HardDelete | Action::ViewDeleted => role == Role::Admin,
                }
            }
            Resource::Medicine => match action {
                Action::View | Action::List => true,
                Action::Create | Action::Update => privileged,
                Action::UpdateStatus => privileged || role == Role::Nurse,
                Action::Cancel | Action::Restore | Action::ViewDeleted => privileged,
                Action::HardDelete => role == Role::Admin,
            },
            Resource::Department => match action {
                Action::View | Action::List => true,
                _ => role == Role::Admin,
            },
            Resource::StaffMember { staff_id } => match action {
                Action::View | Action::List => true,
                Action::Update => role == Role::Admin || caller.is(staff_id),
                _ => role == Role::Admin,
            },
            Resource::Dashboard => matches!(action, Action::View),
        };

        if allowed {
            Ok(())
        } else {
            Err(AccessDenied {
                action,
                role,
                reason: format!("Role '{}' may not {} this {}", role, action, resource.kind()),
            })
        }
    }
}
