use chrono::Utc;
use tracing::{debug, warn};

use appointment_cell::{AppointmentQuery, AppointmentService, UpcomingQuery};
use patient_cell::{PatientService, TreatmentQuery, TreatmentService, TreatmentStatus};
use pharmacy_cell::{MedicineService, PrescriptionQuery, PrescriptionService, PrescriptionStatus};
use shared_database::AppState;
use shared_models::access::{AccessPolicy, Action, Resource};
use shared_models::auth::{CallerContext, Role};
use staff_cell::{DepartmentService, StaffService};

use crate::models::{DashboardError, DashboardSummary, DoctorOverview, HospitalOverview, PatientOverview};

const HOSPITAL_UPCOMING_HOURS: i64 = 24;
const HOSPITAL_UPCOMING_LIMIT: usize = 10;
const DOCTOR_UPCOMING_HOURS: i64 = 24 * 7;
const PATIENT_UPCOMING_HOURS: i64 = 24 * 30;

pub struct DashboardService {
    policy: AccessPolicy,
    appointments: AppointmentService,
    patients: PatientService,
    treatments: TreatmentService,
    medicines: MedicineService,
    prescriptions: PrescriptionService,
    staff: StaffService,
    departments: DepartmentService,
}

impl DashboardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            policy: AccessPolicy::new(state.config.scheduling.cancellation_window_hours),
            appointments: AppointmentService::new(state),
            patients: PatientService::new(state),
            treatments: TreatmentService::new(state),
            medicines: MedicineService::new(state),
            prescriptions: PrescriptionService::new(state),
            staff: StaffService::new(state),
            departments: DepartmentService::new(state),
        }
    }

    pub async fn summary(&self, caller: &CallerContext) -> Result<DashboardSummary, DashboardError> {
        self.policy
            .check(Action::View, &Resource::Dashboard, caller, Utc::now())
            .map_err(|denied| {
                warn!("Dashboard denied for {}: {}", caller.id, denied);
                DashboardError::from(denied)
            })?;
        debug!("Building dashboard for {} ({})", caller.id, caller.role);

        match caller.role {
            Role::Admin | Role::Staff | Role::Nurse => Ok(DashboardSummary::Hospital(self.hospital(caller).await?)),
            Role::Doctor => Ok(DashboardSummary::Doctor(self.doctor(caller).await?)),
            Role::Patient => Ok(DashboardSummary::Patient(self.patient(caller).await?)),
        }
    }

    fn today() -> AppointmentQuery {
        AppointmentQuery {
            date: Some(Utc::now().date_naive()),
            ..Default::default()
        }
    }

    async fn hospital(&self, caller: &CallerContext) -> Result<HospitalOverview, DashboardError> {
        let appointments_by_status = self
            .appointments
            .status_breakdown(caller)
            .await?
            .into_iter()
            .map(|(status, count)| (status.to_string(), count))
            .collect();

        let upcoming = UpcomingQuery {
            hours_ahead: Some(HOSPITAL_UPCOMING_HOURS),
            limit: Some(HOSPITAL_UPCOMING_LIMIT),
        };

        Ok(HospitalOverview {
            generated_at: Utc::now(),
            patients: self.patients.count_patients().await?,
            staff: self.staff.count_by_role(None).await?,
            departments: self.departments.list_departments().await?.len() as u64,
            appointments_today: self.appointments.count_appointments(Self::today(), caller).await?,
            appointments_by_status,
            low_stock_medicines: self.medicines.count_low_stock().await?,
            upcoming_appointments: self.appointments.upcoming_appointments(upcoming, caller).await?,
        })
    }

    async fn doctor(&self, caller: &CallerContext) -> Result<DoctorOverview, DashboardError> {
        let upcoming = UpcomingQuery {
            hours_ahead: Some(DOCTOR_UPCOMING_HOURS),
            limit: None,
        };
        let active = PrescriptionQuery {
            status: Some(PrescriptionStatus::Active),
            ..Default::default()
        };

        Ok(DoctorOverview {
            generated_at: Utc::now(),
            appointments_today: self.appointments.count_appointments(Self::today(), caller).await?,
            upcoming_appointments: self.appointments.upcoming_appointments(upcoming, caller).await?,
            ongoing_treatments: self
                .treatments
                .count_treatments(None, Some(caller.id.as_str()), Some(TreatmentStatus::Ongoing))
                .await?,
            active_prescriptions: self.prescriptions.count_prescriptions(active, caller).await?,
        })
    }

    async fn patient(&self, caller: &CallerContext) -> Result<PatientOverview, DashboardError> {
        let upcoming = UpcomingQuery {
            hours_ahead: Some(PATIENT_UPCOMING_HOURS),
            limit: None,
        };
        let active = PrescriptionQuery {
            status: Some(PrescriptionStatus::Active),
            ..Default::default()
        };
        let ongoing = TreatmentQuery {
            status: Some(TreatmentStatus::Ongoing),
            ..Default::default()
        };

        Ok(PatientOverview {
            generated_at: Utc::now(),
            upcoming_appointments: self.appointments.upcoming_appointments(upcoming, caller).await?,
            active_prescriptions: self.prescriptions.list_prescriptions(active, caller).await?,
            ongoing_treatments: self.treatments.list_for_patient(&caller.id, ongoing, caller).await?,
        })
    }
}
