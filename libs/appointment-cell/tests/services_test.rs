use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use appointment_cell::models::*;
use appointment_cell::services::AppointmentService;
use shared_database::AppState;
use shared_models::auth::{CallerContext, Role};
use shared_utils::test_utils::TestConfig;
use staff_cell::models::{CreateDepartmentRequest, CreateStaffRequest, StaffRole};
use staff_cell::{DepartmentService, StaffService};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, hour, minute, 0).unwrap()
}

fn staff() -> CallerContext {
    CallerContext::new("staff-1", Role::Staff)
}

fn admin() -> CallerContext {
    CallerContext::new("admin-1", Role::Admin)
}

fn booking(patient_id: &str, doctor_id: &str, start: DateTime<Utc>, minutes: Option<i64>) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: patient_id.to_string(),
        doctor_id: doctor_id.to_string(),
        department_id: None,
        appointment_date: start,
        duration_minutes: minutes,
        appointment_type: None,
        status: None,
        reason: Some("Check-up".to_string()),
        notes: None,
        created_by: None,
    }
}

async fn book(state: &Arc<AppState>, patient_id: &str, doctor_id: &str, start: DateTime<Utc>) -> Appointment {
    AppointmentService::new(state)
        .create_appointment(booking(patient_id, doctor_id, start, Some(30)), &staff())
        .await
        .unwrap()
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[tokio::test]
async fn non_overlapping_windows_both_succeed() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);

    service.create_appointment(booking("p-1", "d-1", at(9, 0), Some(30)), &staff()).await.unwrap();
    service.create_appointment(booking("p-2", "d-1", at(11, 0), Some(30)), &staff()).await.unwrap();

    // A different doctor at the same time is unaffected.
    service.create_appointment(booking("p-3", "d-2", at(9, 0), Some(30)), &staff()).await.unwrap();
}

#[tokio::test]
async fn overlapping_window_is_a_conflict() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);

    service.create_appointment(booking("p-1", "d-1", at(9, 0), Some(30)), &staff()).await.unwrap();
    assert_matches!(
        service.create_appointment(booking("p-2", "d-1", at(9, 15), Some(30)), &staff()).await,
        Err(AppointmentError::SlotUnavailable { .. })
    );
    assert!(!service.availability().is_available("d-1", at(8, 45), Some(30)).await.unwrap());
    assert!(service.availability().is_available("d-1", at(8, 30), Some(30)).await.unwrap());
}

#[tokio::test]
async fn back_to_back_windows_both_succeed() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);

    service.create_appointment(booking("p-1", "d-1", at(9, 0), Some(30)), &staff()).await.unwrap();
    service.create_appointment(booking("p-2", "d-1", at(9, 30), Some(30)), &staff()).await.unwrap();
    service.create_appointment(booking("p-3", "d-1", at(8, 30), None), &staff()).await.unwrap();
}

#[tokio::test]
async fn durations_are_defaulted_and_bounded() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);

    let defaulted = service.create_appointment(booking("p-1", "d-1", at(9, 0), Some(0)), &staff()).await.unwrap();
    assert_eq!(defaulted.duration_minutes, 30);

    assert_matches!(
        service.create_appointment(booking("p-1", "d-1", at(12, 0), Some(-5)), &staff()).await,
        Err(AppointmentError::ValidationFailed(_))
    );
    assert_matches!(
        service.create_appointment(booking("p-1", "d-1", at(12, 0), Some(481)), &staff()).await,
        Err(AppointmentError::ValidationFailed(_))
    );
    assert_matches!(
        service.availability().is_available("  ", at(12, 0), None).await,
        Err(AppointmentError::ValidationFailed(_))
    );
}

#[tokio::test]
async fn cancelled_and_deleted_appointments_free_the_slot() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);

    let first = book(&state, "p-1", "d-1", at(9, 0)).await;
    service.update_status(&first.id, AppointmentStatus::Cancelled, &staff()).await.unwrap();
    let second = book(&state, "p-2", "d-1", at(9, 0)).await;

    service.soft_delete_appointment(&second.id, &staff()).await.unwrap();
    book(&state, "p-3", "d-1", at(9, 0)).await;
}

#[tokio::test]
async fn concurrent_bookings_for_one_slot_admit_exactly_one() {
    let state = TestConfig::default().to_state();

    let mut tasks = Vec::new();
    for i in 0..10 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            AppointmentService::new(&state)
                .create_appointment(booking(&format!("p-{}", i), "d-1", at(9, 0), Some(30)), &staff())
                .await
        }));
    }

    let mut booked = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => booked += 1,
            Err(e) => assert_matches!(e, AppointmentError::SlotUnavailable { .. }),
        }
    }
    assert_eq!(booked, 1);
    assert!(state.locks.is_empty());
}

#[tokio::test]
async fn availability_reports_busy_slots_without_patients() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let existing = book(&state, "p-1", "d-1", at(9, 0)).await;

    let query = AvailabilityQuery {
        doctor_id: "d-1".to_string(),
        start: at(9, 15),
        duration_minutes: None,
        exclude_id: None,
    };
    let response = service.check_availability(query.clone(), &staff()).await.unwrap();
    assert!(!response.available);
    assert_eq!(response.end, at(9, 45));
    assert_eq!(response.conflicts, vec![BusySlot { start: at(9, 0), end: at(9, 30), status: AppointmentStatus::Scheduled }]);

    let excluding = AvailabilityQuery { exclude_id: Some(existing.id), ..query };
    assert!(service.check_availability(excluding, &staff()).await.unwrap().available);
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn soft_delete_hides_and_restore_reschedules() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let appointment = book(&state, "p-1", "d-1", at(9, 0)).await;
    service.update_status(&appointment.id, AppointmentStatus::Confirmed, &staff()).await.unwrap();

    let cancelled = service.soft_delete_appointment(&appointment.id, &staff()).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.deleted_by.as_deref(), Some("staff-1"));
    assert!(cancelled.deleted_at.is_some());

    // Cancelling again is a quiet success.
    let again = service.soft_delete_appointment(&appointment.id, &staff()).await.unwrap();
    assert_eq!(again.deleted_at, cancelled.deleted_at);

    assert!(service.list_appointments(AppointmentQuery::default(), &staff()).await.unwrap().is_empty());
    assert_matches!(service.get_appointment(&appointment.id, &staff()).await, Err(AppointmentError::NotFound));

    let with_deleted = AppointmentQuery { include_deleted: true, ..Default::default() };
    assert_eq!(service.list_appointments(with_deleted, &staff()).await.unwrap().len(), 1);
    assert_eq!(
        service.list_deleted_appointments(AppointmentQuery::default(), &staff()).await.unwrap().len(),
        1
    );

    let restored = service.restore_appointment(&appointment.id, &staff()).await.unwrap();
    assert_eq!(restored.status, AppointmentStatus::Scheduled);
    assert!(restored.deleted_at.is_none());
    assert!(restored.deleted_by.is_none());

    // Only soft-deleted appointments can be restored.
    assert_matches!(service.restore_appointment(&appointment.id, &staff()).await, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn restore_refuses_a_slot_taken_in_the_meantime() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let original = book(&state, "p-1", "d-1", at(9, 0)).await;
    service.soft_delete_appointment(&original.id, &staff()).await.unwrap();
    book(&state, "p-2", "d-1", at(9, 15)).await;

    assert_matches!(
        service.restore_appointment(&original.id, &staff()).await,
        Err(AppointmentError::SlotUnavailable { .. })
    );
}

#[tokio::test]
async fn status_changes_follow_the_lifecycle() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let appointment = book(&state, "p-1", "d-1", at(9, 0)).await;

    let same = service.update_status(&appointment.id, AppointmentStatus::Scheduled, &staff()).await.unwrap();
    assert_eq!(same.updated_at, appointment.updated_at);

    service.update_status(&appointment.id, AppointmentStatus::InProgress, &staff()).await.unwrap();
    assert_matches!(
        service.update_status(&appointment.id, AppointmentStatus::Confirmed, &staff()).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
    service.update_status(&appointment.id, AppointmentStatus::Completed, &staff()).await.unwrap();
    assert_matches!(
        service.update_status(&appointment.id, AppointmentStatus::Cancelled, &staff()).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        service.soft_delete_appointment(&appointment.id, &staff()).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn patient_cancellation_window_is_enforced() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let patient = CallerContext::new("p-1", Role::Patient);
    let now = Utc::now();

    let soon = service
        .create_appointment(booking("p-1", "d-1", now + Duration::hours(2), Some(30)), &patient)
        .await
        .unwrap();
    assert_matches!(
        service.soft_delete_appointment(&soon.id, &patient).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        service.update_status(&soon.id, AppointmentStatus::Cancelled, &patient).await,
        Err(AppointmentError::Forbidden(_))
    );

    let later = service
        .create_appointment(booking("p-1", "d-1", now + Duration::hours(48), Some(30)), &patient)
        .await
        .unwrap();
    let cancelled = service.soft_delete_appointment(&later.id, &patient).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    // Staff are not bound by the window.
    service.soft_delete_appointment(&soon.id, &staff()).await.unwrap();
}

#[tokio::test]
async fn cancelling_an_already_cancelled_appointment_changes_nothing() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let patient = CallerContext::new("p-1", Role::Patient);

    // Cancelled through the status endpoint: stays visible, deletion markers untouched.
    let called_off = book(&state, "p-1", "d-1", at(9, 0)).await;
    let cancelled = service
        .update_status(&called_off.id, AppointmentStatus::Cancelled, &staff())
        .await
        .unwrap();
    let repeated = service.soft_delete_appointment(&called_off.id, &staff()).await.unwrap();
    assert_eq!(repeated.status, AppointmentStatus::Cancelled);
    assert!(repeated.deleted_at.is_none());
    assert_eq!(repeated.updated_at, cancelled.updated_at);
    assert_eq!(service.list_appointments(AppointmentQuery::default(), &staff()).await.unwrap().len(), 1);

    // The patient may repeat a cancel inside the change window.
    let soon = service
        .create_appointment(booking("p-1", "d-2", Utc::now() + Duration::hours(2), Some(30)), &patient)
        .await
        .unwrap();
    let first = service.soft_delete_appointment(&soon.id, &staff()).await.unwrap();
    let again = service.soft_delete_appointment(&soon.id, &patient).await.unwrap();
    assert_eq!(again.deleted_at, first.deleted_at);

    // Other patients and nurses are still turned away.
    let stranger = CallerContext::new("p-2", Role::Patient);
    assert_matches!(
        service.soft_delete_appointment(&soon.id, &stranger).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        service.soft_delete_appointment(&called_off.id, &CallerContext::new("nurse-1", Role::Nurse)).await,
        Err(AppointmentError::Forbidden(_))
    );
}

#[tokio::test]
async fn patient_cannot_move_an_appointment_into_the_change_window() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let patient = CallerContext::new("p-1", Role::Patient);
    let now = Utc::now();

    let appointment = service
        .create_appointment(booking("p-1", "d-1", now + Duration::hours(48), Some(30)), &patient)
        .await
        .unwrap();

    let too_soon = UpdateAppointmentRequest { appointment_date: Some(now + Duration::hours(2)), ..Default::default() };
    assert_matches!(
        service.update_appointment(&appointment.id, too_soon, &patient).await,
        Err(AppointmentError::Forbidden(_))
    );
    let unchanged = service.get_appointment(&appointment.id, &patient).await.unwrap();
    assert_eq!(unchanged.appointment_date, appointment.appointment_date);

    let later = now + Duration::hours(72);
    let moved = service
        .update_appointment(
            &appointment.id,
            UpdateAppointmentRequest { appointment_date: Some(later), ..Default::default() },
            &patient,
        )
        .await
        .unwrap();
    assert_eq!(moved.appointment_date, later);

    // Staff can still move it close in.
    let close_in = UpdateAppointmentRequest { appointment_date: Some(now + Duration::hours(2)), ..Default::default() };
    service.update_appointment(&appointment.id, close_in, &staff()).await.unwrap();
}

#[tokio::test]
async fn hard_delete_is_limited_to_owners_and_office() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let appointment = book(&state, "p-1", "d-1", at(9, 0)).await;

    let other_doctor = CallerContext::new("d-2", Role::Doctor);
    assert_matches!(
        service.hard_delete_appointment(&appointment.id, &other_doctor).await,
        Err(AppointmentError::Forbidden(_))
    );

    service.hard_delete_appointment(&appointment.id, &admin()).await.unwrap();
    assert_matches!(
        service.hard_delete_appointment(&appointment.id, &admin()).await,
        Err(AppointmentError::NotFound)
    );

    let owned = book(&state, "p-1", "d-1", at(10, 0)).await;
    let doctor = CallerContext::new("d-1", Role::Doctor);
    service.hard_delete_appointment(&owned.id, &doctor).await.unwrap();
}

#[tokio::test]
async fn rescheduling_rechecks_availability() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let first = book(&state, "p-1", "d-1", at(9, 0)).await;
    book(&state, "p-2", "d-1", at(10, 0)).await;

    // Moving within its own window does not conflict with itself.
    let nudged = UpdateAppointmentRequest { appointment_date: Some(at(9, 10)), ..Default::default() };
    let moved = service.update_appointment(&first.id, nudged, &staff()).await.unwrap();
    assert_eq!(moved.appointment_date, at(9, 10));

    let longer = UpdateAppointmentRequest { duration_minutes: Some(60), ..Default::default() };
    assert_matches!(
        service.update_appointment(&first.id, longer, &staff()).await,
        Err(AppointmentError::SlotUnavailable { .. })
    );

    let notes = UpdateAppointmentRequest { notes: Some("Bring scans".to_string()), ..Default::default() };
    let updated = service.update_appointment(&first.id, notes, &staff()).await.unwrap();
    assert_eq!(updated.notes.as_deref(), Some("Bring scans"));
    assert_eq!(updated.duration_minutes, 30);
}

// ==============================================================================
// ACCESS AND LISTINGS
// ==============================================================================

#[tokio::test]
async fn listings_are_scoped_by_role() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    book(&state, "p-1", "d-1", at(9, 0)).await;
    book(&state, "p-2", "d-1", at(10, 0)).await;
    book(&state, "p-1", "d-2", at(9, 0)).await;

    let patient = CallerContext::new("p-1", Role::Patient);
    let mine = service
        .list_appointments(AppointmentQuery { patient_id: Some("p-2".to_string()), ..Default::default() }, &patient)
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|a| a.patient_id == "p-1"));

    let doctor = CallerContext::new("d-1", Role::Doctor);
    assert_eq!(service.count_appointments(AppointmentQuery::default(), &doctor).await.unwrap(), 2);

    let sorted = service
        .list_appointments(
            AppointmentQuery {
                doctor_id: Some("d-1".to_string()),
                sort_order: Some(shared_database::SortOrder::Desc),
                limit: Some(1),
                ..Default::default()
            },
            &staff(),
        )
        .await
        .unwrap();
    assert_eq!(sorted.len(), 1);
    assert_eq!(sorted[0].appointment_date, at(10, 0));

    let with_deleted = AppointmentQuery { include_deleted: true, ..Default::default() };
    assert_matches!(
        service.list_appointments(with_deleted, &patient).await,
        Err(AppointmentError::Forbidden(_))
    );
}

#[tokio::test]
async fn patients_book_only_for_themselves_and_nurses_cannot_change_status() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let patient = CallerContext::new("p-1", Role::Patient);

    assert_matches!(
        service.create_appointment(booking("p-2", "d-1", at(9, 0), None), &patient).await,
        Err(AppointmentError::Forbidden(_))
    );

    let nurse = CallerContext::new("n-1", Role::Nurse);
    let appointment = service.create_appointment(booking("p-1", "d-1", at(9, 0), None), &nurse).await.unwrap();
    assert_eq!(appointment.created_by.as_deref(), Some("n-1"));
    assert_matches!(
        service.update_status(&appointment.id, AppointmentStatus::Confirmed, &nurse).await,
        Err(AppointmentError::Forbidden(_))
    );
    assert_matches!(
        service.get_appointment(&appointment.id, &CallerContext::new("p-9", Role::Patient)).await,
        Err(AppointmentError::Forbidden(_))
    );
}

#[tokio::test]
async fn department_comes_from_the_doctor_when_omitted() {
    let state = TestConfig::default().to_state();
    let department = DepartmentService::new(&state)
        .create_department(
            CreateDepartmentRequest { name: "Cardiology".to_string(), description: None, head_id: None },
            &admin(),
        )
        .await
        .unwrap();
    StaffService::new(&state)
        .create_staff(
            CreateStaffRequest {
                id: Some("d-1".to_string()),
                first_name: "Gregory".to_string(),
                last_name: "House".to_string(),
                email: "house@example.com".to_string(),
                phone: None,
                role: StaffRole::Doctor,
                department_id: Some(department.id.clone()),
                specialization: Some("Diagnostics".to_string()),
                license_number: None,
            },
            &admin(),
        )
        .await
        .unwrap();

    let appointment = book(&state, "p-1", "d-1", at(9, 0)).await;
    assert_eq!(appointment.department_id.as_deref(), Some(department.id.as_str()));

    let unknown_doctor = book(&state, "p-1", "d-404", at(9, 0)).await;
    assert!(unknown_doctor.department_id.is_none());

    let by_department = AppointmentQuery { department_id: Some(department.id), ..Default::default() };
    assert_eq!(AppointmentService::new(&state).list_appointments(by_department, &staff()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn upcoming_only_lists_pending_appointments_in_the_window() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let now = Utc::now();

    book(&state, "p-1", "d-1", now + Duration::hours(3)).await;
    book(&state, "p-1", "d-1", now + Duration::hours(30)).await;
    book(&state, "p-1", "d-1", now - Duration::hours(3)).await;
    let done = book(&state, "p-2", "d-1", now + Duration::hours(5)).await;
    service.update_status(&done.id, AppointmentStatus::Completed, &staff()).await.unwrap();

    let upcoming = service.upcoming_appointments(UpcomingQuery::default(), &staff()).await.unwrap();
    assert_eq!(upcoming.len(), 1);

    let week = UpcomingQuery { hours_ahead: Some(24 * 7), limit: None };
    assert_eq!(service.upcoming_appointments(week, &staff()).await.unwrap().len(), 2);

    assert_matches!(
        service.upcoming_appointments(UpcomingQuery { hours_ahead: Some(0), limit: None }, &staff()).await,
        Err(AppointmentError::ValidationFailed(_))
    );
}

#[tokio::test]
async fn upcoming_rejects_a_window_beyond_the_calendar() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    book(&state, "p-1", "d-1", Utc::now() + Duration::hours(3)).await;

    for hours_ahead in [3_000_000_000, i64::MAX] {
        assert_matches!(
            service
                .upcoming_appointments(UpcomingQuery { hours_ahead: Some(hours_ahead), limit: None }, &staff())
                .await,
            Err(AppointmentError::ValidationFailed(_))
        );
    }

    let decade = UpcomingQuery { hours_ahead: Some(24 * 365 * 10), limit: None };
    assert_eq!(service.upcoming_appointments(decade, &staff()).await.unwrap().len(), 1);
}

// ==============================================================================
// SCENARIO
// ==============================================================================

#[tokio::test]
async fn booking_conflict_cancel_and_restore_scenario() {
    let state = TestConfig::default().to_state();
    let service = AppointmentService::new(&state);
    let p = CallerContext::new("patient-p", Role::Patient);
    let p2 = CallerContext::new("patient-p2", Role::Patient);
    let d = CallerContext::new("doctor-d", Role::Doctor);
    let day = NaiveDate::from_ymd_opt(2025, 1, 10);

    let booked = service
        .create_appointment(booking("patient-p", "doctor-d", at(9, 0), Some(30)), &p)
        .await
        .unwrap();
    assert_matches!(
        service.create_appointment(booking("patient-p2", "doctor-d", at(9, 15), Some(30)), &p2).await,
        Err(AppointmentError::SlotUnavailable { .. })
    );

    service.soft_delete_appointment(&booked.id, &staff()).await.unwrap();
    let that_day = AppointmentQuery { date: day, ..Default::default() };
    assert!(service.list_appointments(that_day.clone(), &d).await.unwrap().is_empty());

    service.restore_appointment(&booked.id, &staff()).await.unwrap();
    let listed = service.list_appointments(that_day, &d).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, booked.id);
    assert_eq!(listed[0].status, AppointmentStatus::Scheduled);
}
