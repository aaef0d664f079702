use assert_matches::assert_matches;

use shared_models::auth::{CallerContext, Role};
use shared_utils::test_utils::TestConfig;
use staff_cell::models::*;
use staff_cell::services::{DepartmentService, StaffService};

fn admin() -> CallerContext {
    CallerContext::new("admin-1", Role::Admin)
}

fn cardiology() -> CreateDepartmentRequest {
    CreateDepartmentRequest {
        name: "Cardiology".to_string(),
        description: Some("Heart care".to_string()),
        head_id: None,
    }
}

fn doctor_request(email: &str, department_id: Option<String>) -> CreateStaffRequest {
    CreateStaffRequest {
        id: None,
        first_name: "Gregory".to_string(),
        last_name: "House".to_string(),
        email: email.to_string(),
        phone: Some("+1 555 0100".to_string()),
        role: StaffRole::Doctor,
        department_id,
        specialization: Some("Diagnostics".to_string()),
        license_number: Some("MD-001".to_string()),
    }
}

#[tokio::test]
async fn department_names_are_unique_among_live_departments() {
    let state = TestConfig::default().to_state();
    let service = DepartmentService::new(&state);

    let department = service.create_department(cardiology(), &admin()).await.unwrap();

    let mut duplicate = cardiology();
    duplicate.name = "cardiology".to_string();
    assert_matches!(
        service.create_department(duplicate, &admin()).await,
        Err(StaffError::DepartmentExists { .. })
    );

    service.soft_delete_department(&department.id, &admin()).await.unwrap();
    assert!(service.list_departments().await.unwrap().is_empty());
    assert_matches!(service.get_department(&department.id).await, Err(StaffError::DepartmentNotFound));

    let replacement = service.create_department(cardiology(), &admin()).await.unwrap();
    assert_ne!(replacement.id, department.id);

    // The old one cannot come back while its name is taken.
    assert_matches!(
        service.restore_department(&department.id, &admin()).await,
        Err(StaffError::DepartmentExists { .. })
    );
}

#[tokio::test]
async fn only_admin_manages_departments() {
    let state = TestConfig::default().to_state();
    let service = DepartmentService::new(&state);
    let staff = CallerContext::new("staff-1", Role::Staff);

    assert_matches!(service.create_department(cardiology(), &staff).await, Err(StaffError::Forbidden(_)));

    let department = service.create_department(cardiology(), &admin()).await.unwrap();
    assert_matches!(
        service.hard_delete_department(&department.id, &staff).await,
        Err(StaffError::Forbidden(_))
    );
    service.hard_delete_department(&department.id, &admin()).await.unwrap();
    assert_matches!(
        service.hard_delete_department(&department.id, &admin()).await,
        Err(StaffError::DepartmentNotFound)
    );
}

#[tokio::test]
async fn staff_lifecycle_and_filters() {
    let state = TestConfig::default().to_state();
    let departments = DepartmentService::new(&state);
    let service = StaffService::new(&state);

    let department = departments.create_department(cardiology(), &admin()).await.unwrap();
    let doctor = service
        .create_staff(doctor_request("House@Example.com", Some(department.id.clone())), &admin())
        .await
        .unwrap();
    assert_eq!(doctor.email, "house@example.com");

    let mut nurse = doctor_request("nurse@example.com", None);
    nurse.role = StaffRole::Nurse;
    nurse.first_name = "Carla".to_string();
    nurse.last_name = "Espinosa".to_string();
    service.create_staff(nurse, &admin()).await.unwrap();

    let doctors = service
        .list_staff(StaffSearchQuery { role: Some(StaffRole::Doctor), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(doctors.len(), 1);

    let by_name = service
        .list_staff(StaffSearchQuery { name: Some("espi".to_string()), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(by_name[0].role, StaffRole::Nurse);

    assert_eq!(service.department_of(&doctor.id).await.unwrap(), Some(department.id.clone()));
    assert_eq!(service.department_of("nobody").await.unwrap(), None);

    service.soft_delete_staff(&doctor.id, &admin()).await.unwrap();
    assert_eq!(service.count_by_role(Some(StaffRole::Doctor)).await.unwrap(), 0);
    service.restore_staff(&doctor.id, &admin()).await.unwrap();
    assert_eq!(service.count_by_role(None).await.unwrap(), 2);
}

#[tokio::test]
async fn staff_validation_and_ownership() {
    let state = TestConfig::default().to_state();
    let service = StaffService::new(&state);

    assert_matches!(
        service.create_staff(doctor_request("not-an-email", None), &admin()).await,
        Err(StaffError::ValidationFailed(_))
    );
    assert_matches!(
        service.create_staff(doctor_request("a@example.com", Some("missing".to_string())), &admin()).await,
        Err(StaffError::DepartmentNotFound)
    );

    let mut with_id = doctor_request("a@example.com", None);
    with_id.id = Some("doctor-7".to_string());
    let member = service.create_staff(with_id, &admin()).await.unwrap();
    assert_eq!(member.id, "doctor-7");

    assert_matches!(
        service.create_staff(doctor_request("A@example.com", None), &admin()).await,
        Err(StaffError::EmailAlreadyExists { .. })
    );

    let mut reused_id = doctor_request("b@example.com", None);
    reused_id.id = Some("doctor-7".to_string());
    assert_matches!(service.create_staff(reused_id, &admin()).await, Err(StaffError::IdInUse(_)));

    let update = UpdateStaffRequest { specialization: Some("Nephrology".to_string()), ..Default::default() };
    let self_caller = CallerContext::new("doctor-7", Role::Doctor);
    let updated = service.update_staff("doctor-7", update.clone(), &self_caller).await.unwrap();
    assert_eq!(updated.specialization.as_deref(), Some("Nephrology"));
    assert_eq!(updated.license_number.as_deref(), Some("MD-001"));

    let other = CallerContext::new("doctor-8", Role::Doctor);
    assert_matches!(service.update_staff("doctor-7", update, &other).await, Err(StaffError::Forbidden(_)));
}
