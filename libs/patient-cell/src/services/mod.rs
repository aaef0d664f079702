pub mod patient;
pub mod treatment;

pub use patient::PatientService;
pub use treatment::TreatmentService;
