pub mod medicine;
pub mod prescription;

pub use medicine::MedicineService;
pub use prescription::PrescriptionService;

/// Key under which stock changes for one medicine are serialized.
pub(crate) fn stock_lock_key(medicine_id: &str) -> String {
    format!("medicine-stock:{}", medicine_id)
}
