pub mod department;
pub mod staff;

pub use department::DepartmentService;
pub use staff::StaffService;
