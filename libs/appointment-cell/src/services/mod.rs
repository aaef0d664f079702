pub mod appointment;
pub mod availability;
pub mod lifecycle;

pub use appointment::AppointmentService;
pub use availability::AvailabilityChecker;
pub use lifecycle::AppointmentLifecycleService;
