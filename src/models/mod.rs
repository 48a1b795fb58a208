pub mod appointment;
pub mod audit;
pub mod command;
pub mod conversation;
pub mod owner;
pub mod patient;
pub mod response;
pub mod slot;
pub mod validation;
pub mod working_hours;

pub use appointment::{Appointment, AppointmentStatus};
pub use audit::{AuditEntry, AuditKind};
pub use command::{Action, ParsedCommand, ProposedDateTime, Timeframe};
pub use conversation::{ConversationState, PendingAction, Step};
pub use owner::Owner;
pub use patient::Patient;
pub use response::{AgendaEntry, ProcessingResult, ResponseIntent};
pub use slot::{AvailabilityBlock, AvailableSlot, TimeRange};
pub use validation::{Conflict, ValidationError};
pub use working_hours::{DayHours, WorkingHours};
