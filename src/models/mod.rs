pub mod availability;
pub mod booking;
pub mod conversation;
pub mod outcome;
pub mod professional;
pub mod session;

pub use availability::{AvailabilityDecision, WeeklySchedule};
pub use booking::{Booking, BookingStatus};
pub use conversation::{ChatMessage, Role};
pub use outcome::{Outcome, OutcomeKind, Reply};
pub use professional::Professional;
pub use session::{CustomerDetails, Session, SessionPatch, Stage};
