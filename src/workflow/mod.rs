//! Booking wizard: a pure [`BookingMachine`] plus the async [`BookingFlow`]
//! that executes its commands, and the standalone edit draft.

mod edit;
mod flow;
mod machine;

pub use edit::{EditDraft, MSG_NOT_EDITABLE};
pub use flow::{BookingFlow, MSG_NO_SESSION};
pub use machine::{
    BookingDraft, BookingMachine, Step, Submission, Ticket, WizardAction, WizardCommand,
    WizardEvent, WizardSnapshot, MSG_BARBER_UNAVAILABLE, MSG_SELECT_BARBER, MSG_SELECT_DATETIME,
    MSG_SELECT_SERVICE,
};
