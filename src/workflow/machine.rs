use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ApiError;
use crate::models::{normalize_time, Barber, Booking, Service};
use crate::result::Resource;

pub const MSG_SELECT_BARBER: &str = "Select a barber";
pub const MSG_SELECT_SERVICE: &str = "Select at least one service";
pub const MSG_SELECT_DATETIME: &str = "Select date and time";
pub const MSG_BARBER_UNAVAILABLE: &str = "That barber is not available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Barber,
    Services,
    #[serde(rename = "DATETIME")]
    DateTime,
    Confirmation,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Barber, Step::Services, Step::DateTime, Step::Confirmation];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Self::ALL.get(index).copied()
    }

    fn previous(self) -> Option<Step> {
        self.index().checked_sub(1).and_then(Step::from_index)
    }
}

/// Identifies one dispatched call. Results carrying a ticket from an older
/// generation are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    serial: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    SelectBarber(i64),
    ToggleService(i64),
    SetDate(String),
    SetTime(String),
    Advance,
    Retreat,
    JumpTo(usize),
    Submit,
    Reset,
    DismissError,
}

/// Everything the backend needs to create the booking, already normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub barber_id: i64,
    pub barber_name: String,
    pub date: String,
    pub start_time: String,
    pub service_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCommand {
    LoadBarbers { ticket: Ticket },
    LoadServices { ticket: Ticket },
    Submit { ticket: Ticket, submission: Submission },
}

impl WizardCommand {
    pub fn ticket(&self) -> Ticket {
        match self {
            WizardCommand::LoadBarbers { ticket }
            | WizardCommand::LoadServices { ticket }
            | WizardCommand::Submit { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    BarbersLoaded {
        ticket: Ticket,
        result: Result<Vec<Barber>, ApiError>,
    },
    ServicesLoaded {
        ticket: Ticket,
        result: Result<Vec<Service>, ApiError>,
    },
    Submitted {
        ticket: Ticket,
        result: Result<Booking, ApiError>,
    },
}

impl WizardEvent {
    fn ticket(&self) -> Ticket {
        match self {
            WizardEvent::BarbersLoaded { ticket, .. }
            | WizardEvent::ServicesLoaded { ticket, .. }
            | WizardEvent::Submitted { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDraft {
    pub step: Step,
    pub barber: Option<Barber>,
    pub selected_service_ids: BTreeSet<i64>,
    pub date: String,
    pub time: String,
    pub loading: bool,
    pub error: Option<String>,
    pub booking: Option<Booking>,
    pub succeeded: bool,
}

impl Default for BookingDraft {
    fn default() -> Self {
        Self {
            step: Step::Barber,
            barber: None,
            selected_service_ids: BTreeSet::new(),
            date: String::new(),
            time: String::new(),
            loading: false,
            error: None,
            booking: None,
            succeeded: false,
        }
    }
}

/// Read-only view handed to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardSnapshot {
    pub draft: BookingDraft,
    pub barbers: Resource<Vec<Barber>>,
    pub services: Resource<Vec<Service>>,
    pub generation: u64,
}

impl WizardSnapshot {
    pub fn selected_services(&self) -> Vec<&Service> {
        self.services
            .value()
            .map(|services| {
                services
                    .iter()
                    .filter(|service| self.draft.selected_service_ids.contains(&service.id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn total_minutes(&self) -> u32 {
        self.selected_services()
            .iter()
            .map(|service| service.duration_minutes)
            .sum()
    }

    pub fn total_price(&self) -> rust_decimal::Decimal {
        self.selected_services().iter().map(|service| service.price).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Barbers,
    Services,
    Submit,
}

/// The booking wizard as a pure state machine: actions in, commands out,
/// results fed back as events. No IO happens here.
#[derive(Debug, Default)]
pub struct BookingMachine {
    draft: BookingDraft,
    barbers: Resource<Vec<Barber>>,
    services: Resource<Vec<Service>>,
    generation: u64,
    next_serial: u64,
    in_flight: Option<(Ticket, Request)>,
}

impl BookingMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    pub fn step(&self) -> Step {
        self.draft.step
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            draft: self.draft.clone(),
            barbers: self.barbers.clone(),
            services: self.services.clone(),
            generation: self.generation,
        }
    }

    /// Kicks off the barber catalog load.
    pub fn start(&mut self) -> WizardCommand {
        let ticket = self.dispatch(Request::Barbers);
        self.barbers = Resource::Pending;
        WizardCommand::LoadBarbers { ticket }
    }

    pub fn handle(&mut self, action: WizardAction) -> Option<WizardCommand> {
        match action {
            WizardAction::SelectBarber(id) => {
                self.select_barber(id);
                None
            }
            WizardAction::ToggleService(id) => {
                let selected = &mut self.draft.selected_service_ids;
                if !selected.remove(&id) {
                    selected.insert(id);
                }
                self.draft.error = None;
                None
            }
            WizardAction::SetDate(date) => {
                self.draft.date = date;
                self.draft.error = None;
                None
            }
            WizardAction::SetTime(time) => {
                self.draft.time = time;
                self.draft.error = None;
                None
            }
            WizardAction::Advance => self.advance(),
            WizardAction::Submit if self.draft.step == Step::Confirmation => self.advance(),
            WizardAction::Submit => None,
            WizardAction::Retreat => {
                if let Some(previous) = self.draft.step.previous() {
                    self.draft.step = previous;
                    self.draft.error = None;
                }
                None
            }
            WizardAction::JumpTo(index) => {
                match Step::from_index(index) {
                    Some(target) if target < self.draft.step => {
                        self.draft.step = target;
                        self.draft.error = None;
                    }
                    _ => {}
                }
                None
            }
            WizardAction::Reset => self.reset(),
            WizardAction::DismissError => {
                self.draft.error = None;
                None
            }
        }
    }

    /// Applies a call result. Returns `false` when the result belongs to a
    /// draft that has since been reset.
    pub fn apply(&mut self, event: WizardEvent) -> bool {
        let ticket = event.ticket();
        if ticket.generation != self.generation {
            log::debug!(
                "Dropping result from generation {} (current {})",
                ticket.generation,
                self.generation
            );
            return false;
        }

        if self.in_flight.map(|(pending, _)| pending) == Some(ticket) {
            self.in_flight = None;
            self.draft.loading = false;
        }

        match event {
            WizardEvent::BarbersLoaded { result, .. } => {
                let result = result.map(|barbers| {
                    barbers
                        .into_iter()
                        .filter(|barber| barber.active)
                        .collect::<Vec<_>>()
                });
                if let Err(err) = &result {
                    self.draft.error = Some(err.to_string());
                }
                self.barbers = result.into();
            }
            WizardEvent::ServicesLoaded { result, .. } => {
                if let Err(err) = &result {
                    self.draft.error = Some(err.to_string());
                }
                self.services = result.into();
            }
            WizardEvent::Submitted { result, .. } => match result {
                Ok(booking) => {
                    self.draft.booking = Some(booking);
                    self.draft.succeeded = true;
                    self.draft.error = None;
                }
                Err(err) => {
                    self.draft.error = Some(err.to_string());
                }
            },
        }
        true
    }

    fn dispatch(&mut self, request: Request) -> Ticket {
        self.next_serial += 1;
        let ticket = Ticket {
            generation: self.generation,
            serial: self.next_serial,
        };
        self.in_flight = Some((ticket, request));
        self.draft.loading = true;
        ticket
    }

    fn select_barber(&mut self, id: i64) {
        let barber = self
            .barbers
            .value()
            .and_then(|barbers| barbers.iter().find(|barber| barber.id == id && barber.active))
            .cloned();

        match barber {
            Some(barber) => {
                self.draft.barber = Some(barber);
                self.draft.error = None;
            }
            None => self.draft.error = Some(MSG_BARBER_UNAVAILABLE.to_string()),
        }
    }

    fn advance(&mut self) -> Option<WizardCommand> {
        if self.draft.succeeded {
            return None;
        }

        match self.draft.step {
            Step::Barber => {
                if self.draft.barber.is_none() {
                    return self.reject(MSG_SELECT_BARBER);
                }
                self.draft.step = Step::Services;
                self.draft.error = None;
                let ticket = self.dispatch(Request::Services);
                if !matches!(self.services, Resource::Success(_)) {
                    self.services = Resource::Pending;
                }
                Some(WizardCommand::LoadServices { ticket })
            }
            Step::Services => {
                if self.draft.selected_service_ids.is_empty() {
                    return self.reject(MSG_SELECT_SERVICE);
                }
                self.draft.step = Step::DateTime;
                self.draft.error = None;
                None
            }
            Step::DateTime => {
                if !self.has_date_and_time() {
                    return self.reject(MSG_SELECT_DATETIME);
                }
                self.draft.step = Step::Confirmation;
                self.draft.error = None;
                None
            }
            Step::Confirmation => self.submit(),
        }
    }

    fn submit(&mut self) -> Option<WizardCommand> {
        if matches!(self.in_flight, Some((_, Request::Submit))) {
            return None;
        }

        // The earlier steps already enforce these; a corrupted draft must
        // still never reach the network.
        let Some(barber) = self.draft.barber.clone() else {
            return self.reject(MSG_SELECT_BARBER);
        };
        if self.draft.selected_service_ids.is_empty() {
            return self.reject(MSG_SELECT_SERVICE);
        }
        if !self.has_date_and_time() {
            return self.reject(MSG_SELECT_DATETIME);
        }

        self.draft.error = None;
        let submission = Submission {
            barber_id: barber.id,
            barber_name: barber.name,
            date: self.draft.date.trim().to_string(),
            start_time: normalize_time(self.draft.time.trim()),
            service_ids: self.draft.selected_service_ids.iter().copied().collect(),
        };
        let ticket = self.dispatch(Request::Submit);
        Some(WizardCommand::Submit { ticket, submission })
    }

    fn reset(&mut self) -> Option<WizardCommand> {
        self.generation += 1;
        self.in_flight = None;
        self.draft = BookingDraft::default();
        self.services = Resource::Pending;

        if matches!(self.barbers, Resource::Success(_)) {
            None
        } else {
            Some(self.start())
        }
    }

    fn has_date_and_time(&self) -> bool {
        !self.draft.date.trim().is_empty() && !self.draft.time.trim().is_empty()
    }

    fn reject(&mut self, message: &str) -> Option<WizardCommand> {
        self.draft.error = Some(message.to_string());
        None
    }
}
