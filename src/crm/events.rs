use super::{fetch, CrmService, Outcome};
use crate::credentials::SessionContext;
use crate::db::{directory, Contract, Department, Event, User};
use crate::error::{AuthError, AuthResult};
use crate::permissions::{require_event_support, Action};
use crate::validation::{parse_datetime, validate_not_empty};
use chrono::{NaiveDate, NaiveDateTime};
use log::info;

/// Dates use `YYYY-MM-DD HH:MM:SS`
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub contract_id: u64,
    pub event_name: String,
    pub event_date_start: String,
    pub event_date_end: String,
    pub location: Option<String>,
    pub attendees: Option<u32>,
    pub notes: Option<String>,
}

/// Fields left `None` are unchanged
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub event_name: Option<String>,
    pub event_date_start: Option<String>,
    pub event_date_end: Option<String>,
    pub location: Option<String>,
    pub attendees: Option<u32>,
    pub notes: Option<String>,
}

/// All set criteria must hold
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Events whose support contact is the caller
    pub assigned_to_me: bool,
    pub without_support: bool,
    pub client_id: Option<u64>,
    pub location: Option<String>,
    pub min_attendees: Option<u32>,
    pub max_attendees: Option<u32>,
    pub starts_on_or_after: Option<NaiveDate>,
    pub ends_on_or_before: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event, caller_id: u64) -> bool {
        if self.assigned_to_me && event.support_contact_id != Some(caller_id) {
            return false;
        }
        if self.without_support && event.support_contact_id.is_some() {
            return false;
        }
        if self.client_id.map_or(false, |id| id != event.client_id) {
            return false;
        }
        if let Some(location) = &self.location {
            if event.location.as_deref() != Some(location.as_str()) {
                return false;
            }
        }
        let attendees = event.attendees.unwrap_or(0);
        if self.min_attendees.map_or(false, |min| attendees < min)
            || self.max_attendees.map_or(false, |max| attendees > max)
        {
            return false;
        }
        if self
            .starts_on_or_after
            .map_or(false, |date| event.event_date_start.date() < date)
        {
            return false;
        }
        !self
            .ends_on_or_before
            .map_or(false, |date| event.event_date_end.date() > date)
    }
}

fn check_schedule(start: NaiveDateTime, end: NaiveDateTime) -> AuthResult<()> {
    if end < start {
        return Err(AuthError::validation("event cannot end before it starts"));
    }
    Ok(())
}

impl CrmService {
    /// Only the commercial contact of a signed contract may create its event
    pub fn create_event(&self, ctx: &SessionContext, new: NewEvent) -> AuthResult<Outcome<Event>> {
        self.run(ctx, Action::CreateEvent, |user, session| {
            let contract: Contract = fetch(session, new.contract_id)?;
            if contract.commercial_contact_id != Some(user.id) {
                return Err(AuthError::ownership_denied(format!("contract {}", contract.id)));
            }
            if !contract.signed {
                return Err(AuthError::validation(
                    "the contract must be signed before an event can be created",
                ));
            }

            validate_not_empty("event_name", &new.event_name)?;
            let start = parse_datetime(&new.event_date_start)?;
            let end = parse_datetime(&new.event_date_end)?;
            check_schedule(start, end)?;

            let mut event = Event {
                id: 0,
                contract_id: contract.id,
                client_id: contract.client_id,
                event_name: new.event_name,
                event_date_start: start,
                event_date_end: end,
                support_contact_id: None,
                location: new.location,
                attendees: new.attendees,
                notes: new.notes,
            };
            session.insert(&mut event)?;
            info!(
                "{} created event {} for contract {}",
                user.username, event.id, contract.id
            );
            Ok(event)
        })
    }

    /// Only the assigned support contact may update an event
    pub fn update_event(
        &self,
        ctx: &SessionContext,
        event_id: u64,
        changes: EventChanges,
    ) -> AuthResult<Outcome<Event>> {
        self.run(ctx, Action::UpdateEvent, |user, session| {
            let mut event: Event = fetch(session, event_id)?;
            require_event_support(user, &event)?;

            if let Some(name) = changes.event_name {
                validate_not_empty("event_name", &name)?;
                event.event_name = name;
            }
            if let Some(start) = changes.event_date_start {
                event.event_date_start = parse_datetime(&start)?;
            }
            if let Some(end) = changes.event_date_end {
                event.event_date_end = parse_datetime(&end)?;
            }
            check_schedule(event.event_date_start, event.event_date_end)?;
            if let Some(location) = changes.location {
                event.location = Some(location);
            }
            if let Some(attendees) = changes.attendees {
                event.attendees = Some(attendees);
            }
            if let Some(notes) = changes.notes {
                event.notes = Some(notes);
            }

            session.update(&event)?;
            info!("{} updated event {}", user.username, event.id);
            Ok(event)
        })
    }

    /// Set an event's support contact; the target must belong to Support
    pub fn assign_support_contact(
        &self,
        ctx: &SessionContext,
        event_id: u64,
        support_user_id: u64,
    ) -> AuthResult<Outcome<Event>> {
        self.run(ctx, Action::UpdateEventSupportContact, |user, session| {
            let mut event: Event = fetch(session, event_id)?;
            let target: User = fetch(session, support_user_id)?;
            if directory::department_of(session, target.department_id)? != Department::Support {
                return Err(AuthError::validation(format!(
                    "{} is not a member of the Support department",
                    target.username
                )));
            }

            event.support_contact_id = Some(target.id);
            session.update(&event)?;
            info!(
                "{} assigned {} to event {}",
                user.username, target.username, event.id
            );
            Ok(event)
        })
    }

    pub fn filter_events(&self, ctx: &SessionContext, filter: EventFilter) -> AuthResult<Outcome<Vec<Event>>> {
        self.run(ctx, Action::FilterEvents, |user, session| {
            session.filter::<Event, _>(|e| filter.matches(e, user.id))
        })
    }

    pub fn list_events(&self, ctx: &SessionContext) -> AuthResult<Outcome<Vec<Event>>> {
        self.read(ctx, "list_events", |_, session| session.all::<Event>())
    }
}
