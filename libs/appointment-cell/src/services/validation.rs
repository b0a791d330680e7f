use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use doctor_cell::models::{Unavailability, WorkingHours};

use crate::models::{Appointment, AppointmentError};

/// A proposed booking, before persistence. `exclude` carries the row's own
/// id when re-validating an existing appointment.
#[derive(Debug, Clone)]
pub struct BookingCandidate {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub exclude: Option<Uuid>,
}

/// Validate a candidate against the doctor's schedule context. Checks run
/// in a fixed order and the first failure wins:
///
/// 1. a working-hours block must exist for the weekday;
/// 2. the time must fall inside some active block (block end exclusive,
///    same boundary rule as slot generation);
/// 3. no unavailability window may cover the time;
/// 4. no other non-canceled appointment may hold the slot.
///
/// Pure over its inputs; callers fetch `blocks` for the candidate's
/// weekday, `windows` and `existing` for the candidate's (doctor, date).
pub fn validate_booking(
    candidate: &BookingCandidate,
    blocks: &[WorkingHours],
    windows: &[Unavailability],
    existing: &[Appointment],
) -> Result<(), AppointmentError> {
    let active: Vec<&WorkingHours> = blocks.iter().filter(|b| b.is_active).collect();
    if active.is_empty() {
        return Err(AppointmentError::NotAvailableOnWeekday);
    }

    if !active.iter().any(|b| b.contains(candidate.time)) {
        return Err(AppointmentError::OutsideWorkingHours);
    }

    if windows.iter().any(|w| w.blocks(candidate.time)) {
        return Err(AppointmentError::DoctorUnavailable);
    }

    let slot_held = existing.iter().any(|a| {
        a.appointment_time == candidate.time
            && !a.is_canceled()
            && Some(a.id) != candidate.exclude
    });
    if slot_held {
        return Err(AppointmentError::SlotTaken);
    }

    Ok(())
}
