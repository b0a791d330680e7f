use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{weekday_index, DaySlotsResponse, ScheduleError, Slot, Unavailability, WorkingHours};
use crate::services::doctor::DoctorService;
use crate::services::schedule::ScheduleService;

/// Step through the working-hour blocks of one day and mark each candidate
/// time as booked or blocked. Pure over its inputs.
///
/// `cutoff` is the current local time when `date` is today: candidate times
/// not strictly after it are dropped. Block ends are exclusive; duplicate
/// times from overlapping blocks are collapsed, first occurrence winning.
pub fn compute_day_slots(
    date: NaiveDate,
    blocks: &[WorkingHours],
    step_minutes: i64,
    booked: &HashSet<NaiveTime>,
    windows: &[Unavailability],
    cutoff: Option<NaiveTime>,
) -> Vec<Slot> {
    let mut out: Vec<Slot> = Vec::new();

    for block in blocks {
        if !block.is_active {
            continue;
        }

        let mut cur = date.and_time(block.start_time);
        let end = date.and_time(block.end_time);

        while cur < end {
            let t = cur.time();
            cur += Duration::minutes(step_minutes);

            if let Some(now) = cutoff {
                if t <= now {
                    continue;
                }
            }

            let is_booked = booked.contains(&t);
            let is_blocked = windows.iter().any(|w| w.blocks(t));
            out.push(Slot::new(t, is_booked, is_blocked));
        }
    }

    out.sort_by_key(|s| s.time);

    let mut seen = HashSet::new();
    out.retain(|s| seen.insert(s.time));
    out
}

/// Fetches a doctor's day context and derives the bookable slots.
pub struct SlotService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    schedule: ScheduleService,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            schedule: ScheduleService::new(config),
        }
    }

    pub async fn compute_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DaySlotsResponse, ScheduleError> {
        debug!("Computing slots for doctor {} on {}", doctor_id, date);

        let doctor = self.doctors.get_doctor(doctor_id, auth_token).await?;

        let blocks = self
            .schedule
            .active_blocks_for_weekday(doctor_id, weekday_index(date), auth_token)
            .await?;
        if blocks.is_empty() {
            return Ok(DaySlotsResponse { doctor_id: doctor.id, date, slots: vec![] });
        }

        let appointments = self.non_canceled_appointments(doctor_id, date, auth_token).await?;

        // Daily cap: 0 means uncapped.
        if doctor.max_daily_appointments > 0
            && appointments.len() >= doctor.max_daily_appointments as usize
        {
            debug!("Doctor {} reached daily cap of {}", doctor_id, doctor.max_daily_appointments);
            return Ok(DaySlotsResponse { doctor_id: doctor.id, date, slots: vec![] });
        }

        let booked: HashSet<NaiveTime> = appointments.into_iter().collect();
        let windows = self.schedule.windows_for_date(doctor_id, date, auth_token).await?;

        let cutoff = if date == Utc::now().date_naive() {
            Some(Utc::now().time())
        } else {
            None
        };

        let slots = compute_day_slots(date, &blocks, doctor.slot_step_minutes(), &booked, &windows, cutoff);

        Ok(DaySlotsResponse { doctor_id: doctor.id, date, slots })
    }

    /// Times of non-canceled appointments for (doctor, date).
    async fn non_canceled_appointments(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=in.(pending,confirmed)&select=appointment_time",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let mut times = Vec::with_capacity(result.len());
        for row in result {
            let raw = row["appointment_time"]
                .as_str()
                .ok_or_else(|| ScheduleError::DatabaseError("Missing appointment_time".to_string()))?;
            let time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
                .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;
            times.push(time);
        }
        Ok(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn block(weekday: u8, start: NaiveTime, end: NaiveTime) -> WorkingHours {
        WorkingHours {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            weekday,
            start_time: start,
            end_time: end,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn window(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Unavailability {
        Unavailability {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: monday(),
            start_time: start,
            end_time: end,
            reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
    }

    #[test]
    fn no_blocks_yields_no_slots() {
        let slots = compute_day_slots(monday(), &[], 15, &HashSet::new(), &[], None);
        assert!(slots.is_empty());
    }

    #[test]
    fn inactive_blocks_are_skipped() {
        let mut b = block(0, t(9, 0), t(10, 0));
        b.is_active = false;
        let slots = compute_day_slots(monday(), &[b], 15, &HashSet::new(), &[], None);
        assert!(slots.is_empty());
    }

    #[test]
    fn half_hour_block_with_quarter_step_ends_before_block_end() {
        // [09:00, 09:30) stepped by 15 gives 09:00 and 09:15, never 09:30.
        let b = block(0, t(9, 0), t(9, 30));
        let slots = compute_day_slots(monday(), &[b], 15, &HashSet::new(), &[], None);
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(9, 0), t(9, 15)]);
    }

    #[test]
    fn hour_block_with_half_hour_step() {
        let b = block(0, t(9, 0), t(10, 0));
        let slots = compute_day_slots(monday(), &[b], 30, &HashSet::new(), &[], None);
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(9, 0), t(9, 30)]);
        assert!(slots.iter().all(|s| !s.booked && !s.blocked));
    }

    #[test]
    fn computation_is_idempotent() {
        let b = block(0, t(9, 0), t(11, 0));
        let booked: HashSet<NaiveTime> = [t(9, 30)].into_iter().collect();
        let first = compute_day_slots(monday(), &[b.clone()], 30, &booked, &[], None);
        let second = compute_day_slots(monday(), &[b], 30, &booked, &[], None);
        assert_eq!(first, second);
    }

    #[test]
    fn booked_time_is_flagged() {
        let b = block(0, t(9, 0), t(10, 0));
        let booked: HashSet<NaiveTime> = [t(9, 30)].into_iter().collect();
        let slots = compute_day_slots(monday(), &[b], 30, &booked, &[], None);
        assert!(!slots[0].booked);
        assert!(slots[1].booked);
        assert_eq!(slots[1].time, t(9, 30));
    }

    #[test]
    fn whole_day_window_blocks_every_slot() {
        let b = block(0, t(9, 0), t(10, 0));
        let slots = compute_day_slots(monday(), &[b], 30, &HashSet::new(), &[window(None, None)], None);
        assert!(slots.iter().all(|s| s.blocked));
    }

    #[test]
    fn timed_window_blocks_inclusive_bounds() {
        let b = block(0, t(9, 0), t(11, 0));
        let w = window(Some(t(9, 30)), Some(t(10, 0)));
        let slots = compute_day_slots(monday(), &[b], 30, &HashSet::new(), &[w], None);
        let blocked: Vec<NaiveTime> = slots.iter().filter(|s| s.blocked).map(|s| s.time).collect();
        assert_eq!(blocked, vec![t(9, 30), t(10, 0)]);
    }

    #[test]
    fn cutoff_drops_times_not_strictly_in_the_future() {
        let b = block(0, t(9, 0), t(10, 0));
        let slots = compute_day_slots(monday(), &[b], 15, &HashSet::new(), &[], Some(t(9, 15)));
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        // 09:00 and 09:15 are gone; 09:15 itself is not bookable.
        assert_eq!(times, vec![t(9, 30), t(9, 45)]);
    }

    #[test]
    fn overlapping_blocks_deduplicate_by_time() {
        let b1 = block(0, t(9, 0), t(10, 0));
        let b2 = block(0, t(9, 30), t(10, 30));
        let booked: HashSet<NaiveTime> = [t(9, 30)].into_iter().collect();
        let slots = compute_day_slots(monday(), &[b1, b2], 30, &booked, &[], None);
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(9, 0), t(9, 30), t(10, 0)]);
        // The flag of the first occurrence survives dedup.
        assert!(slots[1].booked);
    }

    #[test]
    fn slots_are_sorted_across_blocks() {
        let late = block(0, t(14, 0), t(15, 0));
        let early = block(0, t(9, 0), t(10, 0));
        let slots = compute_day_slots(monday(), &[late, early], 30, &HashSet::new(), &[], None);
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(9, 0), t(9, 30), t(14, 0), t(14, 30)]);
    }

    #[test]
    fn slot_labels_are_hour_minute() {
        let b = block(0, t(9, 0), t(9, 30));
        let slots = compute_day_slots(monday(), &[b], 30, &HashSet::new(), &[], None);
        assert_eq!(slots[0].label, "09:00");
    }
}
