use anyhow::{Result, anyhow};
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::conflict::{
    check_conflicts, parse_minute_of_day, weekdays_in_use, SlotCandidate,
};
use crate::models::{
    AvailabilityException, AvailabilityOutcome, CreateAvailabilityRequest,
    UpdateAvailabilityRequest, WeeklyAvailability,
};
use crate::weekday::{canonical_weekday, is_known_weekday, weekday_order};

use super::exception::ExceptionService;

pub struct AvailabilityService {
    supabase: SupabaseClient,
    exceptions: ExceptionService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            exceptions: ExceptionService::new(config),
        }
    }

    /// Create a weekly availability for a doctor.
    ///
    /// The candidate is checked against the doctor's blocking exceptions
    /// before anything is written; a blocked candidate comes back as
    /// [`AvailabilityOutcome::Blocked`] with the structured explanation,
    /// not as an error.
    pub async fn create_availability(
        &self,
        doctor_id: &str,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<AvailabilityOutcome> {
        debug!("Creating weekly availability for doctor: {}", doctor_id);

        let (start, end) = Self::validated_window(&request.start_time, &request.end_time)?;
        if !is_known_weekday(&request.weekday) {
            return Err(anyhow!("Unknown weekday: {}", request.weekday));
        }
        let weekday = canonical_weekday(&request.weekday);

        // A weekly row on an already-taken weekday would be dead data; the
        // selection UI disables those options, the write path re-checks.
        let existing = self.get_doctor_availability(doctor_id, Some(auth_token)).await?;
        if weekdays_in_use(&existing, None).contains(&weekday) {
            return Err(anyhow!(
                "An active availability already exists for {}",
                weekday
            ));
        }

        let today = Utc::now().date_naive();
        let exceptions = self
            .fetch_exceptions_fail_open(doctor_id, today, auth_token)
            .await;
        let decision = check_conflicts(
            &SlotCandidate {
                weekday: &request.weekday,
                start_time: &request.start_time,
                end_time: &request.end_time,
            },
            &exceptions,
            today,
        );
        if decision.blocked {
            debug!(
                "Availability for doctor {} blocked by exception on {:?}",
                doctor_id, decision.blocking_date
            );
            return Ok(AvailabilityOutcome::Blocked(decision));
        }

        let availability_data = json!({
            "doctor_id": doctor_id,
            "weekday": weekday,
            "start_time": Self::format_hms(start),
            "end_time": Self::format_hms(end),
            "slot_minutes": request.slot_minutes,
            "appointment_type": request.appointment_type,
            "active": request.active.unwrap_or(true),
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_weekly_availability",
            Some(auth_token),
            Some(availability_data),
            Some(headers),
        ).await?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create availability"))?;

        let availability: WeeklyAvailability = serde_json::from_value(created)?;
        debug!("Availability created with ID: {}", availability.id);

        Ok(AvailabilityOutcome::Saved(availability))
    }

    /// Update a weekly availability. Provided fields replace stored ones; the
    /// merged candidate goes through the same exception check as a create,
    /// excluding the edited row from the weekday-uniqueness pass.
    pub async fn update_availability(
        &self,
        availability_id: &str,
        request: UpdateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<AvailabilityOutcome> {
        debug!("Updating availability: {}", availability_id);

        let current = self.get_availability_by_id(availability_id, auth_token).await?;

        let weekday_raw = request.weekday.clone().unwrap_or_else(|| current.weekday.clone());
        let start_raw = request.start_time.clone().unwrap_or_else(|| current.start_time.clone());
        let end_raw = request.end_time.clone().unwrap_or_else(|| current.end_time.clone());

        let (start, end) = Self::validated_window(&start_raw, &end_raw)?;
        if !is_known_weekday(&weekday_raw) {
            return Err(anyhow!("Unknown weekday: {}", weekday_raw));
        }
        let weekday = canonical_weekday(&weekday_raw);

        let doctor_id = current.doctor_id.to_string();
        let existing = self.get_doctor_availability(&doctor_id, Some(auth_token)).await?;
        if weekdays_in_use(&existing, Some(current.id)).contains(&weekday) {
            return Err(anyhow!(
                "An active availability already exists for {}",
                weekday
            ));
        }

        let today = Utc::now().date_naive();
        let exceptions = self
            .fetch_exceptions_fail_open(&doctor_id, today, auth_token)
            .await;
        let decision = check_conflicts(
            &SlotCandidate {
                weekday: &weekday_raw,
                start_time: &start_raw,
                end_time: &end_raw,
            },
            &exceptions,
            today,
        );
        if decision.blocked {
            return Ok(AvailabilityOutcome::Blocked(decision));
        }

        // Build update object with only provided fields
        let mut update_data = serde_json::Map::new();

        if request.weekday.is_some() {
            update_data.insert("weekday".to_string(), json!(weekday));
        }
        if request.start_time.is_some() {
            update_data.insert("start_time".to_string(), json!(Self::format_hms(start)));
        }
        if request.end_time.is_some() {
            update_data.insert("end_time".to_string(), json!(Self::format_hms(end)));
        }
        if let Some(slot_minutes) = request.slot_minutes {
            update_data.insert("slot_minutes".to_string(), json!(slot_minutes));
        }
        if let Some(appointment_type) = request.appointment_type {
            update_data.insert("appointment_type".to_string(), json!(appointment_type));
        }
        if let Some(active) = request.active {
            update_data.insert("active".to_string(), json!(active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctor_weekly_availability?id=eq.{}", availability_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await?;

        let updated = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to update availability"))?;

        let availability: WeeklyAvailability = serde_json::from_value(updated)?;
        Ok(AvailabilityOutcome::Saved(availability))
    }

    /// A doctor's weekly availabilities, ordered for display. Works with the
    /// anon key when no token is supplied (public calendar reads).
    pub async fn get_doctor_availability(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<WeeklyAvailability>> {
        debug!("Fetching weekly availability for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_weekly_availability?doctor_id=eq.{}&order=weekday.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let availabilities: Vec<WeeklyAvailability> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<WeeklyAvailability>, _>>()?;

        Ok(availabilities)
    }

    /// Canonical weekdays the doctor already uses, Monday first, for the
    /// selection UI to disable. `exclude_id` keeps an edited row from
    /// conflicting with itself.
    pub async fn weekdays_in_use(
        &self,
        doctor_id: &str,
        exclude_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<Vec<String>> {
        let existing = self.get_doctor_availability(doctor_id, auth_token).await?;
        let mut days: Vec<String> = weekdays_in_use(&existing, exclude_id).into_iter().collect();
        days.sort_by_key(|day| weekday_order(day));
        Ok(days)
    }

    pub async fn delete_availability(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<()> {
        debug!("Deleting availability: {}", availability_id);

        let path = format!("/rest/v1/doctor_weekly_availability?id=eq.{}", availability_id);
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(())
    }

    // Private helper methods

    async fn get_availability_by_id(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<WeeklyAvailability> {
        let path = format!("/rest/v1/doctor_weekly_availability?id=eq.{}", availability_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Availability not found"))?;

        let availability: WeeklyAvailability = serde_json::from_value(row)?;
        Ok(availability)
    }

    // An outage in the exception store must not freeze scheduling: on fetch
    // failure the check proceeds with zero exceptions and logs the cause.
    async fn fetch_exceptions_fail_open(
        &self,
        doctor_id: &str,
        today: NaiveDate,
        auth_token: &str,
    ) -> Vec<AvailabilityException> {
        match self
            .exceptions
            .exceptions_within_horizon(doctor_id, today, Some(auth_token))
            .await
        {
            Ok(exceptions) => exceptions,
            Err(err) => {
                warn!(
                    "Could not fetch schedule exceptions for doctor {}, proceeding without conflict data: {}",
                    doctor_id, err
                );
                Vec::new()
            }
        }
    }

    fn validated_window(start_raw: &str, end_raw: &str) -> Result<(i32, i32)> {
        let start = parse_minute_of_day(start_raw)
            .ok_or_else(|| anyhow!("Invalid start time: {}", start_raw))?;
        let end = parse_minute_of_day(end_raw)
            .ok_or_else(|| anyhow!("Invalid end time: {}", end_raw))?;
        if start >= end {
            return Err(anyhow!("Start time must be before end time"));
        }
        Ok((start, end))
    }

    fn format_hms(minute_of_day: i32) -> String {
        format!("{:02}:{:02}:00", minute_of_day / 60, minute_of_day % 60)
    }
}
