use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::conflict::{horizon_end, parse_minute_of_day};
use crate::models::{AvailabilityException, CreateExceptionRequest};

pub struct ExceptionService {
    supabase: SupabaseClient,
}

impl ExceptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a date-specific schedule exception (holiday, vacation day,
    /// blocked window, extra opening).
    pub async fn create_exception(
        &self,
        doctor_id: &str,
        request: CreateExceptionRequest,
        auth_token: &str,
    ) -> Result<AvailabilityException> {
        debug!("Creating schedule exception for doctor {} on {}", doctor_id, request.date);

        // A partial-day exception needs both bounds; whole-day has neither.
        match (&request.start_time, &request.end_time) {
            (None, None) => {}
            (Some(start), Some(end)) => {
                let start = parse_minute_of_day(start)
                    .ok_or_else(|| anyhow!("Invalid start time: {}", start))?;
                let end = parse_minute_of_day(end)
                    .ok_or_else(|| anyhow!("Invalid end time: {}", end))?;
                if start >= end {
                    return Err(anyhow!("Start time must be before end time"));
                }
            }
            _ => {
                return Err(anyhow!(
                    "A partial-day exception requires both start and end times"
                ));
            }
        }

        // Reject an exact duplicate for the same date and window.
        let existing = self.exceptions_for_date(doctor_id, request.date, auth_token).await?;
        let duplicate = existing.iter().any(|ex| {
            ex.start_time == request.start_time && ex.end_time == request.end_time
        });
        if duplicate {
            return Err(anyhow!(
                "A schedule exception already exists for this date and time window"
            ));
        }

        let exception_data = json!({
            "doctor_id": doctor_id,
            "date": request.date,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "kind": request.kind,
            "reason": request.reason,
            "created_at": chrono::Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_schedule_exceptions",
            Some(auth_token),
            Some(exception_data),
            Some(headers),
        ).await?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to create schedule exception"))?;

        let exception: AvailabilityException = serde_json::from_value(created)?;
        debug!("Schedule exception created with ID: {}", exception.id);

        Ok(exception)
    }

    /// All of a doctor's exceptions, oldest date first. Works with the anon
    /// key when no token is supplied (public calendar reads).
    pub async fn list_exceptions(
        &self,
        doctor_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityException>> {
        let path = format!(
            "/rest/v1/doctor_schedule_exceptions?doctor_id=eq.{}&order=date.asc,start_time.asc",
            doctor_id
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        Ok(Self::parse_rows(rows))
    }

    /// Exceptions still actionable for new weekly slots: dated between today
    /// and one year from today, both inclusive, oldest first so the conflict
    /// scan's first-match order is deterministic.
    pub async fn exceptions_within_horizon(
        &self,
        doctor_id: &str,
        today: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<AvailabilityException>> {
        let path = format!(
            "/rest/v1/doctor_schedule_exceptions?doctor_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            doctor_id,
            today,
            horizon_end(today)
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        Ok(Self::parse_rows(rows))
    }

    pub async fn delete_exception(
        &self,
        exception_id: &str,
        auth_token: &str,
    ) -> Result<()> {
        debug!("Deleting schedule exception: {}", exception_id);

        let path = format!("/rest/v1/doctor_schedule_exceptions?id=eq.{}", exception_id);
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(())
    }

    async fn exceptions_for_date(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityException>> {
        let path = format!(
            "/rest/v1/doctor_schedule_exceptions?doctor_id=eq.{}&date=eq.{}",
            doctor_id, date
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(Self::parse_rows(rows))
    }

    // One bad row must not poison the batch: the conflict check treats
    // unreadable exceptions as non-evaluable, so parsing stays lenient here.
    fn parse_rows(rows: Vec<Value>) -> Vec<AvailabilityException> {
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value::<AvailabilityException>(row) {
                Ok(exception) => Some(exception),
                Err(err) => {
                    warn!("Skipping malformed schedule exception row: {}", err);
                    None
                }
            })
            .collect()
    }
}
