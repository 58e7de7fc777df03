// API models and data fetching for the MBTA (Massachusetts Bay Transportation Authority) transit network
// Official website: https://www.mbta.com/
//
// API Endpoint:
// - Vehicle positions (JSON:API): https://api-v3.mbta.com/vehicles
//
// Delay figures are simulated (uniform 0-6 min per vehicle, drawn at fetch
// time). The upstream feed carries no schedule-adherence data.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use chrono_tz::America::New_York;
use log::{debug, info};
use rand::Rng;
use reqwest::blocking;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelayCategory {
    OnTime,
    LowDelay,
    ModerateDelay,
    HighDelay,
}

impl DelayCategory {
    pub const ALL: [DelayCategory; 4] = [
        DelayCategory::OnTime,
        DelayCategory::LowDelay,
        DelayCategory::ModerateDelay,
        DelayCategory::HighDelay,
    ];

    /// Fixed thresholds, evaluated in order.
    pub fn from_minutes(minutes: u8) -> Self {
        if minutes <= 1 {
            DelayCategory::OnTime
        } else if minutes == 2 {
            DelayCategory::LowDelay
        } else if minutes <= 4 {
            DelayCategory::ModerateDelay
        } else {
            DelayCategory::HighDelay
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DelayCategory::OnTime => "On Time",
            DelayCategory::LowDelay => "Low Delay",
            DelayCategory::ModerateDelay => "Moderate Delay",
            DelayCategory::HighDelay => "High Delay",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.label() == label)
    }
}

impl std::fmt::Display for DelayCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub vehicle_id: String,
    pub route: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
    pub updated_at: DateTime<FixedOffset>,
    pub delay_minutes: u8,
    pub delay_category: DelayCategory,
    pub hour: u32,
}

impl VehicleRecord {
    /// Derives `delay_category` and `hour` so a record can never carry values
    /// inconsistent with its `delay_minutes` and `updated_at`.
    pub fn new(
        vehicle_id: String,
        route: String,
        latitude: f64,
        longitude: f64,
        status: String,
        updated_at: DateTime<FixedOffset>,
        delay_minutes: u8,
    ) -> Self {
        let delay_category = DelayCategory::from_minutes(delay_minutes);
        // Hour in the offset the feed reported, not in UTC.
        let hour = updated_at.hour();

        VehicleRecord {
            vehicle_id,
            route,
            latitude,
            longitude,
            status,
            updated_at,
            delay_minutes,
            delay_category,
            hour,
        }
    }
}

// ============================================================================
// Fetch Cache (60-second memoization window)
// ============================================================================

#[derive(Debug, Clone)]
pub struct FetchCache {
    pub records: Vec<VehicleRecord>,
    pub fetched_at: u64,
}

impl FetchCache {
    pub fn new(records: Vec<VehicleRecord>) -> Self {
        FetchCache {
            records,
            fetched_at: unix_now(),
        }
    }

    pub fn with_timestamp(records: Vec<VehicleRecord>, fetched_at: u64) -> Self {
        FetchCache {
            records,
            fetched_at,
        }
    }

    /// Pure staleness check against an explicit clock reading.
    pub fn is_stale_at(&self, now_secs: u64, max_age_secs: u64) -> bool {
        now_secs.saturating_sub(self.fetched_at) > max_age_secs
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(unix_now(), TdaModels::FETCH_CACHE_MAX_AGE)
    }

    pub fn age_secs(&self) -> u64 {
        unix_now().saturating_sub(self.fetched_at)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum TdaError {
    NetworkError(String),
    ParseError(String),
}

impl std::fmt::Display for TdaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TdaError::NetworkError(e) => write!(f, "Network error: {}", e),
            TdaError::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for TdaError {}

pub type Result<T> = std::result::Result<T, TdaError>;

// ============================================================================
// Main Implementation
// ============================================================================

pub struct TdaModels;

impl TdaModels {
    const VEHICLES_URL: &'static str = "https://api-v3.mbta.com/vehicles";
    const REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const FETCH_CACHE_MAX_AGE: u64 = 60;

    /// One full pipeline pass: GET, parse, enrich, stamp.
    pub fn fetch_snapshot(rng: &mut impl Rng) -> Result<FetchCache> {
        let raw = Self::fetch_vehicle_positions()?;
        let records = Self::enrich_vehicles(raw, rng);
        info!("fetched {} vehicle positions", records.len());
        Ok(FetchCache::new(records))
    }

    fn fetch_vehicle_positions(
    ) -> Result<Vec<(String, String, f64, f64, String, DateTime<FixedOffset>)>> {
        let client = blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(Self::REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TdaError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        let response = client.get(Self::VEHICLES_URL)
            .send()
            .map_err(|e| TdaError::NetworkError(format!("Failed to fetch vehicles: {}. Check your internet connection.", e)))?;

        if !response.status().is_success() {
            return Err(TdaError::NetworkError(format!("API returned error: {}", response.status())));
        }

        let body = response.text()
            .map_err(|e| TdaError::NetworkError(format!("Failed to read response: {}", e)))?;

        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| TdaError::ParseError(format!("Invalid JSON response: {}", e)))?;

        let items = json["data"]
            .as_array()
            .ok_or_else(|| TdaError::ParseError("Missing or invalid vehicle data in API response".to_string()))?;

        let vehicles: Vec<_> = items.iter().filter_map(Self::parse_vehicle).collect();

        if vehicles.len() < items.len() {
            debug!(
                "skipped {} malformed vehicle entries",
                items.len() - vehicles.len()
            );
        }

        Ok(vehicles)
    }

    /// Extracts one vehicle from a JSON:API element. Any missing or mistyped
    /// field drops the whole item.
    pub fn parse_vehicle(
        item: &serde_json::Value,
    ) -> Option<(String, String, f64, f64, String, DateTime<FixedOffset>)> {
        let vehicle_id = item["id"].as_str()?.to_string();
        let route = item["relationships"]["route"]["data"]["id"].as_str()?.to_string();
        let attributes = &item["attributes"];
        let latitude = attributes["latitude"].as_f64()?;
        let longitude = attributes["longitude"].as_f64()?;
        let status = attributes["current_status"].as_str()?.to_string();
        let updated_at = DateTime::parse_from_rfc3339(attributes["updated_at"].as_str()?).ok()?;

        Some((vehicle_id, route, latitude, longitude, status, updated_at))
    }

    /// Attaches the simulated delay to each parsed vehicle. The random source
    /// is passed in so callers (and tests) control determinism.
    pub fn enrich_vehicles(
        raw: Vec<(String, String, f64, f64, String, DateTime<FixedOffset>)>,
        rng: &mut impl Rng,
    ) -> Vec<VehicleRecord> {
        raw.into_iter()
            .map(|(vehicle_id, route, latitude, longitude, status, updated_at)| {
                let delay_minutes: u8 = rng.gen_range(0..=6);
                VehicleRecord::new(
                    vehicle_id,
                    route,
                    latitude,
                    longitude,
                    status,
                    updated_at,
                    delay_minutes,
                )
            })
            .collect()
    }

    pub fn format_updated_at(updated_at: &DateTime<FixedOffset>) -> String {
        updated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Wall clock in the network's home timezone, for the header.
    pub fn local_clock() -> String {
        Utc::now().with_timezone(&New_York).format("%H:%M:%S").to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
