//! services/client/src/protocol.rs
//!
//! Defines the remote API contract consumed by the client: the request
//! descriptors for every endpoint and the JSON payloads exchanged with them.

use justgo_core::domain::User;
use justgo_core::ports::Method;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Cities offered by the weather selector.
pub const KNOWN_CITIES: [&str; 8] = [
    "Paris", "Tokyo", "New York", "London", "Bali", "Rome", "Dubai", "Iceland",
];

//=========================================================================================
// Request Descriptors
//=========================================================================================

/// A static description of one call site: where it goes, how, and whether it
/// needs a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: Cow<'static, str>,
    pub method: Method,
    pub requires_auth: bool,
}

impl Endpoint {
    pub const REGISTER: Endpoint = Endpoint::public(Method::Post, "/register");
    pub const LOGIN: Endpoint = Endpoint::public(Method::Post, "/login");
    pub const HEALTH: Endpoint = Endpoint::public(Method::Get, "/api/health");
    pub const DASHBOARD: Endpoint = Endpoint::protected("/dashboard");
    pub const TRIPS: Endpoint = Endpoint::protected("/trips");
    pub const DESTINATIONS: Endpoint = Endpoint::protected("/destinations");

    const fn public(method: Method, path: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
            method,
            requires_auth: false,
        }
    }

    const fn protected(path: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
            method: Method::Get,
            requires_auth: true,
        }
    }

    pub fn weather(city: &str) -> Self {
        Self {
            path: Cow::Owned(format!("/weather/{}", city)),
            method: Method::Get,
            requires_auth: true,
        }
    }
}

//=========================================================================================
// Authentication Payloads
//=========================================================================================

#[derive(Serialize, Debug)]
pub struct CredentialsRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UserPayload {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl UserPayload {
    pub fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            username: self.username,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserPayload>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl LoginResponse {
    /// Returns the token and user when the exchange granted a session.
    pub fn into_grant(self) -> Result<(String, User), Option<String>> {
        let rejected = self.success == Some(false);
        match (self.token, self.user) {
            (Some(token), Some(user)) if !rejected && !token.is_empty() => {
                Ok((token, user.to_domain()))
            }
            _ => Err(self.error.or(self.message)),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The shape of a structured error body. Both `{error}` and
/// `{success: false, message}` are in use on the server.
#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|m| !m.trim().is_empty())
    }
}

//=========================================================================================
// Dashboard Payloads
//=========================================================================================

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub total_trips: u32,
    pub upcoming_trips: u32,
    pub completed_trips: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TripSummary {
    pub id: i64,
    pub destination: String,
    pub date: String,
    pub duration: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WeatherInfo {
    pub current_location: String,
    pub temperature: String,
    pub condition: String,
    pub humidity: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub user_stats: UserStats,
    #[serde(default)]
    pub recent_trips: Vec<TripSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_info: Option<WeatherInfo>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub id: i64,
    pub destination: String,
    pub date: String,
    pub duration: String,
    pub status: String,
    pub budget: String,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TripList {
    pub trips: Vec<Trip>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Destination {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub rating: f32,
    pub price_range: String,
    pub best_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DestinationList {
    pub destinations: Vec<Destination>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CurrentWeather {
    pub temp: String,
    pub condition: String,
    pub humidity: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ForecastDay {
    pub day: String,
    pub temp: String,
    pub condition: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    pub city: String,
    pub weather: CurrentWeather,
    #[serde(default)]
    pub forecast: Vec<ForecastDay>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}
