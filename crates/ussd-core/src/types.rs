//! Canonical types shared by every crate in the gateway.
//!
//! Wire formats are normalised into these shapes at the edge; nothing
//! below the protocol adapter sees gateway-specific field names.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Gateway
// =============================================================================

/// Wire convention of a connected telecom gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// `{text, sessionId, phoneNumber, endSession}` JSON object.
    #[default]
    Json,
    /// `CON <prompt>` / `END <prompt>` plain text.
    PlainText,
    /// `{response_string, continue_session, session_id}` JSON object.
    ResponseString,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Json => write!(f, "json"),
            Dialect::PlainText => write!(f, "plain-text"),
            Dialect::ResponseString => write!(f, "response-string"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Dialect::Json),
            "plain-text" | "text" => Ok(Dialect::PlainText),
            "response-string" => Ok(Dialect::ResponseString),
            _ => Err(format!("Unknown gateway dialect: {}", s)),
        }
    }
}

/// A gateway request after field-name normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub session_id: String,
    /// Caller MSISDN exactly as the gateway sent it.
    pub phone_number: String,
    /// Delimiter-joined accumulated input; empty on first dial.
    pub text: String,
    pub service_code: Option<String>,
}

/// The engine's answer to one gateway request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub session_id: String,
    pub phone_number: String,
    pub text: String,
    /// `true` while the caller is expected to answer another prompt.
    pub continue_session: bool,
}

impl GatewayResponse {
    /// A prompt that keeps the session open.
    pub fn prompt(request: &GatewayRequest, text: impl Into<String>) -> Self {
        Self {
            session_id: request.session_id.clone(),
            phone_number: request.phone_number.clone(),
            text: text.into(),
            continue_session: true,
        }
    }

    /// A final message that closes the session.
    pub fn end(request: &GatewayRequest, text: impl Into<String>) -> Self {
        Self {
            session_id: request.session_id.clone(),
            phone_number: request.phone_number.clone(),
            text: text.into(),
            continue_session: false,
        }
    }

    pub fn end_session(&self) -> bool {
        !self.continue_session
    }
}

// =============================================================================
// Session vocabulary
// =============================================================================

/// Prompt languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "bem")]
    Bemba,
    #[serde(rename = "nya")]
    Nyanja,
}

impl Language {
    /// Short code stored with member records.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Bemba => "bem",
            Language::Nyanja => "nya",
        }
    }

    /// Name shown in the language menu, in the language itself.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Bemba => "Ichibemba",
            Language::Nyanja => "Chinyanja",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::English),
            "bem" => Ok(Language::Bemba),
            "nya" => Ok(Language::Nyanja),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

/// Logical fields a session can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Language,
    FirstName,
    LastName,
    NationalId,
    DateOfBirth,
    Province,
    District,
    Constituency,
    Ward,
    MembershipNumber,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Language => "language",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::NationalId => "national_id",
            Field::DateOfBirth => "date_of_birth",
            Field::Province => "province",
            Field::District => "district",
            Field::Constituency => "constituency",
            Field::Ward => "ward",
            Field::MembershipNumber => "membership_number",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Geography
// =============================================================================

/// Levels of the administrative hierarchy, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    Province,
    District,
    Constituency,
    Ward,
}

impl GeoLevel {
    /// The level whose selection scopes this one, if any.
    pub fn parent(&self) -> Option<GeoLevel> {
        match self {
            GeoLevel::Province => None,
            GeoLevel::District => Some(GeoLevel::Province),
            GeoLevel::Constituency => Some(GeoLevel::District),
            GeoLevel::Ward => Some(GeoLevel::Constituency),
        }
    }

    /// The session field a selection at this level binds.
    pub fn field(&self) -> Field {
        match self {
            GeoLevel::Province => Field::Province,
            GeoLevel::District => Field::District,
            GeoLevel::Constituency => Field::Constituency,
            GeoLevel::Ward => Field::Ward,
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field().as_str())
    }
}

/// One administrative unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoUnit {
    pub id: i64,
    pub name: String,
    pub level: GeoLevel,
    pub parent_id: Option<i64>,
}

// =============================================================================
// Members
// =============================================================================

/// Membership lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    Pending,
    Active,
    Suspended,
    Expired,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipStatus::Pending => write!(f, "pending"),
            MembershipStatus::Active => write!(f, "active"),
            MembershipStatus::Suspended => write!(f, "suspended"),
            MembershipStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MembershipStatus::Pending),
            "active" => Ok(MembershipStatus::Active),
            "suspended" => Ok(MembershipStatus::Suspended),
            "expired" => Ok(MembershipStatus::Expired),
            _ => Err(format!("Unknown membership status: {}", s)),
        }
    }
}

/// Validated field bindings submitted for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
    /// Normalised international digits, e.g. `260971234567`.
    pub phone_number: String,
    pub language: Language,
    /// Mobile operator derived from the phone prefix, e.g. `airtel`.
    pub operator: Option<String>,
    /// Selected units, outermost first. Empty when the caller skipped
    /// the location step.
    pub location: Vec<GeoUnit>,
    /// Gateway session that produced the application.
    pub session_id: String,
}

impl NewMember {
    /// The selected unit at `level`, if any.
    pub fn unit(&self, level: GeoLevel) -> Option<&GeoUnit> {
        self.location.iter().find(|u| u.level == level)
    }
}

/// A stored member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub membership_number: String,
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub date_of_birth: NaiveDate,
    pub phone_number: String,
    pub language: Language,
    pub operator: Option<String>,
    pub status: MembershipStatus,
    pub province: Option<String>,
    pub district: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
    pub session_id: String,
    pub registered_at: DateTime<Utc>,
}

impl MemberRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Most specific two location names, e.g. `Kamwala, Kabwata`.
    pub fn location_label(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.ward, &self.constituency, &self.district, &self.province]
            .iter()
            .filter_map(|p| p.as_deref())
            .take(2)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

// =============================================================================
// Session log and callbacks
// =============================================================================

/// Kind of entry in the append-only session log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// A fresh dial (empty accumulated text).
    Started,
    /// A terminal outcome was rendered.
    Finished,
    /// The caller was refused before any menu was shown.
    Refused,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Started => write!(f, "started"),
            SessionEvent::Finished => write!(f, "finished"),
            SessionEvent::Refused => write!(f, "refused"),
        }
    }
}

impl FromStr for SessionEvent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(SessionEvent::Started),
            "finished" => Ok(SessionEvent::Finished),
            "refused" => Ok(SessionEvent::Refused),
            _ => Err(format!("Unknown session event: {}", s)),
        }
    }
}

/// Summary row appended to the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub session_id: String,
    pub phone_number: String,
    pub event: SessionEvent,
    /// Node at which the event happened.
    pub node: String,
    /// Outcome code, e.g. `registered` or `too-many-attempts`.
    pub outcome: String,
    pub membership_number: Option<String>,
    pub at: DateTime<Utc>,
}

/// Out-of-band delivery-status notification from the gateway side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNotice {
    pub status: String,
    pub session_id: String,
    pub message: Option<String>,
    /// Externally issued membership identifier.
    pub member_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Phone number with all but the last three digits masked, for logs.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let keep = chars.len().min(3);
    let mut masked = "*".repeat(chars.len() - keep);
    masked.extend(&chars[chars.len() - keep..]);
    masked
}
