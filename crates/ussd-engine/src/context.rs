//! Session context.
//!
//! Derived fresh from the accumulated text on every request and dropped
//! once the response is rendered. Nothing here is persisted.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use ussd_core::types::{Field, GeoUnit, Language, NewMember};

use crate::error::ServiceError;
use crate::graph::NodeId;
use crate::validation::Rejection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Node awaiting the next token (or the terminal reached).
    pub node: NodeId,
    /// Tokens that advanced the walk, in order.
    pub consumed: Vec<String>,
    /// Canonical values keyed by logical field.
    pub fields: BTreeMap<Field, String>,
    pub language: Language,
    /// Units selected so far, outermost first.
    pub location: Vec<GeoUnit>,
    /// Options offered at the current geography node.
    pub options: Vec<GeoUnit>,
    /// Consecutive rejected tokens at `node`.
    pub attempts: u32,
    /// Rejection of the final token, if it was rejected.
    pub rejection: Option<Rejection>,
}

impl SessionContext {
    pub fn new(root: NodeId, language: Language) -> Self {
        Self {
            node: root,
            consumed: Vec::new(),
            fields: BTreeMap::new(),
            language,
            location: Vec::new(),
            options: Vec::new(),
            attempts: 0,
            rejection: None,
        }
    }

    pub fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Bind a field. Binding `language` also switches the prompt language.
    pub fn bind(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        if field == Field::Language {
            if let Ok(lang) = value.parse::<Language>() {
                self.language = lang;
            }
        }
        self.fields.insert(field, value);
    }

    pub fn full_name(&self) -> String {
        match (self.field(Field::FirstName), self.field(Field::LastName)) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.to_string(),
            _ => String::new(),
        }
    }

    /// Bound date of birth shown as DD/MM/YYYY.
    pub fn date_of_birth_display(&self) -> String {
        self.date_of_birth()
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_default()
    }

    fn date_of_birth(&self) -> Option<NaiveDate> {
        self.field(Field::DateOfBirth)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// Two most specific selected units, e.g. `Kamwala, Kabwata`.
    pub fn location_label(&self) -> Option<String> {
        if self.location.is_empty() {
            return None;
        }
        let names: Vec<&str> = self
            .location
            .iter()
            .rev()
            .take(2)
            .map(|u| u.name.as_str())
            .collect();
        Some(names.join(", "))
    }

    /// Registration application from the bound fields.
    pub fn to_new_member(
        &self,
        phone_number: &str,
        session_id: &str,
    ) -> Result<NewMember, ServiceError> {
        let required = |field: Field| {
            self.field(field)
                .map(str::to_string)
                .ok_or_else(|| ServiceError::InvalidApplication(format!("{} is not bound", field)))
        };

        Ok(NewMember {
            first_name: required(Field::FirstName)?,
            last_name: required(Field::LastName)?,
            national_id: required(Field::NationalId)?,
            date_of_birth: self.date_of_birth().ok_or_else(|| {
                ServiceError::InvalidApplication("date_of_birth is not bound".to_string())
            })?,
            phone_number: phone_number.to_string(),
            language: self.language,
            operator: None,
            location: self.location.clone(),
            session_id: session_id.to_string(),
        })
    }
}
