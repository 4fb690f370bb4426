//! Contact links shown in the display footer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::ContactId;

/// Errors raised by [`ContactList`] mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// A contact of this kind already exists; the list holds at most one
    /// entry per kind.
    #[error("a {0} contact already exists")]
    DuplicateKind(ContactKind),
    /// The contact value is empty or whitespace.
    #[error("contact value cannot be empty")]
    EmptyValue,
    /// No contact with the given id.
    #[error("no contact with id {0}")]
    NotFound(ContactId),
}

/// The closed set of contact kinds the display knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Instagram,
    Facebook,
    Tiktok,
    Twitter,
    Youtube,
    Snapchat,
    Whatsapp,
    Telegram,
    Linkedin,
    Phone,
    Email,
    Website,
    Location,
}

impl ContactKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 13] = [
        Self::Instagram,
        Self::Facebook,
        Self::Tiktok,
        Self::Twitter,
        Self::Youtube,
        Self::Snapchat,
        Self::Whatsapp,
        Self::Telegram,
        Self::Linkedin,
        Self::Phone,
        Self::Email,
        Self::Website,
        Self::Location,
    ];

    /// The lowercase wire name, as stored in the `type` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
            Self::Tiktok => "tiktok",
            Self::Twitter => "twitter",
            Self::Youtube => "youtube",
            Self::Snapchat => "snapchat",
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Linkedin => "linkedin",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Website => "website",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown contact kind: {s}"))
    }
}

/// A single contact entry.
///
/// The wire shape matches the legacy document:
/// `{"id": 1700000000000, "type": "instagram", "value": "@shop"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub value: String,
}

impl Contact {
    /// Build a contact with a fresh millisecond id.
    #[must_use]
    pub fn new(kind: ContactKind, value: impl Into<String>) -> Self {
        Self {
            id: ContactId::now(),
            kind,
            value: value.into(),
        }
    }
}

/// An ordered contact list holding at most one entry per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactList(Vec<Contact>);

impl ContactList {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Contact> {
        self.0.iter()
    }

    #[must_use]
    pub fn contains_kind(&self, kind: ContactKind) -> bool {
        self.0.iter().any(|contact| contact.kind == kind)
    }

    /// Append a contact, enforcing one entry per kind.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::DuplicateKind`] if a contact of the same kind
    /// is already present, or [`ContactError::EmptyValue`] for a blank
    /// value. The list is unchanged on error.
    pub fn add(&mut self, contact: Contact) -> Result<(), ContactError> {
        if contact.value.trim().is_empty() {
            return Err(ContactError::EmptyValue);
        }
        if self.contains_kind(contact.kind) {
            return Err(ContactError::DuplicateKind(contact.kind));
        }
        self.0.push(contact);
        Ok(())
    }

    /// Remove the contact with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ContactError::NotFound`] if no contact carries the id.
    pub fn remove(&mut self, id: ContactId) -> Result<Contact, ContactError> {
        let position = self
            .0
            .iter()
            .position(|contact| contact.id == id)
            .ok_or(ContactError::NotFound(id))?;
        Ok(self.0.remove(position))
    }
}

impl From<Vec<Contact>> for ContactList {
    fn from(contacts: Vec<Contact>) -> Self {
        Self(contacts)
    }
}

impl<'a> IntoIterator for &'a ContactList {
    type Item = &'a Contact;
    type IntoIter = std::slice::Iter<'a, Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
