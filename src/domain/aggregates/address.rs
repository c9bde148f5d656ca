//! Address Book Aggregate
//!
//! Holds the "at most one default" rule: every transition that can set a
//! default clears all others in the same document, so a single whole-document
//! write moves the flag atomically.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::StoreError;

/// Persisted as `addresses/{user}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBookDocument {
    #[serde(default)]
    pub list: Vec<Address>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Empty until the address book assigns one.
    #[serde(default)]
    pub id: String,
    pub full_name: String,
    pub phone: String,
    pub pincode: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    #[serde(rename = "default", default)]
    pub is_default: bool,
}

/// Untrusted address input. Validation happens here, before anything reaches
/// an address book.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(max = 80), custom = "non_blank")]
    pub full_name: String,
    #[validate(custom = "ten_digits")]
    pub phone: String,
    #[validate(custom = "six_digits")]
    pub pincode: String,
    #[validate(length(max = 120), custom = "non_blank")]
    pub line1: String,
    #[validate(length(max = 120))]
    pub line2: Option<String>,
    #[validate(length(max = 60), custom = "non_blank")]
    pub city: String,
    #[validate(length(max = 60), custom = "non_blank")]
    pub state: String,
    #[validate(length(max = 120))]
    pub landmark: Option<String>,
    #[serde(default, rename = "default")]
    pub is_default: bool,
}

impl AddressDraft {
    pub fn into_address(self) -> Result<Address, ValidationErrors> {
        self.validate()?;
        let optional = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(Address {
            id: self.id.unwrap_or_default(),
            full_name: self.full_name.trim().to_string(),
            phone: self.phone,
            pincode: self.pincode,
            line1: self.line1.trim().to_string(),
            line2: optional(self.line2),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            landmark: optional(self.landmark),
            is_default: self.is_default,
        })
    }
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { Err(ValidationError::new("required")) } else { Ok(()) }
}

fn digits(value: &str, len: usize, code: &'static str) -> Result<(), ValidationError> {
    if value.len() == len && value.bytes().all(|b| b.is_ascii_digit()) { Ok(()) } else { Err(ValidationError::new(code)) }
}

fn ten_digits(value: &str) -> Result<(), ValidationError> { digits(value, 10, "phone") }
fn six_digits(value: &str) -> Result<(), ValidationError> { digits(value, 6, "pincode") }

impl AddressBookDocument {
    pub fn get(&self, id: &str) -> Option<&Address> { self.list.iter().find(|a| a.id == id) }
    pub fn default_address(&self) -> Option<&Address> { self.list.iter().find(|a| a.is_default) }
    pub fn default_count(&self) -> usize { self.list.iter().filter(|a| a.is_default).count() }

    /// Replaces a known address in place, otherwise prepends it under
    /// `new_id()`. The first address ever saved becomes the default.
    pub fn with_saved(&self, mut address: Address, new_id: impl FnOnce() -> String) -> (Self, Address) {
        let mut next = self.clone();
        if next.list.is_empty() {
            address.is_default = true;
        }
        let position = next.list.iter().position(|a| !address.id.is_empty() && a.id == address.id);
        match position {
            Some(index) => next.list[index] = address.clone(),
            None => {
                address.id = new_id();
                next.list.insert(0, address.clone());
            }
        }
        if address.is_default {
            for entry in &mut next.list {
                entry.is_default = entry.id == address.id;
            }
        }
        (next, address)
    }

    pub fn with_default(&self, id: &str) -> Result<Self, StoreError> {
        if self.get(id).is_none() {
            return Err(StoreError::NotFound(format!("address {id}")));
        }
        let mut next = self.clone();
        for entry in &mut next.list {
            entry.is_default = entry.id == id;
        }
        Ok(next)
    }

    /// Removing the default leaves the book without one; nothing is promoted.
    pub fn without(&self, id: &str) -> Result<Self, StoreError> {
        if self.get(id).is_none() {
            return Err(StoreError::NotFound(format!("address {id}")));
        }
        Ok(Self { list: self.list.iter().filter(|a| a.id != id).cloned().collect() })
    }
}
