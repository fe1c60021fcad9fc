use serde::{Deserialize, Serialize};

use minimart_core::{CustomerId, DomainError, Entity};

/// Contact information for a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: Option<String>,
}

/// A customer who places orders.
///
/// Orders reference customers by id only; a customer's lifecycle is
/// independent of the orders that point at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    id: CustomerId,
    name: String,
    contact: ContactInfo,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        name: impl Into<String>,
        contact: ContactInfo,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        validate_email(&contact.email)?;

        let contact = ContactInfo {
            email: contact.email.trim().to_string(),
            phone: contact
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        };

        Ok(Self { id, name, contact })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::validation("email cannot be empty"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation("email must be an address")),
    }
}
