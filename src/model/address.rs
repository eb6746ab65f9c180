//! Email addresses as carried in parsed documents.

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Convert one `mail-parser` address entry.
    ///
    /// Returns `None` when the entry carries neither a name nor an address.
    pub fn from_addr(addr: &mail_parser::Addr<'_>) -> Option<Self> {
        let display_name = addr.name.as_deref().unwrap_or("").trim().to_string();
        let address = addr.address.as_deref().unwrap_or("").trim().to_string();
        if display_name.is_empty() && address.is_empty() {
            return None;
        }
        Some(Self {
            display_name,
            address,
        })
    }

    /// Flatten a `mail-parser` address header (plain list or groups).
    pub fn list_from(header: Option<&mail_parser::Address<'_>>) -> Vec<Self> {
        let Some(header) = header else {
            return Vec::new();
        };
        match header {
            mail_parser::Address::List(addrs) => addrs.iter().filter_map(Self::from_addr).collect(),
            mail_parser::Address::Group(groups) => groups
                .iter()
                .flat_map(|g| g.addresses.iter().filter_map(Self::from_addr))
                .collect(),
        }
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
