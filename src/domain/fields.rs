use rand::{distributions::Uniform, prelude::Distribution};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    /// Emails are compared case-insensitively, so they are stored lowercased.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self(value.to_lowercase()))
    }

    pub fn inner(&self) -> String {
        self.0.to_owned()
    }
}

impl From<String> for Email {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PanCard(String);

impl PanCard {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self(value.to_uppercase()))
    }

    pub fn inner(&self) -> String {
        self.0.to_owned()
    }
}

impl From<String> for PanCard {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for PanCard {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReferralCode(String);

impl ReferralCode {
    const PREFIX_LEN: usize = 3;

    /// Three letters taken from the owner's name followed by six random digits.
    pub fn new(name: &str) -> Self {
        let mut prefix: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(Self::PREFIX_LEN)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        while prefix.len() < Self::PREFIX_LEN {
            prefix.push('X');
        }

        Self(format!("{}{}", prefix, Self::generate_code_digits()))
    }

    /// Codes typed in by users are matched case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Self(value.to_uppercase()))
    }

    pub fn inner(&self) -> String {
        self.0.to_owned()
    }

    fn generate_code_digits() -> String {
        let mut rng = rand::thread_rng();
        let uni_sample = Uniform::from(100_000..=999_999);
        let code: u32 = uni_sample.sample(&mut rng);
        code.to_string()
    }
}

impl From<String> for ReferralCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ReferralCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ReferralCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub exp: usize,
}
