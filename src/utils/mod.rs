pub mod jwt;
pub mod password;
pub mod referral;
pub mod uploads;
