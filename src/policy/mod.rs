//! Selection policy definitions.

pub mod v1;
pub mod family;

pub use v1::SelectionPolicyV1;
pub use family::{FamilyRule, FamilyRules, FamilyRuleError};
