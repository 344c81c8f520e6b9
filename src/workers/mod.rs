pub mod outcome_expiry;
