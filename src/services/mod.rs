pub mod checkin;
pub mod mastery;
pub mod queue;
pub mod review;
pub mod scheduler;
pub mod streak;
