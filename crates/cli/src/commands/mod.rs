pub mod chat;
pub mod doctor;
pub mod indicators;
pub mod ingest;
pub mod onboard;
pub mod serve;
