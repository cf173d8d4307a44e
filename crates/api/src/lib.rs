//! `vendora-api` — HTTP boundary for the receiving/invoicing core.

pub mod app;
