//! HTTP Route Handlers

pub mod extraction;
