//! # Game storefront server
//! This crate hosts the HTTP server for the game storefront. It is responsible for:
//! * Starting purchases for authenticated buyers and handing them off to Stripe Checkout.
//! * Receiving signed payment events from Stripe and applying them to orders.
//! * Serving buyers their orders and entitlements, and admins the order search.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/*`: Buyer and admin routes. These require a bearer access token.
//! * `/webhooks/payment`: Stripe events. These require a valid `Stripe-Signature` header.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod notifications;
pub mod reconcile_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
