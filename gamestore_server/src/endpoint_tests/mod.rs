mod accounts;
mod helpers;
mod mocks;
mod purchases;
mod webhook;
